//! # ot-platform
//!
//! Bring-up glue between a Thread mesh engine and a hosted platform.
//!
//! A [`Platform`] owns the engine behind the worker's API lock, runs its
//! internal processing on a dedicated worker thread and fans the engine's
//! single state-changed notification out to any number of observers.
//!
//! ## Module Overview
//! - [`engine`]   – the engine entry points the glue calls, plus dataset types.
//! - [`config`]   – default dataset, joiner credentials and worker settings.
//! - [`platform`] – init, run, stop and observer registration.
//! - [`sim`]      – an in-process engine for tests and demos.

pub mod config;
pub mod engine;
mod error;
pub mod platform;
pub mod sim;

pub use config::{DatasetDefaults, PlatformConfig, PlatformConfigBuilder};
pub use engine::{
    DeviceRole, ExtendedPanId, Ipv4Cidr, JoinerCallback, JoinerParams, NetworkKey,
    ReceiveHandler, StateChangedHook, ThreadEngine,
};
pub use error::{ConfigError, EngineError, EngineResult, PlatformError, PlatformResult};
pub use platform::Platform;
pub use sim::{MessageKind, SimEngine, SimMessage, SimOp};

pub use ot_notify::{CallbackHandle, ChangedFlags, StateChangedCallback};
pub use ot_worker::{Scheduler, Waker, WorkerState};

#[cfg(test)]
mod tests;
