//! # ot-notify
//!
//! State-change notification registry for the OpenThread platform glue.
//!
//! The engine exposes a single state-changed slot. The glue installs one hook
//! there and fans each notification out to every observer held by a
//! [`CallbackRegistry`], in registration order.
//!
//! ## Module Overview
//! - [`flags`]    – the changed-flag bit set passed through from the engine.
//! - [`observer`] – observer interface and registration record.
//! - [`registry`] – arena-backed ordered registry with handle-based removal.
//!
//! The crate builds without `std` as long as `alloc` is available: disable
//! default features and enable `spin` for the registry lock.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

#[cfg(not(any(feature = "std", feature = "spin")))]
compile_error!("ot-notify needs either the `std` or the `spin` feature for its lock");

mod error;
mod sync;

pub mod flags;
pub mod observer;
pub mod registry;

pub use error::{NotifyError, NotifyResult};
pub use flags::ChangedFlags;
pub use observer::{ObserverRef, StateChangedCallback, StateChangedCallbackBuilder, StateObserver};
pub use registry::{CallbackHandle, CallbackRegistry};

#[cfg(test)]
mod tests;
