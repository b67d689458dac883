//! The platform context: one engine, one worker, one observer registry.
//!
//! A [`Platform`] replaces the process-wide globals an RTOS port keeps for the
//! engine instance, its API mutex, its work queue and its callback list. Any
//! number of independent platforms can coexist, which is what the tests rely
//! on.

use std::fmt;
use std::sync::Arc;
use std::thread::ThreadId;

use log::{debug, error, info, warn};
use ot_notify::{CallbackHandle, CallbackRegistry, ChangedFlags, StateChangedCallback};
use ot_worker::{ApiGuard, Scheduler, WorkerHandle, WorkerResult};
use parking_lot::Mutex;

use crate::config::{DatasetDefaults, PlatformConfig};
use crate::engine::{ReceiveHandler, ThreadEngine};
use crate::error::{EngineError, EngineResult, PlatformError, PlatformResult};

pub struct Platform<E: ThreadEngine, U = ()> {
    config: PlatformConfig,
    dataset: DatasetDefaults,
    scheduler: Scheduler<E>,
    callbacks: Arc<CallbackRegistry<E, U>>,
    worker: Mutex<Option<WorkerHandle>>,
}

impl<E, U> Platform<E, U>
where
    E: ThreadEngine,
    U: Send + Sync + 'static,
{
    /// Brings the engine up and starts the worker.
    ///
    /// `rx_handler` receives datagrams from the engine and is required unless
    /// `config.coprocessor` is set.
    pub fn init(
        engine: E,
        config: PlatformConfig,
        rx_handler: Option<ReceiveHandler<E::Message>>,
    ) -> PlatformResult<Self> {
        let platform = Self::new(engine, config, rx_handler)?;
        platform.start()?;
        Ok(platform)
    }

    /// Configures the engine without starting the worker. Drain cycles can
    /// then be driven by [`start`](Self::start) or by hand through
    /// [`scheduler`](Self::scheduler).
    pub fn new(
        engine: E,
        config: PlatformConfig,
        rx_handler: Option<ReceiveHandler<E::Message>>,
    ) -> PlatformResult<Self> {
        let dataset = config.validate()?;
        let scheduler = Scheduler::new(engine, config.scheduler_config());
        let callbacks = Arc::new(CallbackRegistry::new());

        {
            let engine = scheduler.lock();
            engine.attach_waker(scheduler.waker());

            if config.coprocessor {
                if let Err(err) = engine.enable_coprocessor() {
                    error!("Failed to enable coprocessor transport: [{}]", err.code());
                }
            } else {
                let rx_handler = rx_handler.ok_or(PlatformError::MissingReceiveHandler)?;
                engine.set_receive_filter_enabled(true);
                engine.set_receive_handler(Arc::clone(&rx_handler));

                if let Some(cidr) = dataset.nat64_cidr {
                    engine.set_nat64_cidr(cidr).map_err(|source| {
                        error!("Incorrect NAT64 CIDR");
                        PlatformError::Engine {
                            what: "NAT64 CIDR",
                            source,
                        }
                    })?;
                    engine.set_nat64_receive_handler(rx_handler);
                }

                let registry = Arc::clone(&callbacks);
                engine
                    .set_state_changed_hook(Arc::new(move |flags, engine: &E| {
                        forward_state_change(registry.as_ref(), flags, engine)
                    }))
                    .map_err(|source| {
                        error!("Could not set state changed callback: {}", source.code());
                        PlatformError::Engine {
                            what: "state changed callback",
                            source,
                        }
                    })?;
            }
        }

        Ok(Self {
            config,
            dataset,
            scheduler,
            callbacks,
            worker: Mutex::new(None),
        })
    }

    /// Spawns the worker, replacing one that has exited, and submits the
    /// first drain cycle.
    pub fn start(&self) -> PlatformResult<()> {
        let mut worker = self.worker.lock();
        if worker.as_ref().map_or(true, WorkerHandle::is_finished) {
            if let Some(finished) = worker.take() {
                warn!("worker thread {:?} exited, restarting", finished.thread_id());
            }
            *worker = Some(self.scheduler.spawn()?);
        }
        drop(worker);
        self.scheduler.request_wake();
        Ok(())
    }

    /// Starts the network.
    ///
    /// A commissioned device starts with its stored dataset. Otherwise the
    /// device either begins joining (when joiner autostart is configured) or
    /// applies the default dataset from the configuration and starts.
    pub fn run(&self) -> PlatformResult<()> {
        let engine = self.scheduler.lock();
        self.start_network(&engine).map_err(PlatformError::Io)
    }

    fn start_network(&self, engine: &E) -> EngineResult<()> {
        if engine.is_commissioned() {
            debug!("OpenThread already commissioned.");
        } else if self.config.joiner_autostart {
            debug!("Starting OpenThread join procedure.");
            let params = self.config.joiner_params();
            return engine
                .joiner_start(&params, Box::new(on_joiner_complete::<E>))
                .map_err(|err| {
                    error!("Failed to start joiner [{}]", err.code());
                    err
                });
        } else {
            debug!("Loading OpenThread default configuration.");
            self.apply_default_dataset(engine)?;
        }

        info!("Network name: {}", engine.network_name());
        enable_network(engine)
    }

    fn apply_default_dataset(&self, engine: &E) -> EngineResult<()> {
        checked("network name", engine.set_network_name(&self.config.network_name))?;
        checked("channel", engine.set_channel(self.config.channel))?;
        checked("PAN ID", engine.set_pan_id(self.config.pan_id))?;
        checked(
            "ext PAN ID",
            engine.set_extended_pan_id(&self.dataset.extended_pan_id),
        )?;
        if let Some(key) = &self.dataset.network_key {
            checked("network key", engine.set_network_key(key))?;
        }
        Ok(())
    }

    /// Stops the network. A no-op in coprocessor mode.
    pub fn stop(&self) -> PlatformResult<()> {
        if self.config.coprocessor {
            return Ok(());
        }

        match self.scheduler.lock_and_call(|engine| engine.set_enabled(false)) {
            Ok(()) => {}
            Err(err @ EngineError::InvalidState) => {
                debug!("Openthread interface was not up [{}]", err.code())
            }
            Err(err) => warn!("Failed to stop the OpenThread network [{}]", err.code()),
        }
        Ok(())
    }

    /// Adds an observer for engine state changes.
    pub fn register_state_callback(
        &self,
        callback: StateChangedCallback<E, U>,
    ) -> PlatformResult<CallbackHandle> {
        Ok(self.callbacks.register(callback)?)
    }

    pub fn unregister_state_callback(&self, handle: CallbackHandle) -> PlatformResult<()> {
        Ok(self.callbacks.unregister(handle)?)
    }

    /// Forwards a state change to every observer, under the API lock.
    ///
    /// The engine normally does this itself through the installed hook.
    pub fn on_engine_state_changed(&self, flags: ChangedFlags) {
        let engine = self.scheduler.lock();
        forward_state_change(self.callbacks.as_ref(), flags, &*engine);
    }

    /// Requests a drain cycle. Never blocks.
    pub fn request_wake(&self) {
        self.scheduler.request_wake();
    }

    pub fn lock(&self) -> ApiGuard<'_, E> {
        self.scheduler.lock()
    }

    pub fn lock_and_call<R>(&self, op: impl FnOnce(&E) -> R) -> R {
        self.scheduler.lock_and_call(op)
    }

    pub fn try_lock_and_call<R>(&self, op: impl FnOnce(&E) -> R) -> WorkerResult<R> {
        self.scheduler.try_lock_and_call(op)
    }

    pub fn worker_thread_id(&self) -> Option<ThreadId> {
        self.scheduler.worker_thread_id()
    }

    pub fn scheduler(&self) -> &Scheduler<E> {
        &self.scheduler
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    /// Stops the worker and waits for it to exit. Engine calls through
    /// [`lock_and_call`](Self::lock_and_call) keep working afterwards.
    pub fn shutdown(&self) {
        if let Some(worker) = self.worker.lock().take() {
            worker.shutdown();
        }
    }
}

fn forward_state_change<E: ThreadEngine, U>(
    registry: &CallbackRegistry<E, U>,
    flags: ChangedFlags,
    engine: &E,
) {
    info!(
        "State changed! Flags: {flags} Current role: {} Ip6: {}",
        engine.device_role(),
        if engine.ip6_is_enabled() { "up" } else { "down" }
    );
    registry.dispatch(flags, engine);
}

fn on_joiner_complete<E: ThreadEngine>(engine: &E, result: EngineResult<()>) {
    match result {
        Ok(()) => {
            info!("Join success");
            // Failure is already logged.
            let _ = enable_network(engine);
        }
        Err(err) => error!("Join failed [{}]", err.code()),
    }
}

fn enable_network<E: ThreadEngine>(engine: &E) -> EngineResult<()> {
    engine.set_enabled(true).map_err(|err| {
        error!("Failed to start the OpenThread network [{}]", err.code());
        err
    })
}

fn checked(what: &str, result: EngineResult<()>) -> EngineResult<()> {
    if let Err(err) = &result {
        error!("Failed to set {what} [{}]", err.code());
    }
    result
}

impl<E: ThreadEngine, U> fmt::Debug for Platform<E, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform")
            .field("network_name", &self.config.network_name)
            .field("coprocessor", &self.config.coprocessor)
            .field("callbacks", &self.callbacks.len())
            .field("worker", &self.scheduler.worker_thread_id())
            .finish()
    }
}
