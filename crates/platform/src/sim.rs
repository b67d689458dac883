//! In-process engine used by the tests and the `sim_node` example.
//!
//! [`SimEngine`] models just enough of a mesh stack to exercise the platform:
//! a tasklet queue drained by the worker, a pending changed-flags word that is
//! reported through the state-changed hook, an active dataset, role
//! transitions on attach, a joiner, and a datagram path up to the host. Any
//! operation can be made to fail once with [`SimEngine::fail_next`].

use std::collections::{HashMap, VecDeque};
use std::fmt;

use log::{debug, trace};
use ot_notify::ChangedFlags;
use ot_worker::{Engine, Waker};
use parking_lot::Mutex;

use crate::engine::{
    DeviceRole, ExtendedPanId, Ipv4Cidr, JoinerCallback, JoinerParams, NetworkKey,
    ReceiveHandler, StateChangedHook, ThreadEngine,
};
use crate::error::{EngineError, EngineResult};

pub const DEFAULT_NETWORK_NAME: &str = "OpenThread";
pub const MAX_NETWORK_NAME_LEN: usize = 16;
pub const CHANNEL_RANGE: std::ops::RangeInclusive<u8> = 11..=26;

/// Operations whose outcome can be forced with [`SimEngine::fail_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimOp {
    StateHook,
    Nat64Cidr,
    Coprocessor,
    SetEnabled,
    NetworkName,
    Channel,
    PanId,
    ExtendedPanId,
    NetworkKey,
    JoinerStart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Ordinary IPv6 traffic for the host stack.
    Datagram,
    /// Engine-internal traffic. Dropped while the receive filter is on.
    Control,
    /// IPv4 traffic coming out of the NAT64 translator.
    Nat64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimMessage {
    pub kind: MessageKind,
    pub payload: Vec<u8>,
}

enum Tasklet {
    Notify,
    JoinerDone(JoinerCallback<SimEngine>, EngineResult<()>),
    Deliver(SimMessage),
}

struct Dataset {
    network_name: String,
    channel: u8,
    pan_id: u16,
    extended_pan_id: ExtendedPanId,
    network_key: NetworkKey,
}

impl Default for Dataset {
    fn default() -> Self {
        Self {
            network_name: DEFAULT_NETWORK_NAME.to_owned(),
            channel: *CHANNEL_RANGE.start(),
            pan_id: 0xffff,
            extended_pan_id: ExtendedPanId::default(),
            network_key: NetworkKey::default(),
        }
    }
}

#[derive(Default)]
struct SimState {
    waker: Option<Waker>,
    tasklets: VecDeque<Tasklet>,
    pending_changes: ChangedFlags,
    notify_queued: bool,

    dataset: Dataset,
    commissioned: bool,
    enabled: bool,
    ip6_enabled: bool,
    role: DeviceRole,
    joining: bool,
    joiner_outcome: Option<EngineError>,
    last_joiner: Option<JoinerParams>,

    hook: Option<StateChangedHook<SimEngine>>,
    rx_handler: Option<ReceiveHandler<SimMessage>>,
    nat64_handler: Option<ReceiveHandler<SimMessage>>,
    receive_filter: bool,
    coprocessor: bool,
    nat64_cidr: Option<Ipv4Cidr>,

    failures: HashMap<SimOp, EngineError>,
    driver_polls: u64,
    delivered: u64,
}

impl SimState {
    fn take_failure(&mut self, op: SimOp) -> EngineResult<()> {
        match self.failures.remove(&op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Records `flags` and queues one notify tasklet for all of them.
    /// Returns the waker to signal once the state lock is released.
    fn raise(&mut self, flags: ChangedFlags) -> Option<Waker> {
        self.pending_changes |= flags;
        if !self.notify_queued {
            self.notify_queued = true;
            self.tasklets.push_back(Tasklet::Notify);
        }
        self.waker.clone()
    }

    fn post(&mut self, tasklet: Tasklet) -> Option<Waker> {
        self.tasklets.push_back(tasklet);
        self.waker.clone()
    }

    fn check_disabled(&self) -> EngineResult<()> {
        if self.enabled {
            return Err(EngineError::InvalidState);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct SimEngine {
    state: Mutex<SimState>,
}

impl SimEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine that already holds an active dataset.
    pub fn commissioned(network_name: &str) -> Self {
        let engine = Self::new();
        {
            let mut state = engine.state.lock();
            state.dataset.network_name = network_name.to_owned();
            state.commissioned = true;
        }
        engine
    }

    /// Makes the next call of `op` fail with `err`.
    pub fn fail_next(&self, op: SimOp, err: EngineError) {
        self.state.lock().failures.insert(op, err);
    }

    /// Outcome reported by subsequent join attempts. Defaults to success.
    pub fn set_joiner_outcome(&self, outcome: EngineResult<()>) {
        self.state.lock().joiner_outcome = outcome.err();
    }

    /// Reports `flags` as changed, as the engine does on internal events.
    pub fn raise_state_change(&self, flags: ChangedFlags) {
        let waker = self.state.lock().raise(flags);
        wake(waker);
    }

    /// Queues an inbound message for delivery during the next drain cycle.
    pub fn inject_rx(&self, kind: MessageKind, payload: impl Into<Vec<u8>>) {
        let message = SimMessage {
            kind,
            payload: payload.into(),
        };
        let waker = self.state.lock().post(Tasklet::Deliver(message));
        wake(waker);
    }

    pub fn role(&self) -> DeviceRole {
        self.state.lock().role
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    pub fn channel(&self) -> u8 {
        self.state.lock().dataset.channel
    }

    pub fn pan_id(&self) -> u16 {
        self.state.lock().dataset.pan_id
    }

    pub fn extended_pan_id(&self) -> ExtendedPanId {
        self.state.lock().dataset.extended_pan_id
    }

    pub fn network_key(&self) -> NetworkKey {
        self.state.lock().dataset.network_key
    }

    pub fn receive_filter_enabled(&self) -> bool {
        self.state.lock().receive_filter
    }

    pub fn coprocessor_enabled(&self) -> bool {
        self.state.lock().coprocessor
    }

    pub fn nat64_cidr(&self) -> Option<Ipv4Cidr> {
        self.state.lock().nat64_cidr
    }

    pub fn has_state_hook(&self) -> bool {
        self.state.lock().hook.is_some()
    }

    pub fn has_receive_handler(&self) -> bool {
        self.state.lock().rx_handler.is_some()
    }

    pub fn last_joiner_params(&self) -> Option<JoinerParams> {
        self.state.lock().last_joiner.clone()
    }

    pub fn driver_polls(&self) -> u64 {
        self.state.lock().driver_polls
    }

    /// Messages handed to a receive handler so far.
    pub fn delivered(&self) -> u64 {
        self.state.lock().delivered
    }

    fn notify(&self) {
        let (flags, hook) = {
            let mut state = self.state.lock();
            state.notify_queued = false;
            let flags = std::mem::take(&mut state.pending_changes);
            (flags, state.hook.clone())
        };
        if flags.is_empty() {
            return;
        }
        match hook {
            Some(hook) => hook(flags, self),
            None => trace!("state change {flags} with no hook installed"),
        }
    }

    fn finish_join(&self, on_complete: JoinerCallback<SimEngine>, result: EngineResult<()>) {
        let waker = {
            let mut state = self.state.lock();
            state.joining = false;
            if result.is_ok() {
                state.commissioned = true;
            }
            state.raise(ChangedFlags::JOINER_STATE)
        };
        wake(waker);
        on_complete(self, result);
    }

    fn deliver(&self, message: SimMessage) {
        let handler = {
            let mut state = self.state.lock();
            let handler = match message.kind {
                MessageKind::Control if state.receive_filter => None,
                MessageKind::Nat64 => state.nat64_handler.clone(),
                MessageKind::Datagram | MessageKind::Control => state.rx_handler.clone(),
            };
            if handler.is_some() {
                state.delivered += 1;
            }
            handler
        };
        match handler {
            Some(handler) => handler(message),
            None => trace!("dropped {:?} message", message.kind),
        }
    }

    fn set_dataset_field(
        &self,
        op: SimOp,
        flags: ChangedFlags,
        apply: impl FnOnce(&mut Dataset) -> EngineResult<()>,
    ) -> EngineResult<()> {
        let waker = {
            let mut state = self.state.lock();
            state.take_failure(op)?;
            state.check_disabled()?;
            apply(&mut state.dataset)?;
            state.raise(flags)
        };
        wake(waker);
        Ok(())
    }
}

fn wake(waker: Option<Waker>) {
    if let Some(waker) = waker {
        waker.wake();
    }
}

/// A joiner PSKd is 6 to 32 uppercase alphanumerics, excluding `I`, `O`,
/// `Q` and `Z`.
fn valid_pskd(pskd: &str) -> bool {
    (6..=32).contains(&pskd.len())
        && pskd
            .bytes()
            .all(|b| (b.is_ascii_digit() || b.is_ascii_uppercase()) && !b"IOQZ".contains(&b))
}

impl Engine for SimEngine {
    fn has_pending_work(&self) -> bool {
        !self.state.lock().tasklets.is_empty()
    }

    fn process_pending_work(&self) {
        let tasklet = self.state.lock().tasklets.pop_front();
        match tasklet {
            Some(Tasklet::Notify) => self.notify(),
            Some(Tasklet::JoinerDone(on_complete, result)) => self.finish_join(on_complete, result),
            Some(Tasklet::Deliver(message)) => self.deliver(message),
            None => {}
        }
    }

    fn service_drivers(&self) {
        let waker = {
            let mut state = self.state.lock();
            state.driver_polls += 1;
            if state.enabled && state.role == DeviceRole::Detached {
                debug!("no partition found, becoming leader");
                state.role = DeviceRole::Leader;
                state.raise(ChangedFlags::THREAD_ROLE | ChangedFlags::THREAD_PARTITION_ID)
            } else {
                None
            }
        };
        wake(waker);
    }
}

impl ThreadEngine for SimEngine {
    type Message = SimMessage;

    fn attach_waker(&self, waker: Waker) {
        self.state.lock().waker = Some(waker);
    }

    fn set_state_changed_hook(&self, hook: StateChangedHook<Self>) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.take_failure(SimOp::StateHook)?;
        state.hook = Some(hook);
        Ok(())
    }

    fn set_receive_filter_enabled(&self, enabled: bool) {
        self.state.lock().receive_filter = enabled;
    }

    fn set_receive_handler(&self, handler: ReceiveHandler<SimMessage>) {
        self.state.lock().rx_handler = Some(handler);
    }

    fn set_nat64_cidr(&self, cidr: Ipv4Cidr) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.take_failure(SimOp::Nat64Cidr)?;
        if !(1..=32).contains(&cidr.prefix_len) {
            return Err(EngineError::InvalidArgs);
        }
        state.nat64_cidr = Some(cidr);
        Ok(())
    }

    fn set_nat64_receive_handler(&self, handler: ReceiveHandler<SimMessage>) {
        self.state.lock().nat64_handler = Some(handler);
    }

    fn enable_coprocessor(&self) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.take_failure(SimOp::Coprocessor)?;
        state.coprocessor = true;
        Ok(())
    }

    fn is_commissioned(&self) -> bool {
        self.state.lock().commissioned
    }

    fn set_enabled(&self, enabled: bool) -> EngineResult<()> {
        let waker = {
            let mut state = self.state.lock();
            state.take_failure(SimOp::SetEnabled)?;
            match (state.enabled, enabled) {
                (true, true) => return Ok(()),
                (false, false) => return Err(EngineError::InvalidState),
                (false, true) => {
                    state.enabled = true;
                    state.ip6_enabled = true;
                    state.commissioned = true;
                    state.role = DeviceRole::Detached;
                    state.raise(
                        ChangedFlags::THREAD_NETIF_STATE
                            | ChangedFlags::THREAD_ROLE
                            | ChangedFlags::ACTIVE_DATASET,
                    )
                }
                (true, false) => {
                    state.enabled = false;
                    state.ip6_enabled = false;
                    state.role = DeviceRole::Disabled;
                    state.raise(ChangedFlags::THREAD_NETIF_STATE | ChangedFlags::THREAD_ROLE)
                }
            }
        };
        wake(waker);
        Ok(())
    }

    fn set_network_name(&self, name: &str) -> EngineResult<()> {
        self.set_dataset_field(
            SimOp::NetworkName,
            ChangedFlags::THREAD_NETWORK_NAME,
            |dataset| {
                if name.len() > MAX_NETWORK_NAME_LEN {
                    return Err(EngineError::InvalidArgs);
                }
                dataset.network_name = name.to_owned();
                Ok(())
            },
        )
    }

    fn network_name(&self) -> String {
        self.state.lock().dataset.network_name.clone()
    }

    fn set_channel(&self, channel: u8) -> EngineResult<()> {
        self.set_dataset_field(SimOp::Channel, ChangedFlags::THREAD_CHANNEL, |dataset| {
            if !CHANNEL_RANGE.contains(&channel) {
                return Err(EngineError::InvalidArgs);
            }
            dataset.channel = channel;
            Ok(())
        })
    }

    fn set_pan_id(&self, pan_id: u16) -> EngineResult<()> {
        self.set_dataset_field(SimOp::PanId, ChangedFlags::THREAD_PANID, |dataset| {
            dataset.pan_id = pan_id;
            Ok(())
        })
    }

    fn set_extended_pan_id(&self, xpanid: &ExtendedPanId) -> EngineResult<()> {
        self.set_dataset_field(
            SimOp::ExtendedPanId,
            ChangedFlags::THREAD_EXT_PANID,
            |dataset| {
                dataset.extended_pan_id = *xpanid;
                Ok(())
            },
        )
    }

    fn set_network_key(&self, key: &NetworkKey) -> EngineResult<()> {
        self.set_dataset_field(SimOp::NetworkKey, ChangedFlags::NETWORK_KEY, |dataset| {
            dataset.network_key = *key;
            Ok(())
        })
    }

    fn joiner_start(
        &self,
        params: &JoinerParams,
        on_complete: JoinerCallback<Self>,
    ) -> EngineResult<()> {
        let waker = {
            let mut state = self.state.lock();
            state.take_failure(SimOp::JoinerStart)?;
            if state.joining {
                return Err(EngineError::Busy);
            }
            if state.enabled || state.commissioned {
                return Err(EngineError::InvalidState);
            }
            if !valid_pskd(&params.pskd) {
                return Err(EngineError::InvalidArgs);
            }

            state.joining = true;
            state.last_joiner = Some(params.clone());
            let result = match state.joiner_outcome {
                Some(err) => Err(err),
                None => Ok(()),
            };
            state.raise(ChangedFlags::JOINER_STATE);
            state.post(Tasklet::JoinerDone(on_complete, result))
        };
        wake(waker);
        Ok(())
    }

    fn device_role(&self) -> DeviceRole {
        self.state.lock().role
    }

    fn ip6_is_enabled(&self) -> bool {
        self.state.lock().ip6_enabled
    }
}

impl fmt::Debug for SimEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SimEngine")
            .field("network_name", &state.dataset.network_name)
            .field("role", &state.role)
            .field("commissioned", &state.commissioned)
            .field("tasklets", &state.tasklets.len())
            .finish()
    }
}
