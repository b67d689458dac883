//! The mesh engine as seen by the platform glue.
//!
//! [`ThreadEngine`] lists the handful of engine entry points the bring-up and
//! commissioning code needs on top of the worker's [`Engine`] surface. Every
//! method is invoked with the API lock held.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::Arc;

use ot_notify::ChangedFlags;
use ot_worker::{Engine, Waker};

use crate::error::{ConfigError, EngineResult};

/// The engine's single state-changed slot.
pub type StateChangedHook<E> = Arc<dyn Fn(ChangedFlags, &E) + Send + Sync>;

/// Receives datagrams the engine hands up to the host stack.
pub type ReceiveHandler<M> = Arc<dyn Fn(M) + Send + Sync>;

/// Completion of a join attempt, invoked from inside a drain cycle.
pub type JoinerCallback<E> = Box<dyn FnOnce(&E, EngineResult<()>) + Send>;

pub trait ThreadEngine: Engine + Sized {
    type Message: Send + 'static;

    /// Hands the engine the handle it uses to request drain cycles whenever
    /// tasklets are queued or a driver event arrives.
    fn attach_waker(&self, waker: Waker);

    fn set_state_changed_hook(&self, hook: StateChangedHook<Self>) -> EngineResult<()>;
    fn set_receive_filter_enabled(&self, enabled: bool);
    fn set_receive_handler(&self, handler: ReceiveHandler<Self::Message>);
    fn set_nat64_cidr(&self, cidr: Ipv4Cidr) -> EngineResult<()>;
    fn set_nat64_receive_handler(&self, handler: ReceiveHandler<Self::Message>);

    /// Switches the engine to network-coprocessor mode, where a host talks
    /// to it over a serial transport.
    fn enable_coprocessor(&self) -> EngineResult<()>;

    fn is_commissioned(&self) -> bool;
    fn set_enabled(&self, enabled: bool) -> EngineResult<()>;
    fn set_network_name(&self, name: &str) -> EngineResult<()>;
    fn network_name(&self) -> String;
    fn set_channel(&self, channel: u8) -> EngineResult<()>;
    fn set_pan_id(&self, pan_id: u16) -> EngineResult<()>;
    fn set_extended_pan_id(&self, xpanid: &ExtendedPanId) -> EngineResult<()>;
    fn set_network_key(&self, key: &NetworkKey) -> EngineResult<()>;
    fn joiner_start(
        &self,
        params: &JoinerParams,
        on_complete: JoinerCallback<Self>,
    ) -> EngineResult<()>;

    fn device_role(&self) -> DeviceRole;
    fn ip6_is_enabled(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceRole {
    #[default]
    Disabled,
    Detached,
    Child,
    Router,
    Leader,
}

impl DeviceRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Detached => "detached",
            Self::Child => "child",
            Self::Router => "router",
            Self::Leader => "leader",
        }
    }

    pub fn is_attached(self) -> bool {
        matches!(self, Self::Child | Self::Router | Self::Leader)
    }
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for a join attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinerParams {
    pub pskd: String,
    pub provisioning_url: Option<String>,
    pub vendor_name: String,
    pub vendor_model: String,
    pub vendor_sw_version: String,
    pub vendor_data: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ExtendedPanId(pub [u8; 8]);

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkKey(pub [u8; 16]);

impl fmt::Debug for NetworkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NetworkKey(..)")
    }
}

impl FromStr for ExtendedPanId {
    type Err = ConfigError;

    /// An empty string yields the all-zero identifier.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::default());
        }
        parse_hex("extended PAN ID", s).map(Self)
    }
}

impl FromStr for NetworkKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex("network key", s).map(Self)
    }
}

impl fmt::Display for ExtendedPanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|byte| write!(f, "{byte:02x}"))
    }
}

/// Parses `N` bytes of hex, ignoring `:` separators.
pub(crate) fn parse_hex<const N: usize>(
    field: &'static str,
    s: &str,
) -> Result<[u8; N], ConfigError> {
    let digits: Vec<u8> = s.bytes().filter(|&b| b != b':').collect();
    if digits.len() != N * 2 {
        return Err(ConfigError::HexLength { field, expected: N });
    }

    let mut out = [0u8; N];
    for (byte, pair) in out.iter_mut().zip(digits.chunks_exact(2)) {
        let hi = hex_value(pair[0]).ok_or(ConfigError::HexDigit { field })?;
        let lo = hex_value(pair[1]).ok_or(ConfigError::HexDigit { field })?;
        *byte = (hi << 4) | lo;
    }
    Ok(out)
}

fn hex_value(digit: u8) -> Option<u8> {
    (digit as char).to_digit(16).map(|value| value as u8)
}

/// IPv4 prefix used by the NAT64 translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Cidr {
    pub addr: Ipv4Addr,
    pub prefix_len: u8,
}

impl FromStr for Ipv4Cidr {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::Cidr(s.to_owned());
        let (addr, prefix_len) = s.trim().split_once('/').ok_or_else(invalid)?;
        let addr: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
        let prefix_len: u8 = prefix_len.parse().map_err(|_| invalid())?;
        if prefix_len > 32 {
            return Err(invalid());
        }
        Ok(Self { addr, prefix_len })
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}
