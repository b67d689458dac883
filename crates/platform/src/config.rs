//! Build-time network settings for bring-up.
//!
//! Values mirror the options an RTOS image bakes in: the default dataset used
//! when the device has not been commissioned, joiner credentials, and the
//! worker thread parameters. Hex and CIDR fields are kept as strings so the
//! structure can be filled from a settings file; [`PlatformConfig::validate`]
//! parses them once at init.

use ot_worker::{SchedulerConfig, DEFAULT_STACK_SIZE, DEFAULT_THREAD_NAME};

use crate::engine::{ExtendedPanId, Ipv4Cidr, JoinerParams, NetworkKey};
use crate::error::ConfigError;

pub const DEFAULT_VENDOR_NAME: &str = env!("CARGO_PKG_NAME");
pub const DEFAULT_VENDOR_SW_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct PlatformConfig {
    pub network_name: String,
    pub channel: u8,
    pub pan_id: u16,
    /// 16 hex digits, `:` separators allowed. Empty means all zeroes.
    pub extended_pan_id: String,
    /// 32 hex digits, `:` separators allowed. Empty keeps the engine's key.
    pub network_key: String,
    pub joiner_pskd: String,
    /// Join an existing network instead of applying the default dataset when
    /// the device is not commissioned.
    pub joiner_autostart: bool,
    pub vendor_name: String,
    pub platform_info: String,
    pub vendor_sw_version: String,
    pub nat64_cidr: Option<String>,
    /// Run as a network coprocessor driven by an external host.
    pub coprocessor: bool,
    pub thread_name: String,
    pub stack_size: usize,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            network_name: String::new(),
            channel: 0,
            pan_id: 0,
            extended_pan_id: String::new(),
            network_key: String::new(),
            joiner_pskd: String::new(),
            joiner_autostart: false,
            vendor_name: DEFAULT_VENDOR_NAME.to_owned(),
            platform_info: String::new(),
            vendor_sw_version: DEFAULT_VENDOR_SW_VERSION.to_owned(),
            nat64_cidr: None,
            coprocessor: false,
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

/// Parsed form of the dataset fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetDefaults {
    pub extended_pan_id: ExtendedPanId,
    pub network_key: Option<NetworkKey>,
    pub nat64_cidr: Option<Ipv4Cidr>,
}

impl PlatformConfig {
    pub fn builder() -> PlatformConfigBuilder {
        PlatformConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<DatasetDefaults, ConfigError> {
        let extended_pan_id: ExtendedPanId = self.extended_pan_id.parse()?;
        let network_key = if self.network_key.is_empty() {
            None
        } else {
            Some(self.network_key.parse::<NetworkKey>()?)
        };
        let nat64_cidr = self
            .nat64_cidr
            .as_deref()
            .map(str::parse::<Ipv4Cidr>)
            .transpose()?;

        Ok(DatasetDefaults {
            extended_pan_id,
            network_key,
            nat64_cidr,
        })
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::builder()
            .name(self.thread_name.clone())
            .stack_size(self.stack_size)
            .build()
    }

    pub fn joiner_params(&self) -> JoinerParams {
        JoinerParams {
            pskd: self.joiner_pskd.clone(),
            provisioning_url: None,
            vendor_name: self.vendor_name.clone(),
            vendor_model: self.platform_info.clone(),
            vendor_sw_version: self.vendor_sw_version.clone(),
            vendor_data: None,
        }
    }
}

/// Builder for ergonomic platform configuration construction.
#[derive(Debug, Clone, Default)]
pub struct PlatformConfigBuilder {
    config: PlatformConfig,
}

impl PlatformConfigBuilder {
    pub fn network_name(mut self, name: impl Into<String>) -> Self {
        self.config.network_name = name.into();
        self
    }

    pub fn channel(mut self, channel: u8) -> Self {
        self.config.channel = channel;
        self
    }

    pub fn pan_id(mut self, pan_id: u16) -> Self {
        self.config.pan_id = pan_id;
        self
    }

    pub fn extended_pan_id(mut self, hex: impl Into<String>) -> Self {
        self.config.extended_pan_id = hex.into();
        self
    }

    pub fn network_key(mut self, hex: impl Into<String>) -> Self {
        self.config.network_key = hex.into();
        self
    }

    /// Sets the joiner PSKd and enables joining when not commissioned.
    pub fn joiner(mut self, pskd: impl Into<String>) -> Self {
        self.config.joiner_pskd = pskd.into();
        self.config.joiner_autostart = true;
        self
    }

    pub fn vendor_name(mut self, name: impl Into<String>) -> Self {
        self.config.vendor_name = name.into();
        self
    }

    pub fn platform_info(mut self, info: impl Into<String>) -> Self {
        self.config.platform_info = info.into();
        self
    }

    pub fn vendor_sw_version(mut self, version: impl Into<String>) -> Self {
        self.config.vendor_sw_version = version.into();
        self
    }

    pub fn nat64_cidr(mut self, cidr: impl Into<String>) -> Self {
        self.config.nat64_cidr = Some(cidr.into());
        self
    }

    pub fn coprocessor(mut self, enabled: bool) -> Self {
        self.config.coprocessor = enabled;
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.config.stack_size = bytes;
        self
    }

    pub fn build(self) -> PlatformConfig {
        self.config
    }
}
