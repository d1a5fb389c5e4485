use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use common::RadioMode;
use serde::{Deserialize, Serialize};

use crate::device::BdAddr;
use crate::error::Result;
use crate::radio::ibeacon::Beacon;
use crate::radio::interval::AdvInterval;
use crate::radio::RadioSettings;
use crate::uplink::topic::TopicRoots;
use crate::wifi::{Credentials, DEFAULT_BACKOFF};

/// Node configuration, read from `config.ron`. Every field has a default.
#[derive(Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Overrides the credentials persisted on the station
    pub wifi: Option<Credentials>,
    pub broker_url: Option<String>,
    pub topics: TopicRoots,
    pub radio: RadioConfig,
    pub wifi_backoff_secs: u64,
    pub log_level: String,
    pub simulation: SimulationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wifi: None,
            broker_url: None,
            topics: TopicRoots::default(),
            radio: RadioConfig::default(),
            wifi_backoff_secs: DEFAULT_BACKOFF.as_secs(),
            log_level: "info".to_string(),
            simulation: SimulationConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RadioConfig {
    pub startup_mode: RadioMode,
    pub interval_ms: u32,
    pub beacon: Beacon,
}

impl Default for RadioConfig {
    fn default() -> Self {
        let settings = RadioSettings::default();
        Self {
            startup_mode: settings.startup_mode,
            interval_ms: settings.interval.as_ms(),
            beacon: settings.beacon,
        }
    }
}

/// How the host-side drivers behave.
#[derive(Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    pub address: BdAddr,
    pub ip: Ipv4Addr,
    pub ssid: String,
    pub rssi: i32,
    pub free_heap: u32,
    /// Boards heard while scanning
    pub peers: Vec<BdAddr>,
    pub beacon_period_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            address: BdAddr::new([0xac, 0x67, 0xb2, 0x53, 0x82, 0x8a]),
            ip: Ipv4Addr::new(192, 168, 4, 20),
            ssid: "sim".to_string(),
            rssi: -55,
            free_heap: 180_000,
            peers: vec![
                BdAddr::new([0x8c, 0xaa, 0xb5, 0x85, 0x0a, 0x7e]),
                BdAddr::new([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]),
            ],
            beacon_period_ms: 2000,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Config> {
        let config = std::fs::read_to_string(path)?;
        Self::from_ron(&config)
    }

    pub fn from_ron(text: &str) -> Result<Config> {
        let config: Config = ron::from_str(text)?;
        Ok(config)
    }

    pub fn wifi_backoff(&self) -> Duration {
        Duration::from_secs(self.wifi_backoff_secs)
    }

    pub fn radio_settings(&self) -> RadioSettings {
        RadioSettings {
            startup_mode: self.radio.startup_mode,
            interval: AdvInterval::from_ms_clamped(self.radio.interval_ms as u64),
            beacon: self.radio.beacon,
        }
    }
}
