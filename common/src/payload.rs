use alloc::string::{String, ToString};
use serde::{Deserialize, Serialize};

/// Radio function of a node. Scanning and advertising never run together.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RadioMode {
    #[default]
    #[serde(rename = "idle")]
    Idle,
    #[serde(rename = "scan")]
    Scanning,
    #[serde(rename = "adv")]
    Advertising,
}

impl RadioMode {
    pub const ALL: [RadioMode; 3] = [RadioMode::Idle, RadioMode::Scanning, RadioMode::Advertising];

    /// Name used on the control topic and in acknowledgements
    pub fn name(self) -> &'static str {
        match self {
            RadioMode::Idle => "idle",
            RadioMode::Scanning => "scan",
            RadioMode::Advertising => "adv",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.name() == name)
    }
}

impl core::fmt::Display for RadioMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// `{"response":{"mode":"scan","interval":100}}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeAck {
    pub response: ModeState,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeState {
    pub mode: RadioMode,
    /// Advertising interval in milliseconds
    pub interval: u32,
}

impl ModeAck {
    pub fn new(mode: RadioMode, interval_ms: u32) -> Self {
        Self {
            response: ModeState {
                mode,
                interval: interval_ms,
            },
        }
    }
}

/// One iBeacon observed while scanning
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub name: String,
    /// `xx:xx:xx:xx:xx:xx`
    pub address: String,
    #[serde(rename = "txPwr")]
    pub tx_power: i32,
    #[serde(rename = "RSSI")]
    pub rssi: i32,
}

/// Sent right before the node restarts on request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartAck {
    pub response: String,
}

impl RestartAck {
    pub fn restarting() -> Self {
        Self {
            response: "restarting".to_string(),
        }
    }
}

/// Answer to `who`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityReport {
    pub ble: BleIdentity,
    pub firmware: FirmwareIdentity,
    pub wifi: WifiStatus,
    pub mqtt: BrokerStatus,
    pub mem: MemoryStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BleIdentity {
    pub name: String,
    pub address: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareIdentity {
    /// `<project>.<version>`
    pub version: String,
    /// `<build date> <build time>`
    pub date: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiStatus {
    pub connect: u32,
    pub address: String,
    #[serde(rename = "SSID")]
    pub ssid: String,
    #[serde(rename = "RSSI")]
    pub rssi: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerStatus {
    pub connect: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStatus {
    pub heap: u32,
}
