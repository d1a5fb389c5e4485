//! Driver seams the node runs on top of.
//!
//! Radio and link primitives report completion asynchronously: the radio
//! through the [`GapEventHandler`] registered at init, the link through a
//! [`LinkEventSink`]. Drivers are shared between tasks and callback
//! contexts, so every method takes `&self`.

pub mod sim;

use std::sync::Arc;

use crate::device::BdAddr;
use crate::radio::gap::GapEventHandler;
use crate::radio::interval::{AdvParams, ScanParams};
use crate::version::FirmwareInfo;
use crate::wifi::{Credentials, LinkEventSink};

/// A driver primitive that was refused outright.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{op} failed with code {code}")]
pub struct PlatformError {
    pub op: &'static str,
    pub code: i32,
}

impl PlatformError {
    pub fn new(op: &'static str, code: i32) -> Self {
        Self { op, code }
    }
}

pub type PlatformResult<T> = Result<T, PlatformError>;

/// BLE controller. Each request is confirmed later through the handler.
pub trait RadioDriver: Send + Sync + 'static {
    /// Bring the controller up, register `handler` and return our address.
    fn init(&self, handler: Arc<dyn GapEventHandler>) -> PlatformResult<BdAddr>;
    fn set_scan_params(&self, params: &ScanParams) -> PlatformResult<()>;
    fn start_scanning(&self) -> PlatformResult<()>;
    fn stop_scanning(&self) -> PlatformResult<()>;
    fn set_adv_data(&self, data: &[u8]) -> PlatformResult<()>;
    fn start_advertising(&self, params: &AdvParams) -> PlatformResult<()>;
    fn stop_advertising(&self) -> PlatformResult<()>;
}

/// WiFi station.
pub trait LinkDriver: Send + Sync + 'static {
    fn register(&self, sink: LinkEventSink) -> PlatformResult<()>;
    /// Store credentials for subsequent connects.
    fn set_credentials(&self, credentials: &Credentials) -> PlatformResult<()>;
    /// Credentials persisted by an earlier provisioning, if any.
    fn credentials(&self) -> Option<Credentials>;
    /// Start the station; it posts `StationStarted` once up.
    fn start(&self) -> PlatformResult<()>;
    fn connect(&self) -> PlatformResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPoint {
    pub ssid: String,
    pub rssi: i32,
}

/// Node-level telemetry and control.
pub trait System: Send + Sync + 'static {
    fn firmware(&self) -> FirmwareInfo;
    fn free_heap(&self) -> u32;
    /// The access point we are associated with.
    fn access_point(&self) -> Option<AccessPoint>;
    fn restart(&self);
}
