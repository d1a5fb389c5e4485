//! Beacon relay node: alternates a BLE radio between scanning for iBeacons
//! and advertising as one, and relays results and control over MQTT.

pub mod config;
pub mod device;
pub mod error;
pub mod logging;
pub mod mailbox;
pub mod node;
pub mod platform;
pub mod radio;
pub mod sync;
pub mod uplink;
pub mod version;
pub mod wifi;

pub use error::{Error, Result};

pub mod prelude {
    pub use crate::{
        config::Config,
        device::{BdAddr, DeviceRecord},
        error::{Error, Result},
        mailbox::{ControllerMessage, ForwarderMessage},
        node::Platform,
        platform::{LinkDriver, RadioDriver, System},
        uplink::broker::{BrokerClient, BrokerConnector},
    };
    pub use common::RadioMode;
}
