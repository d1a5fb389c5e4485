//! The device record shared by every task.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{OnceLock, RwLock};

use serde::{Deserialize, Serialize};

pub const BD_ADDR_LEN: usize = 6;

/// Bluetooth device address, most significant byte first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BdAddr(pub [u8; BD_ADDR_LEN]);

impl BdAddr {
    pub const fn new(bytes: [u8; BD_ADDR_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; BD_ADDR_LEN] {
        &self.0
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            a, b, c, d, e, g
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid device address: {0:?}")]
pub struct ParseAddrError(String);

impl FromStr for BdAddr {
    type Err = ParseAddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; BD_ADDR_LEN];
        let mut parts = s.split(':');
        for byte in bytes.iter_mut() {
            let part = parts.next().ok_or_else(|| ParseAddrError(s.to_string()))?;
            if part.len() != 2 {
                return Err(ParseAddrError(s.to_string()));
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| ParseAddrError(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(ParseAddrError(s.to_string()));
        }
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for BdAddr {
    type Error = ParseAddrError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BdAddr> for String {
    fn from(addr: BdAddr) -> Self {
        addr.to_string()
    }
}

/// Radio identity, resolved once the radio is up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub address: BdAddr,
    pub name: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    pub wifi_connect: u32,
    pub auth_failure: u32,
    pub broker_connect: u32,
}

/// Process-lifetime facts about this node.
///
/// Each field has a single writer: the radio task sets the identity, the
/// link observer owns the uplink address and link counters, the broker event
/// handler owns the broker counter. Everyone may read.
#[derive(Debug, Default)]
pub struct DeviceRecord {
    identity: OnceLock<Identity>,
    uplink_addr: RwLock<Option<Ipv4Addr>>,
    wifi_connects: AtomicU32,
    auth_failures: AtomicU32,
    broker_connects: AtomicU32,
}

impl DeviceRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if an identity was already recorded; the first one wins.
    pub fn set_identity(&self, identity: Identity) -> bool {
        self.identity.set(identity).is_ok()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.get()
    }

    pub fn name(&self) -> Option<&str> {
        self.identity.get().map(|identity| identity.name.as_str())
    }

    pub fn set_uplink_addr(&self, addr: Ipv4Addr) {
        let mut slot = self
            .uplink_addr
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *slot = Some(addr);
    }

    pub fn uplink_addr(&self) -> Option<Ipv4Addr> {
        *self
            .uplink_addr
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn record_wifi_connect(&self) -> u32 {
        self.wifi_connects.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_auth_failure(&self) -> u32 {
        self.auth_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_broker_connect(&self) -> u32 {
        self.broker_connects.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn counters(&self) -> Counters {
        Counters {
            wifi_connect: self.wifi_connects.load(Ordering::Relaxed),
            auth_failure: self.auth_failures.load(Ordering::Relaxed),
            broker_connect: self.broker_connects.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_formats_lowercase_colon_separated() {
        let addr = BdAddr::new([0x8C, 0xAA, 0xB5, 0x85, 0x0A, 0x7E]);
        assert_eq!(addr.to_string(), "8c:aa:b5:85:0a:7e");
    }

    #[test]
    fn address_parse() {
        let addr: BdAddr = "30:AE:a4:cc:24:6a".parse().unwrap();
        assert_eq!(addr, BdAddr::new([0x30, 0xAE, 0xA4, 0xCC, 0x24, 0x6A]));

        assert!("30:ae:a4:cc:24".parse::<BdAddr>().is_err());
        assert!("30:ae:a4:cc:24:6a:00".parse::<BdAddr>().is_err());
        assert!("30:ae:a4:cc:24:zz".parse::<BdAddr>().is_err());
        assert!("30:ae:a4:cc:246:a".parse::<BdAddr>().is_err());
    }

    #[test]
    fn identity_is_set_once() {
        let record = DeviceRecord::new();
        assert_eq!(record.name(), None);

        let first = Identity {
            address: BdAddr::new([1, 2, 3, 4, 5, 6]),
            name: "esp32_0506".to_string(),
        };
        assert!(record.set_identity(first.clone()));
        assert!(!record.set_identity(Identity {
            address: BdAddr::default(),
            name: "other".to_string(),
        }));
        assert_eq!(record.identity(), Some(&first));
    }

    #[test]
    fn counters_and_uplink_address() {
        let record = DeviceRecord::new();
        assert_eq!(record.record_wifi_connect(), 1);
        assert_eq!(record.record_wifi_connect(), 2);
        assert_eq!(record.record_auth_failure(), 1);
        assert_eq!(record.record_broker_connect(), 1);
        assert_eq!(
            record.counters(),
            Counters {
                wifi_connect: 2,
                auth_failure: 1,
                broker_connect: 1,
            }
        );

        assert_eq!(record.uplink_addr(), None);
        record.set_uplink_addr(Ipv4Addr::new(192, 168, 1, 20));
        assert_eq!(record.uplink_addr(), Some(Ipv4Addr::new(192, 168, 1, 20)));
    }
}
