use serde::{Deserialize, Serialize};

/// Length of a raw iBeacon advertisement.
pub const FRAME_LEN: usize = 30;

/// Flags AD structure, then the Apple manufacturer-specific header.
const HEADER: [u8; 9] = [0x02, 0x01, 0x06, 0x1a, 0xff, 0x4c, 0x00, 0x02, 0x15];

/// Identity a node advertises and reads back from peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Beacon {
    pub uuid: [u8; 16],
    pub major: u16,
    pub minor: u16,
    /// RSSI at 1 m, in dBm
    pub measured_power: i8,
}

impl Default for Beacon {
    fn default() -> Self {
        Self {
            uuid: [
                0xfd, 0xa5, 0x06, 0x93, 0xa4, 0xe2, 0x4f, 0xb1, 0xaf, 0xcf, 0xc6, 0xeb, 0x07, 0x64,
                0x78, 0x25,
            ],
            major: 10167,
            minor: 61958,
            measured_power: -59,
        }
    }
}

impl Beacon {
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let mut frame = [0u8; FRAME_LEN];
        frame[..9].copy_from_slice(&HEADER);
        frame[9..25].copy_from_slice(&self.uuid);
        frame[25..27].copy_from_slice(&self.major.to_be_bytes());
        frame[27..29].copy_from_slice(&self.minor.to_be_bytes());
        frame[29] = self.measured_power as u8;
        frame
    }

    /// Decode raw advertisement data; anything but an iBeacon frame is `None`.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() != FRAME_LEN || data[..9] != HEADER {
            return None;
        }
        let mut uuid = [0u8; 16];
        uuid.copy_from_slice(&data[9..25]);
        Some(Self {
            uuid,
            major: u16::from_be_bytes([data[25], data[26]]),
            minor: u16::from_be_bytes([data[27], data[28]]),
            measured_power: data[29] as i8,
        })
    }
}
