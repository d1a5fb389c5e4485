use serde::{Deserialize, Serialize};

/// Lowest advertising interval the controller accepts
pub const MIN_INTERVAL_MS: u32 = 40;
/// Highest advertising interval the controller accepts
pub const MAX_INTERVAL_MS: u32 = 10240;

const DEFAULT_INTERVAL_MS: u32 = 40;

/// Scan window/interval lead over the advertising parameter, in radio units
const SCAN_WINDOW_LEAD: u16 = 4;
const SCAN_INTERVAL_LEAD: u16 = 0x20;

/// The interval parameter, held in 0.625 ms radio units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AdvInterval(u16);

impl AdvInterval {
    /// Convert milliseconds, clamping to what the controller accepts.
    pub fn from_ms_clamped(ms: u64) -> Self {
        let ms = ms.clamp(MIN_INTERVAL_MS as u64, MAX_INTERVAL_MS as u64) as u32;
        Self((ms * 16 / 10) as u16)
    }

    pub fn from_units(units: u16) -> Self {
        Self(units)
    }

    pub fn units(self) -> u16 {
        self.0
    }

    pub fn as_ms(self) -> u32 {
        self.0 as u32 * 10 / 16
    }

    pub fn scan_params(self) -> ScanParams {
        let window = self.0.saturating_add(SCAN_WINDOW_LEAD);
        ScanParams {
            window,
            interval: window.saturating_add(SCAN_INTERVAL_LEAD),
        }
    }

    pub fn adv_params(self) -> AdvParams {
        AdvParams {
            interval_min: self.0 >> 1,
            interval_max: self.0,
        }
    }
}

impl Default for AdvInterval {
    fn default() -> Self {
        Self::from_ms_clamped(DEFAULT_INTERVAL_MS as u64)
    }
}

/// Scan timing in radio units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanParams {
    pub window: u16,
    pub interval: u16,
}

/// Advertising interval bounds in radio units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvParams {
    pub interval_min: u16,
    pub interval_max: u16,
}
