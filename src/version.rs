/// Firmware version, pulled from Cargo.toml
pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const PROJECT_NAME: &str = env!("CARGO_PKG_NAME");

/// Build timestamp, set by build.rs as `YYYY-MM-DD HH:MM:SS` (UTC)
pub const BUILD_TIMESTAMP: &str = env!("BUILD_TIMESTAMP");

/// What the node reports about the image it is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareInfo {
    pub project: String,
    pub version: String,
    pub date: String,
    pub time: String,
}

impl FirmwareInfo {
    pub fn current() -> Self {
        let (date, time) = BUILD_TIMESTAMP
            .split_once(' ')
            .unwrap_or((BUILD_TIMESTAMP, ""));
        Self {
            project: PROJECT_NAME.to_string(),
            version: FIRMWARE_VERSION.to_string(),
            date: date.to_string(),
            time: time.to_string(),
        }
    }

    /// `<project>.<version>`
    pub fn version_string(&self) -> String {
        format!("{}.{}", self.project, self.version)
    }

    /// `<date> <time>`
    pub fn date_string(&self) -> String {
        if self.time.is_empty() {
            self.date.clone()
        } else {
            format!("{} {}", self.date, self.time)
        }
    }
}
