use common::{IdentityReport, ModeAck, RestartAck, ScanReport};

/// Messages into the radio controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControllerMessage {
    /// Control text as received from the uplink, unparsed.
    Control(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ForwarderKind {
    DeviceReady,
    Scan,
    Restart,
    Who,
    Mode,
    Debug,
}

impl ForwarderKind {
    /// Data subtopic the kind is published under. Device-ready has none and
    /// goes straight to `<data-root>/<name>`.
    pub fn subtopic(self) -> Option<&'static str> {
        match self {
            ForwarderKind::DeviceReady => None,
            ForwarderKind::Scan => Some("scan"),
            ForwarderKind::Restart => Some("restart"),
            ForwarderKind::Who => Some("who"),
            ForwarderKind::Mode => Some("mode"),
            ForwarderKind::Debug => Some("dbg"),
        }
    }
}

/// Messages into the uplink forwarder.
#[derive(Clone, Debug, PartialEq)]
pub enum ForwarderMessage {
    /// The radio has resolved the device identity.
    DeviceReady { name: String },
    Scan(ScanReport),
    Restart(RestartAck),
    Who(IdentityReport),
    Mode(ModeAck),
    Debug(String),
}

impl ForwarderMessage {
    pub fn kind(&self) -> ForwarderKind {
        match self {
            ForwarderMessage::DeviceReady { .. } => ForwarderKind::DeviceReady,
            ForwarderMessage::Scan(_) => ForwarderKind::Scan,
            ForwarderMessage::Restart(_) => ForwarderKind::Restart,
            ForwarderMessage::Who(_) => ForwarderKind::Who,
            ForwarderMessage::Mode(_) => ForwarderKind::Mode,
            ForwarderMessage::Debug(_) => ForwarderKind::Debug,
        }
    }

    /// Wire payload. Device-ready and debug are plain text, the rest JSON.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            ForwarderMessage::DeviceReady { name } => Ok(name.as_bytes().to_vec()),
            ForwarderMessage::Debug(text) => Ok(text.as_bytes().to_vec()),
            ForwarderMessage::Scan(report) => serde_json::to_vec(report),
            ForwarderMessage::Restart(ack) => serde_json::to_vec(ack),
            ForwarderMessage::Who(report) => serde_json::to_vec(report),
            ForwarderMessage::Mode(ack) => serde_json::to_vec(ack),
        }
    }
}
