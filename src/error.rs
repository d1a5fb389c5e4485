use crate::platform::PlatformError;
use crate::uplink::broker::BrokerError;

/// Errors that end a task or abort startup.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not provisioned: {0}")]
    NotProvisioned(&'static str),

    #[error("platform: {0}")]
    Platform(#[from] PlatformError),

    #[error("broker: {0}")]
    Broker(#[from] BrokerError),

    #[error("mailbox {0} closed")]
    MailboxClosed(&'static str),

    #[error("task {0} exited")]
    TaskExited(&'static str),

    #[error("task panicked or was cancelled: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(#[from] ron::error::SpannedError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
