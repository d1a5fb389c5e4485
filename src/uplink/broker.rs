//! The publish/subscribe broker as the uplink sees it.

use std::sync::Arc;

use log::debug;
use tokio::sync::mpsc;

use crate::sync::EventFlags;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    #[error("invalid broker url {0:?}")]
    InvalidUrl(String),
    #[error("request rejected: {0}")]
    Request(String),
}

/// A live broker session. Both operations are at-least-once and hand the
/// request to the client without waiting for the broker.
pub trait BrokerClient: Send + Sync + 'static {
    fn subscribe(&self, topic: &str) -> Result<(), BrokerError>;
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BrokerError>;
}

/// Opens sessions. Reconnecting is the client's business; it only reports
/// transitions through `events`.
pub trait BrokerConnector: Send + Sync + 'static {
    type Client: BrokerClient;

    fn connect(
        &self,
        url: &str,
        client_id: &str,
        events: BrokerEventSink,
    ) -> Result<Self::Client, BrokerError>;
}

/// A message received on a subscribed topic, possibly one chunk of a
/// larger one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub data: Vec<u8>,
    /// Length of the whole message this chunk belongs to.
    pub total_len: usize,
}

impl InboundMessage {
    /// A message delivered in one piece.
    pub fn complete(topic: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        Self {
            topic: topic.into(),
            total_len: data.len(),
            data,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.data.len() == self.total_len
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    Connected,
    Disconnected,
    Message(InboundMessage),
}

/// Where the broker client posts its events. Posting never blocks.
#[derive(Debug, Clone)]
pub struct BrokerEventSink(mpsc::UnboundedSender<BrokerEvent>);

impl BrokerEventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BrokerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }

    pub fn post(&self, event: BrokerEvent) {
        if self.0.send(event).is_err() {
            debug!("broker: event dropped, uplink gone");
        }
    }

    /// True once nobody is listening any more.
    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

const CONNECTED: u32 = 1 << 0;

/// Broker session state, mirrored from client events.
#[derive(Debug, Clone, Default)]
pub struct BrokerLink {
    flags: Arc<EventFlags>,
}

impl BrokerLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_connected(&self, connected: bool) {
        if connected {
            self.flags.set(CONNECTED);
        } else {
            self.flags.clear(CONNECTED);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.flags.get() & CONNECTED != 0
    }

    pub async fn wait_connected(&self) {
        self.flags.wait_any(CONNECTED).await;
    }
}
