//! WiFi connection supervisor.
//!
//! Owns the station lifecycle: asks for a connection once the station is
//! up, reports connects and classified disconnects to a [`LinkObserver`],
//! and retries after a fixed quiet interval unless the observer says stop.

mod reason;

pub use reason::DisconnectReason;

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::platform::LinkDriver;
use crate::sync::{lock, EventFlags};

/// Quiet interval before reconnecting after a disconnect.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(10);

const CONNECTED: u32 = 1 << 0;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub ssid: String,
    pub password: String,
}

impl Credentials {
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
        }
    }

    pub fn is_usable(&self) -> bool {
        !self.ssid.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    StationStarted,
    GotIp(Ipv4Addr),
    Disconnected(DisconnectReason),
}

/// Where the link driver posts its events. Posting never blocks.
#[derive(Debug, Clone)]
pub struct LinkEventSink(mpsc::UnboundedSender<LinkEvent>);

impl LinkEventSink {
    pub fn post(&self, event: LinkEvent) {
        if self.0.send(event).is_err() {
            debug!("wifi: {:?} after dispatcher stopped", event);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconnect {
    Retry,
    Stop,
}

/// Told about every connect and disconnect.
pub trait LinkObserver: Send + Sync + 'static {
    fn on_connect(&self, ip: Ipv4Addr);
    /// Return [`Reconnect::Stop`] to leave the link down.
    fn on_disconnect(&self, auth_failed: bool) -> Reconnect;
}

#[derive(Default)]
struct Shared {
    state: Mutex<LinkState>,
    /// Present only while `start` is waiting for the first connection.
    connected: Mutex<Option<Arc<EventFlags>>>,
}

impl Shared {
    fn set_state(&self, state: LinkState) {
        *lock(&self.state) = state;
    }

    fn connected_flag(&self) -> Option<Arc<EventFlags>> {
        lock(&self.connected).clone()
    }
}

pub struct WifiSupervisor<L> {
    link: Arc<L>,
    shared: Arc<Shared>,
}

impl<L: LinkDriver> WifiSupervisor<L> {
    /// Register with the link driver. The returned dispatcher must be run
    /// for events to be handled.
    pub fn initialize(
        link: Arc<L>,
        observer: Arc<dyn LinkObserver>,
        backoff: Duration,
    ) -> Result<(Self, LinkDispatcher<L>)> {
        let (tx, events) = mpsc::unbounded_channel();
        link.register(LinkEventSink(tx))?;

        let shared = Arc::new(Shared::default());
        let dispatcher = LinkDispatcher {
            link: link.clone(),
            observer,
            shared: shared.clone(),
            events,
            backoff,
        };
        Ok((Self { link, shared }, dispatcher))
    }

    /// Start the station and wait for the first connection.
    ///
    /// Uses `credentials` if given and usable, otherwise whatever the driver
    /// has persisted. Returns `NotProvisioned` straight away when neither
    /// exists.
    pub async fn start(&self, credentials: Option<&Credentials>) -> Result<()> {
        match credentials {
            Some(credentials) if credentials.is_usable() => {
                self.link.set_credentials(credentials)?
            }
            Some(_) => warn!("wifi: configured credentials have no SSID, trying stored ones"),
            None => {}
        }
        let Some(credentials) = self.link.credentials().filter(Credentials::is_usable) else {
            error!("wifi: no credentials provisioned");
            return Err(Error::NotProvisioned("wifi"));
        };
        info!("wifi: connecting to {:?}", credentials.ssid);

        let flag = Arc::new(EventFlags::new());
        *lock(&self.shared.connected) = Some(flag.clone());
        if let Err(e) = self.link.start() {
            lock(&self.shared.connected).take();
            return Err(e.into());
        }

        flag.wait_any(CONNECTED).await;
        lock(&self.shared.connected).take();
        info!("wifi: connected");
        Ok(())
    }

    pub fn state(&self) -> LinkState {
        *lock(&self.shared.state)
    }
}

/// Handles link events in order, one at a time.
pub struct LinkDispatcher<L> {
    link: Arc<L>,
    observer: Arc<dyn LinkObserver>,
    shared: Arc<Shared>,
    events: mpsc::UnboundedReceiver<LinkEvent>,
    backoff: Duration,
}

impl<L: LinkDriver> LinkDispatcher<L> {
    /// Runs until the driver drops its sink.
    pub async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            self.handle(event).await;
        }
        debug!("wifi: event source closed");
    }

    async fn handle(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::StationStarted => self.connect(),
            LinkEvent::GotIp(ip) => {
                info!("wifi: got ip {}", ip);
                self.shared.set_state(LinkState::Connected);
                if let Some(flag) = self.shared.connected_flag() {
                    flag.set(CONNECTED);
                }
                self.observer.on_connect(ip);
            }
            LinkEvent::Disconnected(reason) => {
                self.shared.set_state(LinkState::Disconnected);
                if let Some(flag) = self.shared.connected_flag() {
                    flag.clear(CONNECTED);
                }
                let auth_failed = reason.is_auth_failure();
                warn!("wifi: disconnected, reason {}", reason);

                match self.observer.on_disconnect(auth_failed) {
                    Reconnect::Stop => info!("wifi: observer declined reconnect"),
                    Reconnect::Retry => {
                        tokio::time::sleep(self.backoff).await;
                        self.connect();
                    }
                }
            }
        }
    }

    fn connect(&self) {
        self.shared.set_state(LinkState::Connecting);
        if let Err(e) = self.link.connect() {
            error!("wifi: connect request refused: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::sim::SimLink;

    const IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 7);

    #[derive(Default)]
    struct Recorder {
        connects: Mutex<Vec<Ipv4Addr>>,
        disconnects: Mutex<Vec<bool>>,
        stop: bool,
    }

    impl LinkObserver for Recorder {
        fn on_connect(&self, ip: Ipv4Addr) {
            lock(&self.connects).push(ip);
        }

        fn on_disconnect(&self, auth_failed: bool) -> Reconnect {
            lock(&self.disconnects).push(auth_failed);
            if self.stop {
                Reconnect::Stop
            } else {
                Reconnect::Retry
            }
        }
    }

    fn setup(stop: bool) -> (Arc<SimLink>, Arc<Recorder>, WifiSupervisor<SimLink>) {
        let link = Arc::new(SimLink::new(IP));
        let recorder = Arc::new(Recorder {
            stop,
            ..Default::default()
        });
        let (supervisor, dispatcher) =
            WifiSupervisor::initialize(link.clone(), recorder.clone(), DEFAULT_BACKOFF).unwrap();
        tokio::spawn(dispatcher.run());
        (link, recorder, supervisor)
    }

    #[tokio::test]
    async fn test_not_provisioned_returns_immediately() {
        let (link, _recorder, supervisor) = setup(false);
        let result = supervisor.start(None).await;
        assert!(matches!(result, Err(Error::NotProvisioned("wifi"))));

        let result = supervisor.start(Some(&Credentials::new("", "pw"))).await;
        assert!(matches!(result, Err(Error::NotProvisioned(_))));
        assert_eq!(link.starts(), 0);
    }

    #[tokio::test]
    async fn test_start_blocks_until_connected() {
        let (link, recorder, supervisor) = setup(false);
        supervisor
            .start(Some(&Credentials::new("lab", "secret")))
            .await
            .unwrap();

        assert_eq!(supervisor.state(), LinkState::Connected);
        assert_eq!(link.connect_requests(), 1);
        assert_eq!(*lock(&recorder.connects), vec![IP]);
        assert_eq!(link.credentials(), Some(Credentials::new("lab", "secret")));
        // the transient flag is gone once the wait is over
        assert!(lock(&supervisor.shared.connected).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_uses_stored_credentials_and_waits() {
        let link = Arc::new(SimLink::new(IP).with_stored(Credentials::new("stored", "pw")));
        link.set_auto_connect(false);
        let recorder = Arc::new(Recorder::default());
        let (supervisor, dispatcher) =
            WifiSupervisor::initialize(link.clone(), recorder.clone(), DEFAULT_BACKOFF).unwrap();
        tokio::spawn(dispatcher.run());

        let supervisor = Arc::new(supervisor);
        let waiter = tokio::spawn({
            let supervisor = supervisor.clone();
            async move { supervisor.start(None).await }
        });

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!waiter.is_finished());
        assert_eq!(supervisor.state(), LinkState::Connecting);

        link.inject(LinkEvent::GotIp(IP));
        waiter.await.unwrap().unwrap();
        assert_eq!(supervisor.state(), LinkState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_classified_and_retried_after_backoff() {
        let (link, recorder, supervisor) = setup(false);
        supervisor
            .start(Some(&Credentials::new("lab", "secret")))
            .await
            .unwrap();
        link.set_auto_connect(false);

        link.inject(LinkEvent::Disconnected(DisconnectReason::AUTH_FAIL));
        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(*lock(&recorder.disconnects), vec![true]);
        assert_eq!(supervisor.state(), LinkState::Disconnected);
        assert_eq!(link.connect_requests(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(link.connect_requests(), 2);
        assert_eq!(supervisor.state(), LinkState::Connecting);

        link.inject(LinkEvent::Disconnected(DisconnectReason::NO_AP_FOUND));
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(*lock(&recorder.disconnects), vec![true, false]);
        assert_eq!(link.connect_requests(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_can_stop_reconnects() {
        let (link, recorder, supervisor) = setup(true);
        supervisor
            .start(Some(&Credentials::new("lab", "secret")))
            .await
            .unwrap();

        link.inject(LinkEvent::Disconnected(DisconnectReason::HANDSHAKE_TIMEOUT));
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(*lock(&recorder.disconnects), vec![true]);
        assert_eq!(link.connect_requests(), 1);
        assert_eq!(supervisor.state(), LinkState::Disconnected);

        // still listening: a later connect is reported
        link.inject(LinkEvent::GotIp(IP));
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(lock(&recorder.connects).len(), 2);
    }

    #[test]
    fn test_password_is_not_logged() {
        let text = format!("{:?}", Credentials::new("lab", "hunter2"));
        assert!(text.contains("lab"));
        assert!(!text.contains("hunter2"));
    }
}
