//! Uplink forwarder: bridges the mailboxes to the broker.
//!
//! Outbound, every message from the forwarder mailbox is encoded and
//! published under the data tree. Inbound, `restart` and `who` are answered
//! here and everything else is handed to the radio controller as control
//! text.

pub mod broker;
pub mod rumqtt;
pub mod topic;

use std::sync::Arc;
use std::time::Duration;

use common::{
    BleIdentity, BrokerStatus, FirmwareIdentity, IdentityReport, MemoryStatus, RestartAck,
    WifiStatus,
};
use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use self::broker::{
    BrokerClient, BrokerConnector, BrokerEvent, BrokerEventSink, BrokerLink, InboundMessage,
};
use self::topic::{TopicRoots, Topics};
use crate::device::DeviceRecord;
use crate::error::{Error, Result};
use crate::mailbox::{
    ControllerMessage, ForwarderMessage, Inbox, Outbox, RecvError, POLL_INTERVAL,
};
use crate::platform::System;

/// Pause between acknowledging `restart` and restarting, so the
/// acknowledgement can go out.
pub const RESTART_DELAY: Duration = Duration::from_secs(1);

/// What became of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Ignored,
    Restart,
    Identity,
    Control,
}

/// Decides what each inbound message is for.
pub struct InboundRouter<S> {
    system: Arc<S>,
    device: Arc<DeviceRecord>,
    controller: Outbox<ControllerMessage>,
    forwarder: Outbox<ForwarderMessage>,
}

impl<S: System> InboundRouter<S> {
    pub fn new(
        system: Arc<S>,
        device: Arc<DeviceRecord>,
        controller: Outbox<ControllerMessage>,
        forwarder: Outbox<ForwarderMessage>,
    ) -> Self {
        Self {
            system,
            device,
            controller,
            forwarder,
        }
    }

    pub async fn route(&self, message: &InboundMessage) -> Route {
        if !message.is_complete() {
            debug!(
                "uplink: ignoring partial message on {} ({} of {} bytes)",
                message.topic,
                message.data.len(),
                message.total_len
            );
            return Route::Ignored;
        }

        match message.data.as_slice() {
            b"restart" => {
                info!("uplink: restart requested");
                let _ = self
                    .forwarder
                    .send(ForwarderMessage::Restart(RestartAck::restarting()));
                tokio::time::sleep(RESTART_DELAY).await;
                self.system.restart();
                Route::Restart
            }
            b"who" => {
                let _ = self
                    .forwarder
                    .send(ForwarderMessage::Who(self.identity_report()));
                Route::Identity
            }
            data => {
                let text = String::from_utf8_lossy(data).into_owned();
                debug!("uplink: control {:?}", text);
                let _ = self.controller.send(ControllerMessage::Control(text));
                Route::Control
            }
        }
    }

    pub fn identity_report(&self) -> IdentityReport {
        let firmware = self.system.firmware();
        let counters = self.device.counters();
        let ap = self.system.access_point();

        IdentityReport {
            ble: BleIdentity {
                name: self.device.name().unwrap_or_default().to_string(),
                address: self
                    .device
                    .identity()
                    .map(|identity| identity.address.to_string())
                    .unwrap_or_default(),
            },
            firmware: FirmwareIdentity {
                version: firmware.version_string(),
                date: firmware.date_string(),
            },
            wifi: WifiStatus {
                connect: counters.wifi_connect,
                address: self
                    .device
                    .uplink_addr()
                    .map(|addr| addr.to_string())
                    .unwrap_or_else(|| "0.0.0.0".to_string()),
                ssid: ap.as_ref().map(|ap| ap.ssid.clone()).unwrap_or_default(),
                rssi: ap.map(|ap| ap.rssi).unwrap_or_default(),
            },
            mqtt: BrokerStatus {
                connect: counters.broker_connect,
            },
            mem: MemoryStatus {
                heap: self.system.free_heap(),
            },
        }
    }
}

/// Handle broker events until the client goes away: track the session,
/// resubscribe on every connect, route inbound messages.
async fn serve_broker_events<S: System, B: BrokerClient>(
    mut events: mpsc::UnboundedReceiver<BrokerEvent>,
    client: Arc<B>,
    link: BrokerLink,
    topics: Topics,
    router: InboundRouter<S>,
) {
    while let Some(event) = events.recv().await {
        match event {
            BrokerEvent::Connected => {
                let n = router.device.record_broker_connect();
                info!("uplink: broker connected ({})", n);
                for topic in [topics.control(), topics.control_group()] {
                    if let Err(e) = client.subscribe(topic) {
                        error!("uplink: subscribe to {} failed: {}", topic, e);
                    }
                }
                link.set_connected(true);
            }
            BrokerEvent::Disconnected => {
                if link.is_connected() {
                    warn!("uplink: broker disconnected");
                }
                link.set_connected(false);
            }
            BrokerEvent::Message(message) => {
                router.route(&message).await;
            }
        }
    }
    debug!("uplink: broker event source closed");
}

/// The uplink task.
pub struct Uplink<S, C> {
    pub connector: C,
    pub system: Arc<S>,
    pub device: Arc<DeviceRecord>,
    pub broker_url: Option<String>,
    pub roots: TopicRoots,
    pub controller: Outbox<ControllerMessage>,
    pub forwarder: Outbox<ForwarderMessage>,
}

impl<S: System, C: BrokerConnector> Uplink<S, C> {
    /// Wait for the device identity, connect, then forward until the
    /// forwarder mailbox closes.
    ///
    /// Without a broker URL the task logs and returns `Ok`: nothing else
    /// on the node depends on it.
    pub async fn run(self, mut inbox: Inbox<ForwarderMessage>) -> Result<()> {
        let name = wait_device_ready(&mut inbox).await?;
        let topics = Topics::new(&self.roots, &name);

        let Some(url) = self.broker_url.as_deref().filter(|url| !url.is_empty()) else {
            error!("uplink: broker not provisioned");
            return Ok(());
        };

        let (sink, events) = BrokerEventSink::channel();
        let client = Arc::new(self.connector.connect(url, &name, sink)?);
        let link = BrokerLink::new();
        let router = InboundRouter::new(
            self.system,
            self.device,
            self.controller,
            self.forwarder,
        );
        let events_task = tokio::spawn(serve_broker_events(
            events,
            client.clone(),
            link.clone(),
            topics.clone(),
            router,
        ));

        info!("uplink: waiting for broker at {}", url);
        link.wait_connected().await;

        let result = loop {
            match inbox.receive(POLL_INTERVAL).await {
                Ok(message) => publish(client.as_ref(), &topics, &message),
                Err(RecvError::Timeout) => {
                    if events_task.is_finished() {
                        break Err(Error::TaskExited("broker events"));
                    }
                }
                Err(RecvError::Closed) => {
                    info!("uplink: forwarder mailbox closed");
                    break Ok(());
                }
            }
        };
        events_task.abort();
        result
    }
}

async fn wait_device_ready(inbox: &mut Inbox<ForwarderMessage>) -> Result<String> {
    loop {
        match inbox.receive(POLL_INTERVAL).await {
            Ok(ForwarderMessage::DeviceReady { name }) => return Ok(name),
            Ok(other) => warn!("uplink: dropping {:?} before device ready", other.kind()),
            Err(RecvError::Timeout) => continue,
            Err(RecvError::Closed) => return Err(Error::MailboxClosed(inbox.name())),
        }
    }
}

/// Publish one message. Failures are logged; the client owns delivery.
fn publish<B: BrokerClient + ?Sized>(client: &B, topics: &Topics, message: &ForwarderMessage) {
    let topic = topics.data(message.kind());
    let payload = match message.encode() {
        Ok(payload) => payload,
        Err(e) => {
            error!("uplink: cannot encode {:?}: {}", message.kind(), e);
            return;
        }
    };
    if let Err(e) = client.publish(&topic, &payload) {
        warn!("uplink: publish to {} failed: {}", topic, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{BdAddr, Identity};
    use crate::mailbox::mailbox;
    use crate::platform::sim::{SimBroker, SimSystem};
    use crate::platform::AccessPoint;
    use crate::version::FirmwareInfo;
    use common::{ModeAck, RadioMode};
    use std::net::Ipv4Addr;

    fn firmware() -> FirmwareInfo {
        FirmwareInfo {
            project: "beacon-relay".into(),
            version: "0.1.0".into(),
            date: "2024-05-01".into(),
            time: "08:30:00".into(),
        }
    }

    struct Harness {
        system: Arc<SimSystem>,
        device: Arc<DeviceRecord>,
        router: InboundRouter<SimSystem>,
        ctrl_rx: Inbox<ControllerMessage>,
        fwd_rx: Inbox<ForwarderMessage>,
    }

    fn harness() -> Harness {
        let system = Arc::new(SimSystem::new(firmware()));
        let device = Arc::new(DeviceRecord::new());
        let (ctrl_tx, ctrl_rx) = mailbox("controller");
        let (fwd_tx, fwd_rx) = mailbox("forwarder");
        let router = InboundRouter::new(system.clone(), device.clone(), ctrl_tx, fwd_tx);
        Harness {
            system,
            device,
            router,
            ctrl_rx,
            fwd_rx,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_who_is_answered_not_forwarded() {
        let mut h = harness();
        let route = h
            .router
            .route(&InboundMessage::complete("blescan/ctrl", "who"))
            .await;
        assert_eq!(route, Route::Identity);
        assert!(matches!(
            h.fwd_rx.receive(POLL_INTERVAL).await,
            Ok(ForwarderMessage::Who(_))
        ));
        assert_eq!(h.ctrl_rx.receive(POLL_INTERVAL).await, Err(RecvError::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_text_reaches_controller_verbatim() {
        let mut h = harness();
        let route = h
            .router
            .route(&InboundMessage::complete("blescan/ctrl/x", "foo bar"))
            .await;
        assert_eq!(route, Route::Control);
        assert_eq!(
            h.ctrl_rx.receive(POLL_INTERVAL).await,
            Ok(ControllerMessage::Control("foo bar".into()))
        );

        // only exact matches are handled here
        h.router
            .route(&InboundMessage::complete("blescan/ctrl/x", "who "))
            .await;
        assert_eq!(
            h.ctrl_rx.receive(POLL_INTERVAL).await,
            Ok(ControllerMessage::Control("who ".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_message_is_ignored() {
        let mut h = harness();
        let chunk = InboundMessage {
            topic: "blescan/ctrl".into(),
            data: b"sca".to_vec(),
            total_len: 4,
        };
        assert_eq!(h.router.route(&chunk).await, Route::Ignored);
        assert_eq!(h.ctrl_rx.receive(POLL_INTERVAL).await, Err(RecvError::Timeout));
        assert_eq!(h.fwd_rx.receive(POLL_INTERVAL).await, Err(RecvError::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_acks_then_restarts() {
        let mut h = harness();
        let start = tokio::time::Instant::now();
        let route = h
            .router
            .route(&InboundMessage::complete("blescan/ctrl", "restart"))
            .await;
        assert_eq!(route, Route::Restart);
        assert!(start.elapsed() >= RESTART_DELAY);
        assert_eq!(h.system.restarts(), 1);
        assert_eq!(
            h.fwd_rx.receive(POLL_INTERVAL).await,
            Ok(ForwarderMessage::Restart(RestartAck::restarting()))
        );
    }

    #[test]
    fn test_identity_report() {
        let h = harness();
        h.device.set_identity(Identity {
            address: BdAddr::new([0xac, 0x67, 0xb2, 0x53, 0x82, 0x8a]),
            name: "esp32-3".into(),
        });
        h.device.set_uplink_addr(Ipv4Addr::new(10, 0, 0, 7));
        h.device.record_wifi_connect();
        h.device.record_broker_connect();
        h.device.record_broker_connect();
        h.system.set_free_heap(180_000);
        h.system.set_access_point(Some(AccessPoint {
            ssid: "lab".into(),
            rssi: -61,
        }));

        let report = h.router.identity_report();
        assert_eq!(report.ble.name, "esp32-3");
        assert_eq!(report.ble.address, "ac:67:b2:53:82:8a");
        assert_eq!(report.firmware.version, "beacon-relay.0.1.0");
        assert_eq!(report.firmware.date, "2024-05-01 08:30:00");
        assert_eq!(report.wifi.connect, 1);
        assert_eq!(report.wifi.address, "10.0.0.7");
        assert_eq!(report.wifi.ssid, "lab");
        assert_eq!(report.wifi.rssi, -61);
        assert_eq!(report.mqtt.connect, 2);
        assert_eq!(report.mem.heap, 180_000);
    }

    #[test]
    fn test_identity_report_before_anything_is_known() {
        let report = harness().router.identity_report();
        assert_eq!(report.ble.name, "");
        assert_eq!(report.wifi.address, "0.0.0.0");
        assert_eq!(report.wifi.ssid, "");
    }

    fn uplink(
        broker: &SimBroker,
        url: Option<&str>,
    ) -> (
        Uplink<SimSystem, SimBroker>,
        Outbox<ForwarderMessage>,
        Inbox<ForwarderMessage>,
        Inbox<ControllerMessage>,
    ) {
        let (ctrl_tx, ctrl_rx) = mailbox("controller");
        let (fwd_tx, fwd_rx) = mailbox("forwarder");
        let uplink = Uplink {
            connector: broker.clone(),
            system: Arc::new(SimSystem::new(firmware())),
            device: Arc::new(DeviceRecord::new()),
            broker_url: url.map(str::to_string),
            roots: TopicRoots::default(),
            controller: ctrl_tx,
            forwarder: fwd_tx.clone(),
        };
        (uplink, fwd_tx, fwd_rx, ctrl_rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_provisioned_retires_quietly() {
        let broker = SimBroker::new();
        let (uplink, fwd_tx, fwd_rx, _ctrl_rx) = uplink(&broker, None);
        fwd_tx
            .send(ForwarderMessage::DeviceReady {
                name: "esp32-3".into(),
            })
            .unwrap();
        uplink.run(fwd_rx).await.unwrap();
        assert!(broker.log().urls.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_forwarder_closed_before_ready() {
        let (fwd_tx, mut fwd_rx) = mailbox::<ForwarderMessage>("forwarder");
        fwd_tx.send(ForwarderMessage::Debug("noise".into())).unwrap();
        drop(fwd_tx);
        let result = wait_device_ready(&mut fwd_rx).await;
        assert!(matches!(result, Err(Error::MailboxClosed("forwarder"))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_publishes_and_resubscribes() {
        let broker = SimBroker::new();
        let (uplink, fwd_tx, fwd_rx, mut ctrl_rx) = uplink(&broker, Some("mqtt://broker:1883"));
        let device = uplink.device.clone();
        tokio::spawn(uplink.run(fwd_rx));

        // early traffic is dropped until the device is known
        fwd_tx.send(ForwarderMessage::Debug("early".into())).unwrap();
        fwd_tx
            .send(ForwarderMessage::DeviceReady {
                name: "esp32-3".into(),
            })
            .unwrap();

        broker
            .wait_until(|log| log.subscriptions.len() == 2)
            .await;
        assert_eq!(
            broker.log().subscriptions,
            vec!["blescan/ctrl/esp32-3", "blescan/ctrl"]
        );
        assert_eq!(broker.log().urls, vec!["mqtt://broker:1883"]);

        fwd_tx
            .send(ForwarderMessage::Mode(ModeAck::new(RadioMode::Scanning, 100)))
            .unwrap();
        fwd_tx.send(ForwarderMessage::Debug("hello".into())).unwrap();
        broker.wait_until(|log| log.published.len() == 2).await;
        let log = broker.log();
        assert_eq!(
            log.texts("blescan/data/mode/esp32-3"),
            vec![r#"{"response":{"mode":"scan","interval":100}}"#]
        );
        assert_eq!(log.texts("blescan/data/dbg/esp32-3"), vec!["hello"]);
        assert!(log.texts("blescan/data/dbg/esp32-3").iter().all(|t| t != "early"));

        // a session loss and reconnect subscribes again
        broker.inject(BrokerEvent::Disconnected);
        broker.inject(BrokerEvent::Connected);
        broker
            .wait_until(|log| log.subscriptions.len() == 4)
            .await;
        assert_eq!(device.counters().broker_connect, 2);

        broker.inject(BrokerEvent::Message(InboundMessage::complete(
            "blescan/ctrl/esp32-3",
            "scan",
        )));
        assert_eq!(
            ctrl_rx.receive(POLL_INTERVAL).await,
            Ok(ControllerMessage::Control("scan".into()))
        );
    }
}
