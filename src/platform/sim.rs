//! Host-side drivers.
//!
//! They record every request so tests can check ordering, and they behave
//! enough like hardware for the node binary to run on a workstation.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info};
use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{AccessPoint, LinkDriver, PlatformError, PlatformResult, RadioDriver, System};
use crate::device::BdAddr;
use crate::radio::gap::{Advertisement, Confirm, GapEvent, GapEventHandler, GapStatus};
use crate::radio::ibeacon::Beacon;
use crate::radio::interval::{AdvParams, ScanParams};
use crate::sync::lock;
use crate::uplink::broker::{BrokerClient, BrokerConnector, BrokerError, BrokerEvent, BrokerEventSink};
use crate::version::FirmwareInfo;
use crate::wifi::{Credentials, LinkEvent, LinkEventSink};

/// A request made to the simulated radio, or a confirm it delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCall {
    Init,
    SetScanParams(ScanParams),
    StartScanning,
    StopScanning,
    SetAdvData(Vec<u8>),
    StartAdvertising(AdvParams),
    StopAdvertising,
    Completed(Confirm),
}

/// When the simulated radio confirms a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmPolicy {
    /// From inside the request call.
    Immediate,
    /// From a separate task after the delay.
    After(Duration),
    /// Never; the requester waits forever.
    Never,
}

pub struct SimRadio {
    address: BdAddr,
    policy: Mutex<ConfirmPolicy>,
    handler: Mutex<Option<Arc<dyn GapEventHandler>>>,
    calls: Arc<watch::Sender<Vec<RadioCall>>>,
    rejected: Mutex<HashMap<&'static str, i32>>,
    scanning: AtomicBool,
}

impl SimRadio {
    pub fn new(address: BdAddr) -> Self {
        let (calls, _) = watch::channel(Vec::new());
        Self {
            address,
            policy: Mutex::new(ConfirmPolicy::Immediate),
            handler: Mutex::new(None),
            calls: Arc::new(calls),
            rejected: Mutex::new(HashMap::new()),
            scanning: AtomicBool::new(false),
        }
    }

    pub fn set_policy(&self, policy: ConfirmPolicy) {
        *lock(&self.policy) = policy;
    }

    /// Make every future `op` request fail with `code`.
    pub fn reject(&self, op: &'static str, code: i32) {
        lock(&self.rejected).insert(op, code);
    }

    pub fn calls(&self) -> Vec<RadioCall> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.send_modify(|calls| calls.clear());
    }

    /// Wait until the call log satisfies `pred`.
    pub async fn wait_for_calls(&self, pred: impl FnMut(&Vec<RadioCall>) -> bool) {
        let mut rx = self.calls.subscribe();
        let _ = rx.wait_for(pred).await;
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }

    /// Deliver an advertisement as if it was heard over the air. Dropped
    /// unless scanning.
    pub fn inject_advertisement(&self, adv: Advertisement) -> bool {
        if !self.is_scanning() {
            return false;
        }
        match self.handler() {
            Some(handler) => {
                handler.on_gap_event(GapEvent::ScanResult(adv));
                true
            }
            None => false,
        }
    }

    /// Periodically hear one of `peers` with a jittered RSSI while scanning.
    pub fn spawn_beacons(
        self: &Arc<Self>,
        peers: Vec<(BdAddr, Beacon)>,
        period: Duration,
    ) -> JoinHandle<()> {
        let radio = Arc::clone(self);
        tokio::spawn(async move {
            if peers.is_empty() {
                return;
            }
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let (address, beacon, rssi) = {
                    let mut rng = rand::thread_rng();
                    let (address, beacon) = peers[rng.gen_range(0..peers.len())];
                    (address, beacon, rng.gen_range(-90..=-40))
                };
                radio.inject_advertisement(Advertisement {
                    address,
                    rssi,
                    data: beacon.encode().to_vec(),
                });
            }
        })
    }

    fn handler(&self) -> Option<Arc<dyn GapEventHandler>> {
        lock(&self.handler).clone()
    }

    fn record(&self, call: RadioCall) {
        self.calls.send_modify(|calls| calls.push(call));
    }

    fn check(&self, op: &'static str) -> PlatformResult<()> {
        match lock(&self.rejected).get(op) {
            Some(code) => Err(PlatformError::new(op, *code)),
            None => Ok(()),
        }
    }

    fn request(&self, op: &'static str, call: RadioCall, confirm: Confirm) -> PlatformResult<()> {
        self.check(op)?;
        self.record(call);
        let policy = *lock(&self.policy);
        match policy {
            ConfirmPolicy::Immediate => self.confirm(confirm),
            ConfirmPolicy::After(delay) => {
                let handler = self.handler();
                let calls = Arc::clone(&self.calls);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    calls.send_modify(|calls| calls.push(RadioCall::Completed(confirm)));
                    if let Some(handler) = handler {
                        handler.on_gap_event(GapEvent::Completed(confirm, GapStatus::Success));
                    }
                });
            }
            ConfirmPolicy::Never => {}
        }
        Ok(())
    }

    fn confirm(&self, confirm: Confirm) {
        self.record(RadioCall::Completed(confirm));
        if let Some(handler) = self.handler() {
            handler.on_gap_event(GapEvent::Completed(confirm, GapStatus::Success));
        }
    }
}

impl RadioDriver for SimRadio {
    fn init(&self, handler: Arc<dyn GapEventHandler>) -> PlatformResult<BdAddr> {
        self.check("init")?;
        *lock(&self.handler) = Some(handler);
        self.record(RadioCall::Init);
        info!("sim radio: up as {}", self.address);
        Ok(self.address)
    }

    fn set_scan_params(&self, params: &ScanParams) -> PlatformResult<()> {
        self.request(
            "set_scan_params",
            RadioCall::SetScanParams(*params),
            Confirm::ScanParamSet,
        )
    }

    fn start_scanning(&self) -> PlatformResult<()> {
        self.request("start_scanning", RadioCall::StartScanning, Confirm::ScanStarted)?;
        self.scanning.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop_scanning(&self) -> PlatformResult<()> {
        self.scanning.store(false, Ordering::SeqCst);
        self.request("stop_scanning", RadioCall::StopScanning, Confirm::ScanStopped)
    }

    fn set_adv_data(&self, data: &[u8]) -> PlatformResult<()> {
        self.request(
            "set_adv_data",
            RadioCall::SetAdvData(data.to_vec()),
            Confirm::AdvDataSet,
        )
    }

    fn start_advertising(&self, params: &AdvParams) -> PlatformResult<()> {
        self.request(
            "start_advertising",
            RadioCall::StartAdvertising(*params),
            Confirm::AdvStarted,
        )
    }

    fn stop_advertising(&self) -> PlatformResult<()> {
        self.request(
            "stop_advertising",
            RadioCall::StopAdvertising,
            Confirm::AdvStopped,
        )
    }
}

/// Simulated WiFi station.
pub struct SimLink {
    ip: Ipv4Addr,
    stored: Mutex<Option<Credentials>>,
    sink: Mutex<Option<LinkEventSink>>,
    auto_connect: AtomicBool,
    starts: AtomicU32,
    connects: AtomicU32,
}

impl SimLink {
    /// A station that gets `ip` on every connect.
    pub fn new(ip: Ipv4Addr) -> Self {
        Self {
            ip,
            stored: Mutex::new(None),
            sink: Mutex::new(None),
            auto_connect: AtomicBool::new(true),
            starts: AtomicU32::new(0),
            connects: AtomicU32::new(0),
        }
    }

    /// Pretend an earlier provisioning persisted `credentials`.
    pub fn with_stored(self, credentials: Credentials) -> Self {
        *lock(&self.stored) = Some(credentials);
        self
    }

    /// When off, connects are only counted; events must be injected.
    pub fn set_auto_connect(&self, on: bool) {
        self.auto_connect.store(on, Ordering::SeqCst);
    }

    pub fn inject(&self, event: LinkEvent) {
        if let Some(sink) = lock(&self.sink).as_ref() {
            sink.post(event);
        }
    }

    pub fn starts(&self) -> u32 {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn connect_requests(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }
}

impl LinkDriver for SimLink {
    fn register(&self, sink: LinkEventSink) -> PlatformResult<()> {
        *lock(&self.sink) = Some(sink);
        Ok(())
    }

    fn set_credentials(&self, credentials: &Credentials) -> PlatformResult<()> {
        *lock(&self.stored) = Some(credentials.clone());
        Ok(())
    }

    fn credentials(&self) -> Option<Credentials> {
        lock(&self.stored).clone()
    }

    fn start(&self) -> PlatformResult<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.inject(LinkEvent::StationStarted);
        Ok(())
    }

    fn connect(&self) -> PlatformResult<()> {
        let n = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("sim link: connect request #{}", n);
        if self.auto_connect.load(Ordering::SeqCst) {
            self.inject(LinkEvent::GotIp(self.ip));
        }
        Ok(())
    }
}

pub struct SimSystem {
    firmware: FirmwareInfo,
    heap: AtomicU32,
    access_point: Mutex<Option<AccessPoint>>,
    restarts: AtomicU32,
    exit_on_restart: bool,
}

impl SimSystem {
    pub fn new(firmware: FirmwareInfo) -> Self {
        Self {
            firmware,
            heap: AtomicU32::new(0),
            access_point: Mutex::new(None),
            restarts: AtomicU32::new(0),
            exit_on_restart: false,
        }
    }

    /// End the process on restart, for the node binary.
    pub fn exit_on_restart(mut self) -> Self {
        self.exit_on_restart = true;
        self
    }

    pub fn set_free_heap(&self, bytes: u32) {
        self.heap.store(bytes, Ordering::SeqCst);
    }

    pub fn set_access_point(&self, ap: Option<AccessPoint>) {
        *lock(&self.access_point) = ap;
    }

    pub fn restarts(&self) -> u32 {
        self.restarts.load(Ordering::SeqCst)
    }
}

impl System for SimSystem {
    fn firmware(&self) -> FirmwareInfo {
        self.firmware.clone()
    }

    fn free_heap(&self) -> u32 {
        self.heap.load(Ordering::SeqCst)
    }

    fn access_point(&self) -> Option<AccessPoint> {
        lock(&self.access_point).clone()
    }

    fn restart(&self) {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        info!("sim system: restart requested");
        if self.exit_on_restart {
            std::process::exit(0);
        }
    }
}

/// Everything the simulated broker has been asked to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrokerLog {
    pub urls: Vec<String>,
    pub subscriptions: Vec<String>,
    pub published: Vec<(String, Vec<u8>)>,
}

impl BrokerLog {
    /// Payloads published to `topic`, as text.
    pub fn texts(&self, topic: &str) -> Vec<String> {
        self.published
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, payload)| String::from_utf8_lossy(payload).into_owned())
            .collect()
    }
}

struct SimBrokerInner {
    log: watch::Sender<BrokerLog>,
    sink: Mutex<Option<BrokerEventSink>>,
    auto_connect: AtomicBool,
}

/// In-process broker. Cloning shares the same log and session.
#[derive(Clone)]
pub struct SimBroker {
    inner: Arc<SimBrokerInner>,
}

impl SimBroker {
    pub fn new() -> Self {
        let (log, _) = watch::channel(BrokerLog::default());
        Self {
            inner: Arc::new(SimBrokerInner {
                log,
                sink: Mutex::new(None),
                auto_connect: AtomicBool::new(true),
            }),
        }
    }

    /// When off, `Connected` must be injected.
    pub fn set_auto_connect(&self, on: bool) {
        self.inner.auto_connect.store(on, Ordering::SeqCst);
    }

    pub fn log(&self) -> BrokerLog {
        self.inner.log.borrow().clone()
    }

    pub async fn wait_until(&self, pred: impl FnMut(&BrokerLog) -> bool) {
        let mut rx = self.inner.log.subscribe();
        let _ = rx.wait_for(pred).await;
    }

    pub fn inject(&self, event: BrokerEvent) {
        if let Some(sink) = lock(&self.inner.sink).as_ref() {
            sink.post(event);
        }
    }
}

impl Default for SimBroker {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SimBrokerClient {
    inner: Arc<SimBrokerInner>,
}

impl BrokerConnector for SimBroker {
    type Client = SimBrokerClient;

    fn connect(
        &self,
        url: &str,
        client_id: &str,
        events: BrokerEventSink,
    ) -> Result<SimBrokerClient, BrokerError> {
        info!("sim broker: {} connecting to {}", client_id, url);
        self.inner
            .log
            .send_modify(|log| log.urls.push(url.to_string()));
        if self.inner.auto_connect.load(Ordering::SeqCst) {
            events.post(BrokerEvent::Connected);
        }
        *lock(&self.inner.sink) = Some(events);
        Ok(SimBrokerClient {
            inner: Arc::clone(&self.inner),
        })
    }
}

impl BrokerClient for SimBrokerClient {
    fn subscribe(&self, topic: &str) -> Result<(), BrokerError> {
        self.inner
            .log
            .send_modify(|log| log.subscriptions.push(topic.to_string()));
        Ok(())
    }

    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        info!(
            "sim broker: {} <- {}",
            topic,
            String::from_utf8_lossy(payload)
        );
        self.inner
            .log
            .send_modify(|log| log.published.push((topic.to_string(), payload.to_vec())));
        Ok(())
    }
}
