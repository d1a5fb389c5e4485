//! Radio event delivery.
//!
//! The driver calls [`GapEventHandler::on_gap_event`] from its own callback
//! context. The handler never suspends: confirms set a flag bit and scan
//! results go to the forwarder mailbox without waiting.

use std::sync::Arc;

use common::ScanReport;
use log::{debug, error};

use super::ibeacon::Beacon;
use super::names::device_name;
use crate::device::BdAddr;
use crate::mailbox::{ForwarderMessage, Outbox};
use crate::sync::EventFlags;

/// Completion of a radio primitive; each has its own flag bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Confirm {
    ScanParamSet,
    ScanStarted,
    ScanStopped,
    AdvDataSet,
    AdvStarted,
    AdvStopped,
}

impl Confirm {
    pub fn bit(self) -> u32 {
        match self {
            Confirm::ScanParamSet => 1 << 0,
            Confirm::ScanStarted => 1 << 1,
            Confirm::ScanStopped => 1 << 2,
            Confirm::AdvDataSet => 1 << 3,
            Confirm::AdvStarted => 1 << 4,
            Confirm::AdvStopped => 1 << 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapStatus {
    Success,
    Failed(i32),
}

/// A received advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub address: BdAddr,
    pub rssi: i8,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GapEvent {
    Completed(Confirm, GapStatus),
    ScanResult(Advertisement),
}

pub trait GapEventHandler: Send + Sync {
    fn on_gap_event(&self, event: GapEvent);
}

/// Handler the radio task registers with the driver.
pub struct GapDispatcher {
    confirms: Arc<EventFlags>,
    forwarder: Outbox<ForwarderMessage>,
}

impl GapDispatcher {
    pub fn new(confirms: Arc<EventFlags>, forwarder: Outbox<ForwarderMessage>) -> Self {
        Self {
            confirms,
            forwarder,
        }
    }

    fn on_advertisement(&self, adv: Advertisement) {
        let Some(beacon) = Beacon::parse(&adv.data) else {
            return;
        };
        let report = ScanReport {
            name: device_name(&adv.address),
            address: adv.address.to_string(),
            tx_power: beacon.measured_power as i32,
            rssi: adv.rssi as i32,
        };
        debug!("radio: beacon {} rssi {}", report.name, report.rssi);
        // a full mailbox has already been logged; the report is dropped
        let _ = self.forwarder.send(ForwarderMessage::Scan(report));
    }
}

impl GapEventHandler for GapDispatcher {
    fn on_gap_event(&self, event: GapEvent) {
        match event {
            GapEvent::Completed(confirm, GapStatus::Success) => self.confirms.set(confirm.bit()),
            GapEvent::Completed(confirm, GapStatus::Failed(code)) => {
                error!("radio: {:?} failed, status {}", confirm, code);
            }
            GapEvent::ScanResult(adv) => self.on_advertisement(adv),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::{mailbox, POLL_INTERVAL};

    #[test]
    fn test_confirm_bits_are_distinct() {
        let all = [
            Confirm::ScanParamSet,
            Confirm::ScanStarted,
            Confirm::ScanStopped,
            Confirm::AdvDataSet,
            Confirm::AdvStarted,
            Confirm::AdvStopped,
        ];
        let mask = all.iter().fold(0, |acc, c| {
            assert_eq!(acc & c.bit(), 0);
            acc | c.bit()
        });
        assert_eq!(mask.count_ones(), 6);
    }

    #[test]
    fn test_failed_confirm_does_not_set_bit() {
        let flags = Arc::new(EventFlags::new());
        let (tx, _rx) = mailbox("forwarder");
        let dispatcher = GapDispatcher::new(flags.clone(), tx);

        dispatcher.on_gap_event(GapEvent::Completed(Confirm::AdvStarted, GapStatus::Failed(3)));
        assert_eq!(flags.get(), 0);
        dispatcher.on_gap_event(GapEvent::Completed(Confirm::AdvStarted, GapStatus::Success));
        assert_eq!(flags.get(), Confirm::AdvStarted.bit());
    }

    #[tokio::test(start_paused = true)]
    async fn test_beacon_becomes_scan_report() {
        let (tx, mut rx) = mailbox("forwarder");
        let dispatcher = GapDispatcher::new(Arc::new(EventFlags::new()), tx);

        let address: BdAddr = "8c:aa:b5:85:0a:7e".parse().unwrap();
        dispatcher.on_gap_event(GapEvent::ScanResult(Advertisement {
            address,
            rssi: -70,
            data: vec![0x02, 0x01, 0x06],
        }));
        dispatcher.on_gap_event(GapEvent::ScanResult(Advertisement {
            address,
            rssi: -70,
            data: Beacon::default().encode().to_vec(),
        }));

        let message = rx.receive(POLL_INTERVAL).await.unwrap();
        assert_eq!(
            message,
            ForwarderMessage::Scan(ScanReport {
                name: "esp32-11".into(),
                address: "8c:aa:b5:85:0a:7e".into(),
                tx_power: -59,
                rssi: -70,
            })
        );
        // the non-beacon advertisement produced nothing
        assert!(rx.receive(POLL_INTERVAL).await.is_err());
    }
}
