//! Wires the supervisor, controller and forwarder into one node.

use std::future::Future;
use std::net::Ipv4Addr;
use std::sync::Arc;

use log::{error, info, warn};
use tokio::task::JoinSet;

use crate::config::Config;
use crate::device::DeviceRecord;
use crate::error::{Error, Result};
use crate::mailbox::MailboxBus;
use crate::platform::{LinkDriver, RadioDriver, System};
use crate::radio::radio_task;
use crate::uplink::broker::BrokerConnector;
use crate::uplink::Uplink;
use crate::wifi::{LinkObserver, Reconnect, WifiSupervisor};

/// Keeps the device record's link counters and address current.
pub struct LinkCounters {
    device: Arc<DeviceRecord>,
}

impl LinkCounters {
    pub fn new(device: Arc<DeviceRecord>) -> Self {
        Self { device }
    }
}

impl LinkObserver for LinkCounters {
    fn on_connect(&self, ip: Ipv4Addr) {
        self.device.set_uplink_addr(ip);
        let n = self.device.record_wifi_connect();
        info!("node: wifi up as {} (connect #{})", ip, n);
    }

    fn on_disconnect(&self, auth_failed: bool) -> Reconnect {
        if auth_failed {
            self.device.record_auth_failure();
        }
        let counters = self.device.counters();
        warn!(
            "node: wifi down, connects {}, auth failures {}",
            counters.wifi_connect, counters.auth_failure
        );
        Reconnect::Retry
    }
}

/// The drivers a node runs on.
pub struct Platform<R, L, S> {
    pub radio: Arc<R>,
    pub link: Arc<L>,
    pub system: Arc<S>,
}

async fn named(
    name: &'static str,
    task: impl Future<Output = Result<()>>,
) -> (&'static str, Result<()>) {
    (name, task.await)
}

/// Run a node until a task fails.
///
/// WiFi comes up first and startup blocks until it is connected; a missing
/// WiFi provisioning aborts startup. Then the radio and uplink tasks start.
/// A task that finishes cleanly is retired; one that fails takes the node
/// down with it.
pub async fn run<R, L, S, C>(
    config: &Config,
    platform: Platform<R, L, S>,
    connector: C,
) -> Result<()>
where
    R: RadioDriver,
    L: LinkDriver,
    S: System,
    C: BrokerConnector,
{
    let device = Arc::new(DeviceRecord::new());
    let mut tasks = JoinSet::new();

    let observer = Arc::new(LinkCounters::new(device.clone()));
    let (wifi, dispatcher) =
        WifiSupervisor::initialize(platform.link.clone(), observer, config.wifi_backoff())?;
    tasks.spawn(named("wifi", async move {
        dispatcher.run().await;
        Ok(())
    }));

    tokio::select! {
        started = wifi.start(config.wifi.as_ref()) => started?,
        Some(joined) = tasks.join_next() => {
            let (name, result) = joined?;
            result?;
            return Err(Error::TaskExited(name));
        }
    }

    let MailboxBus {
        controller: (ctrl_tx, ctrl_rx),
        forwarder: (fwd_tx, fwd_rx),
    } = MailboxBus::new();

    tasks.spawn(named(
        "radio",
        radio_task(
            platform.radio.clone(),
            device.clone(),
            config.radio_settings(),
            ctrl_rx,
            fwd_tx.clone(),
        ),
    ));

    // held so the radio keeps serving even if the uplink retires
    let _controller = ctrl_tx.clone();
    let uplink = Uplink {
        connector,
        system: platform.system.clone(),
        device: device.clone(),
        broker_url: config.broker_url.clone(),
        roots: config.topics.clone(),
        controller: ctrl_tx,
        forwarder: fwd_tx,
    };
    tasks.spawn(named("uplink", uplink.run(fwd_rx)));

    while let Some(joined) = tasks.join_next().await {
        let (name, result) = joined?;
        match result {
            Ok(()) => info!("node: {} task finished", name),
            Err(e) => {
                error!("node: {} task failed: {}", name, e);
                tasks.abort_all();
                return Err(e);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_counters() {
        let device = Arc::new(DeviceRecord::new());
        let observer = LinkCounters::new(device.clone());

        observer.on_connect(Ipv4Addr::new(10, 0, 0, 7));
        assert_eq!(observer.on_disconnect(true), Reconnect::Retry);
        assert_eq!(observer.on_disconnect(false), Reconnect::Retry);
        observer.on_connect(Ipv4Addr::new(10, 0, 0, 8));

        let counters = device.counters();
        assert_eq!(counters.wifi_connect, 2);
        assert_eq!(counters.auth_failure, 1);
        assert_eq!(device.uplink_addr(), Some(Ipv4Addr::new(10, 0, 0, 8)));
    }
}
