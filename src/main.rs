use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use beacon_relay::config::Config;
use beacon_relay::logging;
use beacon_relay::node::{self, Platform};
use beacon_relay::platform::sim::{SimBroker, SimLink, SimRadio, SimSystem};
use beacon_relay::platform::AccessPoint;
use beacon_relay::radio::ibeacon::Beacon;
use beacon_relay::uplink::rumqtt::MqttConnector;
use beacon_relay::version::FirmwareInfo;
use beacon_relay::wifi::Credentials;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.ron".to_string());
    let config = Config::load(&path).with_context(|| format!("loading {}", path))?;
    logging::init(&config.log_level);

    let firmware = FirmwareInfo::current();
    info!(
        "{} built {}",
        firmware.version_string(),
        firmware.date_string()
    );

    // Host-side drivers
    let sim = &config.simulation;
    let radio = Arc::new(SimRadio::new(sim.address));
    let peers = sim
        .peers
        .iter()
        .enumerate()
        .map(|(i, address)| {
            let beacon = Beacon {
                minor: i as u16,
                ..config.radio.beacon
            };
            (*address, beacon)
        })
        .collect();
    let _beacons = radio.spawn_beacons(peers, Duration::from_millis(sim.beacon_period_ms.max(1)));

    let link = Arc::new(SimLink::new(sim.ip).with_stored(Credentials::new(sim.ssid.clone(), "")));
    let system = SimSystem::new(firmware).exit_on_restart();
    system.set_free_heap(sim.free_heap);
    system.set_access_point(Some(AccessPoint {
        ssid: sim.ssid.clone(),
        rssi: sim.rssi,
    }));

    let platform = Platform {
        radio,
        link,
        system: Arc::new(system),
    };

    match config.broker_url.as_deref() {
        Some(url) if url.starts_with("sim://") => {
            node::run(&config, platform, SimBroker::new()).await?
        }
        _ => node::run(&config, platform, MqttConnector).await?,
    }
    Ok(())
}
