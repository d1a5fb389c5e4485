//! Radio mode controller.
//!
//! Scanning and advertising are mutually exclusive. A transition always
//! stops the active function and waits for the driver to confirm before the
//! next one is started, and a transition runs to completion before the next
//! command is read.

pub mod command;
pub mod gap;
pub mod ibeacon;
pub mod interval;
pub mod names;

use std::sync::Arc;

use common::{ModeAck, RadioMode};
use log::{debug, info, warn};

use self::command::Command;
use self::gap::{Confirm, GapDispatcher};
use self::ibeacon::{Beacon, FRAME_LEN};
use self::interval::AdvInterval;
use crate::device::{DeviceRecord, Identity};
use crate::error::{Error, Result};
use crate::mailbox::{
    ControllerMessage, ForwarderMessage, Inbox, Outbox, RecvError, POLL_INTERVAL,
};
use crate::platform::{PlatformResult, RadioDriver};
use crate::sync::EventFlags;

/// Drives the radio between modes, one confirmed step at a time.
pub struct ModeSwitch<R> {
    radio: Arc<R>,
    confirms: Arc<EventFlags>,
    adv_data: [u8; FRAME_LEN],
}

impl<R: RadioDriver> ModeSwitch<R> {
    /// `confirms` must be the flag set the driver's event handler raises.
    pub fn new(radio: Arc<R>, confirms: Arc<EventFlags>, beacon: &Beacon) -> Self {
        Self {
            radio,
            confirms,
            adv_data: beacon.encode(),
        }
    }

    /// Move from `current` to `requested` and return the mode now active.
    ///
    /// Asking for the current mode does nothing. Confirm waits have no
    /// timeout: a driver that never confirms stalls the caller.
    pub async fn set_mode(
        &self,
        current: RadioMode,
        requested: RadioMode,
        interval: AdvInterval,
    ) -> Result<RadioMode> {
        if requested == current {
            return Ok(current);
        }

        match current {
            RadioMode::Advertising => {
                self.confirmed(Confirm::AdvStopped, |radio| radio.stop_advertising())
                    .await?
            }
            RadioMode::Scanning => {
                self.confirmed(Confirm::ScanStopped, |radio| radio.stop_scanning())
                    .await?
            }
            RadioMode::Idle => {}
        }

        match requested {
            RadioMode::Scanning => {
                let params = interval.scan_params();
                self.confirmed(Confirm::ScanParamSet, |radio| radio.set_scan_params(&params))
                    .await?;
                self.confirmed(Confirm::ScanStarted, |radio| radio.start_scanning())
                    .await?;
            }
            RadioMode::Advertising => {
                let params = interval.adv_params();
                self.confirmed(Confirm::AdvDataSet, |radio| radio.set_adv_data(&self.adv_data))
                    .await?;
                self.confirmed(Confirm::AdvStarted, |radio| radio.start_advertising(&params))
                    .await?;
            }
            RadioMode::Idle => {}
        }

        debug!("radio: {} -> {}", current, requested);
        Ok(requested)
    }

    /// Issue `request` and wait for its confirm. The bit is cleared first so
    /// a stale confirm from an earlier request is not taken for this one.
    async fn confirmed(
        &self,
        confirm: Confirm,
        request: impl FnOnce(&R) -> PlatformResult<()>,
    ) -> Result<()> {
        self.confirms.clear(confirm.bit());
        request(&self.radio)?;
        self.confirms.wait_any(confirm.bit()).await;
        Ok(())
    }
}

/// Mode state plus the command handling on top of [`ModeSwitch`].
pub struct RadioController<R> {
    switch: ModeSwitch<R>,
    mode: RadioMode,
    interval: AdvInterval,
    forwarder: Outbox<ForwarderMessage>,
}

impl<R: RadioDriver> RadioController<R> {
    pub fn new(
        switch: ModeSwitch<R>,
        interval: AdvInterval,
        forwarder: Outbox<ForwarderMessage>,
    ) -> Self {
        Self {
            switch,
            mode: RadioMode::Idle,
            interval,
            forwarder,
        }
    }

    pub fn mode(&self) -> RadioMode {
        self.mode
    }

    pub fn interval(&self) -> AdvInterval {
        self.interval
    }

    pub async fn apply(&mut self, requested: RadioMode) -> Result<()> {
        self.mode = self
            .switch
            .set_mode(self.mode, requested, self.interval)
            .await?;
        Ok(())
    }

    /// Act on one control text, then acknowledge with the resulting state.
    /// Text that is not a command changes nothing but is still acknowledged.
    pub async fn handle_command(&mut self, text: &str) -> Result<()> {
        match command::parse(text) {
            Some(Command::SetMode(mode)) => self.apply(mode).await?,
            Some(Command::SetInterval(interval)) => {
                self.interval = interval;
                // bounce through idle so the new timing takes effect
                let previous = self.mode;
                self.apply(RadioMode::Idle).await?;
                self.apply(previous).await?;
            }
            None => debug!("radio: ignoring {:?}", text),
        }

        info!("radio: mode {} interval {} ms", self.mode, self.interval.as_ms());
        let ack = ModeAck::new(self.mode, self.interval.as_ms());
        let _ = self.forwarder.send(ForwarderMessage::Mode(ack));
        Ok(())
    }
}

/// How the radio comes up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioSettings {
    pub startup_mode: RadioMode,
    pub interval: AdvInterval,
    pub beacon: Beacon,
}

impl Default for RadioSettings {
    fn default() -> Self {
        Self {
            startup_mode: RadioMode::Advertising,
            interval: AdvInterval::default(),
            beacon: Beacon::default(),
        }
    }
}

/// The radio task.
///
/// Brings the radio up, publishes the device identity, enters the startup
/// mode and then serves control commands until the controller mailbox
/// closes. Driver failures end the task with an error.
pub async fn radio_task<R: RadioDriver>(
    radio: Arc<R>,
    device: Arc<DeviceRecord>,
    settings: RadioSettings,
    mut inbox: Inbox<ControllerMessage>,
    forwarder: Outbox<ForwarderMessage>,
) -> Result<()> {
    let confirms = Arc::new(EventFlags::new());
    let handler = Arc::new(GapDispatcher::new(confirms.clone(), forwarder.clone()));
    let address = radio.init(handler)?;

    let name = names::device_name(&address);
    info!("radio: device {} ({})", name, address);
    if !device.set_identity(Identity {
        address,
        name: name.clone(),
    }) {
        warn!("radio: identity already set, keeping the first one");
    }
    if forwarder
        .send(ForwarderMessage::DeviceReady { name })
        .is_err()
    {
        return Err(Error::MailboxClosed("forwarder"));
    }

    let switch = ModeSwitch::new(radio, confirms, &settings.beacon);
    let mut controller = RadioController::new(switch, settings.interval, forwarder);
    controller.apply(settings.startup_mode).await?;

    loop {
        match inbox.receive(POLL_INTERVAL).await {
            Ok(ControllerMessage::Control(text)) => controller.handle_command(&text).await?,
            Err(RecvError::Timeout) => continue,
            Err(RecvError::Closed) => {
                info!("radio: controller mailbox closed");
                return Ok(());
            }
        }
    }
}
