//! Bounded, non-blocking mailboxes between the node's tasks.

mod message;

pub use message::{ControllerMessage, ForwarderKind, ForwarderMessage};

use log::error;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Slots per mailbox. Senders drop rather than wait once both are taken.
pub const MAILBOX_CAPACITY: usize = 2;

/// How long a task waits on its inbox before looking at its own bookkeeping.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Sending half of a mailbox. Never suspends, so it may be used from
/// platform callback contexts.
#[derive(Debug)]
pub struct Outbox<T> {
    name: &'static str,
    tx: mpsc::Sender<T>,
}

impl<T> Clone for Outbox<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: self.tx.clone(),
        }
    }
}

impl<T> Outbox<T> {
    /// Hand `message` to the receiving task.
    ///
    /// If the mailbox is full (or its task is gone) the message is logged and
    /// handed back to the caller, which still owns it.
    pub fn send(&self, message: T) -> Result<(), T> {
        match self.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(message)) => {
                error!("mailbox {}: full, message dropped", self.name);
                Err(message)
            }
            Err(TrySendError::Closed(message)) => {
                error!("mailbox {}: receiver gone, message dropped", self.name);
                Err(message)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RecvError {
    #[error("no message before timeout")]
    Timeout,
    #[error("all senders dropped")]
    Closed,
}

/// Receiving half of a mailbox, owned by exactly one task.
#[derive(Debug)]
pub struct Inbox<T> {
    name: &'static str,
    rx: mpsc::Receiver<T>,
}

impl<T> Inbox<T> {
    /// Wait up to `wait` for the next message. A message already queued is
    /// returned without waiting.
    pub async fn receive(&mut self, wait: Duration) -> Result<T, RecvError> {
        match tokio::time::timeout(wait, self.rx.recv()).await {
            Ok(Some(message)) => Ok(message),
            Ok(None) => Err(RecvError::Closed),
            Err(_) => Err(RecvError::Timeout),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Create a mailbox with [`MAILBOX_CAPACITY`] slots.
pub fn mailbox<T>(name: &'static str) -> (Outbox<T>, Inbox<T>) {
    let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
    (Outbox { name, tx }, Inbox { name, rx })
}

/// The two mailboxes of a node: one into the radio controller, one into the
/// uplink forwarder.
pub struct MailboxBus {
    pub controller: (Outbox<ControllerMessage>, Inbox<ControllerMessage>),
    pub forwarder: (Outbox<ForwarderMessage>, Inbox<ForwarderMessage>),
}

impl MailboxBus {
    pub fn new() -> Self {
        Self {
            controller: mailbox("controller"),
            forwarder: mailbox("forwarder"),
        }
    }
}

impl Default for MailboxBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queued_message_is_received_immediately() {
        let (tx, mut rx) = mailbox::<ControllerMessage>("test");
        tx.send(ControllerMessage::Control("scan".into())).unwrap();

        let got = rx.receive(Duration::from_secs(60)).await.unwrap();
        assert_eq!(got, ControllerMessage::Control("scan".into()));
    }

    #[tokio::test]
    async fn third_message_is_dropped_and_returned_to_sender() {
        let (tx, mut rx) = mailbox::<ControllerMessage>("test");
        tx.send(ControllerMessage::Control("one".into())).unwrap();
        tx.send(ControllerMessage::Control("two".into())).unwrap();

        let rejected = tx.send(ControllerMessage::Control("three".into()));
        assert_eq!(rejected, Err(ControllerMessage::Control("three".into())));

        assert_eq!(
            rx.receive(POLL_INTERVAL).await,
            Ok(ControllerMessage::Control("one".into()))
        );
        assert_eq!(
            rx.receive(POLL_INTERVAL).await,
            Ok(ControllerMessage::Control("two".into()))
        );
        drop(tx);
        assert_eq!(rx.receive(POLL_INTERVAL).await, Err(RecvError::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn receive_times_out_on_empty_mailbox() {
        let (_tx, mut rx) = mailbox::<ForwarderMessage>("test");
        assert_eq!(rx.receive(POLL_INTERVAL).await, Err(RecvError::Timeout));
    }

    #[test]
    fn send_after_receiver_dropped_fails() {
        let (tx, rx) = mailbox::<ControllerMessage>("test");
        drop(rx);
        assert!(tx.send(ControllerMessage::Control("idle".into())).is_err());
    }

    #[test]
    fn bus_mailboxes_are_independent() {
        let bus = MailboxBus::new();
        let (ctrl_tx, _ctrl_rx) = &bus.controller;
        let (fwd_tx, _fwd_rx) = &bus.forwarder;
        ctrl_tx.send(ControllerMessage::Control("a".into())).unwrap();
        ctrl_tx.send(ControllerMessage::Control("b".into())).unwrap();
        // a full controller mailbox does not affect the forwarder one
        fwd_tx.send(ForwarderMessage::Debug("x".into())).unwrap();
        assert_eq!(ctrl_tx.name(), "controller");
        assert_eq!(fwd_tx.name(), "forwarder");
    }
}
