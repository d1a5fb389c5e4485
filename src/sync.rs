//! Synchronisation primitives shared between tasks and platform callbacks.

use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Lock a std mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A set of event bits that platform callbacks raise and tasks wait on.
///
/// Setting and clearing never block, so both are safe from callback
/// contexts. Waiting is the only suspension point. Each set is owned by the
/// component that waits on it; there are no process-wide instances.
#[derive(Debug)]
pub struct EventFlags {
    bits: watch::Sender<u32>,
}

impl EventFlags {
    pub fn new() -> Self {
        let (bits, _) = watch::channel(0);
        Self { bits }
    }

    pub fn set(&self, mask: u32) {
        self.bits.send_modify(|bits| *bits |= mask);
    }

    pub fn clear(&self, mask: u32) {
        self.bits.send_modify(|bits| *bits &= !mask);
    }

    pub fn get(&self) -> u32 {
        *self.bits.borrow()
    }

    /// Wait until any bit of `mask` is set and return the bits of `mask`
    /// that were set. Bits are left untouched; clear them before issuing
    /// the request whose completion you intend to wait for.
    pub async fn wait_any(&self, mask: u32) -> u32 {
        let mut rx = self.bits.subscribe();
        let result = rx
            .wait_for(|bits| (*bits & mask) != 0)
            .await
            .map(|bits| *bits & mask);
        // The sender lives in `self`, so the channel cannot close under us
        result.unwrap_or(0)
    }
}

impl Default for EventFlags {
    fn default() -> Self {
        Self::new()
    }
}
