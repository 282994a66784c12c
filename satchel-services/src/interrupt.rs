//! Cancellation signal threaded through every method call.
//!
//! Checked at suspension points only: service calls, storage commit
//! boundaries and retry sleeps. Cancellation during broadcast never
//! unbroadcasts.

use crate::ServiceError;
use tokio::sync::watch;

/// Receiver half carried by in-flight calls.
#[derive(Debug, Clone)]
pub struct Interrupt {
    rx: Option<watch::Receiver<bool>>,
}

/// Sender half held by whoever may cancel the call.
#[derive(Debug)]
pub struct InterruptHandle {
    tx: watch::Sender<bool>,
}

impl InterruptHandle {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

impl Interrupt {
    pub fn channel() -> (InterruptHandle, Interrupt) {
        let (tx, rx) = watch::channel(false);
        (InterruptHandle { tx }, Interrupt { rx: Some(rx) })
    }

    /// A signal that never fires, for callers without cancellation.
    pub fn none() -> Self {
        Interrupt { rx: None }
    }

    pub fn is_set(&self) -> bool {
        self.rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Error when cancellation has been observed.
    pub fn check(&self) -> Result<(), ServiceError> {
        if self.is_set() {
            Err(ServiceError::Canceled)
        } else {
            Ok(())
        }
    }
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untriggered_passes() {
        let (_handle, interrupt) = Interrupt::channel();
        assert!(interrupt.check().is_ok());
        assert!(Interrupt::none().check().is_ok());
    }

    #[test]
    fn triggered_fails_check() {
        let (handle, interrupt) = Interrupt::channel();
        handle.trigger();
        assert!(matches!(interrupt.check(), Err(ServiceError::Canceled)));
    }

    #[test]
    fn clones_observe_the_same_signal() {
        let (handle, interrupt) = Interrupt::channel();
        let clone = interrupt.clone();
        handle.trigger();
        assert!(clone.is_set());
    }
}
