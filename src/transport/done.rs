//! One-shot broadcast cancellation.
//!
//! Built on a `watch` channel holding a single `bool`. The [`Canceller`]
//! flips it to `true` exactly once; every cloned [`Done`] observes it. A
//! dropped `Canceller` counts as cancelled, so a transport that goes away
//! without saying so still releases its handlers.

use tokio::sync::watch;
use tracing::trace;

/// Creates a linked cancellation pair.
pub fn done_channel() -> (Canceller, Done) {
    let (tx, rx) = watch::channel(false);
    (Canceller { tx }, Done { rx })
}

/// Owner side of a cancellation signal. Cancels on drop.
#[derive(Debug)]
pub struct Canceller {
    tx: watch::Sender<bool>,
}

impl Canceller {
    /// Signals every linked [`Done`]. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_if_modified(|done| {
            if *done {
                return false;
            }
            *done = true;
            trace!("Cancellation signaled");
            true
        });
    }

    /// Returns another receiver for this signal.
    pub fn subscribe(&self) -> Done {
        Done {
            rx: self.tx.subscribe(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Drop for Canceller {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Receiver side of a cancellation signal.
#[derive(Debug, Clone)]
pub struct Done {
    rx: watch::Receiver<bool>,
}

impl Done {
    /// Non-blocking check.
    pub fn is_done(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once the signal fires (or its sender is gone).
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|done| *done).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_cancel_wakes_waiter() {
        let (canceller, done) = done_channel();
        let mut waiter = task::spawn(done.cancelled());

        assert_pending!(waiter.poll());
        assert!(!done.is_done());

        canceller.cancel();

        assert!(waiter.is_woken());
        assert_ready!(waiter.poll());
        assert!(done.is_done());
    }

    #[test]
    fn test_cancel_is_sticky_and_idempotent() {
        let (canceller, done) = done_channel();
        canceller.cancel();
        canceller.cancel();

        assert!(canceller.is_cancelled());
        assert!(done.is_done());
        assert!(done.clone().is_done());

        let mut late = task::spawn(done.cancelled());
        assert_ready!(late.poll());
    }

    #[test]
    fn test_drop_cancels() {
        let (canceller, done) = done_channel();
        let subscribed = canceller.subscribe();
        drop(canceller);

        assert!(done.is_done());
        assert!(subscribed.is_done());
        let mut waiter = task::spawn(subscribed.cancelled());
        assert_ready!(waiter.poll());
    }
}
