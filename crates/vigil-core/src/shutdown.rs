//! Cooperative shutdown
//!
//! Every long-running loop selects on a shutdown token in addition to its
//! socket/poll timeout, so cancellation is observed at each iteration
//! boundary. There is no preemption: a loop that never polls its token
//! never stops.

use tokio::sync::watch;

/// Owning side of the shutdown signal. Dropping it also releases the
/// channel, so tokens held by loops resolve either way.
#[derive(Debug)]
pub struct ShutdownSignal {
    tx: watch::Sender<bool>,
}

/// Per-loop handle. Cheap to clone; one per spawned task.
#[derive(Debug, Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn new() -> (Self, ShutdownToken) {
        let (tx, rx) = watch::channel(false);
        (ShutdownSignal { tx }, ShutdownToken { rx })
    }

    /// Flip the flag. All tokens observe it on their next poll.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    pub fn token(&self) -> ShutdownToken {
        ShutdownToken {
            rx: self.tx.subscribe(),
        }
    }
}

impl ShutdownToken {
    /// Non-blocking check, for loops that are between awaits.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is triggered (or the signal is dropped).
    pub async fn wait(&mut self) {
        while !*self.rx.borrow() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}
