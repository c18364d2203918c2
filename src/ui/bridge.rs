// Wake bridge - signals the foreground thread that responses are waiting
//
// The dispatcher's worker calls the wake callback after every posted
// response. The callback must never block the worker, so it does a
// `try_send` on a channel of capacity one: if a wake is already pending the
// new one is coalesced into it. That is enough because the foreground side
// always drains the whole response queue once it wakes.

use crate::dispatch::WakeFn;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Create a connected wake sender/receiver pair.
pub fn wake_channel() -> (WakeSender, WakeReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (WakeSender { tx }, WakeReceiver { rx })
}

/// Worker-side half. Cheap to clone.
#[derive(Clone, Debug)]
pub struct WakeSender {
    tx: mpsc::Sender<()>,
}

impl WakeSender {
    /// Request a drain. Never blocks.
    pub fn wake(&self) {
        match self.tx.try_send(()) {
            Ok(()) => {}
            // a wake is already pending; the next drain picks this response up too
            Err(mpsc::error::TrySendError::Full(())) => {}
            Err(mpsc::error::TrySendError::Closed(())) => {
                tracing::trace!("Wake dropped, foreground receiver is gone");
            }
        }
    }

    /// Wrap this sender as the callback a [`Dispatcher`](crate::dispatch::Dispatcher) takes.
    pub fn into_wake_fn(self) -> WakeFn {
        Arc::new(move || self.wake())
    }
}

/// Foreground-side half.
#[derive(Debug)]
pub struct WakeReceiver {
    rx: mpsc::Receiver<()>,
}

impl WakeReceiver {
    /// Block the calling thread until a wake arrives.
    ///
    /// Returns `false` once every sender is gone. Must not be called from
    /// inside an async runtime; use [`WakeReceiver::wait`] there.
    pub fn blocking_wait(&mut self) -> bool {
        self.rx.blocking_recv().is_some()
    }

    /// Wait asynchronously until a wake arrives.
    pub async fn wait(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }

    /// Consume a pending wake without waiting.
    pub fn try_wait(&mut self) -> bool {
        self.rx.try_recv().is_ok()
    }
}
