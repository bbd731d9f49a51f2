use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

/// Bounded wake-up signal shared by every idle worker.
///
/// Capacity equals the worker count: more queued wake-ups than idle
/// workers carry no information, so `notify` drops the signal when full
/// instead of blocking the producer.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<()>,
    rx: Arc<Mutex<mpsc::Receiver<()>>>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        // mpsc rejects a zero capacity
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Non-blocking. Returns whether a signal was queued.
    pub fn notify(&self) -> bool {
        self.tx.try_send(()).is_ok()
    }

    /// Waits for a signal or `timeout`, whichever comes first.
    /// Returns `true` when woken by a signal.
    pub async fn wait(&self, timeout: Duration) -> bool {
        let recv = async {
            let mut rx = self.rx.lock().await;
            rx.recv().await
        };
        matches!(tokio::time::timeout(timeout, recv).await, Ok(Some(())))
    }

    /// Signals queued and not yet consumed.
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}
