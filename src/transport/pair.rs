//! In-process duplex channel pair.
//!
//! [`pair`] returns two connected [`PairChannel`] ends; a payload sent on
//! one end is delivered to the other end's callback. Each end owns a reader
//! task that drains its inbox sequentially, which is what serializes
//! delivery no matter which thread called `send`.
//!
//! This is the transport the integration tests wire a real host and client
//! over; it is also usable for same-process embeddings.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::channel::{MessageCallback, MessageChannel};
use crate::error::{Error, Result};

use super::Inbox;

// ============================================================================
// PairChannel
// ============================================================================

/// One end of an in-process duplex channel.
///
/// Cloning shares the same end; both clones feed the same peer.
#[derive(Clone)]
pub struct PairChannel {
    /// Queue into the peer's inbox.
    peer_tx: mpsc::UnboundedSender<String>,
    /// This end's delivery slot.
    inbox: Arc<Inbox>,
}

/// Creates a connected channel pair.
///
/// Must be called within a tokio runtime: each end spawns a reader task.
#[must_use]
pub fn pair() -> (PairChannel, PairChannel) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();

    let a = PairChannel {
        peer_tx: b_tx,
        inbox: Arc::new(Inbox::default()),
    };
    let b = PairChannel {
        peer_tx: a_tx,
        inbox: Arc::new(Inbox::default()),
    };

    tokio::spawn(run_reader(a_rx, Arc::clone(&a.inbox)));
    tokio::spawn(run_reader(b_rx, Arc::clone(&b.inbox)));

    (a, b)
}

/// Drains one end's inbox queue into its delivery slot.
async fn run_reader(mut rx: mpsc::UnboundedReceiver<String>, inbox: Arc<Inbox>) {
    while let Some(payload) = rx.recv().await {
        trace!(len = payload.len(), "pair delivery");
        inbox.deliver(payload);
    }
    debug!("pair reader terminated");
}

impl MessageChannel for PairChannel {
    fn send(&self, payload: String) -> Result<()> {
        self.peer_tx
            .send(payload)
            .map_err(|_| Error::ChannelClosed)
    }

    fn set_on_message(&self, callback: MessageCallback) {
        self.inbox.install(callback);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;
    use tokio::time::{Duration, sleep};

    #[tokio::test]
    async fn test_send_reaches_peer_callback() {
        let (a, b) = pair();

        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        b.set_on_message(Arc::new(move |payload| sink.lock().push(payload)));

        a.send("hello".to_string()).expect("send");
        sleep(Duration::from_millis(20)).await;

        assert_eq!(*seen.lock(), vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_payloads_before_attach_are_buffered() {
        let (a, b) = pair();

        a.send("early".to_string()).expect("send");
        sleep(Duration::from_millis(20)).await;

        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        b.set_on_message(Arc::new(move |payload| sink.lock().push(payload)));

        assert_eq!(*seen.lock(), vec!["early".to_string()]);
    }

    #[tokio::test]
    async fn test_delivery_preserves_order() {
        let (a, b) = pair();

        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        b.set_on_message(Arc::new(move |payload| sink.lock().push(payload)));

        for i in 0..10 {
            a.send(format!("m{i}")).expect("send");
        }
        sleep(Duration::from_millis(20)).await;

        let seen = seen.lock();
        assert_eq!(seen.len(), 10);
        assert_eq!(seen[0], "m0");
        assert_eq!(seen[9], "m9");
    }
}
