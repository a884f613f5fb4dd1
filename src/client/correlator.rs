//! Pending-call correlation.
//!
//! The sole mechanism turning the push-based channel into request/response
//! semantics: every outbound request registers a completion channel keyed
//! by its `messageId`; the matching terminal reply removes and resolves it
//! exactly once. Replies may arrive in any order — correlation by id makes
//! that safe.
//!
//! No timeout exists here. An unanswered id keeps its entry until the
//! caller's own logic gives up.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{trace, warn};

use crate::error::Result;
use crate::identifiers::MessageId;

// ============================================================================
// Correlator
// ============================================================================

/// Map of in-flight request ids to their completion channels.
#[derive(Default)]
pub(crate) struct Correlator {
    pending: Mutex<FxHashMap<MessageId, oneshot::Sender<Result<Value>>>>,
}

impl Correlator {
    /// Registers a fresh pending entry and returns its receiving half.
    pub(crate) fn begin(&self, id: MessageId) -> oneshot::Receiver<Result<Value>> {
        let (tx, rx) = oneshot::channel();
        if self.pending.lock().insert(id.clone(), tx).is_some() {
            // Ids are collision-resistant; a duplicate means a caller reused
            // one, and the earlier waiter is dropped.
            warn!(message_id = %id, "Duplicate pending id; replacing earlier entry");
        }
        trace!(message_id = %id, "Pending call registered");
        rx
    }

    /// Resolves a pending entry, removing it exactly once.
    ///
    /// A reply for an unknown or already-completed id is a logged no-op —
    /// never fatal.
    pub(crate) fn complete(&self, id: &MessageId, outcome: Result<Value>) {
        let entry = self.pending.lock().remove(id);
        match entry {
            Some(tx) => {
                // The caller may have dropped its future; that is fine.
                let _ = tx.send(outcome);
            }
            None => {
                warn!(message_id = %id, "Reply for unknown or completed request");
            }
        }
    }

    /// Number of in-flight requests.
    #[cfg(test)]
    pub(crate) fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::error::Error;

    #[tokio::test]
    async fn test_complete_resolves_pending() {
        let correlator = Correlator::default();
        let id = MessageId::generate();

        let rx = correlator.begin(id.clone());
        correlator.complete(&id, Ok(json!(42)));

        let outcome = rx.await.expect("sender kept").expect("success");
        assert_eq!(outcome, json!(42));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_out_of_order_replies_resolve_right_callers() {
        let correlator = Correlator::default();
        let m1 = MessageId::generate();
        let m2 = MessageId::generate();

        let rx1 = correlator.begin(m1.clone());
        let rx2 = correlator.begin(m2.clone());

        // Replies arrive m2 first, then m1.
        correlator.complete(&m2, Ok(json!("second")));
        correlator.complete(&m1, Ok(json!("first")));

        assert_eq!(rx1.await.expect("rx1").expect("ok"), json!("first"));
        assert_eq!(rx2.await.expect("rx2").expect("ok"), json!("second"));
    }

    #[tokio::test]
    async fn test_second_arrival_is_silent_noop() {
        let correlator = Correlator::default();
        let id = MessageId::generate();

        let rx = correlator.begin(id.clone());
        correlator.complete(&id, Ok(json!(1)));
        // Second arrival for the same id: logged, not fatal.
        correlator.complete(&id, Ok(json!(2)));

        assert_eq!(rx.await.expect("rx").expect("ok"), json!(1));
    }

    #[tokio::test]
    async fn test_rejection_routes_through_same_path() {
        let correlator = Correlator::default();
        let id = MessageId::generate();

        let rx = correlator.begin(id.clone());
        correlator.complete(&id, Err(Error::remote("Service 'X' not found")));

        let err = rx.await.expect("rx").unwrap_err();
        assert!(err.is_remote());
    }
}
