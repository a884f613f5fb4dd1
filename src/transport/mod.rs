//! Channel implementations.
//!
//! The bridge core only needs the [`MessageChannel`](crate::MessageChannel)
//! contract; this module supplies two concrete transports:
//!
//! | Transport | Use |
//! |-----------|-----|
//! | [`pair`] | In-process duplex pair (tests, same-process embeddings) |
//! | [`WsServer`] / [`WsChannel`] | WebSocket server the web content connects to |
//!
//! Both route every outbound payload through a single writer task, so
//! callers may send from any thread without racing the wire.

// ============================================================================
// Submodules
// ============================================================================

/// In-process duplex channel pair.
pub mod pair;

/// WebSocket channel transport.
pub mod ws;

// ============================================================================
// Re-exports
// ============================================================================

pub use pair::{PairChannel, pair};
pub use ws::{WsChannel, WsServer};

// ============================================================================
// Inbox
// ============================================================================

use parking_lot::Mutex;

use crate::channel::MessageCallback;

/// Inbound delivery slot shared by the transports.
///
/// Payloads arriving before a callback is installed are buffered and
/// flushed on install, so an announcement push can never outrun attach.
/// One lock covers both the slot and the buffer: a payload checked against
/// an empty slot lands in the buffer the installer will flush.
#[derive(Default)]
pub(crate) struct Inbox {
    state: Mutex<InboxState>,
}

#[derive(Default)]
struct InboxState {
    callback: Option<MessageCallback>,
    pending: Vec<String>,
}

impl Inbox {
    /// Delivers one payload, buffering if no callback is installed yet.
    pub(crate) fn deliver(&self, payload: String) {
        // Clone the callback out so delivery never runs under the lock.
        let callback = {
            let mut state = self.state.lock();
            match &state.callback {
                Some(cb) => cb.clone(),
                None => {
                    state.pending.push(payload);
                    return;
                }
            }
        };
        callback(payload);
    }

    /// Installs the callback and flushes anything buffered.
    pub(crate) fn install(&self, callback: MessageCallback) {
        let buffered = {
            let mut state = self.state.lock();
            state.callback = Some(callback.clone());
            std::mem::take(&mut state.pending)
        };
        for payload in buffered {
            callback(payload);
        }
    }
}
