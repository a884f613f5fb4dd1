//! The opaque string channel both bridge halves attach to.
//!
//! The core requires exactly two capabilities from its embedding: deliver
//! one outbound string, and invoke one callback per inbound string. Nothing
//! else is assumed — not ordering across independent streams, not
//! reliability, not reentrancy.
//!
//! Implementations in this crate: [`pair`](crate::transport::pair) (in-process
//! duplex) and [`WsServer`](crate::transport::WsServer) (WebSocket). An
//! embedding with its own message pipe implements the trait directly.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use crate::error::Result;

// ============================================================================
// Types
// ============================================================================

/// Inbound delivery callback, invoked once per payload.
///
/// Dispatch runs synchronously on the delivering thread; both bridges keep
/// their handlers non-blocking.
pub type MessageCallback = Arc<dyn Fn(String) + Send + Sync>;

// ============================================================================
// MessageChannel
// ============================================================================

/// Bidirectional string transport between the two bridge halves.
///
/// `send` enqueues; implementations own a single writer path so callers may
/// send from any thread without racing the wire (native events fire on
/// arbitrary threads).
pub trait MessageChannel: Send + Sync {
    /// Queues one payload for delivery to the peer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`](crate::Error::ChannelClosed) if the
    /// peer or the writer task has gone away. Failures are not retried.
    fn send(&self, payload: String) -> Result<()>;

    /// Installs the inbound delivery callback, replacing any previous one.
    fn set_on_message(&self, callback: MessageCallback);
}
