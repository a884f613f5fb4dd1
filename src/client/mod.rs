//! Client half of the bridge (the script side).
//!
//! Issues calls, receives pushes, and exposes ergonomic stubs to
//! application code. Everything here is driven by metadata: the client
//! holds no reference into host memory, only correlation identifiers.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `bridge` | [`ClientBridge`]: attach, discovery, readiness |
//! | `correlator` | Pending-call map turning pushes into request/response |
//! | `proxy` | [`ServiceProxy`]: the table-driven service stub |
//! | `hooks` | Reactive mirrors for observable properties/collections |
//!
//! # Quick Start
//!
//! ```ignore
//! let client = ClientBridge::attach(channel);
//! let todo = client.get_service("Todo").await?;
//! todo.call("Add", vec!["buy milk".into()]).await?;
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Bridge handle and incoming dispatch.
mod bridge;

/// Pending-call correlation.
mod correlator;

/// Table-driven service stubs.
mod proxy;

/// Reactive hooks for observable members.
pub mod hooks;

// ============================================================================
// Re-exports
// ============================================================================

pub use bridge::ClientBridge;
pub use hooks::{CollectionMirror, PropertyCell};
pub use proxy::ServiceProxy;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::warn;

use crate::channel::MessageChannel;
use crate::error::{Error, Result};
use crate::identifiers::ListenerId;
use crate::protocol::BridgeMessage;

use correlator::Correlator;

// ============================================================================
// Callback Types
// ============================================================================

/// Event subscriber callback, invoked with the push payload.
///
/// Callbacks run synchronously on the channel's delivery thread and must
/// not block or panic.
pub type EventCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Property subscriber callback, invoked with `(new, old)`.
pub type PropertyCallback = Arc<dyn Fn(&Value, &Value) + Send + Sync>;

// ============================================================================
// ReadyState
// ============================================================================

/// Readiness latch: flips once at first registration/discovery.
#[derive(Default)]
struct ReadyState {
    ready: bool,
    callbacks: Vec<Box<dyn FnOnce() + Send>>,
}

// ============================================================================
// ClientInner
// ============================================================================

/// State shared between the bridge handle, its stubs, and the channel
/// callback.
pub(crate) struct ClientInner {
    channel: Arc<dyn MessageChannel>,
    correlator: Correlator,
    proxies: Mutex<FxHashMap<String, ServiceProxy>>,
    event_listeners: Mutex<FxHashMap<(String, String), FxHashMap<ListenerId, EventCallback>>>,
    ready: Mutex<ReadyState>,
}

impl ClientInner {
    fn new(channel: Arc<dyn MessageChannel>) -> Self {
        Self {
            channel,
            correlator: Correlator::default(),
            proxies: Mutex::new(FxHashMap::default()),
            event_listeners: Mutex::new(FxHashMap::default()),
            ready: Mutex::new(ReadyState::default()),
        }
    }

    /// Sends a request and awaits its terminal reply.
    ///
    /// A channel-level send failure is logged, not surfaced: the pending
    /// entry stays until the caller's own logic gives up, per the error
    /// design.
    pub(crate) async fn request(&self, message: BridgeMessage) -> Result<Value> {
        let id = message
            .message_id
            .clone()
            .ok_or_else(|| Error::protocol("request without message id"))?;

        let rx = self.correlator.begin(id.clone());

        match message.encode() {
            Ok(payload) => {
                if let Err(e) = self.channel.send(payload) {
                    warn!(error = %e, message_id = %id, "Failed to send request");
                }
            }
            Err(e) => {
                // Local serialization failure rejects the call immediately.
                self.correlator.complete(&id, Err(e));
            }
        }

        rx.await.map_err(|_| Error::ChannelClosed)?
    }

    /// Registers an event callback under a fresh or supplied listener id.
    pub(crate) fn add_event_listener(
        &self,
        service: &str,
        event: &str,
        listener_id: ListenerId,
        callback: EventCallback,
    ) {
        self.event_listeners
            .lock()
            .entry((service.to_string(), event.to_string()))
            .or_default()
            .insert(listener_id, callback);
    }

    /// Removes one event callback; absent ids are ignored.
    pub(crate) fn remove_event_listener(
        &self,
        service: &str,
        event: &str,
        listener_id: &ListenerId,
    ) {
        if let Some(listeners) = self
            .event_listeners
            .lock()
            .get_mut(&(service.to_string(), event.to_string()))
        {
            listeners.remove(listener_id);
        }
    }

    /// Fans one event push out to every subscribed callback.
    ///
    /// No subscriber is not an error; the push is simply dropped.
    pub(crate) fn fan_out_event(&self, service: &str, event: &str, payload: &Value) {
        // Clone the callbacks out so user code never runs under the lock.
        let callbacks: Vec<EventCallback> = self
            .event_listeners
            .lock()
            .get(&(service.to_string(), event.to_string()))
            .map(|listeners| listeners.values().cloned().collect())
            .unwrap_or_default();

        for callback in callbacks {
            callback(payload);
        }
    }
}
