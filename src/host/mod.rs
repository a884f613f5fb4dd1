//! Host half of the bridge.
//!
//! Owns service instances, answers calls, relays events. The host never
//! waits on the wire: it only replies, so no host-side timeout exists.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `service` | The [`BridgeService`] seam and registration policies |
//! | `registry` | Registration, transient minting, disposal |
//! | `dispatcher` | Incoming message routing and replies |
//! | `convert` | Argument coercion against declared tags |
//! | `relay` | [`ServiceEmitter`] and listener records |
//!
//! # Quick Start
//!
//! ```ignore
//! let host = HostBridge::attach(channel);
//! host.register("Todo", Arc::new(TodoService::new()))?;
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// The service seam: schema, invoke, attach.
pub mod service;

/// Registration and lifecycle. Implemented on [`HostBridge`].
mod registry;

/// Incoming message routing. Implemented on the shared inner state.
mod dispatcher;

/// Argument coercion.
pub mod convert;

/// Event/property relay.
pub mod relay;

// ============================================================================
// Re-exports
// ============================================================================

pub use relay::ServiceEmitter;
pub use service::{BridgeService, ReregisterPolicy, ServiceFactory};

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::channel::MessageChannel;
use crate::protocol::ServiceSchema;

use relay::{EventSubscription, Outbound};

// ============================================================================
// Types
// ============================================================================

/// Key for one (service, member) listener record.
pub(crate) type SubscriptionKey = (String, String);

/// One live service entry: singleton, or a minted transient instance.
pub(crate) struct RegisteredEntry {
    /// The instance itself.
    pub(crate) service: Arc<dyn BridgeService>,
    /// Schema, read once at registration.
    pub(crate) schema: Arc<ServiceSchema>,
    /// Shared with the emitter; set on unregister/dispose.
    pub(crate) detached: Arc<AtomicBool>,
    /// Registration name the entry was minted from. Equals the entry's key
    /// for singletons; for transients the key is `{base}#{instanceId}`.
    pub(crate) base_name: String,
}

// ============================================================================
// HostInner
// ============================================================================

/// State shared between the bridge handle and the channel callback.
///
/// Maps are mutex-guarded: dispatch runs on the channel's delivery thread
/// while emitters and registration may run anywhere.
pub(crate) struct HostInner {
    pub(crate) outbound: Arc<Outbound>,
    pub(crate) policy: ReregisterPolicy,
    pub(crate) services: Mutex<FxHashMap<String, RegisteredEntry>>,
    pub(crate) factories: Mutex<FxHashMap<String, ServiceFactory>>,
    pub(crate) subscriptions: Mutex<FxHashMap<SubscriptionKey, EventSubscription>>,
    pub(crate) disposed: AtomicBool,
}

// ============================================================================
// HostBridge
// ============================================================================

/// Host bridge handle.
///
/// Cloning shares the same bridge. Dropping the last handle does not
/// dispose it: the channel callback keeps the inner state alive until
/// [`dispose`](HostBridge::dispose).
#[derive(Clone)]
pub struct HostBridge {
    pub(crate) inner: Arc<HostInner>,
}

impl HostBridge {
    /// Starts building a host bridge.
    #[must_use]
    pub fn builder() -> HostBridgeBuilder {
        HostBridgeBuilder {
            policy: ReregisterPolicy::default(),
        }
    }

    /// Attaches a host bridge to a channel with default policy.
    #[must_use]
    pub fn attach(channel: Arc<dyn MessageChannel>) -> Self {
        Self::builder().attach(channel)
    }

    /// Returns `true` once [`dispose`](HostBridge::dispose) has run.
    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

// ============================================================================
// HostBridgeBuilder
// ============================================================================

/// Builder for [`HostBridge`].
#[derive(Debug, Clone)]
pub struct HostBridgeBuilder {
    policy: ReregisterPolicy,
}

impl HostBridgeBuilder {
    /// Sets the re-registration policy (default: replace-and-orphan).
    #[must_use]
    pub fn reregister_policy(mut self, policy: ReregisterPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Attaches to the channel and finishes the bridge.
    ///
    /// Incoming payloads dispatch synchronously on the channel's delivery
    /// thread from here on.
    #[must_use]
    pub fn attach(self, channel: Arc<dyn MessageChannel>) -> HostBridge {
        let inner = Arc::new(HostInner {
            outbound: Arc::new(Outbound::new(channel)),
            policy: self.policy,
            services: Mutex::new(FxHashMap::default()),
            factories: Mutex::new(FxHashMap::default()),
            subscriptions: Mutex::new(FxHashMap::default()),
            disposed: AtomicBool::new(false),
        });

        let dispatch = Arc::clone(&inner);
        inner
            .outbound
            .channel()
            .set_on_message(Arc::new(move |payload| dispatch.handle_incoming(&payload)));

        debug!(policy = ?self.policy, "Host bridge attached");

        HostBridge { inner }
    }
}
