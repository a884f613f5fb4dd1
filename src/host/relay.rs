//! Event and property-change relay.
//!
//! Every relayable native event is normalized to one shape before it
//! reaches the wire: `(service, member, payload)` pushed through a
//! [`ServiceEmitter`]. The adapter from a concrete native event source to
//! the emitter is written once per service, not synthesized per instance.
//!
//! Relay is unconditional: the host forwards every firing whether or not
//! anyone subscribed. Subscription listener sets are delivery policy on the
//! client side. A relay failure never escapes into the native event
//! source's own error path.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use rustc_hash::FxHashSet;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::channel::MessageChannel;
use crate::identifiers::ListenerId;
use crate::protocol::{BridgeMessage, ServiceSchema};

use super::service::BridgeService;

// ============================================================================
// Outbound
// ============================================================================

/// The single outbound path shared by dispatch replies and relay pushes.
///
/// Send failures are logged and dropped, never surfaced: a reply that
/// cannot be delivered has no one left to deliver an error to, and a relay
/// push is fire-and-forget by design.
pub(crate) struct Outbound {
    channel: Arc<dyn MessageChannel>,
    closed: AtomicBool,
}

impl Outbound {
    pub(crate) fn new(channel: Arc<dyn MessageChannel>) -> Self {
        Self {
            channel,
            closed: AtomicBool::new(false),
        }
    }

    /// Serializes and queues one message.
    pub(crate) fn send(&self, message: &BridgeMessage) {
        if self.closed.load(Ordering::Acquire) {
            debug!(message_type = %message.message_type, "Dropping send on closed bridge");
            return;
        }

        match message.encode() {
            Ok(payload) => {
                if let Err(e) = self.channel.send(payload) {
                    warn!(error = %e, message_type = %message.message_type, "Failed to send message");
                } else {
                    trace!(message_type = %message.message_type, "Message sent");
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to serialize outbound message");
            }
        }
    }

    /// Silences all future sends.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub(crate) fn channel(&self) -> &Arc<dyn MessageChannel> {
        &self.channel
    }
}

// ============================================================================
// ServiceEmitter
// ============================================================================

/// Forwarding handle handed to a service at attach time.
///
/// Cloneable and thread-safe: native events may fire on arbitrary worker
/// threads, and the outbound path serializes them onto the channel's single
/// writer.
#[derive(Clone)]
pub struct ServiceEmitter {
    service_name: String,
    service: Weak<dyn BridgeService>,
    schema: Arc<ServiceSchema>,
    outbound: Arc<Outbound>,
    detached: Arc<AtomicBool>,
}

impl ServiceEmitter {
    pub(crate) fn new(
        service_name: String,
        service: Weak<dyn BridgeService>,
        schema: Arc<ServiceSchema>,
        outbound: Arc<Outbound>,
        detached: Arc<AtomicBool>,
    ) -> Self {
        Self {
            service_name,
            service,
            schema,
            outbound,
            detached,
        }
    }

    /// The name this emitter forwards under (scoped for transients).
    #[inline]
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Relays one native event firing as an `eventFired` push.
    ///
    /// Undeclared event names are dropped with a warning: the wire surface
    /// is exactly what the schema declares.
    pub fn emit_event(&self, event: &str, payload: Value) {
        if self.detached.load(Ordering::Acquire) {
            debug!(service = %self.service_name, event, "Dropping event from detached service");
            return;
        }

        if !self.schema.has_event(event) {
            warn!(service = %self.service_name, event, "Dropping undeclared event");
            return;
        }

        self.outbound
            .send(&BridgeMessage::event_fired(&self.service_name, event, payload));
    }

    /// Relays one observable property mutation as a `propertyChangeFired`
    /// push.
    ///
    /// The current value is read back through the service at push time; a
    /// failed read degrades to the tag's zero value so the native event
    /// pipeline never sees an error.
    pub fn notify_property_changed(&self, property: &str) {
        if self.detached.load(Ordering::Acquire) {
            debug!(service = %self.service_name, property, "Dropping change from detached service");
            return;
        }

        let Some(descriptor) = self.schema.property(property) else {
            warn!(service = %self.service_name, property, "Dropping undeclared property change");
            return;
        };

        let value = self
            .service
            .upgrade()
            .and_then(|service| service.get_property(property).ok())
            .unwrap_or_else(|| descriptor.type_tag.zero_value());

        self.outbound.send(&BridgeMessage::property_change_fired(
            &self.service_name,
            property,
            value,
        ));
    }
}

// ============================================================================
// EventSubscription
// ============================================================================

/// Host-side listener record for one (service, member) pair.
///
/// Created with the owning service's registration, destroyed when it is
/// unregistered. The set only gates subscribe/unsubscribe bookkeeping;
/// relay does not consult it.
#[derive(Default)]
pub(crate) struct EventSubscription {
    listener_ids: FxHashSet<ListenerId>,
}

impl EventSubscription {
    /// Adds a listener; re-adding is a no-op.
    pub(crate) fn add(&mut self, listener_id: ListenerId) {
        self.listener_ids.insert(listener_id);
    }

    /// Removes a listener; an absent id succeeds and changes nothing.
    pub(crate) fn remove(&mut self, listener_id: &ListenerId) -> bool {
        self.listener_ids.remove(listener_id)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.listener_ids.len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::identifiers::ListenerId;

    #[test]
    fn test_subscription_add_remove_idempotent() {
        let mut sub = EventSubscription::default();
        let l1 = ListenerId::generate();

        sub.add(l1.clone());
        sub.add(l1.clone());
        assert_eq!(sub.len(), 1);

        assert!(sub.remove(&l1));
        assert!(!sub.remove(&l1));
        assert_eq!(sub.len(), 0);
    }

    #[test]
    fn test_remove_does_not_touch_others() {
        let mut sub = EventSubscription::default();
        let l1 = ListenerId::generate();
        let l2 = ListenerId::generate();

        sub.add(l1);
        sub.add(l2.clone());

        assert!(!sub.remove(&ListenerId::generate()));
        assert_eq!(sub.len(), 2);
        assert!(sub.remove(&l2));
        assert_eq!(sub.len(), 1);
    }
}
