//! Table-driven service stubs.
//!
//! A [`ServiceProxy`] is built once from a [`ServiceRegistration`] and maps
//! member names to {call, get, set, subscribe} behavior from the tables —
//! no dynamic name interception. The metadata is treated as immutable for
//! the stub's lifetime; only the property value cache moves, refreshed by
//! `propertyChangeFired` pushes.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::ListenerId;
use crate::protocol::{BridgeMessage, ServiceRegistration};

use super::{ClientInner, EventCallback, PropertyCallback};

// ============================================================================
// ProxyState
// ============================================================================

struct ProxyState {
    registration: ServiceRegistration,
    /// Last-known property values, seeded from the registration snapshot.
    properties: Mutex<FxHashMap<String, Value>>,
    /// Purely-local property subscribers; scalar property pushes arrive
    /// unconditionally, so no server-side subscription exists.
    property_subscribers: Mutex<FxHashMap<String, FxHashMap<ListenerId, PropertyCallback>>>,
}

// ============================================================================
// ServiceProxy
// ============================================================================

/// Client-side stand-in for one remote service.
///
/// Cloning shares the same stub and cache.
#[derive(Clone)]
pub struct ServiceProxy {
    inner: Arc<ClientInner>,
    state: Arc<ProxyState>,
}

impl std::fmt::Debug for ServiceProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProxy")
            .field("service_name", &self.state.registration.service_name)
            .finish_non_exhaustive()
    }
}

impl ServiceProxy {
    pub(crate) fn new(inner: Arc<ClientInner>, registration: ServiceRegistration) -> Self {
        let properties = registration
            .properties
            .iter()
            .map(|p| (p.name.clone(), p.value.clone()))
            .collect();

        Self {
            inner,
            state: Arc::new(ProxyState {
                registration,
                properties: Mutex::new(properties),
                property_subscribers: Mutex::new(FxHashMap::default()),
            }),
        }
    }

    /// The name this stub addresses (scoped for transient instances).
    #[inline]
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.state.registration.service_name
    }

    /// The metadata snapshot this stub was built from.
    #[inline]
    #[must_use]
    pub fn registration(&self) -> &ServiceRegistration {
        &self.state.registration
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Invokes a remote method and awaits its reply.
    ///
    /// Any name is forwarded; an undeclared one comes back as the host's
    /// `errorResponse` naming the method and service.
    pub async fn call(&self, method: &str, parameters: Vec<Value>) -> Result<Value> {
        trace!(service = %self.service_name(), method, "Calling remote method");
        self.inner
            .request(BridgeMessage::call_method(
                self.service_name(),
                method,
                parameters,
            ))
            .await
    }

    // ========================================================================
    // Properties
    // ========================================================================

    /// Returns the last-known cached value of a declared property.
    ///
    /// `None` for names the registration does not declare.
    #[must_use]
    pub fn property(&self, property: &str) -> Option<Value> {
        self.state.properties.lock().get(property).cloned()
    }

    /// Reads a property through a `getProperty` round trip.
    ///
    /// # Errors
    ///
    /// [`Error::PropertyNotFound`] locally for undeclared names.
    pub async fn get_property(&self, property: &str) -> Result<Value> {
        self.require_property(property)?;
        self.inner
            .request(BridgeMessage::get_property(self.service_name(), property))
            .await
    }

    /// Writes a property through a `setProperty` round trip.
    ///
    /// The local cache is not updated here; the confirmation comes back as
    /// a `propertyChangeFired` push from the host.
    pub async fn set_property(&self, property: &str, value: Value) -> Result<()> {
        self.require_property(property)?;
        self.inner
            .request(BridgeMessage::set_property(
                self.service_name(),
                property,
                value,
            ))
            .await?;
        Ok(())
    }

    fn require_property(&self, property: &str) -> Result<()> {
        if self.state.registration.properties.iter().any(|p| p.name == property) {
            Ok(())
        } else {
            Err(Error::property_not_found(self.service_name(), property))
        }
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Subscribes a callback to a declared event.
    ///
    /// Sends a `subscribeEvent` round trip and registers the callback under
    /// the confirmed listener id. The callback is armed before the send so
    /// a push racing the confirmation is not lost.
    ///
    /// # Errors
    ///
    /// [`Error::EventNotFound`] locally for undeclared names; remote errors
    /// unregister the callback again.
    pub async fn subscribe_event(
        &self,
        event: &str,
        callback: EventCallback,
    ) -> Result<ListenerId> {
        if !self.state.registration.events.iter().any(|e| e == event) {
            return Err(Error::event_not_found(self.service_name(), event));
        }

        let listener_id = ListenerId::generate();
        self.inner
            .add_event_listener(self.service_name(), event, listener_id.clone(), callback);

        let outcome = self
            .inner
            .request(BridgeMessage::subscribe_event(
                self.service_name(),
                event,
                listener_id.clone(),
            ))
            .await;

        match outcome {
            Ok(_) => {
                debug!(service = %self.service_name(), event, listener = %listener_id, "Subscribed");
                Ok(listener_id)
            }
            Err(e) => {
                self.inner
                    .remove_event_listener(self.service_name(), event, &listener_id);
                Err(e)
            }
        }
    }

    /// Unsubscribes a listener.
    ///
    /// The local callback is removed before the round trip, so no further
    /// invocation happens even if a push is already in flight; the host
    /// stops counting the listener when the reply confirms.
    pub async fn unsubscribe_event(&self, event: &str, listener_id: ListenerId) -> Result<()> {
        self.inner
            .remove_event_listener(self.service_name(), event, &listener_id);

        self.inner
            .request(BridgeMessage::unsubscribe_event(
                self.service_name(),
                event,
                listener_id,
            ))
            .await?;
        Ok(())
    }

    /// Removes the local callback only, without telling the host.
    ///
    /// Used by hook teardown paths that cannot await.
    pub(crate) fn remove_event_listener_local(&self, event: &str, listener_id: &ListenerId) {
        self.inner
            .remove_event_listener(self.service_name(), event, listener_id);
    }

    // ========================================================================
    // Property Subscriptions
    // ========================================================================

    /// Registers a purely-local property-change callback.
    ///
    /// Scalar observable properties push unconditionally, so nothing is
    /// sent; the callback sees every `propertyChangeFired` for the name.
    ///
    /// # Errors
    ///
    /// [`Error::PropertyNotFound`] for undeclared names.
    pub fn subscribe_property(
        &self,
        property: &str,
        callback: PropertyCallback,
    ) -> Result<ListenerId> {
        self.require_property(property)?;

        let listener_id = ListenerId::generate();
        self.state
            .property_subscribers
            .lock()
            .entry(property.to_string())
            .or_default()
            .insert(listener_id.clone(), callback);
        Ok(listener_id)
    }

    /// Removes a property-change callback; absent ids are ignored.
    pub fn unsubscribe_property(&self, property: &str, listener_id: &ListenerId) {
        if let Some(subscribers) = self.state.property_subscribers.lock().get_mut(property) {
            subscribers.remove(listener_id);
        }
    }

    /// Applies one `propertyChangeFired` push: refresh the cache, then fan
    /// out `(new, old)` to local subscribers.
    pub(crate) fn apply_property_change(&self, property: &str, value: Value) {
        let old = self
            .state
            .properties
            .lock()
            .insert(property.to_string(), value.clone())
            .unwrap_or(Value::Null);

        let callbacks: Vec<PropertyCallback> = self
            .state
            .property_subscribers
            .lock()
            .get(property)
            .map(|subscribers| subscribers.values().cloned().collect())
            .unwrap_or_default();

        trace!(service = %self.service_name(), property, subscribers = callbacks.len(), "Property changed");

        for callback in callbacks {
            callback(&value, &old);
        }
    }
}
