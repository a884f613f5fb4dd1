//! Client bridge handle and incoming dispatch.
//!
//! Attaches to the channel, routes replies into the correlator, rebuilds
//! stubs from `registerService` announcements, and fans pushes out to
//! subscribers. Parse failures are logged and dropped — the client has no
//! peer to send an error to that would care.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::{interval, timeout};
use tracing::{debug, info, warn};

use crate::channel::MessageChannel;
use crate::error::{Error, Result};
use crate::protocol::{BridgeMessage, MessageType, ServiceRegistration};

use super::ClientInner;
use super::proxy::ServiceProxy;

// ============================================================================
// Constants
// ============================================================================

/// Polling cadence for `wait_for_service`.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ============================================================================
// ClientBridge
// ============================================================================

/// Client bridge handle.
///
/// Cloning shares the same bridge; stubs obtained from it keep the inner
/// state alive.
#[derive(Clone)]
pub struct ClientBridge {
    inner: Arc<ClientInner>,
}

impl ClientBridge {
    /// Attaches a client bridge to a channel.
    ///
    /// Incoming payloads dispatch synchronously on the channel's delivery
    /// thread from here on.
    #[must_use]
    pub fn attach(channel: Arc<dyn MessageChannel>) -> Self {
        let inner = Arc::new(ClientInner::new(Arc::clone(&channel)));

        let dispatch = Arc::clone(&inner);
        channel.set_on_message(Arc::new(move |payload| {
            Self::handle_incoming(&dispatch, &payload);
        }));

        debug!("Client bridge attached");
        Self { inner }
    }

    // ========================================================================
    // Discovery
    // ========================================================================

    /// Returns the stub for a named service, discovering it lazily.
    ///
    /// Announced singletons resolve from the local cache; otherwise a
    /// `getService` round trip fetches the metadata. Transient services
    /// mint a fresh host-side instance on every call.
    ///
    /// # Errors
    ///
    /// [`Error::Remote`] when the host knows no such service.
    pub async fn get_service(&self, name: &str) -> Result<ServiceProxy> {
        if let Some(proxy) = self.inner.proxies.lock().get(name) {
            return Ok(proxy.clone());
        }

        let value = self
            .inner
            .request(BridgeMessage::get_service(name))
            .await?;
        let registration: ServiceRegistration = serde_json::from_value(value)
            .map_err(|e| Error::protocol(format!("invalid service metadata: {e}")))?;

        info!(service = %registration.service_name, "Service discovered");
        Ok(self.install_proxy(registration))
    }

    /// Returns `true` if a stub for `name` is already cached locally.
    #[must_use]
    pub fn has_service(&self, name: &str) -> bool {
        self.inner.proxies.lock().contains_key(name)
    }

    /// Waits for a service to be announced, polling the local cache.
    ///
    /// This is the one enforced timeout in the client; it does not cancel
    /// anything in flight, it just stops polling.
    ///
    /// # Errors
    ///
    /// [`Error::ServiceTimeout`] when the service never appears.
    pub async fn wait_for_service(
        &self,
        name: &str,
        wait_timeout: Duration,
    ) -> Result<ServiceProxy> {
        let poll = async {
            let mut ticker = interval(WAIT_POLL_INTERVAL);
            loop {
                if let Some(proxy) = self.inner.proxies.lock().get(name) {
                    return proxy.clone();
                }
                ticker.tick().await;
            }
        };

        timeout(wait_timeout, poll)
            .await
            .map_err(|_| Error::service_timeout(name, wait_timeout.as_millis() as u64))
    }

    // ========================================================================
    // Readiness
    // ========================================================================

    /// Returns `true` once any service has been announced or discovered.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.ready.lock().ready
    }

    /// Runs `callback` once the bridge is ready; immediately if it already
    /// is.
    pub fn on_ready(&self, callback: impl FnOnce() + Send + 'static) {
        {
            let mut ready = self.inner.ready.lock();
            if !ready.ready {
                ready.callbacks.push(Box::new(callback));
                return;
            }
        }
        callback();
    }

    // ========================================================================
    // Incoming
    // ========================================================================

    fn handle_incoming(inner: &Arc<ClientInner>, raw: &str) {
        let message = match BridgeMessage::decode(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Failed to parse inbound message");
                return;
            }
        };

        match message.message_type {
            MessageType::MethodResult | MessageType::ErrorResponse => {
                Self::handle_reply(inner, message);
            }
            MessageType::RegisterService => {
                Self::handle_registration(inner, message);
            }
            MessageType::EventFired => {
                Self::handle_event_fired(inner, &message);
            }
            MessageType::PropertyChangeFired => {
                Self::handle_property_change(inner, &message);
            }
            ref other => {
                warn!(message_type = %other, "Unknown message type");
            }
        }
    }

    fn handle_reply(inner: &Arc<ClientInner>, message: BridgeMessage) {
        let Some(id) = message.message_id.clone() else {
            // A null-id reply is the host's generic parse-failure response;
            // nothing is waiting on it.
            warn!(
                error = message.error.as_deref().unwrap_or_default(),
                "Uncorrelated error reply"
            );
            return;
        };
        inner.correlator.complete(&id, message.into_reply_result());
    }

    fn handle_registration(inner: &Arc<ClientInner>, message: BridgeMessage) {
        let Some(value) = message.result else {
            warn!("registerService push without metadata");
            return;
        };

        match serde_json::from_value::<ServiceRegistration>(value) {
            Ok(registration) => {
                info!(service = %registration.service_name, "Service announced");
                let bridge = Self {
                    inner: Arc::clone(inner),
                };
                bridge.install_proxy(registration);
            }
            Err(e) => {
                warn!(error = %e, "Invalid registerService metadata");
            }
        }
    }

    fn handle_event_fired(inner: &Arc<ClientInner>, message: &BridgeMessage) {
        let (Some(service), Some(event)) =
            (message.service_name.as_deref(), message.method_name.as_deref())
        else {
            warn!("eventFired push without service/member names");
            return;
        };
        let payload = message.result.clone().unwrap_or(Value::Null);
        inner.fan_out_event(service, event, &payload);
    }

    fn handle_property_change(inner: &Arc<ClientInner>, message: &BridgeMessage) {
        let (Some(service), Some(property)) =
            (message.service_name.as_deref(), message.method_name.as_deref())
        else {
            warn!("propertyChangeFired push without service/member names");
            return;
        };

        let proxy = inner.proxies.lock().get(service).cloned();
        let Some(proxy) = proxy else {
            // No stub for the service yet; ignorable-safe by design.
            debug!(service, property, "Dropping change for unknown service");
            return;
        };

        let value = message
            .result
            .as_ref()
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null);
        proxy.apply_property_change(property, value);
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Caches a stub under its announced name and flips the ready latch.
    fn install_proxy(&self, registration: ServiceRegistration) -> ServiceProxy {
        let proxy = ServiceProxy::new(Arc::clone(&self.inner), registration);
        self.inner
            .proxies
            .lock()
            .insert(proxy.service_name().to_string(), proxy.clone());
        self.notify_ready();
        proxy
    }

    fn notify_ready(&self) {
        let callbacks = {
            let mut ready = self.inner.ready.lock();
            if ready.ready {
                Vec::new()
            } else {
                ready.ready = true;
                std::mem::take(&mut ready.callbacks)
            }
        };

        if !callbacks.is_empty() {
            debug!(count = callbacks.len(), "Bridge ready");
        }
        for callback in callbacks {
            callback();
        }
    }
}
