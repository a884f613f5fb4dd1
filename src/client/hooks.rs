//! Reactive hooks over observable members.
//!
//! Two conveniences for UI layers sitting on the stub:
//!
//! - [`PropertyCell`] mirrors one scalar observable property into a local
//!   [`watch`] cell with bidirectional write-through via the setter round
//!   trip.
//! - [`CollectionMirror`] mirrors an observable collection by re-fetching
//!   the whole collection through its getter whenever its `<Name>Changed`
//!   event fires. Full replace, no incremental diffing.
//!
//! Dropping a hook detaches it locally; call `unbind` to also release the
//! host-side event subscription a mirror holds.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::Result;
use crate::identifiers::ListenerId;

use super::proxy::ServiceProxy;

// ============================================================================
// PropertyCell
// ============================================================================

/// A scalar observable property mirrored into a local reactive cell.
///
/// The cell updates on every `propertyChangeFired` push for the property;
/// [`set`](PropertyCell::set) writes through to the host and lets the echo
/// push refresh the cell, so local and remote state never fork.
pub struct PropertyCell {
    proxy: ServiceProxy,
    property: String,
    rx: watch::Receiver<Value>,
    listener_id: ListenerId,
}

impl PropertyCell {
    /// Binds a cell to `property`: fetches the current value through the
    /// getter round trip, then subscribes to changes.
    ///
    /// # Errors
    ///
    /// Fails for undeclared properties or when the initial fetch fails.
    pub async fn bind(proxy: &ServiceProxy, property: &str) -> Result<Self> {
        let initial = proxy.get_property(property).await?;
        let (tx, rx) = watch::channel(initial);

        let tx = Arc::new(tx);
        let listener_id = proxy.subscribe_property(
            property,
            Arc::new(move |new, _old| {
                let _ = tx.send(new.clone());
            }),
        )?;

        debug!(service = %proxy.service_name(), property, "Property cell bound");

        Ok(Self {
            proxy: proxy.clone(),
            property: property.to_string(),
            rx,
            listener_id,
        })
    }

    /// Returns the cell's current value.
    #[must_use]
    pub fn get(&self) -> Value {
        self.rx.borrow().clone()
    }

    /// Returns a watch handle for awaiting changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Value> {
        self.rx.clone()
    }

    /// Writes through to the host via the setter round trip.
    ///
    /// The cell itself updates when the host's change push arrives.
    pub async fn set(&self, value: Value) -> Result<()> {
        self.proxy.set_property(&self.property, value).await
    }
}

impl Drop for PropertyCell {
    fn drop(&mut self) {
        // Purely-local subscription; nothing to tell the host.
        self.proxy
            .unsubscribe_property(&self.property, &self.listener_id);
    }
}

// ============================================================================
// CollectionMirror
// ============================================================================

/// An observable collection mirrored into a local reactive cell.
///
/// Change granularity is the whole collection: every `<Name>Changed` event
/// triggers a getter round trip and replaces the mirrored value.
pub struct CollectionMirror {
    proxy: ServiceProxy,
    event: String,
    rx: watch::Receiver<Value>,
    listener_id: Option<ListenerId>,
}

impl CollectionMirror {
    /// Binds a mirror to `collection`: fetches the current contents, then
    /// subscribes to the collection's `<Name>Changed` event.
    ///
    /// # Errors
    ///
    /// Fails when the property or its change event is undeclared, or the
    /// initial fetch fails.
    pub async fn bind(proxy: &ServiceProxy, collection: &str) -> Result<Self> {
        let event = format!("{collection}Changed");

        let initial = proxy.get_property(collection).await?;
        let (tx, rx) = watch::channel(initial);
        let tx = Arc::new(tx);

        let refresh_proxy = proxy.clone();
        let refresh_name = collection.to_string();
        let listener_id = proxy
            .subscribe_event(
                &event,
                Arc::new(move |_payload| {
                    // Re-fetch off the delivery thread; the push payload is
                    // only a change signal, not the data.
                    let proxy = refresh_proxy.clone();
                    let name = refresh_name.clone();
                    let tx = Arc::clone(&tx);
                    tokio::spawn(async move {
                        match proxy.get_property(&name).await {
                            Ok(value) => {
                                let _ = tx.send(value);
                            }
                            Err(e) => {
                                warn!(error = %e, collection = %name, "Collection refresh failed");
                            }
                        }
                    });
                }),
            )
            .await?;

        debug!(service = %proxy.service_name(), collection, "Collection mirror bound");

        Ok(Self {
            proxy: proxy.clone(),
            event,
            rx,
            listener_id: Some(listener_id),
        })
    }

    /// Returns the mirrored collection.
    #[must_use]
    pub fn get(&self) -> Value {
        self.rx.borrow().clone()
    }

    /// Returns a watch handle for awaiting replacements.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Value> {
        self.rx.clone()
    }

    /// Releases the host-side event subscription and detaches.
    pub async fn unbind(mut self) -> Result<()> {
        if let Some(listener_id) = self.listener_id.take() {
            self.proxy.unsubscribe_event(&self.event, listener_id).await?;
        }
        Ok(())
    }
}

impl Drop for CollectionMirror {
    fn drop(&mut self) {
        // Local detach only; the host keeps forwarding until unbind or
        // unregister, which is safe to ignore.
        if let Some(listener_id) = self.listener_id.take() {
            self.proxy
                .remove_event_listener_local(&self.event, &listener_id);
        }
    }
}
