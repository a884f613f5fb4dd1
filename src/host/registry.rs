//! Service registration and lifecycle.
//!
//! Singleton registrations are stored and announced immediately; transient
//! registrations store a factory and mint one instance (with a synthetic
//! instance id) per discovery request. Either way the schema is read once
//! per instance and every declared event gets a listener record.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::identifiers::InstanceId;
use crate::protocol::{BridgeMessage, ServiceRegistration};

use super::relay::ServiceEmitter;
use super::service::{BridgeService, ReregisterPolicy, ServiceFactory};
use super::{HostBridge, HostInner, RegisteredEntry};

// ============================================================================
// HostBridge API
// ============================================================================

impl HostBridge {
    /// Registers a singleton service and announces it to the client.
    ///
    /// The instance is introspected exactly once through its schema table;
    /// the announcement push carries the metadata snapshot with current
    /// property values.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRegistration`] for an empty name
    /// - [`Error::ServiceExists`] under the reject policy
    /// - [`Error::Disposed`] after `dispose`
    pub fn register(&self, name: &str, service: Arc<dyn BridgeService>) -> Result<()> {
        self.inner.register_singleton(name, service)
    }

    /// Registers a transient service factory.
    ///
    /// Nothing is announced: each `getService` discovery request mints one
    /// fresh instance scoped by a synthetic instance id, and its metadata is
    /// never cached host-side.
    ///
    /// # Errors
    ///
    /// Same conditions as [`register`](HostBridge::register).
    pub fn register_transient<F>(&self, name: &str, factory: F) -> Result<()>
    where
        F: Fn() -> Arc<dyn BridgeService> + Send + Sync + 'static,
    {
        self.inner.register_factory(name, Box::new(factory))
    }

    /// Removes a registration and every transient instance minted from it.
    ///
    /// Detaches emitters and drops listener records. Idempotent: returns
    /// `false` when nothing was registered under `name`.
    pub fn unregister(&self, name: &str) -> bool {
        self.inner.unregister(name)
    }

    /// Detaches every relay handler, clears the registries, and detaches
    /// from the channel. Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

// ============================================================================
// HostInner: registration
// ============================================================================

impl HostInner {
    fn check_name<'a>(&self, name: &'a str) -> Result<&'a str> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(Error::Disposed);
        }
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(Error::invalid_registration("service name cannot be empty"));
        }
        Ok(trimmed)
    }

    fn check_conflict(&self, name: &str) -> Result<()> {
        let taken =
            self.services.lock().contains_key(name) || self.factories.lock().contains_key(name);
        if taken && self.policy == ReregisterPolicy::Reject {
            return Err(Error::service_exists(name));
        }
        Ok(())
    }

    pub(crate) fn register_singleton(
        &self,
        name: &str,
        service: Arc<dyn BridgeService>,
    ) -> Result<()> {
        let name = self.check_name(name)?;
        self.check_conflict(name)?;

        let registration = self.install(name, name, service, None);
        self.outbound.send(&BridgeMessage::register_service(
            serde_json::to_value(&registration)?,
        ));

        info!(service = name, "Service registered");
        Ok(())
    }

    pub(crate) fn register_factory(&self, name: &str, factory: ServiceFactory) -> Result<()> {
        let name = self.check_name(name)?;
        self.check_conflict(name)?;

        self.factories.lock().insert(name.to_string(), factory);

        info!(service = name, "Transient service registered");
        Ok(())
    }

    /// Mints one transient instance for a discovery request.
    ///
    /// Returns the registration snapshot the reply carries; the instance
    /// lives under the scoped name until `unregister(base)` or `dispose`.
    pub(crate) fn mint_transient(&self, base_name: &str) -> Option<ServiceRegistration> {
        let service = {
            let factories = self.factories.lock();
            let factory = factories.get(base_name)?;
            factory()
        };

        let instance_id = InstanceId::generate();
        let scoped = format!("{base_name}#{instance_id}");

        let registration = self.install(&scoped, base_name, service, Some(instance_id));

        debug!(service = base_name, instance = %scoped, "Transient instance minted");
        Some(registration)
    }

    /// Stores an entry, creates its listener records, attaches its emitter,
    /// and returns the metadata snapshot.
    fn install(
        &self,
        entry_name: &str,
        base_name: &str,
        service: Arc<dyn BridgeService>,
        instance_id: Option<InstanceId>,
    ) -> ServiceRegistration {
        let schema = Arc::new(service.schema());
        let detached = Arc::new(AtomicBool::new(false));

        // Replacing an existing entry orphans its subscriptions; the old
        // instance's emitter goes quiet but client-side listener sets are
        // not migrated.
        if let Some(previous) = self.services.lock().remove(entry_name) {
            warn!(service = entry_name, "Replacing existing registration");
            self.detach_entry(entry_name, &previous);
        }

        {
            let mut subscriptions = self.subscriptions.lock();
            for event in schema.events() {
                subscriptions
                    .entry((entry_name.to_string(), event.clone()))
                    .or_default();
            }
        }

        let emitter = ServiceEmitter::new(
            entry_name.to_string(),
            Arc::downgrade(&service),
            Arc::clone(&schema),
            Arc::clone(&self.outbound),
            Arc::clone(&detached),
        );
        service.attach(emitter);

        let mut registration =
            schema.snapshot(entry_name, |p| service.get_property(&p.name).ok());
        registration.instance_id = instance_id;

        self.services.lock().insert(
            entry_name.to_string(),
            RegisteredEntry {
                service,
                schema,
                detached,
                base_name: base_name.to_string(),
            },
        );

        registration
    }

    fn detach_entry(&self, entry_name: &str, entry: &RegisteredEntry) {
        entry.detached.store(true, Ordering::Release);
        entry.service.detach();
        self.subscriptions
            .lock()
            .retain(|(service, _), _| service != entry_name);
    }

    pub(crate) fn unregister(&self, name: &str) -> bool {
        let removed_factory = self.factories.lock().remove(name).is_some();

        // Take the singleton and any transient instances minted from it.
        let removed: Vec<(String, RegisteredEntry)> = {
            let mut services = self.services.lock();
            let keys: Vec<String> = services
                .iter()
                .filter(|(_, entry)| entry.base_name == name)
                .map(|(key, _)| key.clone())
                .collect();
            keys.into_iter()
                .filter_map(|key| services.remove(&key).map(|entry| (key, entry)))
                .collect()
        };

        for (key, entry) in &removed {
            self.detach_entry(key, entry);
        }

        let any = removed_factory || !removed.is_empty();
        if any {
            info!(service = name, instances = removed.len(), "Service unregistered");
        } else {
            debug!(service = name, "Unregister of unknown service ignored");
        }
        any
    }

    pub(crate) fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let entries: Vec<(String, RegisteredEntry)> =
            self.services.lock().drain().collect();
        for (_, entry) in &entries {
            entry.detached.store(true, Ordering::Release);
            entry.service.detach();
        }

        self.factories.lock().clear();
        self.subscriptions.lock().clear();
        self.outbound.close();
        self.outbound.channel().set_on_message(Arc::new(|_| {}));

        info!(services = entries.len(), "Host bridge disposed");
    }

    /// Reads a fresh metadata snapshot for a live entry.
    pub(crate) fn snapshot_entry(&self, name: &str) -> Option<ServiceRegistration> {
        let (service, schema) = {
            let services = self.services.lock();
            let entry = services.get(name)?;
            (Arc::clone(&entry.service), Arc::clone(&entry.schema))
        };
        Some(schema.snapshot(name, |p| service.get_property(&p.name).ok()))
    }

    /// Resolves a live entry for dispatch, without holding the lock across
    /// the invocation.
    pub(crate) fn resolve(
        &self,
        name: &str,
    ) -> Result<(Arc<dyn BridgeService>, Arc<crate::protocol::ServiceSchema>)> {
        let services = self.services.lock();
        services
            .get(name)
            .map(|entry| (Arc::clone(&entry.service), Arc::clone(&entry.schema)))
            .ok_or_else(|| Error::service_not_found(name))
    }
}

// ============================================================================
// Value helpers
// ============================================================================

impl HostInner {
    /// Renders a registration for a reply payload.
    pub(crate) fn registration_value(registration: &ServiceRegistration) -> Result<Value> {
        Ok(serde_json::to_value(registration)?)
    }
}
