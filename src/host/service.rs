//! The service seam: what a native object implements to be exposed.
//!
//! No runtime introspection happens anywhere in the bridge. A service
//! declares its own callable surface as a [`ServiceSchema`] table and
//! answers `invoke`/`get_property`/`set_property` against it; the bridge
//! only ever talks to this trait.
//!
//! Services with events or observable properties receive a
//! [`ServiceEmitter`] through [`attach`](BridgeService::attach) and push
//! into it from wherever their native callbacks fire.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::protocol::ServiceSchema;

use super::relay::ServiceEmitter;

// ============================================================================
// BridgeService
// ============================================================================

/// A native object exposed over the bridge.
///
/// Implementations stay ordinary business objects; the only bridge-aware
/// parts are the schema table and the emitter handle.
pub trait BridgeService: Send + Sync {
    /// Returns the service's callable surface.
    ///
    /// Read once per registration (and once per transient discovery); must
    /// be stable for the instance's lifetime.
    fn schema(&self) -> ServiceSchema;

    /// Invokes a declared method with already-coerced arguments.
    ///
    /// `args` is exactly as long as the method's parameter table; the
    /// dispatcher has applied defaults and zero values for omitted trailing
    /// arguments.
    ///
    /// # Errors
    ///
    /// Any error becomes an `errorResponse` reply; the bridge never retries.
    fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value>;

    /// Reads a declared property's current value.
    ///
    /// # Errors
    ///
    /// Read failures during relay degrade to the tag's zero value; during a
    /// `getProperty` round trip they become an `errorResponse`.
    fn get_property(&self, property: &str) -> Result<Value>;

    /// Writes a declared property.
    ///
    /// The default rejects writes; observable services override this.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Invocation`] for read-only properties.
    fn set_property(&self, property: &str, value: Value) -> Result<()> {
        let _ = value;
        Err(Error::invocation(format!(
            "Property '{property}' is read-only"
        )))
    }

    /// Hands the service its forwarding handle.
    ///
    /// Called once at registration (or transient minting). Services without
    /// events or observable properties can ignore it.
    fn attach(&self, emitter: ServiceEmitter) {
        let _ = emitter;
    }

    /// Called at unregistration/disposal; drop the emitter here.
    fn detach(&self) {}
}

// ============================================================================
// ServiceFactory
// ============================================================================

/// Mints one service instance per transient discovery request.
pub type ServiceFactory = Box<dyn Fn() -> Arc<dyn BridgeService> + Send + Sync>;

// ============================================================================
// ReregisterPolicy
// ============================================================================

/// What `register` does when the name is already taken.
///
/// The original design silently replaced the instance, orphaning existing
/// subscriptions; that behavior is kept as [`Replace`](Self::Replace) but is
/// a policy, not a hardcoded default you cannot opt out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReregisterPolicy {
    /// Replace the instance and metadata. Subscriptions to the old instance
    /// are not migrated (documented limitation).
    #[default]
    Replace,
    /// Fail with [`Error::ServiceExists`](crate::Error::ServiceExists).
    Reject,
}
