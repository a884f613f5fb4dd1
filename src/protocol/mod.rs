//! Wire protocol message types.
//!
//! This module defines the message format for communication between the
//! host bridge (native side) and the client bridge (script side).
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `registerService` | Host → Client | Service announcement (push) |
//! | `callMethod` | Client → Host | Method invocation request |
//! | `methodResult` | Host → Client | Terminal success reply |
//! | `errorResponse` | Host → Client | Terminal failure reply |
//! | `subscribeEvent` / `unsubscribeEvent` | Client → Host | Listener management |
//! | `eventFired` | Host → Client | Native event relay (push) |
//! | `propertyChangeFired` | Host → Client | Property change relay (push) |
//! | `getService` / `getProperty` / `setProperty` | Client → Host | Lazy discovery and property round trips |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `message` | The [`BridgeMessage`] envelope and [`MessageType`] |
//! | `metadata` | Schema tables and the [`ServiceRegistration`] snapshot |

// ============================================================================
// Submodules
// ============================================================================

/// The wire envelope and message type discriminator.
pub mod message;

/// Service schema tables and wire metadata snapshots.
pub mod metadata;

// ============================================================================
// Re-exports
// ============================================================================

pub use message::{BridgeMessage, MessageType};
pub use metadata::{
    MethodMetadata, ParameterMetadata, PropertyMetadata, PropertySnapshot, ServiceRegistration,
    ServiceSchema, ServiceSchemaBuilder, TypeTag,
};
