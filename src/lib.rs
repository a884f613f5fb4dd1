//! Webview bridge - expose native services to embedded web content.
//!
//! This library lets a host application expose named "services" (objects
//! with methods, events, and observable properties) to a script
//! environment across a process/runtime boundary, without the service
//! implementations knowing they are exposed.
//!
//! # Architecture
//!
//! Two cooperating halves connected only by an opaque string channel:
//!
//! - **Host bridge**: owns service instances, answers calls, relays native
//!   events and property changes as asynchronous pushes
//! - **Client bridge**: rebuilds a callable, observable stub per remote
//!   service from metadata alone, correlates replies by message id, fans
//!   pushes out to local subscribers
//!
//! Key design principles:
//!
//! - Services declare their surface as an explicit schema table (no
//!   runtime introspection)
//! - Every relayable event is normalized to one `(service, member,
//!   payload)` emitter shape
//! - Stubs are table-driven, built once per metadata snapshot
//! - All state is owned by a bridge instance; there are no globals
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use webview_bridge::{ClientBridge, HostBridge, Result, transport};
//!
//! # use serde_json::Value;
//! # use webview_bridge::{BridgeService, ServiceSchema};
//! # struct TodoService;
//! # impl BridgeService for TodoService {
//! #     fn schema(&self) -> ServiceSchema { ServiceSchema::builder().build() }
//! #     fn invoke(&self, _: &str, _: Vec<Value>) -> Result<Value> { Ok(Value::Null) }
//! #     fn get_property(&self, _: &str) -> Result<Value> { Ok(Value::Null) }
//! # }
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // One string channel is all the bridge needs from its embedding.
//!     let (host_end, client_end) = transport::pair();
//!
//!     let host = HostBridge::attach(Arc::new(host_end));
//!     host.register("Todo", Arc::new(TodoService))?;
//!
//!     let client = ClientBridge::attach(Arc::new(client_end));
//!     let todo = client.get_service("Todo").await?;
//!     todo.call("Add", vec!["buy milk".into()]).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`channel`] | The [`MessageChannel`] contract |
//! | [`client`] | Client bridge: stubs, correlator, reactive hooks |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`host`] | Host bridge: registry, dispatcher, relay |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire envelope and metadata types |
//! | [`transport`] | Channel implementations (in-process pair, WebSocket) |

// ============================================================================
// Modules
// ============================================================================

/// The opaque string channel contract.
pub mod channel;

/// Client half: discovery, stubs, correlation, hooks.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Host half: registration, dispatch, relay.
pub mod host;

/// Type-safe identifiers for bridge entities.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Wire protocol message and metadata types.
pub mod protocol;

/// Channel implementations.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Channel contract
pub use channel::{MessageCallback, MessageChannel};

// Client types
pub use client::{ClientBridge, CollectionMirror, PropertyCell, ServiceProxy};

// Error types
pub use error::{Error, Result};

// Host types
pub use host::{BridgeService, HostBridge, HostBridgeBuilder, ReregisterPolicy, ServiceEmitter};

// Identifier types
pub use identifiers::{InstanceId, ListenerId, MessageId};

// Protocol types
pub use protocol::{
    BridgeMessage, MessageType, MethodMetadata, ParameterMetadata, PropertyMetadata,
    ServiceRegistration, ServiceSchema, TypeTag,
};
