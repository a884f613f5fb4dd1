//! Error types for the webview bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use webview_bridge::{Result, Error};
//!
//! async fn example(bridge: &ClientBridge) -> Result<()> {
//!     let todo = bridge.get_service("Todo").await?;
//!     todo.call("Add", vec!["buy milk".into()]).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Registration | [`Error::InvalidRegistration`], [`Error::ServiceExists`] |
//! | Resolution | [`Error::ServiceNotFound`], [`Error::MethodNotFound`], [`Error::EventNotFound`], [`Error::PropertyNotFound`] |
//! | Dispatch | [`Error::Conversion`], [`Error::Invocation`] |
//! | Protocol | [`Error::Protocol`], [`Error::Remote`] |
//! | Channel | [`Error::Channel`], [`Error::ChannelClosed`], [`Error::Disposed`] |
//! | Waiting | [`Error::ServiceTimeout`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging. Host-side dispatch
/// never surfaces these as faults: they are rendered into `errorResponse`
/// replies. Client-side they reject the pending call's future.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Registration Errors
    // ========================================================================
    /// Service registration rejected.
    ///
    /// Returned when a registration request is malformed (empty name).
    #[error("Invalid registration: {message}")]
    InvalidRegistration {
        /// Description of the registration problem.
        message: String,
    },

    /// Service name already registered.
    ///
    /// Returned under the `Reject` re-registration policy when a name is
    /// registered twice.
    #[error("Service '{service}' is already registered")]
    ServiceExists {
        /// The conflicting service name.
        service: String,
    },

    // ========================================================================
    // Resolution Errors
    // ========================================================================
    /// No service registered under the requested name.
    #[error("Service '{service}' not found")]
    ServiceNotFound {
        /// The missing service name.
        service: String,
    },

    /// Service has no such method in its schema.
    #[error("Method '{method}' not found in service '{service}'")]
    MethodNotFound {
        /// The service that was resolved.
        service: String,
        /// The missing method name.
        method: String,
    },

    /// Service declares no such event.
    #[error("Event '{event}' not found in service '{service}'")]
    EventNotFound {
        /// The service that was resolved.
        service: String,
        /// The missing event name.
        event: String,
    },

    /// Service declares no such property.
    #[error("Property '{property}' not found in service '{service}'")]
    PropertyNotFound {
        /// The service that was resolved.
        service: String,
        /// The missing property name.
        property: String,
    },

    // ========================================================================
    // Dispatch Errors
    // ========================================================================
    /// Argument could not be coerced to the declared parameter type.
    ///
    /// The call is not invoked when conversion fails.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of the failed coercion.
        message: String,
    },

    /// The underlying service method failed.
    #[error("Invocation error: {message}")]
    Invocation {
        /// Message from the service implementation.
        message: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Malformed payload or unknown message type.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// The remote side answered with an `errorResponse`.
    ///
    /// Client-side only: carries the wire `error` string verbatim.
    #[error("Remote error: {message}")]
    Remote {
        /// Diagnostic string from the remote reply.
        message: String,
    },

    // ========================================================================
    // Channel Errors
    // ========================================================================
    /// The channel rejected an outbound payload.
    #[error("Channel error: {message}")]
    Channel {
        /// Description of the send failure.
        message: String,
    },

    /// The channel or its peer has gone away.
    #[error("Channel closed")]
    ChannelClosed,

    /// Operation on a disposed bridge.
    #[error("Bridge is disposed")]
    Disposed,

    // ========================================================================
    // Waiting Errors
    // ========================================================================
    /// `wait_for_service` gave up.
    ///
    /// The only timeout the bridge enforces; pending calls are never timed
    /// out by the bridge itself.
    #[error("Service '{service}' not available after {timeout_ms}ms")]
    ServiceTimeout {
        /// The service that never appeared.
        service: String,
        /// Milliseconds waited before giving up.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an invalid registration error.
    #[inline]
    pub fn invalid_registration(message: impl Into<String>) -> Self {
        Self::InvalidRegistration {
            message: message.into(),
        }
    }

    /// Creates a service exists error.
    #[inline]
    pub fn service_exists(service: impl Into<String>) -> Self {
        Self::ServiceExists {
            service: service.into(),
        }
    }

    /// Creates a service not found error.
    #[inline]
    pub fn service_not_found(service: impl Into<String>) -> Self {
        Self::ServiceNotFound {
            service: service.into(),
        }
    }

    /// Creates a method not found error.
    #[inline]
    pub fn method_not_found(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self::MethodNotFound {
            service: service.into(),
            method: method.into(),
        }
    }

    /// Creates an event not found error.
    #[inline]
    pub fn event_not_found(service: impl Into<String>, event: impl Into<String>) -> Self {
        Self::EventNotFound {
            service: service.into(),
            event: event.into(),
        }
    }

    /// Creates a property not found error.
    #[inline]
    pub fn property_not_found(service: impl Into<String>, property: impl Into<String>) -> Self {
        Self::PropertyNotFound {
            service: service.into(),
            property: property.into(),
        }
    }

    /// Creates a conversion error.
    #[inline]
    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion {
            message: message.into(),
        }
    }

    /// Creates an invocation error.
    #[inline]
    pub fn invocation(message: impl Into<String>) -> Self {
        Self::Invocation {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a remote error.
    #[inline]
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Creates a channel error.
    #[inline]
    pub fn channel(message: impl Into<String>) -> Self {
        Self::Channel {
            message: message.into(),
        }
    }

    /// Creates a service timeout error.
    #[inline]
    pub fn service_timeout(service: impl Into<String>, timeout_ms: u64) -> Self {
        Self::ServiceTimeout {
            service: service.into(),
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a resolution error (unknown name).
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ServiceNotFound { .. }
                | Self::MethodNotFound { .. }
                | Self::EventNotFound { .. }
                | Self::PropertyNotFound { .. }
        )
    }

    /// Returns `true` if this error came back over the wire.
    #[inline]
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// Returns `true` if this is a channel-level error.
    #[inline]
    #[must_use]
    pub fn is_channel_error(&self) -> bool {
        matches!(
            self,
            Self::Channel { .. } | Self::ChannelClosed | Self::Disposed | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ServiceTimeout { .. })
    }

    /// Renders this error as the diagnostic string carried by an
    /// `errorResponse` reply.
    #[inline]
    #[must_use]
    pub fn to_wire_string(&self) -> String {
        self.to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::service_not_found("Todo");
        assert_eq!(err.to_string(), "Service 'Todo' not found");
    }

    #[test]
    fn test_method_not_found_names_both() {
        let err = Error::method_not_found("Todo", "DoesNotExist");
        let text = err.to_string();
        assert!(text.contains("DoesNotExist"));
        assert!(text.contains("Todo"));
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::service_not_found("X").is_not_found());
        assert!(Error::event_not_found("X", "Y").is_not_found());
        assert!(!Error::protocol("bad").is_not_found());
    }

    #[test]
    fn test_is_channel_error() {
        assert!(Error::ChannelClosed.is_channel_error());
        assert!(Error::channel("pipe broke").is_channel_error());
        assert!(Error::Disposed.is_channel_error());
        assert!(!Error::remote("boom").is_channel_error());
    }

    #[test]
    fn test_is_timeout() {
        let err = Error::service_timeout("Todo", 10_000);
        assert!(err.is_timeout());
        assert!(!Error::ChannelClosed.is_timeout());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
