//! The bridge wire envelope.
//!
//! Every payload crossing the channel is one [`BridgeMessage`] serialized as
//! a JSON object. Requests and their terminal replies share a `messageId`;
//! pushes carry a fresh id that is never correlated.
//!
//! # Format
//!
//! ```json
//! {
//!   "messageId": "uuid-or-any-string",
//!   "type": "callMethod",
//!   "serviceName": "Todo",
//!   "methodName": "Add",
//!   "listenerId": null,
//!   "parameters": ["buy milk"],
//!   "result": null,
//!   "error": null,
//!   "success": false
//! }
//! ```
//!
//! Exactly one of `result`/`error` is meaningful on replies, selected by
//! `success`. `type` is canonical camelCase on send and case-insensitive on
//! receipt.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::{ListenerId, MessageId};

// ============================================================================
// MessageType
// ============================================================================

/// Message type discriminator.
///
/// Request→response pairs plus the unsolicited pushes `EventFired` and
/// `PropertyChangeFired`. An unrecognized string on receipt parses to
/// [`MessageType::Unknown`] so the dispatcher can name it in its reply
/// instead of dropping the whole envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageType {
    /// Host announces a service registration (push).
    RegisterService,
    /// Client invokes a service method.
    CallMethod,
    /// Terminal success reply to any request.
    MethodResult,
    /// Client subscribes a listener to an event.
    SubscribeEvent,
    /// Client removes an event listener.
    UnsubscribeEvent,
    /// Host relays a native event (push).
    EventFired,
    /// Terminal failure reply to any request.
    ErrorResponse,
    /// Host relays an observable property change (push).
    PropertyChangeFired,
    /// Client requests service metadata (lazy discovery).
    GetService,
    /// Client reads a property through a round trip.
    GetProperty,
    /// Client writes a property through a round trip.
    SetProperty,
    /// Anything the receiver does not recognize.
    Unknown(String),
}

impl MessageType {
    /// Returns the canonical camelCase wire name.
    #[must_use]
    pub fn as_wire_str(&self) -> &str {
        match self {
            Self::RegisterService => "registerService",
            Self::CallMethod => "callMethod",
            Self::MethodResult => "methodResult",
            Self::SubscribeEvent => "subscribeEvent",
            Self::UnsubscribeEvent => "unsubscribeEvent",
            Self::EventFired => "eventFired",
            Self::ErrorResponse => "errorResponse",
            Self::PropertyChangeFired => "propertyChangeFired",
            Self::GetService => "getService",
            Self::GetProperty => "getProperty",
            Self::SetProperty => "setProperty",
            Self::Unknown(name) => name,
        }
    }

    /// Parses a wire name, ignoring ASCII case.
    #[must_use]
    pub fn from_wire_str(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "registerservice" => Self::RegisterService,
            "callmethod" => Self::CallMethod,
            "methodresult" => Self::MethodResult,
            "subscribeevent" => Self::SubscribeEvent,
            "unsubscribeevent" => Self::UnsubscribeEvent,
            "eventfired" => Self::EventFired,
            "errorresponse" => Self::ErrorResponse,
            "propertychangefired" => Self::PropertyChangeFired,
            "getservice" => Self::GetService,
            "getproperty" => Self::GetProperty,
            "setproperty" => Self::SetProperty,
            _ => Self::Unknown(name.to_string()),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire_str())
    }
}

impl Serialize for MessageType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire_str())
    }
}

impl<'de> Deserialize<'de> for MessageType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        if name.is_empty() {
            return Err(de::Error::custom("empty message type"));
        }
        Ok(Self::from_wire_str(&name))
    }
}

// ============================================================================
// BridgeMessage
// ============================================================================

/// The single wire envelope for all bridge traffic.
///
/// All nine fields are serialized on every message (absent values as
/// `null`), so any peer can parse any message with one shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeMessage {
    /// Correlation id; `None` only on generic parse-failure error replies.
    #[serde(default)]
    pub message_id: Option<MessageId>,

    /// Message type discriminator.
    #[serde(rename = "type")]
    pub message_type: MessageType,

    /// Service the message addresses, if any.
    #[serde(default)]
    pub service_name: Option<String>,

    /// Member name: a method, an event, or a property depending on `type`.
    #[serde(default)]
    pub method_name: Option<String>,

    /// Subscription handle, independent of `message_id`.
    #[serde(default)]
    pub listener_id: Option<ListenerId>,

    /// Ordered call arguments.
    #[serde(default)]
    pub parameters: Option<Vec<Value>>,

    /// Return value or push payload; meaningful iff `success`.
    #[serde(default)]
    pub result: Option<Value>,

    /// Diagnostic string; meaningful iff `!success`.
    #[serde(default)]
    pub error: Option<String>,

    /// Selects which of `result`/`error` is meaningful.
    #[serde(default)]
    pub success: bool,
}

impl BridgeMessage {
    fn request(message_type: MessageType, service: &str) -> Self {
        Self {
            message_id: Some(MessageId::generate()),
            message_type,
            service_name: Some(service.to_string()),
            method_name: None,
            listener_id: None,
            parameters: None,
            result: None,
            error: None,
            success: false,
        }
    }

    /// Builds a `callMethod` request with a fresh correlation id.
    #[must_use]
    pub fn call_method(service: &str, method: &str, parameters: Vec<Value>) -> Self {
        let mut msg = Self::request(MessageType::CallMethod, service);
        msg.method_name = Some(method.to_string());
        msg.parameters = Some(parameters);
        msg
    }

    /// Builds a `getService` discovery request.
    #[must_use]
    pub fn get_service(service: &str) -> Self {
        Self::request(MessageType::GetService, service)
    }

    /// Builds a `getProperty` round-trip request.
    ///
    /// The property name rides in the overloaded member slot.
    #[must_use]
    pub fn get_property(service: &str, property: &str) -> Self {
        let mut msg = Self::request(MessageType::GetProperty, service);
        msg.method_name = Some(property.to_string());
        msg
    }

    /// Builds a `setProperty` round-trip request.
    #[must_use]
    pub fn set_property(service: &str, property: &str, value: Value) -> Self {
        let mut msg = Self::request(MessageType::SetProperty, service);
        msg.method_name = Some(property.to_string());
        msg.parameters = Some(vec![value]);
        msg
    }

    /// Builds a `subscribeEvent` request carrying the listener id.
    #[must_use]
    pub fn subscribe_event(service: &str, event: &str, listener_id: ListenerId) -> Self {
        let mut msg = Self::request(MessageType::SubscribeEvent, service);
        msg.method_name = Some(event.to_string());
        msg.listener_id = Some(listener_id);
        msg
    }

    /// Builds an `unsubscribeEvent` request carrying the listener id.
    #[must_use]
    pub fn unsubscribe_event(service: &str, event: &str, listener_id: ListenerId) -> Self {
        let mut msg = Self::request(MessageType::UnsubscribeEvent, service);
        msg.method_name = Some(event.to_string());
        msg.listener_id = Some(listener_id);
        msg
    }

    /// Builds the terminal success reply for `reply_to`.
    #[must_use]
    pub fn method_result(reply_to: Option<MessageId>, result: Value) -> Self {
        Self {
            message_id: reply_to,
            message_type: MessageType::MethodResult,
            service_name: None,
            method_name: None,
            listener_id: None,
            parameters: None,
            result: Some(result),
            error: None,
            success: true,
        }
    }

    /// Builds the terminal failure reply for `reply_to`.
    ///
    /// `reply_to` is `None` when the request was unparseable.
    #[must_use]
    pub fn error_response(reply_to: Option<MessageId>, error: impl Into<String>) -> Self {
        Self {
            message_id: reply_to,
            message_type: MessageType::ErrorResponse,
            service_name: None,
            method_name: None,
            listener_id: None,
            parameters: None,
            result: None,
            error: Some(error.into()),
            success: false,
        }
    }

    /// Builds the `registerService` announcement push.
    #[must_use]
    pub fn register_service(registration: Value) -> Self {
        Self {
            message_id: Some(MessageId::generate()),
            message_type: MessageType::RegisterService,
            service_name: None,
            method_name: None,
            listener_id: None,
            parameters: None,
            result: Some(registration),
            error: None,
            success: true,
        }
    }

    /// Builds an `eventFired` push.
    #[must_use]
    pub fn event_fired(service: &str, event: &str, payload: Value) -> Self {
        Self {
            message_id: Some(MessageId::generate()),
            message_type: MessageType::EventFired,
            service_name: Some(service.to_string()),
            method_name: Some(event.to_string()),
            listener_id: None,
            parameters: None,
            result: Some(payload),
            error: None,
            success: true,
        }
    }

    /// Builds a `propertyChangeFired` push.
    ///
    /// The payload carries `{propertyName, value}` alongside the member slot
    /// so subscribers need not re-read the envelope.
    #[must_use]
    pub fn property_change_fired(service: &str, property: &str, value: Value) -> Self {
        Self {
            message_id: Some(MessageId::generate()),
            message_type: MessageType::PropertyChangeFired,
            service_name: Some(service.to_string()),
            method_name: Some(property.to_string()),
            listener_id: None,
            parameters: None,
            result: Some(serde_json::json!({
                "propertyName": property,
                "value": value,
            })),
            error: None,
            success: true,
        }
    }

    /// Returns `true` for the unsolicited push types.
    #[inline]
    #[must_use]
    pub fn is_push(&self) -> bool {
        matches!(
            self.message_type,
            MessageType::RegisterService
                | MessageType::EventFired
                | MessageType::PropertyChangeFired
        )
    }

    /// Extracts a reply's payload, honoring the `success` selector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Remote`] carrying the wire `error` string when
    /// `success` is false.
    pub fn into_reply_result(self) -> Result<Value> {
        if self.success {
            Ok(self.result.unwrap_or(Value::Null))
        } else {
            Err(Error::remote(
                self.error.unwrap_or_else(|| "Unknown error".to_string()),
            ))
        }
    }

    /// Serializes this message to its wire form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a wire payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] describing the malformed payload. Parsing
    /// failures never panic; receivers degrade them to a generic
    /// `errorResponse` (host) or a log line (client).
    pub fn decode(payload: &str) -> Result<Self> {
        serde_json::from_str(payload)
            .map_err(|e| Error::protocol(format!("Invalid message format: {e}")))
    }
}

// ============================================================================
// Tests
// ============================================================================
