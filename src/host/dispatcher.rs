//! Incoming message routing.
//!
//! One entry point, [`HostInner::handle_incoming`], runs synchronously on
//! the channel's delivery thread. Every request gets exactly one terminal
//! reply — `methodResult` on success, `errorResponse` on failure — echoing
//! the request's `messageId`. Unparseable payloads reply with a null id.
//! Dispatch never panics and never lets a failure escape as a fault.

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::ListenerId;
use crate::protocol::{BridgeMessage, MessageType};

use super::HostInner;
use super::convert;

// ============================================================================
// Entry Point
// ============================================================================

impl HostInner {
    /// Handles one raw inbound payload.
    pub(crate) fn handle_incoming(&self, raw: &str) {
        if self.disposed.load(std::sync::atomic::Ordering::Acquire) {
            debug!("Dropping inbound message on disposed bridge");
            return;
        }

        let message = match BridgeMessage::decode(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Failed to parse inbound message");
                self.outbound
                    .send(&BridgeMessage::error_response(None, e.to_wire_string()));
                return;
            }
        };

        self.dispatch(message);
    }

    fn dispatch(&self, message: BridgeMessage) {
        let reply_to = message.message_id.clone();

        let outcome = match message.message_type {
            MessageType::CallMethod => self.handle_call(&message),
            MessageType::SubscribeEvent => self.handle_subscribe(&message),
            MessageType::UnsubscribeEvent => self.handle_unsubscribe(&message),
            MessageType::GetService => self.handle_get_service(&message),
            MessageType::GetProperty => self.handle_get_property(&message),
            MessageType::SetProperty => self.handle_set_property(&message),
            ref other => Err(Error::protocol(format!("Unknown message type: {other}"))),
        };

        match outcome {
            Ok(value) => self
                .outbound
                .send(&BridgeMessage::method_result(reply_to, value)),
            Err(e) => {
                debug!(error = %e, "Dispatch failed");
                self.outbound
                    .send(&BridgeMessage::error_response(reply_to, e.to_wire_string()));
            }
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

impl HostInner {
    fn handle_call(&self, message: &BridgeMessage) -> Result<Value> {
        let service_name = required(&message.service_name, "serviceName")?;
        let method_name = required(&message.method_name, "methodName")?;

        let (service, schema) = self.resolve(service_name)?;

        let method = schema
            .method(method_name)
            .ok_or_else(|| Error::method_not_found(service_name, method_name))?;

        let supplied = message.parameters.as_deref().unwrap_or(&[]);
        let args = convert::coerce_arguments(supplied, &method.parameters)?;

        // Invocation runs without any registry lock held; a slow method
        // blocks this reply, not the registry.
        service.invoke(method_name, args)
    }

    fn handle_subscribe(&self, message: &BridgeMessage) -> Result<Value> {
        let service_name = required(&message.service_name, "serviceName")?;
        let event_name = required(&message.method_name, "methodName")?;
        let listener_id = effective_listener_id(message);

        let key = (service_name.to_string(), event_name.to_string());
        let mut subscriptions = self.subscriptions.lock();
        let subscription = subscriptions
            .get_mut(&key)
            .ok_or_else(|| Error::event_not_found(service_name, event_name))?;

        subscription.add(listener_id.clone());
        debug!(service = service_name, event = event_name, listener = %listener_id, "Listener subscribed");

        Ok(json!({ "listenerId": listener_id }))
    }

    fn handle_unsubscribe(&self, message: &BridgeMessage) -> Result<Value> {
        let service_name = required(&message.service_name, "serviceName")?;
        let event_name = required(&message.method_name, "methodName")?;
        let listener_id = effective_listener_id(message);

        let key = (service_name.to_string(), event_name.to_string());
        let mut subscriptions = self.subscriptions.lock();
        let subscription = subscriptions
            .get_mut(&key)
            .ok_or_else(|| Error::event_not_found(service_name, event_name))?;

        // Removing an unknown listener succeeds and touches nothing else.
        if !subscription.remove(&listener_id) {
            debug!(listener = %listener_id, "Unsubscribe of unknown listener ignored");
        }

        Ok(json!({ "listenerId": listener_id }))
    }

    fn handle_get_service(&self, message: &BridgeMessage) -> Result<Value> {
        let service_name = required(&message.service_name, "serviceName")?;

        if let Some(registration) = self.snapshot_entry(service_name) {
            return Self::registration_value(&registration);
        }

        if let Some(registration) = self.mint_transient(service_name) {
            return Self::registration_value(&registration);
        }

        Err(Error::service_not_found(service_name))
    }

    fn handle_get_property(&self, message: &BridgeMessage) -> Result<Value> {
        let service_name = required(&message.service_name, "serviceName")?;
        let property_name = required(&message.method_name, "methodName")?;

        let (service, schema) = self.resolve(service_name)?;
        schema
            .property(property_name)
            .ok_or_else(|| Error::property_not_found(service_name, property_name))?;

        service.get_property(property_name)
    }

    fn handle_set_property(&self, message: &BridgeMessage) -> Result<Value> {
        let service_name = required(&message.service_name, "serviceName")?;
        let property_name = required(&message.method_name, "methodName")?;

        let (service, schema) = self.resolve(service_name)?;
        let descriptor = schema
            .property(property_name)
            .ok_or_else(|| Error::property_not_found(service_name, property_name))?;

        let supplied = message
            .parameters
            .as_ref()
            .and_then(|p| p.first().cloned())
            .unwrap_or(Value::Null);
        let value = convert::coerce_value(supplied, descriptor.type_tag)?;

        service.set_property(property_name, value)?;
        Ok(Value::Null)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn required<'a>(field: &'a Option<String>, what: &str) -> Result<&'a str> {
    field
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::protocol(format!("missing {what}")))
}

/// The listener id a subscription answers with: the caller's if supplied,
/// else the message id itself.
fn effective_listener_id(message: &BridgeMessage) -> ListenerId {
    message
        .listener_id
        .clone()
        .or_else(|| {
            message
                .message_id
                .as_ref()
                .map(ListenerId::from_message_id)
        })
        .unwrap_or_else(ListenerId::generate)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::channel::{MessageCallback, MessageChannel};
    use crate::error::Result;
    use crate::host::{BridgeService, HostBridge};
    use crate::protocol::{MethodMetadata, ServiceSchema, TypeTag};

    /// Channel that records every outbound payload; inbound is unused.
    #[derive(Default)]
    struct RecordingChannel {
        sent: Mutex<Vec<String>>,
    }

    impl RecordingChannel {
        fn drain(&self) -> Vec<BridgeMessage> {
            self.sent
                .lock()
                .drain(..)
                .map(|p| BridgeMessage::decode(&p).expect("valid outbound message"))
                .collect()
        }
    }

    impl MessageChannel for RecordingChannel {
        fn send(&self, payload: String) -> Result<()> {
            self.sent.lock().push(payload);
            Ok(())
        }

        fn set_on_message(&self, _callback: MessageCallback) {}
    }

    struct EchoService;

    impl BridgeService for EchoService {
        fn schema(&self) -> ServiceSchema {
            ServiceSchema::builder()
                .method(
                    MethodMetadata::new("Echo")
                        .param("text", TypeTag::Text)
                        .returns(TypeTag::Text),
                )
                .event("Echoed")
                .build()
        }

        fn invoke(&self, _method: &str, mut args: Vec<Value>) -> Result<Value> {
            Ok(args.remove(0))
        }

        fn get_property(&self, property: &str) -> Result<Value> {
            Err(Error::invocation(format!("no property {property}")))
        }
    }

    fn recording_host() -> (HostBridge, Arc<RecordingChannel>) {
        let channel = Arc::new(RecordingChannel::default());
        let host = HostBridge::attach(Arc::clone(&channel) as Arc<dyn MessageChannel>);
        host.register("Echo", Arc::new(EchoService)).expect("register");
        channel.drain(); // discard the announcement push
        (host, channel)
    }

    #[test]
    fn test_reply_echoes_request_id() {
        let (host, channel) = recording_host();

        let request = BridgeMessage::call_method("Echo", "Echo", vec![Value::from("hi")]);
        host.inner.handle_incoming(&request.encode().expect("encode"));

        let replies = channel.drain();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].message_id, request.message_id);
        assert!(replies[0].success);
        assert_eq!(replies[0].result, Some(Value::from("hi")));
    }

    #[test]
    fn test_unknown_service_is_structured_error() {
        let (host, channel) = recording_host();

        let request = BridgeMessage::call_method("Nope", "Echo", vec![]);
        host.inner.handle_incoming(&request.encode().expect("encode"));

        let replies = channel.drain();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].message_id, request.message_id);
        assert!(!replies[0].success);
        let error = replies[0].error.as_deref().expect("error string");
        assert!(error.contains("Nope"), "{error}");
    }

    #[test]
    fn test_unknown_method_names_method_and_service() {
        let (host, channel) = recording_host();

        let request = BridgeMessage::call_method("Echo", "DoesNotExist", vec![]);
        host.inner.handle_incoming(&request.encode().expect("encode"));

        let error = channel.drain()[0].error.clone().expect("error string");
        assert!(error.contains("DoesNotExist"), "{error}");
        assert!(error.contains("Echo"), "{error}");
    }

    #[test]
    fn test_unknown_type_is_named_in_reply() {
        let (host, channel) = recording_host();

        host.inner
            .handle_incoming(r#"{"messageId":"m1","type":"frobnicate"}"#);

        let replies = channel.drain();
        assert_eq!(replies[0].message_id.as_ref().map(|id| id.as_str()), Some("m1"));
        assert!(replies[0].error.as_deref().expect("error").contains("frobnicate"));
    }

    #[test]
    fn test_malformed_payload_degrades_to_null_id_error() {
        let (host, channel) = recording_host();

        host.inner.handle_incoming("this is not json");

        let replies = channel.drain();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].message_id, None);
        assert!(!replies[0].success);
        assert!(replies[0].error.is_some());
    }

    #[test]
    fn test_subscribe_confirms_callers_listener_id() {
        let (host, channel) = recording_host();

        let request = BridgeMessage::subscribe_event("Echo", "Echoed", ListenerId::from("L1"));
        host.inner.handle_incoming(&request.encode().expect("encode"));

        let replies = channel.drain();
        assert!(replies[0].success);
        assert_eq!(
            replies[0].result.as_ref().and_then(|r| r.get("listenerId")),
            Some(&Value::from("L1"))
        );
    }

    #[test]
    fn test_subscribe_unknown_event_is_error() {
        let (host, channel) = recording_host();

        let request = BridgeMessage::subscribe_event("Echo", "Nothing", ListenerId::from("L1"));
        host.inner.handle_incoming(&request.encode().expect("encode"));

        let replies = channel.drain();
        assert!(!replies[0].success);
        assert!(replies[0].error.as_deref().expect("error").contains("Nothing"));
    }

    #[test]
    fn test_required_rejects_missing_and_empty() {
        assert!(required(&None, "serviceName").is_err());
        assert!(required(&Some(String::new()), "serviceName").is_err());
        assert_eq!(
            required(&Some("Todo".to_string()), "serviceName").expect("present"),
            "Todo"
        );
    }

    #[test]
    fn test_effective_listener_prefers_explicit_id() {
        let mut message = BridgeMessage::call_method("Todo", "Add", vec![]);
        message.listener_id = Some(ListenerId::from("L1"));
        assert_eq!(effective_listener_id(&message).as_str(), "L1");
    }

    #[test]
    fn test_effective_listener_falls_back_to_message_id() {
        let message = BridgeMessage::call_method("Todo", "Add", vec![]);
        let expected = message.message_id.clone().expect("id");
        assert_eq!(
            effective_listener_id(&message).as_str(),
            expected.as_str()
        );
    }
}
