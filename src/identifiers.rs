//! Type-safe identifiers for bridge entities.
//!
//! Newtype wrappers prevent mixing incompatible IDs at compile time:
//!
//! | Type | Identifies |
//! |------|-----------|
//! | [`MessageId`] | One request/reply pair (correlation id) |
//! | [`ListenerId`] | One event subscription, independent of any message |
//! | [`InstanceId`] | One minted transient service instance |
//!
//! Freshly minted ids are UUID v4, but the wire type is an opaque string:
//! correlation only ever echoes ids back, so a peer may use any id scheme it
//! likes and the bridge round-trips it untouched.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// MessageId
// ============================================================================

/// Correlation identifier linking a request to its terminal reply.
///
/// A reply always echoes the request's id. Pushes carry a fresh id that is
/// never correlated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Generates a fresh, collision-resistant id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ============================================================================
// ListenerId
// ============================================================================

/// Identifies one subscription, independent of the message that created it.
///
/// Subscribers receive this from `subscribe` and hand it back to
/// `unsubscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenerId(String);

impl ListenerId {
    /// Generates a fresh listener id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Reuses a message id as the listener id.
    ///
    /// The host confirms subscriptions with the caller's listener id if one
    /// was supplied, else the message id itself.
    #[inline]
    #[must_use]
    pub fn from_message_id(id: &MessageId) -> Self {
        Self(id.as_str().to_string())
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ListenerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ============================================================================
// InstanceId
// ============================================================================

/// Synthetic identifier for a transient service instance.
///
/// Minted once per discovery request; scopes the instance's registered name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Generates a fresh instance id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_ids_are_unique() {
        let a = MessageId::generate();
        let b = MessageId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_listener_from_message_id() {
        let msg = MessageId::generate();
        let listener = ListenerId::from_message_id(&msg);
        assert_eq!(listener.as_str(), msg.as_str());
    }

    #[test]
    fn test_foreign_id_round_trip() {
        // A peer may use any id scheme; the bridge must echo it untouched.
        let id: MessageId = serde_json::from_str("\"msg_1_1700000000_abc123\"").expect("parse");
        assert_eq!(id.as_str(), "msg_1_1700000000_abc123");
    }

    #[test]
    fn test_serde_transparent() {
        let id = MessageId::generate();
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, format!("\"{id}\""));

        let back: MessageId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }
}
