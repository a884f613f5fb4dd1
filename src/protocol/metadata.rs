//! Service metadata: schema tables and the wire registration snapshot.
//!
//! A service's callable surface is declared once as a [`ServiceSchema`]
//! (methods, events, properties), assembled with [`ServiceSchemaBuilder`].
//! At registration or discovery time the host snapshots the schema plus the
//! current property values into a [`ServiceRegistration`], the metadata the
//! client rebuilds its stub from. The client treats the snapshot as
//! immutable for the stub's lifetime.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::InstanceId;

// ============================================================================
// TypeTag
// ============================================================================

/// Simple type tag carried by parameter, return, and property descriptors.
///
/// Drives argument coercion on the host and is advisory on the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TypeTag {
    /// UTF-8 text.
    Text,
    /// 64-bit signed integer.
    Integer,
    /// 64-bit float.
    Float,
    /// Boolean.
    Boolean,
    /// RFC 3339 date-time, carried as text on the wire.
    DateTime,
    /// Structurally complex value; passes through the wire serializer as-is.
    Object,
    /// JSON array; passes through as-is.
    Array,
    /// No value (method returns nothing).
    Void,
}

impl TypeTag {
    /// Returns the tag's zero value, used when a trailing argument is
    /// missing and no default is declared, and when a property read fails
    /// during relay.
    ///
    /// Scalars get real zeros; `object`/`array` keep reference semantics
    /// and degrade to `null`.
    #[must_use]
    pub fn zero_value(self) -> Value {
        match self {
            Self::Text => Value::String(String::new()),
            Self::Integer => Value::from(0i64),
            Self::Float => Value::from(0.0f64),
            Self::Boolean => Value::Bool(false),
            Self::DateTime => Value::String("1970-01-01T00:00:00Z".to_string()),
            Self::Object | Self::Array | Self::Void => Value::Null,
        }
    }
}

// ============================================================================
// ParameterMetadata
// ============================================================================

/// One method parameter descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterMetadata {
    /// Parameter name.
    pub name: String,

    /// Declared type tag.
    #[serde(rename = "type")]
    pub type_tag: TypeTag,

    /// Declared default, used when the argument is omitted.
    #[serde(default)]
    pub default: Option<Value>,
}

impl ParameterMetadata {
    /// Creates a parameter with no default.
    #[must_use]
    pub fn new(name: impl Into<String>, type_tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            type_tag,
            default: None,
        }
    }

    /// Creates a parameter with a declared default value.
    #[must_use]
    pub fn with_default(name: impl Into<String>, type_tag: TypeTag, default: Value) -> Self {
        Self {
            name: name.into(),
            type_tag,
            default: Some(default),
        }
    }
}

// ============================================================================
// MethodMetadata
// ============================================================================

/// One method descriptor: name, ordered parameters, return-type tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodMetadata {
    /// Method name as addressed over the wire.
    pub name: String,

    /// Ordered parameter descriptors.
    #[serde(default)]
    pub parameters: Vec<ParameterMetadata>,

    /// Return-type tag.
    pub return_type: TypeTag,
}

impl MethodMetadata {
    /// Creates a method descriptor with no parameters returning nothing.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            return_type: TypeTag::Void,
        }
    }

    /// Appends a required parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, type_tag: TypeTag) -> Self {
        self.parameters.push(ParameterMetadata::new(name, type_tag));
        self
    }

    /// Appends a parameter with a declared default.
    #[must_use]
    pub fn param_with_default(
        mut self,
        name: impl Into<String>,
        type_tag: TypeTag,
        default: Value,
    ) -> Self {
        self.parameters
            .push(ParameterMetadata::with_default(name, type_tag, default));
        self
    }

    /// Sets the return-type tag.
    #[must_use]
    pub fn returns(mut self, type_tag: TypeTag) -> Self {
        self.return_type = type_tag;
        self
    }
}

// ============================================================================
// PropertyMetadata
// ============================================================================

/// One property descriptor in the schema (no value; see
/// [`PropertySnapshot`] for the wire form).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyMetadata {
    /// Property name.
    pub name: String,

    /// Declared type tag.
    #[serde(rename = "type")]
    pub type_tag: TypeTag,
}

/// One property descriptor plus its value at snapshot time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySnapshot {
    /// Property name.
    pub name: String,

    /// Declared type tag.
    #[serde(rename = "type")]
    pub type_tag: TypeTag,

    /// Value read at registration/discovery time.
    pub value: Value,
}

// ============================================================================
// ServiceSchema
// ============================================================================

/// A service's static callable surface, supplied by the service itself.
///
/// Replaces runtime type introspection: the table is declared once, at
/// compile time or startup, and reused for every snapshot.
#[derive(Debug, Clone, Default)]
pub struct ServiceSchema {
    methods: Vec<MethodMetadata>,
    events: Vec<String>,
    properties: Vec<PropertyMetadata>,
    supports_property_changed: bool,
}

impl ServiceSchema {
    /// Starts building a schema.
    #[must_use]
    pub fn builder() -> ServiceSchemaBuilder {
        ServiceSchemaBuilder {
            schema: Self::default(),
        }
    }

    /// Looks up a method descriptor by name.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodMetadata> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Returns `true` if the schema declares the event.
    #[must_use]
    pub fn has_event(&self, name: &str) -> bool {
        self.events.iter().any(|e| e == name)
    }

    /// Looks up a property descriptor by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyMetadata> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Ordered method descriptors.
    #[must_use]
    pub fn methods(&self) -> &[MethodMetadata] {
        &self.methods
    }

    /// Declared event names.
    #[must_use]
    pub fn events(&self) -> &[String] {
        &self.events
    }

    /// Declared property descriptors.
    #[must_use]
    pub fn properties(&self) -> &[PropertyMetadata] {
        &self.properties
    }

    /// Returns `true` if the service pushes property-change notifications.
    #[must_use]
    pub fn supports_property_changed(&self) -> bool {
        self.supports_property_changed
    }

    /// Snapshots the schema into wire metadata, reading each property's
    /// current value through `read`.
    ///
    /// A failed read degrades to the tag's zero value; snapshotting never
    /// fails.
    pub fn snapshot<F>(&self, service_name: &str, mut read: F) -> ServiceRegistration
    where
        F: FnMut(&PropertyMetadata) -> Option<Value>,
    {
        let properties = self
            .properties
            .iter()
            .map(|p| PropertySnapshot {
                name: p.name.clone(),
                type_tag: p.type_tag,
                value: read(p).unwrap_or_else(|| p.type_tag.zero_value()),
            })
            .collect();

        ServiceRegistration {
            service_name: service_name.to_string(),
            methods: self.methods.clone(),
            events: self.events.clone(),
            properties,
            supports_property_changed: self.supports_property_changed,
            instance_id: None,
        }
    }
}

// ============================================================================
// ServiceSchemaBuilder
// ============================================================================

/// Fluent builder for [`ServiceSchema`].
///
/// ```ignore
/// let schema = ServiceSchema::builder()
///     .method(MethodMetadata::new("Add").param("text", TypeTag::Text))
///     .event("TodosChanged")
///     .property("Todos", TypeTag::Array)
///     .observable()
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ServiceSchemaBuilder {
    schema: ServiceSchema,
}

impl ServiceSchemaBuilder {
    /// Adds a method descriptor.
    #[must_use]
    pub fn method(mut self, method: MethodMetadata) -> Self {
        self.schema.methods.push(method);
        self
    }

    /// Declares an event.
    #[must_use]
    pub fn event(mut self, name: impl Into<String>) -> Self {
        self.schema.events.push(name.into());
        self
    }

    /// Declares a readable property.
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, type_tag: TypeTag) -> Self {
        self.schema.properties.push(PropertyMetadata {
            name: name.into(),
            type_tag,
        });
        self
    }

    /// Marks the service as pushing property-change notifications.
    #[must_use]
    pub fn observable(mut self) -> Self {
        self.schema.supports_property_changed = true;
        self
    }

    /// Finishes the schema.
    #[must_use]
    pub fn build(self) -> ServiceSchema {
        self.schema
    }
}

// ============================================================================
// ServiceRegistration
// ============================================================================

/// Metadata snapshot for one service, as sent over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRegistration {
    /// Name the service answers to (scoped for transient instances).
    pub service_name: String,

    /// Ordered method descriptors.
    #[serde(default)]
    pub methods: Vec<MethodMetadata>,

    /// Declared event names.
    #[serde(default)]
    pub events: Vec<String>,

    /// Property descriptors with values at snapshot time.
    #[serde(default)]
    pub properties: Vec<PropertySnapshot>,

    /// Whether the service pushes property-change notifications.
    #[serde(default)]
    pub supports_property_changed: bool,

    /// Synthetic id for transient instances; absent for singletons.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<InstanceId>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn todo_schema() -> ServiceSchema {
        ServiceSchema::builder()
            .method(MethodMetadata::new("Add").param("text", TypeTag::Text))
            .method(
                MethodMetadata::new("Remove")
                    .param("id", TypeTag::Text)
                    .returns(TypeTag::Boolean),
            )
            .event("TodosChanged")
            .property("Todos", TypeTag::Array)
            .observable()
            .build()
    }

    #[test]
    fn test_builder_tables() {
        let schema = todo_schema();
        assert!(schema.method("Add").is_some());
        assert!(schema.method("Drop").is_none());
        assert!(schema.has_event("TodosChanged"));
        assert!(!schema.has_event("TimerStopped"));
        assert!(schema.property("Todos").is_some());
        assert!(schema.supports_property_changed());
    }

    #[test]
    fn test_snapshot_reads_values() {
        let schema = todo_schema();
        let registration = schema.snapshot("Todo", |p| {
            assert_eq!(p.name, "Todos");
            Some(serde_json::json!([{"id": "1", "text": "buy milk"}]))
        });

        assert_eq!(registration.service_name, "Todo");
        assert_eq!(registration.properties.len(), 1);
        assert_eq!(registration.properties[0].value[0]["text"], "buy milk");
        assert!(registration.instance_id.is_none());
    }

    #[test]
    fn test_snapshot_degrades_failed_reads() {
        let schema = ServiceSchema::builder()
            .property("Count", TypeTag::Integer)
            .build();
        let registration = schema.snapshot("Broken", |_| None);
        assert_eq!(registration.properties[0].value, Value::from(0i64));
    }

    #[test]
    fn test_zero_values() {
        assert_eq!(TypeTag::Text.zero_value(), Value::String(String::new()));
        assert_eq!(TypeTag::Integer.zero_value(), Value::from(0i64));
        assert_eq!(TypeTag::Boolean.zero_value(), Value::Bool(false));
        assert_eq!(TypeTag::Object.zero_value(), Value::Null);
    }

    #[test]
    fn test_registration_wire_shape() {
        let registration = todo_schema().snapshot("Todo", |p| Some(p.type_tag.zero_value()));
        let json = serde_json::to_string(&registration).expect("serialize");
        assert!(json.contains("\"serviceName\":\"Todo\""));
        assert!(json.contains("\"returnType\":\"boolean\""));
        assert!(json.contains("\"supportsPropertyChanged\":true"));
        // Singleton snapshots carry no instance id at all.
        assert!(!json.contains("instanceId"));

        let back: ServiceRegistration = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.methods.len(), 2);
        assert_eq!(back.events, vec!["TodosChanged"]);
    }
}
