//! Typed JSON-schema builder for tool parameters.
//!
//! Tools describe their arguments with [`Schema`] instead of hand-built
//! nested maps; [`Schema::to_value`] renders the JSON-schema sent to the model.

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// A JSON-schema node.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    Object(ObjectSchema),
    String { description: Option<String> },
    Integer { description: Option<String> },
    Boolean { description: Option<String> },
    Array {
        items: Box<Schema>,
        description: Option<String>,
    },
    Enum {
        values: Vec<String>,
        description: Option<String>,
    },
    /// Schema taken verbatim from an external source (OpenAPI, MCP).
    Raw(Value),
}

/// An `object` schema with named properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectSchema {
    properties: BTreeMap<String, Schema>,
    required: Vec<String>,
    description: Option<String>,
    additional_properties: Option<bool>,
}

impl Schema {
    pub fn object() -> ObjectSchema {
        ObjectSchema::default()
    }

    pub fn string() -> Self {
        Self::String { description: None }
    }

    pub fn integer() -> Self {
        Self::Integer { description: None }
    }

    pub fn boolean() -> Self {
        Self::Boolean { description: None }
    }

    pub fn array(items: Schema) -> Self {
        Self::Array {
            items: Box::new(items),
            description: None,
        }
    }

    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enum {
            values: values.into_iter().map(Into::into).collect(),
            description: None,
        }
    }

    /// Attach a description. Empty descriptions are ignored.
    pub fn describe(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim().is_empty() {
            return self;
        }

        match &mut self {
            Self::Object(obj) => obj.description = Some(text),
            Self::String { description }
            | Self::Integer { description }
            | Self::Boolean { description }
            | Self::Array { description, .. }
            | Self::Enum { description, .. } => *description = Some(text),
            Self::Raw(Value::Object(map)) => {
                map.insert("description".into(), Value::String(text));
            }
            Self::Raw(_) => {}
        }
        self
    }

    /// Render the schema as a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Object(obj) => obj.to_value(),
            Self::String { description } => typed("string", description),
            Self::Integer { description } => typed("integer", description),
            Self::Boolean { description } => typed("boolean", description),
            Self::Array { items, description } => {
                let mut value = typed("array", description);
                value["items"] = items.to_value();
                value
            }
            Self::Enum {
                values,
                description,
            } => {
                let mut value = typed("string", description);
                value["enum"] = json!(values);
                value
            }
            Self::Raw(value) => value.clone(),
        }
    }

    pub fn as_object(&self) -> Option<&ObjectSchema> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

fn typed(kind: &str, description: &Option<String>) -> Value {
    let mut map = Map::new();
    map.insert("type".into(), Value::String(kind.into()));
    if let Some(text) = description {
        map.insert("description".into(), Value::String(text.clone()));
    }
    Value::Object(map)
}

impl ObjectSchema {
    /// Add an optional property.
    pub fn property(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.insert(name, schema);
        self
    }

    /// Add a property and mark it required.
    pub fn required_property(mut self, name: impl Into<String>, schema: Schema) -> Self {
        let name = name.into();
        self.insert(name.clone(), schema);
        self.require(name);
        self
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn additional_properties(mut self, allowed: bool) -> Self {
        self.additional_properties = Some(allowed);
        self
    }

    /// Insert or replace a property.
    pub fn insert(&mut self, name: impl Into<String>, schema: Schema) {
        self.properties.insert(name.into(), schema);
    }

    /// Mark a property as required. Duplicates are ignored.
    pub fn require(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.required.contains(&name) {
            self.required.push(name);
        }
    }

    pub fn properties(&self) -> &BTreeMap<String, Schema> {
        &self.properties
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Required names that have no matching property.
    pub fn dangling_required(&self) -> Vec<&str> {
        self.required
            .iter()
            .filter(|name| !self.properties.contains_key(*name))
            .map(String::as_str)
            .collect()
    }

    pub fn build(self) -> Schema {
        Schema::Object(self)
    }

    pub fn to_value(&self) -> Value {
        let properties: Map<String, Value> = self
            .properties
            .iter()
            .map(|(name, schema)| (name.clone(), schema.to_value()))
            .collect();

        let mut map = Map::new();
        map.insert("type".into(), Value::String("object".into()));
        if let Some(text) = &self.description {
            map.insert("description".into(), Value::String(text.clone()));
        }
        map.insert("properties".into(), Value::Object(properties));
        if !self.required.is_empty() {
            map.insert("required".into(), json!(self.required));
        }
        if let Some(allowed) = self.additional_properties {
            map.insert("additionalProperties".into(), Value::Bool(allowed));
        }
        Value::Object(map)
    }
}

impl From<ObjectSchema> for Schema {
    fn from(obj: ObjectSchema) -> Self {
        Self::Object(obj)
    }
}

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_schema_renders_properties_and_required() {
        let schema = Schema::object()
            .required_property("path", Schema::string().describe("Relative path"))
            .property("recursive", Schema::boolean())
            .build();

        assert_eq!(
            schema.to_value(),
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Relative path" },
                    "recursive": { "type": "boolean" }
                },
                "required": ["path"]
            })
        );
    }

    #[test]
    fn empty_object_keeps_properties_key() {
        let value = Schema::object().additional_properties(false).build().to_value();
        assert_eq!(
            value,
            json!({ "type": "object", "properties": {}, "additionalProperties": false })
        );
    }

    #[test]
    fn array_and_enum_render_nested_types() {
        let args = Schema::array(Schema::string()).to_value();
        assert_eq!(args, json!({ "type": "array", "items": { "type": "string" } }));

        let mode = Schema::enumeration(["fast", "slow"]).describe("Mode").to_value();
        assert_eq!(
            mode,
            json!({ "type": "string", "description": "Mode", "enum": ["fast", "slow"] })
        );
    }

    #[test]
    fn require_is_idempotent_and_dangling_names_are_reported() {
        let mut obj = Schema::object().property("a", Schema::string());
        obj.require("a");
        obj.require("a");
        obj.require("missing");

        assert_eq!(obj.required(), &["a".to_string(), "missing".to_string()]);
        assert_eq!(obj.dangling_required(), vec!["missing"]);
    }

    #[test]
    fn blank_description_is_ignored() {
        assert_eq!(Schema::string().describe("  "), Schema::string());
    }
}
