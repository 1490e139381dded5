//! crates/autodoc_core/src/schema.rs
//!
//! Lenient decoding of the `fields_schema` and `dynamic_blocks` JSON stored on a
//! template. Either column may hold structured JSON or a JSON-encoded string; a
//! string that does not parse is treated as an empty structure so one broken
//! template never takes a page down.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::blocks::Dependency;

/// One input field as declared in a template schema or a dynamic block. Only
/// `name` is mandatory; an optional key that is `null` or of the wrong JSON
/// type falls back to its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(
        rename = "type",
        default = "default_field_type",
        deserialize_with = "lenient_field_type"
    )]
    pub field_type: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub label: Option<String>,
    #[serde(default = "default_required", deserialize_with = "lenient_flag")]
    pub required: bool,
    #[serde(default, deserialize_with = "lenient_list")]
    pub options: Vec<String>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub controls: Vec<String>,
}

fn default_field_type() -> String {
    "text".to_string()
}

fn default_required() -> bool {
    true
}

fn lenient_field_type<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => s,
        _ => default_field_type(),
    })
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// JSON truthiness: `null`, `false`, `0` and `""` are false.
fn lenient_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    })
}

fn lenient_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// A named, repeatable group of extra fields attached to a template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DynamicBlock {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    pub default_visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependency: Option<Dependency>,
    pub fields: Vec<FieldDescriptor>,
}

/// Accepts structured JSON or a JSON-encoded string. Returns `None` for a string
/// that is not valid JSON.
pub fn decode_json(raw: &Value) -> Option<Value> {
    match raw {
        Value::String(text) => match serde_json::from_str(text) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("Ignoring unparseable schema JSON: {}", e);
                None
            }
        },
        other => Some(other.clone()),
    }
}

/// Reads the `fields` list of a field schema. Descriptors without a string
/// `name` are skipped.
pub fn parse_fields_schema(raw: &Value) -> Vec<FieldDescriptor> {
    let Some(schema) = decode_json(raw) else {
        return Vec::new();
    };
    match schema.get("fields") {
        Some(Value::Array(items)) => parse_descriptors(items),
        _ => Vec::new(),
    }
}

/// Reads the dynamic blocks array. Blocks without a string `id` are skipped.
pub fn parse_dynamic_blocks(raw: &Value) -> Vec<DynamicBlock> {
    let Some(Value::Array(items)) = decode_json(raw) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let id = item.get("id")?.as_str()?.to_string();
            let title = item
                .get("title")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| id.clone());
            let dependency = item
                .get("dependency")
                .and_then(|d| serde_json::from_value(d.clone()).ok());
            let fields = match item.get("fields") {
                Some(Value::Array(fields)) => parse_descriptors(fields),
                _ => Vec::new(),
            };

            Some(DynamicBlock {
                id,
                title,
                template: item
                    .get("template")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                default_visible: item
                    .get("default_visible")
                    .and_then(Value::as_bool)
                    .unwrap_or(true),
                dependency,
                fields,
            })
        })
        .collect()
}

fn parse_descriptors(items: &[Value]) -> Vec<FieldDescriptor> {
    items
        .iter()
        .filter_map(|item| match serde_json::from_value(item.clone()) {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                debug!("Skipping malformed field descriptor {}: {}", item, e);
                None
            }
        })
        .collect()
}
