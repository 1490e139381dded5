//! crates/autodoc_core/src/blocks.rs
//!
//! Structural validation of a template's dynamic blocks and evaluation of the
//! visibility dependencies a block may declare on another field.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::ports::{PortError, PortResult};

pub const FIELD_TYPES: [&str; 4] = ["text", "select", "textarea", "checkbox"];

/// How a dependency compares the controlling field's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    In,
    NotIn,
}

/// Makes a block visible only when another field satisfies a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub field: String,
    pub condition: Condition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Value>,
    /// Whether the block's fields become required once visible.
    #[serde(default)]
    pub required: bool,
}

impl Dependency {
    /// Evaluates the condition against submitted form values. A controlling field
    /// that was not submitted counts as an empty string.
    pub fn is_met(&self, submission: &HashMap<String, String>) -> bool {
        let actual = submission
            .get(&self.field)
            .map(String::as_str)
            .unwrap_or("");
        let expected = self.value.as_ref().map(scalar_text).unwrap_or_default();

        match self.condition {
            Condition::Equals => actual == expected,
            Condition::NotEquals => actual != expected,
            Condition::Contains => actual.contains(expected.as_str()),
            Condition::GreaterThan => compare_numbers(actual, &expected, |a, b| a > b),
            Condition::LessThan => compare_numbers(actual, &expected, |a, b| a < b),
            Condition::In => self.values.iter().any(|v| scalar_text(v) == actual),
            Condition::NotIn => !self.values.iter().any(|v| scalar_text(v) == actual),
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn compare_numbers(actual: &str, expected: &str, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (actual.trim().parse::<f64>(), expected.trim().parse::<f64>()) {
        (Ok(a), Ok(b)) => cmp(a, b),
        _ => false,
    }
}

/// Strictly validates a dynamic-blocks document. Used when templates are
/// imported; the form builder stays lenient.
pub fn validate_dynamic_blocks(raw: &Value) -> PortResult<()> {
    let decoded;
    let blocks = match raw {
        Value::String(text) => {
            decoded = serde_json::from_str::<Value>(text)
                .map_err(|e| invalid(format!("dynamic_blocks is not valid JSON: {}", e)))?;
            &decoded
        }
        other => other,
    };

    let Value::Array(blocks) = blocks else {
        return Err(invalid("dynamic_blocks must be an array".to_string()));
    };

    for (index, block) in blocks.iter().enumerate() {
        let Value::Object(block) = block else {
            return Err(invalid(format!("block #{} must be an object", index)));
        };
        let label = block
            .get("id")
            .and_then(Value::as_str)
            .map(|id| format!("block '{}'", id))
            .unwrap_or_else(|| format!("block #{}", index));

        for key in ["id", "title"] {
            match block.get(key) {
                Some(Value::String(_)) => {}
                Some(_) => return Err(invalid(format!("{}: '{}' must be a string", label, key))),
                None => return Err(invalid(format!("{}: missing required key '{}'", label, key))),
            }
        }
        if let Some(template) = block.get("template") {
            if !template.is_string() {
                return Err(invalid(format!("{}: 'template' must be a string", label)));
            }
        }
        if let Some(visible) = block.get("default_visible") {
            if !visible.is_boolean() {
                return Err(invalid(format!("{}: 'default_visible' must be a boolean", label)));
            }
        }
        if let Some(dependency) = block.get("dependency") {
            serde_json::from_value::<Dependency>(dependency.clone())
                .map_err(|e| invalid(format!("{}: invalid dependency: {}", label, e)))?;
        }

        let fields = match block.get("fields") {
            Some(Value::Array(fields)) => fields,
            Some(_) => return Err(invalid(format!("{}: 'fields' must be an array", label))),
            None => return Err(invalid(format!("{}: missing required key 'fields'", label))),
        };
        for (field_index, field) in fields.iter().enumerate() {
            validate_block_field(&label, field_index, field)?;
        }
    }

    Ok(())
}

fn validate_block_field(block: &str, index: usize, field: &Value) -> PortResult<()> {
    let Value::Object(field) = field else {
        return Err(invalid(format!("{}: field #{} must be an object", block, index)));
    };
    let name = field
        .get("name")
        .and_then(Value::as_str)
        .map(|n| format!("field '{}'", n))
        .unwrap_or_else(|| format!("field #{}", index));

    for key in ["name", "type", "label"] {
        match field.get(key) {
            Some(Value::String(_)) => {}
            Some(_) => {
                return Err(invalid(format!("{}, {}: '{}' must be a string", block, name, key)))
            }
            None => {
                return Err(invalid(format!(
                    "{}, {}: missing required key '{}'",
                    block, name, key
                )))
            }
        }
    }

    let field_type = field.get("type").and_then(Value::as_str).unwrap_or_default();
    if !FIELD_TYPES.contains(&field_type) {
        return Err(invalid(format!(
            "{}, {}: invalid type '{}', expected one of {}",
            block,
            name,
            field_type,
            FIELD_TYPES.join(", ")
        )));
    }
    if let Some(required) = field.get("required") {
        if !required.is_boolean() {
            return Err(invalid(format!("{}, {}: 'required' must be a boolean", block, name)));
        }
    }
    for key in ["options", "controls"] {
        if let Some(list) = field.get(key) {
            let all_strings = list
                .as_array()
                .map(|items| items.iter().all(Value::is_string))
                .unwrap_or(false);
            if !all_strings {
                return Err(invalid(format!(
                    "{}, {}: '{}' must be an array of strings",
                    block, name, key
                )));
            }
        }
    }
    if field_type == "select" && !field.get("options").is_some_and(Value::is_array) {
        return Err(invalid(format!("{}, {}: select field must have options", block, name)));
    }

    Ok(())
}

fn invalid(message: String) -> PortError {
    PortError::Validation(format!("Invalid dynamic_blocks structure: {}", message))
}
