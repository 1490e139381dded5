//! crates/autodoc_core/src/forms.rs
//!
//! Builds the input form for a template out of its field schema and dynamic
//! blocks, validates submissions against it, and turns a valid submission into
//! a rendering context.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::domain::DocumentTemplate;
use crate::schema::{parse_dynamic_blocks, parse_fields_schema, DynamicBlock, FieldDescriptor};

const AI_HELP_HINT: &str = "Заполнить с помощью AI";
const TEXTAREA_ROWS: u8 = 3;

/// How a field is presented to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Widget {
    Text,
    Textarea { rows: u8 },
    Select { choices: Vec<String> },
}

impl Widget {
    fn for_descriptor(descriptor: &FieldDescriptor) -> Self {
        match descriptor.field_type.as_str() {
            "textarea" => Widget::Textarea {
                rows: TEXTAREA_ROWS,
            },
            "select" => Widget::Select {
                choices: descriptor.options.clone(),
            },
            _ => Widget::Text,
        }
    }
}

/// Where a form field was declared.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum FieldOrigin {
    Schema,
    Block { block_id: String, field_name: String },
}

/// Invites the client to offer an AI-assisted fill for a field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AiHelpMarker {
    pub action: &'static str,
    pub field: String,
    pub hint: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormField {
    pub name: String,
    pub label: String,
    pub required: bool,
    pub help_text: String,
    pub default_value: String,
    pub widget: Widget,
    pub origin: FieldOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_help: Option<AiHelpMarker>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Submitted values after validation, one entry per form field.
pub type CleanedData = Map<String, Value>;

/// The materialized form of one template.
#[derive(Debug, Clone, Serialize)]
pub struct DynamicForm {
    fields: Vec<FormField>,
    #[serde(skip)]
    blocks: Vec<DynamicBlock>,
}

impl DynamicForm {
    pub fn build(template: &DocumentTemplate) -> Self {
        Self::from_parts(
            &template.fields_schema,
            &template.dynamic_blocks,
            template.ai_enhancement,
        )
    }

    pub fn from_parts(
        fields_schema: &Value,
        dynamic_blocks: &Value,
        ai_enhancement: bool,
    ) -> Self {
        let mut form = Self {
            fields: Vec::new(),
            blocks: parse_dynamic_blocks(dynamic_blocks),
        };

        for descriptor in parse_fields_schema(fields_schema) {
            let label = descriptor
                .label
                .clone()
                .unwrap_or_else(|| descriptor.name.clone());
            form.push(descriptor.name.clone(), label, &descriptor, FieldOrigin::Schema);
        }

        let blocks = form.blocks.clone();
        for block in &blocks {
            for descriptor in &block.fields {
                let name = block_field_name(&block.id, &descriptor.name);
                let label = format!(
                    "{} - {}",
                    block.title,
                    descriptor.label.as_deref().unwrap_or(&descriptor.name)
                );
                let origin = FieldOrigin::Block {
                    block_id: block.id.clone(),
                    field_name: descriptor.name.clone(),
                };
                form.push(name, label, descriptor, origin);
            }
        }

        if ai_enhancement {
            for field in &mut form.fields {
                field.ai_help = Some(AiHelpMarker {
                    action: "field_help",
                    field: field.name.clone(),
                    hint: AI_HELP_HINT,
                });
            }
        }

        form
    }

    /// A later field with an existing name replaces the earlier one in place.
    fn push(
        &mut self,
        name: String,
        label: String,
        descriptor: &FieldDescriptor,
        origin: FieldOrigin,
    ) {
        let field = FormField {
            label,
            required: descriptor.required,
            help_text: descriptor.description.clone().unwrap_or_default(),
            default_value: descriptor.default.as_ref().map(value_text).unwrap_or_default(),
            widget: Widget::for_descriptor(descriptor),
            origin,
            ai_help: None,
            name,
        };

        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn blocks(&self) -> &[DynamicBlock] {
        &self.blocks
    }

    fn block_is_active(&self, block_id: &str, submission: &HashMap<String, String>) -> bool {
        self.blocks
            .iter()
            .find(|b| b.id == block_id)
            .and_then(|b| b.dependency.as_ref())
            .map(|dep| dep.is_met(submission))
            .unwrap_or(true)
    }

    /// Validates a submission. Values are trimmed; fields of a block whose
    /// dependency is not met are cleared and never required.
    pub fn validate(
        &self,
        submission: &HashMap<String, String>,
    ) -> Result<CleanedData, Vec<FieldError>> {
        let mut cleaned = Map::new();
        let mut errors = Vec::new();

        for field in &self.fields {
            let active = match &field.origin {
                FieldOrigin::Schema => true,
                FieldOrigin::Block { block_id, .. } => self.block_is_active(block_id, submission),
            };
            let value = if active {
                submission
                    .get(&field.name)
                    .map(|v| v.trim().to_string())
                    .unwrap_or_default()
            } else {
                String::new()
            };

            if active && field.required && value.is_empty() {
                errors.push(FieldError {
                    field: field.name.clone(),
                    message: "This field is required.".to_string(),
                });
            } else if let Widget::Select { choices } = &field.widget {
                if !value.is_empty() && !choices.contains(&value) {
                    errors.push(FieldError {
                        field: field.name.clone(),
                        message: format!("'{}' is not one of the available choices.", value),
                    });
                }
            }

            cleaned.insert(field.name.clone(), Value::String(value));
        }

        if errors.is_empty() {
            Ok(cleaned)
        } else {
            Err(errors)
        }
    }

    /// Builds the rendering context: every cleaned value under its form name,
    /// plus `dynamic_blocks` holding block values grouped by block id.
    pub fn to_context(&self, cleaned: &CleanedData) -> Map<String, Value> {
        let mut context = cleaned.clone();
        let mut grouped = Map::new();

        for block in &self.blocks {
            let mut values = Map::new();
            for descriptor in &block.fields {
                let value = cleaned
                    .get(&block_field_name(&block.id, &descriptor.name))
                    .cloned()
                    .unwrap_or(Value::Null);
                values.insert(descriptor.name.clone(), value);
            }
            grouped.insert(block.id.clone(), Value::Object(values));
        }

        context.insert("dynamic_blocks".to_string(), Value::Object(grouped));
        context
    }
}

/// Finds the descriptor behind a form field name, either a top-level schema
/// field or a `dynamic_<block>_<field>` block field. When names collide the
/// later declaration wins, as it does in the built form.
pub fn find_form_field(template: &DocumentTemplate, name: &str) -> Option<FieldDescriptor> {
    let from_blocks = parse_dynamic_blocks(&template.dynamic_blocks)
        .into_iter()
        .rev()
        .find_map(|block| {
            block
                .fields
                .into_iter()
                .rev()
                .find(|f| block_field_name(&block.id, &f.name) == name)
        });

    from_blocks.or_else(|| {
        parse_fields_schema(&template.fields_schema)
            .into_iter()
            .rev()
            .find(|f| f.name == name)
    })
}

/// Form name of a field declared inside a dynamic block.
pub fn block_field_name(block_id: &str, field_name: &str) -> String {
    format!("dynamic_{}_{}", block_id, field_name)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
