//! crates/autodoc_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database driver or HTTP framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Enumerations
//=========================================================================================

/// The kind of court document a template produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Claim,
    Motion,
    Appeal,
}

impl DocumentType {
    pub const ALL: [DocumentType; 3] = [Self::Claim, Self::Motion, Self::Appeal];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claim => "claim",
            Self::Motion => "motion",
            Self::Appeal => "appeal",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Claim => "Исковое заявление",
            Self::Motion => "Ходатайство",
            Self::Appeal => "Апелляционная жалоба",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown document type '{}'", s))
    }
}

/// The branch of law a template belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegalCategory {
    #[default]
    Civil,
    Arbitration,
    Administrative,
    Criminal,
    Family,
    Labor,
    Tax,
    Corporate,
}

impl LegalCategory {
    pub const ALL: [LegalCategory; 8] = [
        Self::Civil,
        Self::Arbitration,
        Self::Administrative,
        Self::Criminal,
        Self::Family,
        Self::Labor,
        Self::Tax,
        Self::Corporate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Civil => "civil",
            Self::Arbitration => "arbitration",
            Self::Administrative => "administrative",
            Self::Criminal => "criminal",
            Self::Family => "family",
            Self::Labor => "labor",
            Self::Tax => "tax",
            Self::Corporate => "corporate",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Civil => "Гражданские дела",
            Self::Arbitration => "Арбитражные споры",
            Self::Administrative => "Административные дела",
            Self::Criminal => "Уголовные дела",
            Self::Family => "Семейные дела",
            Self::Labor => "Трудовые споры",
            Self::Tax => "Налоговые споры",
            Self::Corporate => "Корпоративные споры",
        }
    }
}

impl fmt::Display for LegalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LegalCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown legal category '{}'", s))
    }
}

/// What an AI call was made for. Stored on every audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    FieldHelp,
    Generate,
    Analysis,
    Other,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FieldHelp => "field_help",
            Self::Generate => "generate",
            Self::Analysis => "analysis",
            Self::Other => "other",
        }
    }
}

impl FromStr for RequestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "field_help" => Ok(Self::FieldHelp),
            "generate" => Ok(Self::Generate),
            "analysis" => Ok(Self::Analysis),
            "other" => Ok(Self::Other),
            _ => Err(format!("unknown request kind '{}'", s)),
        }
    }
}

//=========================================================================================
// Templates and Generated Documents
//=========================================================================================

/// A stored document skeleton with its field metadata.
///
/// `fields_schema` and `dynamic_blocks` are kept as raw JSON because they may be
/// stored either as structured JSON or as a JSON-encoded string. The form builder
/// is responsible for interpreting them.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentTemplate {
    pub id: Uuid,
    pub name: String,
    pub doc_type: DocumentType,
    pub category: LegalCategory,
    pub description: String,
    /// Path of the markup file, relative to the media root.
    pub template_file: String,
    pub fields_schema: Value,
    pub dynamic_blocks: Value,
    pub is_active: bool,
    pub ai_enhancement: bool,
    pub ai_max_length: u32,
}

/// Input for creating a new template.
#[derive(Debug, Clone, Deserialize)]
pub struct NewDocumentTemplate {
    pub name: String,
    pub doc_type: DocumentType,
    #[serde(default)]
    pub category: LegalCategory,
    #[serde(default)]
    pub description: String,
    pub template_file: String,
    #[serde(default = "empty_schema")]
    pub fields_schema: Value,
    #[serde(default = "empty_blocks")]
    pub dynamic_blocks: Value,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub ai_enhancement: bool,
    #[serde(default = "default_ai_max_length")]
    pub ai_max_length: u32,
}

fn empty_schema() -> Value {
    Value::Object(Default::default())
}

fn empty_blocks() -> Value {
    Value::Array(Vec::new())
}

fn default_true() -> bool {
    true
}

fn default_ai_max_length() -> u32 {
    2000
}

/// Listing filters for active templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateFilter {
    pub category: Option<LegalCategory>,
    pub doc_type: Option<DocumentType>,
    /// Case-insensitive substring match on the template name.
    pub search: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

/// One page of listing results.
#[derive(Debug, Clone)]
pub struct TemplatePage {
    pub templates: Vec<DocumentTemplate>,
    pub total: u64,
}

/// A document produced from a template. Immutable once written.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedDocument {
    pub id: Uuid,
    pub template_id: Uuid,
    pub content: Value,
    pub document_content: Option<String>,
    pub file: Option<String>,
    pub created_at: DateTime<Utc>,
    pub session_key: String,
}

#[derive(Debug, Clone)]
pub struct NewGeneratedDocument {
    pub template_id: Uuid,
    pub content: Value,
    pub document_content: Option<String>,
    pub file: Option<String>,
    pub session_key: String,
}

//=========================================================================================
// AI Audit History
//=========================================================================================

/// One row of the append-only AI audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct AiRequestRecord {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub request_type: RequestKind,
    pub request_data: Value,
    pub response_data: Value,
    pub is_error: bool,
    pub created_at: DateTime<Utc>,
    /// Seconds spent on the call, retries included.
    pub processing_time: Option<f64>,
    pub api_endpoint: Option<String>,
    pub model_used: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewAiRequestRecord {
    pub user_id: Option<Uuid>,
    pub request_type: RequestKind,
    pub request_data: Value,
    pub response_data: Value,
    pub is_error: bool,
    pub processing_time: Option<f64>,
    pub api_endpoint: Option<String>,
    pub model_used: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_type_round_trips_through_str() {
        for t in DocumentType::ALL {
            assert_eq!(t.as_str().parse::<DocumentType>().unwrap(), t);
        }
        assert!("petition".parse::<DocumentType>().is_err());
    }

    #[test]
    fn new_template_defaults_match_model_defaults() {
        let parsed: NewDocumentTemplate = serde_json::from_value(serde_json::json!({
            "name": "Ходатайство об отложении",
            "doc_type": "motion",
            "template_file": "templates/motion.html"
        }))
        .unwrap();

        assert_eq!(parsed.category, LegalCategory::Civil);
        assert!(parsed.is_active);
        assert!(!parsed.ai_enhancement);
        assert_eq!(parsed.ai_max_length, 2000);
        assert_eq!(parsed.dynamic_blocks, Value::Array(vec![]));
    }
}
