//! services/api/src/web/protocol.rs
//!
//! Defines the request and response shapes of the AI assistance endpoint.
//!
//! A request is a flat object (JSON or form-encoded) whose `action` key selects
//! one of the actions below; the remaining keys are that action's arguments.

use autodoc_core::FieldHelp;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

//=========================================================================================
// Actions Sent FROM the Client TO the Server
//=========================================================================================

/// The closed set of AI actions the endpoint accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiAction {
    /// Guidance for one form field of a template.
    FieldHelp,
    /// Draft a named section of a document from the supplied context.
    GenerateSection,
    CheckContradictions,
    AnalyzeDocument,
    SuggestImprovements,
    /// Rewrite appeal text with the case context in mind.
    OptimizeAppeal,
    /// Legal grounds for appealing a decision.
    GenerateGrounds,
}

impl AiAction {
    pub const ALL: [AiAction; 7] = [
        Self::FieldHelp,
        Self::GenerateSection,
        Self::CheckContradictions,
        Self::AnalyzeDocument,
        Self::SuggestImprovements,
        Self::OptimizeAppeal,
        Self::GenerateGrounds,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FieldHelp => "field_help",
            Self::GenerateSection => "generate_section",
            Self::CheckContradictions => "check_contradictions",
            Self::AnalyzeDocument => "analyze_document",
            Self::SuggestImprovements => "suggest_improvements",
            Self::OptimizeAppeal => "optimize_appeal",
            Self::GenerateGrounds => "generate_grounds",
        }
    }

    /// Keys that must be present in the request for this action.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Self::FieldHelp => &["field", "template_id"],
            Self::GenerateSection => &["section", "context"],
            Self::CheckContradictions | Self::AnalyzeDocument | Self::SuggestImprovements => {
                &["text"]
            }
            Self::OptimizeAppeal => &["text", "context"],
            Self::GenerateGrounds => &["decision_text", "case_details"],
        }
    }

    /// Every required key absent from `data`, in declaration order.
    pub fn missing_fields(&self, data: &Map<String, Value>) -> Vec<&'static str> {
        self.required_fields()
            .iter()
            .copied()
            .filter(|name| !data.contains_key(*name))
            .collect()
    }
}

impl fmt::Display for AiAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AiAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("Unknown action: {}", s))
    }
}

/// Renders an argument as prompt text; structured values become their JSON text.
pub fn argument_text(data: &Map<String, Value>, key: &str) -> String {
    match data.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

//=========================================================================================
// Responses Sent FROM the Server TO the Client
//=========================================================================================

/// Action-specific part of a successful response.
#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(untagged)]
pub enum AiActionResult {
    FieldHelp {
        help_text: String,
        examples: Vec<String>,
        common_mistakes: Vec<String>,
        legal_references: Vec<String>,
    },
    Section {
        content: String,
    },
    Contradictions {
        contradictions: String,
    },
    Analysis {
        analysis: String,
    },
    Suggestions {
        suggestions: String,
    },
    OptimizedText {
        optimized_text: String,
    },
    Grounds {
        grounds: String,
    },
}

impl From<FieldHelp> for AiActionResult {
    fn from(help: FieldHelp) -> Self {
        Self::FieldHelp {
            help_text: help.help_text,
            examples: help.examples,
            common_mistakes: help.common_mistakes,
            legal_references: help.legal_references,
        }
    }
}

/// `{"status": "success", ...result}`.
#[derive(Serialize, Debug)]
pub struct AiSuccess {
    status: &'static str,
    #[serde(flatten)]
    result: AiActionResult,
}

impl From<AiActionResult> for AiSuccess {
    fn from(result: AiActionResult) -> Self {
        Self {
            status: "success",
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_action_parses_from_its_name() {
        for action in AiAction::ALL {
            assert_eq!(action.as_str().parse::<AiAction>().unwrap(), action);
        }
        assert!("summarize".parse::<AiAction>().is_err());
    }

    #[test]
    fn missing_fields_are_all_reported() {
        let data = json!({"action": "optimize_appeal"});
        let Value::Object(map) = data else { unreachable!() };
        assert_eq!(AiAction::OptimizeAppeal.missing_fields(&map), vec!["text", "context"]);
        let Value::Object(complete) = json!({"field": "x", "template_id": "y"}) else {
            unreachable!()
        };
        assert!(AiAction::FieldHelp.missing_fields(&complete).is_empty());
    }

    #[test]
    fn success_body_is_flat() {
        let body = serde_json::to_value(AiSuccess::from(AiActionResult::OptimizedText {
            optimized_text: "текст".into(),
        }))
        .unwrap();
        assert_eq!(body, json!({"status": "success", "optimized_text": "текст"}));
    }

    #[test]
    fn structured_arguments_become_json_text() {
        let Value::Object(map) = json!({"context": {"court": "МГС"}, "text": "abc"}) else {
            unreachable!()
        };
        assert_eq!(argument_text(&map, "text"), "abc");
        assert_eq!(argument_text(&map, "context"), r#"{"court":"МГС"}"#);
        assert_eq!(argument_text(&map, "absent"), "");
    }
}
