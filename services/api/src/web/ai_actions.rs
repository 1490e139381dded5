//! services/api/src/web/ai_actions.rs
//!
//! The AI assistance endpoint: parses a JSON or form-encoded request, checks
//! the selected action's arguments, and runs it through the shared `AiClient`.

use crate::error::HttpError;
use crate::web::protocol::{argument_text, AiAction, AiActionResult, AiSuccess};
use crate::web::state::AppState;
use autodoc_core::ports::{PortError, PortResult};
use autodoc_core::forms::find_form_field;
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap},
    response::Json,
};
use bytes::Bytes;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Run an AI assistance action.
///
/// The body is a flat object whose `action` key selects the operation. It may be
/// sent as `application/json` or as a form-encoded body.
#[utoipa::path(
    post,
    path = "/api/ai/",
    request_body(content = Object, description = "`{\"action\": ..., ...arguments}`"),
    responses(
        (status = 200, description = "Action completed", body = AiActionResult),
        (
            status = 400,
            description = "Missing or unknown action, missing arguments, or a client-side API error"
        ),
        (status = 404, description = "Template not found"),
        (status = 502, description = "The completion API failed or could not be reached"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn ai_action_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AiSuccess>, HttpError> {
    info!("Received AI assistance request");
    let data = parse_request_data(&headers, &body)?;

    let action = match data.get("action") {
        None | Some(Value::Null) => {
            warn!("AI request without an action");
            return Err(HttpError::bad_request("action is required"));
        }
        Some(Value::String(name)) if name.is_empty() => {
            warn!("AI request without an action");
            return Err(HttpError::bad_request("action is required"));
        }
        Some(Value::String(name)) => name.parse::<AiAction>().map_err(|e| {
            warn!("{}", e);
            HttpError::bad_request(e)
        })?,
        Some(other) => {
            warn!("AI request with a non-string action: {}", other);
            return Err(HttpError::bad_request(format!("Unknown action: {}", other)));
        }
    };

    let missing = action.missing_fields(&data);
    if !missing.is_empty() {
        let message = format!("Missing required fields: {}", missing.join(", "));
        warn!("{} for action {}", message, action);
        return Err(HttpError::bad_request(message));
    }

    let result = run_action(&app_state, action, &data).await.map_err(|e| {
        error!("AI action {} failed: {}", action, e);
        HttpError::from_port(e, app_state.debug())
    })?;

    Ok(Json(AiSuccess::from(result)))
}

/// JSON when the client says so, form-encoded otherwise.
fn parse_request_data(headers: &HeaderMap, body: &[u8]) -> Result<Map<String, Value>, HttpError> {
    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.trim_start().starts_with("application/json"))
        .unwrap_or(false);

    if is_json {
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(HttpError::bad_request("Invalid JSON format: expected an object")),
            Err(e) => {
                warn!("Failed to decode AI request JSON: {}", e);
                Err(HttpError::bad_request("Invalid JSON format"))
            }
        }
    } else {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body).map_err(|e| {
            warn!("Failed to decode AI request form: {}", e);
            HttpError::bad_request("Invalid form data")
        })?;
        Ok(pairs
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect())
    }
}

async fn run_action(
    app_state: &AppState,
    action: AiAction,
    data: &Map<String, Value>,
) -> PortResult<AiActionResult> {
    let ai = &app_state.ai;
    let arg = |key: &str| argument_text(data, key);

    let result: AiActionResult = match action {
        AiAction::FieldHelp => {
            let template_id = arg("template_id");
            let template = match Uuid::parse_str(template_id.trim()) {
                Ok(id) => app_state.db.get_template(id).await?,
                Err(_) => {
                    return Err(PortError::NotFound(format!(
                        "Template with ID {} not found",
                        template_id
                    )))
                }
            };
            let field_name = arg("field");
            let field = find_form_field(&template, &field_name).ok_or_else(|| {
                PortError::Validation(format!("Field '{}' not found in template", field_name))
            })?;
            let user_context = data
                .get("context")
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new()));

            ai.field_help(&template, &field, &arg("value"), &user_context)
                .await?
                .into()
        }
        AiAction::GenerateSection => AiActionResult::Section {
            content: ai.generate_section(&arg("section"), &arg("context")).await?,
        },
        AiAction::CheckContradictions => AiActionResult::Contradictions {
            contradictions: ai.check_contradictions(&arg("text")).await?,
        },
        AiAction::AnalyzeDocument => AiActionResult::Analysis {
            analysis: ai.analyze_document(&arg("text")).await?,
        },
        AiAction::SuggestImprovements => AiActionResult::Suggestions {
            suggestions: ai.suggest_improvements(&arg("text")).await?,
        },
        AiAction::OptimizeAppeal => AiActionResult::OptimizedText {
            optimized_text: ai.optimize_text(&arg("text"), &arg("context")).await?,
        },
        AiAction::GenerateGrounds => AiActionResult::Grounds {
            grounds: ai
                .generate_grounds(&arg("decision_text"), &arg("case_details"))
                .await?,
        },
    };

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn json_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"));
        headers
    }

    #[test]
    fn json_bodies_must_be_objects() {
        let data = parse_request_data(&json_headers(), br#"{"action": "analyze_document", "text": "t"}"#).unwrap();
        assert_eq!(data["action"], "analyze_document");

        assert!(parse_request_data(&json_headers(), b"[1, 2]").is_err());
        let err = parse_request_data(&json_headers(), b"{not json").unwrap_err();
        assert_eq!(err.message(), "Invalid JSON format");
    }

    #[test]
    fn form_bodies_become_string_values() {
        let data = parse_request_data(
            &HeaderMap::new(),
            "action=generate_grounds&decision_text=%D0%A0%D0%B5%D1%88%D0%B5%D0%BD%D0%B8%D0%B5&case_details=x".as_bytes(),
        )
        .unwrap();
        assert_eq!(data["decision_text"], "Решение");
        assert_eq!(data["case_details"], "x");
    }
}
