//! crates/autodoc_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{
    AiRequestRecord, DocumentTemplate, DocumentType, GeneratedDocument, NewAiRequestRecord,
    NewDocumentTemplate, NewGeneratedDocument, TemplateFilter, TemplatePage,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    /// The completion API answered with a non-success status (`status` is set)
    /// or could not be reached at all (`status` is `None`).
    #[error("Upstream error: {message}")]
    Upstream { status: Option<u16>, message: String },
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    /// Whether a retry has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            PortError::Upstream { status: None, .. } => true,
            PortError::Upstream {
                status: Some(code), ..
            } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Templates ---
    async fn list_templates(&self, filter: &TemplateFilter) -> PortResult<TemplatePage>;

    async fn get_template(&self, template_id: Uuid) -> PortResult<DocumentTemplate>;

    /// Returns the first active template of the given type, ordered by name.
    async fn get_template_by_type(&self, doc_type: DocumentType) -> PortResult<DocumentTemplate>;

    async fn create_template(&self, template: NewDocumentTemplate) -> PortResult<DocumentTemplate>;

    // --- Generated Documents ---
    async fn save_generated_document(
        &self,
        document: NewGeneratedDocument,
    ) -> PortResult<GeneratedDocument>;
}

/// Append-only audit trail of AI calls.
#[async_trait]
pub trait AiHistoryRepository: Send + Sync {
    async fn record_ai_request(&self, record: NewAiRequestRecord) -> PortResult<AiRequestRecord>;
}

/// Key/value store for completion responses.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, key: &str) -> PortResult<Option<Value>>;

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> PortResult<()>;
}

/// Raw access to the remote completion API.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    /// POSTs `payload` to `endpoint` and returns the parsed JSON body.
    async fn post_json(&self, endpoint: &str, payload: &Value) -> PortResult<Value>;
}

/// Loads template markup by its stored file reference.
#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn load(&self, template_file: &str) -> PortResult<String>;
}
