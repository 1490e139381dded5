//! In-memory stand-ins for the service ports, and a router wired to them.

#![allow(dead_code)]

use api_lib::adapters::InMemoryCache;
use api_lib::config::{CacheBackend, Config};
use api_lib::web::{router, AppState};
use async_trait::async_trait;
use autodoc_core::domain::{
    AiRequestRecord, DocumentTemplate, DocumentType, GeneratedDocument, LegalCategory,
    NewAiRequestRecord, NewDocumentTemplate, NewGeneratedDocument, TemplateFilter, TemplatePage,
};
use autodoc_core::ports::{
    AiHistoryRepository, CompletionTransport, DatabaseService, PortError, PortResult,
    TemplateSource,
};
use autodoc_core::{AiClient, AiSettings, DocumentRenderer};
use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

//=========================================================================================
// Fake Ports
//=========================================================================================

#[derive(Default)]
pub struct FakeDb {
    pub templates: Mutex<Vec<DocumentTemplate>>,
    pub generated: Mutex<Vec<GeneratedDocument>>,
}

#[async_trait]
impl DatabaseService for FakeDb {
    async fn list_templates(&self, filter: &TemplateFilter) -> PortResult<TemplatePage> {
        let mut matching: Vec<DocumentTemplate> = self
            .templates
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.is_active)
            .filter(|t| filter.category.map_or(true, |c| t.category == c))
            .filter(|t| filter.doc_type.map_or(true, |d| t.doc_type == d))
            .filter(|t| {
                filter
                    .search
                    .as_deref()
                    .map_or(true, |q| t.name.to_lowercase().contains(&q.to_lowercase()))
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));
        let total = matching.len() as u64;
        let templates = matching
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .collect();
        Ok(TemplatePage { templates, total })
    }

    async fn get_template(&self, template_id: Uuid) -> PortResult<DocumentTemplate> {
        self.templates
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == template_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Template {} not found", template_id)))
    }

    async fn get_template_by_type(&self, doc_type: DocumentType) -> PortResult<DocumentTemplate> {
        let mut matching: Vec<DocumentTemplate> = self
            .templates
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.is_active && t.doc_type == doc_type)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));
        matching
            .into_iter()
            .next()
            .ok_or_else(|| PortError::NotFound(format!("No active {} template", doc_type)))
    }

    async fn create_template(&self, template: NewDocumentTemplate) -> PortResult<DocumentTemplate> {
        let created = DocumentTemplate {
            id: Uuid::new_v4(),
            name: template.name,
            doc_type: template.doc_type,
            category: template.category,
            description: template.description,
            template_file: template.template_file,
            fields_schema: template.fields_schema,
            dynamic_blocks: template.dynamic_blocks,
            is_active: template.is_active,
            ai_enhancement: template.ai_enhancement,
            ai_max_length: template.ai_max_length,
        };
        self.templates.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn save_generated_document(
        &self,
        document: NewGeneratedDocument,
    ) -> PortResult<GeneratedDocument> {
        let saved = GeneratedDocument {
            id: Uuid::new_v4(),
            template_id: document.template_id,
            content: document.content,
            document_content: document.document_content,
            file: document.file,
            created_at: Utc::now(),
            session_key: document.session_key,
        };
        self.generated.lock().unwrap().push(saved.clone());
        Ok(saved)
    }
}

#[derive(Default)]
pub struct RecordingHistory(pub Mutex<Vec<NewAiRequestRecord>>);

#[async_trait]
impl AiHistoryRepository for RecordingHistory {
    async fn record_ai_request(&self, record: NewAiRequestRecord) -> PortResult<AiRequestRecord> {
        self.0.lock().unwrap().push(record.clone());
        Ok(AiRequestRecord {
            id: Uuid::new_v4(),
            user_id: record.user_id,
            request_type: record.request_type,
            request_data: record.request_data,
            response_data: record.response_data,
            is_error: record.is_error,
            created_at: Utc::now(),
            processing_time: record.processing_time,
            api_endpoint: record.api_endpoint,
            model_used: record.model_used,
        })
    }
}

/// Replies from a script; once it runs dry every call answers `default reply`.
#[derive(Default)]
pub struct ScriptedTransport {
    pub replies: Mutex<VecDeque<PortResult<Value>>>,
    pub calls: Mutex<Vec<Value>>,
}

impl ScriptedTransport {
    pub fn push(&self, reply: PortResult<Value>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionTransport for ScriptedTransport {
    async fn post_json(&self, _endpoint: &str, payload: &Value) -> PortResult<Value> {
        self.calls.lock().unwrap().push(payload.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(completion("default reply")))
    }
}

#[derive(Default)]
pub struct MapSource(pub Mutex<HashMap<String, String>>);

#[async_trait]
impl TemplateSource for MapSource {
    async fn load(&self, template_file: &str) -> PortResult<String> {
        self.0
            .lock()
            .unwrap()
            .get(template_file)
            .cloned()
            .ok_or_else(|| {
                PortError::NotFound(format!("Template file {} not found", template_file))
            })
    }
}

pub fn completion(text: &str) -> Value {
    json!({"choices": [{"message": {"role": "assistant", "content": text}}]})
}

pub fn upstream_status(code: u16) -> PortResult<Value> {
    Err(PortError::Upstream {
        status: Some(code),
        message: format!("HTTP {}", code),
    })
}

//=========================================================================================
// Test Application
//=========================================================================================

pub struct TestApp {
    pub router: Router,
    pub db: Arc<FakeDb>,
    pub transport: Arc<ScriptedTransport>,
    pub history: Arc<RecordingHistory>,
    pub source: Arc<MapSource>,
}

pub fn test_config(debug: bool) -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://unused".to_string(),
        log_level: tracing::Level::INFO,
        media_root: "./media".into(),
        debug,
        deepseek_api_key: "test-key".to_string(),
        deepseek_api_url: "http://localhost".to_string(),
        deepseek_timeout: Duration::from_secs(1),
        cache_backend: CacheBackend::Memory,
        cache_max_entries: 100,
        ai: AiSettings {
            max_retries: 0,
            retry_backoff: Duration::ZERO,
            ..Default::default()
        },
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_debug(false)
    }

    pub fn with_debug(debug: bool) -> Self {
        let config = Arc::new(test_config(debug));
        let db = Arc::new(FakeDb::default());
        let transport = Arc::new(ScriptedTransport::default());
        let history = Arc::new(RecordingHistory::default());
        let source = Arc::new(MapSource::default());

        let ai = Arc::new(AiClient::new(
            transport.clone(),
            Arc::new(InMemoryCache::new(config.cache_max_entries)),
            history.clone(),
            config.ai.clone(),
        ));
        let app_state = Arc::new(AppState {
            db: db.clone(),
            ai,
            renderer: Arc::new(DocumentRenderer::new(source.clone())),
            config,
        });

        Self {
            router: router(app_state),
            db,
            transport,
            history,
            source,
        }
    }

    /// Stores a template and, when `markup` is given, its file.
    pub fn add_template(&self, template: DocumentTemplate, markup: Option<&str>) -> Uuid {
        if let Some(markup) = markup {
            self.source
                .0
                .lock()
                .unwrap()
                .insert(template.template_file.clone(), markup.to_string());
        }
        let id = template.id;
        self.db.templates.lock().unwrap().push(template);
        id
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub fn template(name: &str, doc_type: DocumentType) -> DocumentTemplate {
    DocumentTemplate {
        id: Uuid::new_v4(),
        name: name.to_string(),
        doc_type,
        category: LegalCategory::Civil,
        description: String::new(),
        template_file: format!("templates/{}.html", doc_type),
        fields_schema: json!({"fields": []}),
        dynamic_blocks: json!([]),
        is_active: true,
        ai_enhancement: true,
        ai_max_length: 2000,
    }
}

//=========================================================================================
// Request Helpers
//=========================================================================================

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn post_raw_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn post_form(uri: &str, pairs: &[(&str, &str)]) -> Request<Body> {
    let body = serde_urlencoded::to_string(pairs).unwrap();
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
