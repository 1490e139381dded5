//! crates/autodoc_core/src/ai.rs
//!
//! The AI integration client. Every completion call goes through
//! [`AiClient::request`], which consults the response cache, retries transient
//! transport failures, and writes one audit record per live call.

const FIELD_HELP_INSTRUCTIONS: &str = r#"Ты — юридический ассистент, который помогает заполнять процессуальные документы для российских судов.
Отвечай строго JSON-объектом со следующими ключами:
- "help_text": краткое объяснение, что указать в поле;
- "examples": массив строк с примерами корректного заполнения;
- "common_mistakes": массив строк с типичными ошибками;
- "legal_references": массив строк со ссылками на нормы права.
Не добавляй ничего, кроме JSON."#;

const FIELD_HELP_TEMPLATE: &str = r#"Документ: {template_name} ({doc_type})
Поле: {field_label} (имя: {field_name})
Описание поля: {field_description}
Текущее значение: {current_value}
Контекст пользователя: {user_context}"#;

const OPTIMIZE_TEMPLATE: &str = r#"Улучши текст апелляционной жалобы: сделай формулировки юридически точными, убери повторы и сохрани все факты.

Текст:
{text}

Контекст дела:
{context}

Верни только исправленный текст."#;

const GROUNDS_TEMPLATE: &str = r#"Сгенерируйте юридические основания для апелляции на решение:
{decision_text}

Детали дела:
{case_details}
"#;

const SECTION_TEMPLATE: &str = r#"Составь раздел «{section}» процессуального документа на основе следующих данных:
{context}

Верни только текст раздела."#;

const CONTRADICTIONS_TEMPLATE: &str = r#"Найди противоречия и несостыковки в тексте процессуального документа. Перечисли каждое противоречие отдельным пунктом; если их нет, так и напиши.

{text}"#;

const ANALYSIS_TEMPLATE: &str = r#"Проанализируй процессуальный документ: оцени полноту, структуру, соответствие процессуальным требованиям и укажи риски.

{text}"#;

const IMPROVEMENTS_TEMPLATE: &str = r#"Предложи конкретные улучшения для текста процессуального документа. Каждое предложение — отдельным пунктом с пояснением.

{text}"#;

pub const CHAT_COMPLETIONS: &str = "chat/completions";

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::domain::{DocumentTemplate, NewAiRequestRecord, RequestKind};
use crate::ports::{AiHistoryRepository, CompletionTransport, PortError, PortResult, ResponseCache};
use crate::schema::FieldDescriptor;

//=========================================================================================
// Settings and Options
//=========================================================================================

/// Everything the client needs from configuration, passed in at construction.
#[derive(Debug, Clone)]
pub struct AiSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Lower temperature used when rewriting document text.
    pub document_temperature: f64,
    pub cache_ttl: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            model: "deepseek-chat".to_string(),
            max_tokens: 4000,
            temperature: 0.7,
            document_temperature: 0.3,
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// Per-call overrides for [`AiClient::generate_text`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

/// Structured guidance for filling one form field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldHelp {
    pub help_text: String,
    pub examples: Vec<String>,
    pub common_mistakes: Vec<String>,
    pub legal_references: Vec<String>,
}

//=========================================================================================
// The Client
//=========================================================================================

#[derive(Clone)]
pub struct AiClient {
    transport: Arc<dyn CompletionTransport>,
    cache: Arc<dyn ResponseCache>,
    history: Arc<dyn AiHistoryRepository>,
    settings: AiSettings,
}

impl AiClient {
    pub fn new(
        transport: Arc<dyn CompletionTransport>,
        cache: Arc<dyn ResponseCache>,
        history: Arc<dyn AiHistoryRepository>,
        settings: AiSettings,
    ) -> Self {
        Self {
            transport,
            cache,
            history,
            settings,
        }
    }

    /// Sends `payload` to `endpoint`, answering from the cache when an identical
    /// request was already served within the TTL.
    pub async fn request(
        &self,
        kind: RequestKind,
        endpoint: &str,
        payload: &Value,
    ) -> PortResult<Value> {
        let key = cache_key(endpoint, payload);

        match self.cache.get(&key).await {
            Ok(Some(cached)) => {
                debug!("Returning cached response for key {}", key);
                return Ok(cached);
            }
            Ok(None) => {}
            Err(e) => warn!("Response cache lookup failed for {}: {}", key, e),
        }

        let model = payload
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(&self.settings.model)
            .to_string();

        info!("Sending request to completion API: {}", endpoint);
        let started = Instant::now();
        let outcome = self.post_with_retry(endpoint, payload).await;
        let elapsed = started.elapsed().as_secs_f64();

        match outcome {
            Ok(response) => {
                if let Err(e) = self
                    .cache
                    .set(&key, response.clone(), self.settings.cache_ttl)
                    .await
                {
                    warn!("Failed to cache response for {}: {}", key, e);
                } else {
                    debug!("Response cached under key {}", key);
                }
                self.audit(kind, endpoint, &model, payload, response.clone(), false, elapsed)
                    .await;
                Ok(response)
            }
            Err(e) => {
                error!("Completion API request to {} failed: {}", endpoint, e);
                self.audit(
                    kind,
                    endpoint,
                    &model,
                    payload,
                    json!({ "error": e.to_string() }),
                    true,
                    elapsed,
                )
                .await;
                Err(e)
            }
        }
    }

    async fn post_with_retry(&self, endpoint: &str, payload: &Value) -> PortResult<Value> {
        let mut attempt: u32 = 0;
        loop {
            match self.transport.post_json(endpoint, payload).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt < self.settings.max_retries => {
                    let delay = self
                        .settings
                        .retry_backoff
                        .saturating_mul(2u32.saturating_pow(attempt));
                    warn!(
                        "Transient failure from {} (attempt {}): {}; retrying in {:?}",
                        endpoint,
                        attempt + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn audit(
        &self,
        kind: RequestKind,
        endpoint: &str,
        model: &str,
        payload: &Value,
        response: Value,
        is_error: bool,
        elapsed: f64,
    ) {
        let record = NewAiRequestRecord {
            user_id: None,
            request_type: kind,
            request_data: payload.clone(),
            response_data: response,
            is_error,
            processing_time: Some(elapsed),
            api_endpoint: Some(endpoint.to_string()),
            model_used: Some(model.to_string()),
        };
        if let Err(e) = self.history.record_ai_request(record).await {
            error!("Failed to write AI request history for {}: {}", endpoint, e);
        }
    }

    /// One user message, with the configured token budget and temperature unless overridden.
    pub async fn generate_text(
        &self,
        kind: RequestKind,
        prompt: &str,
        options: GenerationOptions,
    ) -> PortResult<Value> {
        let payload = json!({
            "model": self.settings.model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": options.max_tokens.unwrap_or(self.settings.max_tokens),
            "temperature": options.temperature.unwrap_or(self.settings.temperature),
        });
        self.request(kind, CHAT_COMPLETIONS, &payload).await
    }

    async fn generate_content(
        &self,
        kind: RequestKind,
        prompt: &str,
        options: GenerationOptions,
    ) -> PortResult<String> {
        let response = self.generate_text(kind, prompt, options).await?;
        message_content(&response)
    }

    //=====================================================================================
    // Document Assistance Operations
    //=====================================================================================

    pub async fn field_help(
        &self,
        template: &DocumentTemplate,
        field: &FieldDescriptor,
        current_value: &str,
        user_context: &Value,
    ) -> PortResult<FieldHelp> {
        let user_input = FIELD_HELP_TEMPLATE
            .replace("{template_name}", &template.name)
            .replace("{doc_type}", template.doc_type.display_name())
            .replace("{field_label}", field.label.as_deref().unwrap_or(&field.name))
            .replace("{field_name}", &field.name)
            .replace("{field_description}", field.description.as_deref().unwrap_or("—"))
            .replace("{current_value}", if current_value.is_empty() { "—" } else { current_value })
            .replace("{user_context}", &context_text(user_context));

        let payload = json!({
            "model": self.settings.model,
            "messages": [
                { "role": "system", "content": FIELD_HELP_INSTRUCTIONS },
                { "role": "user", "content": user_input }
            ],
            "max_tokens": self.settings.max_tokens.min(template.ai_max_length),
            "temperature": self.settings.temperature,
            "response_format": { "type": "json_object" },
        });

        let response = self.request(RequestKind::FieldHelp, CHAT_COMPLETIONS, &payload).await?;
        Ok(parse_field_help(&message_content(&response)?))
    }

    pub async fn optimize_text(&self, text: &str, context: &str) -> PortResult<String> {
        let prompt = OPTIMIZE_TEMPLATE
            .replace("{text}", text)
            .replace("{context}", context);
        let options = GenerationOptions {
            temperature: Some(self.settings.document_temperature),
            ..Default::default()
        };
        self.generate_content(RequestKind::Generate, &prompt, options).await
    }

    pub async fn generate_grounds(
        &self,
        decision_text: &str,
        case_details: &str,
    ) -> PortResult<String> {
        let prompt = GROUNDS_TEMPLATE
            .replace("{decision_text}", decision_text)
            .replace("{case_details}", case_details);
        self.generate_content(RequestKind::Generate, &prompt, GenerationOptions::default())
            .await
    }

    pub async fn generate_section(&self, section: &str, context: &str) -> PortResult<String> {
        let prompt = SECTION_TEMPLATE
            .replace("{section}", section)
            .replace("{context}", context);
        let options = GenerationOptions {
            temperature: Some(self.settings.document_temperature),
            ..Default::default()
        };
        self.generate_content(RequestKind::Generate, &prompt, options).await
    }

    pub async fn check_contradictions(&self, text: &str) -> PortResult<String> {
        let prompt = CONTRADICTIONS_TEMPLATE.replace("{text}", text);
        self.generate_content(RequestKind::Analysis, &prompt, GenerationOptions::default())
            .await
    }

    pub async fn analyze_document(&self, text: &str) -> PortResult<String> {
        let prompt = ANALYSIS_TEMPLATE.replace("{text}", text);
        self.generate_content(RequestKind::Analysis, &prompt, GenerationOptions::default())
            .await
    }

    pub async fn suggest_improvements(&self, text: &str) -> PortResult<String> {
        let prompt = IMPROVEMENTS_TEMPLATE.replace("{text}", text);
        self.generate_content(RequestKind::Analysis, &prompt, GenerationOptions::default())
            .await
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

/// `deepseek_<endpoint>_<sha256 of the payload with sorted keys>`.
pub fn cache_key(endpoint: &str, payload: &Value) -> String {
    let mut canonical = String::new();
    write_canonical(payload, &mut canonical);
    let digest = Sha256::digest(canonical.as_bytes());
    format!("deepseek_{}_{:x}", endpoint, digest)
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Extracts `choices[0].message.content` from a chat-completions response.
pub fn message_content(response: &Value) -> PortResult<String> {
    response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            PortError::Unexpected("Completion response contained no message content.".to_string())
        })
}

fn context_text(context: &Value) -> String {
    match context {
        Value::Null => "—".to_string(),
        Value::String(s) if s.is_empty() => "—".to_string(),
        Value::String(s) => s.clone(),
        Value::Object(map) if map.is_empty() => "—".to_string(),
        other => other.to_string(),
    }
}

/// Reads the model's JSON answer; plain prose becomes the help text.
fn parse_field_help(content: &str) -> FieldHelp {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    serde_json::from_str(unfenced).unwrap_or_else(|_| FieldHelp {
        help_text: trimmed.to_string(),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AiRequestRecord, DocumentType, LegalCategory};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use uuid::Uuid;

    //=====================================================================================
    // Fakes
    //=====================================================================================

    #[derive(Default)]
    struct ScriptedTransport {
        replies: Mutex<VecDeque<PortResult<Value>>>,
        calls: Mutex<Vec<Value>>,
    }

    impl ScriptedTransport {
        fn replying(replies: Vec<PortResult<Value>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
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
    struct MapCache(Mutex<HashMap<String, Value>>);

    #[async_trait]
    impl ResponseCache for MapCache {
        async fn get(&self, key: &str) -> PortResult<Option<Value>> {
            Ok(self.0.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: Value, _ttl: Duration) -> PortResult<()> {
            self.0.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingHistory(Mutex<Vec<NewAiRequestRecord>>);

    #[async_trait]
    impl AiHistoryRepository for RecordingHistory {
        async fn record_ai_request(
            &self,
            record: NewAiRequestRecord,
        ) -> PortResult<AiRequestRecord> {
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

    fn completion(text: &str) -> Value {
        json!({"choices": [{"message": {"role": "assistant", "content": text}}]})
    }

    fn settings() -> AiSettings {
        AiSettings {
            retry_backoff: Duration::ZERO,
            ..Default::default()
        }
    }

    struct Harness {
        client: AiClient,
        transport: Arc<ScriptedTransport>,
        cache: Arc<MapCache>,
        history: Arc<RecordingHistory>,
    }

    fn harness(replies: Vec<PortResult<Value>>, settings: AiSettings) -> Harness {
        let transport = ScriptedTransport::replying(replies);
        let cache = Arc::new(MapCache::default());
        let history = Arc::new(RecordingHistory::default());
        let client = AiClient::new(transport.clone(), cache.clone(), history.clone(), settings);
        Harness {
            client,
            transport,
            cache,
            history,
        }
    }

    fn status(code: u16) -> PortResult<Value> {
        Err(PortError::Upstream {
            status: Some(code),
            message: format!("HTTP {}", code),
        })
    }

    //=====================================================================================
    // Tests
    //=====================================================================================

    #[test]
    fn cache_key_ignores_key_order() {
        let a = json!({
            "model": "m",
            "messages": [{"role": "user", "content": "x"}],
            "temperature": 0.7
        });
        let b = json!({
            "temperature": 0.7,
            "messages": [{"content": "x", "role": "user"}],
            "model": "m"
        });
        assert_eq!(cache_key("chat/completions", &a), cache_key("chat/completions", &b));
        assert_ne!(cache_key("chat/completions", &a), cache_key("completions", &a));
        assert!(cache_key("chat/completions", &a).starts_with("deepseek_chat/completions_"));
    }

    #[tokio::test]
    async fn identical_requests_hit_the_cache_and_are_audited_once() {
        let h = harness(vec![Ok(completion("первый ответ"))], settings());
        let payload = json!({
            "model": "deepseek-chat",
            "messages": [{"role": "user", "content": "привет"}]
        });

        let first = h
            .client
            .request(RequestKind::Other, CHAT_COMPLETIONS, &payload)
            .await
            .unwrap();
        let second = h
            .client
            .request(RequestKind::Other, CHAT_COMPLETIONS, &payload)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(h.transport.call_count(), 1);
        let records = h.history.0.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert!(!records[0].is_error);
        assert_eq!(records[0].api_endpoint.as_deref(), Some(CHAT_COMPLETIONS));
        assert_eq!(records[0].model_used.as_deref(), Some("deepseek-chat"));
    }

    #[tokio::test]
    async fn a_different_payload_makes_a_new_record() {
        let h = harness(vec![], settings());
        for prompt in ["один", "два"] {
            h.client
                .generate_text(RequestKind::Generate, prompt, GenerationOptions::default())
                .await
                .unwrap();
        }

        assert_eq!(h.transport.call_count(), 2);
        assert_eq!(h.history.0.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn client_errors_are_audited_not_cached_and_not_retried() {
        let h = harness(vec![status(401)], settings());
        let payload = json!({"model": "deepseek-chat", "messages": []});

        let err = h
            .client
            .request(RequestKind::Other, CHAT_COMPLETIONS, &payload)
            .await
            .unwrap_err();

        assert!(matches!(err, PortError::Upstream { status: Some(401), .. }));
        assert_eq!(h.transport.call_count(), 1);
        assert!(h.cache.0.lock().unwrap().is_empty());
        let records = h.history.0.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_error);
        assert!(records[0].response_data["error"].as_str().unwrap().contains("HTTP 401"));
    }

    #[tokio::test]
    async fn transient_failures_are_retried_up_to_the_limit() {
        let h = harness(
            vec![status(503), status(502), Ok(completion("наконец"))],
            AiSettings {
                max_retries: 2,
                ..settings()
            },
        );
        let text = h
            .client
            .generate_grounds("Решение суда", "Детали")
            .await
            .unwrap();

        assert_eq!(text, "наконец");
        assert_eq!(h.transport.call_count(), 3);
        assert_eq!(h.history.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_write_one_error_record() {
        let h = harness(
            vec![status(500), status(500)],
            AiSettings {
                max_retries: 1,
                ..settings()
            },
        );
        let err = h.client.analyze_document("текст").await.unwrap_err();

        assert!(matches!(err, PortError::Upstream { status: Some(500), .. }));
        assert_eq!(h.transport.call_count(), 2);
        let records = h.history.0.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_error);
        assert_eq!(records[0].request_type, RequestKind::Analysis);
        assert!(h.cache.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn generate_text_applies_defaults_and_overrides() {
        let h = harness(vec![], settings());
        h.client
            .generate_text(
                RequestKind::Generate,
                "prompt",
                GenerationOptions {
                    max_tokens: Some(100),
                    temperature: None,
                },
            )
            .await
            .unwrap();

        let calls = h.transport.calls.lock().unwrap();
        assert_eq!(calls[0]["max_tokens"], json!(100));
        assert_eq!(calls[0]["temperature"], json!(0.7));
        assert_eq!(calls[0]["messages"], json!([{"role": "user", "content": "prompt"}]));
    }

    #[tokio::test]
    async fn optimize_uses_document_temperature() {
        let h = harness(vec![Ok(completion("лучше"))], settings());
        assert_eq!(h.client.optimize_text("текст", "контекст").await.unwrap(), "лучше");
        assert_eq!(h.transport.calls.lock().unwrap()[0]["temperature"], json!(0.3));
    }

    #[tokio::test]
    async fn field_help_parses_json_and_falls_back_to_prose() {
        let template = DocumentTemplate {
            id: Uuid::new_v4(),
            name: "Апелляционная жалоба".into(),
            doc_type: DocumentType::Appeal,
            category: LegalCategory::Civil,
            description: String::new(),
            template_file: "templates/appeal.html".into(),
            fields_schema: json!({"fields": [{"name": "case_number", "label": "Номер дела"}]}),
            dynamic_blocks: json!([]),
            is_active: true,
            ai_enhancement: true,
            ai_max_length: 1500,
        };
        let field = crate::forms::find_form_field(&template, "case_number").unwrap();

        let structured = completion(
            "```json\n{\"help_text\": \"Укажите номер\", \"examples\": [\"А40-1/2023\"]}\n```",
        );
        let h = harness(vec![Ok(structured), Ok(completion("Просто текст"))], settings());

        let help = h.client.field_help(&template, &field, "", &Value::Null).await.unwrap();
        assert_eq!(help.help_text, "Укажите номер");
        assert_eq!(help.examples, vec!["А40-1/2023"]);
        assert!(help.legal_references.is_empty());
        assert_eq!(h.transport.calls.lock().unwrap()[0]["max_tokens"], json!(1500));

        let prose = h.client.field_help(&template, &field, "А40", &Value::Null).await.unwrap();
        assert_eq!(prose.help_text, "Просто текст");
        assert_eq!(h.history.0.lock().unwrap()[0].request_type, RequestKind::FieldHelp);
    }

    #[test]
    fn message_content_requires_a_choice() {
        assert!(message_content(&json!({"choices": []})).is_err());
        assert_eq!(message_content(&completion("ok")).unwrap(), "ok");
    }
}
