//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` and `AiHistoryRepository` ports from the core crate.
//! It handles all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use autodoc_core::domain::{
    AiRequestRecord, DocumentTemplate, DocumentType, GeneratedDocument, NewAiRequestRecord,
    NewDocumentTemplate, NewGeneratedDocument, TemplateFilter, TemplatePage,
};
use autodoc_core::ports::{AiHistoryRepository, DatabaseService, PortError, PortResult};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const TEMPLATE_COLUMNS: &str = "id, name, doc_type, category, description, template_file, \
     fields_schema, dynamic_blocks, is_active, ai_enhancement, ai_max_length";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the persistence ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct TemplateRecord {
    id: Uuid,
    name: String,
    doc_type: String,
    category: String,
    description: String,
    template_file: String,
    fields_schema: Value,
    dynamic_blocks: Value,
    is_active: bool,
    ai_enhancement: bool,
    ai_max_length: i32,
}
impl TemplateRecord {
    fn to_domain(self) -> PortResult<DocumentTemplate> {
        Ok(DocumentTemplate {
            id: self.id,
            name: self.name,
            doc_type: self.doc_type.parse().map_err(PortError::Unexpected)?,
            category: self.category.parse().map_err(PortError::Unexpected)?,
            description: self.description,
            template_file: self.template_file,
            fields_schema: self.fields_schema,
            dynamic_blocks: self.dynamic_blocks,
            is_active: self.is_active,
            ai_enhancement: self.ai_enhancement,
            ai_max_length: self.ai_max_length.max(0) as u32,
        })
    }
}

#[derive(FromRow)]
struct GeneratedDocumentRecord {
    id: Uuid,
    template_id: Uuid,
    content: Value,
    document_content: Option<String>,
    file: Option<String>,
    created_at: DateTime<Utc>,
    session_key: String,
}
impl GeneratedDocumentRecord {
    fn to_domain(self) -> GeneratedDocument {
        GeneratedDocument {
            id: self.id,
            template_id: self.template_id,
            content: self.content,
            document_content: self.document_content,
            file: self.file,
            created_at: self.created_at,
            session_key: self.session_key,
        }
    }
}

#[derive(FromRow)]
struct AiRequestRecordRow {
    id: Uuid,
    user_id: Option<Uuid>,
    request_type: String,
    request_data: Value,
    response_data: Value,
    is_error: bool,
    created_at: DateTime<Utc>,
    processing_time: Option<f64>,
    api_endpoint: Option<String>,
    model_used: Option<String>,
}
impl AiRequestRecordRow {
    fn to_domain(self) -> PortResult<AiRequestRecord> {
        Ok(AiRequestRecord {
            id: self.id,
            user_id: self.user_id,
            request_type: self.request_type.parse().map_err(PortError::Unexpected)?,
            request_data: self.request_data,
            response_data: self.response_data,
            is_error: self.is_error,
            created_at: self.created_at,
            processing_time: self.processing_time,
            api_endpoint: self.api_endpoint,
            model_used: self.model_used,
        })
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Appends the shared `WHERE` clause of the listing and count queries.
fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &TemplateFilter) {
    builder.push(" WHERE is_active = TRUE");
    if let Some(category) = filter.category {
        builder.push(" AND category = ").push_bind(category.as_str());
    }
    if let Some(doc_type) = filter.doc_type {
        builder.push(" AND doc_type = ").push_bind(doc_type.as_str());
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        builder
            .push(" AND name ILIKE ")
            .push_bind(format!("%{}%", escape_like(search.trim())));
    }
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn list_templates(&self, filter: &TemplateFilter) -> PortResult<TemplatePage> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM document_templates");
        push_filter(&mut count, filter);
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM document_templates",
            TEMPLATE_COLUMNS
        ));
        push_filter(&mut select, filter);
        select
            .push(" ORDER BY name ASC LIMIT ")
            .push_bind(i64::from(filter.limit))
            .push(" OFFSET ")
            .push_bind(i64::from(filter.offset));

        let records = select
            .build_query_as::<TemplateRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        let templates = records
            .into_iter()
            .map(TemplateRecord::to_domain)
            .collect::<PortResult<Vec<_>>>()?;

        Ok(TemplatePage {
            templates,
            total: total.max(0) as u64,
        })
    }

    async fn get_template(&self, template_id: Uuid) -> PortResult<DocumentTemplate> {
        let record = sqlx::query_as::<_, TemplateRecord>(&format!(
            "SELECT {} FROM document_templates WHERE id = $1",
            TEMPLATE_COLUMNS
        ))
        .bind(template_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Template {} not found", template_id))
            }
            _ => PortError::Unexpected(e.to_string()),
        })?;
        record.to_domain()
    }

    async fn get_template_by_type(&self, doc_type: DocumentType) -> PortResult<DocumentTemplate> {
        let record = sqlx::query_as::<_, TemplateRecord>(&format!(
            "SELECT {} FROM document_templates WHERE doc_type = $1 AND is_active = TRUE ORDER BY name ASC LIMIT 1",
            TEMPLATE_COLUMNS
        ))
        .bind(doc_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("No active {} template", doc_type)))?;
        record.to_domain()
    }

    async fn create_template(&self, template: NewDocumentTemplate) -> PortResult<DocumentTemplate> {
        let ai_max_length = i32::try_from(template.ai_max_length).map_err(|_| {
            PortError::Validation(format!("ai_max_length {} is too large", template.ai_max_length))
        })?;
        let record = sqlx::query_as::<_, TemplateRecord>(&format!(
            "INSERT INTO document_templates ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {}",
            TEMPLATE_COLUMNS, TEMPLATE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&template.name)
        .bind(template.doc_type.as_str())
        .bind(template.category.as_str())
        .bind(&template.description)
        .bind(&template.template_file)
        .bind(&template.fields_schema)
        .bind(&template.dynamic_blocks)
        .bind(template.is_active)
        .bind(template.ai_enhancement)
        .bind(ai_max_length)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain()
    }

    async fn save_generated_document(
        &self,
        document: NewGeneratedDocument,
    ) -> PortResult<GeneratedDocument> {
        let record = sqlx::query_as::<_, GeneratedDocumentRecord>(
            "INSERT INTO generated_documents (id, template_id, content, document_content, file, session_key) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, template_id, content, document_content, file, created_at, session_key",
        )
        .bind(Uuid::new_v4())
        .bind(document.template_id)
        .bind(&document.content)
        .bind(&document.document_content)
        .bind(&document.file)
        .bind(&document.session_key)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }
}

//=========================================================================================
// `AiHistoryRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl AiHistoryRepository for DbAdapter {
    async fn record_ai_request(&self, record: NewAiRequestRecord) -> PortResult<AiRequestRecord> {
        let row = sqlx::query_as::<_, AiRequestRecordRow>(
            "INSERT INTO ai_request_history \
             (id, user_id, request_type, request_data, response_data, is_error, processing_time, api_endpoint, model_used) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING id, user_id, request_type, request_data, response_data, is_error, created_at, \
             processing_time, api_endpoint, model_used",
        )
        .bind(Uuid::new_v4())
        .bind(record.user_id)
        .bind(record.request_type.as_str())
        .bind(&record.request_data)
        .bind(&record.response_data)
        .bind(record.is_error)
        .bind(record.processing_time)
        .bind(&record.api_endpoint)
        .bind(&record.model_used)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        row.to_domain()
    }
}
