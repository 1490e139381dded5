//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the template REST endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::HttpError;
use crate::web::ai_actions;
use crate::web::protocol::AiActionResult;
use crate::web::state::AppState;
use autodoc_core::domain::{
    DocumentTemplate, DocumentType, LegalCategory, NewGeneratedDocument, TemplateFilter,
};
use autodoc_core::forms::{DynamicForm, FormField};
use autodoc_core::rendering::{example_context, OutputFormat, RenderedDocument};
use autodoc_core::schema::{parse_dynamic_blocks, DynamicBlock};
use axum::{
    extract::{Form, Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

pub const HOME_TEMPLATE_LIMIT: u32 = 6;
pub const TEMPLATES_PER_PAGE: u32 = 12;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        home_handler,
        list_templates_handler,
        template_detail_handler,
        template_by_kind_handler,
        preview_handler,
        generate_form_handler,
        generate_handler,
        download_handler,
        ai_actions::ai_action_handler,
    ),
    components(
        schemas(
            TemplateSummary,
            CategoryInfo,
            HomeResponse,
            TemplateListResponse,
            TemplateDetailResponse,
            TemplateFormResponse,
            GeneratedDocumentResponse,
            AiActionResult
        )
    ),
    tags(
        (name = "AutoDoc API", description = "Court document templates, generation and AI assistance.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// A template as shown in listings.
#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct TemplateSummary {
    pub id: Uuid,
    pub name: String,
    pub doc_type: String,
    pub doc_type_display: String,
    pub category: String,
    pub category_display: String,
    pub description: String,
    pub ai_enhancement: bool,
}

impl From<&DocumentTemplate> for TemplateSummary {
    fn from(template: &DocumentTemplate) -> Self {
        Self {
            id: template.id,
            name: template.name.clone(),
            doc_type: template.doc_type.as_str().to_string(),
            doc_type_display: template.doc_type.display_name().to_string(),
            category: template.category.as_str().to_string(),
            category_display: template.category.display_name().to_string(),
            description: template.description.clone(),
            ai_enhancement: template.ai_enhancement,
        }
    }
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct CategoryInfo {
    pub value: String,
    pub label: String,
}

fn categories() -> Vec<CategoryInfo> {
    LegalCategory::ALL
        .iter()
        .map(|c| CategoryInfo {
            value: c.as_str().to_string(),
            label: c.display_name().to_string(),
        })
        .collect()
}

#[derive(Serialize, Debug, ToSchema)]
pub struct HomeResponse {
    pub templates: Vec<TemplateSummary>,
    pub categories: Vec<CategoryInfo>,
}

#[derive(Deserialize, Debug, Default, IntoParams)]
pub struct TemplateListQuery {
    /// Legal category, e.g. `civil`.
    pub category: Option<String>,
    /// Document type: `claim`, `motion` or `appeal`.
    #[serde(rename = "type")]
    pub doc_type: Option<String>,
    /// Case-insensitive search in the template name.
    pub q: Option<String>,
    /// 1-based page number.
    pub page: Option<u32>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct TemplateListResponse {
    pub templates: Vec<TemplateSummary>,
    pub page: u32,
    pub num_pages: u32,
    pub total: u64,
    pub category_filter: String,
    pub type_filter: String,
    pub search_query: String,
    pub ai_integration: bool,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct TemplateDetailResponse {
    pub template: TemplateSummary,
    #[schema(value_type = Vec<Object>)]
    pub dynamic_blocks: Vec<DynamicBlock>,
    #[schema(value_type = Vec<Object>)]
    pub form: Vec<FormField>,
    /// The template rendered with example data, or a description of why it could not be.
    pub rendered_example: String,
    #[schema(value_type = Object)]
    pub example_context: Map<String, Value>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct TemplateFormResponse {
    pub template: TemplateSummary,
    #[schema(value_type = Vec<Object>)]
    pub dynamic_blocks: Vec<DynamicBlock>,
    #[schema(value_type = Vec<Object>)]
    pub form: Vec<FormField>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct GeneratedDocumentResponse {
    pub status: String,
    pub document_id: Uuid,
    pub template_id: Uuid,
    pub document_content: String,
    #[schema(value_type = Object)]
    pub form_data: Map<String, Value>,
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Ids that are not UUIDs cannot name a template.
fn parse_template_id(raw: &str) -> Result<Uuid, HttpError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| HttpError::not_found(format!("Template {} not found", raw)))
}

async fn load_template(
    app_state: &AppState,
    raw_id: &str,
) -> Result<DocumentTemplate, HttpError> {
    let template_id = parse_template_id(raw_id)?;
    app_state
        .db
        .get_template(template_id)
        .await
        .map_err(|e| HttpError::from_port(e, app_state.debug()))
}

/// Renders with example data; failures are reported inline instead of failing the page.
async fn rendered_example(app_state: &AppState, template: &DocumentTemplate) -> String {
    let context = example_context(template.doc_type);
    match app_state.renderer.render_html(template, Some(&context)).await {
        Ok(html) => html,
        Err(e) => {
            error!("Failed to render example for template {}: {}", template.id, e);
            format!("Example generation failed: {}", e)
        }
    }
}

async fn detail_response(
    app_state: &AppState,
    template: &DocumentTemplate,
) -> TemplateDetailResponse {
    let form = DynamicForm::build(template);
    TemplateDetailResponse {
        template: TemplateSummary::from(template),
        dynamic_blocks: parse_dynamic_blocks(&template.dynamic_blocks),
        form: form.fields().to_vec(),
        rendered_example: rendered_example(app_state, template).await,
        example_context: example_context(template.doc_type),
    }
}

fn string_context(data: &HashMap<String, String>) -> Map<String, Value> {
    data.iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect()
}

fn pdf_response(template: &DocumentTemplate, rendered: RenderedDocument) -> Response {
    let bytes = match rendered {
        RenderedDocument::Pdf(bytes) => bytes,
        RenderedDocument::Html(html) => html.into_bytes(),
    };
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}-{}.pdf\"", template.doc_type, template.id),
            ),
        ],
        bytes,
    )
        .into_response()
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Home page data: the first active templates by name and the category list.
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Featured templates and categories", body = HomeResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn home_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<HomeResponse>, HttpError> {
    let filter = TemplateFilter {
        limit: HOME_TEMPLATE_LIMIT,
        ..Default::default()
    };
    let page = app_state
        .db
        .list_templates(&filter)
        .await
        .map_err(|e| HttpError::from_port(e, app_state.debug()))?;

    Ok(Json(HomeResponse {
        templates: page.templates.iter().map(TemplateSummary::from).collect(),
        categories: categories(),
    }))
}

/// List active templates, filtered and paginated.
#[utoipa::path(
    get,
    path = "/templates",
    params(TemplateListQuery),
    responses(
        (status = 200, description = "One page of templates", body = TemplateListResponse),
        (status = 404, description = "Page out of range"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_templates_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<TemplateListQuery>,
) -> Result<Json<TemplateListResponse>, HttpError> {
    let category_filter = query.category.clone().unwrap_or_default();
    let type_filter = query.doc_type.clone().unwrap_or_default();
    let search_query = query.q.clone().unwrap_or_default();
    let page = query.page.unwrap_or(1);
    if page == 0 {
        return Err(HttpError::not_found("Invalid page"));
    }

    // An unknown filter value matches nothing.
    let category = match category_filter.as_str() {
        "" => None,
        raw => {
            let parsed = raw.parse::<LegalCategory>().ok();
            if parsed.is_none() {
                warn!("Unknown category filter: {}", raw);
            }
            parsed
        }
    };
    let doc_type = match type_filter.as_str() {
        "" => None,
        raw => raw.parse::<DocumentType>().ok(),
    };
    let matches_nothing = (!category_filter.is_empty() && category.is_none())
        || (!type_filter.is_empty() && doc_type.is_none());

    let filter = TemplateFilter {
        category,
        doc_type,
        search: Some(search_query.clone()).filter(|q| !q.trim().is_empty()),
        limit: TEMPLATES_PER_PAGE,
        offset: (page - 1).saturating_mul(TEMPLATES_PER_PAGE),
    };

    let (templates, total) = if matches_nothing {
        (Vec::new(), 0)
    } else {
        let result = app_state
            .db
            .list_templates(&filter)
            .await
            .map_err(|e| HttpError::from_port(e, app_state.debug()))?;
        (result.templates, result.total)
    };

    let num_pages = (total.div_ceil(u64::from(TEMPLATES_PER_PAGE)) as u32).max(1);
    if page > num_pages {
        return Err(HttpError::not_found("Invalid page"));
    }

    Ok(Json(TemplateListResponse {
        templates: templates.iter().map(TemplateSummary::from).collect(),
        page,
        num_pages,
        total,
        category_filter,
        type_filter,
        search_query,
        ai_integration: true,
    }))
}

/// Template detail with its form, dynamic blocks and a rendered example.
#[utoipa::path(
    get,
    path = "/templates/{id}",
    params(("id" = Uuid, Path, description = "Template id")),
    responses(
        (status = 200, description = "Template detail", body = TemplateDetailResponse),
        (status = 404, description = "Template not found")
    )
)]
pub async fn template_detail_handler(
    State(app_state): State<Arc<AppState>>,
    Path(template_id): Path<String>,
) -> Result<Json<TemplateDetailResponse>, HttpError> {
    let template = load_template(&app_state, &template_id).await?;
    Ok(Json(detail_response(&app_state, &template).await))
}

/// The first active template of a document type, with its form.
#[utoipa::path(
    get,
    path = "/templates/kind/{doc_type}",
    params(("doc_type" = String, Path, description = "`claim`, `motion` or `appeal`")),
    responses(
        (status = 200, description = "Template and form", body = TemplateFormResponse),
        (status = 404, description = "No active template of this type")
    )
)]
pub async fn template_by_kind_handler(
    State(app_state): State<Arc<AppState>>,
    Path(doc_type): Path<String>,
) -> Result<Json<TemplateFormResponse>, HttpError> {
    let doc_type = doc_type
        .parse::<DocumentType>()
        .map_err(HttpError::not_found)?;
    let template = app_state
        .db
        .get_template_by_type(doc_type)
        .await
        .map_err(|e| HttpError::from_port(e, app_state.debug()))?;

    let form = DynamicForm::build(&template);
    Ok(Json(TemplateFormResponse {
        template: TemplateSummary::from(&template),
        dynamic_blocks: form.blocks().to_vec(),
        form: form.fields().to_vec(),
    }))
}

/// Render the template with the submitted values as an HTML preview.
#[utoipa::path(
    post,
    path = "/templates/{id}/preview",
    params(("id" = Uuid, Path, description = "Template id")),
    request_body(
        content = HashMap<String, String>,
        content_type = "application/x-www-form-urlencoded"
    ),
    responses(
        (status = 200, description = "Rendered HTML", content_type = "text/html", body = String),
        (status = 404, description = "Template or template file not found"),
        (status = 405, description = "Method not allowed")
    )
)]
pub async fn preview_handler(
    State(app_state): State<Arc<AppState>>,
    Path(template_id): Path<String>,
    Form(data): Form<HashMap<String, String>>,
) -> Result<Html<String>, HttpError> {
    let template = load_template(&app_state, &template_id).await?;
    let html = app_state
        .renderer
        .render_html(&template, Some(&string_context(&data)))
        .await
        .map_err(|e| HttpError::from_port(e, app_state.debug()))?;
    Ok(Html(html))
}

/// The generation form with an example rendering.
#[utoipa::path(
    get,
    path = "/templates/{id}/generate",
    params(("id" = Uuid, Path, description = "Template id")),
    responses(
        (status = 200, description = "Form and example", body = TemplateDetailResponse),
        (status = 404, description = "Template not found")
    )
)]
pub async fn generate_form_handler(
    State(app_state): State<Arc<AppState>>,
    Path(template_id): Path<String>,
) -> Result<Json<TemplateDetailResponse>, HttpError> {
    let template = load_template(&app_state, &template_id).await?;
    Ok(Json(detail_response(&app_state, &template).await))
}

/// Validate the submitted form, render the document and store it.
///
/// With `download_pdf` present in the body the document is returned as a PDF
/// attachment instead of JSON.
#[utoipa::path(
    post,
    path = "/templates/{id}/generate",
    params(("id" = Uuid, Path, description = "Template id")),
    request_body(
        content = HashMap<String, String>,
        content_type = "application/x-www-form-urlencoded"
    ),
    responses(
        (status = 200, description = "Generated document", body = GeneratedDocumentResponse),
        (status = 400, description = "The form has errors"),
        (status = 404, description = "Template or template file not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn generate_handler(
    State(app_state): State<Arc<AppState>>,
    Path(template_id): Path<String>,
    Form(data): Form<HashMap<String, String>>,
) -> Result<Response, HttpError> {
    let template = load_template(&app_state, &template_id).await?;
    let form = DynamicForm::build(&template);

    let cleaned = form.validate(&data).map_err(|errors| {
        warn!("Generation form for template {} has {} error(s)", template.id, errors.len());
        HttpError::bad_request("Please correct the errors in the form").with_errors(&errors)
    })?;
    let context = form.to_context(&cleaned);

    let document_content = app_state
        .renderer
        .render_html(&template, Some(&context))
        .await
        .map_err(|e| HttpError::from_port(e, app_state.debug()))?;

    let saved = app_state
        .db
        .save_generated_document(NewGeneratedDocument {
            template_id: template.id,
            content: Value::Object(context.clone()),
            document_content: Some(document_content.clone()),
            file: None,
            session_key: Uuid::new_v4().simple().to_string(),
        })
        .await
        .map_err(|e| HttpError::from_port(e, app_state.debug()))?;
    info!("Generated document {} from template {}", saved.id, template.id);

    if data.contains_key("download_pdf") {
        let rendered = app_state
            .renderer
            .render(&template, Some(&context), OutputFormat::Pdf)
            .await
            .map_err(|e| HttpError::from_port(e, app_state.debug()))?;
        return Ok(pdf_response(&template, rendered));
    }

    Ok((
        StatusCode::OK,
        Json(GeneratedDocumentResponse {
            status: "success".to_string(),
            document_id: saved.id,
            template_id: template.id,
            document_content,
            form_data: context,
        }),
    )
        .into_response())
}

/// Render the template named by `template_id` with the rest of the form as a PDF.
#[utoipa::path(
    post,
    path = "/download",
    request_body(
        content = HashMap<String, String>,
        content_type = "application/x-www-form-urlencoded"
    ),
    responses(
        (status = 200, description = "PDF attachment (`application/pdf`)"),
        (status = 404, description = "Template or template file not found"),
        (status = 405, description = "Method not allowed"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn download_handler(
    State(app_state): State<Arc<AppState>>,
    Form(data): Form<HashMap<String, String>>,
) -> Result<Response, HttpError> {
    let raw_id = data.get("template_id").map(String::as_str).unwrap_or_default();
    let template = load_template(&app_state, raw_id).await?;

    let rendered = app_state
        .renderer
        .render(&template, Some(&string_context(&data)), OutputFormat::Pdf)
        .await
        .map_err(|e| HttpError::from_port(e, app_state.debug()))?;
    Ok(pdf_response(&template, rendered))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_cover_every_legal_category() {
        let list = categories();
        assert_eq!(list.len(), LegalCategory::ALL.len());
        assert_eq!(list[0].value, "civil");
        assert_eq!(list[0].label, "Гражданские дела");
    }

    #[test]
    fn openapi_document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/",
            "/templates",
            "/templates/{id}",
            "/templates/kind/{doc_type}",
            "/templates/{id}/preview",
            "/templates/{id}/generate",
            "/download",
            "/api/ai/",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
