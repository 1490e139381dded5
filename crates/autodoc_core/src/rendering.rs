//! crates/autodoc_core/src/rendering.rs
//!
//! The single document renderer shared by every endpoint: loads template
//! markup, merges the caller's context over the example context for the
//! document type, and produces HTML or the PDF stand-in.

use chrono::Local;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::error;

use crate::domain::{DocumentTemplate, DocumentType};
use crate::templating::render_markup;
use crate::ports::{PortResult, TemplateSource};

const PDF_STUB_PREFIX: &str =
    "PDF generation is not implemented yet. Would generate PDF from:\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Html,
    Pdf,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderedDocument {
    Html(String),
    /// Not a real PDF: the rendered text behind a notice, served as `application/pdf`.
    Pdf(Vec<u8>),
}

/// Deterministic sample values used to preview a template before any input exists.
pub fn example_context(doc_type: DocumentType) -> Map<String, Value> {
    let value = match doc_type {
        DocumentType::Motion => json!({
            "court_name": "Московский городской суд",
            "applicant": {
                "full_name": "Иванов Иван Иванович",
                "address": "г. Москва, ул. Примерная, д. 1",
                "phone": "+7 (999) 123-45-67",
                "email": "ivanov@example.com"
            },
            "motion_type": "отложении судебного заседания",
            "motion_reason": "Необходимость представления дополнительных доказательств",
            "current_date": "20.11.2023",
            "case_number": "А40-12345/2023",
            "judge_name": "Петрова Мария Ивановна"
        }),
        DocumentType::Appeal => json!({
            "appellate_court": "Московский областной суд",
            "appellant": {
                "full_name": "Иванов Иван Иванович",
                "address": "г. Москва, ул. Примерная, д. 1",
                "phone": "+7 (999) 123-45-67",
                "email": "ivanov@example.com"
            },
            "decision_date": "15.10.2023",
            "case_number": "А40-123456/2023",
            "grounds": ["Нарушение норм материального права", "Несоответствие выводов суда"],
            "original_court": "Московский городской суд",
            "original_judge": "Сидоров Алексей Петрович"
        }),
        DocumentType::Claim => json!({
            "court_name": "Московский городской суд",
            "plaintiff": {
                "full_name": "Иванов Иван Иванович",
                "address": "г. Москва, ул. Примерная, д. 1",
                "phone": "+7 (999) 123-45-67",
                "email": "ivanov@example.com",
                "inn": "771234567890"
            },
            "defendant": {
                "full_name": "ООО 'Компания'",
                "address": "г. Москва, ул. Тестовая, д. 2",
                "inn": "770987654321"
            },
            "claim_amount": "115 000 руб.",
            "claim_reason": "долга по договору займа",
            "contract_date": "15.05.2023",
            "contract_number": "123",
            "payment_due_date": "15.08.2023"
        }),
    };

    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[derive(Clone)]
pub struct DocumentRenderer {
    source: Arc<dyn TemplateSource>,
}

impl DocumentRenderer {
    pub fn new(source: Arc<dyn TemplateSource>) -> Self {
        Self { source }
    }

    /// Example context for the template's type with `overrides` applied key by key.
    pub fn merged_context(
        doc_type: DocumentType,
        overrides: Option<&Map<String, Value>>,
    ) -> Map<String, Value> {
        let mut context = example_context(doc_type);
        if let Some(overrides) = overrides {
            for (key, value) in overrides {
                context.insert(key.clone(), value.clone());
            }
        }
        context
            .entry("current_date")
            .or_insert_with(|| Value::String(Local::now().format("%d.%m.%Y").to_string()));
        context
    }

    pub async fn render(
        &self,
        template: &DocumentTemplate,
        context: Option<&Map<String, Value>>,
        format: OutputFormat,
    ) -> PortResult<RenderedDocument> {
        let html = self.render_html(template, context).await?;
        Ok(match format {
            OutputFormat::Html => RenderedDocument::Html(html),
            OutputFormat::Pdf => RenderedDocument::Pdf(pdf_stub(&html)),
        })
    }

    pub async fn render_html(
        &self,
        template: &DocumentTemplate,
        context: Option<&Map<String, Value>>,
    ) -> PortResult<String> {
        let markup = self
            .source
            .load(&template.template_file)
            .await
            .map_err(|e| {
                error!("Failed to render template {}: {}", template.id, e);
                e
            })?;

        let context = Self::merged_context(template.doc_type, context);
        render_markup(&markup, &context).map_err(|e| {
            error!("Failed to render template {}: {}", template.id, e);
            e
        })
    }
}

fn pdf_stub(html: &str) -> Vec<u8> {
    format!("{}{}", PDF_STUB_PREFIX, html).into_bytes()
}
