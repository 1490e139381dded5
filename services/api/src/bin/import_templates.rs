//! services/api/src/bin/import_templates.rs
//!
//! Loads document templates from a JSON file into the database.
//!
//! The file holds an array of templates (or a single template object). Each
//! template's dynamic blocks are validated before anything is written, so one
//! bad block rejects the whole file.

use api_lib::{adapters::DbAdapter, config::Config, error::ApiError};
use autodoc_core::blocks::validate_dynamic_blocks;
use autodoc_core::domain::NewDocumentTemplate;
use autodoc_core::ports::DatabaseService;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn parse_templates(raw: &str) -> Result<Vec<NewDocumentTemplate>, ApiError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ApiError::Internal(format!("Template file is not valid JSON: {}", e)))?;
    let items = match value {
        Value::Array(items) => items,
        single @ Value::Object(_) => vec![single],
        _ => {
            return Err(ApiError::Internal(
                "Template file must hold an object or an array of objects".to_string(),
            ))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let template: NewDocumentTemplate = serde_json::from_value(item).map_err(|e| {
                ApiError::Internal(format!("Template #{} is malformed: {}", index + 1, e))
            })?;
            validate_dynamic_blocks(&template.dynamic_blocks).map_err(|e| {
                ApiError::Internal(format!("Template '{}': {}", template.name, e))
            })?;
            Ok(template)
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = std::env::args()
        .nth(1)
        .ok_or_else(|| ApiError::Internal("Usage: import_templates <templates.json>".to_string()))?;
    let raw = tokio::fs::read_to_string(&path).await?;
    let templates = parse_templates(&raw).map_err(|e| {
        error!("Rejected {}: {}", path, e);
        e
    })?;
    info!("Validated {} template(s) from {}", templates.len(), path);

    let db_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database_url)
        .await?;
    let db = DbAdapter::new(db_pool);
    db.run_migrations().await?;

    for template in templates {
        let name = template.name.clone();
        let created = db.create_template(template).await?;
        info!("Imported template '{}' as {}", name, created.id);
    }

    Ok(())
}
