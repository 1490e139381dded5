//! services/api/src/adapters/files.rs
//!
//! Reads template markup from the media directory.

use async_trait::async_trait;
use autodoc_core::ports::{PortError, PortResult, TemplateSource};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

#[derive(Clone, Debug)]
pub struct FsTemplateSource {
    media_root: PathBuf,
}

impl FsTemplateSource {
    pub fn new(media_root: impl Into<PathBuf>) -> Self {
        Self {
            media_root: media_root.into(),
        }
    }

    /// Joins a stored reference onto the media root, refusing anything that
    /// could step outside it.
    fn resolve(&self, template_file: &str) -> PortResult<PathBuf> {
        let relative = Path::new(template_file);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if template_file.trim().is_empty() || escapes {
            return Err(PortError::Validation(format!(
                "Invalid template file reference: {}",
                template_file
            )));
        }
        Ok(self.media_root.join(relative))
    }
}

#[async_trait]
impl TemplateSource for FsTemplateSource {
    async fn load(&self, template_file: &str) -> PortResult<String> {
        let path = self.resolve(template_file)?;
        debug!("Loading template markup from {}", path.display());
        tokio::fs::read_to_string(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                PortError::NotFound(format!("Template file {} not found", template_file))
            }
            _ => PortError::Unexpected(format!("Failed to read {}: {}", path.display(), e)),
        })
    }
}
