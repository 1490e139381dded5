//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use autodoc_core::ports::DatabaseService;
use autodoc_core::{AiClient, DocumentRenderer};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub ai: Arc<AiClient>,
    pub renderer: Arc<DocumentRenderer>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Whether error responses may carry internal detail.
    pub fn debug(&self) -> bool {
        self.config.debug
    }
}
