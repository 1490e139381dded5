//! crates/autodoc_core/src/templating.rs
//!
//! Renders template markup with Django/Jinja syntax: `{{ value }}` output with
//! filters, `{% for %}` loops and `{% if %}` conditionals. Output is
//! HTML-escaped, and undefined names (including lookups chained off them)
//! render as an empty string, as does `null`.

use minijinja::{escape_formatter, AutoEscape, Environment, UndefinedBehavior};
use serde_json::{Map, Value};
use std::sync::LazyLock;

use crate::ports::{PortError, PortResult};

static MARKUP_ENV: LazyLock<Environment<'static>> = LazyLock::new(|| {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Chainable);
    env.set_auto_escape_callback(|_| AutoEscape::Html);
    env.set_formatter(|out, state, value| {
        if value.is_none() {
            Ok(())
        } else {
            escape_formatter(out, state, value)
        }
    });
    env
});

/// Renders `markup` against `context`. Syntax errors in the markup come back
/// as `PortError::Unexpected`.
pub fn render_markup(markup: &str, context: &Map<String, Value>) -> PortResult<String> {
    MARKUP_ENV
        .render_str(markup, context)
        .map_err(|e| PortError::Unexpected(format!("Template markup failed to render: {}", e)))
}
