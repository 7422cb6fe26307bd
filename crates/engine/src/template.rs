//! Template rendering utilities using Tera
//!
//! Prompts and stream payloads are tera templates rendered over a JSON
//! snapshot of the execution context, with consistent error handling.

use serde_json::Value;
use tera::{Context, Tera};

use crate::{Error, Result};

/// Render a template string with the given context value. Top-level object
/// fields become template variables; a non-object context is exposed as
/// `data`.
pub fn render_template(template: &str, context: &Value) -> Result<String> {
    let mut tera = Tera::default();
    tera.add_raw_template("template", template)
        .map_err(|e| Error::Template(format!("failed to parse template: {}", e)))?;

    let mut tera_context = Context::new();
    match context {
        Value::Object(map) => {
            for (key, value) in map {
                tera_context.insert(key, &value);
            }
        }
        _ => {
            tera_context.insert("data", &context);
        }
    }

    tera.render("template", &tera_context)
        .map_err(|e| Error::Template(format!("failed to render template: {}", e)))
}
