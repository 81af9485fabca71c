//! Payload templates
//!
//! User-data and metadata are rendered from static templates with
//! `{{ placeholder }}` tokens. String values are escaped with
//! [`escape_value`] before they reach the template and are always placed
//! inside double-quoted YAML scalars, so no value can break the document
//! structure.

use minijinja::{Environment, UndefinedBehavior, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;
use tracing::debug;

use crate::ProvisionError;

/// Built-in cloud-init user-data template
pub const USERDATA_TEMPLATE: &str = include_str!("../../templates/userdata.yaml");

/// Built-in cloud-init metadata template
pub const METADATA_TEMPLATE: &str = include_str!("../../templates/metadata.yaml");

/// Template variables
pub type Context = BTreeMap<String, Value>;

/// Escape a value for substitution into a double-quoted template scalar.
///
/// Backslashes, double quotes, path separators and control characters are
/// backslash-escaped. The output is a valid YAML double-quoted scalar body
/// that reads back as `raw`.
pub fn escape_value(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '/' => escaped.push_str("\\/"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c if c.is_control() => escaped.push_str(&format!("\\x{:02x}", c as u32 & 0xff)),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Render a template with the given context.
///
/// Unknown placeholders are an error rather than an empty substitution.
pub fn render_template(
    name: &str,
    template: &str,
    context: &Context,
) -> Result<String, ProvisionError> {
    debug!("Rendering template {}", name);

    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_keep_trailing_newline(true);

    env.add_template(name, template)?;
    let tmpl = env.get_template(name)?;

    Ok(tmpl.render(context)?)
}

/// Read a template override, or fall back to the built-in text
pub async fn load_template(
    path: Option<&Path>,
    builtin: &'static str,
) -> Result<String, ProvisionError> {
    match path {
        Some(path) => {
            debug!("Loading template from {}", path.display());
            fs::read_to_string(path).await.map_err(|e| {
                ProvisionError::Config(format!("Cannot read template {}: {}", path.display(), e))
            })
        }
        None => Ok(builtin.to_string()),
    }
}
