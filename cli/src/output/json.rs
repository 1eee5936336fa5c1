//! JSON output helpers.
//!
//! Every `--json` code path prints exactly one pretty-printed document to
//! stdout: the command's result on success, or the error object on failure.

use anyhow::{Context, Result};
use serde::Serialize;

/// Renders service results as JSON documents.
pub struct JsonRenderer;

impl JsonRenderer {
    /// Print `value` as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", to_pretty(value)?);
        Ok(())
    }
}

fn to_pretty<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("JSON serialization failed")
}

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = serde_json::json!({
        "error": true,
        "message": message,
        "code": code,
    });
    to_pretty(&obj)
}

/// Stable machine-readable code for the innermost typed error in `err`.
#[must_use]
pub fn error_code(err: &anyhow::Error) -> &'static str {
    use crate::domain::error::{ConfigError, ProvisionError};

    for cause in err.chain() {
        if cause.downcast_ref::<ConfigError>().is_some() {
            return "config_error";
        }
        if let Some(e) = cause.downcast_ref::<ProvisionError>() {
            return match e {
                ProvisionError::ResourceExhausted { .. } => "resource_exhausted",
                ProvisionError::CommandFailed { .. } => "command_failed",
                ProvisionError::Aggregated { .. } => "aggregated_failure",
            };
        }
    }
    "error"
}
