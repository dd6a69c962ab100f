//! Pre-flight check of the worker's LLM configuration.
//!
//! Advisory only: the result decides the status banner, it never gates an
//! invocation. The worker performs its own authoritative check and fails on the
//! same condition.

use std::path::Path;

use serde::Serialize;

/// Literal values shipped in sample configs.
const PLACEHOLDER_KEYS: &[&str] = &["", "YOUR_API_KEY", "AZURE API KEY", "your Jiekou.AI api key"];

/// Any key containing this marker is an unfilled template value.
const PLACEHOLDER_MARKER: &str = "YOUR_";

/// Outcome of a pre-flight check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub ok: bool,
    pub message: String,
}

impl ValidationReport {
    fn valid() -> Self {
        Self {
            ok: true,
            message: "configuration valid".to_string(),
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// True when `key` (already trimmed) is empty or a sample-config placeholder.
pub fn is_placeholder_key(key: &str) -> bool {
    PLACEHOLDER_KEYS.contains(&key) || key.contains(PLACEHOLDER_MARKER)
}

/// Read `path` fresh and check `[llm].api_key`.
///
/// Fails closed: a missing or unparsable file is reported as not ok.
pub fn check_llm_config(path: &Path) -> ValidationReport {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "LLM config not found");
            return ValidationReport::invalid("config not found");
        }
        Err(e) => return ValidationReport::invalid(format!("parse error: {e}")),
    };

    let parsed = match text.parse::<toml::Table>() {
        Ok(table) => table,
        Err(e) => return ValidationReport::invalid(format!("parse error: {}", e.message())),
    };

    let api_key = extract_api_key(&parsed);
    if is_placeholder_key(&api_key) {
        return ValidationReport::invalid(
            "set [llm].api_key to a valid key in config/config.toml",
        );
    }

    ValidationReport::valid()
}

fn extract_api_key(config: &toml::Table) -> String {
    let value = config
        .get("llm")
        .and_then(toml::Value::as_table)
        .and_then(|llm| llm.get("api_key"));

    match value {
        Some(toml::Value::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string().trim().to_string(),
        None => String::new(),
    }
}
