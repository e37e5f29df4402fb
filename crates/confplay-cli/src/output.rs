//! Output formatting for CLI

use serde::Serialize;

/// Output format options
pub enum OutputFormat {
    Text,
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

/// Format output based on selected format
pub fn format_output<T: Serialize>(data: &T, format: &str) -> String {
    match OutputFormat::from(format) {
        OutputFormat::Json => {
            serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Text => {
            let value = serde_json::to_value(data).unwrap_or_default();
            match value {
                serde_json::Value::Object(fields) => fields
                    .iter()
                    .map(|(key, value)| format!("{key:>24}: {value}"))
                    .collect::<Vec<_>>()
                    .join("\n"),
                other => other.to_string(),
            }
        }
    }
}
