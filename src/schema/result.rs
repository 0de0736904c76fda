use super::shacl::ReportEntry;
use crate::format::SchemaEngine;
use crate::shapemap::{ResultShapeMap, Status};
use serde::Serialize;
use std::fmt::Write;

/// Engine output for one validation request.
///
/// A non-conforming validation is an ordinary result; `error` is only set
/// when no validation took place.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<SchemaEngine>,
    pub message: String,
    pub shape_map: ResultShapeMap,
    pub report: Vec<ReportEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn new(engine: SchemaEngine, shape_map: ResultShapeMap, report: Vec<ReportEntry>) -> Self {
        let failed = shape_map
            .entries()
            .iter()
            .filter(|entry| entry.status == Status::Nonconformant)
            .count();
        let valid = failed == 0 && report.is_empty();
        let message = if valid {
            format!("Data conforms to the {engine} schema")
        } else if failed == 0 {
            format!("Data does not conform: {} report entries", report.len())
        } else {
            format!("Data does not conform: {failed} nonconformant node(s)")
        };
        Self {
            valid,
            engine: Some(engine),
            message,
            shape_map,
            report,
            error: None,
        }
    }

    /// The degenerate result for a request that could not be validated.
    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            valid: false,
            engine: None,
            message: format!("Validation could not run: {message}"),
            shape_map: ResultShapeMap::default(),
            report: Vec::new(),
            error: Some(message),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|error| {
            serde_json::json!({ "valid": false, "error": error.to_string() })
        })
    }

    pub fn to_html(&self) -> String {
        let mut html = String::new();
        let _ = writeln!(html, "<div class=\"validation-result\">");
        let _ = writeln!(html, "<p class=\"{}\">{}</p>", self.css_class(), escape(&self.message));
        if let Some(error) = &self.error {
            let _ = writeln!(html, "<pre class=\"error\">{}</pre>", escape(error));
        }
        if !self.shape_map.is_empty() {
            html.push_str("<table class=\"shape-map\">\n<tr><th>Node</th><th>Shape</th><th>Status</th><th>Details</th></tr>\n");
            for entry in self.shape_map.entries() {
                let status = match entry.status {
                    Status::Conformant => "conformant",
                    Status::Nonconformant => "nonconformant",
                };
                let _ = writeln!(
                    html,
                    "<tr class=\"{status}\"><td>{}</td><td>{}</td><td>{status}</td><td>{}</td></tr>",
                    escape(&self.shape_map.node_display(entry)),
                    escape(&self.shape_map.shape_display(entry)),
                    escape(entry.reason.as_deref().unwrap_or(""))
                );
            }
            html.push_str("</table>\n");
        }
        if !self.report.is_empty() {
            html.push_str("<table class=\"report\">\n<tr><th>Severity</th><th>Focus node</th><th>Path</th><th>Value</th><th>Message</th></tr>\n");
            for entry in &self.report {
                let _ = writeln!(
                    html,
                    "<tr><td>{:?}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                    entry.severity(),
                    escape(entry.focus_node()),
                    escape(entry.result_path().unwrap_or("")),
                    escape(entry.value().unwrap_or("")),
                    escape(entry.message())
                );
            }
            html.push_str("</table>\n");
        }
        html.push_str("</div>\n");
        html
    }

    fn css_class(&self) -> &'static str {
        match (self.is_error(), self.valid) {
            (true, _) => "error",
            (false, true) => "valid",
            (false, false) => "invalid",
        }
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}
