//! Output formatting for check results.

use std::fmt::Display;

use contract_schema_core::{Diagnostic, Severity};
use serde::Serialize;

/// Supported output formats.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum OutputFormat {
    Json,
    Yaml,
    Markdown,
    Table,
}

/// Outcome of checking one spec document.
#[derive(Debug, Clone, Serialize)]
pub struct SpecReport {
    pub source: String,
    /// Set when the document could not be loaded; there are no diagnostics
    /// in that case.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_error: Option<String>,
    pub errors: usize,
    pub warnings: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl SpecReport {
    pub fn new(source: impl Into<String>, diagnostics: Vec<Diagnostic>) -> Self {
        let errors = diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count();
        Self {
            source: source.into(),
            load_error: None,
            errors,
            warnings: diagnostics.len() - errors,
            diagnostics,
        }
    }

    pub fn failed_to_load(source: impl Into<String>, error: impl Display) -> Self {
        Self {
            source: source.into(),
            load_error: Some(error.to_string()),
            errors: 1,
            warnings: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Whether this report should fail a check run.
    pub fn is_failure(&self, deny_warnings: bool) -> bool {
        self.errors > 0 || (deny_warnings && self.warnings > 0)
    }
}

/// Formats check reports in the requested output format.
pub fn format_reports(reports: &[SpecReport], format: OutputFormat) -> Result<String, String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(reports)
            .map_err(|e| format!("JSON serialization failed: {e}")),
        OutputFormat::Yaml => {
            serde_yaml::to_string(reports).map_err(|e| format!("YAML serialization failed: {e}"))
        }
        OutputFormat::Markdown => Ok(reports_to_markdown(reports)),
        OutputFormat::Table => Ok(reports_to_table(reports)),
    }
}

fn reports_to_markdown(reports: &[SpecReport]) -> String {
    let mut out = String::new();

    out.push_str("# Contract Check\n\n");
    for report in reports {
        out.push_str(&format!("## {}\n\n", report.source));
        out.push_str(&format!("- **Errors:** {}\n", report.errors));
        out.push_str(&format!("- **Warnings:** {}\n", report.warnings));

        if let Some(ref err) = report.load_error {
            out.push_str(&format!("- **Load Error:** {err}\n"));
        }

        if !report.diagnostics.is_empty() {
            out.push_str("\n| Severity | Code | Subject | Message |\n");
            out.push_str("|----------|------|---------|---------|\n");
            for d in &report.diagnostics {
                out.push_str(&format!(
                    "| {} | `{}` | {} | {} |\n",
                    d.severity,
                    d.code(),
                    d.subject,
                    d.message().replace('|', "\\|")
                ));
            }
        }
        out.push('\n');
    }

    out
}

fn reports_to_table(reports: &[SpecReport]) -> String {
    let mut out = String::new();
    for report in reports {
        let status = if report.errors > 0 { "FAIL" } else { "OK" };
        out.push_str(&format!(
            "{:<32} {:<6} errors={} warnings={}\n",
            report.source, status, report.errors, report.warnings,
        ));
        if let Some(ref err) = report.load_error {
            out.push_str(&format!("  {err}\n"));
        }
        for d in &report.diagnostics {
            out.push_str(&format!("  {d}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_skit;
    use contract_schema_core::{ValidateOptions, validate};

    fn sample_report() -> SpecReport {
        let spec = load_skit(
            "fn open2\n    rv void\n    ur\n\nres\n    alloc open2\n    dealloc close\n",
        )
        .unwrap();
        SpecReport::new("io.skit", validate(&spec, &ValidateOptions::default()))
    }

    #[test]
    fn test_report_counts() {
        let report = sample_report();
        assert_eq!(report.errors, 1);
        assert!(report.warnings >= 1);
        assert!(report.is_failure(false));
    }

    #[test]
    fn test_clean_report_with_warnings() {
        let spec = load_skit("fn f\n    rv void\n    ur\n").unwrap();
        let report = SpecReport::new("f.skit", validate(&spec, &ValidateOptions::default()));
        assert_eq!(report.errors, 0);
        assert_eq!(report.warnings, 1);
        assert!(!report.is_failure(false));
        assert!(report.is_failure(true));
    }

    #[test]
    fn test_format_json() {
        let json = format_reports(&[sample_report()], OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["source"], "io.skit");
        assert_eq!(value[0]["errors"], 1);
        assert!(value[0].get("load_error").is_none());
        let codes: Vec<&str> = value[0]["diagnostics"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["code"].as_str().unwrap())
            .collect();
        assert!(codes.contains(&"unknown-function"));
    }

    #[test]
    fn test_format_yaml() {
        let yaml = format_reports(&[sample_report()], OutputFormat::Yaml).unwrap();
        assert!(yaml.contains("source: io.skit"));
        assert!(yaml.contains("unknown-function"));
    }

    #[test]
    fn test_format_markdown() {
        let md = format_reports(&[sample_report()], OutputFormat::Markdown).unwrap();
        assert!(md.contains("## io.skit"));
        assert!(md.contains("| error | `unknown-function` |"));
    }

    #[test]
    fn test_format_table_load_failure() {
        let err = load_skit("fn\n").unwrap_err();
        let report = SpecReport::failed_to_load("bad.skit", &err);
        let table = format_reports(&[report], OutputFormat::Table).unwrap();
        assert!(table.contains("bad.skit"));
        assert!(table.contains("FAIL"));
        assert!(table.contains("line 1"));
    }
}
