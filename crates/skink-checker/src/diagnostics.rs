//! Diagnostic rendering
//!
//! Renders collected [`Issue`]s as terminal diagnostics with source
//! context, or as JSON for editor integration. The checker only records
//! issues; everything presentation-related lives here.

use codespan_reporting::diagnostic::{Diagnostic as CsDiagnostic, Label, Severity as CsSeverity};
use codespan_reporting::files::{Files, SimpleFiles};
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use serde::{Deserialize, Serialize};

use crate::issues::{Issue, Severity};

/// One issue prepared for rendering.
pub struct Diagnostic {
    inner: CsDiagnostic<usize>,
    code: &'static str,
    kind: &'static str,
}

impl Diagnostic {
    /// Builds a renderable diagnostic from a recorded issue.
    pub fn from_issue(issue: &Issue, file_id: usize) -> Diagnostic {
        let severity = match issue.severity {
            Severity::Error => CsSeverity::Error,
            Severity::Info => CsSeverity::Warning,
            Severity::Suppressed => CsSeverity::Help,
        };
        let label = Label::primary(file_id, issue.span.start..issue.span.end)
            .with_message(issue.kind.name());
        let inner = CsDiagnostic::new(severity)
            .with_message(issue.message.clone())
            .with_code(issue.kind.code())
            .with_labels(vec![label]);
        Diagnostic {
            inner,
            code: issue.kind.code(),
            kind: issue.kind.name(),
        }
    }

    /// Emits the diagnostic to stderr with colors.
    pub fn emit(
        &self,
        files: &SimpleFiles<String, String>,
    ) -> Result<(), codespan_reporting::files::Error> {
        let mut writer = StandardStream::stderr(ColorChoice::Auto);
        let config = term::Config::default();
        term::emit(&mut writer, &config, files, &self.inner)
    }

    /// The underlying codespan diagnostic, for custom rendering.
    pub fn inner(&self) -> &CsDiagnostic<usize> {
        &self.inner
    }

    /// JSON form for editor integration.
    pub fn to_json(
        &self,
        files: &SimpleFiles<String, String>,
    ) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&JsonDiagnostic::from_diagnostic(self, files))
    }
}

/// JSON representation of one diagnostic.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonDiagnostic {
    /// Stable code, e.g. `"E1001"`.
    pub code: String,
    /// Issue kind name, e.g. `"UndefinedVariable"`.
    pub kind: String,
    pub severity: String,
    pub message: String,
    pub labels: Vec<JsonLabel>,
}

/// JSON representation of one source label.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonLabel {
    pub file: String,
    /// 1-indexed.
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
    pub message: Option<String>,
}

impl JsonDiagnostic {
    pub fn from_diagnostic(
        diag: &Diagnostic,
        files: &SimpleFiles<String, String>,
    ) -> JsonDiagnostic {
        let severity = match diag.inner.severity {
            CsSeverity::Error => "error",
            CsSeverity::Warning => "warning",
            CsSeverity::Note => "note",
            CsSeverity::Help => "help",
            CsSeverity::Bug => "bug",
        };
        let labels = diag
            .inner
            .labels
            .iter()
            .filter_map(|label| {
                let file_id = label.file_id;
                let name = files.get(file_id).ok()?.name().to_string();
                let start = files
                    .get(file_id)
                    .ok()?
                    .location((), label.range.start)
                    .ok()?;
                let end = files.get(file_id).ok()?.location((), label.range.end).ok()?;
                Some(JsonLabel {
                    file: name,
                    start_line: start.line_number,
                    start_column: start.column_number,
                    end_line: end.line_number,
                    end_column: end.column_number,
                    message: if label.message.is_empty() {
                        None
                    } else {
                        Some(label.message.clone())
                    },
                })
            })
            .collect();
        JsonDiagnostic {
            code: diag.code.to_string(),
            kind: diag.kind.to_string(),
            severity: severity.to_string(),
            message: diag.inner.message.clone(),
            labels,
        }
    }
}

/// Builds a single-file source registry for rendering.
pub fn create_files(name: impl Into<String>, source: impl Into<String>) -> SimpleFiles<String, String> {
    let mut files = SimpleFiles::new();
    files.add(name.into(), source.into());
    files
}

/// Emits every issue against one source file.
pub fn emit_issues(
    issues: &[Issue],
    files: &SimpleFiles<String, String>,
    file_id: usize,
) -> Result<(), codespan_reporting::files::Error> {
    for issue in issues {
        Diagnostic::from_issue(issue, file_id).emit(files)?;
    }
    Ok(())
}

/// Serializes every issue as one JSON array.
pub fn issues_to_json(
    issues: &[Issue],
    files: &SimpleFiles<String, String>,
    file_id: usize,
) -> Result<String, serde_json::Error> {
    let diags: Vec<JsonDiagnostic> = issues
        .iter()
        .map(|issue| JsonDiagnostic::from_diagnostic(&Diagnostic::from_issue(issue, file_id), files))
        .collect();
    serde_json::to_string_pretty(&diags)
}
