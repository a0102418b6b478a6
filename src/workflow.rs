//! Workflow definition validation.
//!
//! The YAML parser is an external collaborator: [`WorkflowParser`] is the
//! seam, invoked with `(file_name, source, snippets)` and returning a
//! partial run definition plus parse errors. This repository does not
//! implement the parser — the production implementation ([`RwxLintParser`])
//! delegates to `rwx lint`, and tests substitute a fake.

use std::collections::HashMap;
use std::future::Future;
use std::io::Write;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::rwx_cli::run_rwx_command;
use crate::{AppError, Result};

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Definition is unusable.
    Error,
    /// Definition parses but is suspect.
    Warning,
    /// Informational note.
    Info,
}

/// One source position reported by the parser.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSpan {
    /// 1-based start line.
    pub line: Option<u32>,
    /// 1-based start column.
    pub column: Option<u32>,
    /// 1-based end line.
    pub end_line: Option<u32>,
    /// 1-based end column.
    pub end_column: Option<u32>,
}

/// Message emitted by the parser black box.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParserMessage {
    /// `error` or `warning`; anything else is treated as an error.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Human-readable description.
    pub message: String,
    /// Optional remediation advice.
    #[serde(default)]
    pub advice: Option<String>,
    /// Fallback position when no stack trace is present.
    #[serde(default)]
    pub line: Option<u32>,
    /// Fallback column.
    #[serde(default)]
    pub column: Option<u32>,
    /// Innermost-first source positions.
    #[serde(default)]
    pub stack_trace: Vec<SourceSpan>,
}

/// Task entry in a partial run definition.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialTask {
    /// Task key from the workflow definition.
    #[serde(default)]
    pub key: String,
    /// Warnings attached to this task.
    #[serde(default)]
    pub warning_messages: Vec<ParserMessage>,
}

/// Partially parsed run definition — present even when errors occurred.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialRunDefinition {
    /// Parsed tasks.
    #[serde(default)]
    pub tasks: Vec<PartialTask>,
    /// Definition-level warnings.
    #[serde(default)]
    pub warning_messages: Vec<ParserMessage>,
}

/// Result of invoking the parser.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseOutcome {
    /// Best-effort parsed definition.
    #[serde(default)]
    pub partial_run_definition: Option<PartialRunDefinition>,
    /// Parse errors.
    #[serde(default)]
    pub errors: Vec<ParserMessage>,
}

/// Diagnostic in the validation report (host-facing shape).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// Severity classification.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// Optional remediation advice.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advice: Option<String>,
    /// 1-based line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// 1-based column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    /// 1-based end line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    /// 1-based end column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_column: Option<u32>,
}

impl Diagnostic {
    /// Convert a parser message into a report diagnostic.
    ///
    /// The innermost stack-trace entry wins over the message's own
    /// line/column fallback.
    #[must_use]
    pub fn from_parser_message(msg: &ParserMessage) -> Self {
        let span = msg.stack_trace.first().copied().unwrap_or_default();
        let severity = match msg.kind.as_deref() {
            Some("warning") => Severity::Warning,
            _ => Severity::Error,
        };

        Self {
            severity,
            message: msg.message.clone(),
            advice: msg.advice.clone(),
            line: span.line.or(msg.line),
            column: span.column.or(msg.column),
            end_line: span.end_line,
            end_column: span.end_column,
        }
    }

    /// Build a bare error diagnostic with no position.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            advice: None,
            line: None,
            column: None,
            end_line: None,
            end_column: None,
        }
    }
}

/// Validation report returned by the `validate_workflow` tool.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// Whether the definition had zero errors.
    pub is_valid: bool,
    /// Error diagnostics.
    pub errors: Vec<Diagnostic>,
    /// Warning diagnostics.
    pub warnings: Vec<Diagnostic>,
    /// Number of parsed tasks, when a partial definition was produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_count: Option<usize>,
    /// Parsed task keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_keys: Option<Vec<String>>,
}

impl ValidationReport {
    /// Report with a single positionless error.
    #[must_use]
    pub fn single_error(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            errors: vec![Diagnostic::error(message)],
            warnings: Vec::new(),
            task_count: None,
            task_keys: None,
        }
    }
}

/// Assemble the validation report from a parse outcome.
///
/// Synthetic placeholder task keys (`#fake`) are excluded from the key list,
/// matching the parser's own convention for recovered definitions.
#[must_use]
pub fn build_report(outcome: &ParseOutcome) -> ValidationReport {
    let errors: Vec<Diagnostic> = outcome
        .errors
        .iter()
        .map(Diagnostic::from_parser_message)
        .collect();

    let mut warnings = Vec::new();
    let mut task_keys = Vec::new();

    if let Some(partial) = &outcome.partial_run_definition {
        warnings.extend(
            partial
                .warning_messages
                .iter()
                .map(Diagnostic::from_parser_message),
        );
        for task in &partial.tasks {
            warnings.extend(
                task.warning_messages
                    .iter()
                    .map(Diagnostic::from_parser_message),
            );
            if !task.key.is_empty() && task.key != "#fake" {
                task_keys.push(task.key.clone());
            }
        }
    }

    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
        warnings,
        task_count: Some(task_keys.len()),
        task_keys: Some(task_keys),
    }
}

/// Seam to the external YAML workflow parser.
pub trait WorkflowParser: Send + Sync {
    /// Parse `source` as a workflow definition named `file_name`.
    ///
    /// `snippets` maps snippet references to their file contents; unused by
    /// implementations that delegate snippet resolution to the CLI.
    fn parse(
        &self,
        file_name: String,
        source: String,
        snippets: HashMap<String, String>,
    ) -> Pin<Box<dyn Future<Output = Result<ParseOutcome>> + Send + '_>>;
}

/// Production parser: delegates to `rwx lint --output json`.
///
/// Inline sources are materialized as a temp file because the CLI validates
/// paths, not stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct RwxLintParser;

impl WorkflowParser for RwxLintParser {
    fn parse(
        &self,
        file_name: String,
        source: String,
        _snippets: HashMap<String, String>,
    ) -> Pin<Box<dyn Future<Output = Result<ParseOutcome>> + Send + '_>> {
        Box::pin(async move {
            let mut tmp = tempfile::Builder::new()
                .suffix(".yml")
                .tempfile()
                .map_err(|e| AppError::Workflow(format!("failed to stage workflow: {e}")))?;
            tmp.write_all(source.as_bytes())
                .map_err(|e| AppError::Workflow(format!("failed to stage workflow: {e}")))?;

            let path = tmp.path().to_string_lossy().into_owned();
            debug!(file_name, staged = %path, "linting workflow definition");

            let raw = run_rwx_command(
                &["lint".into(), path, "--output".into(), "json".into()],
                None,
            )
            .await?;

            serde_json::from_str(&raw)
                .map_err(|e| AppError::Workflow(format!("unparsable lint output: {e}")))
        })
    }
}
