//! Extracted error records
//!
//! This module defines [`ExtractedError`], the one structured diagnostic unit
//! produced by the extraction pipeline, together with its severity and
//! category taxonomies.
//!
//! # Example
//!
//! ```
//! use detent::error::{ErrorCategory, ExtractedError, Severity};
//!
//! let err = ExtractedError::new("undefined: someFunc")
//!     .with_file("main.go")
//!     .with_line(10)
//!     .with_column(5)
//!     .with_category(ErrorCategory::Compile)
//!     .with_source("go");
//!
//! assert!(err.line_known);
//! assert_eq!(err.severity, Severity::Error);
//! assert_eq!(err.to_string(), "main.go:10:5: error: undefined: someFunc");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// A failure
    Error,
    /// Something worth fixing that did not fail the step
    Warning,
}

impl Severity {
    /// Lowercase label used in rendered output
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of failure an error represents
///
/// Variants are declared in priority order: `Compile` is the most urgent and
/// `Unknown` the least. [`ErrorCategory::priority`] exposes the rank.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    /// Compilation or syntax failure
    Compile,
    /// Static type checker diagnostic
    TypeCheck,
    /// Failing test
    Test,
    /// Panic, uncaught exception, crash
    Runtime,
    /// Linter finding
    Lint,
    /// Tool or project configuration problem
    Config,
    /// Declaration/metadata output problem
    Metadata,
    /// CI environment failure (network, disk, auth, missing script)
    Infrastructure,
    /// Not attributable to a known category
    #[default]
    Unknown,
}

impl ErrorCategory {
    /// All categories in priority order
    pub const ALL: [ErrorCategory; 9] = [
        ErrorCategory::Compile,
        ErrorCategory::TypeCheck,
        ErrorCategory::Test,
        ErrorCategory::Runtime,
        ErrorCategory::Lint,
        ErrorCategory::Config,
        ErrorCategory::Metadata,
        ErrorCategory::Infrastructure,
        ErrorCategory::Unknown,
    ];

    /// Priority rank, 1 = highest
    pub fn priority(&self) -> u8 {
        match self {
            ErrorCategory::Compile => 1,
            ErrorCategory::TypeCheck => 2,
            ErrorCategory::Test => 3,
            ErrorCategory::Runtime => 4,
            ErrorCategory::Lint => 5,
            ErrorCategory::Config => 6,
            ErrorCategory::Metadata => 7,
            ErrorCategory::Infrastructure => 8,
            ErrorCategory::Unknown => 9,
        }
    }

    /// Kebab-case label, identical to the serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Compile => "compile",
            ErrorCategory::TypeCheck => "type-check",
            ErrorCategory::Test => "test",
            ErrorCategory::Runtime => "runtime",
            ErrorCategory::Lint => "lint",
            ErrorCategory::Config => "config",
            ErrorCategory::Metadata => "metadata",
            ErrorCategory::Infrastructure => "infrastructure",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CI job/step that produced an error
///
/// Always supplied by the caller through [`ParseContext`](crate::context::ParseContext);
/// never inferred from log content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowContext {
    /// Job identifier
    pub job: Option<String>,
    /// Step name
    pub step: Option<String>,
}

impl WorkflowContext {
    /// Create a context for a job/step pair
    pub fn new(job: impl Into<String>, step: impl Into<String>) -> Self {
        Self {
            job: Some(job.into()),
            step: Some(step.into()),
        }
    }
}

/// One structured diagnostic extracted from CI output
///
/// `line`/`column` are `Some` exactly when `line_known`/`column_known` are
/// true. Use the `with_*` builders to keep the pairs consistent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedError {
    /// Diagnostic message (bounded, see `message_truncated`)
    pub message: String,
    /// File the diagnostic points at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// 1-based line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// 1-based column
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    /// Whether `line` carries a real value
    #[serde(default)]
    pub line_known: bool,
    /// Whether `column` carries a real value
    #[serde(default)]
    pub column_known: bool,
    /// Error or warning
    pub severity: Severity,
    /// Failure taxonomy
    #[serde(default)]
    pub category: ErrorCategory,
    /// Tool-specific rule or error code (`TS2304`, `E0425`, `F401`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    /// Id of the parser that produced this error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Bounded stack trace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    /// Set when frames were dropped from `stack_trace`
    #[serde(default)]
    pub stack_trace_truncated: bool,
    /// Set when `message` was cut to the parser's bound
    #[serde(default)]
    pub message_truncated: bool,
    /// Fix suggestions reported by the tool
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    /// Source snippet lines printed with the diagnostic
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub code_context: Vec<String>,
    /// Job/step this error belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_context: Option<WorkflowContext>,
    /// Original line, kept by the generic fallback only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    /// Error-shaped line not attributable to a known tool
    #[serde(default)]
    pub unknown_pattern: bool,
}

impl ExtractedError {
    /// Create an error with a message and no location
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            file: None,
            line: None,
            column: None,
            line_known: false,
            column_known: false,
            severity: Severity::Error,
            category: ErrorCategory::Unknown,
            rule_id: None,
            source: None,
            stack_trace: None,
            stack_trace_truncated: false,
            message_truncated: false,
            suggestions: Vec::new(),
            code_context: Vec::new(),
            workflow_context: None,
            raw: None,
            unknown_pattern: false,
        }
    }

    /// Set the file
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Set the file if one is given
    pub fn with_file_opt(mut self, file: Option<String>) -> Self {
        self.file = file;
        self
    }

    /// Set a known line
    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self.line_known = true;
        self
    }

    /// Set a known column
    pub fn with_column(mut self, column: u32) -> Self {
        self.column = Some(column);
        self.column_known = true;
        self
    }

    /// Set line and column from optionally-parsed values
    pub fn with_position(mut self, line: Option<u32>, column: Option<u32>) -> Self {
        self.line = line;
        self.line_known = line.is_some();
        self.column = column;
        self.column_known = column.is_some();
        self
    }

    /// Set severity
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Set category
    pub fn with_category(mut self, category: ErrorCategory) -> Self {
        self.category = category;
        self
    }

    /// Set the rule id
    pub fn with_rule_id(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    /// Set the producing parser id
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attach a stack trace
    pub fn with_stack_trace(mut self, trace: impl Into<String>, truncated: bool) -> Self {
        self.stack_trace = Some(trace.into());
        self.stack_trace_truncated = truncated;
        self
    }

    /// Add a suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Replace the suggestions
    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    /// Attach source snippet lines
    pub fn with_code_context(mut self, lines: Vec<String>) -> Self {
        self.code_context = lines;
        self
    }

    /// Attach the caller's workflow context
    pub fn with_workflow_context(mut self, ctx: Option<WorkflowContext>) -> Self {
        self.workflow_context = ctx;
        self
    }

    /// Mark as an unattributed error-shaped line and keep the raw text
    pub fn as_unknown_pattern(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self.unknown_pattern = true;
        self
    }

    /// Mark the message as truncated
    pub fn with_message_truncated(mut self, truncated: bool) -> Self {
        self.message_truncated = truncated;
        self
    }

    /// Whether this is an error (not a warning)
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Whether the error points at a file
    pub fn has_location(&self) -> bool {
        self.file.is_some()
    }

    /// In-pass dedup identity: `(file, line, message)`
    pub fn dedup_key(&self) -> (Option<&str>, Option<u32>, &str) {
        (self.file.as_deref(), self.line, self.message.as_str())
    }
}

impl fmt::Display for ExtractedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}", file)?;
            if let Some(line) = self.line {
                write!(f, ":{}", line)?;
                if let Some(column) = self.column {
                    write!(f, ":{}", column)?;
                }
            }
            write!(f, ": ")?;
        }
        write!(f, "{}: {}", self.severity, self.message)?;
        if let Some(rule) = &self.rule_id {
            write!(f, " [{}]", rule)?;
        }
        Ok(())
    }
}
