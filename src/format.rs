//! Rendering helpers for downstream consumers
//!
//! Prompt builders want the most urgent errors first with compact stack
//! traces; dashboards only want counts. Nothing here affects extraction.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::error::{ErrorCategory, ExtractedError, Severity};

/// Lines kept from a stack trace after filtering
pub const MAX_FORMATTED_STACK_LINES: usize = 20;

/// Frames from runtimes, standard libraries and package caches
const INTERNAL_FRAME_MARKERS: &[&str] = &[
    "node_modules/",
    "node:internal",
    "processTicksAndRejections",
    "/src/runtime/",
    "/src/testing/",
    "site-packages/",
    "/lib/python3",
    "<frozen ",
    "/rustc/",
    "/.cargo/registry/",
    "/rustlib/",
];

fn is_internal_frame(line: &str) -> bool {
    INTERNAL_FRAME_MARKERS.iter().any(|m| line.contains(m))
}

/// Sort errors for presentation
///
/// Orders by category priority, then errors before warnings, then file
/// (errors without a file last), then line. The sort is stable.
pub fn sort_by_priority(errors: &mut [ExtractedError]) {
    errors.sort_by(|a, b| {
        a.category
            .priority()
            .cmp(&b.category.priority())
            .then_with(|| severity_rank(a.severity).cmp(&severity_rank(b.severity)))
            .then_with(|| match (&a.file, &b.file) {
                (Some(x), Some(y)) => x.cmp(y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
            .then_with(|| a.line.unwrap_or(u32::MAX).cmp(&b.line.unwrap_or(u32::MAX)))
    });
}

fn severity_rank(severity: Severity) -> u8 {
    match severity {
        Severity::Error => 0,
        Severity::Warning => 1,
    }
}

/// Drop framework-internal frames and cap the trace length
///
/// If every line looks internal the unfiltered trace is capped instead, so
/// the result is never empty for a non-empty trace.
pub fn filter_stack_trace(trace: &str) -> String {
    let kept: Vec<&str> = trace.lines().filter(|l| !is_internal_frame(l)).collect();
    let lines = if kept.is_empty() {
        trace.lines().collect()
    } else {
        kept
    };

    let mut out = lines
        .iter()
        .take(MAX_FORMATTED_STACK_LINES)
        .copied()
        .collect::<Vec<_>>()
        .join("\n");
    if lines.len() > MAX_FORMATTED_STACK_LINES {
        let _ = write!(
            out,
            "\n... ({} more lines)",
            lines.len() - MAX_FORMATTED_STACK_LINES
        );
    }
    out
}

/// Render one error with its context, suggestions and trace
pub fn format_error(err: &ExtractedError) -> String {
    let mut out = err.to_string();
    if let Some(source) = &err.source {
        let _ = write!(out, " ({})", source);
    }
    for line in &err.code_context {
        let _ = write!(out, "\n    {}", line);
    }
    for suggestion in &err.suggestions {
        let _ = write!(out, "\n  hint: {}", suggestion);
    }
    if let Some(trace) = &err.stack_trace {
        out.push_str("\n  stack trace:");
        for line in filter_stack_trace(trace).lines() {
            let _ = write!(out, "\n    {}", line);
        }
    }
    out
}

/// Render errors for inclusion in a prompt
///
/// Errors are sorted by priority and at most `max_errors` are rendered.
pub fn format_errors_for_prompt(errors: &[ExtractedError], max_errors: usize) -> String {
    if errors.is_empty() {
        return "No errors found.".to_string();
    }

    let mut sorted = errors.to_vec();
    sort_by_priority(&mut sorted);

    let counts = count_errors(errors);
    let mut out = format!(
        "{} issue(s): {} error(s), {} warning(s)\n",
        counts.total, counts.errors, counts.warnings
    );
    for (i, err) in sorted.iter().take(max_errors).enumerate() {
        let _ = write!(out, "\n{}. [{}] {}\n", i + 1, err.category, format_error(err));
    }
    if sorted.len() > max_errors {
        let _ = write!(out, "\n... and {} more\n", sorted.len() - max_errors);
    }
    out
}

/// Aggregate counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorCounts {
    /// All errors and warnings
    pub total: usize,
    /// Severity error
    pub errors: usize,
    /// Severity warning
    pub warnings: usize,
    /// Counts per category, only categories that occur
    pub by_category: BTreeMap<ErrorCategory, usize>,
}

/// Count errors by severity and category
pub fn count_errors(errors: &[ExtractedError]) -> ErrorCounts {
    let mut counts = ErrorCounts {
        total: errors.len(),
        ..ErrorCounts::default()
    };
    for err in errors {
        match err.severity {
            Severity::Error => counts.errors += 1,
            Severity::Warning => counts.warnings += 1,
        }
        *counts.by_category.entry(err.category).or_insert(0) += 1;
    }
    counts
}
