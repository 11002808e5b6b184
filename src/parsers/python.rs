//! Python parser
//!
//! Covers interpreter tracebacks, pytest summaries and the common static
//! checkers (mypy, ruff, flake8, pylint).
//!
//! # Line shapes
//!
//! | Shape | Confidence |
//! |-------|-----------:|
//! | `Traceback (most recent call last):` (starts multi-line) | 0.95 |
//! | `FAILED tests/test_x.py::test_a - AssertionError` | 0.90 |
//! | `app.py:3: error: message  [code]` (mypy) | 0.90 |
//! | `app.py:1:0: C0114: message (symbol)` (pylint) | 0.90 |
//! | `app.py:1:8: F401 [*] message` (ruff, flake8) | 0.88 |
//! | `tests/test_x.py:12: AssertionError` (pytest short traceback) | 0.85 |
//!
//! A traceback runs through its frames to the exception line. Chained
//! tracebacks ("During handling of the above exception..." and "The above
//! exception was the direct cause...") are folded into one stack trace
//! ending at the final exception, attributed to the deepest frame of the
//! final traceback.

use regex::Regex;
use std::sync::LazyLock;

use crate::context::ParseContext;
use crate::error::{ErrorCategory, ExtractedError, Severity};
use crate::parser::{
    parse_number, truncate_message, within_line_limit, Confidence, LineBuffer, NoisePatterns,
    Parser, MAX_MESSAGE_LENGTH, MAX_STACK_TRACE_LINES,
};
use crate::regex_cache::builtin;

use super::LANGUAGE_PRIORITY;

static TRACEBACK: LazyLock<Regex> =
    LazyLock::new(|| builtin(r"^\s*Traceback \(most recent call last\):\s*$"));
static FRAME: LazyLock<Regex> =
    LazyLock::new(|| builtin(r#"^\s+File "([^"]+)", line (\d+)(?:, in (.+))?\s*$"#));
static EXCEPTION: LazyLock<Regex> =
    LazyLock::new(|| builtin(r"^([A-Za-z_][\w.]*)(?::\s?(.*))?$"));
static CHAIN: LazyLock<Regex> = LazyLock::new(|| {
    builtin(r"^(?:During handling of the above exception, another exception occurred:|The above exception was the direct cause of the following exception:)\s*$")
});
static PYTEST_SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    builtin(r"^(FAILED|ERROR)\s+((?:[A-Za-z]:)?[^\s:]+\.py)(?:::(\S+))?(?: - (.+))?\s*$")
});
static MYPY: LazyLock<Regex> = LazyLock::new(|| {
    builtin(r"^((?:[A-Za-z]:)?[^\s:]+\.pyi?):(\d+):(?:(\d+):)? (error|warning): (.+?)(?:\s+\[([\w-]+)\])?\s*$")
});
static PYLINT: LazyLock<Regex> = LazyLock::new(|| {
    builtin(r"^((?:[A-Za-z]:)?[^\s:]+\.pyi?):(\d+):(\d+): ([CRWEFI]\d{4}): (.+?) \(([\w-]+)\)\s*$")
});
static RUFF: LazyLock<Regex> = LazyLock::new(|| {
    builtin(r"^((?:[A-Za-z]:)?[^\s:]+\.pyi?):(\d+):(\d+): ([A-Z]{1,3}\d{1,4}) (?:\[\*\] )?(.+)$")
});
static PYTEST_LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    builtin(r"^((?:[A-Za-z]:)?[^\s:]+\.py):(\d+): ([A-Za-z_][\w.]*(?:Error|Exception|Failed))\s*$")
});
static NOISE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        builtin(r"^={3,}.*={3,}$"),
        builtin(r"^_{3,} .* _{3,}$"),
        builtin(r"^\S+\.py [.sxXfFE]+\s*(?:\[\s*\d+%\])?$"),
        builtin(r"^Found \d+ errors? in \d+ files?"),
        builtin(r"^\[\*\] \d+ fixable"),
        builtin(r"^E\s{2,}\S"),
        builtin(r"^\S+\.pyi?:\d+(?::\d+)?: note: "),
    ]
});

/// Severity implied by a linter rule id prefix
///
/// `E` (errors) and `F` (pyflakes/fatal) fail the step; every other family
/// is advisory.
pub fn severity_for_rule(rule: &str) -> Severity {
    match rule.chars().next() {
        Some('E') | Some('F') => Severity::Error,
        _ => Severity::Warning,
    }
}

fn exception_category(exception: &str) -> ErrorCategory {
    let name = exception.rsplit('.').next().unwrap_or(exception);
    match name {
        "SyntaxError" | "IndentationError" | "TabError" => ErrorCategory::Compile,
        _ => ErrorCategory::Runtime,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Reading frames of a traceback
    Frames,
    /// Exception line seen; only a chain message may follow
    Raised,
    /// Chain message seen; waiting for the next `Traceback` header
    Chained,
}

#[derive(Debug, Clone)]
struct TracebackBlock {
    trace: LineBuffer,
    deepest: Option<(String, u32)>,
    exception: Option<(String, String)>,
    phase: Phase,
    ctx: ParseContext,
}

#[derive(Debug, Clone, Default)]
enum State {
    #[default]
    Idle,
    Accumulating(Box<TracebackBlock>),
}

/// Parser for Python tracebacks, pytest and linters
#[derive(Debug, Default)]
pub struct PythonParser {
    state: State,
}

impl PythonParser {
    /// Create a parser in the idle state
    pub fn new() -> Self {
        Self::default()
    }

    fn located(
        file: &str,
        line: Option<u32>,
        column: Option<u32>,
        message: &str,
        ctx: &ParseContext,
    ) -> ExtractedError {
        let (message, truncated) = truncate_message(message, MAX_MESSAGE_LENGTH);
        ExtractedError::new(message)
            .with_file(ctx.relativize(file))
            .with_position(line, column)
            .with_source("python")
            .with_message_truncated(truncated)
            .with_workflow_context(ctx.workflow_context.clone())
    }

    fn parse_single(&self, line: &str, ctx: &ParseContext) -> Option<ExtractedError> {
        if let Some(caps) = PYTEST_SUMMARY.captures(line) {
            let file = caps.get(2)?.as_str();
            let test = caps.get(3).map_or(file, |m| m.as_str());
            let message = match caps.get(4) {
                Some(reason) => format!("{}: {}", test, reason.as_str()),
                None => format!("{}: test failed", test),
            };
            return Some(
                Self::located(file, None, None, &message, ctx)
                    .with_severity(Severity::Error)
                    .with_category(ErrorCategory::Test),
            );
        }

        if let Some(caps) = MYPY.captures(line) {
            let severity = if caps.get(4)?.as_str() == "warning" {
                Severity::Warning
            } else {
                Severity::Error
            };
            let mut err = Self::located(
                caps.get(1)?.as_str(),
                parse_number(caps.get(2)),
                parse_number(caps.get(3)),
                caps.get(5)?.as_str(),
                ctx,
            )
            .with_severity(severity)
            .with_category(ErrorCategory::TypeCheck);
            if let Some(code) = caps.get(6) {
                err = err.with_rule_id(code.as_str());
            }
            return Some(err);
        }

        if let Some(caps) = PYLINT.captures(line) {
            let rule = caps.get(4)?.as_str();
            return Some(
                Self::located(
                    caps.get(1)?.as_str(),
                    parse_number(caps.get(2)),
                    parse_number(caps.get(3)),
                    caps.get(5)?.as_str(),
                    ctx,
                )
                .with_severity(severity_for_rule(rule))
                .with_category(ErrorCategory::Lint)
                .with_rule_id(rule),
            );
        }

        if let Some(caps) = RUFF.captures(line) {
            let rule = caps.get(4)?.as_str();
            let category = if rule.starts_with("E9") {
                ErrorCategory::Compile
            } else {
                ErrorCategory::Lint
            };
            return Some(
                Self::located(
                    caps.get(1)?.as_str(),
                    parse_number(caps.get(2)),
                    parse_number(caps.get(3)),
                    caps.get(5)?.as_str(),
                    ctx,
                )
                .with_severity(severity_for_rule(rule))
                .with_category(category)
                .with_rule_id(rule),
            );
        }

        let caps = PYTEST_LOCATION.captures(line)?;
        let exception = caps.get(3)?.as_str();
        Some(
            Self::located(
                caps.get(1)?.as_str(),
                parse_number(caps.get(2)),
                None,
                exception,
                ctx,
            )
            .with_severity(Severity::Error)
            .with_category(ErrorCategory::Test)
            .with_rule_id(exception),
        )
    }

    fn start_traceback(&mut self, line: &str, ctx: &ParseContext) {
        let mut trace = LineBuffer::new(MAX_STACK_TRACE_LINES);
        trace.push(line.trim_end());
        self.state = State::Accumulating(Box::new(TracebackBlock {
            trace,
            deepest: None,
            exception: None,
            phase: Phase::Frames,
            ctx: ctx.clone(),
        }));
    }

    fn accepts_continuation(block: &TracebackBlock, line: &str) -> bool {
        if line.trim().is_empty() {
            return true;
        }
        match block.phase {
            Phase::Frames => {
                FRAME.is_match(line)
                    || line.starts_with(char::is_whitespace)
                    || EXCEPTION.is_match(line)
            }
            Phase::Raised => CHAIN.is_match(line),
            Phase::Chained => TRACEBACK.is_match(line),
        }
    }
}

impl Parser for PythonParser {
    fn id(&self) -> &str {
        "python"
    }

    fn priority(&self) -> i32 {
        LANGUAGE_PRIORITY
    }

    fn can_parse(&self, line: &str, _ctx: &ParseContext) -> Confidence {
        if !within_line_limit(line) {
            return 0.0;
        }
        if let State::Accumulating(block) = &self.state {
            if Self::accepts_continuation(block, line) {
                return 0.85;
            }
        }
        if TRACEBACK.is_match(line) {
            0.95
        } else if PYTEST_SUMMARY.is_match(line) || MYPY.is_match(line) || PYLINT.is_match(line) {
            0.90
        } else if RUFF.is_match(line) {
            0.88
        } else if PYTEST_LOCATION.is_match(line) {
            0.85
        } else {
            0.0
        }
    }

    fn parse(&mut self, line: &str, ctx: &ParseContext) -> Option<ExtractedError> {
        if !within_line_limit(line) {
            return None;
        }
        if TRACEBACK.is_match(line) {
            self.start_traceback(line, ctx);
            return None;
        }
        self.parse_single(line, ctx)
    }

    fn supports_multi_line(&self) -> bool {
        true
    }

    fn continue_multi_line(&mut self, line: &str, _ctx: &ParseContext) -> bool {
        let State::Accumulating(block) = &mut self.state else {
            return false;
        };
        if !within_line_limit(line) || !Self::accepts_continuation(block, line) {
            return false;
        }

        if line.trim().is_empty() {
            block.trace.push("");
            return true;
        }

        match block.phase {
            Phase::Frames => {
                if let Some(caps) = FRAME.captures(line) {
                    if let (Some(file), Some(line_no)) = (caps.get(1), parse_number(caps.get(2))) {
                        block.deepest = Some((file.as_str().to_string(), line_no));
                    }
                } else if !line.starts_with(char::is_whitespace) {
                    if let Some(caps) = EXCEPTION.captures(line) {
                        let kind = caps.get(1).map_or("", |m| m.as_str()).to_string();
                        let text = caps.get(2).map_or("", |m| m.as_str()).to_string();
                        block.exception = Some((kind, text));
                        block.phase = Phase::Raised;
                    }
                }
            }
            Phase::Raised => block.phase = Phase::Chained,
            Phase::Chained => {
                block.phase = Phase::Frames;
                block.deepest = None;
            }
        }
        block.trace.push(line.trim_end());
        true
    }

    fn finish_multi_line(&mut self, ctx: &ParseContext) -> Option<ExtractedError> {
        let State::Accumulating(mut block) = std::mem::take(&mut self.state) else {
            return None;
        };
        block.trace.trim_trailing_blank();

        let (message, rule, category) = match &block.exception {
            Some((kind, text)) if text.is_empty() => {
                (kind.clone(), Some(kind.clone()), exception_category(kind))
            }
            Some((kind, text)) => (
                format!("{}: {}", kind, text),
                Some(kind.clone()),
                exception_category(kind),
            ),
            None => ("Uncaught exception".to_string(), None, ErrorCategory::Runtime),
        };
        let category = if category == ErrorCategory::Runtime
            && ctx.tool.as_deref() == Some("pytest")
        {
            ErrorCategory::Test
        } else {
            category
        };

        let (message, truncated) = truncate_message(&message, MAX_MESSAGE_LENGTH);
        let mut err = ExtractedError::new(message)
            .with_severity(Severity::Error)
            .with_category(category)
            .with_source("python")
            .with_message_truncated(truncated)
            .with_stack_trace(block.trace.join(), block.trace.is_truncated())
            .with_workflow_context(block.ctx.workflow_context.clone());
        if let Some((file, line)) = &block.deepest {
            err = err.with_file(block.ctx.relativize(file)).with_line(*line);
        }
        if let Some(rule) = rule {
            err = err.with_rule_id(rule);
        }
        Some(err)
    }

    fn is_accumulating(&self) -> bool {
        matches!(self.state, State::Accumulating(_))
    }

    fn reset(&mut self) {
        self.state = State::Idle;
    }

    fn noise_patterns(&self) -> NoisePatterns {
        NoisePatterns::new()
            .with_prefixes(&[
                "collected ",
                "collecting ",
                "platform ",
                "rootdir:",
                "plugins:",
                "cachedir:",
                "configfile:",
                "Success: no issues found",
                "All checks passed!",
            ])
            .with_regex(NOISE.iter().cloned())
    }
}
