//! Go toolchain parser
//!
//! Handles `go build`/`go vet`/`golangci-lint` diagnostics, `go test`
//! failure lines, and runtime panics with their goroutine dumps.
//!
//! # Line shapes
//!
//! | Shape | Confidence |
//! |-------|-----------:|
//! | `file.go:10:5: message` | 0.95 |
//! | `file.go:10: message` | 0.90 |
//! | `panic: message` (starts multi-line) | 0.90 |
//! | `fatal error: message` (starts multi-line) | 0.85 |
//! | `--- FAIL: TestName (0.00s)` | 0.85 |
//!
//! A panic block runs until a blank line after the goroutine dump, a new
//! `panic:` line, or any line that is not part of a dump. The error is
//! attributed to the deepest user frame: the first frame outside the Go
//! runtime and the `testing` package.

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

static ERROR_WITH_COLUMN: LazyLock<Regex> =
    LazyLock::new(|| builtin(r"^\s*((?:[A-Za-z]:)?[^\s:]*\.go):(\d+):(\d+):\s*(.+)$"));
static ERROR_WITH_LINE: LazyLock<Regex> =
    LazyLock::new(|| builtin(r"^\s*((?:[A-Za-z]:)?[^\s:]*\.go):(\d+):\s*(.+)$"));
static LINTER_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| builtin(r"\s\(([a-z][a-z0-9_-]*)\)$"));
static PANIC: LazyLock<Regex> = LazyLock::new(|| builtin(r"^panic: (.+)$"));
static FATAL: LazyLock<Regex> = LazyLock::new(|| builtin(r"^fatal error: (.+)$"));
static TEST_FAIL: LazyLock<Regex> =
    LazyLock::new(|| builtin(r"^\s*--- FAIL: (\S+)(?: \(([\d.]+s)\))?"));
static GOROUTINE: LazyLock<Regex> =
    LazyLock::new(|| builtin(r"^goroutine \d+ \[[^\]]+\]:\s*$"));
static FRAME_FILE: LazyLock<Regex> =
    LazyLock::new(|| builtin(r"^\s+((?:[A-Za-z]:)?\S+\.go):(\d+)(?: \+0x[0-9a-f]+)?\s*$"));
static FRAME_FUNC: LazyLock<Regex> =
    LazyLock::new(|| builtin(r"^[\w./*()\[\]{}%,-]+\(.*\)\s*$"));
static CREATED_BY: LazyLock<Regex> =
    LazyLock::new(|| builtin(r"^created by \S+(?: in goroutine \d+)?\s*$"));
static NOISE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        builtin(r"^ok\s+\S+\s+(?:[\d.]+s|\(cached\))"),
        builtin(r"^(?:PASS|FAIL)\s*$"),
        builtin(r"^FAIL\s+\S+\s+[\d.]+s\s*$"),
        builtin(r"^coverage: [\d.]+% of statements"),
    ]
});

/// One `function` / `file:line` pair from a goroutine dump
#[derive(Debug, Clone, PartialEq, Eq)]
struct Frame {
    function: Option<String>,
    file: String,
    line: u32,
}

impl Frame {
    /// Frames inside the Go runtime or the test harness
    fn is_internal(&self) -> bool {
        let func = self.function.as_deref().unwrap_or("");
        self.file.contains("/src/runtime/")
            || self.file.contains("/src/testing/")
            || func.starts_with("runtime.")
            || func.starts_with("testing.")
            || func.starts_with("panic(")
    }
}

/// A panic or fatal error being accumulated
#[derive(Debug, Clone)]
struct PanicBlock {
    header: String,
    rule: &'static str,
    trace: LineBuffer,
    frames: Vec<Frame>,
    pending_function: Option<String>,
    seen_goroutine: bool,
    ctx: ParseContext,
}

#[derive(Debug, Clone, Default)]
enum State {
    #[default]
    Idle,
    Accumulating(Box<PanicBlock>),
}

/// Parser for Go compiler, linter, test and panic output
#[derive(Debug, Default)]
pub struct GoParser {
    state: State,
}

impl GoParser {
    /// Create a parser in the idle state
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_located(&self, line: &str, ctx: &ParseContext) -> Option<ExtractedError> {
        let (file, line_no, column, message) = if let Some(caps) = ERROR_WITH_COLUMN.captures(line)
        {
            (
                caps.get(1)?.as_str(),
                parse_number(caps.get(2)),
                parse_number(caps.get(3)),
                caps.get(4)?.as_str(),
            )
        } else {
            let caps = ERROR_WITH_LINE.captures(line)?;
            (
                caps.get(1)?.as_str(),
                parse_number(caps.get(2)),
                None,
                caps.get(3)?.as_str(),
            )
        };
        let file = file.strip_prefix("./").unwrap_or(file);

        let mut rule_id = None;
        let mut message = message.trim();
        if let Some(caps) = LINTER_SUFFIX.captures(message) {
            rule_id = caps.get(1).map(|m| m.as_str().to_string());
            if let Some(whole) = caps.get(0) {
                message = message[..whole.start()].trim_end();
            }
        }

        let linted = rule_id.is_some() || ctx.tool.as_deref() == Some("golangci-lint");
        let category = if linted {
            ErrorCategory::Lint
        } else if column.is_none() && file.ends_with("_test.go") {
            ErrorCategory::Test
        } else {
            ErrorCategory::Compile
        };

        let (message, truncated) = truncate_message(message, MAX_MESSAGE_LENGTH);
        let mut err = ExtractedError::new(message)
            .with_file(ctx.relativize(file))
            .with_position(line_no, column)
            .with_severity(Severity::Error)
            .with_category(category)
            .with_source("go")
            .with_message_truncated(truncated)
            .with_workflow_context(ctx.workflow_context.clone());
        if let Some(rule) = rule_id {
            err = err.with_rule_id(rule);
        }
        Some(err)
    }

    fn start_panic(&mut self, line: &str, rule: &'static str, ctx: &ParseContext) {
        let mut trace = LineBuffer::new(MAX_STACK_TRACE_LINES);
        trace.push(line);
        self.state = State::Accumulating(Box::new(PanicBlock {
            header: line.trim().to_string(),
            rule,
            trace,
            frames: Vec::new(),
            pending_function: None,
            seen_goroutine: false,
            ctx: ctx.clone(),
        }));
    }

    fn accepts_continuation(block: &PanicBlock, line: &str) -> bool {
        if line.trim().is_empty() {
            return !block.seen_goroutine;
        }
        if PANIC.is_match(line) || FATAL.is_match(line) {
            return false;
        }
        GOROUTINE.is_match(line)
            || FRAME_FILE.is_match(line)
            || FRAME_FUNC.is_match(line)
            || CREATED_BY.is_match(line)
            || line.starts_with("[signal ")
            || (!block.seen_goroutine && line.starts_with(char::is_whitespace))
    }
}

impl Parser for GoParser {
    fn id(&self) -> &str {
        "go"
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
        if ERROR_WITH_COLUMN.is_match(line) {
            0.95
        } else if ERROR_WITH_LINE.is_match(line) || PANIC.is_match(line) {
            0.90
        } else if FATAL.is_match(line) || TEST_FAIL.is_match(line) {
            0.85
        } else {
            0.0
        }
    }

    fn parse(&mut self, line: &str, ctx: &ParseContext) -> Option<ExtractedError> {
        if !within_line_limit(line) {
            return None;
        }
        if PANIC.is_match(line) {
            self.start_panic(line, "panic", ctx);
            return None;
        }
        if FATAL.is_match(line) {
            self.start_panic(line, "fatal-error", ctx);
            return None;
        }
        if let Some(caps) = TEST_FAIL.captures(line) {
            let name = caps.get(1)?.as_str();
            return Some(
                ExtractedError::new(format!("Test failed: {}", name))
                    .with_severity(Severity::Error)
                    .with_category(ErrorCategory::Test)
                    .with_rule_id(name)
                    .with_source("go")
                    .with_workflow_context(ctx.workflow_context.clone()),
            );
        }
        self.parse_located(line, ctx)
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

        if GOROUTINE.is_match(line) {
            block.seen_goroutine = true;
        } else if let Some(caps) = FRAME_FILE.captures(line) {
            let file = caps.get(1);
            let line_no = parse_number(caps.get(2));
            if let (Some(file), Some(line_no)) = (file, line_no) {
                if block.frames.len() < MAX_STACK_TRACE_LINES {
                    block.frames.push(Frame {
                        function: block.pending_function.take(),
                        file: file.as_str().to_string(),
                        line: line_no,
                    });
                }
            }
        } else if FRAME_FUNC.is_match(line) || CREATED_BY.is_match(line) {
            block.pending_function = Some(line.trim().to_string());
        }
        block.trace.push(line.trim_end());
        true
    }

    fn finish_multi_line(&mut self, _ctx: &ParseContext) -> Option<ExtractedError> {
        let State::Accumulating(mut block) = std::mem::take(&mut self.state) else {
            return None;
        };
        block.trace.trim_trailing_blank();

        let frame = block
            .frames
            .iter()
            .find(|f| !f.is_internal())
            .or_else(|| block.frames.first());

        let (message, truncated) = truncate_message(&block.header, MAX_MESSAGE_LENGTH);
        let mut err = ExtractedError::new(message)
            .with_severity(Severity::Error)
            .with_category(ErrorCategory::Runtime)
            .with_rule_id(block.rule)
            .with_source("go")
            .with_message_truncated(truncated)
            .with_stack_trace(block.trace.join(), block.trace.is_truncated())
            .with_workflow_context(block.ctx.workflow_context.clone());
        if let Some(frame) = frame {
            err = err
                .with_file(block.ctx.relativize(&frame.file))
                .with_line(frame.line);
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
                "=== RUN",
                "=== PAUSE",
                "=== CONT",
                "=== NAME",
                "--- PASS:",
                "--- SKIP:",
                "go: downloading",
                "go: finding",
                "go: extracting",
                "exit status ",
            ])
            .with_contains(&["[no test files]"])
            .with_regex(NOISE.iter().cloned())
    }
}
