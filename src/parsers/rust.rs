//! Rust parser
//!
//! Handles rustc/clippy diagnostics, thread panics and libtest failures.
//!
//! # Line shapes
//!
//! | Shape | Confidence |
//! |-------|-----------:|
//! | `error[E0425]: message` / `warning[E0...]:` | 0.95 |
//! | `thread 'main' panicked at src/main.rs:5:3:` | 0.90 |
//! | `test tests::it_works ... FAILED` | 0.85 |
//! | continuation of a diagnostic or panic | 0.85 |
//! | `error: message` (no code, Rust tool or backticked code) | 0.60 |
//! | `warning: message` (no code) | 0.50 |
//!
//! A codeless `error:` line is claimed only under a Rust tool hint or when
//! it quotes code in backticks the way rustc does. Git, commander and bun
//! print the same shape, and those lines belong to the generic parser.
//!
//! Diagnostics are multi-line: the `-->` line supplies the location,
//! gutter lines (`|`) become code context, and `note:`/`help:` lines become
//! suggestions. The block ends at the first blank line. A codeless warning
//! that never received a location is a tool-level message and is dropped.

use regex::Regex;
use std::sync::LazyLock;

use crate::context::ParseContext;
use crate::error::{ErrorCategory, ExtractedError, Severity};
use crate::parser::{
    parse_number, truncate_message, within_line_limit, Confidence, LineBuffer, NoisePatterns,
    Parser, MAX_CODE_CONTEXT_LINES, MAX_MESSAGE_LENGTH, MAX_STACK_TRACE_LINES,
};
use crate::regex_cache::builtin;
use crate::tools;

use super::LANGUAGE_PRIORITY;

const MAX_SUGGESTIONS: usize = 10;

static CODED: LazyLock<Regex> =
    LazyLock::new(|| builtin(r"^(error|warning)\[([A-Z]\d{4})\]: (.+)$"));
static PLAIN: LazyLock<Regex> = LazyLock::new(|| builtin(r"^(error|warning): (.+)$"));
static CODE_SPAN: LazyLock<Regex> = LazyLock::new(|| builtin(r"`[^`\s][^`]*`"));
static LOCATION: LazyLock<Regex> =
    LazyLock::new(|| builtin(r"^\s*--> ((?:[A-Za-z]:)?[^\s:]+):(\d+):(\d+)\s*$"));
static SECONDARY_LOCATION: LazyLock<Regex> = LazyLock::new(|| builtin(r"^\s*::: \S"));
static GUTTER: LazyLock<Regex> = LazyLock::new(|| builtin(r"^\s*(?:\d+\s*)?\|"));
static ELLIPSIS: LazyLock<Regex> = LazyLock::new(|| builtin(r"^\s*\.\.\.\s*$"));
static NOTE: LazyLock<Regex> = LazyLock::new(|| builtin(r"^\s*= (note|help): (.+)$"));
static TOP_NOTE: LazyLock<Regex> = LazyLock::new(|| builtin(r"^(note|help): (.+)$"));
static LINT_ATTR: LazyLock<Regex> =
    LazyLock::new(|| builtin(r"#\[(?:warn|deny|forbid)\(((?:clippy::)?[\w]+)\)\]"));
static PANIC: LazyLock<Regex> = LazyLock::new(|| {
    builtin(r"^thread '([^']+)' panicked at (?:'(.*)', )?((?:[A-Za-z]:)?[^\s:]+):(\d+):(\d+):?\s*$")
});
static TEST_FAILED: LazyLock<Regex> =
    LazyLock::new(|| builtin(r"^test (\S+) \.\.\. FAILED\s*$"));
static NOISE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        builtin(r"^\s*(?:Compiling|Checking|Finished|Running|Downloaded|Downloading|Updating|Fresh|Doc-tests|Blocking|Locking|Adding|Installing|Installed) "),
        builtin(r"^running \d+ tests?$"),
        builtin(r"^test result: "),
        builtin(r"^test \S+ \.\.\. (?:ok|ignored)"),
        builtin(r"^warning: .+ generated \d+ warnings?"),
        builtin(r"^---- \S+ stdout ----$"),
    ]
});

#[derive(Debug, Clone)]
struct Diagnostic {
    severity: Severity,
    code: Option<String>,
    message: String,
    location: Option<(String, u32, u32)>,
    context: LineBuffer,
    suggestions: Vec<String>,
    lint: Option<String>,
    ctx: ParseContext,
}

impl Diagnostic {
    fn add_suggestion(&mut self, text: &str) {
        if let Some(caps) = LINT_ATTR.captures(text) {
            if self.lint.is_none() {
                self.lint = caps.get(1).map(|m| m.as_str().to_string());
            }
        }
        if self.suggestions.len() < MAX_SUGGESTIONS {
            self.suggestions.push(text.trim().to_string());
        }
    }

    fn into_error(self) -> Option<ExtractedError> {
        if self.severity == Severity::Warning && self.code.is_none() && self.location.is_none() {
            return None;
        }

        let category = if self.lint.is_some() || self.severity == Severity::Warning {
            ErrorCategory::Lint
        } else {
            ErrorCategory::Compile
        };
        let rule_id = self.code.or(self.lint);

        let (message, truncated) = truncate_message(&self.message, MAX_MESSAGE_LENGTH);
        let mut err = ExtractedError::new(message)
            .with_severity(self.severity)
            .with_category(category)
            .with_source("rust")
            .with_message_truncated(truncated)
            .with_suggestions(self.suggestions)
            .with_code_context(self.context.into_lines())
            .with_workflow_context(self.ctx.workflow_context.clone());
        if let Some((file, line, column)) = &self.location {
            err = err
                .with_file(self.ctx.relativize(file))
                .with_line(*line)
                .with_column(*column);
        }
        if let Some(rule) = rule_id {
            err = err.with_rule_id(rule);
        }
        Some(err)
    }
}

#[derive(Debug, Clone)]
struct Panic {
    thread: String,
    message: Option<String>,
    file: String,
    line: Option<u32>,
    column: Option<u32>,
    trace: LineBuffer,
    ctx: ParseContext,
}

#[derive(Debug, Clone, Default)]
enum State {
    #[default]
    Idle,
    Diagnostic(Box<Diagnostic>),
    Panic(Box<Panic>),
}

/// Parser for rustc, clippy and libtest output
#[derive(Debug, Default)]
pub struct RustParser {
    state: State,
}

impl RustParser {
    /// Create a parser in the idle state
    pub fn new() -> Self {
        Self::default()
    }

    fn severity_of(word: &str) -> Severity {
        if word == "warning" {
            Severity::Warning
        } else {
            Severity::Error
        }
    }

    fn start_diagnostic(
        &mut self,
        severity: &str,
        code: Option<&str>,
        message: &str,
        ctx: &ParseContext,
    ) {
        self.state = State::Diagnostic(Box::new(Diagnostic {
            severity: Self::severity_of(severity),
            code: code.map(str::to_string),
            message: message.trim().to_string(),
            location: None,
            context: LineBuffer::new(MAX_CODE_CONTEXT_LINES),
            suggestions: Vec::new(),
            lint: None,
            ctx: ctx.clone(),
        }));
    }

    fn rust_tool(ctx: &ParseContext) -> bool {
        ctx.tool
            .as_deref()
            .is_some_and(|tool| tool == "rust" || tools::parser_for_tool(tool) == Some("rust"))
    }

    fn diagnostic_accepts(line: &str) -> bool {
        !line.trim().is_empty()
            && (LOCATION.is_match(line)
                || SECONDARY_LOCATION.is_match(line)
                || GUTTER.is_match(line)
                || ELLIPSIS.is_match(line)
                || NOTE.is_match(line)
                || TOP_NOTE.is_match(line))
    }

    fn panic_accepts(panic: &Panic, line: &str) -> bool {
        if line.trim().is_empty() {
            return false;
        }
        if panic.message.is_none() {
            return !PANIC.is_match(line) && !CODED.is_match(line);
        }
        line.starts_with(char::is_whitespace)
            || line.starts_with("note: ")
            || line.starts_with("stack backtrace:")
    }

    fn accepts_continuation(&self, line: &str) -> bool {
        match &self.state {
            State::Idle => false,
            State::Diagnostic(_) => Self::diagnostic_accepts(line),
            State::Panic(panic) => Self::panic_accepts(panic, line),
        }
    }
}

impl Parser for RustParser {
    fn id(&self) -> &str {
        "rust"
    }

    fn priority(&self) -> i32 {
        LANGUAGE_PRIORITY
    }

    fn can_parse(&self, line: &str, ctx: &ParseContext) -> Confidence {
        if !within_line_limit(line) {
            return 0.0;
        }
        if CODED.is_match(line) {
            return 0.95;
        }
        if PANIC.is_match(line) {
            return 0.90;
        }
        if self.accepts_continuation(line) || TEST_FAILED.is_match(line) {
            return 0.85;
        }
        match PLAIN.captures(line) {
            Some(caps) if caps.get(1).is_some_and(|m| m.as_str() == "error") => {
                let message = caps.get(2).map_or("", |m| m.as_str());
                if Self::rust_tool(ctx) || CODE_SPAN.is_match(message) {
                    0.60
                } else {
                    0.0
                }
            }
            Some(_) => 0.50,
            None => 0.0,
        }
    }

    fn parse(&mut self, line: &str, ctx: &ParseContext) -> Option<ExtractedError> {
        if !within_line_limit(line) {
            return None;
        }

        if let Some(caps) = CODED.captures(line) {
            self.start_diagnostic(
                caps.get(1)?.as_str(),
                caps.get(2).map(|m| m.as_str()),
                caps.get(3)?.as_str(),
                ctx,
            );
            return None;
        }

        if let Some(caps) = PANIC.captures(line) {
            let mut trace = LineBuffer::new(MAX_STACK_TRACE_LINES);
            trace.push(line.trim_end());
            self.state = State::Panic(Box::new(Panic {
                thread: caps.get(1)?.as_str().to_string(),
                message: caps.get(2).map(|m| m.as_str().to_string()),
                file: caps.get(3)?.as_str().to_string(),
                line: parse_number(caps.get(4)),
                column: parse_number(caps.get(5)),
                trace,
                ctx: ctx.clone(),
            }));
            return None;
        }

        if let Some(caps) = TEST_FAILED.captures(line) {
            let name = caps.get(1)?.as_str();
            return Some(
                ExtractedError::new(format!("test {} failed", name))
                    .with_severity(Severity::Error)
                    .with_category(ErrorCategory::Test)
                    .with_rule_id(name)
                    .with_source("rust")
                    .with_workflow_context(ctx.workflow_context.clone()),
            );
        }

        if let Some(caps) = PLAIN.captures(line) {
            self.start_diagnostic(caps.get(1)?.as_str(), None, caps.get(2)?.as_str(), ctx);
        }
        None
    }

    fn supports_multi_line(&self) -> bool {
        true
    }

    fn continue_multi_line(&mut self, line: &str, _ctx: &ParseContext) -> bool {
        if !within_line_limit(line) || !self.accepts_continuation(line) {
            return false;
        }
        match &mut self.state {
            State::Idle => false,
            State::Diagnostic(diag) => {
                if let Some(caps) = LOCATION.captures(line) {
                    if diag.location.is_none() {
                        if let (Some(file), Some(l), Some(c)) =
                            (caps.get(1), parse_number(caps.get(2)), parse_number(caps.get(3)))
                        {
                            diag.location = Some((file.as_str().to_string(), l, c));
                        }
                    }
                } else if let Some(caps) = NOTE.captures(line).or_else(|| TOP_NOTE.captures(line))
                {
                    let kind = caps.get(1).map_or("note", |m| m.as_str());
                    let text = caps.get(2).map_or("", |m| m.as_str());
                    diag.add_suggestion(&format!("{}: {}", kind, text));
                } else if GUTTER.is_match(line) {
                    diag.context.push(line.trim_end());
                }
                true
            }
            State::Panic(panic) => {
                if panic.message.is_none() {
                    panic.message = Some(line.trim().to_string());
                }
                panic.trace.push(line.trim_end());
                true
            }
        }
    }

    fn finish_multi_line(&mut self, _ctx: &ParseContext) -> Option<ExtractedError> {
        match std::mem::take(&mut self.state) {
            State::Idle => None,
            State::Diagnostic(diag) => diag.into_error(),
            State::Panic(panic) => {
                let is_test = panic.thread.contains("::")
                    || panic.thread.starts_with("test")
                    || panic.ctx.tool.as_deref() == Some("cargo-test");
                let category = if is_test {
                    ErrorCategory::Test
                } else {
                    ErrorCategory::Runtime
                };
                let message = panic
                    .message
                    .as_deref()
                    .map_or_else(|| format!("thread '{}' panicked", panic.thread), str::to_string);
                let (message, truncated) = truncate_message(&message, MAX_MESSAGE_LENGTH);
                Some(
                    ExtractedError::new(message)
                        .with_file(panic.ctx.relativize(&panic.file))
                        .with_position(panic.line, panic.column)
                        .with_severity(Severity::Error)
                        .with_category(category)
                        .with_rule_id("panic")
                        .with_source("rust")
                        .with_message_truncated(truncated)
                        .with_stack_trace(panic.trace.join(), panic.trace.is_truncated())
                        .with_workflow_context(panic.ctx.workflow_context.clone()),
                )
            }
        }
    }

    fn is_accumulating(&self) -> bool {
        !matches!(self.state, State::Idle)
    }

    fn reset(&mut self) {
        self.state = State::Idle;
    }

    fn noise_patterns(&self) -> NoisePatterns {
        NoisePatterns::new()
            .with_prefixes(&[
                "error: could not compile",
                "error: aborting due to",
                "error: test failed, to rerun",
                "warning: build failed, waiting for other jobs",
                "For more information about this error, try",
                "Some errors have detailed explanations",
            ])
            .with_regex(NOISE.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ParseContext {
        ParseContext::new()
    }

    fn feed(parser: &mut RustParser, lines: &[&str]) -> Option<ExtractedError> {
        assert!(parser.parse(lines[0], &ctx()).is_none());
        for line in &lines[1..] {
            assert!(parser.continue_multi_line(line, &ctx()), "rejected {:?}", line);
        }
        parser.finish_multi_line(&ctx())
    }

    #[test]
    fn test_coded_error() {
        let mut parser = RustParser::new();
        assert_eq!(
            parser.can_parse("error[E0425]: cannot find value `x` in this scope", &ctx()),
            0.95
        );
        let err = feed(
            &mut parser,
            &[
                "error[E0425]: cannot find value `x` in this scope",
                " --> src/main.rs:4:13",
                "  |",
                "4 |     println!(\"{}\", x);",
                "  |                    ^ not found in this scope",
                "  |",
                "  = help: consider importing `crate::x`",
            ],
        )
        .unwrap();
        assert_eq!(err.file.as_deref(), Some("src/main.rs"));
        assert_eq!(err.line, Some(4));
        assert_eq!(err.column, Some(13));
        assert_eq!(err.rule_id.as_deref(), Some("E0425"));
        assert_eq!(err.category, ErrorCategory::Compile);
        assert_eq!(err.code_context.len(), 4);
        assert_eq!(err.suggestions, vec!["help: consider importing `crate::x`".to_string()]);
        assert!(!parser.is_accumulating());
    }

    #[test]
    fn test_blank_line_ends_diagnostic() {
        let mut parser = RustParser::new();
        parser.parse("error[E0308]: mismatched types", &ctx());
        assert!(parser.continue_multi_line("  --> src/lib.rs:1:1", &ctx()));
        assert!(!parser.continue_multi_line("", &ctx()));
    }

    #[test]
    fn test_clippy_lint() {
        let mut parser = RustParser::new();
        assert_eq!(parser.can_parse("warning: unneeded `return` statement", &ctx()), 0.50);
        let err = feed(
            &mut parser,
            &[
                "warning: unneeded `return` statement",
                "  --> src/lib.rs:3:5",
                "   |",
                "3  |     return x;",
                "   |     ^^^^^^^^^",
                "   = note: `#[warn(clippy::needless_return)]` on by default",
            ],
        )
        .unwrap();
        assert_eq!(err.rule_id.as_deref(), Some("clippy::needless_return"));
        assert_eq!(err.category, ErrorCategory::Lint);
        assert_eq!(err.severity, Severity::Warning);
    }

    #[test]
    fn test_codeless_warning_without_location_dropped() {
        let mut parser = RustParser::new();
        assert!(feed(&mut parser, &["warning: unused manifest key: package.foo"]).is_none());
    }

    #[test]
    fn test_codeless_error_kept() {
        let mut parser = RustParser::new();
        assert_eq!(parser.can_parse("error: linker `cc` not found", &ctx()), 0.60);
        let err = feed(
            &mut parser,
            &[
                "error: linker `cc` not found",
                "  |",
                "  = note: No such file or directory (os error 2)",
            ],
        )
        .unwrap();
        assert!(err.file.is_none());
        assert_eq!(err.category, ErrorCategory::Compile);
    }

    #[test]
    fn test_codeless_error_needs_rust_context() {
        let parser = RustParser::new();
        let git = "error: failed to push some refs to 'https://github.com/acme/app.git'";
        let commander = "error: unknown option '--fix-all'";
        assert_eq!(parser.can_parse(git, &ctx()), 0.0);
        assert_eq!(parser.can_parse(commander, &ctx()), 0.0);

        let cargo = ParseContext::new().with_tool("cargo");
        assert_eq!(parser.can_parse("error: could not find `Cargo.toml`", &ctx()), 0.60);
        assert_eq!(parser.can_parse("error: no matching package found", &cargo), 0.60);
        assert_eq!(parser.can_parse(commander, &ParseContext::new().with_tool("rust")), 0.60);
    }

    #[test]
    fn test_panic_message_on_next_line() {
        let mut parser = RustParser::new();
        let err = feed(
            &mut parser,
            &[
                "thread 'tests::it_adds' panicked at src/lib.rs:10:9:",
                "assertion `left == right` failed",
                "  left: 4",
                " right: 5",
                "note: run with `RUST_BACKTRACE=1` environment variable to display a backtrace",
            ],
        )
        .unwrap();
        assert_eq!(err.message, "assertion `left == right` failed");
        assert_eq!(err.file.as_deref(), Some("src/lib.rs"));
        assert_eq!(err.line, Some(10));
        assert_eq!(err.category, ErrorCategory::Test);
    }

    #[test]
    fn test_panic_legacy_format() {
        let mut parser = RustParser::new();
        parser.parse("thread 'main' panicked at 'index out of bounds', src/main.rs:7:5", &ctx());
        assert!(!parser.continue_multi_line("Error: process exited", &ctx()));
        let err = parser.finish_multi_line(&ctx()).unwrap();
        assert_eq!(err.message, "index out of bounds");
        assert_eq!(err.category, ErrorCategory::Runtime);
    }

    #[test]
    fn test_test_failed_line() {
        let mut parser = RustParser::new();
        let err = parser.parse("test tests::it_adds ... FAILED", &ctx()).unwrap();
        assert_eq!(err.category, ErrorCategory::Test);
        assert_eq!(err.rule_id.as_deref(), Some("tests::it_adds"));
    }

    #[test]
    fn test_noise() {
        let parser = RustParser::new();
        assert!(parser.is_noise("   Compiling serde v1.0.197"));
        assert!(parser.is_noise("    Finished `dev` profile [unoptimized + debuginfo] target(s) in 2.31s"));
        assert!(parser.is_noise("test tests::parses ... ok"));
        assert!(parser.is_noise("error: could not compile `app` (bin \"app\") due to 1 previous error"));
        assert!(parser.is_noise("warning: `app` (lib) generated 2 warnings"));
        assert!(!parser.is_noise("error[E0425]: cannot find value `x` in this scope"));
    }
}
