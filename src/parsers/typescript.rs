//! TypeScript and ESLint parser
//!
//! Recognizes `tsc` diagnostics in both of its output styles plus ESLint's
//! default "stylish" formatter.
//!
//! # Line shapes
//!
//! | Shape | Confidence |
//! |-------|-----------:|
//! | `error TS5058: message` (global, no location) | 0.95 |
//! | `src/a.ts:10:5 - error TS2304: message` (pretty, multi-line) | 0.92 |
//! | `src/a.ts(10,5): error TS2304: message` | 0.90 |
//! | continuation of a pretty diagnostic | 0.85 |
//! | `  10:5  error  message  rule-id` (ESLint stylish) | 0.70 |
//! | `/path/to/file.ts` (ESLint file header) | 0.50 |
//!
//! Pretty diagnostics are followed by the offending source lines and a
//! `~~~` underline, and sometimes by related-location blocks. Those lines
//! are collected into [`ExtractedError::code_context`] until a line that
//! does not belong to the block.

use regex::Regex;
use std::sync::LazyLock;

use crate::context::ParseContext;
use crate::error::{ErrorCategory, ExtractedError, Severity};
use crate::parser::{
    parse_number, truncate_message, within_line_limit, Confidence, LineBuffer, NoisePatterns,
    Parser, MAX_CODE_CONTEXT_LINES, MAX_MESSAGE_LENGTH,
};
use crate::regex_cache::builtin;

use super::LANGUAGE_PRIORITY;

static GLOBAL: LazyLock<Regex> =
    LazyLock::new(|| builtin(r"^\s*(error|warning) (TS\d+): (.+)$"));
static PRETTY: LazyLock<Regex> = LazyLock::new(|| {
    builtin(r"^\s*((?:[A-Za-z]:)?[^\s:(][^:(]*\.[cm]?[jt]sx?):(\d+):(\d+) - (error|warning) (TS\d+): (.+)$")
});
static PAREN: LazyLock<Regex> = LazyLock::new(|| {
    builtin(r"^\s*((?:[A-Za-z]:)?[^\s(][^(]*\.[cm]?[jt]sx?)\((\d+),(\d+)\): (error|warning) (TS\d+): (.+)$")
});
static SOURCE_LINE: LazyLock<Regex> = LazyLock::new(|| builtin(r"^\s*\d+\s"));
static UNDERLINE: LazyLock<Regex> = LazyLock::new(|| builtin(r"^\s*~+\s*$"));
static ESLINT: LazyLock<Regex> = LazyLock::new(|| {
    builtin(r"^\s+(\d+):(\d+)\s+(error|warning)\s+(.+?)(?:\s{2,}(@?[\w-]+(?:/[\w-]+)*))?\s*$")
});
static ESLINT_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    builtin(r"^((?:[A-Za-z]:)?[\w./\\@-][^\s:]*\.(?:[cm]?[jt]sx?|vue|svelte))\s*$")
});
static DID_YOU_MEAN: LazyLock<Regex> =
    LazyLock::new(|| builtin(r"Did you mean (?:to use )?'([^']+)'\?"));
static NOISE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        builtin(r"^Found \d+ errors?\b"),
        builtin(r"^\[?\d{1,2}:\d{2}:\d{2}(?: [AP]M)?\]? - (?:Starting|File change detected|Found \d+ errors?)"),
        builtin(r"^\s*✖ \d+ problems? \("),
        builtin(r"^\s+\d+ errors? and \d+ warnings? potentially fixable"),
    ]
});

/// Category from the numeric range of a `TSxxxx` code
pub fn category_for_code(code: &str) -> ErrorCategory {
    let number = code
        .strip_prefix("TS")
        .and_then(|digits| digits.parse::<u32>().ok())
        .unwrap_or(0);
    match number {
        1000..=1999 | 3000..=3999 => ErrorCategory::Compile,
        2000..=2999 | 7000..=7999 => ErrorCategory::TypeCheck,
        5000..=5999 => ErrorCategory::Config,
        6000..=6999 => ErrorCategory::Metadata,
        _ => ErrorCategory::TypeCheck,
    }
}

fn severity_of(word: &str) -> Severity {
    if word == "warning" {
        Severity::Warning
    } else {
        Severity::Error
    }
}

fn suggestion_from(message: &str) -> Option<String> {
    DID_YOU_MEAN
        .find(message)
        .map(|m| m.as_str().to_string())
}

/// Fields shared by every `tsc` shape
struct TscDiagnostic<'a> {
    file: Option<&'a str>,
    line: Option<u32>,
    column: Option<u32>,
    severity: &'a str,
    code: &'a str,
    message: &'a str,
}

impl TscDiagnostic<'_> {
    fn into_error(self, ctx: &ParseContext) -> ExtractedError {
        let (message, truncated) = truncate_message(self.message, MAX_MESSAGE_LENGTH);
        let mut err = ExtractedError::new(message)
            .with_file_opt(self.file.map(|f| ctx.relativize(f)))
            .with_position(self.line, self.column)
            .with_severity(severity_of(self.severity))
            .with_category(category_for_code(self.code))
            .with_rule_id(self.code)
            .with_source("typescript")
            .with_message_truncated(truncated)
            .with_workflow_context(ctx.workflow_context.clone());
        if let Some(suggestion) = suggestion_from(&err.message) {
            err = err.with_suggestion(suggestion);
        }
        err
    }
}

/// A pretty diagnostic waiting for its source context
#[derive(Debug, Clone)]
struct PendingDiagnostic {
    error: ExtractedError,
    context: LineBuffer,
    seen_blank: bool,
}

#[derive(Debug, Clone, Default)]
enum State {
    #[default]
    Idle,
    Accumulating(Box<PendingDiagnostic>),
}

/// Parser for `tsc` and ESLint output
#[derive(Debug, Default)]
pub struct TypeScriptParser {
    state: State,
    /// File announced by the last ESLint header line
    eslint_file: Option<String>,
}

impl TypeScriptParser {
    /// Create a parser in the idle state
    pub fn new() -> Self {
        Self::default()
    }

    fn accepts_continuation(pending: &PendingDiagnostic, line: &str) -> bool {
        if PRETTY.is_match(line) || GLOBAL.is_match(line) || PAREN.is_match(line) {
            return false;
        }
        line.trim().is_empty()
            || SOURCE_LINE.is_match(line)
            || UNDERLINE.is_match(line)
            || (line.starts_with(char::is_whitespace) && !pending.context.is_truncated())
    }

    fn parse_eslint(&self, line: &str, ctx: &ParseContext) -> Option<ExtractedError> {
        let caps = ESLINT.captures(line)?;
        let message = caps.get(4)?.as_str();
        let (message, truncated) = truncate_message(message, MAX_MESSAGE_LENGTH);
        let file = ctx
            .last_file
            .as_deref()
            .or(self.eslint_file.as_deref())
            .map(|f| ctx.relativize(f));
        let mut err = ExtractedError::new(message)
            .with_file_opt(file)
            .with_position(parse_number(caps.get(1)), parse_number(caps.get(2)))
            .with_severity(severity_of(caps.get(3)?.as_str()))
            .with_category(ErrorCategory::Lint)
            .with_source("typescript")
            .with_message_truncated(truncated)
            .with_workflow_context(ctx.workflow_context.clone());
        if let Some(rule) = caps.get(5) {
            err = err.with_rule_id(rule.as_str());
        }
        Some(err)
    }
}

impl Parser for TypeScriptParser {
    fn id(&self) -> &str {
        "typescript"
    }

    fn priority(&self) -> i32 {
        LANGUAGE_PRIORITY
    }

    fn can_parse(&self, line: &str, _ctx: &ParseContext) -> Confidence {
        if !within_line_limit(line) {
            return 0.0;
        }
        if GLOBAL.is_match(line) {
            return 0.95;
        }
        if PRETTY.is_match(line) {
            return 0.92;
        }
        if PAREN.is_match(line) {
            return 0.90;
        }
        if let State::Accumulating(pending) = &self.state {
            if Self::accepts_continuation(pending, line) {
                return 0.85;
            }
        }
        if ESLINT.is_match(line) {
            0.70
        } else if ESLINT_HEADER.is_match(line) {
            0.50
        } else {
            0.0
        }
    }

    fn parse(&mut self, line: &str, ctx: &ParseContext) -> Option<ExtractedError> {
        if !within_line_limit(line) {
            return None;
        }

        if let Some(caps) = PRETTY.captures(line) {
            let error = TscDiagnostic {
                file: caps.get(1).map(|m| m.as_str()),
                line: parse_number(caps.get(2)),
                column: parse_number(caps.get(3)),
                severity: caps.get(4)?.as_str(),
                code: caps.get(5)?.as_str(),
                message: caps.get(6)?.as_str(),
            }
            .into_error(ctx);
            self.state = State::Accumulating(Box::new(PendingDiagnostic {
                error,
                context: LineBuffer::new(MAX_CODE_CONTEXT_LINES),
                seen_blank: false,
            }));
            return None;
        }

        if let Some(caps) = PAREN.captures(line) {
            return Some(
                TscDiagnostic {
                    file: caps.get(1).map(|m| m.as_str()),
                    line: parse_number(caps.get(2)),
                    column: parse_number(caps.get(3)),
                    severity: caps.get(4)?.as_str(),
                    code: caps.get(5)?.as_str(),
                    message: caps.get(6)?.as_str(),
                }
                .into_error(ctx),
            );
        }

        if let Some(caps) = GLOBAL.captures(line) {
            return Some(
                TscDiagnostic {
                    file: None,
                    line: None,
                    column: None,
                    severity: caps.get(1)?.as_str(),
                    code: caps.get(2)?.as_str(),
                    message: caps.get(3)?.as_str(),
                }
                .into_error(ctx),
            );
        }

        if let Some(err) = self.parse_eslint(line, ctx) {
            return Some(err);
        }

        if let Some(caps) = ESLINT_HEADER.captures(line) {
            self.eslint_file = caps.get(1).map(|m| m.as_str().to_string());
        }
        None
    }

    fn supports_multi_line(&self) -> bool {
        true
    }

    fn continue_multi_line(&mut self, line: &str, _ctx: &ParseContext) -> bool {
        let State::Accumulating(pending) = &mut self.state else {
            return false;
        };
        if !within_line_limit(line) || !Self::accepts_continuation(pending, line) {
            return false;
        }

        if line.trim().is_empty() {
            pending.seen_blank = true;
        } else if !pending.seen_blank && !pending.error.message_truncated {
            // Elaboration printed directly under the header
            let joined = format!("{} {}", pending.error.message, line.trim());
            let (message, truncated) = truncate_message(&joined, MAX_MESSAGE_LENGTH);
            pending.error.message = message;
            pending.error.message_truncated = truncated;
        } else {
            pending.context.push(line.trim_end());
        }
        true
    }

    fn finish_multi_line(&mut self, _ctx: &ParseContext) -> Option<ExtractedError> {
        let State::Accumulating(pending) = std::mem::take(&mut self.state) else {
            return None;
        };
        let PendingDiagnostic {
            mut error, context, ..
        } = *pending;
        if error.suggestions.is_empty() {
            if let Some(suggestion) = suggestion_from(&error.message) {
                error = error.with_suggestion(suggestion);
            }
        }
        Some(error.with_code_context(context.into_lines()))
    }

    fn is_accumulating(&self) -> bool {
        matches!(self.state, State::Accumulating(_))
    }

    fn reset(&mut self) {
        self.state = State::Idle;
        self.eslint_file = None;
    }

    fn noise_patterns(&self) -> NoisePatterns {
        NoisePatterns::new()
            .with_prefixes(&[
                "Starting compilation in watch mode",
                "Watching for file changes",
                "Version ",
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

    #[test]
    fn test_paren_shape() {
        let mut parser = TypeScriptParser::new();
        let line = "file.ts(1,2): error TS2304: Cannot find name 'foo'";
        assert_eq!(parser.can_parse(line, &ctx()), 0.90);
        let err = parser.parse(line, &ctx()).unwrap();
        assert_eq!(err.file.as_deref(), Some("file.ts"));
        assert_eq!(err.line, Some(1));
        assert_eq!(err.column, Some(2));
        assert_eq!(err.rule_id.as_deref(), Some("TS2304"));
        assert_eq!(err.severity, Severity::Error);
        assert_eq!(err.category, ErrorCategory::TypeCheck);
        assert!(!parser.is_accumulating());
    }

    #[test]
    fn test_global_error_has_no_location() {
        let mut parser = TypeScriptParser::new();
        let line = "error TS5058: The specified path does not exist: 'tsconfig.json'.";
        assert_eq!(parser.can_parse(line, &ctx()), 0.95);
        let err = parser.parse(line, &ctx()).unwrap();
        assert!(err.file.is_none());
        assert!(!err.line_known);
        assert_eq!(err.category, ErrorCategory::Config);
    }

    #[test]
    fn test_pretty_shape_accumulates_context() {
        let mut parser = TypeScriptParser::new();
        let header = "src/index.ts:10:5 - error TS2551: Property 'lenght' does not exist on type 'string'. Did you mean 'length'?";
        assert_eq!(parser.can_parse(header, &ctx()), 0.92);
        assert!(parser.parse(header, &ctx()).is_none());
        assert!(parser.is_accumulating());

        for line in ["", "10     value.lenght;", "             ~~~~~~", ""] {
            assert_eq!(parser.can_parse(line, &ctx()), 0.85);
            assert!(parser.continue_multi_line(line, &ctx()));
        }
        assert!(!parser.continue_multi_line("Found 1 error in src/index.ts:10", &ctx()));

        let err = parser.finish_multi_line(&ctx()).unwrap();
        assert_eq!(err.file.as_deref(), Some("src/index.ts"));
        assert_eq!(err.line, Some(10));
        assert_eq!(err.column, Some(5));
        assert_eq!(err.code_context.len(), 2);
        assert_eq!(err.suggestions, vec!["Did you mean 'length'?".to_string()]);
        assert!(!parser.is_accumulating());
    }

    #[test]
    fn test_pretty_elaboration_joins_message() {
        let mut parser = TypeScriptParser::new();
        parser.parse(
            "src/a.ts:3:7 - error TS2322: Type 'string' is not assignable to type 'number'.",
            &ctx(),
        );
        assert!(parser.continue_multi_line("  Types of property 'id' are incompatible.", &ctx()));
        let err = parser.finish_multi_line(&ctx()).unwrap();
        assert!(err.message.ends_with("Types of property 'id' are incompatible."));
    }

    #[test]
    fn test_new_error_ends_block() {
        let mut parser = TypeScriptParser::new();
        parser.parse("src/a.ts:1:1 - error TS1005: ';' expected.", &ctx());
        assert!(!parser.continue_multi_line("src/b.ts:2:2 - error TS1005: ';' expected.", &ctx()));
        let err = parser.finish_multi_line(&ctx()).unwrap();
        assert_eq!(err.category, ErrorCategory::Compile);
    }

    #[test]
    fn test_category_ranges() {
        assert_eq!(category_for_code("TS1005"), ErrorCategory::Compile);
        assert_eq!(category_for_code("TS2304"), ErrorCategory::TypeCheck);
        assert_eq!(category_for_code("TS7006"), ErrorCategory::TypeCheck);
        assert_eq!(category_for_code("TS5023"), ErrorCategory::Config);
        assert_eq!(category_for_code("TS6133"), ErrorCategory::Metadata);
        assert_eq!(category_for_code("TS18046"), ErrorCategory::TypeCheck);
        assert_eq!(category_for_code("bogus"), ErrorCategory::TypeCheck);
    }

    #[test]
    fn test_eslint_uses_header_file() {
        let mut parser = TypeScriptParser::new();
        assert_eq!(parser.can_parse("/home/runner/app/src/util.ts", &ctx()), 0.50);
        assert!(parser.parse("/home/runner/app/src/util.ts", &ctx()).is_none());
        assert!(!parser.is_accumulating());

        let line = "   4:10  error  'x' is assigned a value but never used  @typescript-eslint/no-unused-vars";
        assert_eq!(parser.can_parse(line, &ctx()), 0.70);
        let err = parser.parse(line, &ctx()).unwrap();
        assert_eq!(err.file.as_deref(), Some("/home/runner/app/src/util.ts"));
        assert_eq!(err.line, Some(4));
        assert_eq!(err.column, Some(10));
        assert_eq!(err.rule_id.as_deref(), Some("@typescript-eslint/no-unused-vars"));
        assert_eq!(err.category, ErrorCategory::Lint);
    }

    #[test]
    fn test_eslint_prefers_context_file() {
        let mut parser = TypeScriptParser::new();
        let ctx = ParseContext::new().with_last_file("src/main.ts");
        let err = parser
            .parse("  1:1  warning  Unexpected console statement  no-console", &ctx)
            .unwrap();
        assert_eq!(err.file.as_deref(), Some("src/main.ts"));
        assert_eq!(err.severity, Severity::Warning);
        assert_eq!(err.rule_id.as_deref(), Some("no-console"));
    }

    #[test]
    fn test_noise() {
        let parser = TypeScriptParser::new();
        assert!(parser.is_noise("Found 3 errors in 2 files."));
        assert!(parser.is_noise("[12:01:33 PM] - File change detected. Starting incremental compilation..."));
        assert!(parser.is_noise("✖ 4 problems (3 errors, 1 warning)"));
        assert!(!parser.is_noise("error TS2304: Cannot find name 'x'."));
    }

    #[test]
    fn test_reset_clears_state() {
        let mut parser = TypeScriptParser::new();
        parser.parse("src/a.ts:1:1 - error TS1005: ';' expected.", &ctx());
        parser.reset();
        parser.reset();
        assert!(!parser.is_accumulating());
        assert!(parser.finish_multi_line(&ctx()).is_none());
    }
}
