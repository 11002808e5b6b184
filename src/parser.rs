//! Parser capability contract
//!
//! Every tool family is handled by one type implementing [`Parser`]. The
//! registry asks each parser how confident it is that a line belongs to it
//! ([`Parser::can_parse`]) and hands the line to the winner.
//!
//! # Multi-line parsers
//!
//! Some diagnostics span several lines (stack traces, rustc snippets, tsc
//! pretty output). A multi-line parser returns `None` from
//! [`Parser::parse`] for the line that opens such a block, then receives the
//! following lines through [`Parser::continue_multi_line`] until it declines
//! one, at which point the driver calls [`Parser::finish_multi_line`].
//!
//! ```text
//! Idle --parse(start)--> Accumulating --continue(true)--> Accumulating
//!                             |                               |
//!                             +--continue(false)/EOF----------+--> finish --> Idle
//! ```
//!
//! Parsers never fail on malformed input: the worst case is a confidence of
//! `0.0`, a `None` result, or a declined continuation.

use regex::Regex;

use crate::context::ParseContext;
use crate::error::ExtractedError;

/// Per-line ceiling applied by every parser before regex matching
pub const MAX_LINE_LENGTH: usize = 2000;

/// Default message bound
pub const MAX_MESSAGE_LENGTH: usize = 1000;

/// Maximum lines kept in an accumulated stack trace
pub const MAX_STACK_TRACE_LINES: usize = 50;

/// Maximum source snippet lines kept per error
pub const MAX_CODE_CONTEXT_LINES: usize = 10;

/// Parser confidence that a line belongs to it, in `[0, 1]`
pub type Confidence = f64;

/// Noise rules a parser contributes to the registry's aggregate checker
///
/// Ordered by cost: prefixes are cheapest, regexes most expensive.
#[derive(Debug, Clone, Default)]
pub struct NoisePatterns {
    /// Matched against the start of the line (leading whitespace ignored)
    pub fast_prefixes: Vec<String>,
    /// Matched anywhere in the line
    pub fast_contains: Vec<String>,
    /// Full regexes
    pub regex: Vec<Regex>,
}

impl NoisePatterns {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add prefixes
    pub fn with_prefixes(mut self, prefixes: &[&str]) -> Self {
        self.fast_prefixes
            .extend(prefixes.iter().map(|s| s.to_string()));
        self
    }

    /// Add substrings
    pub fn with_contains(mut self, needles: &[&str]) -> Self {
        self.fast_contains.extend(needles.iter().map(|s| s.to_string()));
        self
    }

    /// Add regexes
    pub fn with_regex(mut self, regexes: impl IntoIterator<Item = Regex>) -> Self {
        self.regex.extend(regexes);
        self
    }

    /// Whether the set has no rules
    pub fn is_empty(&self) -> bool {
        self.fast_prefixes.is_empty() && self.fast_contains.is_empty() && self.regex.is_empty()
    }

    /// Check a line against this set alone, in cost order
    pub fn matches(&self, line: &str) -> bool {
        let trimmed = line.trim_start();
        self.fast_prefixes
            .iter()
            .any(|p| trimmed.starts_with(p.as_str()))
            || self.fast_contains.iter().any(|c| line.contains(c.as_str()))
            || self.regex.iter().any(|r| r.is_match(line))
    }
}

/// Capability contract implemented by every tool-family parser
///
/// Implementations must be `Send` so independent extractors can run on
/// separate threads. A single instance carries mutable multi-line state and
/// must not be shared by concurrent extractions.
pub trait Parser: Send {
    /// Unique parser id (`"go"`, `"typescript"`, ...)
    fn id(&self) -> &str;

    /// Higher priorities are tried first and win confidence ties
    fn priority(&self) -> i32;

    /// How confident this parser is that it handles `line`
    ///
    /// Pure and side-effect free. `0.0` means "cannot handle".
    fn can_parse(&self, line: &str, ctx: &ParseContext) -> Confidence;

    /// Parse a line
    ///
    /// For multi-line parsers a `None` return after a positive
    /// [`can_parse`](Parser::can_parse) means accumulation has started.
    fn parse(&mut self, line: &str, ctx: &ParseContext) -> Option<ExtractedError>;

    /// Parser-local noise opinion
    fn is_noise(&self, line: &str) -> bool {
        self.noise_patterns().matches(line)
    }

    /// Whether this parser accumulates multi-line errors
    fn supports_multi_line(&self) -> bool {
        false
    }

    /// Offer the next line to an accumulating parser
    ///
    /// Returns `true` if the line was consumed. `false` means the line does
    /// not belong to the pending error; the caller must finish and then
    /// re-evaluate the line from scratch.
    fn continue_multi_line(&mut self, _line: &str, _ctx: &ParseContext) -> bool {
        false
    }

    /// Materialize the pending error and return to idle
    fn finish_multi_line(&mut self, _ctx: &ParseContext) -> Option<ExtractedError> {
        None
    }

    /// Whether the parser is mid-accumulation
    fn is_accumulating(&self) -> bool {
        false
    }

    /// Drop any accumulation state. Idempotent.
    fn reset(&mut self) {}

    /// Noise rules for registry-level aggregation
    fn noise_patterns(&self) -> NoisePatterns {
        NoisePatterns::default()
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Whether a line is short enough to run regexes against
#[inline]
pub fn within_line_limit(line: &str) -> bool {
    line.len() <= MAX_LINE_LENGTH || line.chars().count() <= MAX_LINE_LENGTH
}

/// Cut a message to `max` characters on a char boundary
///
/// Returns the (possibly shortened) message and whether it was cut.
pub fn truncate_message(message: &str, max: usize) -> (String, bool) {
    let message = message.trim();
    match message.char_indices().nth(max) {
        Some((idx, _)) => (message[..idx].to_string(), true),
        None => (message.to_string(), false),
    }
}

/// Parse a 1-based line/column number
#[inline]
pub fn parse_number(text: Option<regex::Match<'_>>) -> Option<u32> {
    text.and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|n| *n > 0)
}

/// Bounded line buffer for multi-line accumulation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineBuffer {
    lines: Vec<String>,
    limit: usize,
    truncated: bool,
}

impl LineBuffer {
    /// Create a buffer holding at most `limit` lines
    pub fn new(limit: usize) -> Self {
        Self {
            lines: Vec::new(),
            limit,
            truncated: false,
        }
    }

    /// Append a line, or mark the buffer truncated if full
    pub fn push(&mut self, line: &str) {
        if self.lines.len() < self.limit {
            self.lines.push(line.to_string());
        } else {
            self.truncated = true;
        }
    }

    /// Whether lines were dropped
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Whether nothing was buffered
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of buffered lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Buffered lines
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Drop trailing blank lines
    pub fn trim_trailing_blank(&mut self) {
        while self.lines.last().is_some_and(|l| l.trim().is_empty()) {
            self.lines.pop();
        }
    }

    /// Join into a single newline-separated string
    pub fn join(&self) -> String {
        self.lines.join("\n")
    }

    /// Consume into the line vector
    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}
