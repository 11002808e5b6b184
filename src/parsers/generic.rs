//! Generic fallback parser
//!
//! Claims error-shaped lines no dedicated parser recognized. Results are
//! flagged [`unknown_pattern`](ExtractedError::unknown_pattern) and keep the
//! raw line so unknown formats can be sampled and reported.
//!
//! A `name:NN` token becomes a location only when the name has a directory
//! part or a known source extension, so `db.internal.com:5432` stays a host.

use regex::Regex;
use std::sync::LazyLock;

use crate::context::ParseContext;
use crate::error::{ErrorCategory, ExtractedError, Severity};
use crate::parser::{parse_number, truncate_message, within_line_limit, Confidence, Parser};
use crate::regex_cache::builtin;

use super::{GENERIC_ID, GENERIC_PRIORITY};

/// Message bound for unattributed lines
pub const MAX_GENERIC_MESSAGE_LENGTH: usize = 500;

static ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| builtin(r"^\s*::(error|warning)(?: ([^:]*))?::(.*)$"));
static ERROR_SHAPES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        builtin(r"(?:^|[\s\]])(?:[Ee]rror|ERROR|[Ff]atal|FATAL)(?:\[[^\]]*\])?:\s*\S"),
        builtin(r"^\s*\[(?:ERROR|FATAL|error)\]\s*\S"),
        builtin(r"\b[A-Z]\w*(?:Error|Exception): \S"),
    ]
});
static LOCATION: LazyLock<Regex> =
    LazyLock::new(|| builtin(r"((?:[A-Za-z]:)?[\w./\\-]*\w\.[A-Za-z]{1,6}):(\d+)(?::(\d+))?"));

/// Extensions that mark a bare file name as a source location
const SOURCE_EXTENSIONS: &[&str] = &[
    "bash", "c", "cc", "cjs", "clj", "cpp", "cs", "css", "cts", "dart", "ex", "exs", "go",
    "gradle", "h", "hpp", "hs", "html", "java", "js", "json", "jsx", "kt", "kts", "lua", "m",
    "mjs", "ml", "mts", "php", "pl", "proto", "py", "rb", "rs", "scala", "scss", "sh", "sql",
    "svelte", "swift", "tf", "toml", "ts", "tsx", "vue", "xml", "yaml", "yml", "zig",
];

/// First `file:line[:col]` token that names a file rather than a host
fn find_location(line: &str) -> Option<(&str, Option<u32>, Option<u32>)> {
    LOCATION.captures_iter(line).find_map(|caps| {
        let file = caps.get(1)?;
        let name = file.as_str();
        let after_host = line[..file.start()]
            .chars()
            .next_back()
            .is_some_and(|c| c == ':' || c == '@' || c.is_alphanumeric());
        if after_host || name.contains("://") {
            return None;
        }
        let has_dir = name.contains(['/', '\\']);
        let known_ext = name
            .rsplit_once('.')
            .is_some_and(|(_, ext)| SOURCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        (has_dir || known_ext).then(|| (name, parse_number(caps.get(2)), parse_number(caps.get(3))))
    })
}

/// Fallback parser for unattributed error-shaped lines
#[derive(Debug, Default)]
pub struct GenericParser;

impl GenericParser {
    /// Create the parser
    pub fn new() -> Self {
        Self
    }

    fn parse_annotation(&self, line: &str, ctx: &ParseContext) -> Option<ExtractedError> {
        let caps = ANNOTATION.captures(line)?;
        let severity = if caps.get(1)?.as_str() == "warning" {
            Severity::Warning
        } else {
            Severity::Error
        };

        let mut file = None;
        let mut line_no = None;
        let mut column = None;
        for param in caps.get(2).map_or("", |m| m.as_str()).split(',') {
            match param.trim().split_once('=') {
                Some(("file", value)) if !value.is_empty() => file = Some(ctx.relativize(value)),
                Some(("line", value)) => line_no = value.parse::<u32>().ok().filter(|n| *n > 0),
                Some(("col", value)) => column = value.parse::<u32>().ok().filter(|n| *n > 0),
                _ => {}
            }
        }

        let (message, truncated) =
            truncate_message(caps.get(3)?.as_str(), MAX_GENERIC_MESSAGE_LENGTH);
        Some(
            ExtractedError::new(message)
                .with_file_opt(file)
                .with_position(line_no, column)
                .with_severity(severity)
                .with_source(GENERIC_ID)
                .with_message_truncated(truncated)
                .with_workflow_context(ctx.workflow_context.clone())
                .as_unknown_pattern(line),
        )
    }
}

impl Parser for GenericParser {
    fn id(&self) -> &str {
        GENERIC_ID
    }

    fn priority(&self) -> i32 {
        GENERIC_PRIORITY
    }

    fn can_parse(&self, line: &str, _ctx: &ParseContext) -> Confidence {
        if !within_line_limit(line) {
            0.0
        } else if ANNOTATION.is_match(line) {
            0.40
        } else if ERROR_SHAPES.iter().any(|r| r.is_match(line)) {
            0.30
        } else {
            0.0
        }
    }

    fn parse(&mut self, line: &str, ctx: &ParseContext) -> Option<ExtractedError> {
        if !within_line_limit(line) {
            return None;
        }
        if let Some(err) = self.parse_annotation(line, ctx) {
            return Some(err);
        }
        if !ERROR_SHAPES.iter().any(|r| r.is_match(line)) {
            return None;
        }

        let (message, truncated) = truncate_message(line, MAX_GENERIC_MESSAGE_LENGTH);
        let mut err = ExtractedError::new(message)
            .with_severity(Severity::Error)
            .with_category(ErrorCategory::Unknown)
            .with_source(GENERIC_ID)
            .with_message_truncated(truncated)
            .with_workflow_context(ctx.workflow_context.clone())
            .as_unknown_pattern(line);
        if let Some((file, line_no, column)) = find_location(line) {
            err = err
                .with_file(ctx.relativize(file))
                .with_position(line_no, column);
        }
        Some(err)
    }
}
