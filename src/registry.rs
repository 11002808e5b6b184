//! Parser registry
//!
//! The registry owns every [`Parser`], keeps them sorted by priority, and
//! decides which one handles a line:
//!
//! 1. an explicit tool hint in the [`ParseContext`] selects a parser by id,
//! 2. otherwise a file-extension heuristic routes to a dedicated parser,
//! 3. otherwise every parser is scored and the most confident one wins,
//!    with ties going to the higher-priority parser.
//!
//! It also merges every parser's [`NoisePatterns`] into one
//! [`NoiseChecker`] that rejects uninteresting lines before any parser is
//! consulted.
//!
//! # Example
//!
//! ```
//! use detent::context::ParseContext;
//! use detent::registry::ParserRegistry;
//!
//! let registry = ParserRegistry::with_defaults();
//! let ctx = ParseContext::new();
//!
//! assert!(registry.is_noise("   Compiling serde v1.0.200"));
//! let parser = registry.find_parser("main.go:10:5: undefined: x", &ctx).unwrap();
//! assert_eq!(parser.id(), "go");
//! ```

use memchr::memmem::Finder;
use regex::Regex;
use std::sync::LazyLock;

use crate::ansi::strip_ansi;
use crate::config::NoiseConfig;
use crate::context::ParseContext;
use crate::parser::{Confidence, NoisePatterns, Parser};
use crate::parsers::{self, GENERIC_ID};
use crate::regex_cache;
use crate::tools::{self, DetectOptions, DetectedTool};

static SOURCE_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| regex_cache::builtin(r#"[\w.\-/\\]\.(go|tsx?|py|rs)(?:[:("',\s]|$)"#));

/// Parser id that owns a source extension
fn parser_for_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "go" => Some("go"),
        "ts" | "tsx" => Some("typescript"),
        "py" => Some("python"),
        "rs" => Some("rust"),
        _ => None,
    }
}

// ============================================================================
// Noise Checker
// ============================================================================

/// Aggregate of every registered parser's noise rules
///
/// Checks run cheapest first: prefixes, then substrings (SIMD `memmem`
/// finders), then regexes, stopping at the first hit.
pub struct NoiseChecker {
    prefixes: Vec<String>,
    finders: Vec<Finder<'static>>,
    regexes: Vec<Regex>,
}

impl NoiseChecker {
    /// Build a checker from pattern sets
    pub fn from_patterns<'a>(sets: impl IntoIterator<Item = &'a NoisePatterns>) -> Self {
        let mut checker = Self {
            prefixes: Vec::new(),
            finders: Vec::new(),
            regexes: Vec::new(),
        };
        for set in sets {
            checker.add_prefixes(set.fast_prefixes.iter().map(String::as_str));
            checker.add_contains(set.fast_contains.iter().map(String::as_str));
            checker.regexes.extend(set.regex.iter().cloned());
        }
        checker
    }

    fn add_prefixes<'a>(&mut self, prefixes: impl Iterator<Item = &'a str>) {
        for prefix in prefixes {
            if !prefix.is_empty() && !self.prefixes.iter().any(|p| p == prefix) {
                self.prefixes.push(prefix.to_string());
            }
        }
    }

    fn add_contains<'a>(&mut self, needles: impl Iterator<Item = &'a str>) {
        for needle in needles {
            if !needle.is_empty() && !self.finders.iter().any(|f| f.needle() == needle.as_bytes())
            {
                self.finders.push(Finder::new(needle).into_owned());
            }
        }
    }

    /// Merge caller-supplied rules; invalid regexes are skipped
    pub fn extend_with_config(&mut self, noise: &NoiseConfig) {
        self.add_prefixes(noise.prefixes.iter().map(String::as_str));
        self.add_contains(noise.contains.iter().map(String::as_str));
        for pattern in &noise.patterns {
            match regex_cache::get_or_compile(pattern) {
                Some(regex) => self.regexes.push(regex),
                None => log_debug!("skipping invalid noise pattern {:?}", pattern),
            }
        }
    }

    /// Check an already ANSI-stripped line
    pub fn matches(&self, line: &str) -> bool {
        let trimmed = line.trim_start();
        if self.prefixes.iter().any(|p| trimmed.starts_with(p.as_str())) {
            return true;
        }
        let bytes = line.as_bytes();
        if self.finders.iter().any(|f| f.find(bytes).is_some()) {
            return true;
        }
        self.regexes.iter().any(|r| r.is_match(line))
    }

    /// Rule counts: (prefixes, substrings, regexes)
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.prefixes.len(), self.finders.len(), self.regexes.len())
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Owns the registered parsers and arbitrates between them
pub struct ParserRegistry {
    /// Sorted by priority, highest first
    parsers: Vec<Box<dyn Parser>>,
    noise_checker: Option<NoiseChecker>,
}

impl ParserRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
            noise_checker: None,
        }
    }

    /// Create a registry with every built-in parser and an initialized
    /// noise checker
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_all(parsers::default_parsers());
        registry.init_noise_checker();
        registry
    }

    /// Register a parser
    ///
    /// Keeps the list sorted by descending priority. Parsers with equal
    /// priority keep registration order. Invalidates the noise checker;
    /// call [`init_noise_checker`](Self::init_noise_checker) once all
    /// parsers are registered.
    pub fn register(&mut self, parser: Box<dyn Parser>) {
        log_debug!(
            "registering parser {} (priority {})",
            parser.id(),
            parser.priority()
        );
        let priority = parser.priority();
        let idx = self
            .parsers
            .iter()
            .position(|p| p.priority() < priority)
            .unwrap_or(self.parsers.len());
        self.parsers.insert(idx, parser);
        self.noise_checker = None;
    }

    /// Register several parsers
    pub fn register_all(&mut self, parsers: impl IntoIterator<Item = Box<dyn Parser>>) {
        for parser in parsers {
            self.register(parser);
        }
    }

    /// Number of registered parsers
    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    /// Whether no parser is registered
    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    /// Registered parser ids, in priority order
    pub fn parser_ids(&self) -> Vec<&str> {
        self.parsers.iter().map(|p| p.id()).collect()
    }

    /// Index of the parser with the given id
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.parsers.iter().position(|p| p.id() == id)
    }

    /// Parser at an index
    pub fn get(&self, idx: usize) -> Option<&dyn Parser> {
        self.parsers.get(idx).map(|p| p.as_ref())
    }

    /// Mutable parser at an index
    pub fn get_mut(&mut self, idx: usize) -> Option<&mut (dyn Parser + 'static)> {
        self.parsers.get_mut(idx).map(|p| p.as_mut())
    }

    /// Parser with the given id
    pub fn get_by_id(&self, id: &str) -> Option<&dyn Parser> {
        self.index_of(id).and_then(|idx| self.get(idx))
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    /// Find the parser that should handle `line`
    pub fn find_parser(&self, line: &str, ctx: &ParseContext) -> Option<&dyn Parser> {
        self.find_parser_index(line, ctx).and_then(|idx| self.get(idx))
    }

    /// Index of the parser that should handle `line`
    pub fn find_parser_index(&self, line: &str, ctx: &ParseContext) -> Option<usize> {
        if let Some(tool) = ctx.tool.as_deref() {
            if let Some(idx) = self.resolve_tool_hint(tool) {
                return Some(idx);
            }
        }

        if let Some(idx) = self.route_by_extension(line, ctx) {
            return Some(idx);
        }

        self.compete(line, ctx)
    }

    /// Parser index for a tool hint: parser id first, then tool id
    fn resolve_tool_hint(&self, tool: &str) -> Option<usize> {
        self.index_of(tool)
            .or_else(|| tools::parser_for_tool(tool).and_then(|id| self.index_of(id)))
    }

    /// Route a line mentioning a source file straight to its parser
    ///
    /// The routed parser must still claim the line, so a path inside an
    /// unrelated message falls through to the full competition.
    fn route_by_extension(&self, line: &str, ctx: &ParseContext) -> Option<usize> {
        let caps = SOURCE_EXTENSION.captures(line)?;
        let parser_id = parser_for_extension(caps.get(1)?.as_str())?;
        let idx = self.index_of(parser_id)?;
        if self.parsers[idx].can_parse(line, ctx) > 0.0 {
            Some(idx)
        } else {
            None
        }
    }

    /// Score every parser; the first one at the maximum confidence wins
    fn compete(&self, line: &str, ctx: &ParseContext) -> Option<usize> {
        let mut best: Option<(usize, Confidence)> = None;
        for (idx, parser) in self.parsers.iter().enumerate() {
            let confidence = parser.can_parse(line, ctx);
            if confidence <= 0.0 {
                continue;
            }
            match best {
                Some((_, top)) if confidence <= top => {}
                _ => best = Some((idx, confidence)),
            }
        }
        best.map(|(idx, _)| idx)
    }

    // ------------------------------------------------------------------------
    // Support reporting
    // ------------------------------------------------------------------------

    /// Whether a non-generic parser handles this parser or tool id
    pub fn has_dedicated_parser(&self, id: &str) -> bool {
        if id == GENERIC_ID {
            return false;
        }
        self.resolve_tool_hint(id)
            .is_some_and(|idx| self.parsers[idx].id() != GENERIC_ID)
    }

    /// Ids of every dedicated (non-generic) parser, in priority order
    pub fn supported_tool_ids(&self) -> Vec<&str> {
        self.parsers
            .iter()
            .map(|p| p.id())
            .filter(|id| *id != GENERIC_ID)
            .collect()
    }

    /// Detect the tools in a `run:` script
    pub fn detect_tools(&self, run: &str, options: DetectOptions) -> Vec<DetectedTool> {
        let mut ids = tools::detect_all_tools_from_run(run);
        if options.first_only {
            ids.truncate(1);
        }
        ids.into_iter()
            .map(|id| {
                let mut tool = DetectedTool::from_id(id);
                if options.check_support {
                    tool.supported = self.has_dedicated_parser(id);
                }
                tool
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Noise
    // ------------------------------------------------------------------------

    /// Merge every parser's noise rules into the aggregate checker
    pub fn init_noise_checker(&mut self) {
        let sets: Vec<NoisePatterns> = self.parsers.iter().map(|p| p.noise_patterns()).collect();
        let checker = NoiseChecker::from_patterns(sets.iter());
        let (prefixes, contains, regexes) = checker.counts();
        log_debug!(
            "noise checker ready: {} prefixes, {} substrings, {} regexes",
            prefixes,
            contains,
            regexes
        );
        self.noise_checker = Some(checker);
    }

    /// Merge caller-supplied noise rules, initializing the checker if needed
    pub fn extend_noise(&mut self, noise: &NoiseConfig) {
        if noise.is_empty() {
            return;
        }
        if self.noise_checker.is_none() {
            self.init_noise_checker();
        }
        if let Some(checker) = self.noise_checker.as_mut() {
            checker.extend_with_config(noise);
        }
    }

    /// Whether the noise checker has been initialized
    pub fn has_noise_checker(&self) -> bool {
        self.noise_checker.is_some()
    }

    /// Whether a line carries no diagnostic value
    ///
    /// Blank lines are always noise. Without an initialized checker every
    /// other line is reported as not noise.
    pub fn is_noise(&self, line: &str) -> bool {
        let line = strip_ansi(line);
        if line.trim().is_empty() {
            return true;
        }
        match &self.noise_checker {
            Some(checker) => checker.matches(&line),
            None => false,
        }
    }

    /// Reset every parser's multi-line state
    pub fn reset_all(&mut self) {
        for parser in &mut self.parsers {
            parser.reset();
        }
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractedError;

    /// Claims every line containing its marker with a fixed confidence
    struct FixedParser {
        id: &'static str,
        priority: i32,
        confidence: Confidence,
        marker: &'static str,
    }

    impl FixedParser {
        fn boxed(
            id: &'static str,
            priority: i32,
            confidence: Confidence,
            marker: &'static str,
        ) -> Box<dyn Parser> {
            Box::new(Self {
                id,
                priority,
                confidence,
                marker,
            })
        }
    }

    impl Parser for FixedParser {
        fn id(&self) -> &str {
            self.id
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn can_parse(&self, line: &str, _ctx: &ParseContext) -> Confidence {
            if line.contains(self.marker) {
                self.confidence
            } else {
                0.0
            }
        }

        fn parse(&mut self, line: &str, _ctx: &ParseContext) -> Option<ExtractedError> {
            Some(ExtractedError::new(line).with_source(self.id))
        }

        fn noise_patterns(&self) -> NoisePatterns {
            NoisePatterns::new().with_prefixes(&["skip:"])
        }
    }

    #[test]
    fn test_register_sorts_by_priority() {
        let mut registry = ParserRegistry::new();
        registry.register(FixedParser::boxed("low", 10, 0.5, "x"));
        registry.register(FixedParser::boxed("high", 90, 0.5, "x"));
        registry.register(FixedParser::boxed("mid", 50, 0.5, "x"));
        assert_eq!(registry.parser_ids(), vec!["high", "mid", "low"]);
    }

    #[test]
    fn test_tie_goes_to_higher_priority() {
        let mut registry = ParserRegistry::new();
        registry.register(FixedParser::boxed("low", 10, 0.7, "boom"));
        registry.register(FixedParser::boxed("high", 90, 0.7, "boom"));
        let ctx = ParseContext::new();
        for _ in 0..5 {
            assert_eq!(registry.find_parser("boom", &ctx).unwrap().id(), "high");
        }
    }

    #[test]
    fn test_higher_confidence_beats_priority() {
        let mut registry = ParserRegistry::new();
        registry.register(FixedParser::boxed("low", 10, 0.9, "boom"));
        registry.register(FixedParser::boxed("high", 90, 0.4, "boom"));
        let ctx = ParseContext::new();
        assert_eq!(registry.find_parser("boom", &ctx).unwrap().id(), "low");
    }

    #[test]
    fn test_zero_confidence_returns_none() {
        let mut registry = ParserRegistry::new();
        registry.register(FixedParser::boxed("a", 10, 0.9, "boom"));
        assert!(registry.find_parser("quiet", &ParseContext::new()).is_none());
    }

    #[test]
    fn test_tool_hint_bypasses_competition() {
        let mut registry = ParserRegistry::new();
        registry.register(FixedParser::boxed("a", 90, 0.9, "boom"));
        registry.register(FixedParser::boxed("b", 10, 0.1, "never"));
        let ctx = ParseContext::new().with_tool("b");
        assert_eq!(registry.find_parser("boom", &ctx).unwrap().id(), "b");
    }

    #[test]
    fn test_tool_hint_resolves_tool_ids() {
        let registry = ParserRegistry::with_defaults();
        let ctx = ParseContext::new().with_tool("golangci-lint");
        assert_eq!(registry.find_parser("anything", &ctx).unwrap().id(), "go");
    }

    #[test]
    fn test_noise_without_checker() {
        let mut registry = ParserRegistry::new();
        registry.register(FixedParser::boxed("a", 10, 0.9, "boom"));
        assert!(!registry.is_noise("skip: me"));
        assert!(registry.is_noise("   "));
        registry.init_noise_checker();
        assert!(registry.is_noise("skip: me"));
        assert!(registry.is_noise("\x1b[2mskip: dimmed\x1b[0m"));
    }

    #[test]
    fn test_register_invalidates_noise_checker() {
        let mut registry = ParserRegistry::new();
        registry.register(FixedParser::boxed("a", 10, 0.9, "boom"));
        registry.init_noise_checker();
        assert!(registry.has_noise_checker());
        registry.register(FixedParser::boxed("b", 10, 0.9, "boom"));
        assert!(!registry.has_noise_checker());
    }

    #[test]
    fn test_extend_noise_from_config() {
        let mut registry = ParserRegistry::new();
        registry.register(FixedParser::boxed("a", 10, 0.9, "boom"));
        registry.extend_noise(&NoiseConfig {
            prefixes: vec!["[heartbeat]".to_string()],
            contains: vec!["tick-tock".to_string()],
            patterns: vec![r"^\d+/\d+ done$".to_string(), "(bad".to_string()],
        });
        assert!(registry.is_noise("[heartbeat] alive"));
        assert!(registry.is_noise("clock says tick-tock"));
        assert!(registry.is_noise("3/10 done"));
        assert!(!registry.is_noise("error: boom"));
    }

    #[test]
    fn test_reset_all_clears_accumulation() {
        let mut registry = ParserRegistry::with_defaults();
        let ctx = ParseContext::new();
        let idx = registry.index_of("go").unwrap();
        let go = registry.get_mut(idx).unwrap();
        assert!(go.parse("panic: boom", &ctx).is_none());
        assert!(registry.get(idx).unwrap().is_accumulating());

        registry.reset_all();
        assert!(!registry.get(idx).unwrap().is_accumulating());
        registry.reset_all();
        assert!(!registry.get(idx).unwrap().is_accumulating());
    }

    #[test]
    fn test_supported_ids_exclude_generic() {
        let registry = ParserRegistry::with_defaults();
        let ids = registry.supported_tool_ids();
        assert!(!ids.contains(&GENERIC_ID));
        assert!(ids.contains(&"go"));
        assert!(ids.contains(&"infrastructure"));
        assert!(registry.has_dedicated_parser("typescript"));
        assert!(registry.has_dedicated_parser("eslint"));
        assert!(!registry.has_dedicated_parser("generic"));
        assert!(!registry.has_dedicated_parser("jest"));
    }

    #[test]
    fn test_detect_tools_marks_support() {
        let registry = ParserRegistry::with_defaults();
        let tools = registry.detect_tools(
            "npx jest && golangci-lint run",
            DetectOptions {
                check_support: true,
                first_only: false,
            },
        );
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].id, "jest");
        assert!(!tools[0].supported);
        assert_eq!(tools[1].display_name, "golangci-lint");
        assert!(tools[1].supported);

        let first = registry.detect_tools(
            "npx jest && golangci-lint run",
            DetectOptions {
                check_support: false,
                first_only: true,
            },
        );
        assert_eq!(first.len(), 1);
        assert!(!first[0].supported);
    }

    #[test]
    fn test_extension_routing() {
        let registry = ParserRegistry::with_defaults();
        let ctx = ParseContext::new();
        assert_eq!(
            registry.find_parser("src/app.py:3:1: F401 `os` imported but unused", &ctx)
                .unwrap()
                .id(),
            "python"
        );
        assert_eq!(
            registry.find_parser("file.ts(1,2): error TS2304: Cannot find name 'foo'", &ctx)
                .unwrap()
                .id(),
            "typescript"
        );
    }
}
