//! Integration tests for parser arbitration and multi-line parsing
//!
//! These tests cover:
//! - Registry ordering and confidence tie-breaks
//! - Tool hints and extension routing
//! - Custom parsers plugged into an extractor
//! - Multi-line blocks from each language, end to end

use detent::prelude::*;
use detent::parsers::{GoParser, RustParser};

/// Claims lines starting with a marker at a fixed confidence
struct MarkerParser {
    id: &'static str,
    priority: i32,
    marker: &'static str,
    confidence: Confidence,
}

impl MarkerParser {
    fn boxed(
        id: &'static str,
        priority: i32,
        marker: &'static str,
        confidence: Confidence,
    ) -> Box<dyn Parser> {
        Box::new(Self {
            id,
            priority,
            marker,
            confidence,
        })
    }
}

impl Parser for MarkerParser {
    fn id(&self) -> &str {
        self.id
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn can_parse(&self, line: &str, _ctx: &ParseContext) -> Confidence {
        if line.starts_with(self.marker) {
            self.confidence
        } else {
            0.0
        }
    }

    fn parse(&mut self, line: &str, ctx: &ParseContext) -> Option<ExtractedError> {
        let message = line.strip_prefix(self.marker)?.trim();
        Some(
            ExtractedError::new(message)
                .with_source(self.id)
                .with_workflow_context(ctx.workflow_context.clone()),
        )
    }

    fn noise_patterns(&self) -> NoisePatterns {
        NoisePatterns::new().with_prefixes(&["TF-INFO "])
    }
}

// ============================================================================
// Registry
// ============================================================================

#[test]
fn test_default_registry_order() {
    let registry = ParserRegistry::with_defaults();
    assert_eq!(
        registry.parser_ids(),
        vec!["go", "typescript", "python", "rust", "infrastructure", "generic"]
    );
    assert!(registry.has_noise_checker());
}

#[test]
fn test_tie_break_prefers_priority() {
    for order in [[0, 1], [1, 0]] {
        let candidates = [
            MarkerParser::boxed("low", 10, "TF-ERR ", 0.8),
            MarkerParser::boxed("high", 50, "TF-ERR ", 0.8),
        ];
        let mut registry = ParserRegistry::new();
        let mut candidates: Vec<Option<Box<dyn Parser>>> =
            candidates.into_iter().map(Some).collect();
        for idx in order {
            if let Some(parser) = candidates[idx].take() {
                registry.register(parser);
            }
        }
        let parser = registry.find_parser("TF-ERR state lock", &ParseContext::new()).unwrap();
        assert_eq!(parser.id(), "high");
    }
}

#[test]
fn test_tie_break_equal_priority_keeps_registration_order() {
    let mut registry = ParserRegistry::new();
    registry.register(MarkerParser::boxed("first", 10, "TF-ERR ", 0.8));
    registry.register(MarkerParser::boxed("second", 10, "TF-ERR ", 0.8));
    let ctx = ParseContext::new();
    for _ in 0..10 {
        assert_eq!(registry.find_parser("TF-ERR x", &ctx).unwrap().id(), "first");
    }
}

#[test]
fn test_higher_confidence_beats_priority() {
    let mut registry = ParserRegistry::new();
    registry.register(MarkerParser::boxed("high", 50, "TF-ERR ", 0.4));
    registry.register(MarkerParser::boxed("low", 10, "TF-ERR ", 0.9));
    assert_eq!(
        registry.find_parser("TF-ERR x", &ParseContext::new()).unwrap().id(),
        "low"
    );
}

#[test]
fn test_tool_hint_selects_parser() {
    let registry = ParserRegistry::with_defaults();
    let ctx = ParseContext::new().with_tool("clippy");
    assert_eq!(registry.find_parser("anything", &ctx).unwrap().id(), "rust");
    let ctx = ParseContext::new().with_tool("python");
    assert_eq!(registry.find_parser("anything", &ctx).unwrap().id(), "python");
}

#[test]
fn test_unknown_tool_hint_falls_back() {
    let registry = ParserRegistry::with_defaults();
    let ctx = ParseContext::new().with_tool("jest");
    assert_eq!(
        registry.find_parser("main.go:1:1: bad", &ctx).unwrap().id(),
        "go"
    );
}

#[test]
fn test_no_parser_for_plain_text() {
    let registry = ParserRegistry::with_defaults();
    assert!(registry
        .find_parser("Downloading artifacts", &ParseContext::new())
        .is_none());
}

#[test]
fn test_without_generic_unclaimed_lines_dropped() {
    let mut registry = ParserRegistry::new();
    registry.register(Box::new(GoParser::new()));
    registry.register(Box::new(RustParser::new()));
    registry.init_noise_checker();
    let mut extractor = Extractor::new(registry);
    let errors = extractor.extract_all("FATAL: unexpected widget state\nmain.go:1:1: bad");
    assert_eq!(errors.len(), 1);
    assert_eq!(extractor.stats().unmatched_lines, 1);
}

// ============================================================================
// Custom Parsers
// ============================================================================

#[test]
fn test_custom_parser_in_extractor() {
    let mut registry = ParserRegistry::with_defaults();
    registry.register(MarkerParser::boxed("terraform", 80, "TF-ERR ", 0.9));
    registry.init_noise_checker();

    let mut extractor = Extractor::new(registry);
    let log = "TF-INFO planning\nTF-ERR state lock held\nmain.go:1:1: bad";
    let errors = extractor.extract(log, |_| ParseContext::for_step("deploy", "apply"));
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].source.as_deref(), Some("terraform"));
    assert_eq!(errors[0].message, "state lock held");
    assert_eq!(
        errors[0].workflow_context,
        Some(WorkflowContext::new("deploy", "apply"))
    );
    assert_eq!(extractor.stats().noise_lines, 1);
}

// ============================================================================
// Multi-line Blocks
// ============================================================================

#[test]
fn test_typescript_pretty_block() {
    let log = "\
src/index.ts:10:5 - error TS2551: Property 'lenght' does not exist on type 'string'. Did you mean 'length'?

10     value.lenght;
             ~~~~~~

Found 1 error in src/index.ts:10
";
    let mut extractor = Extractor::with_defaults();
    let errors = extractor.extract_all(log);
    assert_eq!(errors.len(), 1);
    let err = &errors[0];
    assert_eq!(err.file.as_deref(), Some("src/index.ts"));
    assert_eq!(err.line, Some(10));
    assert_eq!(err.rule_id.as_deref(), Some("TS2551"));
    assert_eq!(err.suggestions, vec!["Did you mean 'length'?".to_string()]);
    assert!(!err.code_context.is_empty());
}

#[test]
fn test_eslint_stylish_output() {
    let log = "\
/home/runner/app/src/util.ts
   4:10  error  'x' is assigned a value but never used  @typescript-eslint/no-unused-vars
";
    let errors = Extractor::with_defaults().extract_all(log);
    assert_eq!(errors.len(), 1);
    let err = &errors[0];
    assert_eq!(err.file.as_deref(), Some("/home/runner/app/src/util.ts"));
    assert_eq!(err.line, Some(4));
    assert_eq!(err.column, Some(10));
    assert_eq!(err.category, ErrorCategory::Lint);
    assert_eq!(
        err.rule_id.as_deref(),
        Some("@typescript-eslint/no-unused-vars")
    );
}

#[test]
fn test_go_test_failure() {
    let log = "\
=== RUN   TestAdd
--- FAIL: TestAdd (0.00s)
    calc_test.go:15: expected 4, got 5
FAIL
FAIL\texample.com/calc\t0.002s
";
    let mut extractor = Extractor::with_defaults();
    let errors = extractor.extract_all(log);
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].message, "Test failed: TestAdd");
    assert_eq!(errors[1].file.as_deref(), Some("calc_test.go"));
    assert_eq!(errors[1].line, Some(15));
    assert!(errors.iter().all(|e| e.category == ErrorCategory::Test));
}

#[test]
fn test_rust_test_panic() {
    let log = "\
test tests::it_adds ... FAILED
thread 'tests::it_adds' panicked at src/lib.rs:10:9:
assertion `left == right` failed
  left: 4
 right: 5
note: run with `RUST_BACKTRACE=1` environment variable to display a backtrace
";
    let errors = Extractor::with_defaults().extract_all(log);
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].rule_id.as_deref(), Some("tests::it_adds"));
    let panic = &errors[1];
    assert_eq!(panic.message, "assertion `left == right` failed");
    assert_eq!(panic.file.as_deref(), Some("src/lib.rs"));
    assert_eq!(panic.line, Some(10));
    assert_eq!(panic.category, ErrorCategory::Test);
}

#[test]
fn test_clippy_lint_block() {
    let log = "\
warning: unneeded `return` statement
  --> src/lib.rs:3:5
   |
3  |     return x;
   |     ^^^^^^^^^
   = note: `#[warn(clippy::needless_return)]` on by default
";
    let errors = Extractor::with_defaults().extract_all(log);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].severity, Severity::Warning);
    assert_eq!(errors[0].category, ErrorCategory::Lint);
    assert_eq!(errors[0].rule_id.as_deref(), Some("clippy::needless_return"));
}

#[test]
fn test_github_annotation() {
    let errors = Extractor::with_defaults()
        .extract_all("::error file=app/main.rb,line=7,col=3::undefined method `foo'");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].file.as_deref(), Some("app/main.rb"));
    assert_eq!(errors[0].line, Some(7));
    assert_eq!(errors[0].column, Some(3));
    assert!(errors[0].unknown_pattern);
}
