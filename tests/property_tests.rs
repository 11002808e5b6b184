//! Property-based tests using proptest
//!
//! These tests check extraction invariants across generated logs built
//! from a pool of realistic lines mixed with arbitrary text.

use detent::prelude::*;
use proptest::prelude::*;

/// Realistic lines covering every built-in parser plus noise
const LINES: &[&str] = &[
    "main.go:10:5: undefined: someFunc",
    "main.go:11:2: undefined: otherFunc",
    "    calc_test.go:15: expected 4, got 5",
    "panic: runtime error: index out of range [3] with length 3",
    "goroutine 1 [running]:",
    "main.main()",
    "\t/app/main.go:5 +0x1d",
    "file.ts(1,2): error TS2304: Cannot find name 'foo'",
    "src/index.ts:10:5 - error TS2551: Property 'lenght' does not exist on type 'string'.",
    "Traceback (most recent call last):",
    "  File \"/app/utils.py\", line 18, in compute",
    "ZeroDivisionError: division by zero",
    "FAILED tests/test_calc.py::test_div - ZeroDivisionError: division by zero",
    "app/main.py:1:8: F401 [*] `os` imported but unused",
    "error[E0425]: cannot find value `x` in this scope",
    " --> src/main.rs:4:13",
    "  |",
    "thread 'main' panicked at src/main.rs:7:5:",
    "npm ERR! code ETIMEDOUT",
    "##[error]Process completed with exit code 1.",
    "FATAL: unexpected widget state",
    "::warning file=a.yml,line=3::deprecated key",
    "   Compiling serde v1.0.197",
    "npm WARN deprecated inflight@1.0.6: not supported",
    "",
    "hello world",
];

fn log_strategy() -> impl Strategy<Value = String> {
    let line = prop_oneof![
        4 => prop::sample::select(LINES).prop_map(str::to_string),
        1 => "[ -~]{0,80}",
    ];
    prop::collection::vec(line, 0..60).prop_map(|lines| lines.join("\n"))
}

fn dedup_key(err: &ExtractedError) -> (Option<String>, Option<u32>, String) {
    (err.file.clone(), err.line, err.message.clone())
}

// =============================================================================
// Extraction Invariants
// =============================================================================

proptest! {
    /// Extracting the same input twice yields identical results
    #[test]
    fn test_extraction_is_deterministic(log in log_strategy()) {
        let first = Extractor::with_defaults().extract_all(&log);
        let second = Extractor::with_defaults().extract_all(&log);
        prop_assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    /// No two errors share (file, line, message)
    #[test]
    fn test_no_duplicate_keys(log in log_strategy()) {
        let errors = Extractor::with_defaults().extract_all(&log);
        let mut keys: Vec<_> = errors.iter().map(dedup_key).collect();
        let total = keys.len();
        keys.sort();
        keys.dedup();
        prop_assert_eq!(keys.len(), total);
    }

    /// Output never exceeds the deduplication cap
    #[test]
    fn test_output_bounded_by_cap(log in log_strategy(), cap in 1usize..6) {
        let config = ExtractorConfig::new().with_max_deduplication_size(cap);
        let errors = Extractor::with_defaults().with_config(config).extract_all(&log);
        prop_assert!(errors.len() <= cap);
    }

    /// A line over the length bound never contributes an error
    #[test]
    fn test_oversized_lines_never_contribute(
        padding in 1usize..40,
        prefix in prop::sample::select(LINES),
    ) {
        let config = ExtractorConfig::new().with_max_line_length(100);
        let long = format!("main.go:99:1: {}{}", prefix, "z".repeat(100 + padding));
        let errors = Extractor::with_defaults().with_config(config).extract_all(&long);
        prop_assert!(errors.is_empty());
    }

    /// Arbitrary printable text never panics
    #[test]
    fn test_arbitrary_input_never_panics(log in "\\PC{0,400}") {
        let mut extractor = Extractor::with_defaults();
        let errors = extractor.extract_all(&log);
        prop_assert_eq!(extractor.stats().errors, errors.len());
    }

    /// Every error names a registered parser and keeps line/line_known paired
    #[test]
    fn test_errors_have_source(log in log_strategy()) {
        let ids = ParserRegistry::with_defaults()
            .parser_ids()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        for err in Extractor::with_defaults().extract_all(&log) {
            let source = err.source.clone().unwrap_or_default();
            prop_assert!(ids.contains(&source), "unexpected source {:?}", source);
            prop_assert_eq!(err.line.is_some(), err.line_known);
        }
    }
}

// =============================================================================
// Registry Invariants
// =============================================================================

proptest! {
    /// The same line always routes to the same parser
    #[test]
    fn test_selection_is_reproducible(line in prop::sample::select(LINES)) {
        let ctx = ParseContext::new();
        let a = ParserRegistry::with_defaults();
        let b = ParserRegistry::with_defaults();
        let first = a.find_parser(line, &ctx).map(|p| p.id().to_string());
        for _ in 0..3 {
            prop_assert_eq!(&b.find_parser(line, &ctx).map(|p| p.id().to_string()), &first);
        }
    }

    /// can_parse stays within [0, 1]
    #[test]
    fn test_confidence_in_range(line in "\\PC{0,200}") {
        let ctx = ParseContext::new();
        for parser in detent::parsers::default_parsers() {
            let confidence = parser.can_parse(&line, &ctx);
            prop_assert!((0.0..=1.0).contains(&confidence));
        }
    }
}
