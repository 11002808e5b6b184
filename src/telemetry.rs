//! Unknown-pattern telemetry
//!
//! Errors produced by the generic fallback carry the raw line that nobody
//! recognized. Sampling those lines is how new tool formats get noticed.
//! This module holds an optional, replaceable reporter hook.
//!
//! A reporter can be attached to one [`Extractor`](crate::Extractor)
//! (preferred), or installed process-wide for callers that cannot thread
//! one through. Install the global reporter once at startup and clear it in
//! tests.
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use detent::telemetry::{report_unknown_patterns_to, UnknownPatternReporter};
//! use detent::ExtractedError;
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! let reporter: UnknownPatternReporter = Arc::new(move |samples: &[String]| {
//!     sink.lock().unwrap().extend_from_slice(samples);
//! });
//!
//! let errors = vec![ExtractedError::new("boom").as_unknown_pattern("FATAL: boom")];
//! assert_eq!(report_unknown_patterns_to(&reporter, &errors, 10, 200), 1);
//! assert_eq!(seen.lock().unwrap().as_slice(), ["FATAL: boom".to_string()]);
//! ```

use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::config::{DEFAULT_MAX_SAMPLE_LENGTH, DEFAULT_MAX_UNKNOWN_PATTERN_SAMPLES};
use crate::error::ExtractedError;

/// Callback receiving sampled raw lines of unknown-pattern errors
pub type UnknownPatternReporter = Arc<dyn Fn(&[String]) + Send + Sync>;

static GLOBAL_REPORTER: OnceLock<RwLock<Option<UnknownPatternReporter>>> = OnceLock::new();

fn global() -> &'static RwLock<Option<UnknownPatternReporter>> {
    GLOBAL_REPORTER.get_or_init(|| RwLock::new(None))
}

/// Install (or with `None`, remove) the process-wide reporter
pub fn set_unknown_pattern_reporter(reporter: Option<UnknownPatternReporter>) {
    *global().write().unwrap_or_else(PoisonError::into_inner) = reporter;
}

/// The process-wide reporter, if one is installed
pub fn get_unknown_pattern_reporter() -> Option<UnknownPatternReporter> {
    global()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Remove the process-wide reporter
pub fn clear_unknown_pattern_reporter() {
    set_unknown_pattern_reporter(None);
}

/// Sample raw lines of unknown-pattern errors
///
/// Takes at most `max_samples` errors flagged `unknown_pattern`, in order.
/// Samples longer than `max_len` characters are cut and suffixed with
/// `...` so the result never exceeds `max_len` characters.
pub fn unknown_pattern_samples(
    errors: &[ExtractedError],
    max_samples: usize,
    max_len: usize,
) -> Vec<String> {
    errors
        .iter()
        .filter(|e| e.unknown_pattern)
        .take(max_samples)
        .map(|e| {
            let raw = e.raw.as_deref().unwrap_or(&e.message);
            truncate_sample(raw, max_len)
        })
        .collect()
}

fn truncate_sample(raw: &str, max_len: usize) -> String {
    if raw.chars().count() <= max_len {
        return raw.to_string();
    }
    let keep = max_len.saturating_sub(3);
    let mut sample: String = raw.chars().take(keep).collect();
    sample.push_str("...");
    sample
}

/// Sample and send unknown patterns to a specific reporter
///
/// Returns the number of samples sent. The reporter is not called when
/// there is nothing to report.
pub fn report_unknown_patterns_to(
    reporter: &UnknownPatternReporter,
    errors: &[ExtractedError],
    max_samples: usize,
    max_len: usize,
) -> usize {
    let samples = unknown_pattern_samples(errors, max_samples, max_len);
    if samples.is_empty() {
        return 0;
    }
    log_trace!("reporting {} unknown pattern samples", samples.len());
    reporter(&samples);
    samples.len()
}

/// Sample and send unknown patterns to the process-wide reporter
///
/// Uses the default bounds. A no-op returning `0` when no reporter is
/// installed.
pub fn report_unknown_patterns(errors: &[ExtractedError]) -> usize {
    match get_unknown_pattern_reporter() {
        Some(reporter) => report_unknown_patterns_to(
            &reporter,
            errors,
            DEFAULT_MAX_UNKNOWN_PATTERN_SAMPLES,
            DEFAULT_MAX_SAMPLE_LENGTH,
        ),
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn unknown(raw: &str) -> ExtractedError {
        ExtractedError::new(raw).as_unknown_pattern(raw)
    }

    #[test]
    fn test_samples_only_unknown() {
        let errors = vec![ExtractedError::new("known"), unknown("ERROR: a"), unknown("ERROR: b")];
        assert_eq!(
            unknown_pattern_samples(&errors, 10, 200),
            vec!["ERROR: a".to_string(), "ERROR: b".to_string()]
        );
    }

    #[test]
    fn test_sample_cap_and_truncation() {
        let errors: Vec<_> = (0..15)
            .map(|i| unknown(&format!("ERROR {} {}", i, "x".repeat(300))))
            .collect();
        let samples = unknown_pattern_samples(&errors, 10, 200);
        assert_eq!(samples.len(), 10);
        for sample in &samples {
            assert_eq!(sample.chars().count(), 200);
            assert!(sample.ends_with("..."));
        }
    }

    #[test]
    fn test_reporter_not_called_when_empty() {
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        let reporter: UnknownPatternReporter =
            Arc::new(move |_: &[String]| *counter.lock().unwrap() += 1);
        let errors = [ExtractedError::new("x")];
        assert_eq!(report_unknown_patterns_to(&reporter, &errors, 10, 200), 0);
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    // The only test touching the global hook, so it cannot race other tests
    #[test]
    fn test_global_reporter_lifecycle() {
        clear_unknown_pattern_reporter();
        assert!(get_unknown_pattern_reporter().is_none());
        assert_eq!(report_unknown_patterns(&[unknown("ERROR: x")]), 0);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        set_unknown_pattern_reporter(Some(Arc::new(move |samples: &[String]| {
            sink.lock().unwrap().extend_from_slice(samples);
        })));
        assert_eq!(report_unknown_patterns(&[unknown("ERROR: x")]), 1);
        assert_eq!(seen.lock().unwrap().len(), 1);

        clear_unknown_pattern_reporter();
        assert!(get_unknown_pattern_reporter().is_none());
    }
}
