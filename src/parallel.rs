//! Batch extraction over independent logs
//!
//! A single log must be processed in order, but separate logs (one per
//! job, say) share nothing. Each input gets its own [`Extractor`] and
//! therefore its own parsers, so no multi-line state crosses inputs.
//!
//! # Feature Flag
//!
//! With the `parallel` feature the batch runs on rayon's thread pool;
//! without it the same functions run sequentially.
//!
//! ```toml
//! [dependencies]
//! detent = { version = "0.1", features = ["parallel"] }
//! ```
//!
//! # Example
//!
//! ```
//! use detent::config::ExtractorConfig;
//! use detent::parallel::extract_batch_parallel;
//!
//! let logs = ["main.go:1:1: bad", "npm ERR! code ENOSPC"];
//! let results = extract_batch_parallel(&ExtractorConfig::default(), &logs);
//!
//! // Results are in the same order as inputs
//! assert_eq!(results.len(), 2);
//! assert_eq!(results[0][0].source.as_deref(), Some("go"));
//! assert_eq!(results[1][0].rule_id.as_deref(), Some("npm-ENOSPC"));
//! ```

use crate::config::ExtractorConfig;
use crate::context::ParseContext;
use crate::error::ExtractedError;
use crate::extractor::Extractor;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

fn extract_one(config: &ExtractorConfig, input: &str, ctx: &ParseContext) -> Vec<ExtractedError> {
    Extractor::with_defaults()
        .with_config(config.clone())
        .extract_with_context(input, ctx)
}

/// Extract errors from several independent logs in parallel
///
/// Returns one result vector per input, in input order.
#[cfg(feature = "rayon")]
pub fn extract_batch_parallel(
    config: &ExtractorConfig,
    inputs: &[&str],
) -> Vec<Vec<ExtractedError>> {
    let ctx = ParseContext::default();
    inputs
        .par_iter()
        .map(|input| extract_one(config, input, &ctx))
        .collect()
}

/// Extract errors from several independent logs sequentially (fallback
/// when rayon is not available)
#[cfg(not(feature = "rayon"))]
pub fn extract_batch_parallel(
    config: &ExtractorConfig,
    inputs: &[&str],
) -> Vec<Vec<ExtractedError>> {
    let ctx = ParseContext::default();
    inputs
        .iter()
        .map(|input| extract_one(config, input, &ctx))
        .collect()
}

/// Extract errors from several logs, each with its own context
///
/// Useful when every log belongs to a different job or step.
#[cfg(feature = "rayon")]
pub fn extract_batch_with_contexts(
    config: &ExtractorConfig,
    inputs: &[(&str, ParseContext)],
) -> Vec<Vec<ExtractedError>> {
    inputs
        .par_iter()
        .map(|(input, ctx)| extract_one(config, input, ctx))
        .collect()
}

/// Extract errors from several logs, each with its own context
/// (sequential fallback)
#[cfg(not(feature = "rayon"))]
pub fn extract_batch_with_contexts(
    config: &ExtractorConfig,
    inputs: &[(&str, ParseContext)],
) -> Vec<Vec<ExtractedError>> {
    inputs
        .iter()
        .map(|(input, ctx)| extract_one(config, input, ctx))
        .collect()
}
