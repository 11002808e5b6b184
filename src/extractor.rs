//! Line-driven extraction
//!
//! The [`Extractor`] walks a log line by line, strips ANSI escapes, drops
//! oversized lines, routes the rest through the [`ParserRegistry`], and
//! collects the results with in-pass deduplication.
//!
//! # Processing model
//!
//! At most one parser accumulates a multi-line error at a time. While one
//! does, every line is offered to it first. When it declines a line the
//! pending error is finished and the same line is evaluated from scratch,
//! so a line that ends one block can start the next.
//!
//! ```text
//! line -> strip ANSI -> too long? drop
//!      -> accumulating? continue / finish + re-evaluate
//!      -> noise? skip
//!      -> find parser -> parse -> dedup -> output
//! ```
//!
//! # Bounds
//!
//! - Lines longer than [`ExtractorConfig::max_line_length`] are dropped
//!   whole, never truncated and parsed.
//! - Once [`ExtractorConfig::max_deduplication_size`] unique errors have
//!   been accepted, further unique errors are counted but not kept. The
//!   rest of the input is still scanned so multi-line state stays
//!   consistent.
//!
//! # Example
//!
//! ```
//! use detent::{Extractor, ParseContext};
//!
//! let log = "\
//! Traceback (most recent call last):
//!   File \"/app/utils.py\", line 18, in compute
//!     return a / b
//! ZeroDivisionError: division by zero
//! ";
//!
//! let mut extractor = Extractor::with_defaults();
//! let errors = extractor.extract(log, |_| ParseContext::for_step("test", "pytest"));
//!
//! assert_eq!(errors.len(), 1);
//! assert_eq!(errors[0].file.as_deref(), Some("/app/utils.py"));
//! assert_eq!(errors[0].line, Some(18));
//! assert_eq!(errors[0].workflow_context.as_ref().unwrap().step.as_deref(), Some("pytest"));
//! ```

use hashbrown::HashSet;
use serde::Serialize;

use crate::ansi::strip_ansi;
use crate::config::{ConfigError, ExtractorConfig};
use crate::context::ParseContext;
use crate::error::{ExtractedError, WorkflowContext};
use crate::registry::ParserRegistry;
use crate::telemetry::{self, UnknownPatternReporter};

/// Counters for one extraction pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionStats {
    /// Lines read
    pub lines: usize,
    /// Lines dropped for exceeding the length bound
    pub oversized_lines: usize,
    /// Lines skipped as noise
    pub noise_lines: usize,
    /// Non-noise lines no parser turned into an error
    pub unmatched_lines: usize,
    /// Errors dropped as exact repeats
    pub duplicates: usize,
    /// Unique errors dropped after the cap was reached
    pub capped: usize,
    /// Errors returned
    pub errors: usize,
}

type DedupKey = (Option<String>, Option<u32>, String);

/// Deduplicating, bounded output buffer
struct ErrorSink {
    seen: HashSet<DedupKey>,
    errors: Vec<ExtractedError>,
    limit: usize,
}

impl ErrorSink {
    fn new(limit: usize) -> Self {
        Self {
            seen: HashSet::new(),
            errors: Vec::new(),
            limit,
        }
    }

    fn push(&mut self, err: ExtractedError, stats: &mut ExtractionStats) {
        let (file, line, message) = err.dedup_key();
        let key = (file.map(str::to_string), line, message.to_string());
        if self.seen.contains(&key) {
            stats.duplicates += 1;
            return;
        }
        if self.errors.len() >= self.limit {
            if stats.capped == 0 {
                log_debug!(
                    "deduplication limit of {} reached; further errors are dropped",
                    self.limit
                );
            }
            stats.capped += 1;
            return;
        }
        self.seen.insert(key);
        self.errors.push(err);
    }
}

/// Turns raw CI output into structured, deduplicated errors
///
/// One extractor owns its registry and therefore its parsers' multi-line
/// state. Use one extractor per concurrent stream.
pub struct Extractor {
    registry: ParserRegistry,
    config: ExtractorConfig,
    workflow_context: Option<WorkflowContext>,
    reporter: Option<UnknownPatternReporter>,
    stats: ExtractionStats,
}

impl Extractor {
    /// Create an extractor over an existing registry
    pub fn new(registry: ParserRegistry) -> Self {
        Self {
            registry,
            config: ExtractorConfig::default(),
            workflow_context: None,
            reporter: None,
            stats: ExtractionStats::default(),
        }
    }

    /// Create an extractor with every built-in parser
    pub fn with_defaults() -> Self {
        Self::new(ParserRegistry::with_defaults())
    }

    /// Apply a configuration
    ///
    /// Extra noise rules are merged into the registry; invalid patterns are
    /// skipped. Use [`try_with_config`](Self::try_with_config) to reject
    /// them instead.
    pub fn with_config(mut self, config: ExtractorConfig) -> Self {
        self.registry.extend_noise(&config.noise);
        self.config = config;
        self
    }

    /// Validate and apply a configuration
    pub fn try_with_config(self, config: ExtractorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(self.with_config(config))
    }

    /// Attach an unknown-pattern reporter, called after every pass that
    /// produced unknown-pattern errors
    pub fn with_reporter(mut self, reporter: UnknownPatternReporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Set the workflow context used by [`extract_all`](Self::extract_all)
    pub fn set_workflow_context(&mut self, ctx: Option<WorkflowContext>) {
        self.workflow_context = ctx;
    }

    /// Current workflow context
    pub fn workflow_context(&self) -> Option<&WorkflowContext> {
        self.workflow_context.as_ref()
    }

    /// Active configuration
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// The registry
    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    /// Mutable access to the registry
    pub fn registry_mut(&mut self) -> &mut ParserRegistry {
        &mut self.registry
    }

    /// Counters from the last pass
    pub fn stats(&self) -> &ExtractionStats {
        &self.stats
    }

    /// Extract errors from `text` using one context for every line
    pub fn extract_with_context(
        &mut self,
        text: &str,
        ctx: &ParseContext,
    ) -> Vec<ExtractedError> {
        self.extract(text, |_| ctx.clone())
    }

    /// Extract errors from `text` with no tool hints
    ///
    /// Errors carry the extractor's workflow context, if one is set.
    pub fn extract_all(&mut self, text: &str) -> Vec<ExtractedError> {
        let ctx = ParseContext {
            job: self.workflow_context.as_ref().and_then(|w| w.job.clone()),
            step: self.workflow_context.as_ref().and_then(|w| w.step.clone()),
            workflow_context: self.workflow_context.clone(),
            ..ParseContext::default()
        };
        self.extract_with_context(text, &ctx)
    }

    /// Extract errors from `text`
    ///
    /// `resolve` supplies the [`ParseContext`] for each (ANSI-stripped)
    /// line. Output order follows input order, with multi-line errors
    /// placed where their block ended.
    pub fn extract<F>(&mut self, text: &str, mut resolve: F) -> Vec<ExtractedError>
    where
        F: FnMut(&str) -> ParseContext,
    {
        let max_line_length = self.config.max_line_length;
        let mut stats = ExtractionStats::default();
        let mut sink = ErrorSink::new(self.config.max_deduplication_size);
        let mut active: Option<usize> = None;
        let mut last_ctx = ParseContext::default();

        for raw in text.lines().flat_map(|l| l.split('\r')) {
            stats.lines += 1;
            let stripped = strip_ansi(raw);
            let line: &str = &stripped;
            if line.len() > max_line_length && line.chars().count() > max_line_length {
                log_trace!("dropping oversized line {} ({} bytes)", stats.lines, line.len());
                stats.oversized_lines += 1;
                continue;
            }
            let ctx = resolve(line);

            if let Some(idx) = active {
                if let Some(parser) = self.registry.get_mut(idx) {
                    if parser.continue_multi_line(line, &ctx) {
                        last_ctx = ctx;
                        continue;
                    }
                    log_trace!("{} finished a block", parser.id());
                    if let Some(err) = parser.finish_multi_line(&ctx) {
                        sink.push(err, &mut stats);
                    }
                }
                active = None;
            }

            if self.registry.is_noise(line) {
                stats.noise_lines += 1;
                last_ctx = ctx;
                continue;
            }

            let Some(idx) = self.registry.find_parser_index(line, &ctx) else {
                stats.unmatched_lines += 1;
                last_ctx = ctx;
                continue;
            };
            if let Some(parser) = self.registry.get_mut(idx) {
                match parser.parse(line, &ctx) {
                    Some(err) => sink.push(err, &mut stats),
                    None if parser.supports_multi_line() && parser.is_accumulating() => {
                        log_trace!("{} started a block", parser.id());
                        active = Some(idx);
                    }
                    None => stats.unmatched_lines += 1,
                }
            }
            last_ctx = ctx;
        }

        if let Some(parser) = active.and_then(|idx| self.registry.get_mut(idx)) {
            if let Some(err) = parser.finish_multi_line(&last_ctx) {
                sink.push(err, &mut stats);
            }
        }

        let errors = sink.errors;
        stats.errors = errors.len();
        log_debug!(
            "extracted {} errors from {} lines ({} noise, {} unmatched, {} duplicates, {} capped)",
            stats.errors,
            stats.lines,
            stats.noise_lines,
            stats.unmatched_lines,
            stats.duplicates,
            stats.capped
        );
        self.stats = stats;

        if let Some(reporter) = &self.reporter {
            telemetry::report_unknown_patterns_to(
                reporter,
                &errors,
                self.config.max_unknown_pattern_samples,
                self.config.max_sample_length,
            );
        }
        errors
    }

    /// Send unknown-pattern samples from `errors` to this extractor's
    /// reporter, or to the process-wide one if none is attached
    ///
    /// Returns the number of samples sent.
    pub fn report_unknown_patterns(&self, errors: &[ExtractedError]) -> usize {
        let reporter = match &self.reporter {
            Some(reporter) => reporter.clone(),
            None => match telemetry::get_unknown_pattern_reporter() {
                Some(reporter) => reporter,
                None => return 0,
            },
        };
        telemetry::report_unknown_patterns_to(
            &reporter,
            errors,
            self.config.max_unknown_pattern_samples,
            self.config.max_sample_length,
        )
    }

    /// Clear the workflow context, the last pass's counters and every
    /// parser's multi-line state
    pub fn reset(&mut self) {
        self.workflow_context = None;
        self.stats = ExtractionStats::default();
        self.registry.reset_all();
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::with_defaults()
    }
}
