//! Detent - structured error extraction from CI output
//!
//! Detent turns raw, unstructured CI job output (mixed stdout/stderr from
//! compilers, linters and test runners, possibly ANSI-colored and megabytes
//! long) into a deduplicated list of structured errors with file, line,
//! column, severity, category and tool provenance.
//!
//! It provides:
//! - A pluggable [`Parser`] contract with per-parser multi-line state
//! - A confidence-ranked [`ParserRegistry`] with aggregated noise filtering
//! - A line-driven [`Extractor`] with deduplication and resource bounds
//! - Parsers for Go, TypeScript, Python, Rust, CI infrastructure failures
//!   and a generic fallback
//! - Tool detection from workflow `run:` commands
//! - An exit-code classifier
//!
//! The core performs no I/O: it is a pure function from text plus
//! caller-supplied context to structured errors.
//!
//! ## Quick Start
//!
//! ```rust
//! use detent::Extractor;
//!
//! let log = "\
//! go: downloading github.com/pkg/errors v0.9.1
//! main.go:10:5: undefined: someFunc
//! main.go:10:5: undefined: someFunc
//! ";
//!
//! let mut extractor = Extractor::with_defaults();
//! let errors = extractor.extract_all(log);
//!
//! assert_eq!(errors.len(), 1);
//! assert_eq!(errors[0].file.as_deref(), Some("main.go"));
//! assert_eq!(errors[0].line, Some(10));
//! assert_eq!(errors[0].source.as_deref(), Some("go"));
//! ```
//!
//! ## Feature Flags
//!
//! - `logging` - Enable debug logging using the `log` crate
//! - `parallel` - Extract independent logs in parallel using `rayon`

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all)]
#![allow(clippy::new_without_default)]

/// Logging macros - no-op when logging feature is disabled
#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        if false {
            ::std::mem::drop(format!($($arg)*));
        }
    }};
}

/// Logging macros - use log crate when logging feature is enabled
#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

#[cfg(not(feature = "logging"))]
macro_rules! log_trace {
    ($($arg:tt)*) => {{
        if false {
            ::std::mem::drop(format!($($arg)*));
        }
    }};
}

#[cfg(feature = "logging")]
macro_rules! log_trace {
    ($($arg:tt)*) => { log::trace!($($arg)*) };
}

// Prelude module for convenient imports
pub mod prelude;

pub mod ansi;
pub mod config;
pub mod context;
pub mod error;
pub mod exit_code;
pub mod extractor;
pub mod format;
pub mod parallel;
pub mod parser;
pub mod parsers;
pub mod regex_cache;
pub mod registry;
pub mod telemetry;
pub mod tools;

/// Re-export commonly used types for convenience
pub use config::{ConfigError, ExtractorConfig, NoiseConfig};
pub use context::ParseContext;
pub use error::{ErrorCategory, ExtractedError, Severity, WorkflowContext};
pub use exit_code::{classify_exit_code, ExitClassification, ExitCodeInfo, ExitSeverity};
pub use extractor::{ExtractionStats, Extractor};
pub use parser::{Confidence, NoisePatterns, Parser};
pub use registry::{NoiseChecker, ParserRegistry};
pub use telemetry::UnknownPatternReporter;
pub use tools::{DetectOptions, DetectedTool};
