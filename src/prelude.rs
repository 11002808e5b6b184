//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and traits from detent.
//! Importing this module with a wildcard import brings the core types into scope:
//!
//! ```
//! use detent::prelude::*;
//!
//! let mut extractor = Extractor::with_defaults();
//! let errors = extractor.extract_all("npm ERR! code ETIMEDOUT");
//! assert_eq!(errors[0].category, ErrorCategory::Infrastructure);
//! ```
//!
//! # Re-exported Items
//!
//! ## Extraction
//! - [`Extractor`] - Line-driven extraction driver
//! - [`ExtractorConfig`] - Resource bounds and extra noise rules
//! - [`ParseContext`] - Per-line job/step/tool hints
//!
//! ## Results
//! - [`ExtractedError`] - One structured diagnostic
//! - [`ErrorCategory`] / [`Severity`] - Taxonomies
//! - [`WorkflowContext`] - Job/step provenance
//!
//! ## Extending
//! - [`Parser`] - Capability contract for custom parsers
//! - [`NoisePatterns`] - Noise rules a parser contributes
//! - [`ParserRegistry`] - Parser arbitration and tool detection
//! - [`DetectOptions`] / [`DetectedTool`] - Tool detection from `run:` scripts
//!
//! ## Exit Codes
//! - [`classify_exit_code()`] - Exit status classification

// ============================================================================
// Extraction
// ============================================================================

pub use crate::config::ExtractorConfig;
pub use crate::context::ParseContext;
pub use crate::extractor::Extractor;

// ============================================================================
// Results
// ============================================================================

pub use crate::error::{ErrorCategory, ExtractedError, Severity, WorkflowContext};

// ============================================================================
// Extending
// ============================================================================

pub use crate::parser::{Confidence, NoisePatterns, Parser};
pub use crate::registry::ParserRegistry;
pub use crate::tools::{DetectOptions, DetectedTool};

// ============================================================================
// Exit Codes
// ============================================================================

pub use crate::exit_code::{classify_exit_code, ExitClassification, ExitCodeInfo};
