//! Extraction configuration
//!
//! [`ExtractorConfig`] holds the resource bounds of an extraction pass and
//! any extra noise rules a deployment wants on top of the parsers' own.
//! It can be built in code or loaded from JSON:
//!
//! ```
//! use detent::config::ExtractorConfig;
//!
//! let config = ExtractorConfig::from_json(r#"{
//!     "maxLineLength": 4000,
//!     "noise": { "prefixes": ["[heartbeat]"] }
//! }"#).unwrap();
//!
//! assert_eq!(config.max_line_length, 4000);
//! assert_eq!(config.max_deduplication_size, 10_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::regex_cache;

/// Default maximum line length in characters
pub const DEFAULT_MAX_LINE_LENGTH: usize = 2000;

/// Default maximum number of unique errors per pass
pub const DEFAULT_MAX_DEDUPLICATION_SIZE: usize = 10_000;

/// Default number of unknown-pattern samples sent to the reporter
pub const DEFAULT_MAX_UNKNOWN_PATTERN_SAMPLES: usize = 10;

/// Default length of each unknown-pattern sample
pub const DEFAULT_MAX_SAMPLE_LENGTH: usize = 200;

/// Extra noise rules merged into the registry's aggregate checker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Lines starting with any of these (after leading whitespace) are noise
    pub prefixes: Vec<String>,
    /// Lines containing any of these are noise
    pub contains: Vec<String>,
    /// Lines matching any of these regexes are noise
    pub patterns: Vec<String>,
}

impl NoiseConfig {
    /// Whether no extra rules are configured
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty() && self.contains.is_empty() && self.patterns.is_empty()
    }
}

/// Configuration for an [`Extractor`](crate::extractor::Extractor)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExtractorConfig {
    /// Lines longer than this (in characters, after ANSI stripping) are dropped
    pub max_line_length: usize,
    /// Maximum number of unique errors accepted per pass
    pub max_deduplication_size: usize,
    /// Maximum unknown-pattern samples per report
    pub max_unknown_pattern_samples: usize,
    /// Maximum length of each unknown-pattern sample
    pub max_sample_length: usize,
    /// Extra noise rules
    pub noise: NoiseConfig,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            max_deduplication_size: DEFAULT_MAX_DEDUPLICATION_SIZE,
            max_unknown_pattern_samples: DEFAULT_MAX_UNKNOWN_PATTERN_SAMPLES,
            max_sample_length: DEFAULT_MAX_SAMPLE_LENGTH,
            noise: NoiseConfig::default(),
        }
    }
}

impl ExtractorConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Json(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the maximum line length
    pub fn with_max_line_length(mut self, n: usize) -> Self {
        self.max_line_length = n;
        self
    }

    /// Set the maximum number of unique errors
    pub fn with_max_deduplication_size(mut self, n: usize) -> Self {
        self.max_deduplication_size = n;
        self
    }

    /// Set the maximum number of unknown-pattern samples
    pub fn with_max_unknown_pattern_samples(mut self, n: usize) -> Self {
        self.max_unknown_pattern_samples = n;
        self
    }

    /// Set the maximum sample length
    pub fn with_max_sample_length(mut self, n: usize) -> Self {
        self.max_sample_length = n;
        self
    }

    /// Set extra noise rules
    pub fn with_noise(mut self, noise: NoiseConfig) -> Self {
        self.noise = noise;
        self
    }

    /// Check bounds and extra noise patterns
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_line_length == 0 {
            return Err(ConfigError::InvalidValue {
                field: "maxLineLength",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_deduplication_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "maxDeduplicationSize",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_sample_length < 4 {
            return Err(ConfigError::InvalidValue {
                field: "maxSampleLength",
                reason: "must leave room for the ellipsis".to_string(),
            });
        }
        for pattern in &self.noise.patterns {
            if regex_cache::get_or_compile(pattern).is_none() {
                return Err(ConfigError::InvalidPattern(pattern.clone()));
            }
        }
        Ok(())
    }
}

/// Errors from loading or validating a configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Malformed JSON
    Json(String),
    /// A bound is out of range
    InvalidValue {
        /// Offending field (serialized name)
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
    /// A noise regex failed to compile
    InvalidPattern(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(msg) => write!(f, "Invalid configuration JSON: {}", msg),
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid value for {}: {}", field, reason)
            }
            Self::InvalidPattern(pattern) => write!(f, "Invalid noise pattern: {}", pattern),
        }
    }
}

impl std::error::Error for ConfigError {}
