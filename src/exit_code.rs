//! Process exit code classification
//!
//! Maps a step's exit status to a coarse classification with a human hint,
//! following shell conventions: `126`/`127` for exec failures and
//! `128 + n` for termination by signal `n`.
//!
//! # Example
//!
//! ```
//! use detent::exit_code::{classify_exit_code, ExitClassification};
//!
//! let info = classify_exit_code(137);
//! assert_eq!(info.classification, ExitClassification::Signal);
//! assert_eq!(info.signal, Some(9));
//! assert_eq!(info.signal_name, Some("SIGKILL"));
//! assert!(info.is_transient);
//! ```

use serde::Serialize;

/// Coarse meaning of an exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitClassification {
    /// Exit code 0
    Success,
    /// Ordinary failure reported by the program
    General,
    /// Command found but not executable (126)
    Permission,
    /// Command not found (127)
    NotFound,
    /// Terminated by a signal (129-255)
    Signal,
}

/// How the exit should be surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitSeverity {
    /// Nothing to report
    Success,
    /// Interrupted by the user or runner rather than failed
    Warning,
    /// A failure
    Error,
}

/// Classification result for one exit code
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitCodeInfo {
    /// Coarse meaning
    pub classification: ExitClassification,
    /// Reporting severity
    pub severity: ExitSeverity,
    /// One-line description
    pub message: String,
    /// What to try next
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Likely to pass on retry
    pub is_transient: bool,
    /// Caused by the workflow or environment setup rather than the code
    pub is_configuration: bool,
    /// Signal number for signal exits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<i32>,
    /// Signal name, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_name: Option<&'static str>,
}

const SIGNAL_NAMES: [(i32, &str); 15] = [
    (1, "SIGHUP"),
    (2, "SIGINT"),
    (3, "SIGQUIT"),
    (4, "SIGILL"),
    (5, "SIGTRAP"),
    (6, "SIGABRT"),
    (7, "SIGBUS"),
    (8, "SIGFPE"),
    (9, "SIGKILL"),
    (10, "SIGUSR1"),
    (11, "SIGSEGV"),
    (12, "SIGUSR2"),
    (13, "SIGPIPE"),
    (14, "SIGALRM"),
    (15, "SIGTERM"),
];

const SIGINT: i32 = 2;
const SIGKILL: i32 = 9;
const SIGPIPE: i32 = 13;
const SIGTERM: i32 = 15;

/// Name of a signal number, if it is one of the standard ones
pub fn signal_name(signal: i32) -> Option<&'static str> {
    SIGNAL_NAMES
        .iter()
        .find(|(number, _)| *number == signal)
        .map(|(_, name)| *name)
}

/// Whether the code means "terminated by signal"
pub fn is_signal_exit(code: i32) -> bool {
    code > 128 && code <= 255
}

/// Whether a retry is likely to succeed
///
/// Only SIGKILL (usually the OOM killer or a runner timeout) and SIGPIPE
/// count; an explicit SIGINT or SIGTERM is a decision, not an accident.
pub fn is_transient_failure(code: i32) -> bool {
    is_signal_exit(code) && matches!(code - 128, SIGKILL | SIGPIPE)
}

fn info(
    classification: ExitClassification,
    severity: ExitSeverity,
    message: impl Into<String>,
    hint: Option<&str>,
) -> ExitCodeInfo {
    ExitCodeInfo {
        classification,
        severity,
        message: message.into(),
        hint: hint.map(str::to_string),
        is_transient: false,
        is_configuration: false,
        signal: None,
        signal_name: None,
    }
}

/// Classify an exit code
pub fn classify_exit_code(code: i32) -> ExitCodeInfo {
    use ExitClassification as C;
    use ExitSeverity as S;

    match code {
        0 => info(C::Success, S::Success, "Command succeeded", None),
        1 => info(
            C::General,
            S::Error,
            "Command failed",
            Some("Check the errors reported above for the cause"),
        ),
        2 => ExitCodeInfo {
            is_configuration: true,
            ..info(
                C::General,
                S::Error,
                "Misuse of shell builtin or invalid arguments",
                Some("Check the command syntax and arguments in the workflow"),
            )
        },
        126 => ExitCodeInfo {
            is_configuration: true,
            ..info(
                C::Permission,
                S::Error,
                "Command found but not executable",
                Some("Make the file executable (chmod +x) or invoke it through its interpreter"),
            )
        },
        127 => ExitCodeInfo {
            is_configuration: true,
            ..info(
                C::NotFound,
                S::Error,
                "Command not found",
                Some("Install the tool in an earlier step or fix PATH"),
            )
        },
        128 => info(
            C::General,
            S::Error,
            "Invalid argument to exit",
            Some("Exit codes must be integers between 0 and 255"),
        ),
        code if is_signal_exit(code) => classify_signal(code - 128),
        _ => info(C::General, S::Error, format!("Command failed with exit code {}", code), None),
    }
}

fn classify_signal(signal: i32) -> ExitCodeInfo {
    let name = signal_name(signal);
    let message = match name {
        Some(name) => format!("Terminated by signal {} ({})", signal, name),
        None => format!("Terminated by signal {}", signal),
    };
    let (severity, hint) = match signal {
        SIGKILL => (
            ExitSeverity::Error,
            Some("Killed, usually by the out-of-memory killer or a timeout; reduce memory use or retry"),
        ),
        SIGPIPE => (
            ExitSeverity::Warning,
            Some("Wrote to a closed pipe; often harmless when piping into head, otherwise retry"),
        ),
        11 => (
            ExitSeverity::Error,
            Some("Segmentation fault; look for native crashes or stack overflows"),
        ),
        SIGINT => (ExitSeverity::Warning, Some("Interrupted; the run was cancelled")),
        SIGTERM => (
            ExitSeverity::Warning,
            Some("Terminated; the run was cancelled or hit its time limit"),
        ),
        _ => (ExitSeverity::Error, None),
    };

    ExitCodeInfo {
        is_transient: matches!(signal, SIGKILL | SIGPIPE),
        signal: Some(signal),
        signal_name: name,
        ..info(ExitClassification::Signal, severity, message, hint)
    }
}
