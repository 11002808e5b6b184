//! CI infrastructure failure parser
//!
//! Recognizes failures of the environment rather than the code: package
//! manager errors, network and DNS trouble, resource exhaustion, auth
//! failures, Docker daemon problems, git fatals and shell errors.
//!
//! Runs below every language parser, so a compiler line that mentions
//! `permission denied` stays with the compiler.

use regex::Regex;
use std::sync::LazyLock;

use crate::context::ParseContext;
use crate::error::{ErrorCategory, ExtractedError, Severity};
use crate::exit_code::classify_exit_code;
use crate::parser::{
    truncate_message, within_line_limit, Confidence, NoisePatterns, Parser, MAX_MESSAGE_LENGTH,
};
use crate::regex_cache::builtin;

use super::INFRASTRUCTURE_PRIORITY;

static NPM_CODE: LazyLock<Regex> =
    LazyLock::new(|| builtin(r"^npm (?:ERR!|error) code ([A-Z][A-Z0-9_]+)\s*$"));
static EXIT_CODE: LazyLock<Regex> =
    LazyLock::new(|| builtin(r"Process completed with exit code (\d+)"));
static NPM_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| builtin(r"^(?:##\[error\]|npm (?:ERR!|error) |error )"));

/// One fixed failure shape
struct Rule {
    regex: Regex,
    confidence: Confidence,
    rule_id: &'static str,
    hint: &'static str,
}

impl Rule {
    fn new(
        pattern: &str,
        confidence: Confidence,
        rule_id: &'static str,
        hint: &'static str,
    ) -> Self {
        Self {
            regex: builtin(pattern),
            confidence,
            rule_id,
            hint,
        }
    }
}

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(
            r#"Missing script: "?[\w:.-]+"?|^error Command "[\w:.-]+" not found"#,
            0.85,
            "missing-script",
            "Add the script to package.json or fix the script name in the workflow",
        ),
        Rule::new(
            r#"EBADENGINE|Unsupported engine|The engine "node" is incompatible|Expected version "[^"]+"\. Got "[^"]+""#,
            0.85,
            "node-engine-mismatch",
            "Align the Node.js version in the workflow with package.json engines",
        ),
        Rule::new(
            r"\bENOSPC\b|No space left on device",
            0.85,
            "disk-full",
            "Free disk space on the runner or prune caches and images",
        ),
        Rule::new(
            r"\bENOMEM\b|heap out of memory|Cannot allocate memory|out of memory",
            0.85,
            "out-of-memory",
            "Reduce memory use or run on a larger runner",
        ),
        Rule::new(
            r"Cannot connect to the Docker daemon|Error response from daemon|failed to solve:|pull access denied",
            0.85,
            "docker-error",
            "Check that the Docker daemon is running and the image exists",
        ),
        Rule::new(
            r"(?i)\b(?:401 Unauthorized|403 Forbidden|E401|E403|authentication failed|Bad credentials)\b|Permission denied \(publickey",
            0.80,
            "auth-failed",
            "Check the credentials or token available to the workflow",
        ),
        Rule::new(
            r"^fatal: ",
            0.80,
            "git-fatal",
            "Check the repository state, refs and checkout depth",
        ),
        Rule::new(
            r"(?:^|: )(?:line \d+: )?[\w.+/-]+: (?:command )?not found\s*$",
            0.85,
            "command-not-found",
            "Install the tool or add it to PATH before this step",
        ),
        Rule::new(
            r"\b(?:ETIMEDOUT|ECONNREFUSED|ECONNRESET|ENETUNREACH|EHOSTUNREACH|socket hang up)\b",
            0.75,
            "network-error",
            "Retry the job; the failure looks transient",
        ),
        Rule::new(
            r"\b(?:EAI_AGAIN|ENOTFOUND)\b|(?i)could not resolve host|temporary failure in name resolution",
            0.75,
            "dns-error",
            "Retry the job; name resolution failed",
        ),
        Rule::new(
            r"(?i)\bpermission denied\b|\bEACCES\b",
            0.70,
            "permission-denied",
            "Check file permissions or the user the step runs as",
        ),
    ]
});

/// Parser for environment-level CI failures
#[derive(Debug, Default)]
pub struct InfrastructureParser;

impl InfrastructureParser {
    /// Create the parser
    pub fn new() -> Self {
        Self
    }

    fn clean_message(line: &str) -> (String, bool) {
        let trimmed = line.trim();
        let message = NPM_PREFIX
            .find(trimmed)
            .map_or(trimmed, |m| &trimmed[m.end()..]);
        truncate_message(message, MAX_MESSAGE_LENGTH)
    }

    fn error(line: &str, rule_id: String, ctx: &ParseContext) -> ExtractedError {
        let (message, truncated) = Self::clean_message(line);
        ExtractedError::new(message)
            .with_severity(Severity::Error)
            .with_category(ErrorCategory::Infrastructure)
            .with_rule_id(rule_id)
            .with_source("infrastructure")
            .with_message_truncated(truncated)
            .with_workflow_context(ctx.workflow_context.clone())
    }
}

impl Parser for InfrastructureParser {
    fn id(&self) -> &str {
        "infrastructure"
    }

    fn priority(&self) -> i32 {
        INFRASTRUCTURE_PRIORITY
    }

    fn can_parse(&self, line: &str, _ctx: &ParseContext) -> Confidence {
        if !within_line_limit(line) {
            return 0.0;
        }
        if NPM_CODE.is_match(line) {
            return 0.90;
        }
        if EXIT_CODE.is_match(line) {
            return 0.80;
        }
        RULES
            .iter()
            .find(|rule| rule.regex.is_match(line))
            .map_or(0.0, |rule| rule.confidence)
    }

    fn parse(&mut self, line: &str, ctx: &ParseContext) -> Option<ExtractedError> {
        if !within_line_limit(line) {
            return None;
        }

        if let Some(caps) = NPM_CODE.captures(line) {
            let code = caps.get(1)?.as_str();
            let mut err = Self::error(line, format!("npm-{}", code), ctx);
            if let Some(rule) = RULES.iter().find(|rule| rule.regex.is_match(code)) {
                err = err.with_suggestion(rule.hint);
            }
            return Some(err);
        }

        if let Some(caps) = EXIT_CODE.captures(line) {
            let code: i32 = caps.get(1)?.as_str().parse().ok()?;
            let mut err = Self::error(line, format!("exit-code-{}", code), ctx);
            if let Some(hint) = classify_exit_code(code).hint {
                err = err.with_suggestion(hint);
            }
            return Some(err);
        }

        let rule = RULES.iter().find(|rule| rule.regex.is_match(line))?;
        Some(Self::error(line, rule.rule_id.to_string(), ctx).with_suggestion(rule.hint))
    }

    fn noise_patterns(&self) -> NoisePatterns {
        NoisePatterns::new()
            .with_prefixes(&[
                "npm WARN deprecated",
                "npm warn deprecated",
                "npm notice",
                "npm ERR! A complete log of this run",
                "npm error A complete log of this run",
                "##[group]",
                "##[endgroup]",
                "::group::",
                "::endgroup::",
                "found 0 vulnerabilities",
                "Run `npm audit` for details",
                "run `npm fund` for details",
            ])
            .with_regex([
                builtin(r"^(?:added|removed|changed|audited) \d+ packages?"),
                builtin(r"^\d+ packages? (?:are|is) looking for funding"),
            ])
    }
}
