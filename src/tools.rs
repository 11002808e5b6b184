//! Tool-name detection from shell commands
//!
//! CI workflow steps declare what they run (`run:` blocks). Detecting the
//! tool ahead of time lets callers pick a parser before any output arrives
//! and warn about tools that only the generic fallback will see.
//!
//! Detection works on command text only and never looks at log output.
//!
//! # Example
//!
//! ```
//! use detent::tools::{detect_all_tools_from_run, detect_tool_from_run};
//!
//! assert_eq!(detect_tool_from_run("go test ./..."), Some("go-test"));
//! assert_eq!(detect_tool_from_run("./node_modules/.bin/tsc --noEmit"), Some("typescript"));
//!
//! let ids = detect_all_tools_from_run("npm ci && npx eslint . && npx tsc\ncargo clippy");
//! assert_eq!(ids, vec!["eslint", "typescript", "clippy"]);
//! ```

use serde::{Deserialize, Serialize};

/// A tool found in a command string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedTool {
    /// Tool id (`"go-test"`, `"eslint"`, ...)
    pub id: String,
    /// Human-readable name
    pub display_name: String,
    /// Whether a dedicated parser handles this tool's output
    pub supported: bool,
}

impl DetectedTool {
    /// Create an entry for a known tool id, unsupported until checked
    pub fn from_id(id: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name(id).to_string(),
            supported: false,
        }
    }
}

/// Options for [`ParserRegistry::detect_tools`](crate::registry::ParserRegistry::detect_tools)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectOptions {
    /// Mark tools `supported` when a dedicated parser exists
    pub check_support: bool,
    /// Stop at the first detected tool
    pub first_only: bool,
}

/// Static description of a known tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSpec {
    /// Tool id
    pub id: &'static str,
    /// Human-readable name
    pub display_name: &'static str,
    /// Parser that understands this tool's output, if any
    pub parser_id: Option<&'static str>,
}

const fn tool(
    id: &'static str,
    display_name: &'static str,
    parser_id: Option<&'static str>,
) -> ToolSpec {
    ToolSpec {
        id,
        display_name,
        parser_id,
    }
}

/// Every tool the detector knows about
pub const KNOWN_TOOLS: &[ToolSpec] = &[
    tool("go", "Go", Some("go")),
    tool("go-test", "go test", Some("go")),
    tool("golangci-lint", "golangci-lint", Some("go")),
    tool("typescript", "TypeScript", Some("typescript")),
    tool("eslint", "ESLint", Some("typescript")),
    tool("cargo", "Cargo", Some("rust")),
    tool("cargo-test", "cargo test", Some("rust")),
    tool("clippy", "Clippy", Some("rust")),
    tool("rustc", "rustc", Some("rust")),
    tool("pytest", "pytest", Some("python")),
    tool("mypy", "mypy", Some("python")),
    tool("ruff", "Ruff", Some("python")),
    tool("flake8", "Flake8", Some("python")),
    tool("pylint", "Pylint", Some("python")),
    tool("jest", "Jest", None),
    tool("vitest", "Vitest", None),
    tool("prettier", "Prettier", None),
    tool("biome", "Biome", None),
    tool("rubocop", "RuboCop", None),
    tool("phpstan", "PHPStan", None),
    tool("swiftlint", "SwiftLint", None),
    tool("gradle", "Gradle", None),
    tool("mvn", "Maven", None),
    tool("dotnet", ".NET CLI", None),
];

/// Look up a known tool
pub fn tool_spec(id: &str) -> Option<&'static ToolSpec> {
    KNOWN_TOOLS.iter().find(|t| t.id == id)
}

/// Display name for a tool id, or the id itself when unknown
pub fn display_name(id: &str) -> &str {
    tool_spec(id).map(|t| t.display_name).unwrap_or(id)
}

/// Parser id that handles a tool id
pub fn parser_for_tool(id: &str) -> Option<&'static str> {
    tool_spec(id).and_then(|t| t.parser_id)
}

// ============================================================================
// Detection
// ============================================================================

/// Detect the tool run by a single shell command
///
/// Comment lines (`#`) yield `None`. Binaries given with a path prefix
/// (`./node_modules/.bin/eslint`, `/usr/local/bin/golangci-lint`) resolve
/// by their file name. Runner prefixes such as `npx`, `pnpm exec`,
/// `python -m`, `env` and leading `VAR=value` assignments are skipped.
pub fn detect_tool_from_run(command: &str) -> Option<&'static str> {
    let command = command.trim();
    if command.is_empty() || command.starts_with('#') {
        return None;
    }
    let words: Vec<&str> = command
        .split_whitespace()
        .map(|w| w.trim_matches(|c| c == '"' || c == '\''))
        .filter(|w| !w.is_empty())
        .collect();
    detect_in_words(&words)
}

/// Detect every tool in a multi-command script
///
/// The script is split on newlines, `&&`, `||` and `;`. Results are
/// deduplicated by id, keeping first-seen order.
pub fn detect_all_tools_from_run(script: &str) -> Vec<&'static str> {
    let mut found: Vec<&'static str> = Vec::new();
    for segment in split_commands(script) {
        if let Some(id) = detect_tool_from_run(segment) {
            if !found.contains(&id) {
                found.push(id);
            }
        }
    }
    found
}

/// Split a script into individual commands
fn split_commands(script: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    for line in script.lines() {
        if line.trim_start().starts_with('#') {
            continue;
        }
        let mut rest = line;
        while let Some(idx) = find_separator(rest) {
            let (head, tail) = rest.split_at(idx.0);
            segments.push(head);
            rest = &tail[idx.1..];
        }
        segments.push(rest);
    }
    segments
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Position and width of the first `&&`, `||` or `;`
fn find_separator(text: &str) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b';' => return Some((i, 1)),
            b'&' | b'|' if bytes.get(i + 1) == Some(&bytes[i]) => return Some((i, 2)),
            _ => {}
        }
        i += 1;
    }
    None
}

/// Strip directories and a Windows `.exe` suffix
fn binary_name(word: &str) -> &str {
    let name = word.rsplit(['/', '\\']).next().unwrap_or(word);
    name.strip_suffix(".exe").unwrap_or(name)
}

fn is_env_assignment(word: &str) -> bool {
    match word.split_once('=') {
        Some((name, _)) => {
            !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !name.starts_with(|c: char| c.is_ascii_digit())
        }
        None => false,
    }
}

/// First non-flag word
fn first_subcommand<'a>(words: &[&'a str]) -> Option<&'a str> {
    words.iter().copied().find(|w| !w.starts_with('-') && !w.starts_with('+'))
}

fn detect_in_words(words: &[&str]) -> Option<&'static str> {
    let mut words = words;
    while let Some(first) = words.first() {
        if is_env_assignment(first) {
            words = &words[1..];
        } else {
            break;
        }
    }
    let (first, rest) = words.split_first()?;
    let bin = binary_name(first);

    match bin {
        // Wrappers that run the next word
        "time" | "env" | "sudo" | "nice" | "exec" | "command" => detect_in_words(rest),
        "npx" | "bunx" | "pnpx" => {
            let skip = rest.iter().take_while(|w| w.starts_with('-')).count();
            detect_in_words(&rest[skip..])
        }
        "pnpm" => match rest.first().copied() {
            Some("exec") | Some("dlx") => detect_in_words(&rest[1..]),
            _ => None,
        },
        "yarn" => match rest.first().copied() {
            Some("run") | Some("install") | Some("add") | None => None,
            Some("dlx") | Some("exec") => detect_in_words(&rest[1..]),
            Some(_) => detect_in_words(rest),
        },
        "uv" | "poetry" | "pipenv" | "pdm" | "hatch" | "bundle" => match rest.first().copied() {
            Some("run") | Some("exec") => detect_in_words(&rest[1..]),
            _ => None,
        },
        "python" | "python3" | "py" => match rest {
            [flag, module, tail @ ..] if *flag == "-m" => {
                let mut inner = vec![*module];
                inner.extend_from_slice(tail);
                detect_in_words(&inner)
            }
            _ => None,
        },
        "go" => match first_subcommand(rest) {
            Some("test") => Some("go-test"),
            Some("build") | Some("run") | Some("vet") | Some("install") | Some("generate") => {
                Some("go")
            }
            _ => None,
        },
        "golangci-lint" => Some("golangci-lint"),
        "tsc" | "vue-tsc" => Some("typescript"),
        "eslint" => Some("eslint"),
        "cargo" => match first_subcommand(rest) {
            Some("test") | Some("nextest") | Some("t") => Some("cargo-test"),
            Some("clippy") => Some("clippy"),
            Some("build") | Some("check") | Some("run") | Some("b") | Some("c") => Some("cargo"),
            _ => None,
        },
        "rustc" => Some("rustc"),
        "pytest" | "py.test" => Some("pytest"),
        "mypy" | "dmypy" => Some("mypy"),
        "ruff" => Some("ruff"),
        "flake8" => Some("flake8"),
        "pylint" => Some("pylint"),
        "jest" => Some("jest"),
        "vitest" => Some("vitest"),
        "prettier" => Some("prettier"),
        "biome" => Some("biome"),
        "rubocop" => Some("rubocop"),
        "phpstan" => Some("phpstan"),
        "swiftlint" => Some("swiftlint"),
        "gradle" | "gradlew" => Some("gradle"),
        "mvn" | "mvnw" => Some("mvn"),
        "dotnet" => Some("dotnet"),
        _ => None,
    }
}

// ============================================================================
// Warnings
// ============================================================================

/// Join names as `A`, `A and B`, or `A, B, and C`
fn oxford_list(names: &[&str]) -> String {
    match names {
        [] => String::new(),
        [one] => one.to_string(),
        [a, b] => format!("{} and {}", a, b),
        [init @ .., last] => format!("{}, and {}", init.join(", "), last),
    }
}

/// Render a warning about tools without a dedicated parser
///
/// Returns an empty string when `unsupported` is empty.
pub fn format_unsupported_tools_warning(
    unsupported: &[DetectedTool],
    supported_ids: &[&str],
) -> String {
    if unsupported.is_empty() {
        return String::new();
    }
    let names: Vec<&str> = unsupported.iter().map(|t| t.display_name.as_str()).collect();
    let noun = if names.len() == 1 { "tool" } else { "tools" };
    let mut out = format!(
        "Unsupported {} detected: {}. Errors from {} will only be captured by the generic parser.",
        noun,
        oxford_list(&names),
        if names.len() == 1 { "it" } else { "them" }
    );
    if !supported_ids.is_empty() {
        out.push_str(&format!(" Supported tools: {}.", supported_ids.join(", ")));
    }
    out
}
