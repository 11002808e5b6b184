//! Per-line parse context
//!
//! A [`ParseContext`] carries the hints an external boundary-marker
//! mechanism resolved for a line: which job and step produced it, and
//! optionally which tool. The extractor never derives these from log text.

use crate::error::WorkflowContext;

/// Caller-supplied hints for parsing one line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseContext {
    /// Job identifier
    pub job: Option<String>,
    /// Step name
    pub step: Option<String>,
    /// Explicit tool or parser id; bypasses confidence competition
    pub tool: Option<String>,
    /// File most recently announced by the tool, for formats that print
    /// the file once and omit it on detail lines
    pub last_file: Option<String>,
    /// Repository root as seen by the CI runner
    pub base_path: Option<String>,
    /// Job/step copied into every error produced under this context
    pub workflow_context: Option<WorkflowContext>,
}

impl ParseContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context for a job/step pair, with matching workflow context
    pub fn for_step(job: impl Into<String>, step: impl Into<String>) -> Self {
        let job = job.into();
        let step = step.into();
        Self {
            workflow_context: Some(WorkflowContext::new(job.clone(), step.clone())),
            job: Some(job),
            step: Some(step),
            ..Self::default()
        }
    }

    /// Set the tool hint
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    /// Set the last announced file
    pub fn with_last_file(mut self, file: impl Into<String>) -> Self {
        self.last_file = Some(file.into());
        self
    }

    /// Set the base path
    pub fn with_base_path(mut self, base: impl Into<String>) -> Self {
        self.base_path = Some(base.into());
        self
    }

    /// Set the workflow context
    pub fn with_workflow_context(mut self, ctx: WorkflowContext) -> Self {
        self.workflow_context = Some(ctx);
        self
    }

    /// Make a tool-reported path relative to `base_path`
    ///
    /// Paths outside the base path, and all paths when no base path is
    /// set, are returned unchanged.
    pub fn relativize(&self, file: &str) -> String {
        let Some(base) = self.base_path.as_deref() else {
            return file.to_string();
        };
        let base = base.trim_end_matches(['/', '\\']);
        if base.is_empty() {
            return file.to_string();
        }
        match file.strip_prefix(base) {
            Some(rest) if rest.starts_with(['/', '\\']) => rest[1..].to_string(),
            _ => file.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relativize_strips_base() {
        let ctx = ParseContext::new().with_base_path("/home/runner/work/app/app/");
        assert_eq!(
            ctx.relativize("/home/runner/work/app/app/src/main.go"),
            "src/main.go"
        );
    }

    #[test]
    fn test_relativize_keeps_foreign_paths() {
        let ctx = ParseContext::new().with_base_path("/repo");
        assert_eq!(ctx.relativize("/repository/x.py"), "/repository/x.py");
        assert_eq!(ctx.relativize("src/x.py"), "src/x.py");
    }

    #[test]
    fn test_relativize_without_base() {
        let ctx = ParseContext::new();
        assert_eq!(ctx.relativize("/app/utils.py"), "/app/utils.py");
    }

    #[test]
    fn test_for_step_sets_workflow_context() {
        let ctx = ParseContext::for_step("build", "Run tests");
        assert_eq!(ctx.job.as_deref(), Some("build"));
        assert_eq!(
            ctx.workflow_context,
            Some(WorkflowContext::new("build", "Run tests"))
        );
    }
}
