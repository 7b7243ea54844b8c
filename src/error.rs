use std::path::PathBuf;

use thiserror::Error;

use crate::schema::ValidationError;

/// Failures from project-root resolution and path containment checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RootError {
    #[error(
        "ProjectRootRequired: pass `project_root` or set env PROJECT_PATH; IDE workspace will be used if available"
    )]
    Required,
    #[error("ProjectRootInvalid: {} not found or not a directory", .0.display())]
    Invalid(PathBuf),
    #[error(
        "ServerCwdMisuse: tool attempted to operate in server CWD ({}). Resolve project_root and use that instead",
        .0.display()
    )]
    ServerCwdMisuse(PathBuf),
    #[error("Path {path} is outside project root {}", .root.display())]
    OutsideProject { path: String, root: PathBuf },
}

/// Everything that can turn a tool call into an error-flagged result.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Root(#[from] RootError),
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Tool {0} is not available: no handler or sidecar delegate is configured")]
    Unavailable(String),
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl ToolError {
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::Validation(_) => "validation",
            ToolError::Root(_) => "project_root",
            ToolError::UnknownTool(_) => "unknown_tool",
            ToolError::Unavailable(_) => "tool_unavailable",
            ToolError::Failed(_) => "execution_failed",
        }
    }

    /// Text placed in the error-flagged envelope.
    pub fn envelope_text(&self, tool: &str) -> String {
        match self {
            ToolError::Validation(e) => format!("Validation error in {tool}: {e}"),
            ToolError::Root(e) => format!("{tool}: {e}"),
            ToolError::UnknownTool(_) | ToolError::Unavailable(_) => self.to_string(),
            ToolError::Failed(e) => format!("Error executing tool {tool}: {e:#}"),
        }
    }
}
