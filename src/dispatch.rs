//! Tool dispatch: validation, routing, operation lifecycle and envelope
//! normalization. Nothing raised by a handler escapes `Dispatcher::dispatch`.

use anyhow::Result;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::dispatch_log::DispatchLog;
use crate::error::{RootError, ToolError};
use crate::guard::{validate_path_under_project, PathGuard};
use crate::operations::{OperationId, OperationRecord, OperationTracker, ProgressEvent};
use crate::project::{resolve_project_root, EnvSnapshot, IdeMetadata, Workspace};
use crate::protocol::{error_result, wrap_tool_result};
use crate::registry::ToolRegistry;
use crate::schema::ValidationError;

/// Everything a handler may touch while it runs.
pub struct ToolCall<'a> {
    pub name: &'a str,
    pub args: &'a Map<String, Value>,
    pub workspace: &'a Workspace,
    pub registry: &'a ToolRegistry,
    operation_id: OperationId,
    tracker: &'a mut OperationTracker,
}

impl<'a> ToolCall<'a> {
    pub fn new(
        name: &'a str,
        args: &'a Map<String, Value>,
        workspace: &'a Workspace,
        registry: &'a ToolRegistry,
        operation_id: OperationId,
        tracker: &'a mut OperationTracker,
    ) -> Self {
        Self {
            name,
            args,
            workspace,
            registry,
            operation_id,
            tracker,
        }
    }

    pub fn operation_id(&self) -> OperationId {
        self.operation_id
    }

    pub fn operation(&self) -> Option<&OperationRecord> {
        self.tracker.get(self.operation_id)
    }

    /// Report progress for this call. Values must stay within 0..=100 and
    /// never decrease.
    pub fn progress(&mut self, percent: i64, message: &str) -> Result<()> {
        self.tracker.progress(self.operation_id, percent, message)?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        self.workspace.root()
    }

    pub fn config(&self) -> &Config {
        self.workspace.config()
    }

    /// Resolve a caller-supplied path and require it to stay inside the root.
    pub fn path_under_project(&self, path: &str) -> Result<PathBuf> {
        Ok(validate_path_under_project(path, self.root())?)
    }
}

/// A built-in handler. Errors become error-flagged envelopes.
pub type ToolHandler = fn(&mut ToolCall<'_>) -> Result<Value>;

/// Fallback executor for tools without a built-in handler.
pub trait ToolDelegate {
    /// `None` means no backend could take the call.
    fn execute(&self, call: &mut ToolCall<'_>) -> Option<Result<Value>>;
}

/// Inputs for resolving the project root of one call.
pub struct RootScope<'a> {
    pub env: &'a EnvSnapshot,
    pub guard: &'a PathGuard,
    pub ide_meta: Option<&'a IdeMetadata>,
    /// Currently bound workspace; reused when the call resolves to its root.
    pub bound: Option<&'a Workspace>,
}

impl RootScope<'_> {
    pub fn resolve(&self, args: &Map<String, Value>) -> Result<Workspace, RootError> {
        let root = resolve_project_root(args, self.env, self.ide_meta, self.guard.server_cwd())?;
        self.guard.assert_not_server_cwd(&root)?;
        match self.bound {
            Some(ws) if ws.root() == root => Ok(ws.clone()),
            _ => Ok(Workspace::open(root, self.env)),
        }
    }
}

pub struct Dispatcher {
    registry: ToolRegistry,
    handlers: HashMap<&'static str, ToolHandler>,
    delegate: Option<Box<dyn ToolDelegate>>,
    tracker: OperationTracker,
    log: DispatchLog,
}

impl Dispatcher {
    pub fn new(registry: ToolRegistry) -> Self {
        let mut tracker = OperationTracker::new();
        tracker.subscribe(|e: &ProgressEvent| {
            debug!(tool = %e.tool, operation_id = %e.id, progress = e.progress, phase = ?e.phase, "{}", e.message);
        });
        Self {
            registry,
            handlers: HashMap::new(),
            delegate: None,
            tracker,
            log: DispatchLog::disabled(),
        }
    }

    pub fn with_handlers(mut self, handlers: impl IntoIterator<Item = (&'static str, ToolHandler)>) -> Self {
        self.handlers.extend(handlers);
        self
    }

    pub fn with_delegate(mut self, delegate: Box<dyn ToolDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    pub fn set_log(&mut self, log: DispatchLog) {
        self.log = log;
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn tracker(&self) -> &OperationTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut OperationTracker {
        &mut self.tracker
    }

    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Run one tool call and return its `tools/call` result payload.
    pub fn dispatch(&mut self, name: &str, arguments: Value, scope: &RootScope<'_>) -> Value {
        let started = Instant::now();
        let id = self.tracker.begin(name);
        self.log.start(name, id);
        info!(tool = name, operation_id = %id, "tool call started");

        let outcome = self.run(name, id, arguments, scope);
        let elapsed = started.elapsed();

        match outcome {
            Ok(result) => {
                if let Err(e) = self.tracker.progress(id, 100, "Completed") {
                    debug!(tool = name, operation_id = %id, error = %e, "final progress not recorded");
                }
                self.tracker.complete(id);
                self.log.end(name, id, "ok", elapsed);
                info!(tool = name, operation_id = %id, elapsed_ms = elapsed.as_millis() as u64, "tool call completed");
                wrap_tool_result(result)
            }
            Err(err) => {
                match &err {
                    ToolError::Failed(e) => {
                        error!(tool = name, operation_id = %id, error = %format!("{e:#}"), "tool call failed")
                    }
                    other => warn!(tool = name, operation_id = %id, kind = other.kind(), error = %other, "tool call rejected"),
                }
                self.tracker.fail(id, &err.to_string());
                self.log.end(name, id, err.kind(), elapsed);
                error_result(&err.envelope_text(name), err.kind())
            }
        }
    }

    fn run(&mut self, name: &str, id: OperationId, arguments: Value, scope: &RootScope<'_>) -> Result<Value, ToolError> {
        self.tracker
            .progress(id, 0, &format!("Starting {name}"))
            .map_err(anyhow::Error::from)?;

        let arguments = if arguments.is_null() { json!({}) } else { arguments };
        self.registry.validate_arguments(name, &arguments)?;
        let Value::Object(args) = arguments else {
            return Err(ValidationError::new("arguments", "expected an object").into());
        };

        if let Some(handler) = self.handlers.get(name).copied() {
            let workspace = scope.resolve(&args)?;
            let mut call = ToolCall::new(name, &args, &workspace, &self.registry, id, &mut self.tracker);
            return handler(&mut call).map_err(from_handler);
        }

        let Some(delegate) = self.delegate.as_deref() else {
            return Err(not_routable(&self.registry, name));
        };
        let workspace = scope.resolve(&args)?;
        let mut call = ToolCall::new(name, &args, &workspace, &self.registry, id, &mut self.tracker);
        match delegate.execute(&mut call) {
            Some(result) => result.map_err(from_handler),
            None => Err(not_routable(&self.registry, name)),
        }
    }
}

fn not_routable(registry: &ToolRegistry, name: &str) -> ToolError {
    if registry.contains(name) {
        ToolError::Unavailable(name.to_string())
    } else {
        ToolError::UnknownTool(name.to_string())
    }
}

/// Keep root and validation failures typed when a handler bubbles them up
/// through `anyhow`.
fn from_handler(e: anyhow::Error) -> ToolError {
    if let Some(root) = e.downcast_ref::<RootError>() {
        return ToolError::Root(root.clone());
    }
    if let Some(v) = e.downcast_ref::<ValidationError>() {
        return ToolError::Validation(v.clone());
    }
    ToolError::Failed(e)
}
