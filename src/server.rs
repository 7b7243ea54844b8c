use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::io::{BufRead, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{load_config, Config};
use crate::delegate::SidecarDelegate;
use crate::dispatch::{Dispatcher, RootScope, ToolDelegate};
use crate::dispatch_log::DispatchLog;
use crate::error::RootError;
use crate::guard::{absolutize, PathGuard};
use crate::logging::{parse_mcp_level, LevelSetter};
use crate::project::{
    path_from_file_uri, EnvSnapshot, IdeMetadata, Workspace, IDE_META_KEYS, PROJECT_ROOT_ENV, VSCODE_WORKSPACE_ENV,
};
use crate::prompts::{get_prompt, list_prompts};
use crate::protocol::{ErrorCode, ErrorObject, Method, Request, Response, PROTOCOL_VERSION};
use crate::registry::ToolRegistry;
use crate::resources::{list_resources, list_roots, read_resource};
use crate::tools::builtin_handlers;

pub const SERVER_NAME: &str = "kotlin-mcp-server";

/// All cross-request state. One request is handled to completion before the
/// next line is read, so nothing here needs locking.
pub struct ServerState {
    env: EnvSnapshot,
    guard: PathGuard,
    /// Server-wide config; replaced by the project's config on every re-bind.
    config: Config,
    workspace: Option<Workspace>,
    /// Every root ever bound, in binding order. Authorizes `resources/read`.
    allowed_roots: Vec<PathBuf>,
    dispatcher: Dispatcher,
    log_level: String,
    level_setter: Option<LevelSetter>,
}

impl ServerState {
    pub fn new(env: EnvSnapshot, guard: PathGuard) -> Self {
        let config = load_config(None, &env);
        let mut dispatcher = Dispatcher::new(ToolRegistry::builtin()).with_handlers(builtin_handlers());
        dispatcher.set_log(DispatchLog::new(config.dispatch_log.resolved_path()));
        Self {
            env,
            guard,
            log_level: config.log_level.clone(),
            config,
            workspace: None,
            allowed_roots: Vec::new(),
            dispatcher: dispatcher.with_delegate(Box::new(SidecarDelegate)),
            level_setter: None,
        }
    }

    pub fn with_delegate(mut self, delegate: Box<dyn ToolDelegate>) -> Self {
        self.dispatcher = self.dispatcher.with_delegate(delegate);
        self
    }

    pub fn with_level_setter(mut self, setter: LevelSetter) -> Self {
        self.level_setter = Some(setter);
        self
    }

    pub fn project_root(&self) -> Option<&Path> {
        self.workspace.as_ref().map(|w| w.root())
    }

    pub fn allowed_roots(&self) -> &[PathBuf] {
        &self.allowed_roots
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Bind (or re-bind) the project root. Path-scoped state is rebuilt from
    /// scratch: a fresh workspace, its config and the dispatch log sink.
    pub fn set_project_root(&mut self, root: impl AsRef<Path>) -> Result<(), RootError> {
        let root = absolutize(root.as_ref(), self.guard.server_cwd());
        if !root.is_dir() {
            return Err(RootError::Invalid(root));
        }
        self.guard.assert_not_server_cwd(&root)?;

        let workspace = Workspace::open(root.clone(), &self.env);
        self.config = workspace.config().clone();
        self.dispatcher
            .set_log(DispatchLog::new(self.config.dispatch_log.resolved_path()));
        if !self.allowed_roots.contains(&root) {
            self.allowed_roots.push(root.clone());
        }
        self.workspace = Some(workspace);
        info!(root = %root.display(), "project root bound");
        Ok(())
    }

    /// IDE metadata seen by tool calls: the currently bound root, if any.
    pub fn ide_metadata(&self) -> Option<IdeMetadata> {
        let root = self.project_root()?;
        let mut meta = IdeMetadata::new();
        meta.insert("projectRoot".to_string(), json!(root));
        Some(meta)
    }

    /// Handle one transport line. `None` means nothing is written back.
    pub fn handle_line(&mut self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let response = match serde_json::from_str::<Value>(line) {
            Ok(value) => self.handle_value(value)?,
            Err(e) => Response::failure(
                Value::Null,
                ErrorObject::new(ErrorCode::ParseError, format!("Parse error: {e}")),
            ),
        };
        match serde_json::to_string(&response) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(error = %e, "failed to serialize response");
                None
            }
        }
    }

    fn handle_value(&mut self, value: Value) -> Option<Response> {
        let id = value.get("id").cloned().unwrap_or(Value::Null);
        let request: Request = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                return Some(Response::failure(
                    id,
                    ErrorObject::new(ErrorCode::InvalidParams, format!("Invalid request: {e}")),
                ))
            }
        };
        if request.is_notification() {
            debug!(method = %request.method, "notification ignored");
            return None;
        }
        Some(self.handle_request(request))
    }

    pub fn handle_request(&mut self, request: Request) -> Response {
        let id = request.id.clone().unwrap_or(Value::Null);
        let Some(method) = Method::parse(&request.method) else {
            return Response::failure(
                id,
                ErrorObject::new(ErrorCode::MethodNotFound, format!("Method not found: {}", request.method))
                    .with_data(json!({ "method": request.method })),
            );
        };

        let params = match request.params {
            None | Some(Value::Null) => json!({}),
            Some(p @ Value::Object(_)) => p,
            Some(_) => {
                return Response::failure(id, ErrorObject::new(ErrorCode::InvalidParams, "params must be an object"))
            }
        };

        let outcome = match method {
            Method::Initialize => Ok(self.initialize(&params)),
            Method::Ping => Ok(json!({})),
            Method::ListTools => Ok(self.dispatcher.registry().list_result()),
            Method::CallTool => self.call_tool(params),
            Method::ListResources => Ok(list_resources(self.project_root())),
            Method::ReadResource => {
                read_resource(&params, &self.allowed_roots, self.config().effective_max_file_bytes())
            }
            Method::ListRoots => Ok(list_roots(&self.allowed_roots)),
            Method::ListPrompts => Ok(list_prompts()),
            Method::GetPrompt => get_prompt(&params),
            Method::SetLogLevel => self.set_log_level(&params),
        };

        match outcome {
            Ok(result) => Response::success(id, result),
            Err(error) => Response::failure(id, error),
        }
    }

    fn initialize(&mut self, params: &Value) -> Value {
        if let Some(hint) = root_hint(params, &self.env) {
            let root = absolutize(Path::new(&hint), self.guard.server_cwd());
            if self.project_root() != Some(root.as_path()) {
                if let Err(e) = self.set_project_root(&root) {
                    warn!(error = %e, "ignoring workspace hint from initialize");
                }
            }
        }

        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": false },
                "resources": { "subscribe": false, "listChanged": false },
                "prompts": { "listChanged": false },
                "logging": {},
                "roots": { "listChanged": false }
            },
            "serverInfo": { "name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION") }
        })
    }

    fn call_tool(&mut self, params: Value) -> Result<Value, ErrorObject> {
        let Some(name) = params.get("name").and_then(|n| n.as_str()).filter(|n| !n.is_empty()) else {
            return Err(ErrorObject::new(ErrorCode::InvalidParams, "Missing tool name"));
        };
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        let ide_meta = self.ide_metadata();
        let scope = RootScope {
            env: &self.env,
            guard: &self.guard,
            ide_meta: ide_meta.as_ref(),
            bound: self.workspace.as_ref(),
        };
        Ok(self.dispatcher.dispatch(name, arguments, &scope))
    }

    fn set_log_level(&mut self, params: &Value) -> Result<Value, ErrorObject> {
        let requested = params.get("level").and_then(|l| l.as_str()).unwrap_or_default();
        let Some(level) = parse_mcp_level(requested) else {
            return Err(ErrorObject::new(ErrorCode::InvalidParams, format!("Unknown log level: {requested}"))
                .with_data(json!({ "level": requested })));
        };
        if let Some(setter) = &self.level_setter {
            setter(level).map_err(|e| ErrorObject::new(ErrorCode::ServerError, format!("{e:#}")))?;
        }
        self.log_level = requested.to_ascii_lowercase();
        info!(level = %self.log_level, "log level changed");
        Ok(json!({}))
    }

    /// Read-process-write until `reader` hits EOF.
    pub fn serve<R: BufRead, W: Write>(&mut self, reader: R, mut writer: W) -> Result<()> {
        for line in reader.lines() {
            let reply = match line {
                Ok(line) => self.handle_line(&line),
                // The offending line is already consumed; answer it and keep reading.
                Err(e) if e.kind() == ErrorKind::InvalidData => {
                    warn!(error = %e, "request line is not valid UTF-8");
                    let response = Response::failure(
                        Value::Null,
                        ErrorObject::new(ErrorCode::ParseError, format!("Parse error: {e}")),
                    );
                    serde_json::to_string(&response).ok()
                }
                Err(e) => return Err(e).context("Failed to read request line"),
            };
            if let Some(reply) = reply {
                writeln!(writer, "{reply}")?;
                writer.flush()?;
            }
        }
        Ok(())
    }
}

/// Workspace hint from `initialize` params, falling back to the environment.
///
/// Order: `roots[0].uri` (or a bare `roots[0]` string), the same for
/// `workspaceFolders[0]`,
/// `capabilities.workspace.rootUri|rootPath`, top-level IDE keys, then
/// `PROJECT_PATH`, `VSCODE_WORKSPACE_FOLDER`, `WORKSPACE_PATH`.
pub fn root_hint(params: &Value, env: &EnvSnapshot) -> Option<String> {
    let uri_path = |v: Option<&Value>| -> Option<String> {
        let s = v?.as_str()?.trim();
        let path = path_from_file_uri(s).unwrap_or(s);
        (!path.is_empty()).then(|| path.to_string())
    };

    uri_path(params.pointer("/roots/0/uri"))
        .or_else(|| uri_path(params.pointer("/roots/0")))
        .or_else(|| uri_path(params.pointer("/workspaceFolders/0/uri")))
        .or_else(|| uri_path(params.pointer("/workspaceFolders/0")))
        .or_else(|| uri_path(params.pointer("/capabilities/workspace/rootUri")))
        .or_else(|| uri_path(params.pointer("/capabilities/workspace/rootPath")))
        .or_else(|| IDE_META_KEYS.iter().find_map(|k| uri_path(params.get(*k))))
        .or_else(|| {
            [PROJECT_ROOT_ENV[0], VSCODE_WORKSPACE_ENV, PROJECT_ROOT_ENV[1]]
                .iter()
                .find_map(|k| env.get(k).map(|v| v.trim().to_string()))
        })
}

pub fn run_stdio_server(mut state: ServerState) -> Result<()> {
    info!(
        root = ?state.project_root(),
        tools = state.dispatcher.registry().len(),
        "serving MCP over stdio"
    );
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    state.serve(stdin.lock(), stdout.lock())?;
    info!("stdin closed, shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn env() -> EnvSnapshot {
        [("MCP_DISPATCH_LOG", "off")].into_iter().collect()
    }

    fn state() -> ServerState {
        ServerState::new(env(), PathGuard::new("/definitely/not/a/project"))
    }

    fn call(state: &mut ServerState, request: Value) -> Value {
        let reply = state.handle_line(&request.to_string()).expect("a reply");
        serde_json::from_str(&reply).unwrap()
    }

    fn android_project() -> TempDir {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("settings.gradle.kts"), "rootProject.name = \"demo\"\n").unwrap();
        std::fs::create_dir_all(tmp.path().join("app/src/main/java")).unwrap();
        std::fs::write(
            tmp.path().join("app/src/main/java/MainActivity.kt"),
            "class MainActivity {\n    // TODO: hook up navigation\n    fun onCreate() {}\n}\n",
        )
        .unwrap();
        tmp
    }

    fn initialize(state: &mut ServerState, root: &Path) -> Value {
        call(
            state,
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize",
                   "params": {"roots": [{"uri": format!("file://{}", root.display())}]}}),
        )
    }

    #[test]
    fn tools_list_both_spellings() {
        let mut s = state();
        let a = call(&mut s, json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}));
        let b = call(&mut s, json!({"jsonrpc": "2.0", "id": 1, "method": "list_tools"}));
        assert_eq!(a, b);
        let tools = a["result"]["tools"].as_array().unwrap();
        assert!(!tools.is_empty());
        assert!(tools.iter().all(|t| t.get("name").is_some() && t.get("inputSchema").is_some()));
    }

    #[test]
    fn unknown_method_echoes_name() {
        let mut s = state();
        let out = call(&mut s, json!({"jsonrpc": "2.0", "id": "x", "method": "bogus/method"}));
        assert_eq!(out["error"]["code"], -32601);
        assert_eq!(out["error"]["data"]["method"], "bogus/method");
        assert_eq!(out["id"], "x");
        assert!(out.get("result").is_none());
    }

    #[test]
    fn malformed_json_is_a_parse_error_without_id() {
        let mut s = state();
        let out: Value = serde_json::from_str(&s.handle_line("{\"jsonrpc\": \"2.0\", \"id\": 3,").unwrap()).unwrap();
        assert_eq!(out["error"]["code"], -32700);
        assert_eq!(out["id"], Value::Null);
    }

    #[test]
    fn malformed_envelopes_are_invalid_params() {
        let mut s = state();
        let out = call(&mut s, json!({"jsonrpc": "2.0", "id": 5}));
        assert_eq!(out["error"]["code"], -32602);
        assert_eq!(out["id"], 5);

        let out = call(&mut s, json!({"jsonrpc": "2.0", "id": 6, "method": "tools/call", "params": [1]}));
        assert_eq!(out["error"]["code"], -32602);

        let out = call(&mut s, json!({"jsonrpc": "2.0", "id": 7, "method": "tools/call", "params": {}}));
        assert_eq!(out["error"]["code"], -32602);
        assert!(out["error"]["message"].as_str().unwrap().contains("tool name"));
    }

    #[test]
    fn notifications_and_blank_lines_get_no_reply() {
        let mut s = state();
        assert!(s.handle_line(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string()).is_none());
        assert!(s.handle_line("   ").is_none());
    }

    #[test]
    fn initialize_binds_root_from_roots_hint() {
        let tmp = android_project();
        let mut s = state();
        let out = initialize(&mut s, tmp.path());
        assert_eq!(out["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(out["result"]["capabilities"]["resources"]["subscribe"], false);
        assert_eq!(s.project_root(), Some(tmp.path()));

        let roots = call(&mut s, json!({"jsonrpc": "2.0", "id": 2, "method": "roots/list"}));
        assert_eq!(roots["result"]["roots"].as_array().unwrap().len(), 1);

        let resources = call(&mut s, json!({"jsonrpc": "2.0", "id": 3, "method": "resources/list"}));
        assert_eq!(resources["result"]["resources"][0]["name"], "settings.gradle.kts");
    }

    #[test]
    fn rebinding_appends_allowed_roots() {
        let first = android_project();
        let second = android_project();
        let mut s = state();
        initialize(&mut s, first.path());
        initialize(&mut s, second.path());
        initialize(&mut s, first.path());
        assert_eq!(s.allowed_roots(), &[first.path().to_path_buf(), second.path().to_path_buf()]);
        assert_eq!(s.project_root(), Some(first.path()));
    }

    #[test]
    fn invalid_hint_keeps_previous_root() {
        let tmp = android_project();
        let mut s = state();
        initialize(&mut s, tmp.path());
        initialize(&mut s, Path::new("/definitely/missing/dir"));
        assert_eq!(s.project_root(), Some(tmp.path()));
    }

    #[test]
    fn server_cwd_cannot_be_bound() {
        let tmp = android_project();
        let mut s = ServerState::new(env(), PathGuard::new(tmp.path()));
        assert!(matches!(s.set_project_root(tmp.path()), Err(RootError::ServerCwdMisuse(_))));
        assert!(s.project_root().is_none());
    }

    #[test]
    fn tool_call_runs_against_bound_root() {
        let tmp = android_project();
        let mut s = state();
        initialize(&mut s, tmp.path());
        let out = call(
            &mut s,
            json!({"jsonrpc": "2.0", "id": 9, "method": "tools/call",
                   "params": {"name": "todoListFromCode", "arguments": {}}}),
        );
        let result = &out["result"];
        assert!(result.get("isError").is_none());
        let payload: Value = serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(payload["total"], 1);
        assert_eq!(payload["items"][0]["file"], "app/src/main/java/MainActivity.kt");
        assert_eq!(s.dispatcher().tracker().active_count(), 0);
    }

    #[test]
    fn tool_call_without_root_is_an_error_result() {
        let mut s = state();
        let out = call(
            &mut s,
            json!({"jsonrpc": "2.0", "id": 10, "method": "call_tool",
                   "params": {"name": "gitStatus", "arguments": {}}}),
        );
        assert_eq!(out["result"]["isError"], true);
        assert!(out["result"]["content"][0]["text"].as_str().unwrap().contains("ProjectRootRequired"));
    }

    #[test]
    fn validation_failures_name_the_field() {
        let tmp = android_project();
        let mut s = state();
        initialize(&mut s, tmp.path());
        let out = call(
            &mut s,
            json!({"jsonrpc": "2.0", "id": 11, "method": "tools/call",
                   "params": {"name": "projectSearch", "arguments": {}}}),
        );
        assert_eq!(out["result"]["isError"], true);
        assert!(out["result"]["content"][0]["text"].as_str().unwrap().contains("query"));
    }

    #[test]
    fn read_resource_respects_allowed_roots() {
        let tmp = android_project();
        let mut s = state();
        initialize(&mut s, tmp.path());
        let uri = format!("file://{}", tmp.path().join("settings.gradle.kts").display());
        let ok = call(&mut s, json!({"jsonrpc": "2.0", "id": 12, "method": "resources/read", "params": {"uri": uri}}));
        assert!(ok["result"]["contents"][0]["text"].as_str().unwrap().contains("demo"));

        let denied = call(&mut s, json!({"jsonrpc": "2.0", "id": 13, "method": "resources/read", "params": {"uri": "file:///etc/hostname"}}));
        assert!(denied.get("error").is_some());
    }

    #[test]
    fn prompts_and_log_level() {
        let mut s = state();
        let list = call(&mut s, json!({"jsonrpc": "2.0", "id": 14, "method": "prompts/list"}));
        assert_eq!(list["result"]["prompts"].as_array().unwrap().len(), 3);

        let unknown = call(&mut s, json!({"jsonrpc": "2.0", "id": 15, "method": "prompts/get", "params": {"name": "nope"}}));
        assert_eq!(unknown["error"]["code"], -32602);

        let ok = call(&mut s, json!({"jsonrpc": "2.0", "id": 16, "method": "logging/setLevel", "params": {"level": "warning"}}));
        assert_eq!(ok["result"], json!({}));
        assert_eq!(s.log_level(), "warning");

        let bad = call(&mut s, json!({"jsonrpc": "2.0", "id": 17, "method": "logging/setLevel", "params": {"level": "loud"}}));
        assert_eq!(bad["error"]["code"], -32602);
    }

    #[test]
    fn ping_and_response_round_trip() {
        let mut s = state();
        let reply = s.handle_line(&json!({"jsonrpc": "2.0", "id": 20, "method": "ping"}).to_string()).unwrap();
        let parsed: Response = serde_json::from_str(&reply).unwrap();
        assert_eq!(parsed, Response::success(json!(20), json!({})));
        assert_eq!(serde_json::to_string(&parsed).unwrap(), reply);
    }

    #[test]
    fn root_hint_priority() {
        let env: EnvSnapshot = [("PROJECT_PATH", "/from/env"), ("VSCODE_WORKSPACE_FOLDER", "/from/vscode")]
            .into_iter()
            .collect();
        let params = json!({
            "workspaceFolders": [{"uri": "file:///from/folders"}],
            "capabilities": {"workspace": {"rootUri": "file:///from/caps"}}
        });
        assert_eq!(root_hint(&params, &env).as_deref(), Some("/from/folders"));
        assert_eq!(
            root_hint(&json!({"capabilities": {"workspace": {"rootPath": "/from/path"}}}), &env).as_deref(),
            Some("/from/path")
        );
        assert_eq!(root_hint(&json!({"workspaceRoot": "/from/ide"}), &env).as_deref(), Some("/from/ide"));
        assert_eq!(root_hint(&json!({}), &env).as_deref(), Some("/from/env"));
        let vscode_only: EnvSnapshot = [("VSCODE_WORKSPACE_FOLDER", "/from/vscode")].into_iter().collect();
        assert_eq!(root_hint(&json!({}), &vscode_only).as_deref(), Some("/from/vscode"));
        assert_eq!(root_hint(&json!({}), &EnvSnapshot::default()), None);
    }

    #[test]
    fn root_hint_accepts_bare_string_entries() {
        let env = EnvSnapshot::default();
        assert_eq!(
            root_hint(&json!({"roots": ["file:///from/roots"]}), &env).as_deref(),
            Some("/from/roots")
        );
        assert_eq!(
            root_hint(&json!({"workspaceFolders": ["/from/folders"]}), &env).as_deref(),
            Some("/from/folders")
        );
        assert_eq!(
            root_hint(&json!({"roots": [{"name": "no uri"}], "workspaceFolders": ["/fallback"]}), &env).as_deref(),
            Some("/fallback")
        );
    }

    #[test]
    fn serve_loop_stops_at_eof() {
        let mut s = state();
        let input = "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n\nnot json\n";
        let mut out = Vec::new();
        s.serve(input.as_bytes(), &mut out).unwrap();
        let lines: Vec<&str> = std::str::from_utf8(&out).unwrap().lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("-32700"));
    }

    #[test]
    fn serve_answers_invalid_utf8_and_keeps_going() {
        let mut s = state();
        let mut input = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n".to_vec();
        input.extend_from_slice(b"\xff\xfe garbage\n");
        input.extend_from_slice(b"{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}\n");
        let mut out = Vec::new();
        s.serve(&input[..], &mut out).unwrap();

        let replies: Vec<Value> = std::str::from_utf8(&out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(replies.len(), 3);
        assert_eq!(replies[0]["id"], 1);
        assert_eq!(replies[1]["error"]["code"], -32700);
        assert!(replies[1]["id"].is_null());
        assert_eq!(replies[2]["id"], 2);
        assert_eq!(replies[2]["result"], json!({}));
    }
}
