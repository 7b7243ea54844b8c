//! JSON-RPC envelopes and the MCP tool-result shape.
//!
//! Every response carries exactly one of `result` / `error`; [`Outcome`] makes
//! the other state unrepresentable.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// The reserved error codes this server emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ParseError,
    MethodNotFound,
    InvalidParams,
    ServerError,
}

impl ErrorCode {
    pub const fn code(self) -> i64 {
        match self {
            ErrorCode::ParseError => -32700,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::ServerError => -32000,
        }
    }
}

/// Methods understood by the adapter. Alternate spellings collapse onto one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Initialize,
    Ping,
    ListTools,
    CallTool,
    ListResources,
    ReadResource,
    ListRoots,
    ListPrompts,
    GetPrompt,
    SetLogLevel,
}

impl Method {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "initialize" => Method::Initialize,
            "ping" => Method::Ping,
            "tools/list" | "list_tools" => Method::ListTools,
            "tools/call" | "call_tool" => Method::CallTool,
            "resources/list" => Method::ListResources,
            "resources/read" => Method::ReadResource,
            "roots/list" => Method::ListRoots,
            "prompts/list" => Method::ListPrompts,
            "prompts/get" => Method::GetPrompt,
            "logging/setLevel" => Method::SetLogLevel,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    /// `null` and an absent id both deserialize to `None`.
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

impl Request {
    pub fn is_notification(&self) -> bool {
        self.id.is_none() && self.method.starts_with("notifications/")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Result(Value),
    Error(ErrorObject),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl Response {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            outcome: Outcome::Result(result),
        }
    }

    pub fn failure(id: Value, error: ErrorObject) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            outcome: Outcome::Error(error),
        }
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Result(v) => Some(v),
            Outcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorObject> {
        match &self.outcome {
            Outcome::Result(_) => None,
            Outcome::Error(e) => Some(e),
        }
    }
}

/// `{content: [{type: "text", text}]}`.
pub fn text_result(text: impl Into<String>) -> Value {
    json!({ "content": [{ "type": "text", "text": text.into() }] })
}

/// Error-flagged tool result. `kind` lets clients tell failure classes apart.
pub fn error_result(text: impl Into<String>, kind: &str) -> Value {
    json!({
        "content": [{ "type": "text", "text": text.into() }],
        "isError": true,
        "_meta": { "errorKind": kind }
    })
}

/// True when `value` already has the tool-result shape (an object whose
/// `content` is a non-empty array of typed items).
pub fn is_tool_envelope(value: &Value) -> bool {
    value
        .get("content")
        .and_then(|c| c.as_array())
        .is_some_and(|items| {
            !items.is_empty()
                && items
                .iter()
                .all(|item| item.get("type").and_then(|t| t.as_str()).is_some())
        })
}

/// Wrap a handler's raw result. Already-wrapped results pass through untouched.
pub fn wrap_tool_result(value: Value) -> Value {
    if is_tool_envelope(&value) {
        return value;
    }
    let text = match value {
        Value::String(s) => s,
        other => serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string()),
    };
    text_result(text)
}
