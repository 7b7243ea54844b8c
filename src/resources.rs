//! `resources/*` and `roots/list`.

use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use crate::guard::is_path_allowed;
use crate::project::path_from_file_uri;
use crate::protocol::{ErrorCode, ErrorObject};

/// Project files worth offering as resources, relative to the root.
pub const COMMON_FILES: [&str; 9] = [
    "build.gradle",
    "build.gradle.kts",
    "app/build.gradle",
    "app/build.gradle.kts",
    "AndroidManifest.xml",
    "app/src/main/AndroidManifest.xml",
    "gradle.properties",
    "settings.gradle",
    "settings.gradle.kts",
];

fn file_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// Result for `resources/list`. Without a bound root there is nothing to list.
pub fn list_resources(root: Option<&Path>) -> Value {
    let resources: Vec<Value> = root
        .map(|root| {
            COMMON_FILES
                .iter()
                .filter(|rel| root.join(rel).is_file())
                .map(|rel| {
                    json!({
                        "uri": file_uri(&root.join(rel)),
                        "name": rel,
                        "description": format!("Android project file: {rel}"),
                        "mimeType": "text/plain",
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    json!({ "resources": resources })
}

/// Result for `resources/read`: `params.uri` must be a `file://` URI inside
/// one of `allowed_roots`, no larger than `max_bytes`.
pub fn read_resource(params: &Value, allowed_roots: &[PathBuf], max_bytes: u64) -> Result<Value, ErrorObject> {
    let uri = params
        .get("uri")
        .and_then(|u| u.as_str())
        .ok_or_else(|| ErrorObject::new(ErrorCode::InvalidParams, "Missing resource uri"))?;
    let path = path_from_file_uri(uri)
        .ok_or_else(|| ErrorObject::new(ErrorCode::InvalidParams, "Only file:// URIs are supported"))?;

    let path = Path::new(path);
    if !is_path_allowed(path, allowed_roots) {
        return Err(ErrorObject::new(ErrorCode::ServerError, "Access denied: file outside allowed roots")
            .with_data(json!({ "uri": uri })));
    }

    let read_failed = |e: std::io::Error| {
        ErrorObject::new(ErrorCode::ServerError, format!("Failed to read resource: {e}")).with_data(json!({ "uri": uri }))
    };
    let bytes = std::fs::metadata(path).map_err(read_failed)?.len();
    if bytes > max_bytes {
        return Err(ErrorObject::new(
            ErrorCode::ServerError,
            format!("Resource is too large: {bytes} bytes (limit {max_bytes})"),
        )
        .with_data(json!({ "uri": uri, "bytes": bytes, "limit": max_bytes })));
    }

    let text = std::fs::read_to_string(path).map_err(read_failed)?;

    Ok(json!({
        "contents": [{ "uri": uri, "mimeType": "text/plain", "text": text }]
    }))
}

/// Result for `roots/list`.
pub fn list_roots(allowed_roots: &[PathBuf]) -> Value {
    let roots: Vec<Value> = allowed_roots
        .iter()
        .map(|root| {
            let name = root
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| root.display().to_string());
            json!({ "uri": file_uri(root), "name": name })
        })
        .collect();
    json!({ "roots": roots })
}
