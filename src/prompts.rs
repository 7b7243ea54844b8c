//! `prompts/list` and `prompts/get`.

use serde_json::{json, Map, Value};

use crate::protocol::{ErrorCode, ErrorObject};

struct PromptArg {
    name: &'static str,
    description: &'static str,
    required: bool,
}

struct Prompt {
    name: &'static str,
    description: &'static str,
    arguments: &'static [PromptArg],
    render: fn(&Map<String, Value>) -> String,
}

const PROMPTS: [Prompt; 3] = [
    Prompt {
        name: "generate_mvvm_viewmodel",
        description: "Generate a ViewModel following MVVM architecture",
        arguments: &[
            PromptArg { name: "feature_name", description: "Name of the feature", required: true },
            PromptArg { name: "data_source", description: "Data source type (network, database, both)", required: false },
        ],
        render: render_viewmodel,
    },
    Prompt {
        name: "create_compose_screen",
        description: "Create a Jetpack Compose screen with best practices",
        arguments: &[
            PromptArg { name: "screen_name", description: "Name of the screen", required: true },
            PromptArg { name: "has_navigation", description: "Include navigation setup", required: false },
        ],
        render: render_compose_screen,
    },
    Prompt {
        name: "setup_room_database",
        description: "Set up Room database with entities and DAOs",
        arguments: &[
            PromptArg { name: "database_name", description: "Name of the database", required: true },
            PromptArg { name: "entities", description: "List of entity names", required: true },
        ],
        render: render_room_database,
    },
];

fn arg(args: &Map<String, Value>, name: &str, default: &str) -> String {
    match args.get(name) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::String(_)) | Some(Value::Null) | None => default.to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        Some(other) => other.to_string(),
    }
}

fn render_viewmodel(args: &Map<String, Value>) -> String {
    let feature = arg(args, "feature_name", "Feature");
    let source = arg(args, "data_source", "network");
    format!(
        "Generate a Kotlin ViewModel for the {feature} feature following MVVM.\n\
         - Expose UI state as a StateFlow of a sealed {feature}UiState (Loading, Success, Error).\n\
         - Inject a {feature}Repository backed by a {source} data source with Hilt.\n\
         - Launch work in viewModelScope and map failures into the Error state.\n\
         - Include a unit test using kotlinx-coroutines-test."
    )
}

fn render_compose_screen(args: &Map<String, Value>) -> String {
    let screen = arg(args, "screen_name", "Home");
    let navigation = arg(args, "has_navigation", "false");
    let nav_line = if navigation == "true" {
        format!("- Register a `{screen}` route in the NavHost and accept a NavController for navigation events.\n")
    } else {
        String::new()
    };
    format!(
        "Create a Jetpack Compose screen named {screen}Screen.\n\
         - Hoist state: the composable takes a {screen}UiState and event lambdas.\n\
         - Collect state from the ViewModel with collectAsStateWithLifecycle.\n\
         {nav_line}\
         - Use Material 3 components and provide a @Preview."
    )
}

fn render_room_database(args: &Map<String, Value>) -> String {
    let database = arg(args, "database_name", "AppDatabase");
    let entities = arg(args, "entities", "");
    format!(
        "Set up a Room database named {database}.\n\
         - Entities: {entities}. Annotate each with @Entity and a primary key.\n\
         - Provide one DAO per entity with suspend CRUD functions and Flow queries.\n\
         - Add the @Database class with exportSchema enabled and a Hilt module providing it.\n\
         - Include a migration test scaffold."
    )
}

pub fn list_prompts() -> Value {
    let prompts: Vec<Value> = PROMPTS
        .iter()
        .map(|p| {
            let arguments: Vec<Value> = p
                .arguments
                .iter()
                .map(|a| json!({ "name": a.name, "description": a.description, "required": a.required }))
                .collect();
            json!({ "name": p.name, "description": p.description, "arguments": arguments })
        })
        .collect();
    json!({ "prompts": prompts })
}

/// Result for `prompts/get`. Unknown names and missing required arguments are
/// invalid params.
pub fn get_prompt(params: &Value) -> Result<Value, ErrorObject> {
    let name = params
        .get("name")
        .and_then(|n| n.as_str())
        .ok_or_else(|| ErrorObject::new(ErrorCode::InvalidParams, "Missing prompt name"))?;
    let prompt = PROMPTS.iter().find(|p| p.name == name).ok_or_else(|| {
        ErrorObject::new(ErrorCode::InvalidParams, format!("Unknown prompt: {name}")).with_data(json!({ "name": name }))
    })?;

    let empty = Map::new();
    let args = params.get("arguments").and_then(|a| a.as_object()).unwrap_or(&empty);
    let missing: Vec<&str> = prompt
        .arguments
        .iter()
        .filter(|a| a.required && args.get(a.name).map_or(true, Value::is_null))
        .map(|a| a.name)
        .collect();
    if !missing.is_empty() {
        return Err(ErrorObject::new(
            ErrorCode::InvalidParams,
            format!("Missing required prompt arguments: {}", missing.join(", ")),
        ));
    }

    Ok(json!({
        "description": prompt.description,
        "messages": [{
            "role": "user",
            "content": { "type": "text", "text": (prompt.render)(args) }
        }]
    }))
}
