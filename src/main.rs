use anyhow::Result;
use clap::Parser;
use kotlin_mcp_server::config::load_config;
use kotlin_mcp_server::guard::PathGuard;
use kotlin_mcp_server::logging::{init_tracing, parse_mcp_level};
use kotlin_mcp_server::project::{project_root_candidate, EnvSnapshot};
use kotlin_mcp_server::registry::ToolRegistry;
use kotlin_mcp_server::server::{run_stdio_server, ServerState};
use serde_json::Map;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "kotlin-mcp-server")]
#[command(version)]
#[command(about = "MCP server for Android/Kotlin projects over stdio JSON-RPC")]
struct Cli {
    /// Project root to bind at startup. Falls back to PROJECT_PATH / WORKSPACE_PATH,
    /// or to the workspace announced by the client in `initialize`.
    #[arg(value_name = "PROJECT_PATH")]
    project_path: Option<PathBuf>,

    /// Print the tool catalog and exit
    #[arg(long)]
    list_tools: bool,

    /// Log level (debug, info, warning, error) or an EnvFilter directive
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn print_tools() {
    let registry = ToolRegistry::builtin();
    for (i, tool) in registry.tools().iter().enumerate() {
        println!("{:>2}. {} - {}", i + 1, tool.name, tool.description);
    }
    println!("\n{} tools", registry.len());
}

/// MCP level names become tracing levels; anything else is passed through as
/// an EnvFilter directive.
fn filter_directive(level: &str) -> String {
    match parse_mcp_level(level) {
        Some(l) => l.as_str().to_ascii_lowercase(),
        None => level.to_string(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.list_tools {
        print_tools();
        return Ok(());
    }

    let env = EnvSnapshot::capture();
    let boot_config = load_config(None, &env);
    let level = cli.log_level.clone().unwrap_or(boot_config.log_level);
    let set_level = init_tracing(&filter_directive(&level))?;

    let guard = PathGuard::capture()?;
    let initial_root = cli
        .project_path
        .or_else(|| project_root_candidate(&Map::new(), &env, None).map(PathBuf::from));

    let mut state = ServerState::new(env, guard).with_level_setter(set_level);
    if let Some(root) = initial_root {
        if let Err(e) = state.set_project_root(&root) {
            tracing::warn!(path = %root.display(), error = %e, "ignoring startup project path");
        }
    }

    run_stdio_server(state)
}
