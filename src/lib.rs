pub mod args;
pub mod config;
pub mod delegate;
pub mod dispatch;
pub mod dispatch_log;
pub mod error;
pub mod guard;
pub mod logging;
pub mod operations;
pub mod project;
pub mod prompts;
pub mod protocol;
pub mod registry;
pub mod resources;
pub mod scanner;
pub mod schema;
pub mod server;
pub mod tools;
