//! Built-in tool handlers. Everything else in the catalog goes to the
//! configured delegate.

pub mod deps;
pub mod docs;
pub mod format;
pub mod git;
pub mod gradle;
pub mod process;
pub mod search;
pub mod sensitivity;

use crate::dispatch::ToolHandler;

pub fn builtin_handlers() -> Vec<(&'static str, ToolHandler)> {
    vec![
        ("gitStatus", git::git_status as ToolHandler),
        ("gitSmartCommit", git::git_smart_commit as ToolHandler),
        ("gitCreateFeatureBranch", git::git_create_feature_branch as ToolHandler),
        ("gitMergeWithResolution", git::git_merge_with_resolution as ToolHandler),
        ("buildAndTest", gradle::build_and_test as ToolHandler),
        ("generateDocs", gradle::generate_docs as ToolHandler),
        ("formatCode", format::format_code as ToolHandler),
        ("projectSearch", search::project_search as ToolHandler),
        ("todoListFromCode", search::todo_list_from_code as ToolHandler),
        ("fileClassifySensitivity", sensitivity::file_classify_sensitivity as ToolHandler),
        ("readmeGenerateOrUpdate", docs::readme_generate_or_update as ToolHandler),
        ("changelogSummarize", docs::changelog_summarize as ToolHandler),
        ("dependencyAudit", deps::dependency_audit as ToolHandler),
    ]
}
