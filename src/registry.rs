//! Static catalog of tool descriptors.
//!
//! Built once at startup and never mutated; `tools/list` returns it verbatim
//! and every `tools/call` is validated against the matching input schema.

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::schema::{self, ValidationError};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn new(name: &str, description: &str, input_schema: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
        }
    }

    pub fn required_fields(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(|r| r.as_array())
            .map(|r| r.iter().filter_map(|f| f.as_str()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// The full catalog served by this binary.
    pub fn builtin() -> Self {
        Self::from_descriptors(catalog())
    }

    /// Later duplicates of a name are dropped so lookups stay unambiguous.
    pub fn from_descriptors(descriptors: Vec<ToolDescriptor>) -> Self {
        let mut tools = Vec::with_capacity(descriptors.len());
        let mut index = HashMap::with_capacity(descriptors.len());
        for d in descriptors {
            if index.contains_key(&d.name) {
                tracing::warn!(tool = %d.name, "duplicate tool descriptor ignored");
                continue;
            }
            index.insert(d.name.clone(), tools.len());
            tools.push(d);
        }
        Self { tools, index }
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Check `args` against the tool's input schema. Unregistered names have
    /// no contract and always pass.
    pub fn validate_arguments(&self, name: &str, args: &Value) -> Result<(), ValidationError> {
        match self.get(name) {
            Some(d) => schema::validate(&d.input_schema, args),
            None => Ok(()),
        }
    }

    /// Result payload for `tools/list`.
    pub fn list_result(&self) -> Value {
        json!({ "tools": self.tools })
    }
}

/// Shared definitions referenced through `$ref`.
fn shared_defs() -> Value {
    json!({
        "pathsOrGlobs": {
            "type": ["string", "array"],
            "items": { "type": "string", "minLength": 1 }
        },
        "range": {
            "type": "object",
            "required": ["startLine", "endLine"],
            "properties": {
                "startLine": { "type": "integer", "minimum": 1 },
                "endLine": { "type": "integer", "minimum": 1 }
            }
        }
    })
}

fn with_defs(mut schema: Value) -> Value {
    if let Some(obj) = schema.as_object_mut() {
        obj.insert("$defs".to_string(), shared_defs());
    }
    schema
}

fn data_ref() -> Value {
    json!({
        "type": "object",
        "required": ["type", "value"],
        "properties": {
            "type": { "type": "string", "enum": ["inline", "path", "uri"] },
            "value": { "type": "string" }
        }
    })
}

fn string_list(description: &str) -> Value {
    json!({ "type": "array", "items": { "type": "string" }, "description": description })
}

fn no_args() -> Value {
    json!({ "type": "object", "properties": {} })
}

fn catalog() -> Vec<ToolDescriptor> {
    vec![
        // Code intelligence
        ToolDescriptor::new(
            "refactorFunction",
            "Refactor Kotlin functions with AST-aware transformations including rename, extract, inline, and parameter introduction.",
            with_defs(json!({
                "type": "object",
                "required": ["filePath", "functionName", "refactorType"],
                "properties": {
                    "filePath": { "type": "string", "minLength": 1 },
                    "functionName": { "type": "string", "minLength": 1 },
                    "refactorType": { "type": "string", "enum": ["rename", "extract", "inline", "introduceParam"] },
                    "newName": { "type": "string" },
                    "range": { "$ref": "#/$defs/range" },
                    "preview": { "type": "boolean", "default": false }
                }
            })),
        ),
        ToolDescriptor::new(
            "analyzeCodeQuality",
            "Analyze code quality with security, performance, complexity, or comprehensive rules.",
            with_defs(json!({
                "type": "object",
                "required": ["scope", "ruleset"],
                "properties": {
                    "scope": { "type": "string", "enum": ["file", "module", "project"] },
                    "targets": { "$ref": "#/$defs/pathsOrGlobs" },
                    "ruleset": { "type": "string", "enum": ["security", "performance", "complexity", "all"] },
                    "maxFindings": { "type": "integer", "minimum": 1 }
                }
            })),
        ),
        ToolDescriptor::new(
            "generateTests",
            "Generate comprehensive unit tests for Kotlin classes and functions with JUnit5 or MockK.",
            json!({
                "type": "object",
                "required": ["filePath", "classOrFunction", "framework"],
                "properties": {
                    "filePath": { "type": "string", "minLength": 1 },
                    "classOrFunction": { "type": "string" },
                    "framework": { "type": "string", "enum": ["JUnit5", "MockK"] },
                    "coverageGoal": { "type": "number", "minimum": 0, "maximum": 100 }
                }
            }),
        ),
        ToolDescriptor::new(
            "formatCode",
            "Format Kotlin code using ktlint or spotless with configurable style rules.",
            with_defs(json!({
                "type": "object",
                "required": ["targets", "style"],
                "properties": {
                    "targets": { "$ref": "#/$defs/pathsOrGlobs" },
                    "style": { "type": "string", "enum": ["ktlint", "spotless"] },
                    "preview": { "type": "boolean", "default": false }
                }
            })),
        ),
        ToolDescriptor::new(
            "optimizeImports",
            "Optimize and organize Kotlin imports across files, modules, or the entire project.",
            with_defs(json!({
                "type": "object",
                "required": ["projectRoot", "mode"],
                "properties": {
                    "projectRoot": { "type": "string", "minLength": 1 },
                    "mode": { "type": "string", "enum": ["file", "module", "project"] },
                    "targets": { "$ref": "#/$defs/pathsOrGlobs" },
                    "preview": { "type": "boolean", "default": false }
                }
            })),
        ),
        // Git
        ToolDescriptor::new(
            "gitStatus",
            "Get Git repository status including branch, changes, and ahead/behind counts.",
            no_args(),
        ),
        ToolDescriptor::new(
            "gitSmartCommit",
            "Create intelligent commit message based on changes and conventional commit standards.",
            no_args(),
        ),
        ToolDescriptor::new(
            "gitCreateFeatureBranch",
            "Create a new feature branch with safe naming and validation.",
            json!({
                "type": "object",
                "required": ["branchName"],
                "properties": {
                    "branchName": { "type": "string", "minLength": 1, "description": "Name of the feature branch" }
                }
            }),
        ),
        ToolDescriptor::new(
            "gitMergeWithResolution",
            "Attempt merge with intelligent conflict resolution and advice.",
            json!({
                "type": "object",
                "properties": {
                    "targetBranch": { "type": "string", "default": "main", "description": "Target branch to merge" }
                }
            }),
        ),
        // API
        ToolDescriptor::new(
            "apiCallSecure",
            "Make secure API calls with authentication, retries, and monitoring.",
            json!({
                "type": "object",
                "required": ["apiName", "endpoint"],
                "properties": {
                    "apiName": { "type": "string", "description": "Name of the configured API" },
                    "endpoint": { "type": "string", "description": "API endpoint path" },
                    "method": { "type": "string", "enum": ["GET", "POST", "PUT", "DELETE", "PATCH"], "default": "GET" },
                    "headers": { "type": "object", "description": "Additional headers" },
                    "data": { "type": "object", "description": "Request payload" },
                    "auth": { "type": "object", "description": "Authentication configuration" }
                }
            }),
        ),
        ToolDescriptor::new(
            "apiMonitorMetrics",
            "Get API monitoring metrics with windowed counters.",
            json!({
                "type": "object",
                "properties": {
                    "apiName": { "type": "string", "description": "Name of the API to monitor" },
                    "windowMinutes": { "type": "integer", "minimum": 1, "default": 60, "description": "Metrics window in minutes" }
                }
            }),
        ),
        ToolDescriptor::new(
            "apiValidateCompliance",
            "Validate API compliance with GDPR/HIPAA rules and provide remediations.",
            json!({
                "type": "object",
                "required": ["apiName"],
                "properties": {
                    "apiName": { "type": "string", "description": "Name of the API to validate" },
                    "complianceType": { "type": "string", "enum": ["gdpr", "hipaa"], "default": "gdpr" }
                }
            }),
        ),
        // Project insight
        ToolDescriptor::new(
            "projectSearch",
            "Fast grep search with context across project files.",
            json!({
                "type": "object",
                "required": ["query"],
                "properties": {
                    "query": { "type": "string", "minLength": 1, "description": "Search query" },
                    "regex": { "type": "boolean", "default": false, "description": "Treat query as a regular expression" },
                    "includePattern": { "type": "string", "default": "*", "description": "File pattern to include" },
                    "maxResults": { "type": "integer", "minimum": 1, "default": 50, "description": "Maximum results to return" },
                    "contextLines": { "type": "integer", "minimum": 0, "default": 2, "description": "Lines of context around matches" }
                }
            }),
        ),
        ToolDescriptor::new(
            "todoListFromCode",
            "Parse task comments and deprecated items from codebase.",
            json!({
                "type": "object",
                "properties": {
                    "includePattern": { "type": "string", "default": "*.{kt,java,py,js,ts}", "description": "File pattern to scan" },
                    "maxResults": { "type": "integer", "minimum": 1, "default": 100, "description": "Maximum TODOs to return" }
                }
            }),
        ),
        ToolDescriptor::new(
            "readmeGenerateOrUpdate",
            "Generate or update README with badges, setup instructions, and tool catalog.",
            json!({
                "type": "object",
                "properties": {
                    "forceRegenerate": { "type": "boolean", "default": false, "description": "Force complete regeneration" }
                }
            }),
        ),
        ToolDescriptor::new(
            "changelogSummarize",
            "Summarize conventional commits into grouped release notes.",
            json!({
                "type": "object",
                "properties": {
                    "changelogPath": { "type": "string", "default": "CHANGELOG.md", "description": "Path to changelog file" },
                    "version": { "type": "string", "default": "latest", "description": "Version to summarize" }
                }
            }),
        ),
        ToolDescriptor::new(
            "buildAndTest",
            "Run Gradle/Maven build and return failing tests with artifacts.",
            json!({
                "type": "object",
                "properties": {
                    "buildTool": { "type": "string", "enum": ["auto", "gradle", "maven"], "default": "auto" },
                    "skipTests": { "type": "boolean", "default": false, "description": "Skip running tests" }
                }
            }),
        ),
        ToolDescriptor::new(
            "dependencyAudit",
            "Audit Gradle dependencies for unpinned versions and insecure repositories.",
            json!({
                "type": "object",
                "properties": {
                    "maxFindings": { "type": "integer", "minimum": 1, "description": "Cap on reported findings" }
                }
            }),
        ),
        ToolDescriptor::new(
            "generateDocs",
            "Generate project documentation with Dokka",
            json!({
                "type": "object",
                "properties": {
                    "doc_type": { "type": "string", "enum": ["html", "javadoc"], "default": "html", "description": "Documentation format" }
                }
            }),
        ),
        // File creation and UI
        ToolDescriptor::new(
            "createLayoutFile",
            "Create new Android layout XML",
            json!({
                "type": "object",
                "required": ["layout_name"],
                "properties": {
                    "layout_name": { "type": "string", "pattern": "^[a-z][a-z0-9_]*$", "description": "Layout file name (without .xml)" },
                    "layout_type": { "type": "string", "enum": ["activity", "fragment", "item", "custom"], "default": "activity", "description": "Layout type" }
                }
            }),
        ),
        ToolDescriptor::new(
            "createComposeComponent",
            "Create Jetpack Compose UI components",
            json!({
                "type": "object",
                "required": ["file_path", "component_name", "package_name"],
                "properties": {
                    "file_path": { "type": "string", "description": "Path for the Compose file" },
                    "component_name": { "type": "string", "description": "Name of the Compose component" },
                    "package_name": { "type": "string", "description": "Package name" },
                    "component_type": { "type": "string", "enum": ["screen", "component", "dialog", "bottom_sheet"], "default": "component", "description": "Type of Compose component" },
                    "uses_state": { "type": "boolean", "default": false, "description": "Include state management" },
                    "uses_navigation": { "type": "boolean", "default": false, "description": "Include navigation" }
                }
            }),
        ),
        ToolDescriptor::new(
            "createCustomView",
            "Create custom Android View components",
            json!({
                "type": "object",
                "required": ["file_path", "view_name", "package_name"],
                "properties": {
                    "file_path": { "type": "string", "description": "Path for the custom view" },
                    "view_name": { "type": "string", "description": "Name of the custom view" },
                    "package_name": { "type": "string", "description": "Package name" },
                    "view_type": { "type": "string", "enum": ["view", "viewgroup", "compound"], "default": "view", "description": "Type of view" },
                    "has_attributes": { "type": "boolean", "default": false, "description": "Include custom attributes" }
                }
            }),
        ),
        // Architecture
        ToolDescriptor::new(
            "setupMvvmArchitecture",
            "Set up MVVM architecture pattern with ViewModel and Repository",
            json!({
                "type": "object",
                "required": ["feature_name", "package_name"],
                "properties": {
                    "feature_name": { "type": "string", "description": "Name of the feature/module" },
                    "package_name": { "type": "string", "description": "Base package name" },
                    "data_source": { "type": "string", "enum": ["network", "database", "both"], "default": "network", "description": "Data source type" },
                    "include_repository": { "type": "boolean", "default": true, "description": "Include Repository pattern" },
                    "include_use_cases": { "type": "boolean", "default": false, "description": "Include Use Cases (Clean Architecture)" }
                }
            }),
        ),
        ToolDescriptor::new(
            "setupDependencyInjection",
            "Set up Hilt dependency injection",
            json!({
                "type": "object",
                "required": ["module_name", "package_name"],
                "properties": {
                    "module_name": { "type": "string", "description": "Name of the DI module" },
                    "package_name": { "type": "string", "description": "Package name" },
                    "injection_type": { "type": "string", "enum": ["network", "database", "repository", "use_case"], "default": "network", "description": "Type of injection setup" }
                }
            }),
        ),
        ToolDescriptor::new(
            "setupRoomDatabase",
            "Set up Room database with entities and DAOs",
            json!({
                "type": "object",
                "required": ["database_name", "package_name", "entities"],
                "properties": {
                    "database_name": { "type": "string", "description": "Name of the database" },
                    "package_name": { "type": "string", "description": "Package name" },
                    "entities": string_list("List of entity names"),
                    "include_migration": { "type": "boolean", "default": false, "description": "Include migration setup" }
                }
            }),
        ),
        ToolDescriptor::new(
            "setupRetrofitApi",
            "Set up Retrofit API interface and service",
            json!({
                "type": "object",
                "required": ["api_name", "package_name", "base_url"],
                "properties": {
                    "api_name": { "type": "string", "description": "Name of the API interface" },
                    "package_name": { "type": "string", "description": "Package name" },
                    "base_url": { "type": "string", "description": "Base URL for the API" },
                    "authentication": { "type": "string", "enum": ["none", "bearer", "api_key", "oauth"], "default": "none", "description": "Authentication type" },
                    "endpoints": string_list("List of endpoint names")
                }
            }),
        ),
        // Security and compliance
        ToolDescriptor::new(
            "securityEncryptData",
            "Encrypt sensitive data with AES-256-GCM encryption and tamper-evident audit trail",
            json!({
                "type": "object",
                "required": ["dataRef"],
                "properties": {
                    "dataRef": data_ref(),
                    "algo": { "type": "string", "enum": ["AES-256-GCM"], "default": "AES-256-GCM" },
                    "kdf": { "type": "string", "enum": ["PBKDF2"], "default": "PBKDF2" },
                    "context": { "type": "object", "additionalProperties": true }
                }
            }),
        ),
        ToolDescriptor::new(
            "securityDecryptData",
            "Decrypt data encrypted with securityEncryptData",
            json!({
                "type": "object",
                "required": ["dataRef"],
                "properties": {
                    "dataRef": data_ref(),
                    "context": { "type": "object" }
                }
            }),
        ),
        ToolDescriptor::new(
            "securityAuditTrail",
            "Query tamper-evident audit trail with hash chaining",
            json!({
                "type": "object",
                "properties": {
                    "filters": {
                        "type": "object",
                        "properties": {
                            "subjectId": { "type": "string" },
                            "op": { "type": "string" },
                            "dateRange": {
                                "type": "object",
                                "properties": {
                                    "start": { "type": "string", "format": "date-time" },
                                    "end": { "type": "string", "format": "date-time" }
                                }
                            }
                        }
                    },
                    "limit": { "type": "integer", "minimum": 1, "default": 50 }
                }
            }),
        ),
        ToolDescriptor::new(
            "privacyRequestErasure",
            "Delete subject data from files, database, or cloud with audit trail",
            json!({
                "type": "object",
                "required": ["subjectId", "scopes"],
                "properties": {
                    "subjectId": { "type": "string" },
                    "scopes": { "type": "array", "items": { "type": "string", "enum": ["files", "database", "cloud"] } }
                }
            }),
        ),
        ToolDescriptor::new(
            "privacyExportData",
            "Export subject data in requested format with compliance audit",
            json!({
                "type": "object",
                "required": ["subjectId", "format"],
                "properties": {
                    "subjectId": { "type": "string" },
                    "format": { "type": "string", "enum": ["JSON", "XML", "CSV"], "default": "JSON" }
                }
            }),
        ),
        ToolDescriptor::new(
            "implementGdprCompliance",
            "Implement GDPR compliance features in Android app",
            json!({
                "type": "object",
                "required": ["package_name", "features"],
                "properties": {
                    "package_name": { "type": "string", "description": "Package name" },
                    "features": {
                        "type": "array",
                        "items": { "type": "string", "enum": ["consent_management", "data_portability", "right_to_erasure", "privacy_policy"] },
                        "description": "GDPR features to implement"
                    }
                }
            }),
        ),
        ToolDescriptor::new(
            "implementHipaaCompliance",
            "Implement HIPAA compliance features for healthcare apps",
            json!({
                "type": "object",
                "required": ["package_name", "features"],
                "properties": {
                    "package_name": { "type": "string", "description": "Package name" },
                    "features": {
                        "type": "array",
                        "items": { "type": "string", "enum": ["audit_logging", "access_controls", "encryption", "secure_messaging"] },
                        "description": "HIPAA features to implement"
                    }
                }
            }),
        ),
        ToolDescriptor::new(
            "setupSecureStorage",
            "Setup secure storage with encryption and access controls",
            json!({
                "type": "object",
                "required": ["storage_type"],
                "properties": {
                    "storage_type": { "type": "string", "enum": ["shared_preferences", "room", "keystore", "file"], "description": "Type of storage to secure" },
                    "encryption_level": { "type": "string", "enum": ["standard", "high", "maximum"], "default": "standard", "description": "Level of encryption" },
                    "compliance_mode": { "type": "string", "enum": ["none", "gdpr", "hipaa", "both"], "default": "none", "description": "Compliance requirements" }
                }
            }),
        ),
        // AI integration
        ToolDescriptor::new(
            "queryLlm",
            "Query local or external LLM for code assistance",
            json!({
                "type": "object",
                "required": ["prompt"],
                "properties": {
                    "prompt": { "type": "string", "minLength": 1, "description": "Prompt for the LLM" },
                    "llm_provider": { "type": "string", "enum": ["openai", "anthropic", "local"], "default": "local", "description": "LLM provider to use" },
                    "model": { "type": "string", "description": "Specific model to use" },
                    "max_tokens": { "type": "integer", "minimum": 1, "default": 1000, "description": "Maximum tokens in response" },
                    "privacy_mode": { "type": "boolean", "default": true, "description": "Use privacy-preserving mode" }
                }
            }),
        ),
        ToolDescriptor::new(
            "analyzeCodeWithAi",
            "Analyze Kotlin/Android code using AI models",
            json!({
                "type": "object",
                "required": ["file_path", "analysis_type"],
                "properties": {
                    "file_path": { "type": "string", "description": "Path to code file" },
                    "analysis_type": { "type": "string", "enum": ["security", "performance", "bugs", "style", "complexity"], "description": "Type of analysis to perform" },
                    "use_local_model": { "type": "boolean", "default": true, "description": "Use local AI model for analysis" }
                }
            }),
        ),
        ToolDescriptor::new(
            "generateCodeWithAi",
            "Generate Kotlin/Android code using AI assistance",
            json!({
                "type": "object",
                "required": ["description", "code_type"],
                "properties": {
                    "description": { "type": "string", "description": "Description of code to generate" },
                    "code_type": { "type": "string", "enum": ["class", "function", "layout", "test", "component"], "description": "Type of code to generate" },
                    "framework": { "type": "string", "enum": ["compose", "view", "kotlin", "java"], "description": "Target framework" },
                    "compliance_requirements": string_list("Compliance requirements to consider")
                }
            }),
        ),
        // Testing
        ToolDescriptor::new(
            "generateUnitTests",
            "Generate unit tests for Kotlin classes",
            json!({
                "type": "object",
                "required": ["target_file"],
                "properties": {
                    "target_file": { "type": "string", "description": "Path to file to test" },
                    "test_framework": { "type": "string", "enum": ["junit4", "junit5", "mockk", "robolectric"], "default": "junit5", "description": "Testing framework to use" },
                    "coverage_target": { "type": "integer", "minimum": 0, "maximum": 100, "default": 80, "description": "Target test coverage percentage" }
                }
            }),
        ),
        ToolDescriptor::new(
            "setupUiTesting",
            "Set up UI testing with Espresso or Compose Testing",
            json!({
                "type": "object",
                "required": ["testing_framework"],
                "properties": {
                    "testing_framework": { "type": "string", "enum": ["espresso", "compose_testing", "ui_automator"], "description": "UI testing framework to use" },
                    "target_screens": string_list("List of screens to test")
                }
            }),
        ),
        // File management
        ToolDescriptor::new(
            "manageProjectFiles",
            "Advanced file management with security and backup",
            json!({
                "type": "object",
                "required": ["operation", "target_path"],
                "properties": {
                    "operation": {
                        "type": "string",
                        "enum": ["backup", "restore", "sync", "encrypt", "decrypt", "archive", "extract", "watch", "search", "analyze"],
                        "description": "File operation to perform"
                    },
                    "target_path": { "type": "string", "description": "Target file or directory" },
                    "destination": { "type": "string", "description": "Destination for operation" },
                    "encryption_level": { "type": "string", "enum": ["none", "standard", "high"], "default": "standard", "description": "Encryption level for secure operations" },
                    "search_pattern": { "type": "string", "description": "Search pattern (for search operation)" },
                    "watch_patterns": string_list("File patterns to watch (for watch operation)")
                }
            }),
        ),
        ToolDescriptor::new(
            "setupCloudSync",
            "Set up cloud synchronization for project files",
            json!({
                "type": "object",
                "required": ["cloud_provider"],
                "properties": {
                    "cloud_provider": { "type": "string", "enum": ["google_drive", "dropbox", "onedrive", "aws_s3"], "description": "Cloud storage provider" },
                    "encryption": { "type": "boolean", "default": true, "description": "Enable encryption for synced files" },
                    "sync_patterns": string_list("File patterns to sync")
                }
            }),
        ),
        ToolDescriptor::new(
            "setupExternalApi",
            "Set up external API integration with authentication and monitoring",
            json!({
                "type": "object",
                "required": ["api_name", "base_url", "auth_type"],
                "properties": {
                    "api_name": { "type": "string", "description": "Name for the API integration" },
                    "base_url": { "type": "string", "pattern": "^https?://", "description": "Base URL of the API" },
                    "auth_type": { "type": "string", "enum": ["api_key", "oauth", "jwt", "basic", "none"], "description": "Authentication type" },
                    "api_key": { "type": "string", "description": "API key (for api_key auth)" },
                    "rate_limit": { "type": "integer", "minimum": 1, "description": "Requests per minute limit" },
                    "security_features": {
                        "type": "array",
                        "items": { "type": "string", "enum": ["rate_limiting", "request_logging", "encryption"] },
                        "description": "Security features to enable"
                    }
                }
            }),
        ),
        ToolDescriptor::new(
            "callExternalApi",
            "Make authenticated calls to configured external APIs",
            json!({
                "type": "object",
                "required": ["api_name", "endpoint"],
                "properties": {
                    "api_name": { "type": "string", "description": "Name of the configured API" },
                    "endpoint": { "type": "string", "description": "API endpoint path" },
                    "method": { "type": "string", "enum": ["GET", "POST", "PUT", "DELETE", "PATCH"], "default": "GET", "description": "HTTP method" },
                    "data": { "type": "object", "description": "Request payload" },
                    "headers": { "type": "object", "description": "Additional headers" }
                }
            }),
        ),
        ToolDescriptor::new(
            "fileBackup",
            "Create encrypted backups with manifest and SHA-256 hashes",
            json!({
                "type": "object",
                "required": ["targets", "dest"],
                "properties": {
                    "targets": { "type": "array", "items": { "type": "string" }, "minItems": 1, "description": "File/directory paths to backup" },
                    "dest": { "type": "string", "description": "Destination path or S3/Cloud URL" },
                    "encrypt": { "type": "boolean", "default": true, "description": "Enable client-side encryption" },
                    "tag": { "type": "string", "description": "Backup tag for identification" }
                }
            }),
        ),
        ToolDescriptor::new(
            "fileRestore",
            "Restore files from backup with integrity verification",
            json!({
                "type": "object",
                "required": ["manifestRef", "destRoot"],
                "properties": {
                    "manifestRef": data_ref(),
                    "destRoot": { "type": "string", "description": "Root directory for restoration" },
                    "decrypt": { "type": "boolean", "default": true, "description": "Decrypt if encrypted" }
                }
            }),
        ),
        ToolDescriptor::new(
            "fileSyncWatch",
            "Watch directories for changes and sync to cloud storage",
            json!({
                "type": "object",
                "required": ["paths", "dest"],
                "properties": {
                    "paths": string_list("Local paths to watch"),
                    "dest": { "type": "string", "description": "Cloud destination URL" },
                    "patterns": string_list("File patterns to include/exclude")
                }
            }),
        ),
        ToolDescriptor::new(
            "fileClassifySensitivity",
            "Classify files for PII/Secrets using regex and heuristics",
            json!({
                "type": "object",
                "required": ["targets", "policies"],
                "properties": {
                    "targets": string_list("Files/directories to scan"),
                    "policies": {
                        "type": "array",
                        "items": { "type": "string", "enum": ["PII", "Secrets", "PHI", "Financial"] },
                        "description": "Classification policies to apply"
                    }
                }
            }),
        ),
        ToolDescriptor::new(
            "securityHardening",
            "Manage security hardening features including RBAC, rate limiting, caching, and monitoring",
            json!({
                "type": "object",
                "required": ["operation"],
                "properties": {
                    "operation": {
                        "type": "string",
                        "enum": ["get_metrics", "assign_role", "check_permission", "clear_cache", "export_telemetry"],
                        "description": "Hardening operation to perform"
                    },
                    "user_id": { "type": "string", "description": "User ID for role/permission operations" },
                    "role": { "type": "string", "enum": ["admin", "developer", "readonly", "guest"], "description": "Role to assign" },
                    "permission": { "type": "string", "description": "Permission to check" },
                    "resource": { "type": "string", "description": "Resource path for permission check" }
                }
            }),
        ),
    ]
}
