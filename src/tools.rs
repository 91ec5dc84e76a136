//! Named operations exposed to remote callers.
//!
//! Every query operation is a [`Tool`]: a name, a description, a JSON Schema
//! for its parameters, and an async `execute`. The HTTP server and the MCP
//! bridge both dispatch through one [`ToolRegistry`], so the two surfaces
//! always agree.
//!
//! | Tool | Parameters | Result |
//! |------|------------|--------|
//! | `search` | `query`, `limit?` | `{ results: [SearchHit] }` |
//! | `lookup_class` | `token` | `{ results: [IdentifierHit] }` |
//! | `list_sections` | none | `{ results: [string] }` |
//! | `section_docs` | `section` | `{ results: [DocSummary] }` |
//! | `refresh` | none | `RefreshOutcome` |
//! | `full_doc` | `slug` | `{ document: FullDoc }` |
//! | `examples` | `query`, `limit?` | `{ results: [ExampleHit] }` |
//! | `variant_search` | `variant`, `limit?` | `{ results: [VariantHit] }` |
//!
//! An empty match set is not an error. It comes back as the usual shape with
//! an empty list (or `document: null`) plus `message` and `suggestion`.

use anyhow::{bail, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::harness::DocsHarness;

/// A remotely callable operation.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Route segment for `POST /tools/{name}` and the MCP tool name.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema (`type: "object"`) for the parameters.
    fn parameters_schema(&self) -> Value;

    /// Run with parameters already checked by [`validate_params`].
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// What a tool may touch while it runs.
#[derive(Clone)]
pub struct ToolContext {
    harness: Arc<DocsHarness>,
}

impl ToolContext {
    pub fn new(harness: Arc<DocsHarness>) -> Self {
        Self { harness }
    }

    pub fn harness(&self) -> &DocsHarness {
        &self.harness
    }
}

/// Serializable tool description for `GET /tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolInfo {
    pub fn of(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters_schema(),
        }
    }
}

fn results_or_hint<T: Serialize>(items: &[T], message: String, suggestion: &str) -> Result<Value> {
    if items.is_empty() {
        Ok(json!({ "results": [], "message": message, "suggestion": suggestion }))
    } else {
        Ok(json!({ "results": items }))
    }
}

/// Integers beyond `i64` saturate so the engine still clamps them to its ceiling.
fn limit_param(params: &Value) -> Option<i64> {
    let limit = &params["limit"];
    limit.as_i64().or_else(|| limit.as_u64().map(|_| i64::MAX))
}

fn str_param<'a>(params: &'a Value, key: &str) -> &'a str {
    params[key].as_str().unwrap_or("")
}

pub struct SearchTool;

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Full-text search over the documentation, ranked by relevance"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search terms", "minLength": 1, "maxLength": 200 },
                "limit": { "type": "integer", "description": "Maximum results (clamped to the configured ceiling)" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let query = str_param(&params, "query");
        let hits = ctx
            .harness()
            .search()
            .full_text_search(query, limit_param(&params))
            .await?;

        results_or_hint(
            &hits,
            format!("No results found for query: {}", query),
            "Try different keywords or check the spelling. For a specific class name, use lookup_class.",
        )
    }
}

pub struct LookupClassTool;

#[async_trait]
impl Tool for LookupClassTool {
    fn name(&self) -> &str {
        "lookup_class"
    }

    fn description(&self) -> &str {
        "Find documents that use an exact class-name token"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "token": {
                    "type": "string",
                    "description": "Exact class token, e.g. flex-1 or hover:bg-gray-100",
                    "minLength": 1,
                    "maxLength": 100,
                    "pattern": "^\\S+$"
                }
            },
            "required": ["token"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let token = str_param(&params, "token");
        let hits = ctx.harness().search().lookup_by_identifier(token).await?;

        results_or_hint(
            &hits,
            format!("No documentation found for class: {}", token),
            "Matching is exact and case-sensitive. Try search for related concepts.",
        )
    }
}

pub struct ListSectionsTool;

#[async_trait]
impl Tool for ListSectionsTool {
    fn name(&self) -> &str {
        "list_sections"
    }

    fn description(&self) -> &str {
        "List every documentation section"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
        let sections = ctx.harness().search().list_sections().await?;
        results_or_hint(
            &sections,
            "No sections found".to_string(),
            "The index may be empty. Run refresh to rebuild it.",
        )
    }
}

pub struct SectionDocsTool;

#[async_trait]
impl Tool for SectionDocsTool {
    fn name(&self) -> &str {
        "section_docs"
    }

    fn description(&self) -> &str {
        "List the documents in one section, ordered by title"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "section": { "type": "string", "description": "Section label as returned by list_sections", "minLength": 1, "maxLength": 100 }
            },
            "required": ["section"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let section = str_param(&params, "section");
        let docs = ctx.harness().search().list_by_section(section).await?;

        results_or_hint(
            &docs,
            format!("No documents found in section: {}", section),
            "Use list_sections to see available sections. Section names are case-sensitive.",
        )
    }
}

pub struct RefreshTool;

#[async_trait]
impl Tool for RefreshTool {
    fn name(&self) -> &str {
        "refresh"
    }

    fn description(&self) -> &str {
        "Update the documentation mirror and rebuild the search index"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
        let outcome = ctx.harness().refresh().await;
        Ok(serde_json::to_value(outcome)?)
    }
}

pub struct FullDocTool;

#[async_trait]
impl Tool for FullDocTool {
    fn name(&self) -> &str {
        "full_doc"
    }

    fn description(&self) -> &str {
        "Fetch a complete document by its slug"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "slug": {
                    "type": "string",
                    "description": "File name without extension, e.g. grid or text-align",
                    "minLength": 1,
                    "maxLength": 100,
                    "pattern": "^[A-Za-z0-9_.\\-]+$"
                }
            },
            "required": ["slug"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let slug = str_param(&params, "slug");
        match ctx.harness().search().get_by_slug(slug).await? {
            Some(doc) => Ok(json!({ "document": doc })),
            None => Ok(json!({
                "document": null,
                "message": format!("No documentation found for slug: {}", slug),
                "suggestion": "Try search to find similar documents. Slugs are usually lowercase with hyphens."
            })),
        }
    }
}

pub struct ExamplesTool;

#[async_trait]
impl Tool for ExamplesTool {
    fn name(&self) -> &str {
        "examples"
    }

    fn description(&self) -> &str {
        "Search for code samples, ranked by relevance"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "What the sample should demonstrate", "minLength": 1, "maxLength": 100 },
                "limit": { "type": "integer", "description": "Maximum documents (clamped to the configured ceiling)" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let query = str_param(&params, "query");
        let hits = ctx
            .harness()
            .search()
            .get_code_samples(query, limit_param(&params))
            .await?;

        results_or_hint(
            &hits,
            format!("No code examples found for query: {}", query),
            "Try different keywords or use search for general documentation.",
        )
    }
}

pub struct VariantSearchTool;

#[async_trait]
impl Tool for VariantSearchTool {
    fn name(&self) -> &str {
        "variant_search"
    }

    fn description(&self) -> &str {
        "Search documentation about a variant or modifier such as hover or dark"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "variant": {
                    "type": "string",
                    "description": "Variant name without the trailing colon",
                    "minLength": 1,
                    "maxLength": 50,
                    "pattern": "^[A-Za-z0-9_\\-]+$"
                },
                "limit": { "type": "integer", "description": "Maximum results (clamped to the configured ceiling)" }
            },
            "required": ["variant"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let variant = str_param(&params, "variant");
        let hits = ctx
            .harness()
            .search()
            .search_variant(variant, limit_param(&params))
            .await?;

        results_or_hint(
            &hits,
            format!("No documentation found for variant: {}", variant),
            "Try common variants like hover, focus, dark, sm, md, lg, group, or peer, without the colon.",
        )
    }
}

pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SearchTool));
        registry.register(Box::new(LookupClassTool));
        registry.register(Box::new(ListSectionsTool));
        registry.register(Box::new(SectionDocsTool));
        registry.register(Box::new(RefreshTool));
        registry.register(Box::new(FullDocTool));
        registry.register(Box::new(ExamplesTool));
        registry.register(Box::new(VariantSearchTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Check `params` against a tool schema and fill in declared defaults.
///
/// Supports `required`, `type`, `enum`, `minLength`, `maxLength` and
/// `pattern`. Integer ranges are not checked here; limits are clamped by
/// the engine instead.
pub fn validate_params(schema: &Value, params: &Value) -> Result<Value> {
    let params_obj = match params {
        Value::Object(map) => map.clone(),
        Value::Null => serde_json::Map::new(),
        other => bail!("parameters must be a JSON object, got {}", json_type_name(other)),
    };

    let properties = schema
        .get("properties")
        .and_then(|p| p.as_object())
        .cloned()
        .unwrap_or_default();

    let required: Vec<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    for field in &required {
        if !params_obj.contains_key(*field) {
            bail!("missing required parameter: {}", field);
        }
    }

    let mut result = params_obj.clone();

    for (name, prop) in &properties {
        let Some(value) = params_obj.get(name) else {
            if let Some(default) = prop.get("default") {
                result.insert(name.clone(), default.clone());
            }
            continue;
        };

        if let Some(expected) = prop.get("type").and_then(|t| t.as_str()) {
            let type_ok = match expected {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                _ => true,
            };
            if !type_ok {
                bail!(
                    "parameter '{}' must be of type '{}', got {}",
                    name,
                    expected,
                    json_type_name(value)
                );
            }
        }

        if let Some(allowed) = prop.get("enum").and_then(|e| e.as_array()) {
            if !allowed.contains(value) {
                let allowed: Vec<String> = allowed.iter().map(|v| v.to_string()).collect();
                bail!(
                    "parameter '{}' must be one of [{}], got {}",
                    name,
                    allowed.join(", "),
                    value
                );
            }
        }

        if let Some(text) = value.as_str() {
            let len = text.chars().count() as u64;
            if let Some(min) = prop.get("minLength").and_then(|m| m.as_u64()) {
                if len < min || text.trim().is_empty() {
                    bail!("parameter '{}' must not be empty", name);
                }
            }
            if let Some(max) = prop.get("maxLength").and_then(|m| m.as_u64()) {
                if len > max {
                    bail!("parameter '{}' must be at most {} characters", name, max);
                }
            }
            if let Some(pattern) = prop.get("pattern").and_then(|p| p.as_str()) {
                let re = Regex::new(pattern)?;
                if !re.is_match(text) {
                    bail!("parameter '{}' is invalid: must match {}", name, pattern);
                }
            }
        }
    }

    Ok(Value::Object(result))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
