//! Tool surface over [`MemoryService`].
//!
//! Each boundary operation is wrapped as a [`Tool`]: a name, a description,
//! a JSON Schema for its parameters, and an async `execute`. The HTTP
//! server lists and dispatches whatever a [`ToolRegistry`] holds, so
//! extra tools can be registered next to the built-in three.
//!
//! ```rust,no_run
//! # async fn example(service: std::sync::Arc<memory_harness::service::MemoryService>) -> anyhow::Result<()> {
//! use memory_harness::tools::{ToolContext, ToolRegistry};
//!
//! let registry = ToolRegistry::with_builtins();
//! let ctx = ToolContext::new(service);
//! let tool = registry.find("memory_search").unwrap();
//! let result = tool.execute(serde_json::json!({ "query": "dark mode" }), &ctx).await?;
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::error::ValidationError;
use crate::models::Category;
use crate::service::{ForgetRequest, MemoryService, SearchRequest, StoreRequest};

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn is_builtin(&self) -> bool {
        false
    }

    /// JSON Schema (`type: object`) describing accepted parameters.
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Handle given to tools at execution time.
#[derive(Clone)]
pub struct ToolContext {
    service: Arc<MemoryService>,
}

impl ToolContext {
    pub fn new(service: Arc<MemoryService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &MemoryService {
        &self.service
    }
}

/// Serializable tool info for the `/tools/list` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub builtin: bool,
    pub parameters: Value,
}

impl ToolInfo {
    pub fn of(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            builtin: tool.is_builtin(),
            parameters: tool.parameters_schema(),
        }
    }
}

/// Parameters that do not fit a tool's schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParamError {
    pub field: String,
    pub message: String,
}

/// Check `params` against a tool schema: object shape, required keys,
/// primitive types and enums. Unknown keys pass through.
pub fn check_params(schema: &Value, params: &Value) -> Result<(), ParamError> {
    let empty = serde_json::Map::new();
    let params_obj = match params {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            return Err(ParamError {
                field: String::new(),
                message: format!("parameters must be an object, got {}", json_type_name(other)),
            })
        }
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if !params_obj.contains_key(name) {
                return Err(ParamError {
                    field: name.to_string(),
                    message: format!("missing required parameter: {}", name),
                });
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (name, prop) in properties {
        let Some(value) = params_obj.get(name) else {
            continue;
        };

        if let Some(expected) = prop.get("type").and_then(Value::as_str) {
            let type_ok = match expected {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                _ => true,
            };
            if !type_ok {
                return Err(ParamError {
                    field: name.clone(),
                    message: format!(
                        "parameter '{}' must be of type '{}', got {}",
                        name,
                        expected,
                        json_type_name(value)
                    ),
                });
            }
        }

        if let Some(allowed) = prop.get("enum").and_then(Value::as_array) {
            if !allowed.contains(value) {
                let names: Vec<String> = allowed.iter().map(|v| v.to_string()).collect();
                return Err(ParamError {
                    field: name.clone(),
                    message: format!(
                        "parameter '{}' must be one of [{}], got {}",
                        name,
                        names.join(", "),
                        value
                    ),
                });
            }
        }
    }

    Ok(())
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

fn str_param(params: &Value, name: &str) -> String {
    params[name].as_str().unwrap_or("").to_string()
}

// ============ Built-in tools ============

pub struct StoreTool;

#[async_trait]
impl Tool for StoreTool {
    fn name(&self) -> &str {
        "memory_store"
    }

    fn description(&self) -> &str {
        "Store a memory note for later recall"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        let categories: Vec<&str> = Category::ALL.iter().map(Category::as_str).collect();
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "Note to remember" },
                "category": { "type": "string", "enum": categories, "default": "other" }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let req = StoreRequest {
            text: str_param(&params, "text"),
            category: params["category"].as_str().map(str::to_string),
        };
        let resp = ctx.service().store(req).await?;
        Ok(serde_json::to_value(resp)?)
    }
}

pub struct SearchTool;

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "memory_search"
    }

    fn description(&self) -> &str {
        "Search stored memories, the knowledge base and session history"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" },
                "limit": { "type": "integer", "description": "Max results", "minimum": 1 }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let max_limit = ctx.service().config().retrieval.max_limit;
        let req = SearchRequest {
            query: str_param(&params, "query"),
            limit: limit_param(&params, max_limit)?,
        };
        let resp = ctx.service().search(req).await?;
        Ok(serde_json::to_value(resp)?)
    }
}

/// An absent or null `limit` means the default; any value that is not an
/// `i64` is out of range rather than silently dropped.
fn limit_param(params: &Value, max_limit: i64) -> Result<Option<i64>, ValidationError> {
    match params.get("limit") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_i64().map(Some).ok_or(ValidationError::LimitOutOfRange {
            field: "limit",
            value: if value.is_u64() { i64::MAX } else { 0 },
            max: max_limit,
        }),
    }
}

pub struct ForgetTool;

#[async_trait]
impl Tool for ForgetTool {
    fn name(&self) -> &str {
        "memory_forget"
    }

    fn description(&self) -> &str {
        "Delete a stored memory by id"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "Memory id returned by memory_store" }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let req = ForgetRequest {
            id: str_param(&params, "id"),
        };
        let resp = ctx.service().forget(req).await?;
        Ok(serde_json::to_value(resp)?)
    }
}

// ============ Registry ============

pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(StoreTool));
        registry.register(Box::new(SearchTool));
        registry.register(Box::new(ForgetTool));
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

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
