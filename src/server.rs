//! JSON HTTP tool server.
//!
//! Every tool in the [`ToolRegistry`] is dispatched through the same
//! `POST /tools/{name}` handler.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/tools/list` | List all registered tools with schemas |
//! | `POST` | `/tools/{name}` | Call any registered tool by name |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty", "field": "query" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `tool_error` (500).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::error::ValidationError;
use crate::service::MemoryService;
use crate::tools::{check_params, ParamError, ToolContext, ToolInfo, ToolRegistry};

#[derive(Clone)]
struct AppState {
    ctx: ToolContext,
    tools: Arc<ToolRegistry>,
}

/// Bind to `[server].bind` and serve the built-in tools until the process
/// is terminated.
pub async fn run_server(service: Arc<MemoryService>) -> anyhow::Result<()> {
    run_server_with_tools(service, ToolRegistry::with_builtins()).await
}

/// Like [`run_server`], with a caller-assembled registry. Register
/// [`ToolRegistry::with_builtins`] first to keep the memory tools.
pub async fn run_server_with_tools(
    service: Arc<MemoryService>,
    registry: ToolRegistry,
) -> anyhow::Result<()> {
    let bind_addr = service.config().server.bind.clone();
    let app = router(service, registry);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "tool server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router without binding, for embedding or tests.
pub fn router(service: Arc<MemoryService>, registry: ToolRegistry) -> Router {
    let state = AppState {
        ctx: ToolContext::new(service),
        tools: Arc::new(registry),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
    field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
                field: self.field,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>, field: impl Into<String>) -> AppError {
    let field = field.into();
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
        field: (!field.is_empty()).then_some(field),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
        field: None,
    }
}

fn tool_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "tool_error",
        message: message.into(),
        field: None,
    }
}

impl From<ParamError> for AppError {
    fn from(e: ParamError) -> Self {
        bad_request(e.message, e.field)
    }
}

/// Validation failures become 400 with the offending field; anything else
/// is an internal tool failure.
fn classify_tool_error(tool_name: &str, err: anyhow::Error) -> AppError {
    if let Some(v) = err.downcast_ref::<ValidationError>() {
        return bad_request(v.to_string(), v.field());
    }
    error!(tool = tool_name, error = %err, "tool execution failed");
    tool_error(format!("{}: {}", tool_name, err))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    let tools = state
        .tools
        .tools()
        .iter()
        .map(|t| ToolInfo::of(t.as_ref()))
        .collect();
    Json(ToolListResponse { tools })
}

// ============ POST /tools/{name} ============

/// Returns `404` if the tool is not found, `400` for parameter or
/// validation errors, and `500` for execution errors.
async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(params): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tool = state
        .tools
        .find(&name)
        .ok_or_else(|| not_found(format!("no tool registered with name: {}", name)))?;

    check_params(&tool.parameters_schema(), &params)?;

    let result = tool
        .execute(params, &state.ctx)
        .await
        .map_err(|e| classify_tool_error(&name, e))?;

    Ok(Json(serde_json::json!({ "result": result })))
}
