//! End-to-end tests for the HTTP tool server.
//!
//! The server is started in-process on a free port and driven with a real
//! HTTP client, including a custom tool registered next to the built-ins.

use anyhow::Result;
use async_trait::async_trait;
use memory_harness::config::Config;
use memory_harness::server::run_server_with_tools;
use memory_harness::service::{MemoryService, SearchRequest};
use memory_harness::tools::{Tool, ToolContext, ToolRegistry};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

// ─── Test Tool ──────────────────────────────────────────────────────

/// Counts search results for a query via the shared service.
struct CountTool;

#[async_trait]
impl Tool for CountTool {
    fn name(&self) -> &str {
        "count_results"
    }

    fn description(&self) -> &str {
        "Count search results for a query"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let query = params["query"].as_str().unwrap_or("").to_string();
        let resp = ctx
            .service()
            .search(SearchRequest {
                query: query.clone(),
                limit: Some(20),
            })
            .await?;
        Ok(json!({ "query": query, "count": resp.results.len() }))
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

struct TestServer {
    _tmp: TempDir,
    base: String,
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn start_server(registry: ToolRegistry) -> TestServer {
    let tmp = TempDir::new().unwrap();
    let port = find_free_port();

    let mut config = Config::default();
    config.db.path = tmp.path().join("memory.sqlite");
    config.server.bind = format!("127.0.0.1:{}", port);

    let service = Arc::new(MemoryService::open(config).await.unwrap());
    let handle = tokio::spawn(async move {
        run_server_with_tools(service, registry).await.ok();
    });

    wait_for_server(port).await;
    TestServer {
        _tmp: tmp,
        base: format!("http://127.0.0.1:{}", port),
        handle,
    }
}

async fn call(server: &TestServer, tool: &str, params: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{}/tools/{}", server.base, tool))
        .json(&params)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_and_tool_list() {
    let server = start_server(ToolRegistry::with_builtins()).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/health", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));

    let list: Value = client
        .get(format!("{}/tools/list", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = list["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["memory_store", "memory_search", "memory_forget"]);
    assert_eq!(list["tools"][0]["builtin"], true);
    assert_eq!(list["tools"][0]["parameters"]["required"], json!(["text"]));
}

#[tokio::test]
async fn test_store_search_forget_over_http() {
    let server = start_server(ToolRegistry::with_builtins()).await;

    let (status, body) = call(
        &server,
        "memory_store",
        json!({ "text": "I prefer dark mode", "category": "preference" }),
    )
    .await;
    assert_eq!(status, 200);
    let id = body["result"]["id"].as_str().unwrap().to_string();

    let (status, body) = call(
        &server,
        "memory_store",
        json!({ "text": "I prefer dark mode", "category": "preference" }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["id"], json!(id));
    assert_eq!(body["result"]["deduplicated"], true);

    call(&server, "memory_store", json!({ "text": "dark chocolate is great" })).await;

    let (status, body) = call(&server, "memory_search", json!({ "query": "dark mode" })).await;
    assert_eq!(status, 200);
    let results = body["result"]["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["id"], json!(id));

    let (status, body) = call(&server, "memory_forget", json!({ "id": id })).await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["deleted"], true);

    let (_, body) = call(&server, "memory_forget", json!({ "id": id })).await;
    assert_eq!(body["result"]["deleted"], false);
}

#[tokio::test]
async fn test_error_contract() {
    let server = start_server(ToolRegistry::with_builtins()).await;

    // Service-level validation.
    let (status, body) = call(&server, "memory_search", json!({ "query": "   " })).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
    assert_eq!(body["error"]["field"], "query");

    let (status, body) =
        call(&server, "memory_search", json!({ "query": "x", "limit": 500 })).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["field"], "limit");

    let (status, body) = call(
        &server,
        "memory_search",
        json!({ "query": "x", "limit": u64::MAX }),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["field"], "limit");

    // Schema-level validation.
    let (status, body) = call(&server, "memory_store", json!({})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["field"], "text");

    let (status, body) = call(
        &server,
        "memory_store",
        json!({ "text": "x", "category": "knowledge" }),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["field"], "category");

    let (status, body) = call(&server, "nonexistent", json!({})).await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_custom_tool_alongside_builtins() {
    let mut registry = ToolRegistry::with_builtins();
    registry.register(Box::new(CountTool));
    let server = start_server(registry).await;

    call(&server, "memory_store", json!({ "text": "rust borrow checker" })).await;
    call(&server, "memory_store", json!({ "text": "rust lifetimes" })).await;

    let (status, body) = call(&server, "count_results", json!({ "query": "rust" })).await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["query"], "rust");
    assert_eq!(body["result"]["count"], 2);
}
