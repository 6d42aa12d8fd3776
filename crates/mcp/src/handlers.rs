use std::fmt::Display;
use std::sync::Arc;

use serde_json::{Value, json};
use xiyan_core::{
    DatabaseConfig, JsonRpcRequest, JsonRpcResponse, MAX_RESULT_ROWS, MCP_PROTOCOL_VERSION, codes,
};
use xiyan_db::{Database, SqlRunner as _};
use xiyan_service::TextToSqlService;

use crate::resources::{self, ResourceTarget};
use crate::state::{ServerState, ServerStatus};
use crate::tools::{McpTool, get_tools_json};

pub(crate) fn mcp_text(text: &str) -> Value {
    json!({ "content": [{ "type": "text", "text": text }] })
}

pub(crate) fn mcp_err(msg: impl Display) -> Value {
    json!({ "content": [{ "type": "text", "text": format!("Error: {msg}") }], "isError": true })
}

/// Transport-independent MCP request handling.
pub struct McpServer {
    state: ServerState,
    db_config: DatabaseConfig,
    db: Arc<Database>,
    text_to_sql: TextToSqlService,
}

impl McpServer {
    #[must_use]
    pub fn new(
        state: ServerState,
        db_config: DatabaseConfig,
        db: Arc<Database>,
        text_to_sql: TextToSqlService,
    ) -> Self {
        Self { state, db_config, db, text_to_sql }
    }

    #[must_use]
    pub const fn state(&self) -> &ServerState {
        &self.state
    }

    pub async fn status(&self) -> ServerStatus {
        let ping = self.db.ping().await.map_err(|e| e.to_string());
        self.state.status(ping)
    }

    /// Parses one raw JSON-RPC message and handles it. Parse failures and
    /// malformed envelopes produce error responses; notifications produce none.
    pub async fn handle_message(&self, raw: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    codes::PARSE_ERROR,
                    format!("Parse error: {e}"),
                ));
            },
        };
        self.handle_value(value).await
    }

    pub async fn handle_value(&self, value: Value) -> Option<JsonRpcResponse> {
        let id = value.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => self.handle_request(&request).await,
            Err(e) => Some(JsonRpcResponse::failure(
                id,
                codes::INVALID_REQUEST,
                format!("Invalid Request: {e}"),
            )),
        }
    }

    pub async fn handle_request(&self, req: &JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = match &req.id {
            Some(id) => id.clone(),
            None => {
                tracing::debug!(method = %req.method, "Notification received");
                return None;
            },
        };
        if req.method.starts_with("notifications/") {
            return None;
        }
        tracing::debug!(method = %req.method, %id, "MCP request");

        let params = &req.params;
        Some(match req.method.as_str() {
            "initialize" => JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": MCP_PROTOCOL_VERSION,
                    "capabilities": { "tools": {}, "resources": {} },
                    "serverInfo": { "name": self.state.name, "version": env!("CARGO_PKG_VERSION") }
                }),
            ),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" | "mcp.list_tools" => JsonRpcResponse::success(id, get_tools_json()),
            "tools/call" => {
                let name = params.get("name").and_then(Value::as_str).unwrap_or("");
                let args = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
                self.call_tool(id, name, &args).await
            },
            "mcp.call_tool" => {
                let name = params.get("tool_name").and_then(Value::as_str).unwrap_or("");
                let args = params.get("params").cloned().unwrap_or_else(|| json!({}));
                self.call_tool(id, name, &args).await
            },
            "resources/list" | "mcp.list_resources" => {
                JsonRpcResponse::success(id, resources::list_json(&self.db_config))
            },
            "resources/templates/list" => {
                JsonRpcResponse::success(id, resources::templates_json(&self.db_config))
            },
            "resources/read" => {
                let uri = params.get("uri").and_then(Value::as_str).unwrap_or("");
                self.read_resource(id, uri).await
            },
            "mcp.read_resource" => {
                let uri = params.get("resource_id").and_then(Value::as_str).unwrap_or("");
                self.read_resource(id, uri).await
            },
            _ => JsonRpcResponse::failure(
                id,
                codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", req.method),
            ),
        })
    }

    async fn call_tool(&self, id: Value, name: &str, args: &Value) -> JsonRpcResponse {
        let Some(tool) = McpTool::parse(name) else {
            return JsonRpcResponse::failure(
                id,
                codes::INVALID_PARAMS,
                format!("Unknown tool: '{name}'. Available: get_data, check_server_status"),
            );
        };

        let result = match tool {
            McpTool::GetData => match args.get("query").and_then(Value::as_str) {
                Some(query) if !query.trim().is_empty() => {
                    mcp_text(&self.text_to_sql.answer(query).await)
                },
                _ => mcp_err("query is required"),
            },
            McpTool::CheckServerStatus => mcp_text(&self.status().await.report()),
        };
        JsonRpcResponse::success(id, result)
    }

    async fn read_resource(&self, id: Value, uri: &str) -> JsonRpcResponse {
        let text = match resources::parse_uri(&self.db_config, uri) {
            Some(ResourceTarget::Schema) => self.db.schema().await,
            Some(ResourceTarget::Table(table)) => {
                self.db.table_rows_csv(&table, MAX_RESULT_ROWS).await
            },
            None => {
                return JsonRpcResponse::failure(
                    id,
                    codes::INVALID_PARAMS,
                    format!("Unknown resource: {uri}"),
                );
            },
        };
        match text {
            Ok(text) => JsonRpcResponse::success(
                id,
                json!({ "contents": [{ "uri": uri, "mimeType": "text/plain", "text": text }] }),
            ),
            Err(e) => {
                tracing::warn!(uri, error = %e, "Resource read failed");
                JsonRpcResponse::failure(id, codes::INTERNAL_ERROR, format!("Database error: {e}"))
            },
        }
    }
}
