use serde_json::json;

/// All MCP tools exposed by this server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpTool {
    GetData,
    CheckServerStatus,
}

impl McpTool {
    /// Parse tool name from JSON-RPC request.
    /// Returns None for unknown tools (caller must handle error).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "get_data" => Some(Self::GetData),
            "check_server_status" => Some(Self::CheckServerStatus),
            _ => None,
        }
    }
}

/// Returns the JSON schema for all MCP tools.
pub fn get_tools_json() -> serde_json::Value {
    json!({
        "tools": [
            {
                "name": "get_data",
                "description": "Fetch the data from database through a natural language query. Params: query (required), e.g. 查询在2024年每个月，卡宴的各经销商销量分别是多少",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "description": "The query in natural language" }
                    },
                    "required": ["query"]
                }
            },
            {
                "name": "check_server_status",
                "description": "检查服务器运行状态: version, database connectivity, uptime and transport details.",
                "inputSchema": { "type": "object", "properties": {} }
            }
        ]
    })
}
