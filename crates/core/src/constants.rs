//! Shared constants for xiyan-sql.
//!
//! Centralizes limits that both the MCP server and the model API rely on.

/// Maximum rows rendered into a query result table or a table preview.
pub const MAX_RESULT_ROWS: usize = 100;

/// Total model calls allowed while repairing a failing SQL statement.
pub const MAX_REPAIR_ATTEMPTS: usize = 3;

/// MCP protocol revision announced during `initialize`.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC version string carried by every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Database connection pool: maximum connections.
pub const DB_POOL_MAX_CONNECTIONS: u32 = 5;

/// Database connection pool: acquire timeout in seconds.
pub const DB_POOL_ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// Default sampling temperature for chat completions.
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Default nucleus sampling value for chat completions.
pub const DEFAULT_TOP_P: f32 = 0.8;

/// Default generation budget for chat completions.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Model name reported when a chat request omits one.
pub const DEFAULT_MODEL_NAME: &str = "xiyan-sql";

/// User-facing prefix returned when the database cannot be reached.
pub const DB_CONNECT_FAILED: &str = "数据库连接失败";
