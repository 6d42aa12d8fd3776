//! MCP (Model Context Protocol) server for xiyan-sql.
//!
//! Exposes the `get_data` text-to-SQL tool, a status tool and database
//! resources over stdio or SSE.

#![allow(clippy::implicit_return, reason = "Implicit return is idiomatic Rust")]
#![allow(clippy::question_mark_used, reason = "? operator is idiomatic Rust")]
#![allow(clippy::single_call_fn, reason = "Handler functions improve readability")]
#![allow(unreachable_pub, reason = "pub items are re-exported")]

mod handlers;
mod resources;
pub mod sse;
mod state;
mod stdio;
mod tools;

pub use handlers::McpServer;
pub use resources::ResourceTarget;
pub use sse::{create_router, run_sse};
pub use state::{ServerState, ServerStatus, SystemInfo, format_uptime};
pub use stdio::run_stdio;
pub use tools::McpTool;
