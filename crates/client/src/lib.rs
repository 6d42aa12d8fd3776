//! MCP client over Server-Sent Events.
//!
//! Requests are POSTed as JSON-RPC envelopes; responses arrive on a single
//! long-lived SSE stream and are matched to the waiting caller by `id`.

mod client;
mod dispatcher;
mod error;
pub mod sse;

pub use client::McpClient;
pub use dispatcher::{Dispatcher, PendingRequests};
pub use error::ClientError;
pub use sse::{SseEvent, SseParser};
