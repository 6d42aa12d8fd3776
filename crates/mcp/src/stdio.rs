use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::McpServer;

/// Serves newline-delimited JSON-RPC on stdin/stdout until stdin closes.
pub async fn run_stdio(server: Arc<McpServer>) {
    tracing::info!("MCP server starting on stdio");
    serve_lines(&server, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await;
    tracing::info!("MCP stdio input closed");
}

pub(crate) async fn serve_lines<R, W>(server: &McpServer, reader: R, mut writer: W)
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        let Some(response) = server.handle_message(&line).await else {
            continue;
        };
        let Ok(json) = serde_json::to_string(&response) else {
            continue;
        };
        if let Err(e) = writer.write_all(format!("{json}\n").as_bytes()).await {
            tracing::error!("MCP stdout write error: {}", e);
            break;
        }
        if let Err(e) = writer.flush().await {
            tracing::error!("MCP stdout flush error: {}", e);
            break;
        }
    }
}
