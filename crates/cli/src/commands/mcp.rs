use std::sync::Arc;

use anyhow::Result;
use xiyan_core::{AppConfig, Transport};
use xiyan_db::Database;
use xiyan_llm::LlmClient;
use xiyan_mcp::{McpServer, ServerState, run_sse, run_stdio};
use xiyan_service::TextToSqlService;

pub(crate) async fn run(mut config: AppConfig, transport: Option<Transport>) -> Result<()> {
    if let Some(transport) = transport {
        config.mcp.transport = transport;
    }

    // Unreachable databases surface through check_server_status, not startup.
    let db = Arc::new(Database::connect_lazy(&config.database)?);
    let llm = Arc::new(LlmClient::new(
        config.model.key.clone(),
        config.model.url.clone(),
        config.model.name.clone(),
    )?);
    tracing::info!(
        model = %config.model.name,
        url = %config.model.url,
        dialect = %config.database.dialect,
        database = %config.database.database,
        "Text-to-SQL backend configured"
    );

    let text_to_sql = TextToSqlService::new(llm, db.clone());
    let state = ServerState::new(&config.mcp);
    let server = Arc::new(McpServer::new(state, config.database.clone(), db, text_to_sql));

    match config.mcp.transport {
        Transport::Stdio => run_stdio(server).await,
        Transport::Sse => {
            let addr = format!("{}:{}", config.mcp.host, config.mcp.port);
            run_sse(server, &addr).await?;
        },
    }
    Ok(())
}
