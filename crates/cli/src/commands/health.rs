use anyhow::{Result, bail};
use xiyan_core::AppConfig;
use xiyan_db::Database;
use xiyan_mcp::ServerState;

pub(crate) async fn run(config: AppConfig) -> Result<()> {
    let db = Database::connect_lazy(&config.database)?;
    let ping = db.ping().await.map_err(|e| e.to_string());
    let healthy = ping.is_ok();

    let status = ServerState::new(&config.mcp).status(ping);
    println!("{}", status.report());

    if !healthy {
        bail!("database {} is unreachable", config.database.database);
    }
    Ok(())
}
