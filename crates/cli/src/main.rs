mod commands;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use xiyan_core::{AppConfig, Transport, resolve_config_path};

#[derive(Parser)]
#[command(name = "xiyan")]
#[command(about = "Text-to-SQL assistant: MCP server, model API and SSE test client", long_about = None)]
struct Cli {
    /// YAML configuration file (falls back to $YML, then ./config.yml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server
    Mcp {
        /// Transport override; defaults to `mcp.transport` from the config
        transport: Option<Transport>,
    },
    /// Run the OpenAI-compatible model API in front of an inference backend
    Serve {
        #[arg(short, long, default_value = "8014")]
        port: u16,
        #[arg(short = 'H', long, default_value = "0.0.0.0")]
        host: String,
        /// OpenAI-compatible completions backend, including the `/v1` prefix
        #[arg(long, default_value = "http://127.0.0.1:8000/v1")]
        upstream: String,
        /// Model name forwarded to the backend and reported by `/v1/models`
        #[arg(long, default_value = xiyan_core::DEFAULT_MODEL_NAME)]
        model: String,
        #[arg(long, env = "XIYAN_UPSTREAM_KEY", default_value = "")]
        api_key: String,
        /// System prompt used when a conversation has none
        #[arg(long)]
        system: Option<String>,
        /// Readiness checks before giving up on the backend
        #[arg(long, default_value = "60")]
        ready_attempts: u32,
    },
    /// Exercise a running MCP server over SSE
    Client {
        #[arg(short = 'H', long, default_value = "docker_xiyan_mcp_server")]
        host: String,
        #[arg(short, long, default_value = "8012")]
        port: u16,
        #[arg(short, long, value_enum, default_value = "tool")]
        mode: ClientMode,
        #[arg(long, default_value = "get_data")]
        tool: String,
        #[arg(short, long, default_value = "查询公司有多少人？")]
        query: String,
        #[arg(short, long, default_value = "mysql://ruoyi-vue-pro")]
        resource: String,
    },
    /// Check database connectivity and print the server status report
    Health,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum ClientMode {
    Tool,
    Resource,
    Health,
    All,
}

pub(crate) fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let path = resolve_config_path(explicit);
    AppConfig::load(&path).with_context(|| format!("cannot start without {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // stderr keeps stdout free for the stdio MCP transport.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Mcp { transport } => {
            commands::mcp::run(load_config(config_path)?, transport).await?;
        },
        Commands::Serve { port, host, upstream, model, api_key, system, ready_attempts } => {
            commands::serve::run(commands::serve::ServeArgs {
                host,
                port,
                upstream,
                model,
                api_key,
                system,
                ready_attempts,
            })
            .await?;
        },
        Commands::Client { host, port, mode, tool, query, resource } => {
            commands::client::run(commands::client::ClientArgs {
                host,
                port,
                mode,
                tool,
                query,
                resource,
            })
            .await?;
        },
        Commands::Health => commands::health::run(load_config(config_path)?).await?,
    }

    Ok(())
}
