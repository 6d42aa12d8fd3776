use std::time::Duration;

use anyhow::{Result, bail};
use serde_json::{Value, json};
use xiyan_client::McpClient;

use crate::ClientMode;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub(crate) struct ClientArgs {
    pub host: String,
    pub port: u16,
    pub mode: ClientMode,
    pub tool: String,
    pub query: String,
    pub resource: String,
}

pub(crate) async fn run(args: ClientArgs) -> Result<()> {
    let client = McpClient::new(&args.host, args.port).with_request_timeout(REQUEST_TIMEOUT);
    println!("Connecting to {}", client.stream_url());

    if args.mode == ClientMode::Health {
        return print_health(&client).await;
    }

    client.connect();
    if !client.wait_ready(CONNECT_TIMEOUT).await {
        bail!("could not open SSE stream at {}", client.stream_url());
    }

    client.initialize().await?;
    println!("Session initialized");

    println!("\nAvailable tools:");
    for tool in client.list_tools().await? {
        println!("  - {}", tool.get("name").and_then(Value::as_str).unwrap_or("?"));
    }

    if matches!(args.mode, ClientMode::Tool | ClientMode::All) {
        let arguments = match args.tool.as_str() {
            "get_data" => json!({ "query": args.query }),
            _ => json!({}),
        };
        println!("\nCalling tool {} with {arguments}", args.tool);
        match client.call_tool(&args.tool, arguments).await? {
            Some(result) => println!("{}", tool_text(&result)),
            None => println!("(no result)"),
        }
    }

    if matches!(args.mode, ClientMode::Resource | ClientMode::All) {
        println!("\nAvailable resources:");
        for resource in client.list_resources().await? {
            println!("  - {}", resource.get("uri").and_then(Value::as_str).unwrap_or("?"));
        }
        println!("\nReading {}", args.resource);
        println!("{}", client.read_resource(&args.resource).await?);
    }

    if args.mode == ClientMode::All {
        print_health(&client).await?;
    }

    client.close();
    Ok(())
}

async fn print_health(client: &McpClient) -> Result<()> {
    println!("\nHealth:");
    let health = client.health().await?;
    println!("{}", serde_json::to_string_pretty(&health)?);
    Ok(())
}

/// Joins the text blocks of an MCP tool result.
fn tool_text(result: &Value) -> String {
    result
        .get("content")
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_else(|| result.to_string())
}
