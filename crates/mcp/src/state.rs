//! Server identity and status reporting.

use std::time::Instant;

use chrono::{DateTime, Local};
use serde::Serialize;
use xiyan_core::{McpConfig, Transport};

const STARTED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Created once at startup and shared by every transport.
#[derive(Debug, Clone)]
pub struct ServerState {
    pub name: String,
    pub transport: Transport,
    pub api_address: String,
    started_at: DateTime<Local>,
    started: Instant,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub hostname: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    pub status: String,
    pub server_name: String,
    pub server_version: String,
    pub mcp_protocol_version: String,
    pub started_at: String,
    pub uptime: String,
    pub database_status: String,
    pub transport: String,
    pub api_address: String,
    pub system: SystemInfo,
}

impl ServerState {
    #[must_use]
    pub fn new(config: &McpConfig) -> Self {
        Self {
            name: config.name.clone(),
            transport: config.transport,
            api_address: config.api_address(),
            started_at: Local::now(),
            started: Instant::now(),
        }
    }

    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Snapshot of the server's health given the outcome of a database ping.
    #[must_use]
    pub fn status(&self, database: Result<(), String>) -> ServerStatus {
        ServerStatus {
            status: "running".to_owned(),
            server_name: self.name.clone(),
            server_version: env!("CARGO_PKG_VERSION").to_owned(),
            mcp_protocol_version: xiyan_core::MCP_PROTOCOL_VERSION.to_owned(),
            started_at: self.started_at.format(STARTED_AT_FORMAT).to_string(),
            uptime: format_uptime(self.uptime_secs()),
            database_status: match database {
                Ok(()) => "ok".to_owned(),
                Err(e) => format!("error: {e}"),
            },
            transport: self.transport.to_string(),
            api_address: self.api_address.clone(),
            system: SystemInfo::current(),
        }
    }
}

impl ServerStatus {
    /// Plain-text rendering returned by the `check_server_status` tool.
    #[must_use]
    pub fn report(&self) -> String {
        format!(
            "服务器状态信息：\n\
             ------------------------\n\
             状态: {}\n\
             服务名称: {}\n\
             服务版本: {}\n\
             MCP版本: {}\n\
             启动时间: {}\n\
             运行时长: {}\n\
             数据库状态: {}\n\
             操作系统: {} ({})\n\
             主机名: {}\n\
             传输模式: {}\n\
             API地址: {}\n\
             ------------------------",
            self.status,
            self.server_name,
            self.server_version,
            self.mcp_protocol_version,
            self.started_at,
            self.uptime,
            self.database_status,
            self.system.os,
            self.system.arch,
            self.system.hostname,
            self.transport,
            self.api_address,
        )
    }
}

impl SystemInfo {
    fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_owned(),
            arch: std::env::consts::ARCH.to_owned(),
            hostname: hostname(),
        }
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_owned())
                .filter(|h| !h.is_empty())
        })
        .unwrap_or_else(|| "unknown".to_owned())
}

/// `H:MM:SS`, prefixed with the day count once it exceeds a day.
#[must_use]
pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    match days {
        0 => format!("{hours}:{minutes:02}:{seconds:02}"),
        1 => format!("1 day, {hours}:{minutes:02}:{seconds:02}"),
        n => format!("{n} days, {hours}:{minutes:02}:{seconds:02}"),
    }
}
