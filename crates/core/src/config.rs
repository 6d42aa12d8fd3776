//! YAML configuration for the MCP server, the model client and the database.
//!
//! Layout mirrors the deployment file:
//!
//! ```yaml
//! model:
//!   name: xiyan-sql
//!   key: ""
//!   url: http://localhost:8014/v1
//! database:
//!   dialect: mysql
//!   host: 127.0.0.1
//!   port: 3306
//!   user: root
//!   password: secret
//!   database: ruoyi
//!   table_pattern: "^sys_.*"
//! mcp:
//!   name: xiyan
//!   host: 0.0.0.0
//!   port: 8012
//!   transport: sse
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{CONFIG_PATH_ENV, ConfigError, DEFAULT_MODEL_NAME, Dialect, env_parse_with_default, env_string};

const DEFAULT_CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub model: ModelConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub mcp: McpConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_name")]
    pub name: String,
    #[serde(default)]
    pub key: String,
    pub url: String,
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ModelConfig")
            .field("name", &self.name)
            .field("key", &"***")
            .field("url", &self.url)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub dialect: Dialect,
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub database: String,
    /// Regex restricting which tables appear in the schema description.
    #[serde(default)]
    pub table_pattern: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            host: default_db_host(),
            port: None,
            user: String::new(),
            password: String::new(),
            database: String::new(),
            table_pattern: None,
        }
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DatabaseConfig")
            .field("dialect", &self.dialect)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("table_pattern", &self.table_pattern)
            .finish()
    }
}

impl DatabaseConfig {
    /// Connection URL for the sqlx `Any` driver.
    #[must_use]
    pub fn connection_url(&self) -> String {
        match self.dialect {
            Dialect::Sqlite => format!("sqlite://{}", self.database),
            dialect => {
                let port = self.port.or(dialect.default_port()).unwrap_or_default();
                let credentials = if self.user.is_empty() {
                    String::new()
                } else if self.password.is_empty() {
                    format!("{}@", urlencoding::encode(&self.user))
                } else {
                    format!(
                        "{}:{}@",
                        urlencoding::encode(&self.user),
                        urlencoding::encode(&self.password)
                    )
                };
                format!(
                    "{}://{credentials}{}:{port}/{}",
                    dialect.url_scheme(),
                    self.host,
                    self.database
                )
            },
        }
    }

    /// URI under which the schema resource is published, e.g. `mysql://sales`.
    #[must_use]
    pub fn schema_resource_uri(&self) -> String {
        format!("{}://{}", self.dialect, self.database)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Stdio,
    #[default]
    Sse,
}

impl Display for Transport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match *self {
            Self::Stdio => write!(f, "stdio"),
            Self::Sse => write!(f, "sse"),
        }
    }
}

impl FromStr for Transport {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdio" => Ok(Self::Stdio),
            "sse" => Ok(Self::Sse),
            other => Err(ConfigError::Invalid(format!("unknown transport: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(default = "default_server_name")]
    pub name: String,
    #[serde(default = "default_mcp_host")]
    pub host: String,
    #[serde(default = "default_mcp_port")]
    pub port: u16,
    #[serde(default)]
    pub transport: Transport,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            host: default_mcp_host(),
            port: default_mcp_port(),
            transport: Transport::default(),
        }
    }
}

impl McpConfig {
    #[must_use]
    pub fn api_address(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl AppConfig {
    /// Load configuration from a YAML file, then apply environment overrides.
    ///
    /// # Errors
    /// Returns an error if the file is missing, unreadable or not valid YAML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        tracing::info!("Loading configuration from {}", path.display());
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound { path: display.clone() }
            } else {
                ConfigError::Io { path: display.clone(), source }
            }
        })?;
        let mut config = Self::from_yaml_str(&raw).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse { path: display, source },
            other => other,
        })?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from YAML text without touching the environment.
    ///
    /// # Errors
    /// Returns an error if the text is not valid YAML for this layout.
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(raw)
            .map_err(|source| ConfigError::Parse { path: "<inline>".to_owned(), source })
    }

    fn apply_env_overrides(&mut self) {
        self.mcp.port = env_parse_with_default("XIYAN_MCP_PORT", self.mcp.port);
        if let Some(host) = env_string("XIYAN_MCP_HOST") {
            self.mcp.host = host;
        }
        if let Some(key) = env_string("XIYAN_MODEL_KEY") {
            self.model.key = key;
        }
        if let Some(url) = env_string("XIYAN_MODEL_URL") {
            self.model.url = url;
        }
    }
}

/// Resolve the configuration path: explicit flag, then `$YML`, then the user
/// config directory, then `./config.yml`.
#[must_use]
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Some(path) = env_string(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    if let Some(dir) = dirs::config_dir() {
        let candidate = dir.join("xiyan").join(DEFAULT_CONFIG_FILE);
        if candidate.exists() {
            return candidate;
        }
    }
    PathBuf::from(DEFAULT_CONFIG_FILE)
}

fn default_model_name() -> String {
    DEFAULT_MODEL_NAME.to_owned()
}

fn default_db_host() -> String {
    "localhost".to_owned()
}

fn default_server_name() -> String {
    "xiyan".to_owned()
}

fn default_mcp_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_mcp_port() -> u16 {
    8080
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
model:
  name: xiyan-sql
  key: sk-test
  url: http://localhost:8014/v1
database:
  dialect: mysql
  host: db
  user: root
  password: "p@ss:word"
  database: ruoyi
mcp:
  port: 8012
"#;

    #[test]
    fn parses_sample_with_defaults() {
        let config = AppConfig::from_yaml_str(SAMPLE).expect("parse");
        assert_eq!(config.model.name, "xiyan-sql");
        assert_eq!(config.database.dialect, Dialect::Mysql);
        assert_eq!(config.mcp.port, 8012);
        assert_eq!(config.mcp.host, "0.0.0.0");
        assert_eq!(config.mcp.transport, Transport::Sse);
        assert_eq!(config.mcp.name, "xiyan");
    }

    #[test]
    fn connection_url_encodes_credentials() {
        let config = AppConfig::from_yaml_str(SAMPLE).expect("parse");
        assert_eq!(
            config.database.connection_url(),
            "mysql://root:p%40ss%3Aword@db:3306/ruoyi"
        );
        assert_eq!(config.database.schema_resource_uri(), "mysql://ruoyi");
    }

    #[test]
    fn sqlite_url_uses_database_path() {
        let db = DatabaseConfig {
            dialect: Dialect::Sqlite,
            database: "/tmp/demo.db".to_owned(),
            ..DatabaseConfig::default()
        };
        assert_eq!(db.connection_url(), "sqlite:///tmp/demo.db");
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = AppConfig::from_yaml_str(SAMPLE).expect("parse");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-test"));
        assert!(!rendered.contains("p@ss:word"));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = AppConfig::load(Path::new("/nonexistent/xiyan.yml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(SAMPLE.as_bytes()).expect("write");
        let config = AppConfig::load(file.path()).expect("load");
        assert_eq!(config.database.database, "ruoyi");
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        let err = AppConfig::from_yaml_str("model: [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn explicit_path_wins() {
        let path = resolve_config_path(Some(Path::new("/etc/xiyan.yml")));
        assert_eq!(path, PathBuf::from("/etc/xiyan.yml"));
    }
}
