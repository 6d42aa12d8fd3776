//! SQL dialects the assistant can target.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Database dialect, used both for the connection URL scheme and in prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Mysql,
    #[serde(alias = "postgres")]
    Postgresql,
    Sqlite,
}

impl Dialect {
    /// URL scheme understood by the sqlx `Any` driver.
    #[must_use]
    pub const fn url_scheme(self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Postgresql => "postgres",
            Self::Sqlite => "sqlite",
        }
    }

    /// Default server port, `None` for file-backed dialects.
    #[must_use]
    pub const fn default_port(self) -> Option<u16> {
        match self {
            Self::Mysql => Some(3306),
            Self::Postgresql => Some(5432),
            Self::Sqlite => None,
        }
    }
}

impl Display for Dialect {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match *self {
            Self::Mysql => write!(f, "mysql"),
            Self::Postgresql => write!(f, "postgresql"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for Dialect {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mysql" => Ok(Self::Mysql),
            "postgresql" | "postgres" => Ok(Self::Postgresql),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(ConfigError::Invalid(format!("unsupported dialect: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases() {
        assert_eq!("MySQL".parse::<Dialect>().ok(), Some(Dialect::Mysql));
        assert_eq!("postgres".parse::<Dialect>().ok(), Some(Dialect::Postgresql));
        assert_eq!("sqlite".parse::<Dialect>().ok(), Some(Dialect::Sqlite));
        assert!("oracle".parse::<Dialect>().is_err());
    }

    #[test]
    fn display_matches_prompt_wording() {
        assert_eq!(Dialect::Postgresql.to_string(), "postgresql");
        assert_eq!(Dialect::Postgresql.url_scheme(), "postgres");
    }
}
