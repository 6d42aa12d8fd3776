//! Resource URIs: `<dialect>://<database>` for the schema and
//! `<dialect>://<table>` for table previews.

use serde_json::{Value, json};
use xiyan_core::DatabaseConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceTarget {
    Schema,
    Table(String),
}

/// Maps a URI to its target; `None` when the scheme is not this server's dialect.
#[must_use]
pub fn parse_uri(config: &DatabaseConfig, uri: &str) -> Option<ResourceTarget> {
    let prefix = format!("{}://", config.dialect);
    let rest = uri.strip_prefix(&prefix)?;
    if rest.is_empty() {
        return None;
    }
    if rest == config.database {
        Some(ResourceTarget::Schema)
    } else {
        Some(ResourceTarget::Table(rest.to_owned()))
    }
}

#[must_use]
pub fn list_json(config: &DatabaseConfig) -> Value {
    json!({
        "resources": [{
            "uri": config.schema_resource_uri(),
            "name": config.database,
            "description": "Database schema in mschema form",
            "mimeType": "text/plain"
        }]
    })
}

#[must_use]
pub fn templates_json(config: &DatabaseConfig) -> Value {
    json!({
        "resourceTemplates": [{
            "uriTemplate": format!("{}://{{table_name}}", config.dialect),
            "name": "table",
            "description": "First rows of a table as CSV",
            "mimeType": "text/csv"
        }]
    })
}
