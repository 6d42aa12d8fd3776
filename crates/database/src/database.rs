use std::time::Duration;

use futures_util::TryStreamExt as _;
use regex::Regex;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Column as _, Executor as _, Row as _};
use xiyan_core::{DB_POOL_ACQUIRE_TIMEOUT_SECS, DB_POOL_MAX_CONNECTIONS, DatabaseConfig, Dialect};

use crate::identifier::{quote_ident, text_cast, validate_table_name};
use crate::{ColumnSchema, DbError, FetchOutcome, MSchema, QueryResult, TableSchema, to_csv};

const EXAMPLES_PER_COLUMN: usize = 3;
const MAX_EXAMPLE_CHARS: usize = 64;
const NULL_TEXT: &str = "NULL";

/// Connection pool plus the dialect and naming details needed for introspection.
pub struct Database {
    pool: AnyPool,
    dialect: Dialect,
    name: String,
    table_pattern: Option<Regex>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("dialect", &self.dialect)
            .field("name", &self.name)
            .field("table_pattern", &self.table_pattern.as_ref().map(Regex::as_str))
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Builds the pool without connecting; the first query opens a connection.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, DbError> {
        Self::from_url(
            &config.connection_url(),
            config.dialect,
            &config.database,
            config.table_pattern.as_deref(),
            DB_POOL_MAX_CONNECTIONS,
        )
    }

    pub fn from_url(
        url: &str,
        dialect: Dialect,
        name: &str,
        table_pattern: Option<&str>,
        max_connections: u32,
    ) -> Result<Self, DbError> {
        sqlx::any::install_default_drivers();

        let table_pattern = table_pattern
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| DbError::InvalidPattern {
                    pattern: pattern.to_owned(),
                    source,
                })
            })
            .transpose()?;

        // In-memory SQLite databases live exactly as long as their connection.
        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(DB_POOL_ACQUIRE_TIMEOUT_SECS))
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_lazy(url)
            .map_err(DbError::Connect)?;

        tracing::debug!(%dialect, database = name, "Database pool configured");
        Ok(Self { pool, dialect, name: name.to_owned(), table_pattern })
    }

    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(DbError::Connect)?;
        Ok(())
    }

    /// Executes `sql` and returns every row.
    pub async fn fetch(&self, sql: &str) -> FetchOutcome {
        self.fetch_outcome(sql, None).await
    }

    /// Executes `sql` and keeps at most `max_rows` rows.
    pub async fn fetch_truncated(&self, sql: &str, max_rows: usize) -> FetchOutcome {
        self.fetch_outcome(sql, Some(max_rows)).await
    }

    async fn fetch_outcome(&self, sql: &str, limit: Option<usize>) -> FetchOutcome {
        match self.query_text(sql, limit).await {
            Ok(result) => {
                tracing::debug!(rows = result.rows.len(), truncated = result.truncated, "SQL ok");
                FetchOutcome::Success(result)
            },
            Err(e) => {
                tracing::warn!(error = %e, sql, "SQL execution failed");
                FetchOutcome::Failure { error: e.to_string() }
            },
        }
    }

    async fn query_text(&self, sql: &str, limit: Option<usize>) -> Result<QueryResult, sqlx::Error> {
        let mut result = QueryResult::default();
        {
            let mut rows = sqlx::query(sql).fetch(&self.pool);
            while let Some(row) = rows.try_next().await? {
                if result.columns.is_empty() {
                    result.columns = column_names(&row);
                }
                if limit.is_some_and(|max| result.rows.len() >= max) {
                    result.truncated = true;
                    break;
                }
                result.rows.push(row_to_text(&row));
            }
        }

        if result.columns.is_empty() {
            // Empty result sets still have a header.
            if let Ok(described) = (&self.pool).describe(sql).await {
                result.columns = described.columns().iter().map(|c| c.name().to_owned()).collect();
            }
        }
        Ok(result)
    }

    /// First `limit` rows of `table` as CSV (header line, then rows).
    pub async fn table_rows_csv(&self, table: &str, limit: usize) -> Result<String, DbError> {
        let table = validate_table_name(table)?;
        let sql = format!("SELECT * FROM {} LIMIT {limit}", quote_ident(self.dialect, table));
        let result = self.query_text(&sql, Some(limit)).await?;
        if result.columns.is_empty() {
            return Ok(format!("No data found or query error for table {table}"));
        }
        Ok(to_csv(&result))
    }

    /// Introspects tables matching the configured pattern.
    pub async fn mschema(&self) -> Result<MSchema, DbError> {
        let mut tables = Vec::new();
        for name in self.table_names().await? {
            if self.table_pattern.as_ref().is_some_and(|re| !re.is_match(&name)) {
                continue;
            }
            let columns = self.columns(&name).await?;
            tables.push(TableSchema { name, columns });
        }
        tracing::debug!(tables = tables.len(), "Schema introspected");
        Ok(MSchema { db_id: self.name.clone(), tables })
    }

    async fn table_names(&self) -> Result<Vec<String>, DbError> {
        let sql = match self.dialect {
            Dialect::Mysql => {
                "SELECT TABLE_NAME FROM information_schema.TABLES \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' \
                 ORDER BY TABLE_NAME"
            },
            Dialect::Postgresql => {
                "SELECT CAST(table_name AS TEXT) FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_type = 'BASE TABLE' \
                 ORDER BY table_name"
            },
            Dialect::Sqlite => {
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
            },
        };
        let rows = self.text_rows(sql, &[]).await?;
        Ok(rows.into_iter().filter_map(|row| row.into_iter().next().flatten()).collect())
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnSchema>, DbError> {
        let mut columns = match self.dialect {
            Dialect::Mysql => {
                let rows = self
                    .text_rows(
                        "SELECT COLUMN_NAME, COLUMN_TYPE, COLUMN_KEY, COLUMN_COMMENT \
                         FROM information_schema.COLUMNS \
                         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
                         ORDER BY ORDINAL_POSITION",
                        &[table],
                    )
                    .await?;
                rows.into_iter()
                    .map(|row| {
                        let mut cells = row.into_iter();
                        let mut next = || cells.next().flatten().unwrap_or_default();
                        let (name, data_type, key, comment) = (next(), next(), next(), next());
                        column_schema(name, data_type, key == "PRI", Some(comment))
                    })
                    .collect::<Vec<_>>()
            },
            Dialect::Postgresql => {
                let primary_keys: Vec<String> = self
                    .text_rows(
                        "SELECT CAST(kcu.column_name AS TEXT) \
                         FROM information_schema.table_constraints tc \
                         JOIN information_schema.key_column_usage kcu \
                           ON tc.constraint_name = kcu.constraint_name \
                          AND tc.table_schema = kcu.table_schema \
                         WHERE tc.constraint_type = 'PRIMARY KEY' \
                           AND tc.table_schema = current_schema() AND tc.table_name = $1",
                        &[table],
                    )
                    .await?
                    .into_iter()
                    .filter_map(|row| row.into_iter().next().flatten())
                    .collect();
                let rows = self
                    .text_rows(
                        "SELECT CAST(column_name AS TEXT), CAST(data_type AS TEXT) \
                         FROM information_schema.columns \
                         WHERE table_schema = current_schema() AND table_name = $1 \
                         ORDER BY ordinal_position",
                        &[table],
                    )
                    .await?;
                rows.into_iter()
                    .map(|row| {
                        let mut cells = row.into_iter();
                        let name = cells.next().flatten().unwrap_or_default();
                        let data_type = cells.next().flatten().unwrap_or_default();
                        let pk = primary_keys.contains(&name);
                        column_schema(name, data_type, pk, None)
                    })
                    .collect()
            },
            Dialect::Sqlite => {
                let sql = format!("PRAGMA table_info({})", quote_ident(Dialect::Sqlite, table));
                // cid, name, type, notnull, dflt_value, pk
                let rows = self.text_rows(&sql, &[]).await?;
                rows.into_iter()
                    .map(|row| {
                        let cell = |i: usize| row.get(i).cloned().flatten().unwrap_or_default();
                        let pk = cell(5).parse::<i64>().is_ok_and(|n| n > 0);
                        column_schema(cell(1), cell(2), pk, None)
                    })
                    .collect()
            },
        };

        for column in &mut columns {
            column.examples = self.examples(table, &column.name).await;
        }
        Ok(columns)
    }

    /// Up to three distinct non-null values; unreadable columns get none.
    async fn examples(&self, table: &str, column: &str) -> Vec<String> {
        let quoted = quote_ident(self.dialect, column);
        let sql = format!(
            "SELECT DISTINCT {} FROM {} WHERE {quoted} IS NOT NULL LIMIT {EXAMPLES_PER_COLUMN}",
            text_cast(self.dialect, &quoted),
            quote_ident(self.dialect, table),
        );
        match self.text_rows(&sql, &[]).await {
            Ok(rows) => rows
                .into_iter()
                .filter_map(|row| row.into_iter().next().flatten())
                .filter(|value| value.chars().count() <= MAX_EXAMPLE_CHARS)
                .collect(),
            Err(e) => {
                tracing::debug!(table, column, error = %e, "Skipping column examples");
                Vec::new()
            },
        }
    }

    async fn text_rows(
        &self,
        sql: &str,
        binds: &[&str],
    ) -> Result<Vec<Vec<Option<String>>>, DbError> {
        let mut query = sqlx::query(sql);
        for value in binds {
            query = query.bind((*value).to_owned());
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_optional_text).collect())
    }
}

fn column_schema(
    name: String,
    data_type: String,
    primary_key: bool,
    comment: Option<String>,
) -> ColumnSchema {
    ColumnSchema {
        name,
        data_type,
        primary_key,
        comment: comment.filter(|c| !c.is_empty()),
        examples: Vec::new(),
    }
}

fn column_names(row: &AnyRow) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_owned()).collect()
}

fn row_to_text(row: &AnyRow) -> Vec<String> {
    row_to_optional_text(row)
        .into_iter()
        .map(|cell| cell.unwrap_or_else(|| NULL_TEXT.to_owned()))
        .collect()
}

fn row_to_optional_text(row: &AnyRow) -> Vec<Option<String>> {
    (0..row.len()).map(|idx| cell_text(row, idx)).collect()
}

/// Tries the decodable `Any` types in turn; NULL matches the first attempt.
fn cell_text(row: &AnyRow, idx: usize) -> Option<String> {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        v.map(|n| n.to_string())
    } else if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        v.map(|n| n.to_string())
    } else if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        v
    } else if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        v.map(|b| b.to_string())
    } else if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        v.map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_db(pattern: Option<&str>) -> Database {
        let db = Database::from_url("sqlite::memory:", Dialect::Sqlite, "test", pattern, 1)
            .expect("pool");
        for stmt in [
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, score REAL)",
            "CREATE TABLE orders (order_id INTEGER PRIMARY KEY, user_id INTEGER, note TEXT)",
            "INSERT INTO users (id, name, score) VALUES (1, 'alice', 9.5), (2, 'bob', NULL), (3, 'carol', 7.0)",
            "INSERT INTO orders (order_id, user_id, note) VALUES (10, 1, 'first'), (11, 1, NULL)",
        ] {
            sqlx::query(stmt).execute(&db.pool).await.expect("seed");
        }
        db
    }

    #[tokio::test]
    async fn test_ping_memory() {
        let db = memory_db(None).await;
        db.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_success_renders_cells() {
        let db = memory_db(None).await;
        let outcome = db.fetch("SELECT id, name, score FROM users ORDER BY id").await;
        let FetchOutcome::Success(result) = outcome else { panic!("expected success") };
        assert_eq!(result.columns, vec!["id", "name", "score"]);
        assert_eq!(result.rows[0], vec!["1", "alice", "9.5"]);
        assert_eq!(result.rows[1][2], "NULL");
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_text() {
        let db = memory_db(None).await;
        let outcome = db.fetch("SELECT * FROM missing_table").await;
        let error = outcome.error().expect("failure");
        assert!(error.contains("missing_table"));
    }

    #[tokio::test]
    async fn test_fetch_truncated_caps_rows() {
        let db = memory_db(None).await;
        let FetchOutcome::Success(result) = db.fetch_truncated("SELECT * FROM users", 2).await
        else {
            panic!("expected success")
        };
        assert_eq!(result.rows.len(), 2);
        assert!(result.truncated);
    }

    #[tokio::test]
    async fn test_fetch_exact_limit_is_not_truncated() {
        let db = memory_db(None).await;
        let FetchOutcome::Success(result) = db.fetch_truncated("SELECT * FROM users", 3).await
        else {
            panic!("expected success")
        };
        assert_eq!(result.rows.len(), 3);
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn test_aggregate_query() {
        let db = memory_db(None).await;
        let FetchOutcome::Success(result) = db.fetch("SELECT COUNT(*) AS n FROM users").await
        else {
            panic!("expected success")
        };
        assert_eq!(result.rows, vec![vec!["3".to_owned()]]);
    }

    #[tokio::test]
    async fn test_table_rows_csv() {
        let db = memory_db(None).await;
        let csv = db.table_rows_csv("orders", 100).await.unwrap();
        assert_eq!(csv, "order_id,user_id,note\n10,1,first\n11,1,NULL");
    }

    #[tokio::test]
    async fn test_table_rows_csv_rejects_injection() {
        let db = memory_db(None).await;
        let err = db.table_rows_csv("users; DROP TABLE users", 100).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidIdentifier(_)));
    }

    #[tokio::test]
    async fn test_mschema_introspection() {
        let db = memory_db(None).await;
        let schema = db.mschema().await.unwrap();
        assert_eq!(schema.db_id, "test");
        let names: Vec<_> = schema.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["orders", "users"]);

        let users = &schema.tables[1];
        assert!(users.columns[0].primary_key);
        assert_eq!(users.columns[0].data_type, "INTEGER");
        assert_eq!(users.columns[1].examples.len(), 3);
        assert!(users.columns[1].examples.contains(&"alice".to_owned()));

        let text = schema.to_string();
        assert!(text.starts_with("【DB_ID】 test\n【Schema】\n# Table: orders"));
        assert!(text.contains("(id:INTEGER, Primary Key, Examples: ["));
    }

    #[tokio::test]
    async fn test_mschema_table_pattern() {
        let db = memory_db(Some("^user")).await;
        let schema = db.mschema().await.unwrap();
        assert_eq!(schema.tables.len(), 1);
        assert_eq!(schema.tables[0].name, "users");
    }

    #[test]
    fn test_invalid_pattern() {
        let err = Database::from_url("sqlite::memory:", Dialect::Sqlite, "t", Some("("), 1)
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidPattern { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_ping() {
        let db = Database::from_url(
            "sqlite:///nonexistent-dir/definitely/missing.db",
            Dialect::Sqlite,
            "missing",
            None,
            1,
        )
        .expect("lazy pool");
        assert!(db.ping().await.is_err());
    }
}
