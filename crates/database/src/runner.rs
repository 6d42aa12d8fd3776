use async_trait::async_trait;
use xiyan_core::{Dialect, MAX_RESULT_ROWS};

use crate::{Database, DbError, FetchOutcome};

/// What the text-to-SQL loop needs from a database.
#[async_trait]
pub trait SqlRunner: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Connects if necessary and returns the mschema text used as prompt context.
    async fn schema(&self) -> Result<String, DbError>;

    /// Executes `sql`, keeping at most the result-row limit.
    async fn run(&self, sql: &str) -> FetchOutcome;
}

#[async_trait]
impl SqlRunner for Database {
    fn dialect(&self) -> Dialect {
        Self::dialect(self)
    }

    async fn schema(&self) -> Result<String, DbError> {
        Ok(self.mschema().await?.to_string())
    }

    async fn run(&self, sql: &str) -> FetchOutcome {
        self.fetch_truncated(sql, MAX_RESULT_ROWS).await
    }
}
