use std::sync::Arc;

use xiyan_core::{DB_CONNECT_FAILED, Dialect, MAX_REPAIR_ATTEMPTS, extract_sql};
use xiyan_db::{FetchOutcome, SqlRunner, to_markdown};
use xiyan_llm::ChatModel;

use crate::ServiceError;
use crate::prompts::{generation_messages, repair_messages};

/// The SQL that was finally executed and what it produced.
#[derive(Debug, Clone)]
pub struct SqlAnswer {
    pub sql: String,
    pub outcome: FetchOutcome,
    pub model_calls: usize,
}

/// Natural-language question in, rendered result table out.
#[derive(Clone)]
pub struct TextToSqlService {
    model: Arc<dyn ChatModel>,
    db: Arc<dyn SqlRunner>,
}

impl TextToSqlService {
    #[must_use]
    pub fn new(model: Arc<dyn ChatModel>, db: Arc<dyn SqlRunner>) -> Self {
        Self { model, db }
    }

    /// Answers `question` as text: a markdown table, the database error of the
    /// last attempt, or a connection/model failure message. Never fails.
    pub async fn answer(&self, question: &str) -> String {
        tracing::info!(question, "Text-to-SQL request");
        let schema = match self.db.schema().await {
            Ok(schema) => schema,
            Err(e) => {
                tracing::error!(error = %e, "Database unavailable");
                return format!("{DB_CONNECT_FAILED}{e}");
            },
        };

        match self.run_with_repair(&schema, question).await {
            Ok(answer) => {
                tracing::info!(
                    sql = %answer.sql,
                    calls = answer.model_calls,
                    ok = answer.outcome.is_success(),
                    "Text-to-SQL done"
                );
                to_markdown(&answer.outcome).trim().to_owned()
            },
            Err(e) => {
                tracing::error!(error = %e, "Text-to-SQL failed");
                e.to_string()
            },
        }
    }

    /// Generates SQL, executes it and asks the model to fix failures, using at
    /// most `MAX_REPAIR_ATTEMPTS` model calls in total.
    pub async fn run_with_repair(
        &self,
        schema: &str,
        question: &str,
    ) -> Result<SqlAnswer, ServiceError> {
        if question.trim().is_empty() {
            return Err(ServiceError::InvalidInput("question is empty".to_owned()));
        }
        let dialect = self.db.dialect();

        let mut sql = self.generate_sql(dialect, schema, question).await?;
        let mut model_calls = 1;
        let mut outcome = self.db.run(&sql).await;

        while model_calls < MAX_REPAIR_ATTEMPTS {
            let FetchOutcome::Failure { error } = &outcome else { break };
            tracing::debug!(attempt = model_calls, %error, "Repairing SQL");
            sql = self.repair_sql(dialect, schema, question, &sql, error).await?;
            model_calls += 1;
            outcome = self.db.run(&sql).await;
        }

        Ok(SqlAnswer { sql, outcome, model_calls })
    }

    pub async fn generate_sql(
        &self,
        dialect: Dialect,
        schema: &str,
        question: &str,
    ) -> Result<String, ServiceError> {
        let reply = self.model.chat(generation_messages(dialect, schema, question)).await?;
        Ok(extract_sql(&reply))
    }

    pub async fn repair_sql(
        &self,
        dialect: Dialect,
        schema: &str,
        question: &str,
        sql: &str,
        error: &str,
    ) -> Result<String, ServiceError> {
        let reply = self.model.chat(repair_messages(dialect, schema, question, sql, error)).await?;
        Ok(extract_sql(&reply))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use xiyan_db::{DbError, QueryResult};
    use xiyan_llm::{ChatMessage, LlmError};

    use super::*;

    /// Replies with a fixed sequence of SQL statements and records each prompt.
    struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        prompts: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<String, LlmError>>) -> Arc<Self> {
            Arc::new(Self { replies: Mutex::new(replies.into()), prompts: Mutex::new(Vec::new()) })
        }

        fn sql(statements: &[&str]) -> Arc<Self> {
            Self::new(statements.iter().map(|s| Ok(format!("```sql\n{s}\n```"))).collect())
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(messages);
            self.replies.lock().unwrap().pop_front().unwrap_or(Err(LlmError::EmptyResponse))
        }
    }

    /// Statements starting with `GOOD` succeed; everything else fails.
    struct FakeDb {
        reachable: bool,
        runs: AtomicUsize,
    }

    impl FakeDb {
        fn new(reachable: bool) -> Arc<Self> {
            Arc::new(Self { reachable, runs: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl SqlRunner for FakeDb {
        fn dialect(&self) -> Dialect {
            Dialect::Mysql
        }

        async fn schema(&self) -> Result<String, DbError> {
            if self.reachable {
                Ok("【DB_ID】 test".to_owned())
            } else {
                Err(DbError::Connect(sqlx::Error::PoolTimedOut))
            }
        }

        async fn run(&self, sql: &str) -> FetchOutcome {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if sql.starts_with("GOOD") {
                FetchOutcome::Success(QueryResult {
                    columns: vec!["sql".to_owned()],
                    rows: vec![vec![sql.to_owned()]],
                    truncated: false,
                })
            } else {
                FetchOutcome::Failure { error: format!("syntax error in `{sql}`") }
            }
        }
    }

    fn service(model: &Arc<ScriptedModel>, db: &Arc<FakeDb>) -> TextToSqlService {
        TextToSqlService::new(model.clone(), db.clone())
    }

    #[tokio::test]
    async fn test_first_sql_succeeds_with_one_call() {
        let model = ScriptedModel::sql(&["GOOD 1"]);
        let db = FakeDb::new(true);
        let answer = service(&model, &db).run_with_repair("schema", "q").await.unwrap();
        assert_eq!(model.calls(), 1);
        assert_eq!(answer.sql, "GOOD 1");
        assert!(answer.outcome.is_success());
    }

    #[tokio::test]
    async fn test_fails_twice_then_succeeds_with_three_calls() {
        let model = ScriptedModel::sql(&["BAD 1", "BAD 2", "GOOD 3"]);
        let db = FakeDb::new(true);
        let answer = service(&model, &db).run_with_repair("schema", "q").await.unwrap();
        assert_eq!(model.calls(), 3);
        assert_eq!(answer.model_calls, 3);
        assert_eq!(answer.sql, "GOOD 3");
        assert!(answer.outcome.is_success());
        assert_eq!(db.runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_all_attempts_fail_returns_last_error() {
        let model = ScriptedModel::sql(&["BAD 1", "BAD 2", "BAD 3", "GOOD never"]);
        let db = FakeDb::new(true);
        let svc = service(&model, &db);
        let text = svc.answer("q").await;
        assert_eq!(model.calls(), 3);
        assert_eq!(text, "syntax error in `BAD 3`");
    }

    #[tokio::test]
    async fn test_repair_prompt_includes_failed_sql_and_error() {
        let model = ScriptedModel::sql(&["BAD 1", "GOOD 2"]);
        let db = FakeDb::new(true);
        service(&model, &db).run_with_repair("schema", "q").await.unwrap();
        let prompts = model.prompts.lock().unwrap();
        let repair = &prompts[1][1].content;
        assert!(repair.contains("【待检查SQL】\nBAD 1"));
        assert!(repair.contains("syntax error in `BAD 1`"));
    }

    #[tokio::test]
    async fn test_answer_renders_markdown() {
        let model = ScriptedModel::sql(&["GOOD 1"]);
        let db = FakeDb::new(true);
        let text = service(&model, &db).answer("q").await;
        assert_eq!(text, "| sql |\n| --- |\n| GOOD 1 |");
    }

    #[tokio::test]
    async fn test_unreachable_database_skips_model() {
        let model = ScriptedModel::sql(&["GOOD 1"]);
        let db = FakeDb::new(false);
        let text = service(&model, &db).answer("q").await;
        assert!(text.starts_with(DB_CONNECT_FAILED));
        assert_eq!(model.calls(), 0);
        assert_eq!(db.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_model_failure_becomes_text() {
        let model = ScriptedModel::new(vec![Err(LlmError::HttpStatus {
            code: 401,
            body: "Unauthorized".to_owned(),
        })]);
        let db = FakeDb::new(true);
        let text = service(&model, &db).answer("q").await;
        assert!(text.contains("401"));
        assert_eq!(db.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let model = ScriptedModel::sql(&["GOOD 1"]);
        let db = FakeDb::new(true);
        let err = service(&model, &db).run_with_repair("schema", "  ").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert_eq!(model.calls(), 0);
    }
}
