//! Typed error enum for the service layer.
//!
//! Unifies model and database failures so handlers can report them as text
//! or match on the failing side.

use thiserror::Error;
use xiyan_db::DbError;
use xiyan_llm::LlmError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("database: {0}")]
    Database(#[from] DbError),

    #[error("llm: {0}")]
    Llm(#[from] LlmError),

    /// Caller provided invalid input (empty question).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
