//! Service layer for xiyan-sql
//!
//! Turns a natural-language question into SQL with the model, executes it and
//! repairs failing statements before rendering the final result.

#![allow(clippy::missing_errors_doc, reason = "Errors are self-explanatory from Result types")]
#![allow(clippy::implicit_return, reason = "Implicit return is idiomatic Rust")]
#![allow(clippy::question_mark_used, reason = "? operator is idiomatic Rust")]

mod error;
mod prompts;
mod text_to_sql;

pub use error::ServiceError;
pub use text_to_sql::{SqlAnswer, TextToSqlService};
