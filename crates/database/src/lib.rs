//! Database access for xiyan-sql
//!
//! A dialect-agnostic `sqlx::AnyPool` wrapper that executes model-generated
//! SQL, renders results as text and describes the schema in mschema form.

mod database;
pub mod error;
mod identifier;
mod result;
mod runner;
mod schema;

pub use database::Database;
pub use error::DbError;
pub use result::{FetchOutcome, QueryResult, to_csv, to_markdown};
pub use runner::SqlRunner;
pub use schema::{ColumnSchema, MSchema, TableSchema};
