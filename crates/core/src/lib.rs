//! Core types shared across xiyan-sql crates
//!
//! Configuration loading, JSON-RPC envelopes, SQL fence extraction and the
//! constants that bound result sizes and repair attempts.

mod config;
mod constants;
mod dialect;
mod env_config;
mod error;
mod fence;
mod jsonrpc;

pub use config::*;
pub use constants::*;
pub use dialect::*;
pub use env_config::*;
pub use error::*;
pub use fence::*;
pub use jsonrpc::*;
