pub(crate) mod client;
pub(crate) mod health;
pub(crate) mod mcp;
pub(crate) mod serve;
