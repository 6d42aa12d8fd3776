use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {code}: {body}")]
    Status { code: u16, body: String },

    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request {id} was dropped before a response arrived")]
    Dropped { id: String },

    #[error("request {id} timed out after {after:?}")]
    Timeout { id: String, after: Duration },
}
