//! Classification failure kinds.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("classifier timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed classifier response: {0}")]
    MalformedResponse(String),

    #[error("classifier authentication failed: {0}")]
    AuthFailure(String),

    #[error("classifier rate limited: {0}")]
    RateLimited(String),

    #[error("classifier transport error: {0}")]
    Transport(String),
}
