//! Rate limiter error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RateLimitError {
    #[error("rate limit wait cancelled")]
    Cancelled,

    #[error("Invalid rate limit configuration: {0}")]
    Config(String),

    #[error("KDL parse error: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("Rate limit config file not found")]
    ConfigNotFound,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RateLimitError>;
