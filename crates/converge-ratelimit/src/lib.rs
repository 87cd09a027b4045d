//! converge-ratelimit
//!
//! Admission control for outbound cloud API calls. Each call is described
//! by a [`RateLimitKey`] and routed by a [`CompositeRateLimiter`] to the
//! quota of its service category.

pub mod composite;
pub mod config;
pub mod error;
pub mod limiter;

pub use composite::CompositeRateLimiter;
pub use config::{RateLimitConfig, find_config_file};
pub use error::{RateLimitError, Result};
pub use limiter::{
    MinimumRateLimiter, NopRateLimiter, RateLimitKey, RateLimiter, TickerRateLimiter,
};
pub use tokio_util::sync::CancellationToken;
