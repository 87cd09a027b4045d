//! Rate limiters

use crate::error::{RateLimitError, Result};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Identifies one outbound API call for rate limiting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    pub project: String,
    /// API operation, e.g. "Get" or "Insert"
    pub operation: String,
    /// API version, e.g. "ga"
    pub version: String,
    /// Service category, e.g. "HealthChecks"
    pub service: String,
}

impl RateLimitKey {
    pub fn new(
        project: impl Into<String>,
        service: impl Into<String>,
        operation: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            operation: operation.into(),
            version: version.into(),
            service: service.into(),
        }
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} ({}, {})",
            self.service, self.operation, self.version, self.project
        )
    }
}

/// Admission control for outbound calls.
#[async_trait]
pub trait RateLimiter: Send + Sync + fmt::Debug {
    /// Wait until the call described by `key` may proceed.
    ///
    /// Returns [`RateLimitError::Cancelled`] if `cancel` fires first.
    async fn accept(&self, cancel: &CancellationToken, key: &RateLimitKey) -> Result<()>;

    /// Report the outcome of a call that was admitted.
    fn observe(&self, _key: &RateLimitKey, _error: Option<&(dyn std::error::Error + 'static)>) {}
}

/// Admits every call immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct NopRateLimiter;

#[async_trait]
impl RateLimiter for NopRateLimiter {
    async fn accept(&self, cancel: &CancellationToken, _key: &RateLimitKey) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(RateLimitError::Cancelled);
        }
        Ok(())
    }
}

/// Admits `limit` calls per `interval`, spread evenly.
///
/// At most one permit is banked while idle; callers beyond that queue up.
pub struct TickerRateLimiter {
    limit: u32,
    interval: Duration,
    period: Duration,
    // Created on first use so construction does not need a runtime.
    ticker: Mutex<Option<Interval>>,
}

impl TickerRateLimiter {
    pub fn new(limit: u32, interval: Duration) -> Result<Self> {
        if limit == 0 {
            return Err(RateLimitError::Config("ticker limit must be positive".into()));
        }
        let period = interval / limit;
        if period.is_zero() {
            return Err(RateLimitError::Config(format!(
                "ticker interval {:?} is too short for {} calls",
                interval, limit
            )));
        }
        Ok(Self {
            limit,
            interval,
            period,
            ticker: Mutex::new(None),
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl fmt::Debug for TickerRateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ticker({} per {:?})", self.limit, self.interval)
    }
}

#[async_trait]
impl RateLimiter for TickerRateLimiter {
    async fn accept(&self, cancel: &CancellationToken, key: &RateLimitKey) -> Result<()> {
        let mut guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RateLimitError::Cancelled),
            guard = self.ticker.lock() => guard,
        };
        let ticker = guard.get_or_insert_with(|| {
            let mut ticker = tokio::time::interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RateLimitError::Cancelled),
            _ = ticker.tick() => {
                tracing::trace!(%key, "ticker permit");
                Ok(())
            }
        }
    }
}

/// Spaces admitted calls at least `minimum` apart, whatever the wrapped
/// limiter would allow.
pub struct MinimumRateLimiter {
    inner: Arc<dyn RateLimiter>,
    minimum: Duration,
    last: Mutex<Option<Instant>>,
}

impl MinimumRateLimiter {
    pub fn new(inner: Arc<dyn RateLimiter>, minimum: Duration) -> Self {
        Self {
            inner,
            minimum,
            last: Mutex::new(None),
        }
    }

    pub fn minimum(&self) -> Duration {
        self.minimum
    }
}

impl fmt::Debug for MinimumRateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Minimum({:?}, {:?})", self.minimum, self.inner)
    }
}

#[async_trait]
impl RateLimiter for MinimumRateLimiter {
    async fn accept(&self, cancel: &CancellationToken, key: &RateLimitKey) -> Result<()> {
        // Held until the wrapped limiter admits the call, so callers leave
        // in arrival order and `last` is the real admission time.
        let mut last = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RateLimitError::Cancelled),
            guard = self.last.lock() => guard,
        };

        if let Some(previous) = *last {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RateLimitError::Cancelled),
                _ = tokio::time::sleep_until(previous + self.minimum) => {}
            }
        }

        self.inner.accept(cancel, key).await?;
        *last = Some(Instant::now());
        Ok(())
    }

    fn observe(&self, key: &RateLimitKey, error: Option<&(dyn std::error::Error + 'static)>) {
        self.inner.observe(key, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> RateLimitKey {
        RateLimitKey::new("p", "HealthChecks", "Get", "ga")
    }

    #[tokio::test]
    async fn test_nop() {
        let cancel = CancellationToken::new();
        NopRateLimiter.accept(&cancel, &key()).await.unwrap();
        cancel.cancel();
        assert!(matches!(
            NopRateLimiter.accept(&cancel, &key()).await,
            Err(RateLimitError::Cancelled)
        ));
    }

    #[test]
    fn test_ticker_rejects_bad_config() {
        assert!(TickerRateLimiter::new(0, Duration::from_secs(60)).is_err());
        assert!(TickerRateLimiter::new(10, Duration::from_nanos(5)).is_err());
        let t = TickerRateLimiter::new(1200, Duration::from_secs(60)).unwrap();
        assert_eq!(t.period(), Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_spacing() {
        let t = TickerRateLimiter::new(10, Duration::from_secs(1)).unwrap();
        let cancel = CancellationToken::new();
        let start = Instant::now();
        for _ in 0..3 {
            t.accept(&cancel, &key()).await.unwrap();
        }
        // First permit is immediate, then one every 100ms.
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_banks_one_permit() {
        let t = TickerRateLimiter::new(10, Duration::from_secs(1)).unwrap();
        let cancel = CancellationToken::new();
        t.accept(&cancel, &key()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        let start = Instant::now();
        t.accept(&cancel, &key()).await.unwrap();
        t.accept(&cancel, &key()).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_minimum_spacing() {
        let m = MinimumRateLimiter::new(Arc::new(NopRateLimiter), Duration::from_millis(50));
        let cancel = CancellationToken::new();
        let start = Instant::now();
        m.accept(&cancel, &key()).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
        m.accept(&cancel, &key()).await.unwrap();
        m.accept(&cancel, &key()).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(100));

        // Enough idle time means no wait.
        tokio::time::sleep(Duration::from_millis(80)).await;
        let t = Instant::now();
        m.accept(&cancel, &key()).await.unwrap();
        assert_eq!(t.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_minimum_cancel_releases_slot() {
        let m = Arc::new(MinimumRateLimiter::new(
            Arc::new(NopRateLimiter),
            Duration::from_millis(100),
        ));
        let cancel = CancellationToken::new();
        let start = Instant::now();
        m.accept(&cancel, &key()).await.unwrap();

        let waiter = {
            let m = Arc::clone(&m);
            let cancel = cancel.child_token();
            let token = cancel.clone();
            let handle = tokio::spawn(async move { m.accept(&token, &key()).await });
            (handle, cancel)
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        waiter.1.cancel();
        assert!(matches!(
            waiter.0.await.unwrap(),
            Err(RateLimitError::Cancelled)
        ));

        // The cancelled call was never admitted: the next one is due 100ms
        // after the first one, not 200ms.
        m.accept(&cancel, &key()).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_minimum_holds_behind_shared_ticker() {
        // 60ms period shared with another category.
        let shared: Arc<dyn RateLimiter> =
            Arc::new(TickerRateLimiter::new(1000, Duration::from_secs(60)).unwrap());
        let operations = Arc::new(MinimumRateLimiter::new(
            Arc::clone(&shared),
            Duration::from_millis(100),
        ));
        let cancel = CancellationToken::new();
        let start = Instant::now();
        shared.accept(&cancel, &key()).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..2 {
            let operations = Arc::clone(&operations);
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                operations.accept(&cancel, &key()).await.unwrap();
                start.elapsed()
            }));
        }
        let mut admitted = Vec::new();
        for handle in handles {
            admitted.push(handle.await.unwrap());
        }
        admitted.sort();

        assert_eq!(admitted[0], Duration::from_millis(60));
        assert!(admitted[1] - admitted[0] >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_minimum_cancel_inside_wrapped_limiter() {
        let shared: Arc<dyn RateLimiter> =
            Arc::new(TickerRateLimiter::new(1, Duration::from_secs(1)).unwrap());
        let m = Arc::new(MinimumRateLimiter::new(
            Arc::clone(&shared),
            Duration::from_millis(10),
        ));
        let cancel = CancellationToken::new();
        let start = Instant::now();
        m.accept(&cancel, &key()).await.unwrap();

        // Waits on the ticker, not on the minimum spacing.
        let token = cancel.child_token();
        let waiter = {
            let m = Arc::clone(&m);
            let token = token.clone();
            tokio::spawn(async move { m.accept(&token, &key()).await })
        };
        tokio::time::sleep(Duration::from_millis(500)).await;
        token.cancel();
        assert!(matches!(waiter.await.unwrap(), Err(RateLimitError::Cancelled)));

        m.accept(&cancel, &key()).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }
}
