//! Circuit breaker around a search index

use super::{IndexRequest, IndexResponse, SearchIndex};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Default)]
struct BreakerState {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    /// Start of the half-open trial call, if one is running
    trial_started: Option<Instant>,
}

/// Rejects submissions for `cooldown` after `failure_threshold`
/// consecutive failures. The first call after the cooldown is a trial
/// and others are still rejected while it runs: success closes the
/// breaker, failure opens it again. A trial that never reports back
/// is abandoned after another `cooldown`.
pub struct CircuitBreaker<S> {
    inner: S,
    failure_threshold: u32,
    cooldown: Duration,
    state: Mutex<BreakerState>,
}

impl<S: SearchIndex> CircuitBreaker<S> {
    pub fn new(inner: S, failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            inner,
            failure_threshold: failure_threshold.max(1),
            cooldown,
            state: Mutex::new(BreakerState::default()),
        }
    }

    /// Whether a call made now would be rejected
    pub async fn is_open(&self) -> bool {
        let state = self.state.lock().await;
        self.rejects(&state)
    }

    fn rejects(&self, state: &BreakerState) -> bool {
        let within = |at: Option<Instant>| matches!(at, Some(at) if at.elapsed() < self.cooldown);
        state.opened_at.is_some() && (within(state.opened_at) || within(state.trial_started))
    }

    /// Let the call through, claiming the trial slot when half-open
    async fn admit(&self) -> bool {
        let mut state = self.state.lock().await;
        if self.rejects(&state) {
            return false;
        }
        if state.opened_at.is_some() {
            info!("Search circuit breaker half-open, sending trial call");
            state.trial_started = Some(Instant::now());
        }
        true
    }

    async fn record_success(&self) {
        let mut state = self.state.lock().await;
        if state.opened_at.take().is_some() {
            info!("Search circuit breaker closed");
        }
        state.trial_started = None;
        state.consecutive_failures = 0;
    }

    async fn record_failure(&self) {
        let mut state = self.state.lock().await;
        state.consecutive_failures += 1;
        state.trial_started = None;
        if state.consecutive_failures >= self.failure_threshold {
            if state.opened_at.is_none() {
                warn!(
                    failures = state.consecutive_failures,
                    cooldown_secs = self.cooldown.as_secs(),
                    "Search circuit breaker opened"
                );
            }
            state.opened_at = Some(Instant::now());
        }
    }
}

#[async_trait]
impl<S: SearchIndex> SearchIndex for CircuitBreaker<S> {
    async fn index(&self, request: IndexRequest) -> Result<IndexResponse> {
        if !self.admit().await {
            return Err(AppError::CircuitBreakerOpen {
                service: "search".to_string(),
            });
        }

        match self.inner.index(request).await {
            Ok(response) => {
                self.record_success().await;
                Ok(response)
            }
            Err(e) => {
                self.record_failure().await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::MockSearchIndex;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn request() -> IndexRequest {
        IndexRequest {
            index: "catman".to_string(),
            doc_type: "article".to_string(),
            id: "a".to_string(),
            body: serde_json::json!({}),
            parent: None,
        }
    }

    /// Fails until switched healthy; every call takes `delay`
    struct Flaky {
        healthy: AtomicBool,
        delay: Duration,
        inner: MockSearchIndex,
    }

    impl Flaky {
        fn new(delay: Duration) -> Self {
            Self {
                healthy: AtomicBool::new(false),
                delay,
                inner: MockSearchIndex::new(),
            }
        }
    }

    #[async_trait]
    impl SearchIndex for Flaky {
        async fn index(&self, request: IndexRequest) -> Result<IndexResponse> {
            tokio::time::sleep(self.delay).await;
            if self.healthy.load(Ordering::SeqCst) {
                self.inner.index(request).await
            } else {
                Err(AppError::SearchEngine {
                    message: "down".to_string(),
                })
            }
        }
    }

    #[tokio::test]
    async fn test_opens_after_threshold() {
        let breaker = CircuitBreaker::new(MockSearchIndex::failing(), 2, Duration::from_secs(60));

        assert!(matches!(
            breaker.index(request()).await,
            Err(AppError::SearchEngine { .. })
        ));
        assert!(!breaker.is_open().await);
        assert!(breaker.index(request()).await.is_err());
        assert!(breaker.is_open().await);

        // rejected without reaching the engine
        assert!(matches!(
            breaker.index(request()).await,
            Err(AppError::CircuitBreakerOpen { .. })
        ));
        assert_eq!(breaker.inner.requests().await.len(), 2);
    }

    #[tokio::test]
    async fn test_trial_call_after_cooldown_closes() {
        let breaker = CircuitBreaker::new(Flaky::new(Duration::ZERO), 1, Duration::from_millis(20));

        assert!(breaker.index(request()).await.is_err());
        assert!(breaker.is_open().await);

        breaker.inner.healthy.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(breaker.index(request()).await.is_ok());
        assert!(!breaker.is_open().await);
    }

    #[tokio::test]
    async fn test_half_open_admits_a_single_trial() {
        let breaker = CircuitBreaker::new(
            Flaky::new(Duration::from_millis(50)),
            1,
            Duration::from_millis(20),
        );

        assert!(breaker.index(request()).await.is_err());
        breaker.inner.healthy.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;

        let (first, second) = tokio::join!(breaker.index(request()), breaker.index(request()));
        assert!(first.is_ok());
        assert!(matches!(second, Err(AppError::CircuitBreakerOpen { .. })));
        assert_eq!(breaker.inner.inner.requests().await.len(), 1);
        assert!(!breaker.is_open().await);
    }

    #[tokio::test]
    async fn test_failed_trial_reopens() {
        let breaker = CircuitBreaker::new(Flaky::new(Duration::ZERO), 3, Duration::from_millis(20));
        for _ in 0..3 {
            assert!(breaker.index(request()).await.is_err());
        }
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(matches!(
            breaker.index(request()).await,
            Err(AppError::SearchEngine { .. })
        ));
        assert!(matches!(
            breaker.index(request()).await,
            Err(AppError::CircuitBreakerOpen { .. })
        ));
    }
}
