//! Source adapters: uniform async wrappers over external services.
//!
//! Every adapter exposes a `call(query, ctx) -> AdapterResult` contract: it
//! respects a caller-supplied deadline, never panics into the orchestrator,
//! and reports cost and structured errors rather than throwing. This module
//! holds the adapter trait/result types plus one submodule per external
//! service family.

mod b2b;
mod directory;
mod email_verify;
mod page_fetch;
mod places;
mod text_extract;
mod web_search;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::candidate::DomainCandidate;
use crate::error::Result;

pub use b2b::{B2bEnrichAdapter, B2bQuery};
pub use directory::{is_directory_domain, DirectoryQuery, DirectoryScrapeAdapter};
pub use email_verify::{EmailVerification, EmailVerifyAdapter, EmailVerifyQuery};
pub use page_fetch::{FetchMethod, PageFetchAdapter, PageFetchQuery, PageFetchResult};
pub use places::{
    PlacesNameMatchAdapter, PlacesPhoneVerifyAdapter, PlacesQuery, EXACT_PHONE_MATCH_CONFIDENCE,
};
pub use text_extract::{extract as extract_page_text, ExtractedPage, TextExtractAdapter};
pub use web_search::{WebSearchKgAdapter, WebSearchQuery};

/// Stable identifier for an adapter, used as a source tag on candidates and
/// as the key into rate limiting / routing configuration.
pub type SourceTag = &'static str;

/// Structured failure reported by an adapter. Adapters never panic or
/// propagate unstructured exceptions; every failure mode surfaces here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AdapterErrorKind {
    Timeout,
    Http5xx,
    Http4xx,
    Quota,
    Parse,
}

impl std::fmt::Display for AdapterErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Timeout => "timeout",
            Self::Http5xx => "http_5xx",
            Self::Http4xx => "http_4xx",
            Self::Quota => "quota",
            Self::Parse => "parse",
        };
        write!(f, "{s}")
    }
}

/// Outcome of a single adapter invocation: a result set plus cost/latency
/// bookkeeping, or a structured error. Never a Rust panic.
///
/// Generic over the candidate type so domain-discovery adapters can report
/// `DomainCandidate`s and contact-discovery adapters can report
/// `ContactCandidate`s through the same shape.
#[derive(Debug, Clone)]
pub struct AdapterResult<C = DomainCandidate> {
    pub candidates: Vec<C>,
    pub cost: f64,
    pub latency: Duration,
    pub error: Option<AdapterErrorKind>,
}

impl<C> Default for AdapterResult<C> {
    fn default() -> Self {
        Self {
            candidates: Vec::new(),
            cost: 0.0,
            latency: Duration::ZERO,
            error: None,
        }
    }
}

impl<C> AdapterResult<C> {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn with_error(kind: AdapterErrorKind, latency: Duration) -> Self {
        Self {
            candidates: Vec::new(),
            cost: 0.0,
            latency,
            error: Some(kind),
        }
    }
}

/// One windowed token-bucket's live state: when the current window opened
/// and how many calls it has already spent.
#[derive(Debug, Clone, Copy)]
struct RateWindowState {
    window_start: std::time::Instant,
    used: u32,
}

/// Per-adapter-tag rate limiter: one windowed token bucket per `SourceTag`,
/// generalized from `llm::batch::ProviderRateLimiter`'s "one bucket per LLM
/// provider" to "one bucket per adapter tag" (spec §5: "rate-limited per
/// service via a token bucket per adapter"). Tags with no configured limit
/// (or a limit of zero) are never throttled.
#[derive(Debug)]
pub struct AdapterRateLimiter {
    limits: HashMap<SourceTag, u32>,
    window: Duration,
    state: Mutex<HashMap<SourceTag, RateWindowState>>,
}

impl AdapterRateLimiter {
    pub fn new(limits: HashMap<SourceTag, u32>, window: Duration) -> Self {
        Self {
            limits,
            window,
            state: Mutex::new(HashMap::new()),
        }
    }

    /// An unlimited limiter: every tag passes through untouched. Used as the
    /// default so constructing a resolver/controller without explicit
    /// adapter config never throttles.
    pub fn unlimited() -> Self {
        Self::new(HashMap::new(), Duration::from_secs(60))
    }

    /// Block until a slot opens for `tag`, sleeping out the rest of the
    /// current window if the configured budget is already spent.
    pub async fn acquire(&self, tag: SourceTag) {
        let limit = match self.limits.get(tag).copied() {
            Some(limit) if limit > 0 => limit,
            _ => return,
        };
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let entry = state.entry(tag).or_insert(RateWindowState {
                    window_start: std::time::Instant::now(),
                    used: 0,
                });
                if entry.window_start.elapsed() >= self.window {
                    entry.window_start = std::time::Instant::now();
                    entry.used = 0;
                }
                if entry.used < limit {
                    entry.used += 1;
                    None
                } else {
                    Some(self.window.saturating_sub(entry.window_start.elapsed()))
                }
            };
            match wait {
                Some(wait) => tokio::time::sleep(wait).await,
                None => return,
            }
        }
    }
}

/// Per-call context shared across adapters: deadline, an optional rate
/// limiter, and a cost accumulator knob. Adapters must observe `deadline`
/// and return `Timeout` promptly rather than running past it.
#[derive(Debug, Clone)]
pub struct AdapterContext {
    pub deadline: std::time::Instant,
    pub rate_limiter: Option<Arc<AdapterRateLimiter>>,
}

impl AdapterContext {
    pub fn with_timeout(budget: Duration) -> Self {
        Self {
            deadline: std::time::Instant::now() + budget,
            rate_limiter: None,
        }
    }

    pub fn new(deadline: std::time::Instant) -> Self {
        Self {
            deadline,
            rate_limiter: None,
        }
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<AdapterRateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn remaining(&self) -> Duration {
        self.deadline
            .saturating_duration_since(std::time::Instant::now())
    }

    pub fn expired(&self) -> bool {
        std::time::Instant::now() >= self.deadline
    }

    /// Block on the configured per-adapter-tag rate limit, if any, before
    /// the caller issues its request.
    pub async fn throttle(&self, tag: SourceTag) {
        if let Some(limiter) = &self.rate_limiter {
            limiter.acquire(tag).await;
        }
    }
}

/// Uniform async wrapper over one external service. Implementors must be
/// safe for concurrent invocation and perform at most one internal retry
/// on transient failure with >=250ms backoff.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    type Query: Send + Sync;
    type Candidate: Send + Sync;

    fn tag(&self) -> SourceTag;

    async fn call(
        &self,
        query: &Self::Query,
        ctx: &AdapterContext,
    ) -> Result<AdapterResult<Self::Candidate>>;
}

pub(crate) const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Run `attempt` once; on a transient failure (`Timeout`/`Http5xx`), sleep
/// `RETRY_BACKOFF` and run it exactly once more, honoring the `SourceAdapter`
/// contract of at most one internal retry. Non-transient errors and
/// successes return immediately without a second attempt.
pub(crate) async fn with_one_retry<C, F, Fut>(ctx: &AdapterContext, mut attempt: F) -> AdapterResult<C>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = AdapterResult<C>>,
{
    let first = attempt().await;
    let transient = matches!(first.error, Some(AdapterErrorKind::Timeout) | Some(AdapterErrorKind::Http5xx));
    if !transient || ctx.expired() {
        return first;
    }
    tokio::time::sleep(RETRY_BACKOFF).await;
    attempt().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rate_limiter_throttles_past_the_configured_limit() {
        let mut limits = HashMap::new();
        limits.insert("web_search_kg", 2);
        let limiter = AdapterRateLimiter::new(limits, Duration::from_millis(200));

        let start = std::time::Instant::now();
        limiter.acquire("web_search_kg").await;
        limiter.acquire("web_search_kg").await;
        limiter.acquire("web_search_kg").await;
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn rate_limiter_never_throttles_unconfigured_tag() {
        let limiter = AdapterRateLimiter::unlimited();
        let start = std::time::Instant::now();
        for _ in 0..50 {
            limiter.acquire("places_phone_verify").await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn with_one_retry_retries_once_on_transient_error() {
        let ctx = AdapterContext::with_timeout(Duration::from_secs(5));
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let result: AdapterResult<DomainCandidate> = with_one_retry(&ctx, || {
            let n = attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async move {
                if n == 0 {
                    AdapterResult::with_error(AdapterErrorKind::Timeout, Duration::ZERO)
                } else {
                    AdapterResult::empty()
                }
            }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn with_one_retry_does_not_retry_non_transient_error() {
        let ctx = AdapterContext::with_timeout(Duration::from_secs(5));
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let result: AdapterResult<DomainCandidate> = with_one_retry(&ctx, || {
            attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async { AdapterResult::with_error(AdapterErrorKind::Http4xx, Duration::ZERO) }
        })
        .await;
        assert!(!result.is_ok());
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
