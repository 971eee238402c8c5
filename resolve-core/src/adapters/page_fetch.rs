//! Two-stage page fetch: a cheap direct HTTP client first, an anti-bot
//! proxy fallback on non-200/timeout. Grounded in
//! `domain-resolver/modules/scraper.py`'s `fetch` / `fetch_with_zenrows`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{AdapterContext, AdapterErrorKind, AdapterResult, SourceAdapter, SourceTag, RETRY_BACKOFF};
use crate::error::Result;

pub const TAG: SourceTag = "page_fetch";

const DIRECT_TIMEOUT: Duration = Duration::from_secs(10);
const ANTI_BOT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FetchMethod {
    Direct,
    AntiBot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageFetchResult {
    pub url: String,
    pub html: String,
    pub method: FetchMethod,
    pub status: u16,
}

#[derive(Debug, Clone)]
pub struct PageFetchQuery {
    pub url: String,
}

pub struct PageFetchAdapter {
    client: reqwest::Client,
    anti_bot_endpoint: Option<String>,
    anti_bot_api_key: Option<String>,
}

impl PageFetchAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            anti_bot_endpoint: None,
            anti_bot_api_key: None,
        }
    }

    pub fn with_anti_bot(mut self, endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        self.anti_bot_endpoint = Some(endpoint.into());
        self.anti_bot_api_key = Some(api_key.into());
        self
    }

    async fn fetch_direct(&self, url: &str) -> Option<(String, u16)> {
        let resp = self
            .client
            .get(url)
            .timeout(DIRECT_TIMEOUT)
            .header("User-Agent", "Mozilla/5.0 (compatible; resolve-core/0.1)")
            .send()
            .await
            .ok()?;
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Some((body, status))
    }

    async fn fetch_anti_bot(&self, url: &str) -> Option<(String, u16)> {
        let endpoint = self.anti_bot_endpoint.as_ref()?;
        let api_key = self.anti_bot_api_key.as_ref()?;
        let resp = self
            .client
            .get(endpoint)
            .timeout(ANTI_BOT_TIMEOUT)
            .query(&[("apikey", api_key.as_str()), ("url", url)])
            .send()
            .await
            .ok()?;
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Some((body, status))
    }
}

#[async_trait]
impl SourceAdapter for PageFetchAdapter {
    type Query = PageFetchQuery;
    type Candidate = PageFetchResult;

    fn tag(&self) -> SourceTag {
        TAG
    }

    async fn call(
        &self,
        query: &Self::Query,
        ctx: &AdapterContext,
    ) -> Result<AdapterResult<PageFetchResult>> {
        let start = Instant::now();
        ctx.throttle(TAG).await;
        if ctx.expired() {
            return Ok(AdapterResult::with_error(AdapterErrorKind::Timeout, start.elapsed()));
        }

        if let Some((html, status)) = self.fetch_direct(&query.url).await {
            if (200..300).contains(&status) {
                return Ok(AdapterResult {
                    candidates: vec![PageFetchResult {
                        url: query.url.clone(),
                        html,
                        method: FetchMethod::Direct,
                        status,
                    }],
                    cost: 0.0,
                    latency: start.elapsed(),
                    error: None,
                });
            }
        } else {
            tokio::time::sleep(RETRY_BACKOFF).await;
        }

        if ctx.expired() {
            return Ok(AdapterResult::with_error(AdapterErrorKind::Timeout, start.elapsed()));
        }

        if let Some((html, status)) = self.fetch_anti_bot(&query.url).await {
            if (200..300).contains(&status) {
                return Ok(AdapterResult {
                    candidates: vec![PageFetchResult {
                        url: query.url.clone(),
                        html,
                        method: FetchMethod::AntiBot,
                        status,
                    }],
                    cost: 0.01,
                    latency: start.elapsed(),
                    error: None,
                });
            }
            return Ok(AdapterResult::with_error(AdapterErrorKind::Http5xx, start.elapsed()));
        }

        Ok(AdapterResult::with_error(AdapterErrorKind::Timeout, start.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_method_equality() {
        assert_eq!(FetchMethod::Direct, FetchMethod::Direct);
        assert_ne!(FetchMethod::Direct, FetchMethod::AntiBot);
    }
}
