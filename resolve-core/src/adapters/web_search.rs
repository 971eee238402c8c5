//! Collapsed web-search + knowledge-graph interface. The original source
//! split this into two search backends with overlapping responsibility;
//! this spec presents a single `web_search_kg` adapter to the router.

use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;

use super::{with_one_retry, AdapterContext, AdapterErrorKind, AdapterResult, SourceAdapter, SourceTag};
use crate::candidate::DomainCandidate;
use crate::error::Result;
use crate::normalize::clean_domain_like;

pub const TAG: SourceTag = "web_search_kg";

#[derive(Debug, Clone)]
pub struct WebSearchQuery {
    pub query: String,
}

#[derive(Debug, Deserialize)]
struct SearchApiResponse {
    #[serde(default)]
    organic: Vec<OrganicResult>,
    #[serde(default, rename = "knowledgeGraph")]
    knowledge_graph: Option<KnowledgeGraphResult>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    link: String,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KnowledgeGraphResult {
    #[serde(default)]
    website: Option<String>,
}

pub struct WebSearchKgAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl WebSearchKgAdapter {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl SourceAdapter for WebSearchKgAdapter {
    type Query = WebSearchQuery;
    type Candidate = DomainCandidate;

    fn tag(&self) -> SourceTag {
        TAG
    }

    async fn call(
        &self,
        query: &Self::Query,
        ctx: &AdapterContext,
    ) -> Result<AdapterResult<DomainCandidate>> {
        ctx.throttle(TAG).await;
        Ok(with_one_retry(ctx, || self.attempt(query, ctx)).await)
    }
}

impl WebSearchKgAdapter {
    async fn attempt(&self, query: &WebSearchQuery, ctx: &AdapterContext) -> AdapterResult<DomainCandidate> {
        let start = Instant::now();
        if ctx.expired() {
            return AdapterResult::with_error(AdapterErrorKind::Timeout, start.elapsed());
        }

        let resp = self
            .client
            .post(&self.endpoint)
            .timeout(ctx.remaining())
            .header("X-API-KEY", &self.api_key)
            .json(&serde_json::json!({ "q": query.query }))
            .send()
            .await;

        let resp = match resp {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return AdapterResult::with_error(AdapterErrorKind::Timeout, start.elapsed())
            }
            Err(_) => return AdapterResult::with_error(AdapterErrorKind::Http5xx, start.elapsed()),
        };

        if !resp.status().is_success() {
            let kind = if resp.status().as_u16() == 429 {
                AdapterErrorKind::Quota
            } else {
                AdapterErrorKind::Http5xx
            };
            return AdapterResult::with_error(kind, start.elapsed());
        }

        let parsed: SearchApiResponse = match resp.json().await {
            Ok(p) => p,
            Err(_) => return AdapterResult::with_error(AdapterErrorKind::Parse, start.elapsed()),
        };

        let mut candidates = Vec::new();
        if let Some(kg) = parsed.knowledge_graph.and_then(|k| k.website) {
            if let Some(domain) = clean_domain_like(&kg) {
                let mut c = DomainCandidate::new(domain, TAG, 0);
                c.raw_confidence = 70.0;
                candidates.push(c);
            }
        }
        for (rank, result) in parsed.organic.into_iter().enumerate().take(5) {
            if let Some(domain) = clean_domain_like(&result.link) {
                let mut c = DomainCandidate::new(domain, TAG, rank + 1);
                c.raw_confidence = 50.0 - (rank as f64 * 5.0).min(30.0);
                candidates.push(c);
            }
        }

        AdapterResult {
            candidates,
            cost: 0.002,
            latency: start.elapsed(),
            error: None,
        }
    }
}
