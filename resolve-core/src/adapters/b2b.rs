//! Commercial B2B firmographic enrichment adapter: company -> domain plus
//! size/industry attributes. Used primarily for tier-3/4 (sparse input).

use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;

use super::{with_one_retry, AdapterContext, AdapterErrorKind, AdapterResult, SourceAdapter, SourceTag};
use crate::candidate::DomainCandidate;
use crate::error::Result;
use crate::normalize::clean_domain_like;

pub const TAG: SourceTag = "b2b_enrich";

#[derive(Debug, Clone)]
pub struct B2bQuery {
    pub name: String,
    pub context: Option<String>,
}

#[derive(Debug, Deserialize)]
struct B2bApiResponse {
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    is_parent_company: bool,
}

pub struct B2bEnrichAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl B2bEnrichAdapter {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl SourceAdapter for B2bEnrichAdapter {
    type Query = B2bQuery;
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

impl B2bEnrichAdapter {
    async fn attempt(&self, query: &B2bQuery, ctx: &AdapterContext) -> AdapterResult<DomainCandidate> {
        let start = Instant::now();
        if ctx.expired() {
            return AdapterResult::with_error(AdapterErrorKind::Timeout, start.elapsed());
        }

        let resp = self
            .client
            .get(&self.endpoint)
            .timeout(ctx.remaining())
            .bearer_auth(&self.api_key)
            .query(&[
                ("company", query.name.as_str()),
                ("context", query.context.as_deref().unwrap_or("")),
            ])
            .send()
            .await;

        let resp = match resp {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return AdapterResult::with_error(AdapterErrorKind::Timeout, start.elapsed())
            }
            Err(_) => return AdapterResult::with_error(AdapterErrorKind::Http5xx, start.elapsed()),
        };

        if resp.status().as_u16() == 429 {
            return AdapterResult::with_error(AdapterErrorKind::Quota, start.elapsed());
        }
        if !resp.status().is_success() {
            return AdapterResult::with_error(AdapterErrorKind::Http5xx, start.elapsed());
        }

        let parsed: B2bApiResponse = match resp.json().await {
            Ok(p) => p,
            Err(_) => return AdapterResult::with_error(AdapterErrorKind::Parse, start.elapsed()),
        };

        let candidates = match parsed.domain.as_deref().and_then(clean_domain_like) {
            Some(domain) => {
                let mut c = DomainCandidate::new(domain, TAG, 0);
                c.raw_confidence = parsed.confidence.unwrap_or(60.0);
                c.signals.is_parent_company = parsed.is_parent_company;
                vec![c]
            }
            None => Vec::new(),
        };

        AdapterResult {
            candidates,
            cost: 0.01,
            latency: start.elapsed(),
            error: None,
        }
    }
}
