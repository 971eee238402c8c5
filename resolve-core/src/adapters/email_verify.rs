//! Email verification adapter, backed by a MillionVerifier-shaped API.
//! Grounded in `contact-finder`'s async verifier flow, gated on an API key.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{with_one_retry, AdapterContext, AdapterErrorKind, AdapterResult, SourceAdapter, SourceTag};
use crate::error::Result;

pub const TAG: SourceTag = "email_verify";

#[derive(Debug, Clone)]
pub struct EmailVerifyQuery {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailVerification {
    pub email: String,
    pub syntax_valid: bool,
    pub mx_valid: bool,
    pub deliverable: bool,
    pub catch_all: bool,
    pub role: bool,
    pub free_provider: bool,
}

#[derive(Debug, Deserialize)]
struct VerifierApiResponse {
    result: String,
    #[serde(default)]
    free: bool,
    #[serde(default)]
    role: bool,
}

pub struct EmailVerifyAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl EmailVerifyAdapter {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl SourceAdapter for EmailVerifyAdapter {
    type Query = EmailVerifyQuery;
    type Candidate = EmailVerification;

    fn tag(&self) -> SourceTag {
        TAG
    }

    async fn call(
        &self,
        query: &Self::Query,
        ctx: &AdapterContext,
    ) -> Result<AdapterResult<EmailVerification>> {
        if self.api_key.is_none() {
            return Ok(AdapterResult::empty());
        }
        ctx.throttle(TAG).await;
        Ok(with_one_retry(ctx, || self.attempt(query, ctx)).await)
    }
}

impl EmailVerifyAdapter {
    async fn attempt(&self, query: &EmailVerifyQuery, ctx: &AdapterContext) -> AdapterResult<EmailVerification> {
        let start = Instant::now();
        let Some(api_key) = &self.api_key else {
            return AdapterResult::empty();
        };
        if ctx.expired() {
            return AdapterResult::with_error(AdapterErrorKind::Timeout, start.elapsed());
        }

        let resp = self
            .client
            .get(&self.endpoint)
            .timeout(ctx.remaining())
            .query(&[("api", api_key.as_str()), ("email", query.email.as_str())])
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

        let parsed: VerifierApiResponse = match resp.json().await {
            Ok(p) => p,
            Err(_) => return AdapterResult::with_error(AdapterErrorKind::Parse, start.elapsed()),
        };

        let verification = EmailVerification {
            email: query.email.clone(),
            syntax_valid: parsed.result != "invalid",
            mx_valid: parsed.result == "ok" || parsed.result == "catch_all",
            deliverable: parsed.result == "ok",
            catch_all: parsed.result == "catch_all",
            role: parsed.role,
            free_provider: parsed.free,
        };

        AdapterResult {
            candidates: vec![verification],
            cost: 0.001,
            latency: start.elapsed(),
            error: None,
        }
    }
}
