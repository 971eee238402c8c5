//! B2B directory scrape adapter. Surfaces candidate domains from listing
//! sites, tagged so the resolver's scorer can recognize and penalize
//! directory-site domains proposed as the final answer (P4).

use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;

use super::{with_one_retry, AdapterContext, AdapterErrorKind, AdapterResult, SourceAdapter, SourceTag};
use crate::candidate::DomainCandidate;
use crate::error::Result;
use crate::normalize::clean_domain_like;

pub const TAG: SourceTag = "directory_scrape";

const KNOWN_DIRECTORY_HOSTS: &[&str] = &[
    "yelp.com",
    "yellowpages.com",
    "bbb.org",
    "manta.com",
    "mapquest.com",
    "superpages.com",
    "medicare.gov",
];

#[derive(Debug, Clone)]
pub struct DirectoryQuery {
    pub name: String,
    pub city: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DirectoryApiResponse {
    #[serde(default)]
    listings: Vec<DirectoryListing>,
}

#[derive(Debug, Deserialize)]
struct DirectoryListing {
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    listing_url: Option<String>,
}

pub struct DirectoryScrapeAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl DirectoryScrapeAdapter {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

/// True if `domain` belongs to a known directory/listing host, as opposed
/// to the business's own site.
pub fn is_directory_domain(domain: &str) -> bool {
    KNOWN_DIRECTORY_HOSTS.iter().any(|h| domain == *h || domain.ends_with(&format!(".{h}")))
}

#[async_trait]
impl SourceAdapter for DirectoryScrapeAdapter {
    type Query = DirectoryQuery;
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

impl DirectoryScrapeAdapter {
    async fn attempt(&self, query: &DirectoryQuery, ctx: &AdapterContext) -> AdapterResult<DomainCandidate> {
        let start = Instant::now();
        if ctx.expired() {
            return AdapterResult::with_error(AdapterErrorKind::Timeout, start.elapsed());
        }

        let resp = self
            .client
            .get(&self.endpoint)
            .timeout(ctx.remaining())
            .query(&[
                ("name", query.name.as_str()),
                ("city", query.city.as_deref().unwrap_or("")),
                ("apikey", self.api_key.as_str()),
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

        if !resp.status().is_success() {
            return AdapterResult::with_error(AdapterErrorKind::Http5xx, start.elapsed());
        }

        let parsed: DirectoryApiResponse = match resp.json().await {
            Ok(p) => p,
            Err(_) => return AdapterResult::with_error(AdapterErrorKind::Parse, start.elapsed()),
        };

        let candidates = parsed
            .listings
            .into_iter()
            .enumerate()
            .filter_map(|(rank, listing)| {
                let raw = listing.website.or(listing.listing_url)?;
                let domain = clean_domain_like(&raw)?;
                let mut c = DomainCandidate::new(domain.clone(), TAG, rank);
                c.signals.is_directory_site = is_directory_domain(&domain);
                c.raw_confidence = if c.signals.is_directory_site { 20.0 } else { 55.0 };
                Some(c)
            })
            .collect();

        AdapterResult {
            candidates,
            cost: 0.003,
            latency: start.elapsed(),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_known_directory_hosts() {
        assert!(is_directory_domain("medicare.gov"));
        assert!(is_directory_domain("www.yelp.com".trim_start_matches("www.")));
        assert!(!is_directory_domain("meadowbrookcare.com"));
    }
}
