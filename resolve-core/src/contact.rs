//! Contact type and the Contact Discovery Controller (C7): a bounded,
//! early-exiting agent loop over the source adapters, biased by business
//! type and able to pivot strategy family after repeated empty stages.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::adapters::{
    AdapterContext, AdapterRateLimiter, EmailVerifyAdapter, EmailVerifyQuery, PageFetchAdapter,
    PageFetchQuery, SourceAdapter, SourceTag, TextExtractAdapter, WebSearchKgAdapter,
    WebSearchQuery,
};
use crate::candidate::{ContactCandidate, ContactSignals};
use crate::config::AdapterConfig;
use crate::error::Result;
use crate::linkedin;
use crate::model::{BusinessType, NormalizedInput};
use crate::validator;

/// A discovered contact, after validator scoring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contact {
    pub name: Option<String>,
    pub title: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub linkedin_url: Option<String>,
    pub sources: BTreeSet<SourceTag>,
    pub signals: ContactSignals,
    pub confidence: f64,
    pub is_valid: bool,
}

const NAME_STOPWORDS: &[&str] = &[
    "inc", "llc", "corp", "co", "ltd", "group", "company", "plumbing", "services",
];
const NAME_PREFIXES: &[&str] = &["dr", "mr", "mrs", "ms"];
const NAME_SUFFIXES: &[&str] = &["jr", "sr", "ii", "iii"];

fn strip_punct(word: &str) -> String {
    word.chars().filter(|c| c.is_alphanumeric() || *c == '\'').collect()
}

/// True if `name` is a plausible person name suitable for email-permutation
/// generation: not empty, no digits, not a single bare initial, not a
/// company-suffix echo.
pub fn is_valid_for_permutation(name: &str) -> bool {
    let name = name.trim();
    if name.is_empty() || name.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    let lower = name.to_lowercase();
    if NAME_STOPWORDS.iter().any(|w| lower.split_whitespace().any(|t| strip_punct(t) == *w)) {
        return false;
    }
    let words: Vec<&str> = name.split_whitespace().collect();
    if words.len() == 1 && words[0].chars().count() <= 2 {
        return false;
    }
    if words.first().map(|w| w.chars().count() == 1).unwrap_or(false) {
        return false;
    }
    true
}

/// Split a display name into (first, last), stripping common prefixes and
/// suffixes. The last whitespace-separated remaining token is the last name.
pub fn split_name(name: &str) -> (String, Option<String>) {
    let tokens: Vec<String> = name
        .split_whitespace()
        .map(|t| strip_punct(t))
        .filter(|t| !t.is_empty())
        .filter(|t| !NAME_PREFIXES.contains(&t.to_lowercase().as_str()))
        .filter(|t| !NAME_SUFFIXES.contains(&t.to_lowercase().as_str()))
        .collect();

    match tokens.as_slice() {
        [] => (String::new(), None),
        [first] => (first.clone(), None),
        [first, .., last] => (first.clone(), Some(last.clone())),
    }
}

fn to_ascii_lower(s: &str) -> String {
    s.nfkd()
        .filter(|c| c.is_ascii())
        .collect::<String>()
        .to_lowercase()
}

/// Generate the bounded set of plausible `local@domain` permutations for a
/// person's name. A single-token name yields only `first@domain`.
pub fn email_permutations(name: &str, domain: &str) -> Vec<String> {
    if !is_valid_for_permutation(name) {
        return Vec::new();
    }
    let (first, last) = split_name(name);
    let first = to_ascii_lower(&first);
    if first.is_empty() {
        return Vec::new();
    }
    let Some(last) = last else {
        return vec![format!("{first}@{domain}")];
    };
    let last = to_ascii_lower(&last);
    if last.is_empty() {
        return vec![format!("{first}@{domain}")];
    }
    let f = first.chars().next().unwrap();
    let l = last.chars().next().unwrap();
    vec![
        format!("{first}@{domain}"),
        format!("{first}.{last}@{domain}"),
        format!("{first}{last}@{domain}"),
        format!("{first}_{last}@{domain}"),
        format!("{f}{last}@{domain}"),
        format!("{first}{l}@{domain}"),
        format!("{f}.{last}@{domain}"),
        format!("{last}.{first}@{domain}"),
    ]
}

/// One `ContactCandidate` per plausible `local@domain` guess for a scraped
/// person name, feeding the site-scrape stage's email-verification pass.
fn candidates_from_person_name(name: &str, domain: &str) -> Vec<ContactCandidate> {
    email_permutations(name, domain)
        .into_iter()
        .map(|email| {
            let mut c = ContactCandidate::from_source("site_scrape");
            c.name = Some(name.to_string());
            c.signals.email_syntactically_valid = validator::is_syntactically_valid_email(&email);
            c.email = Some(email);
            c
        })
        .collect()
}

/// Strategy family the controller is currently pursuing. Used by the
/// pivot rule: two consecutive empty stages switch family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StrategyFamily {
    SiteCentric,
    SearchCentric,
}

/// One completed step of the discovery loop, kept for `stages_completed`.
#[derive(Debug, Clone)]
pub struct DiscoveryStep {
    pub stage: SourceTag,
    pub candidates_found: usize,
}

/// Outcome of running the controller to completion for one row.
#[derive(Debug, Clone)]
pub struct DiscoveryOutcome {
    pub contacts: Vec<Contact>,
    pub stages_completed: Vec<DiscoveryStep>,
    pub total_cost: f64,
    pub pivoted: bool,
}

/// The concrete adapters the controller draws on. Constructed once by the
/// orchestrator and shared (read-only) across rows.
pub struct ContactServices {
    pub page_fetch: Arc<PageFetchAdapter>,
    pub text_extract: Arc<TextExtractAdapter>,
    pub web_search: Arc<WebSearchKgAdapter>,
    pub email_verify: Arc<EmailVerifyAdapter>,
}

const CONTACT_ADAPTER_TAGS: &[SourceTag] = &["page_fetch", "web_search_kg", "email_verify"];

pub struct ContactDiscoveryController {
    services: Arc<ContactServices>,
    max_steps: usize,
    early_exit_confidence: f64,
    cost_budget: f64,
    rate_limiter: Arc<AdapterRateLimiter>,
    adapter_timeouts: HashMap<SourceTag, Duration>,
}

impl ContactDiscoveryController {
    pub fn new(services: Arc<ContactServices>, max_steps: usize, cost_budget: f64) -> Self {
        Self {
            services,
            max_steps,
            early_exit_confidence: 80.0,
            cost_budget,
            rate_limiter: Arc::new(AdapterRateLimiter::unlimited()),
            adapter_timeouts: HashMap::new(),
        }
    }

    /// Build the per-adapter-tag rate limiter and timeout overrides from
    /// configured `[adapters.<tag>]` sections, mirroring
    /// `DomainResolver::with_adapter_config`.
    pub fn with_adapter_config(mut self, adapters: &HashMap<String, AdapterConfig>) -> Self {
        let mut limits = HashMap::new();
        let mut timeouts = HashMap::new();
        for tag in CONTACT_ADAPTER_TAGS {
            let cfg = adapters.get(*tag).cloned().unwrap_or_default();
            limits.insert(*tag, cfg.rate_limit_per_minute);
            timeouts.insert(*tag, Duration::from_millis(cfg.timeout_ms));
        }
        self.rate_limiter = Arc::new(AdapterRateLimiter::new(limits, Duration::from_secs(60)));
        self.adapter_timeouts = timeouts;
        self
    }

    fn step_context(&self, deadline: Instant, tag: SourceTag) -> AdapterContext {
        let capped = match self.adapter_timeouts.get(tag) {
            Some(&budget) => deadline.min(Instant::now() + budget),
            None => deadline,
        };
        AdapterContext::new(capped).with_rate_limiter(Arc::clone(&self.rate_limiter))
    }

    fn initial_family(business_type: BusinessType) -> StrategyFamily {
        match business_type {
            BusinessType::Corporate | BusinessType::Healthcare => StrategyFamily::SearchCentric,
            BusinessType::Smb | BusinessType::Franchise => StrategyFamily::SiteCentric,
        }
    }

    fn other_family(family: StrategyFamily) -> StrategyFamily {
        match family {
            StrategyFamily::SiteCentric => StrategyFamily::SearchCentric,
            StrategyFamily::SearchCentric => StrategyFamily::SiteCentric,
        }
    }

    /// Run the discovery loop for one row. `domain` is the resolver's
    /// output; `None` degrades the loop to search-only stages.
    pub async fn run(
        &self,
        normalized: &NormalizedInput,
        domain: Option<&str>,
        deadline: Instant,
    ) -> Result<DiscoveryOutcome> {
        let mut family = Self::initial_family(normalized.business_type);
        let mut contacts: Vec<Contact> = Vec::new();
        let mut stages = Vec::new();
        let mut total_cost = 0.0;
        let mut consecutive_empty = 0u32;
        let mut pivoted = false;

        for _step in 0..self.max_steps {
            if Instant::now() >= deadline {
                break;
            }
            if total_cost >= self.cost_budget {
                break;
            }

            // No single tag applies here: `family` dispatches to a stage that
            // itself calls several different adapters, each throttled by its
            // own tag inside `run_site_scrape`/`run_search_osint`. This outer
            // context only carries the step deadline.
            let step_deadline = deadline.min(Instant::now() + Duration::from_secs(15));
            let ctx = AdapterContext::new(step_deadline).with_rate_limiter(Arc::clone(&self.rate_limiter));

            let (stage_tag, found, cost) = match family {
                StrategyFamily::SiteCentric => self.run_site_scrape(normalized, domain, &ctx).await?,
                StrategyFamily::SearchCentric => self.run_search_osint(normalized, domain, &ctx).await?,
            };
            total_cost += cost;
            stages.push(DiscoveryStep {
                stage: stage_tag,
                candidates_found: found.len(),
            });

            if found.is_empty() {
                consecutive_empty += 1;
            } else {
                consecutive_empty = 0;
            }

            for candidate in found {
                let contact = validator::validate(candidate, domain);
                let is_strong = contact.is_valid && contact.confidence >= self.early_exit_confidence;
                contacts.push(contact);
                if is_strong {
                    return Ok(DiscoveryOutcome {
                        contacts,
                        stages_completed: stages,
                        total_cost,
                        pivoted,
                    });
                }
            }

            if consecutive_empty >= 2 && !pivoted {
                family = Self::other_family(family);
                pivoted = true;
                consecutive_empty = 0;
            }
        }

        contacts.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap());
        Ok(DiscoveryOutcome {
            contacts,
            stages_completed: stages,
            total_cost,
            pivoted,
        })
    }

    async fn run_site_scrape(
        &self,
        normalized: &NormalizedInput,
        domain: Option<&str>,
        ctx: &AdapterContext,
    ) -> Result<(SourceTag, Vec<ContactCandidate>, f64)> {
        let Some(domain) = domain else {
            return Ok(("site_scrape", Vec::new(), 0.0));
        };
        let mut total_cost = 0.0;
        let mut candidates = Vec::new();

        let fetch_ctx = self.step_context(ctx.deadline, "page_fetch");
        for path in ["/about", "/team", "/contact"] {
            let url = format!("https://{domain}{path}");
            let result = self
                .services
                .page_fetch
                .call(&PageFetchQuery { url }, &fetch_ctx)
                .await?;
            total_cost += result.cost;
            let Some(page) = result.candidates.into_iter().next() else {
                continue;
            };
            let extracted = self.services.text_extract.extract(&page.html);
            if extracted.is_empty() {
                continue;
            }
            for email in &extracted.emails {
                let mut c = ContactCandidate::from_source("site_scrape");
                c.email = Some(email.clone());
                c.signals.email_syntactically_valid = validator::is_syntactically_valid_email(email);
                candidates.push(c);
            }
            for person_name in &extracted.person_names {
                candidates.extend(candidates_from_person_name(person_name, domain));
            }
            for social in &extracted.social_urls {
                if let Some((normalized_url, linkedin::LinkedinKind::Person)) = linkedin::normalize(social) {
                    let mut c = ContactCandidate::from_source("site_scrape");
                    c.linkedin_url = Some(normalized_url);
                    c.signals.linkedin_normalized = true;
                    candidates.push(c);
                }
            }
            if !candidates.is_empty() {
                break;
            }
        }

        for candidate in &mut candidates {
            if let Some(email) = &candidate.email {
                if self.services.email_verify.is_configured() {
                    let verify_ctx = self.step_context(ctx.deadline, "email_verify");
                    let verification = self
                        .services
                        .email_verify
                        .call(&EmailVerifyQuery { email: email.clone() }, &verify_ctx)
                        .await?;
                    total_cost += verification.cost;
                    if let Some(v) = verification.candidates.into_iter().next() {
                        candidate.signals.email_deliverable = Some(v.deliverable);
                        candidate.signals.is_role_account = v.role;
                        candidate.signals.is_personal_domain = v.free_provider;
                    }
                }
            }
        }

        Ok(("site_scrape", candidates, total_cost))
    }

    async fn run_search_osint(
        &self,
        normalized: &NormalizedInput,
        domain: Option<&str>,
        ctx: &AdapterContext,
    ) -> Result<(SourceTag, Vec<ContactCandidate>, f64)> {
        let name = &normalized.input.name;
        let query = match domain {
            Some(d) => format!("{name} owner OR manager contact site:{d} OR site:linkedin.com"),
            None => format!("{name} owner OR manager contact"),
        };
        let search_ctx = self.step_context(ctx.deadline, "web_search_kg");
        let result = self
            .services
            .web_search
            .call(&WebSearchQuery { query }, &search_ctx)
            .await?;
        let mut candidates = Vec::new();
        for c in &result.candidates {
            if let Some((url, linkedin::LinkedinKind::Person)) = linkedin::normalize(&c.domain) {
                let mut cand = ContactCandidate::from_source("web_search_kg");
                cand.linkedin_url = Some(url);
                cand.signals.linkedin_normalized = true;
                candidates.push(cand);
            }
        }
        Ok(("web_search_kg", candidates, result.cost))
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_parsing_rejects_single_initial() {
        assert!(is_valid_for_permutation("John Smith"));
        assert!(!is_valid_for_permutation("J Smith"));
        assert!(!is_valid_for_permutation("J"));
    }

    #[test]
    fn name_parsing_rejects_company_suffix() {
        assert!(!is_valid_for_permutation("ABC Corp LLC"));
    }

    #[test]
    fn name_parsing_accepts_unicode() {
        assert!(is_valid_for_permutation("José García"));
    }

    #[test]
    fn name_parsing_rejects_numeric() {
        assert!(!is_valid_for_permutation("12345"));
    }

    #[test]
    fn permutation_count_two_part_name() {
        let perms = email_permutations("John Smith", "example.com");
        assert_eq!(perms.len(), 8);
        assert!(perms.contains(&"john@example.com".to_string()));
        assert!(perms.contains(&"john.smith@example.com".to_string()));
    }

    #[test]
    fn permutation_count_single_token_name() {
        let perms = email_permutations("John", "example.com");
        assert_eq!(perms, vec!["john@example.com".to_string()]);
    }

    #[test]
    fn permutation_unicode_transliterates() {
        let perms = email_permutations("María García", "test.io");
        assert_eq!(perms.len(), 8);
        assert!(perms.iter().any(|p| p.starts_with("maria")));
    }

    #[test]
    fn permutation_company_name_yields_nothing() {
        let perms = email_permutations("ABC Corp LLC", "company.com");
        assert!(perms.is_empty());
    }

    #[test]
    fn candidates_from_person_name_carries_name_and_guessed_emails() {
        let candidates = candidates_from_person_name("Jane Doe", "example.com");
        assert_eq!(candidates.len(), 8);
        assert!(candidates.iter().all(|c| c.name.as_deref() == Some("Jane Doe")));
        assert!(candidates.iter().any(|c| c.email.as_deref() == Some("jane.doe@example.com")));
        assert!(candidates.iter().all(|c| c.signals.email_syntactically_valid));
    }

    #[test]
    fn candidates_from_person_name_rejects_company_name() {
        assert!(candidates_from_person_name("ABC Corp LLC", "example.com").is_empty());
    }

    #[test]
    fn split_name_strips_prefix_and_suffix() {
        let (first, last) = split_name("Dr. Jane Doe Jr.");
        assert_eq!(first, "Jane");
        assert_eq!(last, Some("Doe".to_string()));
    }
}
