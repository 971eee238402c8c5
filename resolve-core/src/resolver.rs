//! Domain Resolver (C6): drives the router's plan for one row, aggregates
//! candidates, verifies the top-K via scrape + judge, and scores to a
//! final accept/reject decision.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;

use crate::adapters::{
    is_directory_domain, AdapterContext, AdapterRateLimiter, B2bEnrichAdapter, B2bQuery,
    DirectoryQuery, DirectoryScrapeAdapter, PageFetchAdapter, PageFetchQuery,
    PlacesNameMatchAdapter, PlacesPhoneVerifyAdapter, PlacesQuery, SourceAdapter, SourceTag,
    TextExtractAdapter, WebSearchKgAdapter, WebSearchQuery,
};
use crate::config::AdapterConfig;
use crate::candidate::DomainCandidate;
use crate::error::Result;
use crate::judge::{self, JudgeVerdict};
use crate::llm::LLMClient;
use crate::model::NormalizedInput;
use crate::router::{self, RunMode, StrategyPlan};

const TOP_K: usize = 5;
pub const DEFAULT_ACCEPT_THRESHOLD: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
    Pending,
    Routing,
    Calling,
    Judging,
    Accepted,
    ManualReview,
    Failed,
}

fn source_prior(tag: SourceTag) -> f64 {
    match tag {
        "places_phone_verify" => 40.0,
        "places_name_match" => 20.0,
        "web_search_kg" => 15.0,
        "directory_scrape" => 5.0,
        "b2b_enrich" => 20.0,
        "llm_search" => 15.0,
        _ => 10.0,
    }
}

/// Per-candidate score plus a breakdown, so the final decision is
/// explainable rather than an opaque number.
#[derive(Debug, Clone, Default)]
pub struct DomainScoreBreakdown {
    pub source_prior: f64,
    pub judge_confidence: f64,
    pub multi_source_bonus: f64,
    pub signal_bonus: f64,
    pub red_flag_penalty: f64,
    pub eliminated: bool,
}

impl DomainScoreBreakdown {
    pub fn total(&self) -> f64 {
        if self.eliminated {
            return 0.0;
        }
        (self.source_prior + self.judge_confidence + self.multi_source_bonus + self.signal_bonus
            - self.red_flag_penalty)
            .max(0.0)
    }
}

/// Score one candidate against its (possibly absent) judge verdict.
/// `is_directory_site` eliminates the candidate outright; `is_parent_company`
/// is a flat -30 penalty.
pub fn score_candidate(candidate: &DomainCandidate, verdict: Option<&JudgeVerdict>) -> DomainScoreBreakdown {
    let mut b = DomainScoreBreakdown::default();

    let best_prior = candidate
        .sources
        .iter()
        .map(|s| source_prior(s))
        .fold(0.0_f64, f64::max);
    b.source_prior = best_prior;

    if let Some(v) = verdict {
        if v.is_directory_site || candidate.signals.is_directory_site || is_directory_domain(&candidate.domain)
        {
            b.eliminated = true;
            return b;
        }
        b.judge_confidence = v.confidence * 0.5;
        if v.is_parent_company || candidate.signals.is_parent_company {
            b.red_flag_penalty += 30.0;
        }
    } else if candidate.signals.is_directory_site || is_directory_domain(&candidate.domain) {
        b.eliminated = true;
        return b;
    } else if candidate.signals.is_parent_company {
        b.red_flag_penalty += 30.0;
    }

    if candidate.source_count() >= 2 {
        b.multi_source_bonus = 10.0;
    }
    if candidate.signals.phone_match_on_page {
        b.signal_bonus += 15.0;
    }
    if candidate.signals.city_match_on_page {
        b.signal_bonus += 5.0;
    }
    if candidate.signals.schema_org_name_match {
        b.signal_bonus += 5.0;
    }

    b
}

/// Result of fetching and judging one candidate's page: the judge's verdict
/// plus the two signal bonuses (spec §4.6 step 5) that only real extracted
/// page data can confirm.
struct VerifyOutcome {
    verdict: JudgeVerdict,
    city_match: bool,
    schema_org_name_match: bool,
}

/// True if `city` appears on the candidate's page text, case-insensitively.
fn city_mentioned(text: &str, city: &str) -> bool {
    !city.trim().is_empty() && text.to_lowercase().contains(&city.to_lowercase())
}

/// True if the page's schema.org organization name and the input company
/// name plausibly refer to the same business (substring match either way,
/// same tolerance `places_name_match` uses for name fuzzing).
fn schema_name_matches(schema_name: &str, company_name: &str) -> bool {
    let a = schema_name.to_lowercase();
    let b = company_name.to_lowercase();
    !a.is_empty() && !b.is_empty() && (a.contains(&b) || b.contains(&a))
}

/// Compare two scored candidates by the tie-break order: higher judge
/// confidence, then more corroborating sources, then shorter domain, then
/// earlier plan step.
fn tie_break_better(
    a: (&DomainCandidate, &DomainScoreBreakdown),
    b: (&DomainCandidate, &DomainScoreBreakdown),
) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    let (ca, sa) = a;
    let (cb, sb) = b;

    sa.total()
        .partial_cmp(&sb.total())
        .unwrap_or(Ordering::Equal)
        .then_with(|| sa.judge_confidence.partial_cmp(&sb.judge_confidence).unwrap_or(Ordering::Equal))
        .then_with(|| ca.source_count().cmp(&cb.source_count()))
        .then_with(|| cb.domain.len().cmp(&ca.domain.len()))
        .then_with(|| cb.step_index.cmp(&ca.step_index))
}

/// The outcome of resolving one row's domain.
#[derive(Debug, Clone)]
pub struct DomainResolution {
    pub domain: Option<String>,
    pub confidence: f64,
    pub source: Option<SourceTag>,
    pub needs_manual_review: bool,
    pub stages_completed: Vec<SourceTag>,
    pub total_cost: f64,
    pub errors: Vec<String>,
    pub state: ResolverState,
}

/// Concrete adapters the resolver draws on, built once by the orchestrator.
pub struct DomainServices {
    pub places_phone_verify: Arc<PlacesPhoneVerifyAdapter>,
    pub places_name_match: Arc<PlacesNameMatchAdapter>,
    pub web_search: Arc<WebSearchKgAdapter>,
    pub directory: Arc<DirectoryScrapeAdapter>,
    pub b2b: Arc<B2bEnrichAdapter>,
    pub page_fetch: Arc<PageFetchAdapter>,
    pub text_extract: Arc<TextExtractAdapter>,
    pub llm_client: Arc<dyn LLMClient>,
    pub judge_model: String,
}

/// Adapter tags the domain resolver ever calls directly (excludes
/// `page_fetch`/`text_extract`, which back `verify_candidate` and are keyed
/// separately below).
const DOMAIN_ADAPTER_TAGS: &[SourceTag] = &[
    "places_phone_verify",
    "places_name_match",
    "web_search_kg",
    "directory_scrape",
    "b2b_enrich",
];

pub struct DomainResolver {
    services: Arc<DomainServices>,
    accept_threshold: f64,
    routing: crate::config::Routing,
    rate_limiter: Arc<AdapterRateLimiter>,
    adapter_timeouts: HashMap<SourceTag, Duration>,
}

impl DomainResolver {
    pub fn new(services: Arc<DomainServices>, accept_threshold: f64) -> Self {
        Self {
            services,
            accept_threshold,
            routing: crate::config::Routing::default(),
            rate_limiter: Arc::new(AdapterRateLimiter::unlimited()),
            adapter_timeouts: HashMap::new(),
        }
    }

    pub fn with_routing(mut self, routing: crate::config::Routing) -> Self {
        self.routing = routing;
        self
    }

    /// Build the per-adapter-tag rate limiter and timeout overrides from
    /// configured `[adapters.<tag>]` sections, including `page_fetch` (used
    /// by candidate verification's page fetch, not the router's plan).
    pub fn with_adapter_config(mut self, adapters: &HashMap<String, AdapterConfig>) -> Self {
        let mut limits = HashMap::new();
        let mut timeouts = HashMap::new();
        for tag in DOMAIN_ADAPTER_TAGS.iter().chain(["page_fetch"].iter()) {
            let cfg = adapters.get(*tag).cloned().unwrap_or_default();
            limits.insert(*tag, cfg.rate_limit_per_minute);
            timeouts.insert(*tag, Duration::from_millis(cfg.timeout_ms));
        }
        self.rate_limiter = Arc::new(AdapterRateLimiter::new(limits, Duration::from_secs(60)));
        self.adapter_timeouts = timeouts;
        self
    }

    /// Build the per-step adapter context: `deadline` capped by the
    /// configured per-adapter timeout (if any), carrying the rate limiter
    /// so the adapter throttles itself before issuing its request.
    fn step_context(&self, deadline: Instant, tag: SourceTag) -> AdapterContext {
        let capped = match self.adapter_timeouts.get(tag) {
            Some(&budget) => deadline.min(Instant::now() + budget),
            None => deadline,
        };
        AdapterContext::new(capped).with_rate_limiter(Arc::clone(&self.rate_limiter))
    }

    pub async fn resolve(&self, normalized: &NormalizedInput, deadline: Instant) -> Result<DomainResolution> {
        let plan = router::route(normalized.tier);
        let mut stages = Vec::new();
        let mut total_cost = 0.0;
        let mut errors = Vec::new();

        let mut by_domain: HashMap<String, DomainCandidate> = HashMap::new();
        let places_query = PlacesQuery {
            name: normalized.input.name.clone(),
            city: normalized.input.city.clone(),
            phone: normalized.input.phone.clone(),
        };

        if plan.mode == RunMode::Sequential {
            for step in &plan.steps {
                if Instant::now() >= deadline {
                    break;
                }
                if !router::should_use_strategy(*step, |s| self.routing.is_enabled(s)) {
                    continue;
                }
                let ctx = self.step_context(deadline, *step);
                let (found, cost) = match self.call_step(step, normalized, &places_query, &ctx).await {
                    Ok(r) => r,
                    Err(e) => {
                        errors.push(e.truncated_message(1000));
                        continue;
                    }
                };
                total_cost += cost;
                stages.push(*step);
                let phone_exact = found.iter().any(|c| c.signals.phone_match_on_page);
                for c in found {
                    merge_candidate(&mut by_domain, c);
                }
                if *step == "places_phone_verify" && phone_exact {
                    if let Some(score) = plan.phone_short_circuit_score {
                        if let Some(domain) = phone_short_circuit_domain(&by_domain) {
                            return Ok(DomainResolution {
                                domain: Some(domain.clone()),
                                confidence: score,
                                source: Some("places_phone_verify"),
                                needs_manual_review: false,
                                stages_completed: stages,
                                total_cost,
                                errors,
                                state: ResolverState::Accepted,
                            });
                        }
                    }
                }
            }
        } else {
            let active_steps: Vec<SourceTag> = plan
                .steps
                .iter()
                .copied()
                .filter(|step| router::should_use_strategy(*step, |s| self.routing.is_enabled(s)))
                .collect();

            let outcomes = join_all(active_steps.iter().map(|step| {
                let step = *step;
                let ctx = self.step_context(deadline, step);
                async move { self.call_step(&step, normalized, &places_query, &ctx).await }
            }))
            .await;

            for (step, outcome) in active_steps.iter().zip(outcomes) {
                match outcome {
                    Ok((found, cost)) => {
                        total_cost += cost;
                        stages.push(*step);
                        for c in found {
                            merge_candidate(&mut by_domain, c);
                        }
                    }
                    Err(e) => errors.push(e.truncated_message(1000)),
                }
            }
        }

        if by_domain.is_empty() {
            return Ok(DomainResolution {
                domain: None,
                confidence: 0.0,
                source: None,
                needs_manual_review: true,
                stages_completed: stages,
                total_cost,
                errors,
                state: ResolverState::Failed,
            });
        }

        let mut ranked: Vec<DomainCandidate> = by_domain.into_values().collect();
        ranked.sort_by(|a, b| b.raw_confidence.partial_cmp(&a.raw_confidence).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(TOP_K);

        let mut scored: Vec<(DomainCandidate, DomainScoreBreakdown, SourceTag)> = Vec::new();
        for mut candidate in ranked {
            if Instant::now() >= deadline {
                break;
            }
            let outcome = self.verify_candidate(&candidate, normalized, deadline).await;
            total_cost += 0.0;
            if let Some(o) = &outcome {
                candidate.signals.city_match_on_page |= o.city_match;
                candidate.signals.schema_org_name_match |= o.schema_org_name_match;
            }
            let best_source = candidate
                .sources
                .iter()
                .max_by(|a, b| source_prior(a).partial_cmp(&source_prior(b)).unwrap())
                .copied()
                .unwrap_or("web_search_kg");
            let verdict = outcome.map(|o| o.verdict);
            let breakdown = score_candidate(&candidate, verdict.as_ref());
            scored.push((candidate, breakdown, best_source));
        }

        if plan.llm_analysis && !scored.iter().any(|(_, b, _)| !b.eliminated && b.judge_confidence > 0.0) {
            return Ok(DomainResolution {
                domain: None,
                confidence: 0.0,
                source: None,
                needs_manual_review: true,
                stages_completed: stages,
                total_cost,
                errors,
                state: ResolverState::ManualReview,
            });
        }

        let best = scored
            .iter()
            .filter(|(_, b, _)| !b.eliminated)
            .max_by(|a, b| tie_break_better((&a.0, &a.1), (&b.0, &b.1)));

        match best {
            Some((candidate, breakdown, source)) if breakdown.total() >= self.accept_threshold => {
                Ok(DomainResolution {
                    domain: Some(candidate.domain.clone()),
                    confidence: breakdown.total(),
                    source: Some(*source),
                    needs_manual_review: false,
                    stages_completed: stages,
                    total_cost,
                    errors,
                    state: ResolverState::Accepted,
                })
            }
            _ => Ok(DomainResolution {
                domain: None,
                confidence: 0.0,
                source: None,
                needs_manual_review: true,
                stages_completed: stages,
                total_cost,
                errors,
                state: ResolverState::ManualReview,
            }),
        }
    }

    async fn verify_candidate(
        &self,
        candidate: &DomainCandidate,
        normalized: &NormalizedInput,
        deadline: Instant,
    ) -> Option<VerifyOutcome> {
        if Instant::now() >= deadline {
            return None;
        }
        let ctx = self.step_context(deadline.min(Instant::now() + Duration::from_secs(15)), "page_fetch");
        let url = format!("https://{}", candidate.domain);
        let fetch = self
            .services
            .page_fetch
            .call(&PageFetchQuery { url: url.clone() }, &ctx)
            .await
            .ok()?;
        let page = fetch.candidates.into_iter().next()?;
        let extracted = self.services.text_extract.extract(&page.html);
        if extracted.is_empty() {
            return None;
        }
        let city_match = normalized
            .input
            .city
            .as_deref()
            .map(|city| city_mentioned(&extracted.text, city))
            .unwrap_or(false);
        let schema_org_name_match = extracted
            .schema_org_name
            .as_deref()
            .map(|name| schema_name_matches(name, &normalized.input.name))
            .unwrap_or(false);
        let verdict = judge::judge_candidate(
            self.services.llm_client.as_ref(),
            &self.services.judge_model,
            &normalized.input,
            &url,
            &extracted.text,
        )
        .await;
        Some(VerifyOutcome {
            verdict,
            city_match,
            schema_org_name_match,
        })
    }

    async fn call_step(
        &self,
        step: &SourceTag,
        normalized: &NormalizedInput,
        places_query: &PlacesQuery,
        ctx: &AdapterContext,
    ) -> Result<(Vec<DomainCandidate>, f64)> {
        match *step {
            "places_phone_verify" => {
                let r = self.services.places_phone_verify.call(places_query, ctx).await?;
                Ok((r.candidates, r.cost))
            }
            "places_name_match" => {
                let r = self.services.places_name_match.call(places_query, ctx).await?;
                Ok((r.candidates, r.cost))
            }
            "web_search_kg" | "llm_search" => {
                let query = WebSearchQuery {
                    query: format!(
                        "{} {}",
                        normalized.input.name,
                        normalized.input.city.as_deref().unwrap_or("")
                    ),
                };
                let r = self.services.web_search.call(&query, ctx).await?;
                Ok((r.candidates, r.cost))
            }
            "directory_scrape" => {
                let query = DirectoryQuery {
                    name: normalized.input.name.clone(),
                    city: normalized.input.city.clone(),
                };
                let r = self.services.directory.call(&query, ctx).await?;
                Ok((r.candidates, r.cost))
            }
            "b2b_enrich" => {
                let query = B2bQuery {
                    name: normalized.input.name.clone(),
                    context: normalized.input.context.clone(),
                };
                let r = self.services.b2b.call(&query, ctx).await?;
                Ok((r.candidates, r.cost))
            }
            _ => Ok((Vec::new(), 0.0)),
        }
    }
}

fn merge_candidate(by_domain: &mut HashMap<String, DomainCandidate>, candidate: DomainCandidate) {
    by_domain
        .entry(candidate.domain.clone())
        .and_modify(|existing| existing.merge(&candidate))
        .or_insert(candidate);
}

/// Pick a phone-matched domain for the tier-1 short-circuit path. A
/// directory/listing site never short-circuits (P4) even with an exact
/// phone match; it falls through to normal `score_candidate` scoring,
/// which eliminates it there instead.
fn phone_short_circuit_domain(by_domain: &HashMap<String, DomainCandidate>) -> Option<String> {
    by_domain
        .iter()
        .find(|(d, c)| c.signals.phone_match_on_page && !is_directory_domain(d))
        .map(|(d, _)| d.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::DomainSignals;

    fn candidate(domain: &str, sources: &[SourceTag]) -> DomainCandidate {
        let mut c = DomainCandidate::new(domain, sources[0], 0);
        for s in &sources[1..] {
            c.sources.insert(s);
        }
        c
    }

    #[test]
    fn directory_site_is_eliminated() {
        let mut c = candidate("medicare.gov", &["places_phone_verify"]);
        c.signals.is_directory_site = true;
        let score = score_candidate(&c, None);
        assert!(score.eliminated);
        assert_eq!(score.total(), 0.0);
    }

    #[test]
    fn parent_company_is_penalized_not_eliminated() {
        let verdict = JudgeVerdict {
            is_match: true,
            confidence: 80.0,
            evidence: String::new(),
            phone_found: true,
            address_found: true,
            name_found: true,
            is_parent_company: true,
            is_directory_site: false,
        };
        let c = candidate("bigco.com", &["web_search_kg"]);
        let score = score_candidate(&c, Some(&verdict));
        assert!(!score.eliminated);
        assert!(score.red_flag_penalty >= 30.0);
    }

    #[test]
    fn multi_source_candidate_scores_higher() {
        let single = candidate("acme.com", &["web_search_kg"]);
        let multi = candidate("acme.com", &["web_search_kg", "directory_scrape"]);
        let s1 = score_candidate(&single, None);
        let s2 = score_candidate(&multi, None);
        assert!(s2.total() > s1.total());
    }

    #[test]
    fn signal_bonuses_accumulate() {
        let mut c = candidate("acme.com", &["places_name_match"]);
        c.signals = DomainSignals {
            phone_match_on_page: true,
            city_match_on_page: true,
            schema_org_name_match: true,
            is_directory_site: false,
            is_parent_company: false,
        };
        let score = score_candidate(&c, None);
        assert_eq!(score.signal_bonus, 25.0);
    }

    #[test]
    fn city_mentioned_is_case_insensitive() {
        assert!(city_mentioned("Proudly serving Boston since 1998", "boston"));
        assert!(!city_mentioned("Proudly serving Cambridge since 1998", "boston"));
        assert!(!city_mentioned("Proudly serving Boston since 1998", ""));
    }

    #[test]
    fn schema_name_matches_allows_substring_either_way() {
        assert!(schema_name_matches("Acme Plumbing", "Acme"));
        assert!(schema_name_matches("Acme", "Acme Plumbing Inc"));
        assert!(!schema_name_matches("Acme Plumbing", "Contoso"));
    }

    #[test]
    fn phone_short_circuit_skips_directory_domain() {
        let mut by_domain = HashMap::new();
        let mut c = candidate("medicare.gov", &["places_phone_verify"]);
        c.signals.phone_match_on_page = true;
        by_domain.insert(c.domain.clone(), c);
        assert_eq!(phone_short_circuit_domain(&by_domain), None);
    }

    #[test]
    fn phone_short_circuit_accepts_non_directory_domain() {
        let mut by_domain = HashMap::new();
        let mut c = candidate("meadowbrookcare.com", &["places_phone_verify"]);
        c.signals.phone_match_on_page = true;
        by_domain.insert(c.domain.clone(), c);
        assert_eq!(phone_short_circuit_domain(&by_domain), Some("meadowbrookcare.com".to_string()));
    }

    #[test]
    fn disabled_adapter_is_skipped_by_should_use_strategy() {
        let mut routing = crate::config::Routing::default();
        routing.b2b_enrich = false;
        assert!(!router::should_use_strategy("b2b_enrich", |s| routing.is_enabled(s)));
        assert!(router::should_use_strategy("web_search_kg", |s| routing.is_enabled(s)));
    }
}
