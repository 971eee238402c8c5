//! Path Router (C5): pure function from data tier to a strategy plan.
//! Grounded in `domain-resolver/modules/path_router.py`'s `PathRouter.route`,
//! which dispatches to per-tier strategy methods returning the same adapter
//! lists and flags transcribed here.

use crate::adapters::SourceTag;
use crate::model::Tier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Sequential,
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationLevel {
    Always,
    Mandatory,
}

/// A domain-discovery strategy plan: which adapters to call, in what mode,
/// with what validation strictness.
#[derive(Debug, Clone)]
pub struct StrategyPlan {
    pub steps: Vec<SourceTag>,
    pub mode: RunMode,
    pub validation: ValidationLevel,
    pub consensus_required: bool,
    pub llm_analysis: bool,
    /// Phone-exact-match in `places_phone_verify` short-circuits the plan
    /// with this score (tier 1 only; see P5).
    pub phone_short_circuit_score: Option<f64>,
}

impl StrategyPlan {
    pub fn describe(&self) -> String {
        format!(
            "{} step(s), {:?}, validation={:?}, consensus={}, llm_analysis={}",
            self.steps.len(),
            self.mode,
            self.validation,
            self.consensus_required,
            self.llm_analysis
        )
    }
}

fn tier1_strategy() -> StrategyPlan {
    StrategyPlan {
        steps: vec!["places_phone_verify", "places_name_match", "web_search_kg"],
        mode: RunMode::Sequential,
        validation: ValidationLevel::Always,
        consensus_required: false,
        llm_analysis: false,
        phone_short_circuit_score: Some(99.0),
    }
}

fn tier2_strategy() -> StrategyPlan {
    StrategyPlan {
        steps: vec!["places_name_match", "web_search_kg"],
        mode: RunMode::Parallel,
        validation: ValidationLevel::Always,
        consensus_required: false,
        llm_analysis: false,
        phone_short_circuit_score: None,
    }
}

fn tier3_strategy() -> StrategyPlan {
    StrategyPlan {
        steps: vec!["llm_search", "directory_scrape", "web_search_kg", "b2b_enrich"],
        mode: RunMode::Parallel,
        validation: ValidationLevel::Always,
        consensus_required: true,
        llm_analysis: false,
        phone_short_circuit_score: None,
    }
}

fn tier4_strategy() -> StrategyPlan {
    StrategyPlan {
        steps: vec!["llm_search", "directory_scrape", "web_search_kg", "b2b_enrich"],
        mode: RunMode::Parallel,
        validation: ValidationLevel::Mandatory,
        consensus_required: true,
        llm_analysis: true,
        phone_short_circuit_score: None,
    }
}

/// Route a tier to its domain-discovery strategy plan.
pub fn route(tier: Tier) -> StrategyPlan {
    match tier {
        Tier::T1 => tier1_strategy(),
        Tier::T2 => tier2_strategy(),
        Tier::T3 => tier3_strategy(),
        Tier::T4 => tier4_strategy(),
    }
}

/// Skip an adapter step if the caller's routing config disabled it.
pub fn should_use_strategy(step: SourceTag, enabled: impl Fn(SourceTag) -> bool) -> bool {
    enabled(step)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier1_is_sequential_phone_first() {
        let plan = route(Tier::T1);
        assert_eq!(plan.mode, RunMode::Sequential);
        assert_eq!(plan.steps[0], "places_phone_verify");
        assert_eq!(plan.phone_short_circuit_score, Some(99.0));
    }

    #[test]
    fn tier2_is_parallel_two_steps() {
        let plan = route(Tier::T2);
        assert_eq!(plan.mode, RunMode::Parallel);
        assert_eq!(plan.steps.len(), 2);
    }

    #[test]
    fn tier3_requires_consensus_not_mandatory_validation() {
        let plan = route(Tier::T3);
        assert!(plan.consensus_required);
        assert_eq!(plan.validation, ValidationLevel::Always);
        assert!(!plan.llm_analysis);
    }

    #[test]
    fn tier4_mandates_validation_and_llm_analysis() {
        let plan = route(Tier::T4);
        assert_eq!(plan.validation, ValidationLevel::Mandatory);
        assert!(plan.llm_analysis);
        assert_eq!(plan.steps, tier3_strategy().steps);
    }
}
