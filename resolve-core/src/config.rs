//! Typed configuration, loaded from TOML with environment overrides for
//! secrets. Mirrors the four sections every deployment tunes: adapters,
//! thresholds, routing, and llm.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdapterConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: default_timeout_ms(),
            rate_limit_per_minute: default_rate_limit(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_timeout_ms() -> u64 {
    8_000
}
fn default_rate_limit() -> u32 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Thresholds {
    pub accept_threshold: f64,
    pub valid_threshold: f64,
    pub per_row_deadline_secs: u64,
    pub per_row_cost_budget_usd: f64,
    pub max_contact_steps: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            accept_threshold: 70.0,
            valid_threshold: 50.0,
            per_row_deadline_secs: 45,
            per_row_cost_budget_usd: 0.50,
            max_contact_steps: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Routing {
    pub web_search_kg: bool,
    pub directory_scrape: bool,
    pub b2b_enrich: bool,
    pub places_phone_verify: bool,
    pub places_name_match: bool,
    pub llm_search: bool,
}

impl Default for Routing {
    fn default() -> Self {
        Self {
            web_search_kg: true,
            directory_scrape: true,
            b2b_enrich: true,
            places_phone_verify: true,
            places_name_match: true,
            llm_search: true,
        }
    }
}

impl Routing {
    /// Whether the given adapter tag is enabled, matching the router's
    /// `SourceTag` strings. Unknown tags are enabled by default.
    pub fn is_enabled(&self, tag: &str) -> bool {
        match tag {
            "web_search_kg" => self.web_search_kg,
            "directory_scrape" => self.directory_scrape,
            "b2b_enrich" => self.b2b_enrich,
            "places_phone_verify" => self.places_phone_verify,
            "places_name_match" => self.places_name_match,
            "llm_search" => self.llm_search,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.anthropic.com".to_string(),
            model: "claude-3-5-haiku-20241022".to_string(),
            timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub adapters: HashMap<String, AdapterConfig>,
    pub thresholds: Thresholds,
    pub routing: Routing,
    pub llm: LlmConfig,
    /// Worker pool concurrency for the orchestrator.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    10
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    pub fn adapter(&self, tag: &str) -> AdapterConfig {
        self.adapters.get(tag).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_thresholds_spec() {
        let t = Thresholds::default();
        assert_eq!(t.accept_threshold, 70.0);
        assert_eq!(t.valid_threshold, 50.0);
        assert_eq!(t.per_row_deadline_secs, 45);
        assert_eq!(t.max_contact_steps, 5);
    }

    #[test]
    fn routing_defaults_enable_every_known_adapter() {
        let routing = Routing::default();
        assert!(routing.is_enabled("web_search_kg"));
        assert!(routing.is_enabled("places_phone_verify"));
        assert!(routing.is_enabled("b2b_enrich"));
    }

    #[test]
    fn routing_respects_explicit_disable() {
        let toml = r#"
            [routing]
            b2b_enrich = false
        "#;
        let cfg = Config::from_toml_str(toml).unwrap();
        assert!(!cfg.routing.is_enabled("b2b_enrich"));
        assert!(cfg.routing.is_enabled("web_search_kg"));
    }

    #[test]
    fn parses_minimal_toml() {
        let toml = r#"
            [thresholds]
            accept_threshold = 75.0

            [llm]
            model = "claude-3-5-haiku-20241022"
        "#;
        let cfg = Config::from_toml_str(toml).unwrap();
        assert_eq!(cfg.thresholds.accept_threshold, 75.0);
        assert_eq!(cfg.thresholds.valid_threshold, 50.0);
        assert_eq!(cfg.llm.model, "claude-3-5-haiku-20241022");
    }

    #[test]
    fn unknown_adapter_falls_back_to_default() {
        let cfg = Config::default();
        let a = cfg.adapter("places_phone_verify");
        assert!(a.enabled);
        assert_eq!(a.timeout_ms, 8_000);
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = Config::from_toml_str("not valid = [[[").unwrap_err();
        assert_eq!(err.kind(), "input_invalid");
    }
}
