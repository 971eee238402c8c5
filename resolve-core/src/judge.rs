//! LLM Judge (C4): structured-output classifier over a candidate domain
//! and its extracted page text. Grounded in
//! `domain-resolver/modules/llm_judge.py`'s `OllamaJudge`: same red-flag /
//! positive-signal prompt structure, same JSON-then-regex decode fallback.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::llm::{ChatMessage, CompletionRequest, LLMClient};
use crate::model::CompanyInput;

const MAX_EXTRACTED_CHARS: usize = 10_000;

/// The judge's structured verdict on one candidate domain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JudgeVerdict {
    #[serde(rename = "match")]
    pub is_match: bool,
    pub confidence: f64,
    #[serde(default)]
    pub evidence: String,
    #[serde(default)]
    pub phone_found: bool,
    #[serde(default)]
    pub address_found: bool,
    #[serde(default)]
    pub name_found: bool,
    #[serde(default)]
    pub is_parent_company: bool,
    #[serde(default)]
    pub is_directory_site: bool,
}

impl JudgeVerdict {
    fn fallback(evidence: impl Into<String>) -> Self {
        Self {
            is_match: false,
            confidence: 0.0,
            evidence: evidence.into(),
            phone_found: false,
            address_found: false,
            name_found: false,
            is_parent_company: false,
            is_directory_site: false,
        }
    }
}

fn build_prompt(company: &CompanyInput, candidate_url: &str, extracted_text: &str) -> String {
    let truncated: String = extracted_text.chars().take(MAX_EXTRACTED_CHARS).collect();
    format!(
        "You are verifying whether a web page belongs to a specific business.\n\n\
         Business:\n  name: {}\n  city: {}\n  phone: {}\n  address: {}\n\n\
         Candidate URL: {candidate_url}\n\n\
         Page text:\n{truncated}\n\n\
         Check for these red flags:\n\
         - directory or listing site (aggregates many businesses)\n\
         - parent company with multiple locations\n\
         - healthcare/industry association rather than the business itself\n\n\
         Check for these positive signals:\n\
         - exact or suffix match of the phone number\n\
         - single-location match (no franchise/chain language)\n\
         - the business name is prominent on the page\n\n\
         Respond with ONLY a JSON object:\n\
         {{\"match\": bool, \"confidence\": 0-100, \"evidence\": \"...\", \
         \"phone_found\": bool, \"address_found\": bool, \"name_found\": bool, \
         \"is_parent_company\": bool, \"is_directory_site\": bool}}",
        company.name,
        company.city.as_deref().unwrap_or("unknown"),
        company.phone.as_deref().unwrap_or("unknown"),
        company.address.as_deref().unwrap_or("unknown"),
    )
}

fn match_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""?match"?\s*[:=]\s*(true|false)"#).unwrap())
}

fn confidence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""?confidence"?\s*[:=]\s*([0-9]+(?:\.[0-9]+)?)"#).unwrap())
}

fn extract_with_regex(raw: &str) -> JudgeVerdict {
    let is_match = match_regex()
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str() == "true")
        .unwrap_or(false);
    let confidence = confidence_regex()
        .captures(raw)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0)
        .clamp(0.0, 100.0);
    JudgeVerdict {
        is_match,
        confidence,
        evidence: "regex-fallback decode".to_string(),
        ..JudgeVerdict::fallback("")
    }
}

fn parse_response(raw: &str) -> JudgeVerdict {
    let trimmed = raw.trim();
    let json_slice = trimmed
        .find('{')
        .and_then(|start| trimmed.rfind('}').map(|end| &trimmed[start..=end]))
        .unwrap_or(trimmed);

    if let Ok(mut verdict) = serde_json::from_str::<JudgeVerdict>(json_slice) {
        verdict.confidence = verdict.confidence.clamp(0.0, 100.0);
        return verdict;
    }
    extract_with_regex(trimmed)
}

/// Ask the judge to evaluate one candidate. Never errors: on a transport
/// or parse failure it returns the documented fallback verdict
/// (`match=false, confidence=0`).
pub async fn judge_candidate(
    client: &dyn LLMClient,
    model: &str,
    company: &CompanyInput,
    candidate_url: &str,
    extracted_text: &str,
) -> JudgeVerdict {
    let prompt = build_prompt(company, candidate_url, extracted_text);
    let request = CompletionRequest::new()
        .with_model(model)
        .with_message(ChatMessage::user(prompt));

    match client.complete(request).await {
        Ok(response) => parse_response(&response.content),
        Err(e) => JudgeVerdict::fallback(format!("judge call failed: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_json() {
        let raw = r#"{"match": true, "confidence": 92, "evidence": "phone matches", "phone_found": true, "address_found": false, "name_found": true, "is_parent_company": false, "is_directory_site": false}"#;
        let v = parse_response(raw);
        assert!(v.is_match);
        assert_eq!(v.confidence, 92.0);
        assert!(v.phone_found);
    }

    #[test]
    fn parses_json_embedded_in_prose() {
        let raw = "Here is my analysis: {\"match\": false, \"confidence\": 10, \"evidence\": \"directory site\"} Hope that helps.";
        let v = parse_response(raw);
        assert!(!v.is_match);
        assert_eq!(v.confidence, 10.0);
    }

    #[test]
    fn falls_back_to_regex_on_malformed_json() {
        let raw = "match: true, confidence: 85 (high confidence based on phone match)";
        let v = parse_response(raw);
        assert!(v.is_match);
        assert_eq!(v.confidence, 85.0);
    }

    #[test]
    fn falls_back_to_zero_confidence_on_garbage() {
        let raw = "I cannot determine this.";
        let v = parse_response(raw);
        assert!(!v.is_match);
        assert_eq!(v.confidence, 0.0);
    }

    #[test]
    fn confidence_is_clamped_to_100() {
        let raw = r#"{"match": true, "confidence": 150}"#;
        let v = parse_response(raw);
        assert_eq!(v.confidence, 100.0);
    }
}
