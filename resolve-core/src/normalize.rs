//! Input Normalizer (C1): pure, deterministic classification of a raw
//! `CompanyInput` into tier + business type, plus light field cleanup.

use crate::model::{BusinessType, CompanyInput, NormalizedInput, Tier};

const FRANCHISE_KEYWORDS: &[&str] = &[
    "franchise", "franchisee", "locations nationwide", "chain",
];

const HEALTHCARE_KEYWORDS: &[&str] = &[
    "clinic", "medical", "dental", "hospital", "nursing", "care center",
    "health", "physician", "urgent care", "pharmacy",
];

const CORPORATE_KEYWORDS: &[&str] = &[
    "inc", "corp", "corporation", "holdings", "enterprises", "group",
    "international", "global",
];

/// Strip scheme, `www.`, path/query/fragment and trailing slash from a
/// domain-like string, lowercasing the result.
pub fn clean_domain_like(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("unknown") {
        return None;
    }
    let mut s = raw.to_lowercase();
    for prefix in ["https://", "http://"] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest.to_string();
        }
    }
    if let Some(rest) = s.strip_prefix("www.") {
        s = rest.to_string();
    }
    if let Some(idx) = s.find(['/', '?', '#']) {
        s.truncate(idx);
    }
    if let Some(idx) = s.find(':') {
        s.truncate(idx);
    }
    let s = s.trim_end_matches('.').to_string();
    if s.is_empty() || !s.contains('.') {
        return None;
    }
    Some(s)
}

/// Coerce a loosely formatted phone number to digits-only, prefixed with
/// `+` when a country code is present. Returns `None` for unparseable
/// or placeholder values.
pub fn clean_phone(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("unknown") {
        return None;
    }
    let has_plus = raw.starts_with('+');
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 7 {
        return None;
    }
    let digits = match digits.len() {
        10 => format!("1{digits}"),
        _ => digits,
    };
    Some(if has_plus || digits.len() > 10 {
        format!("+{digits}")
    } else {
        format!("+1{digits}")
    })
}

fn clean_field(raw: &Option<String>) -> Option<String> {
    raw.as_ref().and_then(|s| {
        let t = s.trim();
        if t.is_empty() || t.eq_ignore_ascii_case("unknown") || t.eq_ignore_ascii_case("n/a") {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn classify_tier(input: &CompanyInput, city: &Option<String>, phone: &Option<String>) -> Tier {
    if city.is_some() && phone.is_some() {
        Tier::T1
    } else if city.is_some() {
        Tier::T2
    } else if input.category.is_some() || input.context.is_some() {
        Tier::T3
    } else {
        Tier::T4
    }
}

fn classify_business_type(input: &CompanyInput) -> BusinessType {
    let haystack = [
        input.name.as_str(),
        input.category.as_deref().unwrap_or(""),
        input.context.as_deref().unwrap_or(""),
    ]
    .join(" ")
    .to_lowercase();

    if HEALTHCARE_KEYWORDS.iter().any(|k| haystack.contains(k)) {
        BusinessType::Healthcare
    } else if FRANCHISE_KEYWORDS.iter().any(|k| haystack.contains(k)) {
        BusinessType::Franchise
    } else if CORPORATE_KEYWORDS
        .iter()
        .any(|k| haystack.split_whitespace().any(|w| w.trim_matches(|c: char| !c.is_alphanumeric()) == *k))
    {
        BusinessType::Corporate
    } else {
        BusinessType::Smb
    }
}

/// Normalize a raw input row into tier + business-type classification plus
/// cleaned fields. Pure and idempotent: running it on an already-cleaned
/// `CompanyInput` yields the same result.
pub fn normalize(input: CompanyInput) -> NormalizedInput {
    let mut warnings = Vec::new();

    if input.name.trim().is_empty() {
        warnings.push("empty company name".to_string());
    }

    let city = clean_field(&input.city);
    let state = clean_field(&input.state);
    let phone = input.phone.as_deref().and_then(clean_phone);
    if input.phone.is_some() && phone.is_none() {
        warnings.push("unparseable phone number".to_string());
    }
    let address = clean_field(&input.address);
    let category = clean_field(&input.category);
    let context = clean_field(&input.context);
    let domain = input.domain.as_deref().and_then(clean_domain_like);

    let cleaned = CompanyInput {
        id: input.id.clone(),
        name: input.name.trim().to_string(),
        domain,
        city,
        state,
        phone,
        address,
        category,
        context,
    };

    let tier = classify_tier(&cleaned, &cleaned.city, &cleaned.phone);
    let business_type = classify_business_type(&cleaned);

    NormalizedInput {
        input: cleaned,
        tier,
        business_type,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_domain_like_strips_scheme_and_www() {
        assert_eq!(
            clean_domain_like("https://www.Example.com/about?x=1#y"),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn clean_domain_like_rejects_placeholder() {
        assert_eq!(clean_domain_like("unknown"), None);
        assert_eq!(clean_domain_like(""), None);
    }

    #[test]
    fn clean_phone_normalizes_to_e164() {
        assert_eq!(clean_phone("(617) 555-1234"), Some("+16175551234".to_string()));
        assert_eq!(clean_phone("+1 617 555 1234"), Some("+16175551234".to_string()));
    }

    #[test]
    fn clean_phone_rejects_too_short() {
        assert_eq!(clean_phone("555-1212"), None);
    }

    #[test]
    fn tier1_requires_city_and_phone() {
        let input = CompanyInput::new("1", "Meadowbrook Care Center")
            .with_city("Boston")
            .with_phone("6175551234")
            .with_context("nursing home");
        let n = normalize(input);
        assert_eq!(n.tier, Tier::T1);
        assert_eq!(n.business_type, BusinessType::Healthcare);
    }

    #[test]
    fn tier4_name_only() {
        let input = CompanyInput::new("2", "Acme Analytics");
        let n = normalize(input);
        assert_eq!(n.tier, Tier::T4);
    }

    #[test]
    fn tier3_from_context_without_city() {
        let input = CompanyInput::new("3", "Acme Analytics").with_context("B2B SaaS");
        let n = normalize(input);
        assert_eq!(n.tier, Tier::T3);
        assert_eq!(n.business_type, BusinessType::Smb);
    }

    #[test]
    fn normalization_is_idempotent() {
        let input = CompanyInput::new("4", " Foo Bar  ")
            .with_city(" Boston ")
            .with_phone("617-555-1234");
        let once = normalize(input);
        let twice = normalize(once.input.clone());
        assert_eq!(once.input, twice.input);
        assert_eq!(once.tier, twice.tier);
    }
}
