//! Contact Validator (C8): bounded additive scoring over a fixed set of
//! signals, capped at 100, with a small set of penalties. Grounded in the
//! role-account / free-provider reference tables exercised by the original
//! email-finder test suite.

use std::collections::HashSet;
use std::sync::OnceLock;

use crate::candidate::ContactCandidate;
use crate::contact::Contact;

const MAX_NAME: f64 = 20.0;
const MAX_TITLE: f64 = 15.0;
const MAX_EMAIL_SYNTAX: f64 = 10.0;
const MAX_EMAIL_DELIVERABLE: f64 = 15.0;
const MAX_EMAIL_DOMAIN_MATCH: f64 = 15.0;
const MAX_NOT_ROLE_ACCOUNT: f64 = 10.0;
const MAX_LINKEDIN: f64 = 10.0;
const MAX_MULTI_SOURCE: f64 = 5.0;

const PENALTY_GENERIC_INBOX: f64 = 20.0;
const PENALTY_FREE_PROVIDER: f64 = 15.0;
const PENALTY_DIRECTORY_BRAND: f64 = 30.0;

pub const VALID_THRESHOLD: f64 = 50.0;

fn role_accounts() -> &'static HashSet<&'static str> {
    static TABLE: OnceLock<HashSet<&'static str>> = OnceLock::new();
    TABLE.get_or_init(|| {
        [
            "info", "sales", "support", "contact", "admin", "hello", "office",
            "help", "inquiries", "service", "team", "billing", "accounts",
        ]
        .into_iter()
        .collect()
    })
}

fn free_providers() -> &'static HashSet<&'static str> {
    static TABLE: OnceLock<HashSet<&'static str>> = OnceLock::new();
    TABLE.get_or_init(|| {
        [
            "gmail.com",
            "yahoo.com",
            "hotmail.com",
            "outlook.com",
            "aol.com",
            "icloud.com",
            "protonmail.com",
        ]
        .into_iter()
        .collect()
    })
}

const DIRECTORY_BRAND_NAMES: &[&str] = &[
    "yelp", "yellowpages", "bbb", "manta", "foursquare", "mapquest", "superpages",
];

/// Very small RFC-5322-adjacent syntax check: `local@domain.tld`, no
/// whitespace, at least one dot in the domain part.
pub fn is_syntactically_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.contains(char::is_whitespace) || email.matches('@').count() != 1 {
        return false;
    }
    let (local, domain) = match email.split_once('@') {
        Some(parts) => parts,
        None => return false,
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

fn email_local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or("")
}

fn email_domain_part(email: &str) -> &str {
    email.split('@').nth(1).unwrap_or("")
}

fn is_role_account(email: &str) -> bool {
    role_accounts().contains(email_local_part(email).to_lowercase().as_str())
}

fn is_free_provider_domain(email: &str) -> bool {
    free_providers().contains(email_domain_part(email).to_lowercase().as_str())
}

fn looks_like_directory_brand(name: &str) -> bool {
    let lower = name.to_lowercase();
    DIRECTORY_BRAND_NAMES.iter().any(|b| lower.contains(b))
}

fn is_plausible_person_name(name: &str) -> bool {
    let name = name.trim();
    if name.is_empty() || name.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    let words: Vec<&str> = name.split_whitespace().collect();
    words.len() >= 2
        && words
            .iter()
            .all(|w| w.chars().all(|c| c.is_alphabetic() || c == '-' || c == '\''))
}

fn is_generic_title(title: &str) -> bool {
    matches!(
        title.trim().to_lowercase().as_str(),
        "" | "employee" | "staff" | "team member" | "n/a"
    )
}

/// A scored contact plus a breakdown of how each signal contributed, so
/// the result is explainable rather than a single opaque number.
#[derive(Debug, Clone, Default)]
pub struct ScoreBreakdown {
    pub name: f64,
    pub title: f64,
    pub email_syntax: f64,
    pub email_deliverable: f64,
    pub email_domain_match: f64,
    pub not_role_account: f64,
    pub linkedin: f64,
    pub multi_source: f64,
    pub penalties: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        (self.name
            + self.title
            + self.email_syntax
            + self.email_deliverable
            + self.email_domain_match
            + self.not_role_account
            + self.linkedin
            + self.multi_source
            - self.penalties)
            .clamp(0.0, 100.0)
    }
}

/// Score a contact candidate against the resolved company domain (if any),
/// returning the finished `Contact` with confidence and validity set.
pub fn validate(candidate: ContactCandidate, company_domain: Option<&str>) -> Contact {
    let mut breakdown = ScoreBreakdown::default();

    let has_name = candidate
        .name
        .as_deref()
        .map(is_plausible_person_name)
        .unwrap_or(false);
    let name_is_brand = candidate
        .name
        .as_deref()
        .map(looks_like_directory_brand)
        .unwrap_or(false);
    if has_name && !name_is_brand {
        breakdown.name = MAX_NAME;
    }
    if name_is_brand {
        breakdown.penalties += PENALTY_DIRECTORY_BRAND;
    }

    if let Some(title) = candidate.title.as_deref() {
        if !is_generic_title(title) {
            breakdown.title = MAX_TITLE;
        }
    }

    let email_valid = candidate
        .email
        .as_deref()
        .map(is_syntactically_valid_email)
        .unwrap_or(false);
    if email_valid {
        breakdown.email_syntax = MAX_EMAIL_SYNTAX;
    }

    if let Some(true) = candidate.signals.email_deliverable {
        breakdown.email_deliverable = MAX_EMAIL_DELIVERABLE;
    }

    let email = candidate.email.as_deref();
    let domain_matches = match (email, company_domain) {
        (Some(e), Some(d)) if email_valid => {
            email_domain_part(e).eq_ignore_ascii_case(d)
        }
        _ => false,
    };
    if domain_matches {
        breakdown.email_domain_match = MAX_EMAIL_DOMAIN_MATCH;
    }

    let role_account = email.map(is_role_account).unwrap_or(false);
    if email_valid && !role_account {
        breakdown.not_role_account = MAX_NOT_ROLE_ACCOUNT;
    }
    if role_account && !has_name {
        breakdown.penalties += PENALTY_GENERIC_INBOX;
    }

    let free_provider = email.map(is_free_provider_domain).unwrap_or(false);
    if free_provider && company_domain.is_some() {
        breakdown.penalties += PENALTY_FREE_PROVIDER;
    }

    let linkedin_normalized = candidate.signals.linkedin_normalized && candidate.linkedin_url.is_some();
    if linkedin_normalized {
        breakdown.linkedin = MAX_LINKEDIN;
    }

    if candidate.source_count() >= 2 {
        breakdown.multi_source = MAX_MULTI_SOURCE;
    }

    let confidence = breakdown.total();

    let has_verified_email = email_valid && candidate.signals.email_deliverable == Some(true);
    let has_phone_and_name = candidate.phone.is_some() && has_name;
    let has_linkedin_and_name = linkedin_normalized && has_name;
    let is_valid = confidence >= VALID_THRESHOLD
        && (has_verified_email || has_phone_and_name || has_linkedin_and_name);

    Contact {
        name: candidate.name,
        title: candidate.title,
        email: candidate.email,
        phone: candidate.phone,
        linkedin_url: candidate.linkedin_url,
        sources: candidate.sources,
        signals: candidate.signals,
        confidence,
        is_valid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::ContactSignals;

    fn base_candidate() -> ContactCandidate {
        let mut c = ContactCandidate::from_source("site_scrape");
        c.name = Some("Jane Doe".to_string());
        c.title = Some("Owner".to_string());
        c.email = Some("jane@acme.com".to_string());
        c
    }

    #[test]
    fn full_signal_contact_is_valid_and_high_confidence() {
        let mut c = base_candidate();
        c.signals.email_deliverable = Some(true);
        let contact = validate(c, Some("acme.com"));
        assert!(contact.is_valid);
        assert!(contact.confidence >= 80.0);
    }

    #[test]
    fn generic_inbox_without_name_is_invalid() {
        let mut c = ContactCandidate::from_source("site_scrape");
        c.email = Some("info@acme.com".to_string());
        let contact = validate(c, Some("acme.com"));
        assert!(!contact.is_valid);
        assert!(contact.confidence <= 40.0);
    }

    #[test]
    fn free_provider_with_company_domain_is_penalized() {
        let mut c = base_candidate();
        c.email = Some("jane@gmail.com".to_string());
        let with_penalty = validate(c.clone(), Some("acme.com"));
        c.email = Some("jane@acme.com".to_string());
        let without_penalty = validate(c, Some("acme.com"));
        assert!(with_penalty.confidence < without_penalty.confidence);
    }

    #[test]
    fn directory_brand_name_is_penalized() {
        let mut c = ContactCandidate::from_source("directory_scrape");
        c.name = Some("Yelp Business".to_string());
        let contact = validate(c, None);
        assert_eq!(contact.confidence, 0.0);
    }

    #[test]
    fn linkedin_and_name_without_email_can_be_valid() {
        let mut c = ContactCandidate::from_source("site_scrape");
        c.name = Some("Jane Doe".to_string());
        c.linkedin_url = Some("linkedin.com/in/jane-doe".to_string());
        c.signals.linkedin_normalized = true;
        let contact = validate(c, None);
        assert!(contact.is_valid);
    }

    #[test]
    fn email_syntax_rejects_malformed() {
        assert!(!is_syntactically_valid_email("not-an-email"));
        assert!(!is_syntactically_valid_email("a b@c.com"));
        assert!(is_syntactically_valid_email("a@b.com"));
    }

    #[test]
    fn score_breakdown_clamps_to_zero_not_negative() {
        let mut c = ContactCandidate::from_source("directory_scrape");
        c.name = Some("Yelp".to_string());
        c.email = Some("info@gmail.com".to_string());
        c.signals = ContactSignals {
            is_role_account: true,
            ..Default::default()
        };
        let contact = validate(c, Some("acme.com"));
        assert_eq!(contact.confidence, 0.0);
    }
}
