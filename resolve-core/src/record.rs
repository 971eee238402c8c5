//! `ResolvedRecord`: the merged per-row output of the pipeline, combining
//! the Domain Resolver's verdict with the Contact Discovery Controller's
//! validated contacts.

use serde::{Deserialize, Serialize};

use crate::adapters::SourceTag;
use crate::contact::Contact;

/// A row's resolved domain + contacts, with the invariants documented on
/// the type itself (not re-derived at every call site):
///
/// - `domain.is_none()` implies `domain_confidence == 0.0` and
///   `needs_manual_review == true`.
/// - `stages_completed` is append-only, ordered by completion time.
/// - `total_cost` sums only the cost of stages actually invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedRecord {
    pub id: String,
    pub domain: Option<String>,
    pub domain_confidence: f64,
    pub domain_source: Option<SourceTag>,
    pub needs_manual_review: bool,
    pub contacts: Vec<Contact>,
    pub stages_completed: Vec<SourceTag>,
    pub total_cost: f64,
    pub errors: Vec<String>,
}

impl ResolvedRecord {
    /// Construct a record, enforcing the domain/manual-review invariant at
    /// the boundary rather than trusting callers to set it consistently.
    pub fn new(
        id: impl Into<String>,
        domain: Option<String>,
        domain_confidence: f64,
        domain_source: Option<SourceTag>,
        contacts: Vec<Contact>,
        stages_completed: Vec<SourceTag>,
        total_cost: f64,
        errors: Vec<String>,
        manual_review_requested: bool,
    ) -> Self {
        let needs_manual_review = domain.is_none() || manual_review_requested;
        let domain_confidence = if domain.is_none() { 0.0 } else { domain_confidence };
        Self {
            id: id.into(),
            domain,
            domain_confidence,
            domain_source,
            needs_manual_review,
            contacts,
            stages_completed,
            total_cost,
            errors,
        }
    }

    pub fn best_contact(&self) -> Option<&Contact> {
        self.contacts
            .iter()
            .filter(|c| c.is_valid)
            .max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap_or(std::cmp::Ordering::Equal))
    }

    pub fn has_additional_contacts(&self) -> bool {
        self.contacts.len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_domain_forces_manual_review_and_zero_confidence() {
        let record = ResolvedRecord::new("1", None, 55.0, None, vec![], vec![], 0.0, vec![], false);
        assert!(record.needs_manual_review);
        assert_eq!(record.domain_confidence, 0.0);
    }

    #[test]
    fn resolved_domain_keeps_its_confidence() {
        let record = ResolvedRecord::new(
            "1",
            Some("acme.com".to_string()),
            82.0,
            Some("web_search_kg"),
            vec![],
            vec!["web_search_kg"],
            0.01,
            vec![],
            false,
        );
        assert!(!record.needs_manual_review);
        assert_eq!(record.domain_confidence, 82.0);
    }
}
