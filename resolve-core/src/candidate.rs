//! Candidate types: proposed domains and contacts, each carrying its
//! provenance (source tags) and any corroborating signals observed along
//! the way. Nothing downstream works with untyped/dict-shaped candidates.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::adapters::SourceTag;

/// Signals a source observed while surfacing a domain candidate, used by
/// the resolver's scorer as bonuses/penalties.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DomainSignals {
    pub phone_match_on_page: bool,
    pub city_match_on_page: bool,
    pub schema_org_name_match: bool,
    pub is_directory_site: bool,
    pub is_parent_company: bool,
}

/// A proposed domain, as surfaced by one or more adapters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DomainCandidate {
    /// Canonicalized domain (lowercase, no scheme, no `www.`, no path).
    pub domain: String,
    pub sources: BTreeSet<SourceTag>,
    pub signals: DomainSignals,
    /// Raw-confidence hint from the first source that produced this
    /// candidate, before the resolver's scorer runs.
    pub raw_confidence: f64,
    /// Step index in the router's plan at which this candidate first
    /// appeared; used as a tie-break (earlier wins).
    pub step_index: usize,
}

impl DomainCandidate {
    pub fn new(domain: impl Into<String>, source: SourceTag, step_index: usize) -> Self {
        let mut sources = BTreeSet::new();
        sources.insert(source);
        Self {
            domain: domain.into(),
            sources,
            signals: DomainSignals::default(),
            raw_confidence: 0.0,
            step_index,
        }
    }

    /// Merge another observation of the same domain: union sources, OR the
    /// boolean signals, keep the higher raw confidence and earlier step.
    pub fn merge(&mut self, other: &DomainCandidate) {
        self.sources.extend(other.sources.iter().copied());
        self.signals.phone_match_on_page |= other.signals.phone_match_on_page;
        self.signals.city_match_on_page |= other.signals.city_match_on_page;
        self.signals.schema_org_name_match |= other.signals.schema_org_name_match;
        self.signals.is_directory_site |= other.signals.is_directory_site;
        self.signals.is_parent_company |= other.signals.is_parent_company;
        self.raw_confidence = self.raw_confidence.max(other.raw_confidence);
        self.step_index = self.step_index.min(other.step_index);
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}

/// Signals observed about a contact candidate, consumed by the validator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContactSignals {
    pub email_syntactically_valid: bool,
    pub email_deliverable: Option<bool>,
    pub is_role_account: bool,
    pub is_personal_domain: bool,
    pub linkedin_normalized: bool,
    pub name_matches_domain_convention: bool,
}

/// A proposed contact, as surfaced by one or more adapters, prior to
/// validator scoring.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContactCandidate {
    pub name: Option<String>,
    pub title: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub linkedin_url: Option<String>,
    pub sources: BTreeSet<SourceTag>,
    pub signals: ContactSignals,
}

impl ContactCandidate {
    pub fn from_source(source: SourceTag) -> Self {
        let mut sources = BTreeSet::new();
        sources.insert(source);
        Self {
            sources,
            ..Default::default()
        }
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// True if the candidate carries at least one identity-bearing field.
    pub fn has_identity(&self) -> bool {
        self.name.is_some() || self.email.is_some() || self.phone.is_some()
    }
}
