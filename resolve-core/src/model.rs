//! Input record types: the company row as ingested, its tier and business
//! type classification, and the cleaned form the rest of the pipeline reads.

use serde::{Deserialize, Serialize};

/// A company row as submitted by a caller. Immutable after ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompanyInput {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

impl CompanyInput {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            domain: None,
            city: None,
            state: None,
            phone: None,
            address: None,
            category: None,
            context: None,
        }
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Data-completeness class computed once by the normalizer. Lower is richer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    /// name + city + phone.
    T1,
    /// name + city.
    T2,
    /// name + (category or context).
    T3,
    /// name only.
    T4,
}

impl Tier {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::T1 => 1,
            Self::T2 => 2,
            Self::T3 => 3,
            Self::T4 => 4,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T{}", self.as_u8())
    }
}

/// Routing class used to bias contact-discovery adapter ordering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BusinessType {
    Smb,
    Franchise,
    Healthcare,
    Corporate,
}

impl std::fmt::Display for BusinessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Smb => "smb",
            Self::Franchise => "franchise",
            Self::Healthcare => "healthcare",
            Self::Corporate => "corporate",
        };
        write!(f, "{s}")
    }
}

/// Cleaned input plus its computed classification. Produced by the
/// normalizer; everything downstream reads this, never the raw `CompanyInput`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedInput {
    pub input: CompanyInput,
    pub tier: Tier,
    pub business_type: BusinessType,
    pub warnings: Vec<String>,
}

impl NormalizedInput {
    pub fn row_id(&self) -> &str {
        &self.input.id
    }
}
