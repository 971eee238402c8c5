//! # resolve-core
//!
//! A batch company-resolution engine: given a semi-structured business row
//! (name plus whatever else is known), resolves its canonical web domain
//! and one or more validated human contacts at that business.
//!
//! ## Core Components
//!
//! - **Normalizer**: tiers and classifies an input row
//! - **Resolver**: drives tier-routed adapter plans to a verified domain
//! - **Contact controller**: bounded, early-exiting contact discovery loop
//! - **Validator**: scores contact candidates to a calibrated confidence
//! - **Orchestrator**: bounded-concurrency batch driver with persistence
//!
//! ## Example
//!
//! ```rust,ignore
//! use resolve_core::model::CompanyInput;
//! use resolve_core::normalize::normalize;
//!
//! let input = CompanyInput::new("1", "Meadowbrook Care Center")
//!     .with_city("Boston")
//!     .with_phone("617-555-1234");
//! let normalized = normalize(input);
//! println!("tier: {}", normalized.tier);
//! ```

pub mod adapters;
pub mod candidate;
pub mod config;
pub mod contact;
pub mod error;
pub mod io;
pub mod judge;
pub mod linkedin;
pub mod llm;
pub mod model;
pub mod normalize;
pub mod orchestrator;
pub mod record;
pub mod resolver;
pub mod router;
pub mod store;
pub mod validator;

pub use adapters::{AdapterContext, AdapterErrorKind, AdapterResult, SourceAdapter, SourceTag};
pub use candidate::{ContactCandidate, ContactSignals, DomainCandidate, DomainSignals};
pub use config::Config;
pub use contact::{Contact, ContactDiscoveryController, ContactServices};
pub use error::{Error, Result};
pub use judge::JudgeVerdict;
pub use llm::{
    AnthropicClient, BatchConfig, BatchExecutor, BatchQueryResult, BatchedLLMQuery,
    BatchedQueryResults, ClientConfig, CompletionRequest, CompletionResponse, CostTracker,
    LLMClient, MultiProviderClient, OpenAIClient, Provider, TrackedClient,
};
pub use model::{BusinessType, CompanyInput, NormalizedInput, Tier};
pub use orchestrator::{BatchReport, ExitCode, Orchestrator, PipelineServices};
pub use record::ResolvedRecord;
pub use resolver::{DomainResolution, DomainResolver, DomainServices};
pub use router::{route, StrategyPlan};
pub use store::{JobStatus, JobStore};
