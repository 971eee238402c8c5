//! LLM client abstraction for judge and tool-selection calls.
//!
//! This module provides a unified interface for working with LLM providers
//! (Anthropic, OpenAI) and a bounded, rate-limited batch executor used by
//! the contact discovery controller and the domain judge.
//!
//! ## Example
//!
//! ```rust,ignore
//! use resolve_core::llm::{AnthropicClient, ClientConfig, CompletionRequest, ChatMessage};
//!
//! let client = AnthropicClient::new(
//!     ClientConfig::new("your-api-key")
//!         .with_default_model("claude-3-5-haiku-20241022")
//! );
//!
//! let request = CompletionRequest::new()
//!     .with_model("claude-3-5-haiku-20241022")
//!     .with_message(ChatMessage::user("Hello"));
//!
//! let response = client.complete(request).await?;
//! ```

mod batch;
mod client;
mod types;

pub use batch::{
    default_provider_rate_limits, BatchConfig, BatchExecutor, BatchQueryResult, BatchedLLMQuery,
    BatchedQueryResults, ProviderRateLimiter, DEFAULT_MAX_PARALLEL, DEFAULT_RATE_LIMIT_WINDOW_MS,
};
pub use client::{
    AnthropicClient, ClientConfig, LLMClient, MultiProviderClient, OpenAIClient, TrackedClient,
};
pub use types::{
    CacheControl, ChatMessage, ChatRole, CompletionRequest, CompletionResponse, CostTracker,
    ModelCosts, ModelSpec, ModelTier, Provider, StopReason, TokenUsage,
};
