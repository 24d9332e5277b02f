//! Provider access and orchestration for switching analyses.
//!
//! `Orchestrator::analyze` builds one prompt per section, calls the provider
//! chain for all four sections concurrently under a single deadline, validates
//! each response with the core parser and synthesizes a `SwitchingStrategy`.
//!
//! Providers are plain text generators behind [`llm::LlmClient`]. They never
//! produce typed data directly: anything they return goes through the
//! versioned row grammars in `switchover_core::parser`.

pub mod llm;
pub mod orchestrator;
pub mod providers;

pub use llm::{GenerationOptions, LlmClient, ProviderError, ProviderSlot};
pub use orchestrator::{Orchestrator, OrchestratorError};
pub use providers::{build_provider_chain, ProviderBuildError};
