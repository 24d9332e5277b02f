//! Domain model, prompt/parser contracts and synthesis for switching analyses.

pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod metrics;
pub mod parser;
pub mod prompts;
pub mod synthesizer;

pub use catalog::{CatalogError, TemplateCatalog};
pub use domain::request::{
    AnalysisDepth, AnalysisRequest, CompetitorId, IndustryTag, TimelineUrgency,
};
pub use domain::strategy::{
    BarrierCategory, BarrierRecord, OpportunityRecord, RiskAssessment, RiskLevel, RoadmapPhase,
    RoadmapRecord, RoiRange, RoiRecord, Section, SectionKind, Severity, SwitchingStrategy,
};
pub use domain::template::{CompetitorProfile, IndustryTemplate, TimelinePhase};
pub use errors::{AnalysisError, ApplicationError, DomainError, InterfaceError};
pub use metrics::{InMemoryMetricsSink, MetricsError, MetricsSink, SubRequestMetric};
pub use parser::{ParseError, ParseOutcome, StructuredRecord};
pub use prompts::{PromptBuilder, PromptContract, PromptError, PromptInputs, RenderedPrompt};
pub use synthesizer::{synthesize, AnalysisSections, SynthesisStamp};
