use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::request::{AnalysisDepth, CompetitorId, IndustryTag};
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Barriers,
    Opportunities,
    Roadmap,
    Roi,
}

impl SectionKind {
    pub const ALL: [SectionKind; 4] =
        [Self::Barriers, Self::Opportunities, Self::Roadmap, Self::Roi];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Barriers => "barriers",
            Self::Opportunities => "opportunities",
            Self::Roadmap => "roadmap",
            Self::Roi => "roi",
        }
    }
}

impl FromStr for SectionKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value.trim())
            .ok_or_else(|| DomainError::InvariantViolation(format!("unknown section `{value}`")))
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarrierCategory {
    Technical,
    Economic,
    Organizational,
    Regulatory,
}

impl BarrierCategory {
    pub const ALL: [BarrierCategory; 4] =
        [Self::Technical, Self::Economic, Self::Organizational, Self::Regulatory];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Technical => "technical",
            Self::Economic => "economic",
            Self::Organizational => "organizational",
            Self::Regulatory => "regulatory",
        }
    }
}

impl FromStr for BarrierCategory {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "technical" => Ok(Self::Technical),
            "economic" => Ok(Self::Economic),
            "organizational" | "organisational" => Ok(Self::Organizational),
            "regulatory" => Ok(Self::Regulatory),
            other => Err(DomainError::InvariantViolation(format!(
                "unknown barrier category `{other}`"
            ))),
        }
    }
}

impl fmt::Display for BarrierCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity score on the closed 1..=10 scale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Severity(u8);

impl Severity {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;
    /// Barriers at or above this score count as high severity.
    pub const HIGH_THRESHOLD: u8 = 8;

    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Self(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn is_high(&self) -> bool {
        self.0 >= Self::HIGH_THRESHOLD
    }
}

impl TryFrom<u8> for Severity {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(DomainError::SeverityOutOfRange(value))
    }
}

impl From<Severity> for u8 {
    fn from(value: Severity) -> Self {
        value.0
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarrierRecord {
    pub category: BarrierCategory,
    pub severity: Severity,
    pub description: String,
    pub mitigation: String,
    pub timeline: String,
    pub investment: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpportunityRecord {
    pub vulnerability: String,
    pub severity: Severity,
    pub description: String,
    pub exploitation_strategy: String,
    pub recommended_timing: String,
    pub success_probability_pct: u8,
}

impl OpportunityRecord {
    pub fn new(
        vulnerability: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
        exploitation_strategy: impl Into<String>,
        recommended_timing: impl Into<String>,
    ) -> Self {
        Self {
            vulnerability: vulnerability.into(),
            severity,
            description: description.into(),
            exploitation_strategy: exploitation_strategy.into(),
            recommended_timing: recommended_timing.into(),
            success_probability_pct: success_probability(severity),
        }
    }
}

/// Likelihood of displacing the competitor through a vulnerability, capped at 90%.
pub fn success_probability(severity: Severity) -> u8 {
    (40 + severity.value() * 5).min(90)
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadmapPhase {
    pub name: String,
    pub duration: String,
    pub milestones: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadmapRecord {
    pub total_timeline: Option<String>,
    pub phases: Vec<RoadmapPhase>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoiRange {
    pub label: String,
    pub low: Decimal,
    pub high: Decimal,
    pub text: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoiRecord {
    pub break_even_months: Option<u32>,
    pub costs: Vec<RoiRange>,
    pub benefits: Vec<RoiRange>,
    pub roi_percentage: Option<u32>,
}

impl RoiRecord {
    pub fn total_cost_high(&self) -> Decimal {
        self.costs.iter().map(|range| range.high).sum()
    }
}

/// Whether a parsed section carries any usable data.
pub trait SectionContent {
    fn is_empty_section(&self) -> bool;
}

impl<T> SectionContent for Vec<T> {
    fn is_empty_section(&self) -> bool {
        self.is_empty()
    }
}

impl SectionContent for RoadmapRecord {
    fn is_empty_section(&self) -> bool {
        self.phases.is_empty()
    }
}

impl SectionContent for RoiRecord {
    fn is_empty_section(&self) -> bool {
        self.break_even_months.is_none() && self.costs.is_empty() && self.benefits.is_empty()
    }
}

/// Outcome of one sub-request as seen by the synthesizer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Section<T> {
    Available { data: T },
    Unavailable { reason: String },
}

impl<T> Section<T> {
    pub fn available(data: T) -> Self {
        Self::Available { data }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable { reason: reason.into() }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Available { data } => Some(data),
            Self::Unavailable { .. } => None,
        }
    }
}

impl<T: SectionContent> Section<T> {
    pub fn is_usable(&self) -> bool {
        self.data().is_some_and(|data| !data.is_empty_section())
    }
}

impl<T: Default> Section<T> {
    pub fn into_data_or_default(self) -> T {
        match self {
            Self::Available { data } => data,
            Self::Unavailable { .. } => T::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    Elevated,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::Elevated => "elevated",
            Self::High => "high",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub high_severity_barriers: usize,
    pub roadmap_phases: usize,
    pub rationale: String,
}

/// Synthesized result of one analysis. Immutable once returned.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchingStrategy {
    pub analysis_id: Uuid,
    pub industry: IndustryTag,
    pub competitor: CompetitorId,
    pub depth: AnalysisDepth,
    pub barriers: Vec<BarrierRecord>,
    pub opportunities: Vec<OpportunityRecord>,
    pub roadmap: RoadmapRecord,
    pub roi: RoiRecord,
    pub success_metrics: Vec<String>,
    pub executive_summary: String,
    pub risk_assessment: RiskAssessment,
    pub incomplete: bool,
    pub unavailable_sections: Vec<SectionKind>,
    pub generated_at: DateTime<Utc>,
}
