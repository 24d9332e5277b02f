use serde::{Deserialize, Serialize};

use crate::domain::request::{CompetitorId, IndustryTag};
use crate::domain::strategy::BarrierCategory;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelinePhase {
    pub name: String,
    pub duration: String,
}

/// Per-industry prompt configuration. Loaded once and shared read-only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndustryTemplate {
    pub industry: IndustryTag,
    pub display_name: String,
    pub barrier_categories: Vec<BarrierCategory>,
    #[serde(default)]
    pub facilitation_strategies: Vec<String>,
    #[serde(default = "default_success_metrics")]
    pub success_metrics: Vec<String>,
    #[serde(default)]
    pub typical_switching_timeline: Option<String>,
    #[serde(default)]
    pub timeline_phases: Vec<TimelinePhase>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorProfile {
    pub competitor: CompetitorId,
    pub competitor_type: String,
    pub market_position: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub vulnerabilities: Vec<String>,
}

impl CompetitorProfile {
    /// Profile used when no document exists for the competitor.
    pub fn unknown(competitor: CompetitorId) -> Self {
        Self {
            competitor,
            competitor_type: "unknown".to_string(),
            market_position: "undefined".to_string(),
            strengths: vec!["market_presence".to_string()],
            weaknesses: vec!["unknown_vulnerabilities".to_string()],
            vulnerabilities: Vec::new(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.competitor_type == "unknown"
    }
}

pub fn default_success_metrics() -> Vec<String> {
    [
        "migration_completion_time",
        "customer_satisfaction_score",
        "business_continuity_maintenance",
        "cost_reduction_achievement",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}
