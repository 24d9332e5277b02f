use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::DomainError;

/// Normalized industry key (`financial_services`, `saas`, ...).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct IndustryTag(String);

impl IndustryTag {
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(normalize_key(value.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for IndustryTag {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for IndustryTag {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<IndustryTag> for String {
    fn from(value: IndustryTag) -> Self {
        value.0
    }
}

impl fmt::Display for IndustryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CompetitorId(String);

impl CompetitorId {
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(normalize_key(value.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CompetitorId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for CompetitorId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<CompetitorId> for String {
    fn from(value: CompetitorId) -> Self {
        value.0
    }
}

impl fmt::Display for CompetitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisDepth {
    Basic,
    #[default]
    Comprehensive,
    Strategic,
}

impl AnalysisDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Comprehensive => "comprehensive",
            Self::Strategic => "strategic",
        }
    }

    /// Upper bound on table rows requested from a provider for one section.
    pub fn requested_rows(&self) -> usize {
        match self {
            Self::Basic => 3,
            Self::Comprehensive => 5,
            Self::Strategic => 8,
        }
    }
}

impl FromStr for AnalysisDepth {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "comprehensive" => Ok(Self::Comprehensive),
            "strategic" => Ok(Self::Strategic),
            other => Err(DomainError::InvariantViolation(format!(
                "unsupported analysis depth `{other}` (expected basic|comprehensive|strategic)"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineUrgency {
    #[default]
    Standard,
    Accelerated,
    Urgent,
}

impl TimelineUrgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Accelerated => "accelerated",
            Self::Urgent => "urgent",
        }
    }
}

impl FromStr for TimelineUrgency {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "accelerated" => Ok(Self::Accelerated),
            "urgent" => Ok(Self::Urgent),
            other => Err(DomainError::InvariantViolation(format!(
                "unsupported timeline urgency `{other}` (expected standard|accelerated|urgent)"
            ))),
        }
    }
}

/// Caller input for one switching analysis.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub industry: IndustryTag,
    pub competitor: CompetitorId,
    #[serde(default, alias = "profile")]
    pub account_profile: BTreeMap<String, Value>,
    #[serde(default, alias = "analysis_depth")]
    pub depth: AnalysisDepth,
    #[serde(default, alias = "timeline_urgency")]
    pub urgency: TimelineUrgency,
}

impl AnalysisRequest {
    pub fn new(industry: impl Into<IndustryTag>, competitor: impl Into<CompetitorId>) -> Self {
        Self {
            industry: industry.into(),
            competitor: competitor.into(),
            account_profile: BTreeMap::new(),
            depth: AnalysisDepth::default(),
            urgency: TimelineUrgency::default(),
        }
    }

    pub fn with_profile(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.account_profile.insert(attribute.into(), value.into());
        self
    }

    pub fn with_depth(mut self, depth: AnalysisDepth) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_urgency(mut self, urgency: TimelineUrgency) -> Self {
        self.urgency = urgency;
        self
    }
}

fn normalize_key(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|ch| if ch == '-' || ch.is_whitespace() { '_' } else { ch.to_ascii_lowercase() })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{AnalysisDepth, AnalysisRequest, IndustryTag, TimelineUrgency};

    #[test]
    fn industry_tags_are_normalized() {
        assert_eq!(IndustryTag::new(" Financial Services ").as_str(), "financial_services");
        assert_eq!(IndustryTag::new("SaaS").as_str(), "saas");
        assert_eq!(IndustryTag::new("health-care"), IndustryTag::new("health_care"));
    }

    #[test]
    fn request_deserializes_with_defaults_and_aliases() {
        let request: AnalysisRequest = serde_json::from_value(json!({
            "industry": "saas",
            "competitor": "incumbent",
            "profile": {"size": "enterprise"}
        }))
        .expect("request should deserialize");

        assert_eq!(request.industry.as_str(), "saas");
        assert_eq!(request.depth, AnalysisDepth::Comprehensive);
        assert_eq!(request.urgency, TimelineUrgency::Standard);
        assert_eq!(request.account_profile.get("size"), Some(&json!("enterprise")));
    }

    #[test]
    fn depth_parsing_rejects_unknown_values() {
        let depth = "Strategic".parse::<AnalysisDepth>().expect("strategic");
        assert_eq!(depth, AnalysisDepth::Strategic);
        assert!("exhaustive".parse::<AnalysisDepth>().is_err());
    }

    #[test]
    fn deeper_analyses_request_more_rows() {
        assert!(
            AnalysisDepth::Basic.requested_rows() < AnalysisDepth::Comprehensive.requested_rows()
        );
        assert!(
            AnalysisDepth::Comprehensive.requested_rows() < AnalysisDepth::Strategic.requested_rows()
        );
    }
}
