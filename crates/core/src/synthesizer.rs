//! Combines the four section outcomes into one `SwitchingStrategy`.
//!
//! Pure: the analysis id and timestamp come in through [`SynthesisStamp`].

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::request::AnalysisRequest;
use crate::domain::strategy::{
    BarrierRecord, OpportunityRecord, RiskAssessment, RiskLevel, RoadmapRecord, RoiRecord,
    Section, SectionKind, SwitchingStrategy,
};
use crate::domain::template::IndustryTemplate;

const SUMMARY_BARRIER_LIMIT: usize = 3;
const LONG_ROADMAP_PHASES: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisSections {
    pub barriers: Section<Vec<BarrierRecord>>,
    pub opportunities: Section<Vec<OpportunityRecord>>,
    pub roadmap: Section<RoadmapRecord>,
    pub roi: Section<RoiRecord>,
}

impl AnalysisSections {
    /// Sections that produced no usable data, in canonical order.
    pub fn unusable(&self) -> Vec<SectionKind> {
        let usable = [
            self.barriers.is_usable(),
            self.opportunities.is_usable(),
            self.roadmap.is_usable(),
            self.roi.is_usable(),
        ];
        SectionKind::ALL
            .into_iter()
            .zip(usable)
            .filter_map(|(kind, usable)| (!usable).then_some(kind))
            .collect()
    }

    pub fn all_unavailable(&self) -> bool {
        self.barriers.is_unavailable()
            && self.opportunities.is_unavailable()
            && self.roadmap.is_unavailable()
            && self.roi.is_unavailable()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SynthesisStamp {
    pub analysis_id: Uuid,
    pub generated_at: DateTime<Utc>,
}

impl SynthesisStamp {
    pub fn now() -> Self {
        Self { analysis_id: Uuid::new_v4(), generated_at: Utc::now() }
    }
}

pub fn synthesize(
    sections: AnalysisSections,
    request: &AnalysisRequest,
    template: &IndustryTemplate,
    stamp: SynthesisStamp,
) -> SwitchingStrategy {
    let unavailable_sections = sections.unusable();
    let AnalysisSections { barriers, opportunities, roadmap, roi } = sections;

    let mut barriers = barriers.into_data_or_default();
    // Stable sort keeps provider order among equal severities.
    barriers.sort_by(|a, b| b.severity.cmp(&a.severity));
    let mut opportunities = opportunities.into_data_or_default();
    opportunities.sort_by(|a, b| b.success_probability_pct.cmp(&a.success_probability_pct));
    let roadmap = roadmap.into_data_or_default();
    let roi = roi.into_data_or_default();

    let risk_assessment = assess_risk(&barriers, &roadmap);
    let executive_summary = executive_summary(request, &barriers, &opportunities, &roadmap, &roi);

    SwitchingStrategy {
        analysis_id: stamp.analysis_id,
        industry: request.industry.clone(),
        competitor: request.competitor.clone(),
        depth: request.depth,
        barriers,
        opportunities,
        roadmap,
        roi,
        success_metrics: template.success_metrics.clone(),
        executive_summary,
        risk_assessment,
        incomplete: !unavailable_sections.is_empty(),
        unavailable_sections,
        generated_at: stamp.generated_at,
    }
}

pub fn assess_risk(barriers: &[BarrierRecord], roadmap: &RoadmapRecord) -> RiskAssessment {
    let high_severity_barriers =
        barriers.iter().filter(|barrier| barrier.severity.is_high()).count();
    let roadmap_phases = roadmap.phases.len();

    let mut score = 2 * high_severity_barriers;
    if roadmap_phases > LONG_ROADMAP_PHASES {
        score += 1;
    }
    if roadmap_phases == 0 {
        score += 2;
    }

    let level = match score {
        0 => RiskLevel::Low,
        1..=2 => RiskLevel::Moderate,
        3..=4 => RiskLevel::Elevated,
        _ => RiskLevel::High,
    };

    let roadmap_note = if roadmap_phases == 0 {
        "no migration roadmap available".to_string()
    } else {
        format!("{roadmap_phases}-phase migration roadmap")
    };
    let rationale = format!(
        "{high_severity_barriers} high-severity barrier(s) and a {roadmap_note} (score {score})"
    );

    RiskAssessment { level, high_severity_barriers, roadmap_phases, rationale }
}

fn executive_summary(
    request: &AnalysisRequest,
    barriers: &[BarrierRecord],
    opportunities: &[OpportunityRecord],
    roadmap: &RoadmapRecord,
    roi: &RoiRecord,
) -> String {
    let mut sentences = vec![format!(
        "Switching analysis for a {} account currently served by {}.",
        request.industry, request.competitor
    )];

    if !barriers.is_empty() {
        let top = barriers
            .iter()
            .take(SUMMARY_BARRIER_LIMIT)
            .map(|barrier| {
                format!(
                    "{} ({}, severity {})",
                    barrier.description, barrier.category, barrier.severity
                )
            })
            .collect::<Vec<_>>()
            .join("; ");
        sentences.push(format!(
            "{} switching barrier(s) identified; most severe: {top}.",
            barriers.len()
        ));
    }

    if let Some(best) = opportunities.first() {
        sentences.push(format!(
            "{} competitive vulnerabilities found; strongest is {} at {}% estimated success.",
            opportunities.len(),
            best.vulnerability,
            best.success_probability_pct
        ));
    }

    if !roadmap.phases.is_empty() {
        let timeline = roadmap.total_timeline.as_deref().unwrap_or("an unspecified timeline");
        sentences.push(format!(
            "Migration roadmap spans {timeline} across {} phase(s).",
            roadmap.phases.len()
        ));
    }

    if let Some(months) = roi.break_even_months {
        match roi.roi_percentage {
            Some(percentage) => sentences.push(format!(
                "Projected {percentage}% ROI with a {months}-month break-even."
            )),
            None => sentences.push(format!("Projected break-even after {months} months.")),
        }
    }

    sentences.join(" ")
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use super::{assess_risk, synthesize, AnalysisSections, SynthesisStamp};
    use crate::catalog::TemplateCatalog;
    use crate::domain::request::{AnalysisRequest, IndustryTag};
    use crate::domain::strategy::{
        BarrierCategory, BarrierRecord, OpportunityRecord, RiskLevel, RoadmapPhase,
        RoadmapRecord, RoiRange, RoiRecord, Section, SectionKind, Severity,
    };

    fn barrier(description: &str, severity: u8) -> BarrierRecord {
        BarrierRecord {
            category: BarrierCategory::Technical,
            severity: Severity::new(severity).expect("valid severity"),
            description: description.to_string(),
            mitigation: "staged rollout".to_string(),
            timeline: "2 months".to_string(),
            investment: "$25K-$75K".to_string(),
        }
    }

    fn opportunity(vulnerability: &str, severity: u8) -> OpportunityRecord {
        OpportunityRecord::new(
            vulnerability,
            Severity::new(severity).expect("valid severity"),
            "observed weakness",
            "lead with it",
            "next renewal",
        )
    }

    fn roadmap(phases: usize) -> RoadmapRecord {
        RoadmapRecord {
            total_timeline: Some("6-9 months".to_string()),
            phases: (0..phases)
                .map(|index| RoadmapPhase {
                    name: format!("phase {index}"),
                    duration: "1 month".to_string(),
                    milestones: Vec::new(),
                })
                .collect(),
        }
    }

    fn roi() -> RoiRecord {
        RoiRecord {
            break_even_months: Some(18),
            costs: vec![RoiRange {
                label: "Implementation".to_string(),
                low: Decimal::from(75_000),
                high: Decimal::from(200_000),
                text: "$75K-$200K".to_string(),
            }],
            benefits: Vec::new(),
            roi_percentage: Some(275),
        }
    }

    fn stamp() -> SynthesisStamp {
        SynthesisStamp {
            analysis_id: Uuid::nil(),
            generated_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().expect("timestamp"),
        }
    }

    fn run(sections: AnalysisSections) -> crate::domain::strategy::SwitchingStrategy {
        let catalog = TemplateCatalog::builtin().expect("builtin catalog");
        let request = AnalysisRequest::new("saas", "incumbent");
        let template = catalog.industry(&IndustryTag::new("saas")).expect("saas");
        synthesize(sections, &request, template, stamp())
    }

    #[test]
    fn complete_sections_produce_sorted_complete_strategy() {
        let strategy = run(AnalysisSections {
            barriers: Section::available(vec![
                barrier("Data lock-in", 6),
                barrier("Custom integrations", 9),
                barrier("Contract penalties", 6),
            ]),
            opportunities: Section::available(vec![
                opportunity("pricing_rigidity", 4),
                opportunity("support_quality", 8),
            ]),
            roadmap: Section::available(roadmap(3)),
            roi: Section::available(roi()),
        });

        assert!(!strategy.incomplete);
        assert!(strategy.unavailable_sections.is_empty());
        let order = strategy.barriers.iter().map(|b| b.description.as_str()).collect::<Vec<_>>();
        assert_eq!(order, vec!["Custom integrations", "Data lock-in", "Contract penalties"]);
        assert_eq!(strategy.opportunities[0].vulnerability, "support_quality");
        assert_eq!(strategy.success_metrics[1], "feature_adoption_rate");
        assert!(strategy.executive_summary.contains("Custom integrations"));
        assert!(strategy.executive_summary.contains("275% ROI with a 18-month break-even"));
        assert_eq!(strategy.risk_assessment.level, RiskLevel::Moderate);
        assert_eq!(strategy.analysis_id, Uuid::nil());
    }

    #[test]
    fn unavailable_and_empty_sections_mark_strategy_incomplete() {
        let strategy = run(AnalysisSections {
            barriers: Section::available(vec![barrier("Custom integrations", 5)]),
            opportunities: Section::available(Vec::new()),
            roadmap: Section::available(roadmap(2)),
            roi: Section::unavailable("all providers failed"),
        });

        assert!(strategy.incomplete);
        assert_eq!(
            strategy.unavailable_sections,
            vec![SectionKind::Opportunities, SectionKind::Roi]
        );
        assert_eq!(strategy.roi, RoiRecord::default());
        assert!(!strategy.executive_summary.contains("ROI"));
    }

    #[test]
    fn empty_but_available_sections_are_incomplete_not_unavailable() {
        let sections = AnalysisSections {
            barriers: Section::available(Vec::new()),
            opportunities: Section::available(Vec::new()),
            roadmap: Section::available(RoadmapRecord::default()),
            roi: Section::available(RoiRecord::default()),
        };

        assert!(!sections.all_unavailable());
        assert_eq!(sections.unusable(), SectionKind::ALL.to_vec());

        let strategy = run(sections);
        assert!(strategy.incomplete);
        assert_eq!(strategy.unavailable_sections, SectionKind::ALL.to_vec());
        assert_eq!(
            strategy.executive_summary,
            "Switching analysis for a saas account currently served by incumbent."
        );
    }

    #[test]
    fn four_unavailable_sections_are_all_unavailable() {
        let sections = AnalysisSections {
            barriers: Section::unavailable("timeout"),
            opportunities: Section::unavailable("timeout"),
            roadmap: Section::unavailable("timeout"),
            roi: Section::unavailable("timeout"),
        };

        assert!(sections.all_unavailable());
    }

    #[test]
    fn summary_names_at_most_three_barriers() {
        let strategy = run(AnalysisSections {
            barriers: Section::available(vec![
                barrier("alpha", 9),
                barrier("bravo", 8),
                barrier("charlie", 7),
                barrier("delta", 6),
            ]),
            opportunities: Section::unavailable("timeout"),
            roadmap: Section::unavailable("timeout"),
            roi: Section::unavailable("timeout"),
        });

        assert!(strategy.executive_summary.contains("charlie"));
        assert!(!strategy.executive_summary.contains("delta"));
    }

    #[test]
    fn risk_levels_follow_score_thresholds() {
        let cases = [
            (vec![], 3, RiskLevel::Low),
            (vec![], 5, RiskLevel::Moderate),
            (vec![barrier("a", 8)], 2, RiskLevel::Moderate),
            (vec![], 0, RiskLevel::Moderate),
            (vec![barrier("a", 8)], 0, RiskLevel::Elevated),
            (vec![barrier("a", 8), barrier("b", 10)], 3, RiskLevel::Elevated),
            (vec![barrier("a", 8), barrier("b", 9)], 6, RiskLevel::High),
            (vec![barrier("a", 7), barrier("b", 7)], 2, RiskLevel::Low),
        ];

        for (barriers, phases, expected) in cases {
            let assessment = assess_risk(&barriers, &roadmap(phases));
            assert_eq!(assessment.level, expected, "barriers={barriers:?} phases={phases}");
        }
    }
}
