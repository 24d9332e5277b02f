//! Prompt templates paired with the parser grammar they ask for.
//!
//! A template and its grammar version are one deployable unit: the fingerprint
//! recorded with every provider attempt changes whenever either side changes.

use serde::Serialize;
use tera::{Context, Tera};
use thiserror::Error;

use crate::domain::request::AnalysisRequest;
use crate::domain::strategy::{BarrierCategory, SectionKind};
use crate::domain::template::{CompetitorProfile, IndustryTemplate};
use crate::parser::grammar_version;

const PREAMBLE: &str = r#"You are a B2B sales strategist helping a vendor displace {{ competitor.competitor }} at a {{ industry_name }} account.
Account profile:
{% for attribute in profile %}- {{ attribute.name }}: {{ attribute.value }}
{% endfor %}Analysis depth: {{ depth }}. Timeline urgency: {{ urgency }}.
Answer ONLY with pipe-delimited table rows in format {{ grammar_version }}. Do not add commentary.
"#;

const BARRIERS_TEMPLATE: &str = r#"{% include "preamble" %}
List up to {{ max_rows }} switching barriers the account faces when leaving {{ competitor.competitor }}.
Consider these barrier categories in order: {{ barrier_categories | join(sep=", ") }}.
Each row: category | severity (integer 1-10) | description | mitigation strategy | timeline | investment range
Category must be one of: technical, economic, organizational, regulatory.
Facilitation strategies available: {{ strategies | join(sep=", ") }}.
"#;

const OPPORTUNITIES_TEMPLATE: &str = r#"{% include "preamble" %}
Competitor type: {{ competitor.competitor_type }}; market position: {{ competitor.market_position }}.
Known strengths: {{ competitor.strengths | join(sep=", ") }}.
Known weaknesses: {{ competitor.weaknesses | join(sep=", ") }}.
{% if competitor.vulnerabilities %}Documented vulnerabilities: {{ competitor.vulnerabilities | join(sep=", ") }}.
{% endif %}List up to {{ max_rows }} competitive vulnerabilities to exploit.
Each row: vulnerability | severity (integer 1-10) | description | exploitation strategy | recommended timing
"#;

const ROADMAP_TEMPLATE: &str = r#"{% include "preamble" %}
Produce a migration roadmap{% if typical_timeline %} within a typical switching timeline of {{ typical_timeline }}{% endif %}.
{% if phases %}Reference phases:
{% for phase in phases %}- {{ phase.name }} ({{ phase.duration }})
{% endfor %}{% endif %}Rows:
TOTAL | overall timeline
PHASE | phase name | duration | milestone; milestone; milestone
"#;

const ROI_TEMPLATE: &str = r#"{% include "preamble" %}
Estimate the business case for switching. Track these success metrics: {{ success_metrics | join(sep=", ") }}.
Rows:
COST | cost label | dollar range such as $50K-$150K
BENEFIT | benefit label | dollar range such as $300K-$450K
BREAK_EVEN | months
ROI | percent
"#;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt template `{name}` failed to render: {source}")]
    Render { name: &'static str, source: tera::Error },
    #[error("prompt templates failed to compile: {0}")]
    Compile(#[source] tera::Error),
}

/// A prompt template and the grammar version its output is parsed with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PromptContract {
    pub shape: SectionKind,
    pub template_name: &'static str,
    pub grammar_version: &'static str,
    template_source: &'static str,
}

impl PromptContract {
    pub fn for_shape(shape: SectionKind) -> Self {
        let (template_name, template_source) = match shape {
            SectionKind::Barriers => ("barriers", BARRIERS_TEMPLATE),
            SectionKind::Opportunities => ("opportunities", OPPORTUNITIES_TEMPLATE),
            SectionKind::Roadmap => ("roadmap", ROADMAP_TEMPLATE),
            SectionKind::Roi => ("roi", ROI_TEMPLATE),
        };
        Self { shape, template_name, grammar_version: grammar_version(shape), template_source }
    }

    /// Stable identifier for the deployed template/grammar pair.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.grammar_version.as_bytes());
        hasher.update(b"\n");
        hasher.update(PREAMBLE.as_bytes());
        hasher.update(self.template_source.as_bytes());
        hasher.finalize().to_hex()[..16].to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub shape: SectionKind,
    pub text: String,
    pub grammar_version: &'static str,
    pub fingerprint: String,
}

/// Everything a prompt is built from.
#[derive(Clone, Copy, Debug)]
pub struct PromptInputs<'a> {
    pub request: &'a AnalysisRequest,
    pub template: &'a IndustryTemplate,
    pub competitor: &'a CompetitorProfile,
}

#[derive(Serialize)]
struct ProfileAttribute {
    name: String,
    value: String,
}

pub struct PromptBuilder {
    tera: Tera,
}

impl PromptBuilder {
    pub fn new() -> Result<Self, PromptError> {
        let mut tera = Tera::default();
        let mut templates = vec![("preamble", PREAMBLE)];
        templates.extend(SectionKind::ALL.iter().map(|shape| {
            let contract = PromptContract::for_shape(*shape);
            (contract.template_name, contract.template_source)
        }));
        tera.add_raw_templates(templates).map_err(PromptError::Compile)?;
        Ok(Self { tera })
    }

    pub fn render(
        &self,
        shape: SectionKind,
        inputs: PromptInputs<'_>,
    ) -> Result<RenderedPrompt, PromptError> {
        let contract = PromptContract::for_shape(shape);
        let context = build_context(&contract, inputs);
        let text = self
            .tera
            .render(contract.template_name, &context)
            .map_err(|source| PromptError::Render { name: contract.template_name, source })?;

        Ok(RenderedPrompt {
            shape,
            text,
            grammar_version: contract.grammar_version,
            fingerprint: contract.fingerprint(),
        })
    }
}

fn build_context(contract: &PromptContract, inputs: PromptInputs<'_>) -> Context {
    let PromptInputs { request, template, competitor } = inputs;

    let profile = request
        .account_profile
        .iter()
        .map(|(name, value)| ProfileAttribute {
            name: name.clone(),
            value: match value {
                serde_json::Value::String(text) => text.clone(),
                other => other.to_string(),
            },
        })
        .collect::<Vec<_>>();
    let barrier_categories =
        template.barrier_categories.iter().map(BarrierCategory::as_str).collect::<Vec<_>>();

    let mut context = Context::new();
    context.insert("grammar_version", contract.grammar_version);
    context.insert("industry", template.industry.as_str());
    context.insert("industry_name", &template.display_name);
    context.insert("competitor", competitor);
    context.insert("profile", &profile);
    context.insert("depth", request.depth.as_str());
    context.insert("urgency", request.urgency.as_str());
    context.insert("max_rows", &request.depth.requested_rows());
    context.insert("barrier_categories", &barrier_categories);
    context.insert("strategies", &template.facilitation_strategies);
    context.insert("success_metrics", &template.success_metrics);
    context.insert("typical_timeline", &template.typical_switching_timeline);
    context.insert("phases", &template.timeline_phases);
    context
}

#[cfg(test)]
mod tests {
    use super::{PromptBuilder, PromptContract, PromptInputs};
    use crate::catalog::TemplateCatalog;
    use crate::domain::request::{AnalysisDepth, AnalysisRequest, CompetitorId, IndustryTag};
    use crate::domain::strategy::SectionKind;

    fn render(shape: SectionKind, request: &AnalysisRequest) -> String {
        let catalog = TemplateCatalog::builtin().expect("builtin catalog");
        let template = catalog.industry(&request.industry).expect("known industry");
        let competitor = catalog.competitor(&request.competitor);
        PromptBuilder::new()
            .expect("templates compile")
            .render(shape, PromptInputs { request, template, competitor: &competitor })
            .expect("prompt renders")
            .text
    }

    #[test]
    fn every_prompt_names_its_grammar_version() {
        let request = AnalysisRequest::new("saas", "incumbent").with_profile("size", "enterprise");
        for shape in SectionKind::ALL {
            let text = render(shape, &request);
            let contract = PromptContract::for_shape(shape);
            assert!(text.contains(contract.grammar_version), "{shape} prompt lacks its version");
            assert!(text.contains("- size: enterprise"));
        }
    }

    #[test]
    fn barrier_prompt_lists_template_categories_and_depth_rows() {
        let request =
            AnalysisRequest::new(IndustryTag::new("financial_services"), "incumbent_leader")
                .with_depth(AnalysisDepth::Strategic);
        let text = render(SectionKind::Barriers, &request);

        assert!(text.contains("regulatory"));
        assert!(text.contains("List up to 8 switching barriers"));
    }

    #[test]
    fn unknown_competitor_prompt_uses_default_profile() {
        let request = AnalysisRequest::new("saas", CompetitorId::new("Mystery Corp"));
        let text = render(SectionKind::Opportunities, &request);

        assert!(text.contains("Competitor type: unknown"));
        assert!(text.contains("unknown_vulnerabilities"));
    }

    #[test]
    fn fingerprints_differ_per_shape_and_are_stable() {
        let barriers = PromptContract::for_shape(SectionKind::Barriers).fingerprint();
        let roi = PromptContract::for_shape(SectionKind::Roi).fingerprint();

        assert_eq!(barriers, PromptContract::for_shape(SectionKind::Barriers).fingerprint());
        assert_ne!(barriers, roi);
        assert_eq!(barriers.len(), 16);
    }
}
