//! Industry templates and competitor profiles, loaded once per process.
//!
//! A catalog is immutable after construction. Reloading means building a new
//! catalog and handing it to a new orchestrator.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::request::{CompetitorId, IndustryTag};
use crate::domain::strategy::BarrierCategory;
use crate::domain::template::{
    default_success_metrics, CompetitorProfile, IndustryTemplate, TimelinePhase,
};
use crate::errors::AnalysisError;

const BUILTIN_INDUSTRIES: &[(&str, &str)] = &[
    ("saas", include_str!("../catalog/industries/saas.toml")),
    ("financial_services", include_str!("../catalog/industries/financial_services.toml")),
    ("healthcare", include_str!("../catalog/industries/healthcare.toml")),
    ("manufacturing", include_str!("../catalog/industries/manufacturing.toml")),
];

const BUILTIN_COMPETITORS: &[(&str, &str)] = &[
    ("incumbent", include_str!("../catalog/competitors/incumbent.toml")),
    ("incumbent_leader", include_str!("../catalog/competitors/incumbent_leader.toml")),
];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog directory `{path}`: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to parse catalog document `{path}`: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("catalog document `{path}` is invalid: {message}")]
    Invalid { path: PathBuf, message: String },
    #[error("catalog directory `{0}` contains no industry templates")]
    Empty(PathBuf),
    #[error("catalog tag `{tag}` is defined by both `{first}` and `{second}`")]
    Duplicate { tag: String, first: PathBuf, second: PathBuf },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct IndustryDocument {
    #[serde(default)]
    display_name: Option<String>,
    barrier_categories: Vec<BarrierCategory>,
    #[serde(default)]
    facilitation_strategies: Vec<String>,
    #[serde(default)]
    success_metrics: Option<Vec<String>>,
    #[serde(default)]
    typical_switching_timeline: Option<String>,
    #[serde(default)]
    timeline_phases: Vec<TimelinePhase>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CompetitorDocument {
    competitor_type: String,
    #[serde(default = "undefined_position")]
    market_position: String,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    weaknesses: Vec<String>,
    #[serde(default)]
    vulnerabilities: Vec<String>,
}

fn undefined_position() -> String {
    "undefined".to_string()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DocumentFormat {
    Toml,
    Json,
}

impl DocumentFormat {
    fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    fn decode<T: DeserializeOwned>(self, raw: &str, path: &Path) -> Result<T, CatalogError> {
        let parse_error =
            |message: String| CatalogError::Parse { path: path.to_path_buf(), message };
        match self {
            Self::Toml => toml::from_str(raw).map_err(|error| parse_error(error.to_string())),
            Self::Json => serde_json::from_str(raw).map_err(|error| parse_error(error.to_string())),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TemplateCatalog {
    industries: BTreeMap<IndustryTag, IndustryTemplate>,
    competitors: BTreeMap<CompetitorId, CompetitorProfile>,
}

impl TemplateCatalog {
    pub fn builtin() -> Result<Self, CatalogError> {
        let mut catalog = Self::default();
        for (stem, raw) in BUILTIN_INDUSTRIES {
            let path = PathBuf::from(format!("builtin/industries/{stem}.toml"));
            let document = DocumentFormat::Toml.decode(raw, &path)?;
            catalog.insert_industry(IndustryTag::new(stem), document, &path)?;
        }
        for (stem, raw) in BUILTIN_COMPETITORS {
            let path = PathBuf::from(format!("builtin/competitors/{stem}.toml"));
            let document = DocumentFormat::Toml.decode(raw, &path)?;
            catalog.insert_competitor(CompetitorId::new(stem), document);
        }
        Ok(catalog)
    }

    /// Reads `industries/` and `competitors/` below `root`. File stems are the
    /// tags; two files whose stems normalize to the same tag are rejected.
    /// Built-in documents are not mixed in.
    pub fn load_dir(root: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let root = root.as_ref();
        let mut catalog = Self::default();

        let mut industry_sources = BTreeMap::new();
        for path in document_paths(&root.join("industries"))? {
            let Some(format) = DocumentFormat::from_path(&path) else { continue };
            let industry = IndustryTag::new(file_stem(&path));
            claim_tag(&mut industry_sources, industry.as_str(), &path)?;
            let raw = read_document(&path)?;
            let document = format.decode(&raw, &path)?;
            catalog.insert_industry(industry, document, &path)?;
        }

        let competitors_dir = root.join("competitors");
        if competitors_dir.is_dir() {
            let mut competitor_sources = BTreeMap::new();
            for path in document_paths(&competitors_dir)? {
                let Some(format) = DocumentFormat::from_path(&path) else { continue };
                let competitor = CompetitorId::new(file_stem(&path));
                claim_tag(&mut competitor_sources, competitor.as_str(), &path)?;
                let raw = read_document(&path)?;
                let document = format.decode(&raw, &path)?;
                catalog.insert_competitor(competitor, document);
            }
        }

        if catalog.industries.is_empty() {
            return Err(CatalogError::Empty(root.to_path_buf()));
        }
        Ok(catalog)
    }

    pub fn industry(&self, tag: &IndustryTag) -> Result<&IndustryTemplate, AnalysisError> {
        self.industries.get(tag).ok_or_else(|| AnalysisError::UnknownIndustry(tag.clone()))
    }

    /// Unknown competitors resolve to a default profile rather than failing.
    pub fn competitor(&self, id: &CompetitorId) -> CompetitorProfile {
        self.competitors.get(id).cloned().unwrap_or_else(|| CompetitorProfile::unknown(id.clone()))
    }

    pub fn industries(&self) -> impl Iterator<Item = &IndustryTemplate> {
        self.industries.values()
    }

    pub fn competitors(&self) -> impl Iterator<Item = &CompetitorProfile> {
        self.competitors.values()
    }

    fn insert_industry(
        &mut self,
        industry: IndustryTag,
        document: IndustryDocument,
        path: &Path,
    ) -> Result<(), CatalogError> {
        if document.barrier_categories.is_empty() {
            return Err(CatalogError::Invalid {
                path: path.to_path_buf(),
                message: "barrier_categories must list at least one category".to_string(),
            });
        }

        let template = IndustryTemplate {
            display_name: document.display_name.unwrap_or_else(|| industry.to_string()),
            industry: industry.clone(),
            barrier_categories: document.barrier_categories,
            facilitation_strategies: document.facilitation_strategies,
            success_metrics: document
                .success_metrics
                .filter(|metrics| !metrics.is_empty())
                .unwrap_or_else(default_success_metrics),
            typical_switching_timeline: document.typical_switching_timeline,
            timeline_phases: document.timeline_phases,
        };
        self.industries.insert(industry, template);
        Ok(())
    }

    fn insert_competitor(&mut self, competitor: CompetitorId, document: CompetitorDocument) {
        let profile = CompetitorProfile {
            competitor: competitor.clone(),
            competitor_type: document.competitor_type,
            market_position: document.market_position,
            strengths: document.strengths,
            weaknesses: document.weaknesses,
            vulnerabilities: document.vulnerabilities,
        };
        self.competitors.insert(competitor, profile);
    }
}

fn document_paths(dir: &Path) -> Result<Vec<PathBuf>, CatalogError> {
    let io_error = |source| CatalogError::Io { path: dir.to_path_buf(), source };
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn claim_tag(
    sources: &mut BTreeMap<String, PathBuf>,
    tag: &str,
    path: &Path,
) -> Result<(), CatalogError> {
    if let Some(first) = sources.get(tag) {
        return Err(CatalogError::Duplicate {
            tag: tag.to_string(),
            first: first.clone(),
            second: path.to_path_buf(),
        });
    }
    sources.insert(tag.to_string(), path.to_path_buf());
    Ok(())
}

fn read_document(path: &Path) -> Result<String, CatalogError> {
    fs::read_to_string(path).map_err(|source| CatalogError::Io { path: path.to_path_buf(), source })
}

fn file_stem(path: &Path) -> String {
    path.file_stem().map(|stem| stem.to_string_lossy().into_owned()).unwrap_or_default()
}
