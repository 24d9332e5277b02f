//! Validating parser for provider output.
//!
//! Providers are asked to answer in pipe-delimited table rows. Each shape has a
//! versioned row grammar that is deployed together with the prompt template asking
//! for it (see [`crate::prompts`]). Rows that match the grammar become typed records;
//! rows that look like table rows but do not match are dropped and counted, never
//! repaired into range.

pub mod barrier;
pub mod money;
pub mod opportunity;
pub mod roadmap;
pub mod roi;

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::domain::strategy::{
    BarrierRecord, OpportunityRecord, RoadmapRecord, RoiRecord, SectionKind,
};

pub use barrier::{parse_barriers, render_barrier_rows};
pub use opportunity::{parse_opportunities, render_opportunity_rows};
pub use roadmap::{parse_roadmap, render_roadmap_rows};
pub use roi::{parse_roi, render_roi_rows};

/// Shape the parser expects for a raw response.
pub type ShapeTag = SectionKind;

/// Default share of malformed rows above which a response should be re-prompted.
pub const DEFAULT_MAX_MALFORMED_RATIO: f64 = 0.5;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no structured {shape} rows found ({malformed_rows} malformed rows dropped)")]
    NoStructuredContent { shape: ShapeTag, malformed_rows: usize },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParseOutcome<T> {
    pub record: T,
    pub matched_rows: usize,
    pub malformed_rows: usize,
}

impl<T> ParseOutcome<T> {
    pub fn malformed_ratio(&self) -> f64 {
        let total = self.matched_rows + self.malformed_rows;
        if total == 0 {
            return 0.0;
        }
        self.malformed_rows as f64 / total as f64
    }

    /// True when the response is usable but noisy enough to justify a re-prompt.
    pub fn exceeds_malformed_ratio(&self, threshold: f64) -> bool {
        self.malformed_ratio() > threshold
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ParseOutcome<U> {
        ParseOutcome {
            record: f(self.record),
            matched_rows: self.matched_rows,
            malformed_rows: self.malformed_rows,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "shape", content = "record", rename_all = "snake_case")]
pub enum StructuredRecord {
    Barriers(Vec<BarrierRecord>),
    Opportunities(Vec<OpportunityRecord>),
    Roadmap(RoadmapRecord),
    Roi(RoiRecord),
}

/// Parses `raw_text` with the grammar for `shape`.
pub fn parse(
    raw_text: &str,
    shape: ShapeTag,
) -> Result<ParseOutcome<StructuredRecord>, ParseError> {
    match shape {
        SectionKind::Barriers => {
            parse_barriers(raw_text).map(|o| o.map(StructuredRecord::Barriers))
        }
        SectionKind::Opportunities => {
            parse_opportunities(raw_text).map(|o| o.map(StructuredRecord::Opportunities))
        }
        SectionKind::Roadmap => parse_roadmap(raw_text).map(|o| o.map(StructuredRecord::Roadmap)),
        SectionKind::Roi => parse_roi(raw_text).map(|o| o.map(StructuredRecord::Roi)),
    }
}

/// Grammar version string for a shape. Prompt templates embed the same value.
pub fn grammar_version(shape: ShapeTag) -> &'static str {
    match shape {
        SectionKind::Barriers => barrier::GRAMMAR_VERSION,
        SectionKind::Opportunities => opportunity::GRAMMAR_VERSION,
        SectionKind::Roadmap => roadmap::GRAMMAR_VERSION,
        SectionKind::Roi => roi::GRAMMAR_VERSION,
    }
}

/// Splits `raw_text` into the cell lists of its table rows.
///
/// Lines without a pipe are prose and ignored. Markdown separator rows and header
/// rows whose first cell equals `header` are skipped without being counted.
pub(crate) fn table_rows<'a>(
    raw_text: &'a str,
    header: &'a str,
) -> impl Iterator<Item = Vec<&'a str>> + 'a {
    raw_text
        .lines()
        .map(str::trim)
        .filter(|line| line.contains('|'))
        .map(split_cells)
        .filter(|cells| !cells.is_empty())
        .filter(|cells| !is_separator_row(cells))
        .filter(move |cells| !cells[0].eq_ignore_ascii_case(header))
}

fn split_cells(line: &str) -> Vec<&str> {
    let inner = line.strip_prefix('|').unwrap_or(line);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(clean_cell).collect()
}

fn clean_cell(cell: &str) -> &str {
    cell.trim().trim_matches(|ch| ch == '*' || ch == '`').trim()
}

fn is_separator_row(cells: &[&str]) -> bool {
    cells.iter().all(|cell| separator_pattern().is_match(cell))
}

fn separator_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^:?-{3,}:?$").expect("separator pattern is valid"))
}

fn severity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{1,3})(?:\s*/\s*10)?$").expect("severity pattern is valid")
    })
}

/// Parses `7` or `7/10`. Out-of-scale values are rejected, not clamped.
pub(crate) fn parse_severity(cell: &str) -> Option<crate::domain::strategy::Severity> {
    let captures = severity_pattern().captures(cell)?;
    let value = captures.get(1)?.as_str().parse::<u8>().ok()?;
    crate::domain::strategy::Severity::new(value)
}

/// Replaces pipes so rendered cells cannot split into extra columns.
pub(crate) fn render_cell(value: &str) -> String {
    value.replace('|', "/").replace('\n', " ").trim().to_string()
}

pub(crate) fn non_empty(cell: &str) -> Option<String> {
    (!cell.is_empty()).then(|| cell.to_string())
}
