use crate::domain::strategy::{OpportunityRecord, SectionKind};

use super::{non_empty, parse_severity, render_cell, table_rows, ParseError, ParseOutcome};

pub const GRAMMAR_VERSION: &str = "opportunity/v1";
pub const HEADER: &str = "vulnerability";
const COLUMNS: usize = 5;

/// `vulnerability | severity | description | exploitation strategy | timing`
///
/// Records come back ranked by success probability, highest first; ties keep the
/// provider's order.
pub fn parse_opportunities(
    raw_text: &str,
) -> Result<ParseOutcome<Vec<OpportunityRecord>>, ParseError> {
    let mut records = Vec::new();
    let mut malformed_rows = 0;

    for cells in table_rows(raw_text, HEADER) {
        match parse_row(&cells) {
            Some(record) => records.push(record),
            None => malformed_rows += 1,
        }
    }

    if records.is_empty() {
        return Err(ParseError::NoStructuredContent {
            shape: SectionKind::Opportunities,
            malformed_rows,
        });
    }

    records.sort_by(|a, b| b.success_probability_pct.cmp(&a.success_probability_pct));
    Ok(ParseOutcome { matched_rows: records.len(), record: records, malformed_rows })
}

fn parse_row(cells: &[&str]) -> Option<OpportunityRecord> {
    if cells.len() != COLUMNS {
        return None;
    }

    Some(OpportunityRecord::new(
        non_empty(cells[0])?,
        parse_severity(cells[1])?,
        non_empty(cells[2])?,
        non_empty(cells[3])?,
        non_empty(cells[4])?,
    ))
}

pub fn render_opportunity_rows(records: &[OpportunityRecord]) -> String {
    records
        .iter()
        .map(|record| {
            format!(
                "| {} | {} | {} | {} | {} |",
                render_cell(&record.vulnerability),
                record.severity,
                render_cell(&record.description),
                render_cell(&record.exploitation_strategy),
                render_cell(&record.recommended_timing),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
