use crate::domain::strategy::{BarrierCategory, BarrierRecord, SectionKind};

use super::{non_empty, parse_severity, render_cell, table_rows, ParseError, ParseOutcome};

pub const GRAMMAR_VERSION: &str = "barrier/v1";
pub const HEADER: &str = "category";
const COLUMNS: usize = 6;

/// `category | severity | description | mitigation | timeline | investment`
pub fn parse_barriers(raw_text: &str) -> Result<ParseOutcome<Vec<BarrierRecord>>, ParseError> {
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
            shape: SectionKind::Barriers,
            malformed_rows,
        });
    }

    Ok(ParseOutcome { matched_rows: records.len(), record: records, malformed_rows })
}

fn parse_row(cells: &[&str]) -> Option<BarrierRecord> {
    if cells.len() != COLUMNS {
        return None;
    }

    Some(BarrierRecord {
        category: cells[0].parse::<BarrierCategory>().ok()?,
        severity: parse_severity(cells[1])?,
        description: non_empty(cells[2])?,
        mitigation: non_empty(cells[3])?,
        timeline: non_empty(cells[4])?,
        investment: non_empty(cells[5])?,
    })
}

pub fn render_barrier_rows(records: &[BarrierRecord]) -> String {
    records
        .iter()
        .map(|record| {
            format!(
                "| {} | {} | {} | {} | {} | {} |",
                record.category,
                record.severity,
                render_cell(&record.description),
                render_cell(&record.mitigation),
                render_cell(&record.timeline),
                render_cell(&record.investment),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::{parse_barriers, render_barrier_rows};
    use crate::domain::strategy::{BarrierCategory, SectionKind};
    use crate::parser::ParseError;

    const RESPONSE: &str = "\
Switching barriers for the account:

| Category | Severity | Description | Mitigation | Timeline | Investment |
|----------|----------|-------------|------------|----------|------------|
| technical | 8 | Custom integrations with the billing core | Staged API adapter rollout | 2-4 months | $75K-$150K |
| Economic | 6 | Early-termination penalties | Contract buyout credit | 1-2 months | $25K-$75K |
| organizational | 4 | Admin team trained on incumbent UI | Role-based onboarding program | 2-4 weeks | $10K-$25K |

Let me know if you need more detail.";

    #[test]
    fn parses_markdown_table_rows() {
        let outcome = parse_barriers(RESPONSE).expect("barriers should parse");

        assert_eq!(outcome.matched_rows, 3);
        assert_eq!(outcome.malformed_rows, 0);
        assert_eq!(outcome.record[0].category, BarrierCategory::Technical);
        assert_eq!(outcome.record[0].severity.value(), 8);
        assert_eq!(outcome.record[1].category, BarrierCategory::Economic);
        assert_eq!(outcome.record[2].investment, "$10K-$25K");
    }

    #[test]
    fn out_of_scale_severity_and_unknown_category_are_dropped_and_counted() {
        let raw = "\
technical | 11 | Too severe | n/a | 1 month | $10K
unknown | 5 | Not a category | n/a | 1 month | $10K
regulatory | 7 | Data residency audit | Regional hosting | 3 months | $50K-$80K";

        let outcome = parse_barriers(raw).expect("one valid row remains");

        assert_eq!(outcome.record.len(), 1);
        assert_eq!(outcome.record[0].category, BarrierCategory::Regulatory);
        assert_eq!(outcome.malformed_rows, 2);
        assert!(outcome.record.iter().all(|record| record.severity.value() <= 10));
    }

    #[test]
    fn rows_with_wrong_column_count_or_empty_cells_are_malformed() {
        let raw = "\
technical | 5 | Missing columns
economic | 5 |  | Discount | 1 month | $5K
economic | 3 | Budget cycle timing | Deferred billing | 1 month | $5K";

        let outcome = parse_barriers(raw).expect("one valid row remains");

        assert_eq!(outcome.record.len(), 1);
        assert_eq!(outcome.malformed_rows, 2);
    }

    #[test]
    fn zero_matching_rows_is_no_structured_content() {
        let error = parse_barriers("| technical | 99 | x | y | z | w |\nplain prose")
            .expect_err("nothing valid");

        assert_eq!(
            error,
            ParseError::NoStructuredContent { shape: SectionKind::Barriers, malformed_rows: 1 }
        );
    }

    #[test]
    fn rendered_rows_parse_back_to_the_same_records() {
        let first = parse_barriers(RESPONSE).expect("barriers should parse").record;
        let second = parse_barriers(&render_barrier_rows(&first))
            .expect("rendered rows should parse")
            .record;

        assert_eq!(first, second);
    }
}
