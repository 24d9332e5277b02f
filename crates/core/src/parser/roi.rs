use std::sync::OnceLock;

use regex::Regex;

use crate::domain::strategy::{RoiRange, RoiRecord, SectionKind};

use super::money::parse_money_range;
use super::{non_empty, render_cell, table_rows, ParseError, ParseOutcome};

pub const GRAMMAR_VERSION: &str = "roi/v1";
pub const HEADER: &str = "kind";

fn months_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(\d{1,3})\s*(?:months?|mo)?$").expect("months pattern is valid")
    })
}

fn percent_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d{1,5})\s*%?$").expect("percent pattern is valid"))
}

/// Rows:
/// `COST | label | range`, `BENEFIT | label | range`, `BREAK_EVEN | months`,
/// `ROI | percent`.
///
/// A record needs a break-even period and at least one cost or benefit range.
pub fn parse_roi(raw_text: &str) -> Result<ParseOutcome<RoiRecord>, ParseError> {
    let mut record = RoiRecord::default();
    let mut matched_rows = 0;
    let mut malformed_rows = 0;

    for cells in table_rows(raw_text, HEADER) {
        let keyword = cells[0].to_ascii_uppercase().replace([' ', '-'], "_");
        let accepted = match (keyword.as_str(), cells.len()) {
            ("COST", 3) => parse_range(&cells).map(|range| record.costs.push(range)).is_some(),
            ("BENEFIT", 3) => {
                parse_range(&cells).map(|range| record.benefits.push(range)).is_some()
            }
            ("BREAK_EVEN", 2) if record.break_even_months.is_none() => {
                record.break_even_months = parse_months(cells[1]);
                record.break_even_months.is_some()
            }
            ("ROI", 2) if record.roi_percentage.is_none() => {
                record.roi_percentage = parse_percent(cells[1]);
                record.roi_percentage.is_some()
            }
            _ => false,
        };

        if accepted {
            matched_rows += 1;
        } else {
            malformed_rows += 1;
        }
    }

    let has_ranges = !record.costs.is_empty() || !record.benefits.is_empty();
    if record.break_even_months.is_none() || !has_ranges {
        return Err(ParseError::NoStructuredContent { shape: SectionKind::Roi, malformed_rows });
    }

    Ok(ParseOutcome { record, matched_rows, malformed_rows })
}

fn parse_range(cells: &[&str]) -> Option<RoiRange> {
    let label = non_empty(cells[1])?;
    let text = non_empty(cells[2])?;
    let (low, high) = parse_money_range(&text)?;
    Some(RoiRange { label, low, high, text })
}

fn parse_months(cell: &str) -> Option<u32> {
    let captures = months_pattern().captures(cell)?;
    captures.get(1)?.as_str().parse::<u32>().ok().filter(|months| *months > 0)
}

fn parse_percent(cell: &str) -> Option<u32> {
    let captures = percent_pattern().captures(cell)?;
    captures.get(1)?.as_str().parse::<u32>().ok()
}

pub fn render_roi_rows(record: &RoiRecord) -> String {
    let mut lines = Vec::new();
    for cost in &record.costs {
        lines.push(format!(
            "| COST | {} | {} |",
            render_cell(&cost.label),
            render_cell(&cost.text)
        ));
    }
    for benefit in &record.benefits {
        lines.push(format!(
            "| BENEFIT | {} | {} |",
            render_cell(&benefit.label),
            render_cell(&benefit.text)
        ));
    }
    if let Some(months) = record.break_even_months {
        lines.push(format!("| BREAK_EVEN | {months} months |"));
    }
    if let Some(percentage) = record.roi_percentage {
        lines.push(format!("| ROI | {percentage}% |"));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{parse_roi, render_roi_rows};
    use crate::domain::strategy::SectionKind;
    use crate::parser::ParseError;

    const RESPONSE: &str = "\
| Kind | Label | Value |
|---|---|---|
| COST | Implementation services | $75K-$200K |
| COST | Data migration | $30K-$100K |
| BENEFIT | Operational savings | $300K annually |
| BENEFIT | Efficiency gains | 40% efficiency improvement |
| BREAK_EVEN | 18 months |
| ROI | 275% |";

    #[test]
    fn parses_ranges_break_even_and_roi() {
        let outcome = parse_roi(RESPONSE).expect("roi should parse");

        assert_eq!(outcome.record.break_even_months, Some(18));
        assert_eq!(outcome.record.roi_percentage, Some(275));
        assert_eq!(outcome.record.costs.len(), 2);
        assert_eq!(outcome.record.costs[0].low, Decimal::from(75_000));
        assert_eq!(outcome.record.costs[0].high, Decimal::from(200_000));
        assert_eq!(outcome.record.benefits.len(), 1);
        assert_eq!(outcome.malformed_rows, 1, "percent-only benefit has no money range");
        assert_eq!(outcome.record.total_cost_high(), Decimal::from(300_000));
    }

    #[test]
    fn missing_break_even_is_not_structured_content() {
        let error = parse_roi("COST | Licensing | $50K-$150K").expect_err("no break-even");
        assert_eq!(
            error,
            ParseError::NoStructuredContent { shape: SectionKind::Roi, malformed_rows: 0 }
        );
    }

    #[test]
    fn break_even_accepts_spaced_keyword() {
        let outcome =
            parse_roi("BREAK EVEN | 12\nCOST | Licensing | $50K").expect("roi should parse");
        assert_eq!(outcome.record.break_even_months, Some(12));
    }

    #[test]
    fn rendered_rows_parse_back_to_the_same_record() {
        let first = parse_roi(RESPONSE).expect("parse").record;
        let second = parse_roi(&render_roi_rows(&first)).expect("reparse").record;

        assert_eq!(first, second);
    }
}
