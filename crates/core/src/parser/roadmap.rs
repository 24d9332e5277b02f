use crate::domain::strategy::{RoadmapPhase, RoadmapRecord, SectionKind};

use super::{non_empty, render_cell, table_rows, ParseError, ParseOutcome};

pub const GRAMMAR_VERSION: &str = "roadmap/v1";
pub const HEADER: &str = "kind";

/// `PHASE | name | duration | milestone; milestone; ...` rows plus at most one
/// `TOTAL | timeline` row. Phases keep the order the provider listed them in.
pub fn parse_roadmap(raw_text: &str) -> Result<ParseOutcome<RoadmapRecord>, ParseError> {
    let mut record = RoadmapRecord::default();
    let mut matched_rows = 0;
    let mut malformed_rows = 0;

    for cells in table_rows(raw_text, HEADER) {
        let accepted = match cells[0].to_ascii_uppercase().as_str() {
            "PHASE" => parse_phase(&cells).map(|phase| record.phases.push(phase)).is_some(),
            "TOTAL" if record.total_timeline.is_none() && cells.len() == 2 => {
                record.total_timeline = non_empty(cells[1]);
                record.total_timeline.is_some()
            }
            _ => false,
        };

        if accepted {
            matched_rows += 1;
        } else {
            malformed_rows += 1;
        }
    }

    // A timeline without phases carries nothing to plan against.
    if record.phases.is_empty() {
        return Err(ParseError::NoStructuredContent { shape: SectionKind::Roadmap, malformed_rows });
    }

    Ok(ParseOutcome { record, matched_rows, malformed_rows })
}

fn parse_phase(cells: &[&str]) -> Option<RoadmapPhase> {
    if !(3..=4).contains(&cells.len()) {
        return None;
    }

    let milestones = cells
        .get(3)
        .map(|cell| {
            cell.split(';')
                .map(str::trim)
                .filter(|milestone| !milestone.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(RoadmapPhase { name: non_empty(cells[1])?, duration: non_empty(cells[2])?, milestones })
}

pub fn render_roadmap_rows(record: &RoadmapRecord) -> String {
    let mut lines = Vec::with_capacity(record.phases.len() + 1);
    if let Some(total) = &record.total_timeline {
        lines.push(format!("| TOTAL | {} |", render_cell(total)));
    }
    for phase in &record.phases {
        let milestones = phase
            .milestones
            .iter()
            .map(|milestone| render_cell(&milestone.replace(';', ",")))
            .collect::<Vec<_>>()
            .join("; ");
        lines.push(format!(
            "| PHASE | {} | {} | {} |",
            render_cell(&phase.name),
            render_cell(&phase.duration),
            milestones
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::{parse_roadmap, render_roadmap_rows};
    use crate::domain::strategy::SectionKind;
    use crate::parser::ParseError;

    const RESPONSE: &str = "\
| Kind | Name | Duration | Milestones |
|---|---|---|---|
| TOTAL | 6-9 months |
| PHASE | Foundation | 6 weeks | Stakeholder alignment; Architecture assessment |
| PHASE | Parallel operation | 3 months | Data migration validated; Users trained |
| PHASE | Full migration | 2 months | Cutover complete |
| NOTE | this row is not part of the grammar |";

    #[test]
    fn parses_phases_in_order_with_milestones() {
        let outcome = parse_roadmap(RESPONSE).expect("roadmap should parse");

        assert_eq!(outcome.record.total_timeline.as_deref(), Some("6-9 months"));
        assert_eq!(outcome.record.phases.len(), 3);
        assert_eq!(outcome.record.phases[0].name, "Foundation");
        assert_eq!(
            outcome.record.phases[1].milestones,
            vec!["Data migration validated".to_string(), "Users trained".to_string()]
        );
        assert_eq!(outcome.matched_rows, 4);
        assert_eq!(outcome.malformed_rows, 1);
    }

    #[test]
    fn phase_without_milestones_column_is_accepted() {
        let outcome = parse_roadmap("PHASE | Discovery | 2 weeks").expect("three cells suffice");
        assert!(outcome.record.phases[0].milestones.is_empty());
    }

    #[test]
    fn total_without_phases_is_not_structured_content() {
        let error = parse_roadmap("TOTAL | 12 months").expect_err("no phases");
        assert_eq!(
            error,
            ParseError::NoStructuredContent { shape: SectionKind::Roadmap, malformed_rows: 0 }
        );
    }

    #[test]
    fn duplicate_total_rows_are_counted_as_malformed() {
        let raw = "TOTAL | 6 months\nTOTAL | 9 months\nPHASE | Pilot | 1 month | Pilot signed off";
        let outcome = parse_roadmap(raw).expect("roadmap should parse");

        assert_eq!(outcome.record.total_timeline.as_deref(), Some("6 months"));
        assert_eq!(outcome.malformed_rows, 1);
    }

    #[test]
    fn rendered_rows_parse_back_to_the_same_record() {
        let first = parse_roadmap(RESPONSE).expect("parse").record;
        let second = parse_roadmap(&render_roadmap_rows(&first)).expect("reparse").record;

        assert_eq!(first, second);
    }
}
