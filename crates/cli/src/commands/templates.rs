use std::path::Path;

use switchover_core::catalog::TemplateCatalog;

use crate::commands::CommandResult;

/// Lists the catalog at `dir`, or the built-in catalog when no directory is given.
pub fn run(dir: Option<&Path>) -> CommandResult {
    let (catalog, source) = match dir {
        Some(dir) => (TemplateCatalog::load_dir(dir), dir.display().to_string()),
        None => (TemplateCatalog::builtin(), "built-in".to_string()),
    };

    match catalog {
        Ok(catalog) => CommandResult { exit_code: 0, output: render(&catalog, &source) },
        Err(error) => CommandResult::failure("templates", "catalog_load", error.to_string(), 2),
    }
}

fn render(catalog: &TemplateCatalog, source: &str) -> String {
    let mut lines = vec![format!("template catalog ({source}):"), "industries:".to_string()];

    for template in catalog.industries() {
        let categories: Vec<&str> =
            template.barrier_categories.iter().map(|category| category.as_str()).collect();
        lines.push(format!(
            "- {} ({}): barriers [{}], timeline {}, {} phases",
            template.industry,
            template.display_name,
            categories.join(", "),
            template.typical_switching_timeline.as_deref().unwrap_or("<unset>"),
            template.timeline_phases.len()
        ));
    }

    lines.push("competitors:".to_string());
    let mut any_competitor = false;
    for profile in catalog.competitors() {
        any_competitor = true;
        lines.push(format!(
            "- {} ({}, {}): {} vulnerabilities",
            profile.competitor,
            profile.competitor_type,
            profile.market_position,
            profile.vulnerabilities.len()
        ));
    }
    if !any_competitor {
        lines.push("- <none>; unknown competitors use the default profile".to_string());
    }

    lines.join("\n")
}
