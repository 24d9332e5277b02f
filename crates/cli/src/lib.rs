pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::commands::analyze::AnalyzeArgs;

#[derive(Debug, Parser)]
#[command(
    name = "switchover",
    about = "Switchover operator CLI",
    long_about = "Run switching-strategy analyses and operate the Switchover runtime: \
                  templates, migrations, config inspection and readiness checks.",
    after_help = "Examples:\n  switchover analyze --industry saas --competitor incumbent \
                  --profile seats=250\n  switchover doctor --json\n  switchover config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run one switching analysis and print the strategy as JSON")]
    Analyze {
        #[arg(long, help = "Industry tag, e.g. saas or financial_services")]
        industry: String,
        #[arg(long, help = "Competitor identifier, e.g. incumbent_leader")]
        competitor: String,
        #[arg(long = "profile", value_name = "KEY=VALUE", help = "Account profile attribute")]
        profile: Vec<String>,
        #[arg(long, default_value = "comprehensive", help = "basic|comprehensive|strategic")]
        depth: String,
        #[arg(long, default_value = "standard", help = "standard|accelerated|urgent")]
        urgency: String,
        #[arg(long, help = "Skip the database; log attempt metrics instead of storing them")]
        no_store: bool,
    },
    #[command(about = "List industry templates and competitor profiles")]
    Templates {
        #[arg(long, help = "Catalog directory with industries/ and competitors/")]
        dir: Option<PathBuf>,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, provider chain, templates and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Analyze { industry, competitor, profile, depth, urgency, no_store } => {
            commands::analyze::run(AnalyzeArgs {
                industry,
                competitor,
                profile,
                depth,
                urgency,
                no_store,
            })
        }
        Command::Templates { dir } => commands::templates::run(dir.as_deref()),
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
