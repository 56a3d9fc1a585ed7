pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use repairdesk_core::config::{AppConfig, LoadOptions};

#[derive(Debug, Parser)]
#[command(
    name = "repairdesk",
    about = "RepairDesk work order intake CLI",
    long_about = "Apply migrations, inspect configuration, preview wizard steps, and run scripted work order intakes.",
    after_help = "Examples:\n  repairdesk migrate\n  repairdesk steps --brand Apple --subcategory Smartphone\n  repairdesk intake --file intake.json --dry-run"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Preview the wizard steps shown for a device classification")]
    Steps {
        #[arg(long, help = "Device brand, e.g. Apple or Samsung")]
        brand: Option<String>,
        #[arg(long, help = "Device subcategory, e.g. Smartphone or Tablet")]
        subcategory: Option<String>,
        #[arg(long, help = "Preview as if a complete catalog device was picked")]
        catalog: bool,
        #[arg(long, help = "Skip the settings store and use local configuration only")]
        offline: bool,
    },
    #[command(about = "Drive one intake wizard session from a JSON document and submit it")]
    Intake {
        #[arg(long, help = "Path to the intake JSON document")]
        file: PathBuf,
        #[arg(long, help = "Use in-memory storage instead of the database and upload directory")]
        dry_run: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let logging_config = AppConfig::load(LoadOptions::default())
        .map(|config| config.logging)
        .unwrap_or_else(|_| AppConfig::default().logging);
    logging::init(&logging_config);

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => commands::config::run(),
        Command::Steps { brand, subcategory, catalog, offline } => {
            commands::steps::run(commands::steps::StepsArgs { brand, subcategory, catalog, offline })
        }
        Command::Intake { file, dry_run } => commands::intake::run(&file, dry_run),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
