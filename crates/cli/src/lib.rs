pub mod commands;

use aquaroute_core::FlowKind;
use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "aquaroute",
    about = "Aquaroute operator CLI",
    long_about = "Inspect configuration, check collaborator readiness, and validate or dry-run the decision rule sets offline.",
    after_help = "Examples:\n  aquaroute doctor --json\n  aquaroute rules check\n  aquaroute rules evaluate --process stop-delivery --facts '{\"motivo\":\"vacaciones\",\"scoring\":4}'"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, rule sets, policy manuals, and collaborator credentials")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Validate or dry-run the decision rule sets")]
    Rules {
        #[command(subcommand)]
        action: RulesCommand,
    },
}

#[derive(Debug, Subcommand)]
enum RulesCommand {
    #[command(about = "Load and validate both rule sets, reporting rule and field counts")]
    Check,
    #[command(about = "Evaluate a fact context offline and print the missing field or decision")]
    Evaluate {
        #[arg(long, help = "Process to evaluate: stop-delivery | urgent-notice")]
        process: FlowKind,
        #[arg(long, help = "Fact context as a JSON object")]
        facts: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Rules { action: RulesCommand::Check } => commands::rules::check(),
        Command::Rules { action: RulesCommand::Evaluate { process, facts } } => {
            commands::rules::evaluate(process, &facts)
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
