pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "garcon",
    about = "Garcon operator CLI",
    long_about = "Inspect configuration, check readiness, and replay conversations through the \
                  group-order dialogue engine without touching Slack.",
    after_help = "Examples:\n  garcon doctor --json\n  garcon config\n  garcon replay lunch.txt"
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
    #[command(about = "Validate config, Slack token readiness, and integration wiring")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run a scripted transcript through the dialogue engine offline")]
    Replay {
        #[arg(help = "Transcript of `!bot`/`!user`/`!channel` directives and `<author>: <text>`")]
        script: PathBuf,
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Replay { script, json } => commands::replay::run(&script, json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
