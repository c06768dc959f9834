pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use commands::turn::TurnArgs;

#[derive(Debug, Parser)]
#[command(
    name = "brickbot",
    about = "Brickbot operator CLI",
    long_about = "Inspect configuration, apply migrations, replay dialog turns, and list orders.",
    after_help = "Examples:\n  brickbot config\n  brickbot turn --reason DialogCodeHook \
                  --slot LegoModel=tank --dry-run\n  brickbot orders --limit 5"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Run one dialog turn through the responder and print the wire response")]
    Turn(TurnArgs),
    #[command(about = "List the most recent orders, newest first")]
    Orders {
        #[arg(long, default_value_t = 10, help = "Maximum number of orders to list")]
        limit: u32,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Turn(args) => commands::turn::run(args),
        Command::Orders { limit } => commands::orders::run(limit),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
