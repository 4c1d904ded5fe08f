pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;

use crate::commands::{match_loads::MatchArgs, negotiate::NegotiateArgs, TranscriptSource};

#[derive(Debug, Parser)]
#[command(
    name = "freightdesk",
    about = "FreightDesk operator CLI",
    long_about = "Operate the FreightDesk carrier-sales desk: config inspection, migrations, sample data, smoke checks, and offline runs of the matching, negotiation, extraction and classification engines.",
    after_help = "Examples:\n  freightdesk smoke\n  freightdesk match --origin \"Dallas, TX\" --equipment flatbed\n  freightdesk negotiate LD001 2000 2200 2300\n  freightdesk classify --transcript \"Deal, book it.\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct TranscriptArgs {
    #[arg(long, help = "Transcript text", conflicts_with = "file", required_unless_present = "file")]
    transcript: Option<String>,
    #[arg(long, help = "Read the transcript from a file")]
    file: Option<PathBuf>,
}

impl From<TranscriptArgs> for TranscriptSource {
    fn from(args: TranscriptArgs) -> Self {
        Self { text: args.transcript, file: args.file }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Insert the eight sample calls into the call log")]
    Seed,
    #[command(about = "Delete every call record from the call log")]
    Clear,
    #[command(about = "Run end-to-end readiness checks with per-check timing details")]
    Smoke,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(name = "match", about = "Rank catalog loads against search criteria")]
    Match {
        #[arg(long)]
        origin: Option<String>,
        #[arg(long)]
        destination: Option<String>,
        #[arg(long = "equipment")]
        equipment_type: Option<String>,
        #[arg(long, help = "Pickup day as YYYY-MM-DD")]
        pickup_date: Option<NaiveDate>,
        #[arg(long)]
        limit: Option<usize>,
    },
    #[command(about = "Play carrier offers against a load, one round per offer")]
    Negotiate {
        load_id: String,
        #[arg(required = true)]
        offers: Vec<Decimal>,
    },
    #[command(about = "Pull structured call fields out of a transcript")]
    Extract {
        #[command(flatten)]
        transcript: TranscriptArgs,
    },
    #[command(about = "Classify a transcript's outcome and sentiment")]
    Classify {
        #[command(flatten)]
        transcript: TranscriptArgs,
        #[arg(long, help = "Outcome reported by the voice agent")]
        outcome: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Clear => commands::clear::run(),
        Command::Smoke => commands::smoke::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Match { origin, destination, equipment_type, pickup_date, limit } => {
            commands::match_loads::run(MatchArgs {
                origin,
                destination,
                equipment_type,
                pickup_date,
                limit,
            })
        }
        Command::Negotiate { load_id, offers } => {
            commands::negotiate::run(NegotiateArgs { load_id, offers })
        }
        Command::Extract { transcript } => commands::extract::run(transcript.into()),
        Command::Classify { transcript, outcome } => {
            commands::classify::run(transcript.into(), outcome)
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
