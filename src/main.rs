mod commands;
mod config;
mod eml;
mod event;
mod gcal;
mod llm;
mod oauth;
mod reconcile;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "schoolcal")]
#[command(about = "Turn school-bulletin emails into Google Calendar events")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an email and create the new events it mentions
    Process {
        /// Path to the .eml file
        #[arg(long)]
        input: PathBuf,
    },
    /// Parse an email and print the extracted events as CSV
    Parse {
        /// Path to the .eml file
        #[arg(long)]
        input: PathBuf,

        /// Write the CSV here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Create events from a previously parsed CSV
    Add {
        /// Path to the CSV file
        #[arg(long)]
        input: PathBuf,
    },
    /// List upcoming events
    List {
        /// Max number of events
        #[arg(long, default_value_t = 10)]
        max: usize,
    },
    /// Create a single calendar event
    Create {
        /// Event title
        #[arg(long)]
        summary: String,

        /// Start time (YYYY-MM-DD, YYYY-MM-DDTHH:MM, or RFC 3339)
        #[arg(long)]
        start: String,

        /// End time
        #[arg(long)]
        end: String,

        /// Event description
        #[arg(long)]
        description: Option<String>,

        /// Event location
        #[arg(long)]
        location: Option<String>,
    },
    /// Show one event's details
    Get {
        /// Event ID
        #[arg(long)]
        id: String,
    },
    /// Delete an event
    Delete {
        /// Event ID
        #[arg(long)]
        id: String,
    },
    /// Run the Google OAuth consent flow and store tokens
    Auth,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Process { input } => commands::process::run(input).await,
        Commands::Parse { input, output } => commands::parse::run(input, output).await,
        Commands::Add { input } => commands::add::run(input).await,
        Commands::List { max } => commands::list::run(max).await,
        Commands::Create {
            summary,
            start,
            end,
            description,
            location,
        } => commands::create::run(summary, start, end, description, location).await,
        Commands::Get { id } => commands::get::run(id).await,
        Commands::Delete { id } => commands::delete::run(id).await,
        Commands::Auth => commands::auth::run().await,
    }
}
