use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

#[derive(Parser)]
#[command(name = "transcript-desk")]
#[command(about = "Transcript request intake, numbering and approval notifications")]
#[command(long_about = "transcript-desk replays the events of the transcript request forms against a \
                       workbook file: it numbers new requests, tracks the approval stages and queues \
                       the notification for each completed step. Start with 'transcript-desk setup'.")]
pub struct Cli {
    /// Configuration file (defaults to transcript-desk.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Workbook file, overriding the configured path
    #[arg(long, global = true)]
    pub workbook: Option<PathBuf>,

    /// Outbox file that receives queued notifications
    #[arg(long, global = true, default_value = ".transcript-desk/outbox.jsonl")]
    pub outbox: PathBuf,

    /// Print notifications instead of queueing them
    #[arg(long, global = true, conflicts_with = "outbox")]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the workbook if needed and add missing columns
    Setup,
    /// Process a new request form submission
    Submit {
        /// Row of the requests sheet the submission landed on
        #[arg(long)]
        row: usize,
    },
    /// Edit one cell of the requests sheet and process the edit
    Edit {
        #[arg(long)]
        row: usize,
        /// Header of the edited column, e.g. 担任の確認
        #[arg(long)]
        column: String,
        #[arg(long, allow_hyphen_values = true)]
        value: String,
    },
    /// Number every request row that has no reception number yet, in row order
    Backfill,
    /// Process a payment confirmation submission
    Payment {
        /// Row of the payments sheet the submission landed on
        #[arg(long)]
        row: usize,
    },
    /// Show resolved addresses and configuration warnings
    CheckConfig,
    /// Write the default configuration as TOML
    InitConfig {
        /// Destination file
        #[arg(long, default_value = "transcript-desk.toml")]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
