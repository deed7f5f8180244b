use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "planhist",
    about = "Change lists and blame for versioned work-breakdown plans",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Settings file (defaults to planhist.toml in the history directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// List recent changes, newest first
    Changes(ChangesArgs),
    /// Show who changed each node and attribute
    Blame(BlameArgs),
}

#[derive(Args)]
pub struct ChangesArgs {
    /// History directory
    pub dir: PathBuf,
    /// Stop after at least this many changes
    #[arg(long)]
    pub min: Option<usize>,
    /// Finish the current day before stopping
    #[arg(long)]
    pub full_days: bool,
    /// Merge consecutive saves by the same author on the same day
    #[arg(long)]
    pub merge: bool,
    /// Only consider versions saved on or before this time (RFC 3339)
    #[arg(long)]
    pub before: Option<DateTime<Utc>>,
    /// Local UTC offset in minutes, for day boundaries
    #[arg(long, allow_hyphen_values = true)]
    pub utc_offset: Option<i32>,
}

#[derive(Args)]
pub struct BlameArgs {
    /// History directory
    pub dir: PathBuf,
    /// Only show this node
    #[arg(long, allow_hyphen_values = true)]
    pub node: Option<i32>,
    /// Treat everything up to this time (RFC 3339) as the baseline
    #[arg(long)]
    pub since: Option<DateTime<Utc>>,
    /// Also blame the workflows tree
    #[arg(long)]
    pub workflows: bool,
}
