//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for list/query commands.
#[derive(ValueEnum, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table (default)
    #[default]
    Table,
    /// JSON (same as --json)
    Json,
    /// Comma-separated values
    Csv,
}

pub mod commands;

/// panellog - panel/lot/carrier record keeping
#[derive(Parser, Debug)]
#[command(name = "plog", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: <data dir>/panellog.db)
    #[arg(long, global = true, env = "PLOG_DB")]
    pub db: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Output format (table, json, csv)
    #[arg(long, value_enum, global = true, default_value_t)]
    pub format: OutputFormat,

    /// Output only the entry id (for scripting)
    #[arg(long, global = true)]
    pub silent: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database
    Init {
        /// Re-apply schema and column patches to an existing database
        #[arg(long)]
        force: bool,
    },

    /// Print version information
    Version,

    /// Show database and operation log status
    Status,

    /// Add an entry
    Add(AddArgs),

    /// Edit an entry by id
    Edit(EditArgs),

    /// Delete entries by id
    #[command(alias = "rm")]
    Delete {
        /// Entry ids (missing ids are ignored)
        #[arg(required = true, num_args = 1..)]
        ids: Vec<i64>,
    },

    /// List all entries (sorted by panel, lot, carrier)
    #[command(alias = "ls")]
    List,

    /// Search entries
    Query(QueryArgs),

    /// Import entries from a CSV/TSV sheet
    Import {
        /// Sheet file (header row, then Time, Panel_ID, LOT_ID, Carrier_ID)
        file: PathBuf,
    },

    /// Export all entries to a CSV sheet
    Export {
        /// Output file
        file: PathBuf,
    },

    /// Operation log
    Log {
        #[command(subcommand)]
        command: LogCommands,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ============================================================================
// Entry Commands
// ============================================================================

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Panel id
    #[arg(long, allow_hyphen_values = true)]
    pub panel: i64,

    /// Lot id
    #[arg(long, allow_hyphen_values = true)]
    pub lot: i64,

    /// Carrier id
    #[arg(long, allow_hyphen_values = true)]
    pub carrier: i64,

    /// Time (e.g. "2024/05/20 08:00:00"; default: now)
    #[arg(long)]
    pub time: Option<String>,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    /// Entry id
    pub id: i64,

    /// New panel id
    #[arg(long, allow_hyphen_values = true)]
    pub panel: Option<i64>,

    /// New lot id
    #[arg(long, allow_hyphen_values = true)]
    pub lot: Option<i64>,

    /// New carrier id
    #[arg(long, allow_hyphen_values = true)]
    pub carrier: Option<i64>,

    /// New time
    #[arg(long)]
    pub time: Option<String>,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Exact panel id
    #[arg(long, allow_hyphen_values = true)]
    pub panel: Option<i64>,

    /// Exact lot id
    #[arg(long, allow_hyphen_values = true)]
    pub lot: Option<i64>,

    /// Exact carrier id
    #[arg(long, allow_hyphen_values = true)]
    pub carrier: Option<i64>,

    /// Fragment of the "yyyy/MM/dd HH:mm:ss" time (e.g. "2024/05")
    #[arg(long)]
    pub time: Option<String>,
}

// ============================================================================
// Log Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum LogCommands {
    /// Migrate buffered entries, then show the merged log
    List,

    /// Move buffered entries from the local file into the database
    Migrate,

    /// Clear the operation log
    Clear,
}
