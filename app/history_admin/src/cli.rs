//! CLI interface

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "history_admin")]
#[command(version, about = "Browse recorded model history (read-only)", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// MySQL connection string, overrides `database_url` from the config file
    #[arg(long, env = "HISTORY_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    pub format: Format,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List histories, newest first
    List {
        /// Exact app label
        #[arg(long)]
        app_label: Option<String>,

        /// Exact model name
        #[arg(long)]
        model: Option<String>,

        /// Source id or part of `app_label.model`
        #[arg(short, long)]
        search: Option<String>,

        /// Page number (0-based)
        #[arg(short, long, default_value_t = 0)]
        page: u64,
    },

    /// Show one history with all of its entries
    Show {
        /// History id
        id: u64,
    },

    /// Print the DDL for the history tables
    Schema,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
    Html,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
