//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::fortnight::{parse_date, FortnightId};
use crate::question::Tag;

/// Current command arguments.
#[derive(Debug, Args)]
pub struct CurrentCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Ask command arguments.
#[derive(Debug, Args)]
pub struct AskCommand {
    /// The question to ask
    pub text: String,

    /// Optional background for the question
    #[arg(long)]
    pub context: Option<String>,

    /// Category (defaults to the configured default tag)
    #[arg(short, long, value_parser = parse_tag)]
    pub tag: Option<Tag>,

    /// Output the stored question as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Any date inside the fortnight to list (YYYY-MM-DD, defaults to today)
    #[arg(short, long, value_parser = parse_fortnight)]
    pub fortnight: Option<FortnightId>,

    /// Output format
    #[arg(long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Show command arguments.
#[derive(Debug, Args)]
pub struct ShowCommand {
    /// Question identifier
    pub id: String,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Vote command arguments.
#[derive(Debug, Args)]
pub struct VoteCommand {
    /// Question identifier
    pub id: String,
}

/// Delete command arguments.
#[derive(Debug, Args)]
pub struct DeleteCommand {
    /// Question identifier
    pub id: String,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Session command arguments.
#[derive(Debug, Args)]
pub struct SessionCommand {
    /// Any date inside the fortnight to start on (YYYY-MM-DD, defaults to today)
    #[arg(short, long, value_parser = parse_fortnight)]
    pub fortnight: Option<FortnightId>,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}

/// Parse a date and resolve it to the fortnight containing it.
///
/// # Errors
///
/// Returns a message if `value` is not a `YYYY-MM-DD` date.
pub fn parse_fortnight(value: &str) -> Result<FortnightId, String> {
    parse_date(value)
        .map(FortnightId::containing)
        .map_err(|e| e.to_string())
}

/// Parse a tag label or kebab-case name.
///
/// # Errors
///
/// Returns a message listing the known tags if `value` matches none.
pub fn parse_tag(value: &str) -> Result<Tag, String> {
    value.parse::<Tag>().map_err(|_| {
        format!(
            "unknown tag '{value}', expected one of: {}",
            Tag::ALL.map(Tag::label).join(", ")
        )
    })
}
