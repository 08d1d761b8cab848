//! Command-line interface for fortnightly.
//!
//! This module provides the CLI structure, output rendering and the
//! interactive session for the `fortnightly` binary.

mod commands;
pub mod render;
pub mod session;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    parse_fortnight, parse_tag, AskCommand, ConfigCommand, CurrentCommand, DeleteCommand,
    ListCommand, OutputFormat, SessionCommand, ShowCommand, VoteCommand,
};

/// fortnightly - Ask anonymous questions for the All Hands
///
/// Questions are grouped into two-week windows. Ask a question, vote on the
/// ones you want answered, and browse past fortnights.
#[derive(Debug, Parser)]
#[command(name = "fortnightly")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the current fortnight
    Current(CurrentCommand),

    /// Ask a question in the current fortnight
    Ask(AskCommand),

    /// List the questions of a fortnight
    List(ListCommand),

    /// Show one question in full
    Show(ShowCommand),

    /// Vote for a question
    Vote(VoteCommand),

    /// Delete a question
    Delete(DeleteCommand),

    /// Start an interactive session
    Session(SessionCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
