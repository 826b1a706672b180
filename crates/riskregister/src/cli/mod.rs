//! Command-line interface for riskregister.
//!
//! This module provides the CLI structure for the `riskreg` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    CategoryCommand, ConfigCommand, FormatArg, MetaArgs, PriorityArg, ProjectCommand,
    ResponseArg, RiskAddArgs, RiskCommand, RiskListArgs, RiskUpdateArgs, StatusArg,
    TimelineCommand, TransferCommand,
};

use crate::config::Config;
use crate::error::{Error, Result};

/// riskreg - Track project risks
///
/// A risk register: probability × impact scoring, the risk matrix, status
/// history, a score timeline and JSON/CSV/XLSX exchange.
#[derive(Debug, Parser)]
#[command(name = "riskreg")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to the register database (overrides configuration)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Project to work on (defaults to register.default_project)
    #[arg(short, long, global = true, value_name = "ID")]
    pub project: Option<String>,

    /// Increase verbosity (-v for info, -vv for trace)
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
    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommand),

    /// Manage risks
    #[command(subcommand)]
    Risk(RiskCommand),

    /// Show the risk matrix
    Matrix {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the aggregated risk score
    Score,

    /// Show the risk score timeline
    Timeline(TimelineCommand),

    /// Export the project to a file
    Export(TransferCommand),

    /// Import risks and metadata from a file
    Import(TransferCommand),

    /// Show database location and statistics
    Status {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// View or check configuration
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

    /// The selected project: `--project`, else the configured default.
    ///
    /// # Errors
    ///
    /// Returns `NoProjectSelected` when neither is set.
    pub fn project_id(&self, config: &Config) -> Result<String> {
        self.project
            .clone()
            .or_else(|| config.register.default_project.clone())
            .filter(|id| !id.trim().is_empty())
            .ok_or(Error::NoProjectSelected)
    }
}
