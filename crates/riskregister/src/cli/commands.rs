//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Subcommand, ValueEnum};

use crate::dates::parse_date;
use crate::exchange::Format;
use crate::matrix::Cell;
use crate::project::ProjectMeta;
use crate::risk::{Priority, RiskInput, RiskPatch, RiskResponse, RiskStatus};

/// Project management commands.
#[derive(Debug, Subcommand)]
pub enum ProjectCommand {
    /// Create a project
    New(MetaArgs),

    /// List all projects
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show project details
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Edit project metadata
    Edit(MetaArgs),

    /// Delete a project and all of its risks
    Delete {
        /// Project identifier
        id: String,

        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Manage the project's risk categories
    #[command(subcommand)]
    Category(CategoryCommand),
}

/// Category commands.
#[derive(Debug, Subcommand)]
pub enum CategoryCommand {
    /// Add a category
    Add {
        /// Category name
        name: String,
    },

    /// Remove a category
    Remove {
        /// Category name
        name: String,
    },
}

/// Project metadata fields. Unset fields keep their current value.
#[derive(Debug, Default, Args)]
pub struct MetaArgs {
    /// Project name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Project manager
    #[arg(long)]
    pub manager: Option<String>,

    /// Project sponsor
    #[arg(long)]
    pub sponsor: Option<String>,

    /// Start date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date_arg)]
    pub start: Option<NaiveDate>,

    /// End date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date_arg)]
    pub end: Option<NaiveDate>,

    /// Risk management plan
    #[arg(long)]
    pub plan: Option<String>,
}

impl MetaArgs {
    /// Overlay the given fields on existing metadata.
    #[must_use]
    pub fn apply_to(&self, meta: &ProjectMeta) -> ProjectMeta {
        ProjectMeta {
            project_name: self.name.clone().unwrap_or_else(|| meta.project_name.clone()),
            project_manager: self
                .manager
                .clone()
                .unwrap_or_else(|| meta.project_manager.clone()),
            sponsor: self.sponsor.clone().unwrap_or_else(|| meta.sponsor.clone()),
            start_date: self.start.or(meta.start_date),
            end_date: self.end.or(meta.end_date),
            risk_plan: self.plan.clone().unwrap_or_else(|| meta.risk_plan.clone()),
        }
    }
}

/// Risk management commands.
#[derive(Debug, Subcommand)]
pub enum RiskCommand {
    /// Add a risk
    Add(RiskAddArgs),

    /// List risks
    List(RiskListArgs),

    /// Show a risk
    Show {
        /// Risk identifier
        id: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Update a risk
    Update(RiskUpdateArgs),

    /// Delete a risk
    Delete {
        /// Risk identifier
        id: String,
    },

    /// Show a risk's status history
    History {
        /// Risk identifier
        id: String,
    },
}

/// Risk add arguments.
#[derive(Debug, Args)]
pub struct RiskAddArgs {
    /// Short title
    #[arg(short, long)]
    pub title: String,

    /// Description
    #[arg(short, long, default_value_t)]
    pub description: String,

    /// Category
    #[arg(long, default_value_t)]
    pub category: String,

    /// Probability (1-5)
    #[arg(long)]
    pub probability: u8,

    /// Impact (1-5)
    #[arg(long)]
    pub impact: u8,

    /// Owner
    #[arg(short, long, default_value_t)]
    pub owner: String,

    /// Mitigation plan
    #[arg(short, long, default_value_t)]
    pub mitigation: String,

    /// Priority
    #[arg(long, value_enum, default_value = "medium")]
    pub priority: PriorityArg,

    /// Response strategy
    #[arg(long, value_enum, default_value = "mitigate")]
    pub response: ResponseArg,

    /// Initial status
    #[arg(short, long, value_enum, default_value = "open")]
    pub status: StatusArg,

    /// Date identified (YYYY-MM-DD, defaults to today)
    #[arg(long, value_parser = parse_date_arg)]
    pub identified: Option<NaiveDate>,

    /// Date resolved (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date_arg)]
    pub resolved: Option<NaiveDate>,

    /// Note for the initial history entry
    #[arg(long, default_value_t)]
    pub note: String,
}

impl RiskAddArgs {
    /// The risk fields, with `today` as the default identification date.
    #[must_use]
    pub fn to_input(&self, today: NaiveDate) -> RiskInput {
        RiskInput {
            title: self.title.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            probability: self.probability,
            impact: self.impact,
            owner: self.owner.clone(),
            mitigation: self.mitigation.clone(),
            priority: self.priority.into(),
            response: self.response.into(),
            status: self.status.into(),
            date_identified: self.identified.unwrap_or(today),
            date_resolved: self.resolved,
        }
    }
}

/// Risk list arguments.
#[derive(Debug, Default, Args)]
pub struct RiskListArgs {
    /// Only risks in this matrix cell, as PROBABILITY,IMPACT
    #[arg(long, value_name = "P,I", value_parser = parse_cell_arg)]
    pub cell: Option<Cell>,

    /// Only risks with this status
    #[arg(short, long, value_enum)]
    pub status: Option<StatusArg>,

    /// Only risks whose title or description matches this regex
    #[arg(long, value_name = "PATTERN")]
    pub search: Option<String>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Risk update arguments. Unset fields keep their current value.
#[derive(Debug, Default, Args)]
pub struct RiskUpdateArgs {
    /// Risk identifier
    pub id: String,

    /// Short title
    #[arg(short, long)]
    pub title: Option<String>,

    /// Description
    #[arg(short, long)]
    pub description: Option<String>,

    /// Category
    #[arg(long)]
    pub category: Option<String>,

    /// Probability (1-5)
    #[arg(long)]
    pub probability: Option<u8>,

    /// Impact (1-5)
    #[arg(long)]
    pub impact: Option<u8>,

    /// Owner
    #[arg(short, long)]
    pub owner: Option<String>,

    /// Mitigation plan
    #[arg(short, long)]
    pub mitigation: Option<String>,

    /// Priority
    #[arg(long, value_enum)]
    pub priority: Option<PriorityArg>,

    /// Response strategy
    #[arg(long, value_enum)]
    pub response: Option<ResponseArg>,

    /// New status
    #[arg(short, long, value_enum)]
    pub status: Option<StatusArg>,

    /// Date identified (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date_arg)]
    pub identified: Option<NaiveDate>,

    /// Date resolved (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date_arg, conflicts_with = "unresolved")]
    pub resolved: Option<NaiveDate>,

    /// Clear the resolved date
    #[arg(long)]
    pub unresolved: bool,

    /// Note recorded in the status history
    #[arg(short, long, default_value_t)]
    pub note: String,
}

impl RiskUpdateArgs {
    /// The partial update described by these arguments.
    #[must_use]
    pub fn to_patch(&self) -> RiskPatch {
        let date_resolved = if self.unresolved {
            Some(None)
        } else {
            self.resolved.map(Some)
        };
        RiskPatch {
            title: self.title.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            probability: self.probability,
            impact: self.impact,
            owner: self.owner.clone(),
            mitigation: self.mitigation.clone(),
            priority: self.priority.map(Into::into),
            response: self.response.map(Into::into),
            status: self.status.map(Into::into),
            date_identified: self.identified,
            date_resolved,
        }
    }
}

/// Timeline command arguments.
#[derive(Debug, Args)]
pub struct TimelineCommand {
    /// Write the chart as SVG to this file
    #[arg(long, value_name = "FILE")]
    pub svg: Option<PathBuf>,

    /// Output the series as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Export/import command arguments.
#[derive(Debug, Args)]
pub struct TransferCommand {
    /// File to write or read
    pub file: PathBuf,

    /// File format (defaults to the file extension)
    #[arg(short, long, value_enum)]
    pub format: Option<FormatArg>,
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

/// Risk status argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    /// Identified, no action yet
    Open,
    /// Mitigation under way
    InProgress,
    /// Mitigation complete
    Mitigated,
    /// Consciously accepted
    Accepted,
}

impl From<StatusArg> for RiskStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Open => Self::Open,
            StatusArg::InProgress => Self::InProgress,
            StatusArg::Mitigated => Self::Mitigated,
            StatusArg::Accepted => Self::Accepted,
        }
    }
}

/// Priority argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PriorityArg {
    /// Handle first
    High,
    /// Normal priority
    Medium,
    /// Handle when convenient
    Low,
}

impl From<PriorityArg> for Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::High => Self::High,
            PriorityArg::Medium => Self::Medium,
            PriorityArg::Low => Self::Low,
        }
    }
}

/// Response strategy argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResponseArg {
    /// Remove the cause
    Avoid,
    /// Reduce probability or impact
    Mitigate,
    /// Shift the risk to a third party
    Transfer,
    /// Live with it
    Accept,
}

impl From<ResponseArg> for RiskResponse {
    fn from(arg: ResponseArg) -> Self {
        match arg {
            ResponseArg::Avoid => Self::Avoid,
            ResponseArg::Mitigate => Self::Mitigate,
            ResponseArg::Transfer => Self::Transfer,
            ResponseArg::Accept => Self::Accept,
        }
    }
}

/// Exchange format argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    /// JSON project document
    Json,
    /// CSV risk table
    Csv,
    /// Excel workbook
    Xlsx,
}

impl From<FormatArg> for Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => Self::Json,
            FormatArg::Csv => Self::Csv,
            FormatArg::Xlsx => Self::Xlsx,
        }
    }
}

fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    parse_date(value).ok_or_else(|| format!("invalid date '{value}', expected YYYY-MM-DD"))
}

fn parse_cell_arg(value: &str) -> Result<Cell, String> {
    let invalid = || format!("invalid cell '{value}', expected PROBABILITY,IMPACT from 1 to 5");
    let (p, i) = value.split_once(',').ok_or_else(invalid)?;
    let p = p.trim().parse().map_err(|_| invalid())?;
    let i = i.trim().parse().map_err(|_| invalid())?;
    Cell::new(p, i).ok_or_else(invalid)
}
