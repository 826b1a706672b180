//! `riskreg` - CLI for riskregister
//!
//! This binary provides the command-line interface for managing projects,
//! risks and their exports.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{Local, Utc};
use clap::Parser;

use riskregister::cli::{
    CategoryCommand, Cli, Command, ConfigCommand, FormatArg, ProjectCommand, RiskCommand,
    RiskListArgs, TimelineCommand, TransferCommand,
};
use riskregister::exchange::{self, Format};
use riskregister::matrix::RiskMatrix;
use riskregister::project::ProjectMeta;
use riskregister::register::RiskQuery;
use riskregister::risk::RiskStatus;
use riskregister::timeline::Timeline;
use riskregister::{chart, init_logging, report, Config, Register, Storage};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    if let Command::Config(config_cmd) = &cli.command {
        return handle_config(&cli, config_cmd);
    }

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    let db_path = cli.db.clone().unwrap_or_else(|| config.database_path());
    let storage = Storage::open(&db_path)
        .with_context(|| format!("failed to open register at {}", db_path.display()))?;
    let register = Register::new(storage);

    match &cli.command {
        Command::Project(cmd) => handle_project(&cli, &config, &register, cmd),
        Command::Risk(cmd) => handle_risk(&cli, &config, &register, cmd),
        Command::Matrix { json } => handle_matrix(&cli, &config, &register, *json),
        Command::Score => {
            let project = register.project(&cli.project_id(&config)?)?;
            println!(
                "{}",
                report::score_line(project.aggregated_score(), &config.severity_thresholds())
            );
            Ok(())
        }
        Command::Timeline(cmd) => handle_timeline(&cli, &config, &register, cmd),
        Command::Export(cmd) => handle_export(&cli, &config, &register, cmd),
        Command::Import(cmd) => handle_import(&cli, &config, &register, cmd),
        Command::Status { json } => handle_status(&register, *json),
        Command::Config(_) => Ok(()),
    }
}

fn handle_project(
    cli: &Cli,
    config: &Config,
    register: &Register,
    cmd: &ProjectCommand,
) -> Result<()> {
    let thresholds = config.severity_thresholds();
    match cmd {
        ProjectCommand::New(fields) => {
            let project = register.create_project(fields.apply_to(&ProjectMeta::default()))?;
            println!("Created project {} ({})", project.id, project.display_name());
        }
        ProjectCommand::List { json } => {
            let projects = register.projects()?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&projects)?);
            } else {
                print!("{}", report::project_list(&projects, &thresholds));
            }
        }
        ProjectCommand::Show { json } => {
            let project = register.project(&cli.project_id(config)?)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&project)?);
            } else {
                print!("{}", report::project_detail(&project, &thresholds));
            }
        }
        ProjectCommand::Edit(fields) => {
            let id = cli.project_id(config)?;
            let meta = fields.apply_to(&register.project(&id)?.meta);
            register.save_meta(&id, &meta)?;
            println!("Saved project {id}");
        }
        ProjectCommand::Delete { id, yes } => {
            if *yes {
                register.delete_project(id)?;
                println!("Deleted project {id}");
            } else {
                let project = register.project(id)?;
                println!(
                    "This will delete project {} ({}) and its {} risks.",
                    project.id,
                    project.display_name(),
                    project.risks.len()
                );
                println!("Use --yes to confirm.");
            }
        }
        ProjectCommand::Category(category_cmd) => {
            let id = cli.project_id(config)?;
            match category_cmd {
                CategoryCommand::Add { name } => {
                    if register.add_category(&id, name)? {
                        println!("Added category '{}'", name.trim());
                    } else {
                        println!("Category '{}' not added (blank or already listed)", name.trim());
                    }
                }
                CategoryCommand::Remove { name } => {
                    if register.remove_category(&id, name)? {
                        println!("Removed category '{}'", name.trim());
                    } else {
                        println!("Category '{}' is not listed", name.trim());
                    }
                }
            }
        }
    }
    Ok(())
}

fn handle_risk(cli: &Cli, config: &Config, register: &Register, cmd: &RiskCommand) -> Result<()> {
    let project_id = cli.project_id(config)?;
    let thresholds = config.severity_thresholds();
    match cmd {
        RiskCommand::Add(args) => {
            let input = args.to_input(Local::now().date_naive());
            let risk = register.add_risk(&project_id, input, &args.note)?;
            println!("Added risk {} (score {})", risk.id, risk.score());
        }
        RiskCommand::List(args) => {
            let project = register.project(&project_id)?;
            let query = risk_query(args)?;
            let risks = query.apply(&project.risks);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&risks)?);
            } else {
                print!("{}", report::risk_table(&risks, &thresholds));
            }
        }
        RiskCommand::Show { id, json } => {
            let risk = register.risk(&project_id, id)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&risk)?);
            } else {
                print!("{}", report::risk_detail(&risk, &thresholds));
            }
        }
        RiskCommand::Update(args) => {
            let risk = register.update_risk(&project_id, &args.id, &args.to_patch(), &args.note)?;
            println!("Updated risk {} (score {}, {})", risk.id, risk.score(), risk.status);
        }
        RiskCommand::Delete { id } => {
            register.delete_risk(&project_id, id)?;
            println!("Deleted risk {id}");
        }
        RiskCommand::History { id } => {
            let risk = register.risk(&project_id, id)?;
            print!("{}", report::history(&risk));
        }
    }
    Ok(())
}

fn risk_query(args: &RiskListArgs) -> Result<RiskQuery> {
    let query = RiskQuery {
        cell: args.cell,
        status: args.status.map(RiskStatus::from),
        search: None,
    };
    Ok(match &args.search {
        Some(pattern) => query.with_search(pattern)?,
        None => query,
    })
}

fn handle_matrix(cli: &Cli, config: &Config, register: &Register, json: bool) -> Result<()> {
    let project = register.project(&cli.project_id(config)?)?;
    let matrix = RiskMatrix::build(&project.risks);
    let thresholds = config.severity_thresholds();

    if json {
        let cells: Vec<_> = matrix
            .rows()
            .into_iter()
            .flatten()
            .map(|cell| {
                let severity = cell.severity(&thresholds);
                serde_json::json!({
                    "probability": cell.probability,
                    "impact": cell.impact,
                    "score": cell.score(),
                    "severity": severity,
                    "color": severity.color(),
                    "risks": matrix.risks_in(cell),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&cells)?);
    } else {
        print!("{}", report::matrix_grid(&matrix, &thresholds));
    }
    Ok(())
}

fn handle_timeline(
    cli: &Cli,
    config: &Config,
    register: &Register,
    cmd: &TimelineCommand,
) -> Result<()> {
    let project = register.project(&cli.project_id(config)?)?;
    let Some(timeline) = Timeline::build(&project.meta, &project.risks, &config.timeline_settings())
    else {
        bail!(
            "project {} needs a start date and a later end date for a timeline",
            project.id
        );
    };

    if let Some(path) = &cmd.svg {
        fs::write(path, chart::render_svg(&timeline))
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Wrote chart to {}", path.display());
    }
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&timeline)?);
    } else if cmd.svg.is_none() {
        print!("{}", report::timeline_table(&timeline));
    }
    Ok(())
}

fn transfer_format(path: &Path, arg: Option<FormatArg>) -> Result<Format> {
    match arg {
        Some(arg) => Ok(arg.into()),
        None => Ok(Format::from_path(path)?),
    }
}

fn handle_export(
    cli: &Cli,
    config: &Config,
    register: &Register,
    cmd: &TransferCommand,
) -> Result<()> {
    let format = transfer_format(&cmd.file, cmd.format)?;
    let data = register.export(&cli.project_id(config)?, format)?;
    fs::write(&cmd.file, data).with_context(|| format!("failed to write {}", cmd.file.display()))?;
    println!("Exported {format} to {}", cmd.file.display());
    Ok(())
}

fn handle_import(
    cli: &Cli,
    config: &Config,
    register: &Register,
    cmd: &TransferCommand,
) -> Result<()> {
    let project_id = cli.project_id(config)?;
    let format = transfer_format(&cmd.file, cmd.format)?;
    let data = fs::read(&cmd.file).with_context(|| format!("failed to read {}", cmd.file.display()))?;
    let bundle = exchange::import(&data, format, Utc::now())
        .with_context(|| format!("failed to import {}", cmd.file.display()))?;

    let summary = register.import(&project_id, bundle)?;
    println!(
        "Imported {} risks into project {project_id}",
        summary.risks_added
    );
    if summary.ids_assigned > 0 {
        println!("  {} risks were given new ids", summary.ids_assigned);
    }
    if summary.meta_replaced {
        println!("  Project metadata replaced");
    }
    if summary.categories_added > 0 {
        println!("  {} categories added", summary.categories_added);
    }
    Ok(())
}

fn handle_status(register: &Register, json: bool) -> Result<()> {
    let storage = register.storage();
    let stats = storage.stats()?;
    if json {
        let status = serde_json::json!({
            "database_path": storage.path(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("riskreg status");
        println!("--------------");
        println!("Database:        {}", storage.path().display());
        println!("Schema version:  {}", stats.schema_version);
        println!("Database size:   {} bytes", stats.db_size_bytes);
        println!("Projects:        {}", stats.total_projects);
        println!("Risks:           {}", stats.total_risks);
        println!("History entries: {}", stats.total_history_entries);
    }
    Ok(())
}

fn handle_config(cli: &Cli, cmd: &ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(cli.config.clone())
                .context("failed to load configuration")?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Register]");
                println!(
                    "  Default project:    {}",
                    config.register.default_project.as_deref().unwrap_or("(none)")
                );
                println!();
                println!("[Scoring]");
                println!("  Moderate threshold: {}", config.scoring.moderate_threshold);
                println!("  High threshold:     {}", config.scoring.high_threshold);
                println!();
                println!("[Timeline]");
                println!("  Weekly up to:       {} days", config.timeline.week_max_days);
                println!("  Monthly up to:      {} days", config.timeline.month_max_days);
                println!("  Status source:      {:?}", config.timeline.status_source);
            }
        }
        ConfigCommand::Path => {
            let path = cli.config.clone().unwrap_or_else(Config::default_config_path);
            println!("{}", path.display());
        }
        ConfigCommand::Validate { file } => {
            let path = file
                .clone()
                .or_else(|| cli.config.clone())
                .unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
