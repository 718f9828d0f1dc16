//! SiteTree command-line front door.
//!
//! # Responsibility
//! - Expose building and location operations as subcommands.
//! - Print results as JSON on stdout and failures as JSON on stderr.
//! - Map the core error taxonomy to stable exit codes.

#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use sitetree_core::db::{open_db, DbError};
use sitetree_core::{
    default_log_level, init_logging, BuildingPatch, BuildingService, BuildingServiceError,
    ErrorKind, LocationListQuery, LocationPatch, LocationService, LocationServiceError,
    NewLocation, RepoError, SqliteBuildingRepository, SqliteLocationRepository,
};
use std::fmt::Display;
use std::path::PathBuf;
use std::process::ExitCode as ProcessExitCode;

#[derive(Parser)]
#[command(name = "sitetree")]
#[command(about = "Manage buildings and their location hierarchy")]
#[command(version)]
struct Cli {
    /// SQLite database file; created and migrated on first use.
    #[arg(long, global = true, default_value = "sitetree.db")]
    db: PathBuf,
    /// Log level for `--log-dir`; has no effect without it.
    #[arg(long, global = true, requires = "log_dir")]
    log_level: Option<String>,
    /// Enables rolling file logs under this directory.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Building {
        #[command(subcommand)]
        command: BuildingCommand,
    },
    Location {
        #[command(subcommand)]
        command: LocationCommand,
    },
}

#[derive(Subcommand)]
enum BuildingCommand {
    Create {
        #[arg(long)]
        name: String,
    },
    List,
    Get {
        id: i64,
    },
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
    },
    Delete {
        id: i64,
    },
}

#[derive(Subcommand)]
enum LocationCommand {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        area: f64,
        #[arg(long)]
        code: String,
        #[arg(long)]
        building: i64,
        #[arg(long)]
        parent: Option<i64>,
    },
    List {
        #[arg(long, default_value_t = 0)]
        skip: u32,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Shows one location with its parent and direct children.
    Get {
        id: i64,
        #[arg(long, default_value_t = false)]
        without_children: bool,
    },
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        area: Option<f64>,
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        building: Option<i64>,
        #[arg(long, conflicts_with = "detach")]
        parent: Option<i64>,
        /// Clears the parent so the location becomes a root.
        #[arg(long, default_value_t = false)]
        detach: bool,
    },
    Delete {
        id: i64,
    },
    /// Lists every location below the given one.
    Descendants {
        id: i64,
    },
}

/// Failure reported to the terminal.
#[derive(Debug)]
struct CliFailure {
    kind: ErrorKind,
    message: String,
}

impl CliFailure {
    fn store(err: impl Display) -> Self {
        Self {
            kind: ErrorKind::StoreFailure,
            message: err.to_string(),
        }
    }

    fn exit_code(&self) -> u8 {
        match self.kind {
            ErrorKind::StoreFailure => 1,
            ErrorKind::InvalidArgument => 2,
            ErrorKind::NotFound => 4,
        }
    }
}

impl From<DbError> for CliFailure {
    fn from(value: DbError) -> Self {
        Self::store(value)
    }
}

impl From<RepoError> for CliFailure {
    fn from(value: RepoError) -> Self {
        Self::store(value)
    }
}

impl From<LocationServiceError> for CliFailure {
    fn from(value: LocationServiceError) -> Self {
        Self {
            kind: value.kind(),
            message: value.to_string(),
        }
    }
}

impl From<BuildingServiceError> for CliFailure {
    fn from(value: BuildingServiceError) -> Self {
        Self {
            kind: value.kind(),
            message: value.to_string(),
        }
    }
}

fn main() -> ProcessExitCode {
    let cli = Cli::parse();

    if let Some(log_dir) = &cli.log_dir {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        let initialized = std::path::absolute(log_dir)
            .map_err(CliFailure::store)
            .and_then(|dir| init_logging(level, &dir).map_err(CliFailure::store));
        if let Err(failure) = initialized {
            return report(&failure);
        }
    }

    match run(&cli) {
        Ok(output) => {
            println!("{output}");
            ProcessExitCode::SUCCESS
        }
        Err(failure) => report(&failure),
    }
}

// Services have already logged the failure; this only renders it.
fn report(failure: &CliFailure) -> ProcessExitCode {
    eprintln!("{}", error_body(failure));
    ProcessExitCode::from(failure.exit_code())
}

fn error_body(failure: &CliFailure) -> Value {
    json!({
        "error": {
            "kind": failure.kind,
            "message": failure.message,
        }
    })
}

fn run(cli: &Cli) -> Result<String, CliFailure> {
    let conn = open_db(&cli.db)?;
    let buildings = || SqliteBuildingRepository::try_new(&conn);
    let locations = || SqliteLocationRepository::try_new(&conn);

    match &cli.command {
        Commands::Building { command } => {
            let service = BuildingService::new(buildings()?, locations()?);
            run_building(&service, command)
        }
        Commands::Location { command } => {
            let service = LocationService::new(buildings()?, locations()?);
            run_location(&service, command)
        }
    }
}

fn run_building(
    service: &BuildingService<SqliteBuildingRepository<'_>, SqliteLocationRepository<'_>>,
    command: &BuildingCommand,
) -> Result<String, CliFailure> {
    match command {
        BuildingCommand::Create { name } => render(&service.create(name)?),
        BuildingCommand::List => render(&service.list()?),
        BuildingCommand::Get { id } => render(&service.find(*id)?),
        BuildingCommand::Update { id, name } => {
            service.update(*id, &BuildingPatch { name: name.clone() })?;
            render(&service.find(*id)?)
        }
        BuildingCommand::Delete { id } => {
            service.delete(*id)?;
            render(&json!({ "deleted": id }))
        }
    }
}

fn run_location(
    service: &LocationService<SqliteBuildingRepository<'_>, SqliteLocationRepository<'_>>,
    command: &LocationCommand,
) -> Result<String, CliFailure> {
    match command {
        LocationCommand::Create {
            name,
            area,
            code,
            building,
            parent,
        } => render(&service.create(&NewLocation {
            name: name.clone(),
            area: *area,
            location_code: code.clone(),
            building_id: *building,
            parent_id: *parent,
        })?),
        LocationCommand::List { skip, limit } => render(&service.list(&LocationListQuery {
            skip: *skip,
            limit: *limit,
        })?),
        LocationCommand::Get {
            id,
            without_children,
        } => render(&service.find_location(*id, !without_children)?),
        LocationCommand::Update {
            id,
            name,
            area,
            code,
            building,
            parent,
            detach,
        } => {
            let patch = LocationPatch {
                name: name.clone(),
                area: *area,
                location_code: code.clone(),
                building_id: *building,
                parent_id: parent_change(*parent, *detach),
            };
            service.update(*id, &patch)?;
            render(&service.find_location(*id, true)?)
        }
        LocationCommand::Delete { id } => {
            service.delete(*id)?;
            render(&json!({ "deleted": id }))
        }
        LocationCommand::Descendants { id } => render(&service.descendants_of(*id)?),
    }
}

fn parent_change(parent: Option<i64>, detach: bool) -> Option<Option<i64>> {
    if detach {
        return Some(None);
    }
    parent.map(Some)
}

fn render(value: &impl Serialize) -> Result<String, CliFailure> {
    serde_json::to_string_pretty(value).map_err(CliFailure::store)
}
