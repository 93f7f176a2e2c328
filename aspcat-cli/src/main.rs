//! aspcat CLI
//!
//! Operator tooling for the object catalog: inspect backend status, run
//! and validate migrations, open or close the dual-write window, and
//! switch the active backend. Results print as JSON; a failed command or
//! failed validation exits nonzero.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::error;
use thiserror::Error;

use aspcat_backend::{
    BackendError, BackendKind, CatalogManager, ConfigStore, ManagerConfig,
};
use aspcat_migrate::{MigrationError, MigrationManager, MigrationOptions, SyncDirection};

#[derive(Parser)]
#[command(name = "aspcat")]
#[command(about = "Manage object catalog backends and migrations", long_about = None)]
struct Cli {
    /// Backend configuration file
    #[arg(short, long, global = true, default_value = "catalog_backend.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the active backend, migration mode, and per-backend health
    Status,

    /// Copy the catalog from the active backend into another backend
    Migrate {
        /// Report what would move without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Skip the pre-migration backup
        #[arg(long)]
        no_backup: bool,

        /// Skip the post-migration validation pass
        #[arg(long)]
        no_validation: bool,

        /// Target backend (defaults to the counterpart of the active one)
        #[arg(long)]
        target: Option<String>,
    },

    /// Open the dual-write window
    EnableMigration {
        /// Backend that serves reads (defaults to the active backend)
        #[arg(long)]
        read: Option<String>,

        /// Backends that receive writes (defaults to every configured one)
        #[arg(long = "write")]
        writes: Vec<String>,
    },

    /// Close the dual-write window
    DisableMigration,

    /// Make the JSON file backend active
    SwitchToJsonFile,

    /// Make the SQLite backend active
    SwitchToSqlite,

    /// Compare the active backend against its counterpart
    Validate {
        /// Backend to compare against (defaults to the counterpart)
        #[arg(long)]
        target: Option<String>,
    },

    /// Merge one backend's catalog into the other
    Sync {
        /// `source_to_target` or `target_to_source`
        direction: String,

        /// Target backend (defaults to the counterpart of the active one)
        #[arg(long)]
        target: Option<String>,
    },

    /// Restore a backend from a backup snapshot
    Rollback {
        backup_path: PathBuf,

        /// Backend to restore (defaults to the active backend)
        #[arg(long)]
        target: Option<String>,
    },

    /// Export the active backend's catalog to a JSON snapshot
    Export { path: PathBuf },

    /// Import a JSON snapshot into the active backend
    Import {
        path: PathBuf,

        /// Merge into the existing catalog instead of replacing it
        #[arg(long)]
        merge: bool,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("validation found differences")]
    ValidationFailed,
}

fn parse_backend(name: &str) -> Result<BackendKind, CliError> {
    BackendKind::from_str_loose(name)
        .ok_or_else(|| CliError::Usage(format!("unknown backend '{name}'")))
}

/// The counterpart of a backend for two-sided commands: file pairs with
/// SQLite and vice versa.
fn counterpart(kind: BackendKind) -> BackendKind {
    match kind {
        BackendKind::JsonFile => BackendKind::Sqlite,
        _ => BackendKind::JsonFile,
    }
}

fn resolve_target(
    store: &ConfigStore,
    target: Option<&str>,
) -> Result<(ManagerConfig, ManagerConfig), CliError> {
    let source = store.active_config();
    let target_kind = match target {
        Some(name) => parse_backend(name)?,
        None => counterpart(store.active_backend()),
    };
    if target_kind == store.active_backend() {
        return Err(CliError::Usage(format!(
            "target backend '{target_kind}' is already the active backend"
        )));
    }
    let target = store
        .backend_config(target_kind)
        .cloned()
        .ok_or_else(|| CliError::Usage(format!("backend '{target_kind}' is not configured")))?;
    Ok((source, target))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mut store = ConfigStore::load(cli.config.clone())?;

    match cli.command {
        Commands::Status => {
            print_json(&store.status())?;
        }

        Commands::Migrate {
            dry_run,
            no_backup,
            no_validation,
            target,
        } => {
            let (source, target) = resolve_target(&store, target.as_deref())?;
            let manager = MigrationManager::new(source, target);
            let stats = manager.migrate_catalog(MigrationOptions {
                backup_before: !no_backup,
                validate_after: !no_validation,
                dry_run,
            })?;
            let success = stats.success;
            print_json(&stats)?;
            if !success {
                return Err(CliError::ValidationFailed);
            }
        }

        Commands::EnableMigration { read, writes } => {
            let read = match read {
                Some(name) => parse_backend(&name)?,
                None => store.active_backend(),
            };
            let writes = if writes.is_empty() {
                vec![store.active_backend(), counterpart(store.active_backend())]
            } else {
                writes
                    .iter()
                    .map(|name| parse_backend(name))
                    .collect::<Result<Vec<_>, _>>()?
            };
            store.enable_migration(read, writes)?;
            print_json(&store.status())?;
        }

        Commands::DisableMigration => {
            store.disable_migration()?;
            print_json(&store.status())?;
        }

        Commands::SwitchToJsonFile => {
            store.set_active_backend(BackendKind::JsonFile)?;
            print_json(&store.status())?;
        }

        Commands::SwitchToSqlite => {
            store.set_active_backend(BackendKind::Sqlite)?;
            print_json(&store.status())?;
        }

        Commands::Validate { target } => {
            let (source, target) = resolve_target(&store, target.as_deref())?;
            let manager = MigrationManager::new(source, target);
            let report = manager.validate()?;
            let success = report.success;
            print_json(&report)?;
            if !success {
                return Err(CliError::ValidationFailed);
            }
        }

        Commands::Sync { direction, target } => {
            let direction = SyncDirection::from_str_loose(&direction).ok_or_else(|| {
                CliError::Usage(format!(
                    "unknown sync direction '{direction}' (use source_to_target or target_to_source)"
                ))
            })?;
            let (source, target) = resolve_target(&store, target.as_deref())?;
            let manager = MigrationManager::new(source, target);
            let stats = manager.sync_backends(direction)?;
            print_json(&stats)?;
        }

        Commands::Rollback {
            backup_path,
            target,
        } => {
            let target_config = match target {
                Some(name) => {
                    let kind = parse_backend(&name)?;
                    store.backend_config(kind).cloned().ok_or_else(|| {
                        CliError::Usage(format!("backend '{kind}' is not configured"))
                    })?
                }
                None => store.active_config(),
            };
            // Source is unused for rollback; the pair just satisfies the manager.
            let manager = MigrationManager::new(target_config.clone(), target_config);
            let stats = manager.rollback_migration(&backup_path)?;
            print_json(&stats)?;
        }

        Commands::Export { path } => {
            let manager = CatalogManager::open(&store.active_config())?;
            let result = manager.export_to_json(&path);
            manager.close();
            result?;
            print_json(&serde_json::json!({
                "exported_to": path,
                "backend": store.active_backend(),
            }))?;
        }

        Commands::Import { path, merge } => {
            let manager = CatalogManager::open(&store.active_config())?;
            let result = manager.import_from_json(&path, merge);
            manager.close();
            let stats = result?;
            print_json(&stats)?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
