//! unidb-init - bootstrap tool for the university analytics document store
//!
//! Runs the full setup runbook (`run`) or any single step of it against a
//! SQLite-backed document store.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use unidb_common::bootstrap::{run_bootstrap, BootstrapConfig, BootstrapReport};
use unidb_common::config::{
    resolve_database_path, ConfigSource, TomlConfig, CONFIG_ENV_VAR, DATABASE_ENV_VAR,
};
use unidb_common::db::{
    audit_collection, deduplicate, ensure_indexes, install_all_validators, list_indexes,
    open_store, IndexBuildReport, IndexPlan,
};
use unidb_common::etl::{run_migration, MigrationOutcome, DESTINATIONS};
use unidb_common::import::import_raw_directory;
use unidb_common::DocumentStore;

/// Command-line arguments for unidb-init
#[derive(Parser, Debug)]
#[command(name = "unidb-init")]
#[command(about = "Bootstrap the university analytics document store")]
#[command(version)]
struct Cli {
    /// Path to the SQLite database file
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Path to the TOML configuration file
    #[arg(short, long, global = true, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every step: import, validators, baseline indexes, cleanup,
    /// migration, query-optimized indexes
    Run {
        /// Load raw extracts from this directory first
        #[arg(long)]
        import: Option<PathBuf>,
    },

    /// Load raw extract files into the raw collections
    Import {
        /// Directory holding courses, assessments, studentInfo and
        /// studentAssessment files (.csv, .json or .jsonl)
        dir: PathBuf,
    },

    /// Install or update the destination validators
    Schemas,

    /// Build an index plan
    Indexes {
        #[arg(long, value_enum, default_value_t = PlanArg::QueryOptimized)]
        plan: PlanArg,
    },

    /// Remove duplicate documents, keeping the first inserted
    Dedup {
        /// Collection to clean (default from config: students)
        #[arg(long)]
        collection: Option<String>,
        /// Dotted key path (default from config: id_student)
        #[arg(long)]
        key: Option<String>,
    },

    /// Migrate raw extracts into the destination collections
    Migrate,

    /// Check stored documents against the installed validators
    Audit,

    /// Show collections, document counts, validators and indexes
    Status,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PlanArg {
    Baseline,
    QueryOptimized,
}

impl From<PlanArg> for IndexPlan {
    fn from(plan: PlanArg) -> Self {
        match plan {
            PlanArg::Baseline => IndexPlan::Baseline,
            PlanArg::QueryOptimized => IndexPlan::QueryOptimized,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (toml_config, source) = TomlConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    let default_filter = format!(
        "unidb_init={level},unidb_common={level}",
        level = toml_config.logging.level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &source {
        ConfigSource::File(path) => info!("Configuration: {}", path.display()),
        ConfigSource::Defaults => info!("Configuration: built-in defaults"),
    }

    let db_path = resolve_database_path(cli.database.as_deref(), DATABASE_ENV_VAR, &toml_config);
    info!("Database: {}", db_path.display());

    let store = open_store(&db_path)
        .await
        .with_context(|| format!("Failed to open document store at {}", db_path.display()))?;

    let mut config = BootstrapConfig::from_toml(&toml_config);

    match cli.command {
        Command::Run { import } => {
            if import.is_some() {
                config.import_dir = import;
            }
            let report = run_bootstrap(&store, &config)
                .await
                .context("Bootstrap failed")?;
            print_bootstrap(&report);
        }
        Command::Import { dir } => {
            let report = import_raw_directory(&store, &dir)
                .await
                .with_context(|| format!("Failed to import {}", dir.display()))?;
            for file in &report.imported {
                println!("{:<24} {:>8}  {}", file.source, file.documents, file.path.display());
            }
            for source in &report.missing {
                println!("{:<24} {:>8}  (no file)", source, "-");
            }
        }
        Command::Schemas => {
            let installs = install_all_validators(&store)
                .await
                .context("Failed to install validators")?;
            for install in installs {
                println!("{:<12} {:?}", install.collection, install.outcome);
            }
        }
        Command::Indexes { plan } => {
            let report = ensure_indexes(&store, plan.into())
                .await
                .context("Failed to build indexes")?;
            print_indexes(&report);
        }
        Command::Dedup { collection, key } => {
            let collection = collection.unwrap_or(config.cleanup_collection);
            let key = key.unwrap_or(config.cleanup_key);
            let report = deduplicate(&store, &collection, &key)
                .await
                .context("Duplicate cleanup failed")?;
            println!(
                "{}.{}: {} keys, {} duplicated, {} documents removed",
                collection, key, report.groups_scanned, report.duplicate_groups, report.removed
            );
        }
        Command::Migrate => {
            let outcome = run_migration(&store, &config.guard_collection)
                .await
                .context("Migration failed")?;
            print_migration(&outcome);
            if outcome.is_skipped() {
                println!("Empty '{}' to migrate again", config.guard_collection);
            }
        }
        Command::Audit => audit(&store).await?,
        Command::Status => status(&store).await?,
    }

    Ok(())
}

async fn audit(store: &DocumentStore) -> Result<()> {
    for collection in DESTINATIONS {
        let report = audit_collection(store, collection)
            .await
            .with_context(|| format!("Failed to audit '{}'", collection))?;

        if !report.has_validator {
            println!("{:<12} no validator", collection);
            continue;
        }
        println!(
            "{:<12} {} scanned, {} violating",
            collection,
            report.scanned,
            report.violations.len()
        );
        for violation in report.violations.iter().take(10) {
            println!("  _id {}: {}", violation.id, violation.reasons.join("; "));
        }
        if report.violations.len() > 10 {
            println!("  ... {} more", report.violations.len() - 10);
        }
    }
    Ok(())
}

async fn status(store: &DocumentStore) -> Result<()> {
    let collections = store
        .list_collections()
        .await
        .context("Failed to list collections")?;
    if collections.is_empty() {
        println!("(no collections)");
    }

    for collection in collections {
        let count = store.count_documents(&collection).await?;
        let validation = match store.collection_options(&collection).await? {
            Some(options) if options.validator.is_some() => format!(
                "validator ({}, {})",
                options.validation_level.as_str(),
                options.validation_action.as_str()
            ),
            _ => "no validator".to_string(),
        };
        println!("{:<24} {:>8} docs  {}", collection, count, validation);

        for index in list_indexes(store, &collection).await? {
            let keys: Vec<String> = index
                .keys
                .iter()
                .map(|k| format!("{}: {}", k.path, k.direction))
                .collect();
            println!(
                "    {:<24} {{{}}}{}",
                index.name,
                keys.join(", "),
                if index.unique { " unique" } else { "" }
            );
        }
    }
    Ok(())
}

fn print_indexes(report: &IndexBuildReport) {
    for label in &report.created {
        println!("created   {}", label);
    }
    for label in &report.existing {
        println!("existing  {}", label);
    }
}

fn print_migration(outcome: &MigrationOutcome) {
    match outcome {
        MigrationOutcome::Skipped {
            guard_collection,
            existing,
        } => println!(
            "Migration skipped: '{}' already holds {} documents",
            guard_collection, existing
        ),
        MigrationOutcome::Completed(report) => {
            for (name, stage) in [
                ("courses", report.courses),
                ("students", report.students),
                ("grades", report.grades),
            ] {
                println!(
                    "{:<10} read {:>8}  written {:>8}  dropped {:>6}",
                    name, stage.read, stage.written, stage.dropped
                );
            }
            println!(
                "students   {} repeat registrations removed",
                report.student_cleanup.removed
            );
        }
    }
}

fn print_bootstrap(report: &BootstrapReport) {
    if let Some(import) = &report.import {
        println!(
            "Imported {} documents from {} files",
            import.total_documents(),
            import.imported.len()
        );
    }
    for install in &report.validators {
        println!("Validator {:<10} {:?}", install.collection, install.outcome);
    }
    println!(
        "Baseline indexes: {} created, {} existing",
        report.baseline_indexes.created.len(),
        report.baseline_indexes.existing.len()
    );
    println!(
        "Cleanup: {} duplicate groups, {} documents removed",
        report.dedup.duplicate_groups, report.dedup.removed
    );
    print_migration(&report.migration);
    println!(
        "Query indexes: {} created, {} existing",
        report.query_indexes.created.len(),
        report.query_indexes.existing.len()
    );
    println!(
        "Finished in {} ms",
        (report.finished_at - report.started_at).num_milliseconds()
    );
}
