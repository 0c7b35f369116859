//! Bootstrap runbook
//!
//! Runs the setup steps in their fixed order against one store:
//!
//! 1. Import raw extracts (optional, only when an import directory is set)
//! 2. Install validators on the destination collections
//! 3. Build the baseline index plan
//! 4. Remove duplicates from the cleanup collection
//! 5. Migrate raw extracts to the destination collections (guarded)
//! 6. Build the query-optimized index plan
//!
//! The first failing step aborts the run. Each step is a public function of
//! its own module and can be run separately.

use crate::config::TomlConfig;
use crate::db::dedup::{deduplicate, DedupReport};
use crate::db::indexes::{ensure_indexes, IndexBuildReport, IndexPlan};
use crate::db::schemas::{install_all_validators, ValidatorInstall};
use crate::db::store::DocumentStore;
use crate::etl::{run_migration, MigrationOutcome};
use crate::import::{import_raw_directory, ImportReport};
use crate::Result;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::info;

/// Settings of one bootstrap run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
    /// Load raw extracts from this directory before anything else
    pub import_dir: Option<PathBuf>,
    pub guard_collection: String,
    pub cleanup_collection: String,
    pub cleanup_key: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self::from_toml(&TomlConfig::default())
    }
}

impl BootstrapConfig {
    pub fn from_toml(toml: &TomlConfig) -> Self {
        Self {
            import_dir: toml.import_dir.clone(),
            guard_collection: toml.migration.guard_collection.clone(),
            cleanup_collection: toml.cleanup.collection.clone(),
            cleanup_key: toml.cleanup.key.clone(),
        }
    }
}

/// What a bootstrap run did
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub import: Option<ImportReport>,
    pub validators: Vec<ValidatorInstall>,
    pub baseline_indexes: IndexBuildReport,
    pub dedup: DedupReport,
    pub migration: MigrationOutcome,
    pub query_indexes: IndexBuildReport,
}

/// Run every step in order
pub async fn run_bootstrap(
    store: &DocumentStore,
    config: &BootstrapConfig,
) -> Result<BootstrapReport> {
    let started_at = Utc::now();
    info!("Starting bootstrap");

    let import = match &config.import_dir {
        Some(dir) => Some(import_raw_directory(store, dir).await?),
        None => None,
    };

    let validators = install_all_validators(store).await?;
    let baseline_indexes = ensure_indexes(store, IndexPlan::Baseline).await?;
    let dedup = deduplicate(store, &config.cleanup_collection, &config.cleanup_key).await?;
    let migration = run_migration(store, &config.guard_collection).await?;
    let query_indexes = ensure_indexes(store, IndexPlan::QueryOptimized).await?;

    let finished_at = Utc::now();
    info!(
        "Bootstrap complete in {} ms",
        (finished_at - started_at).num_milliseconds()
    );

    Ok(BootstrapReport {
        started_at,
        finished_at,
        import,
        validators,
        baseline_indexes,
        dedup,
        migration,
        query_indexes,
    })
}
