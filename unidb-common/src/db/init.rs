//! Document store initialization
//!
//! Opens (or creates) the SQLite file backing the document store and makes
//! sure the catalog tables exist. Safe to call on every start.

use crate::db::store::DocumentStore;
use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open the document store at `db_path`, creating the file if needed
pub async fn open_store(db_path: &Path) -> Result<DocumentStore> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // The bootstrap is strictly sequential, one connection is enough
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new document store: {}", db_path.display());
    } else {
        info!("Opened existing document store: {}", db_path.display());
    }

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_catalog_tables(&pool).await?;

    Ok(DocumentStore::new(pool))
}

/// Open a private in-memory document store (tests, dry runs)
pub async fn open_in_memory() -> Result<DocumentStore> {
    // An in-memory database lives as long as its connection
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    create_catalog_tables(&pool).await?;

    Ok(DocumentStore::new(pool))
}

async fn create_catalog_tables(pool: &SqlitePool) -> Result<()> {
    create_collection_catalog_table(pool).await?;
    create_index_catalog_table(pool).await?;
    Ok(())
}

/// One row per collection, holding its validator settings
async fn create_collection_catalog_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collection_catalog (
            name TEXT PRIMARY KEY,
            validator TEXT,
            validation_level TEXT NOT NULL DEFAULT 'strict',
            validation_action TEXT NOT NULL DEFAULT 'error',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// One row per named secondary index
async fn create_index_catalog_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_catalog (
            collection TEXT NOT NULL,
            name TEXT NOT NULL,
            keys TEXT NOT NULL,
            is_unique INTEGER NOT NULL DEFAULT 0,
            background INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (collection, name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
