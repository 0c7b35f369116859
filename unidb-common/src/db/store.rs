//! Document store on SQLite
//!
//! Each collection is a table `coll_<name>` holding one JSON object per row.
//! The `_id` column is the internally-assigned identifier: it increases in
//! insertion order and is never reused, so "smallest `_id`" means "inserted
//! first". Collection metadata (validator, validation level/action) lives in
//! `collection_catalog`.
//!
//! Multi-statement operations run inside a single transaction, so a failed
//! write (validation error, unique index violation) leaves the collection
//! untouched.

use crate::db::path::{get_path, is_identifier};
use crate::db::validator::{CollectionOptions, ValidationAction};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

/// A document body (JSON object)
pub type Document = serde_json::Map<String, Value>;

/// A document together with its internal identifier
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: i64,
    pub body: Document,
}

impl StoredDocument {
    /// Look up a (dotted) field
    pub fn get(&self, path: &str) -> Option<&Value> {
        get_path(&self.body, path)
    }
}

/// Serialize a record into a document
pub fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidInput(format!(
            "expected a JSON object, found {}",
            other
        ))),
    }
}

/// Backing table for a collection
pub(crate) fn table_for(collection: &str) -> Result<String> {
    if is_identifier(collection) {
        Ok(format!("coll_{}", collection))
    } else {
        Err(Error::InvalidInput(format!(
            "invalid collection name '{}'",
            collection
        )))
    }
}

/// Handle to the document store
///
/// Passed explicitly to every bootstrap step.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    pool: SqlitePool,
}

impl DocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Check if a collection exists
    pub async fn collection_exists(&self, collection: &str) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        catalog_contains(&mut conn, collection).await
    }

    /// All collection names in alphabetical order
    pub async fn list_collections(&self) -> Result<Vec<String>> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT name FROM collection_catalog ORDER BY name ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(names)
    }

    /// Create a collection with the given validator settings
    ///
    /// Fails with [`Error::CollectionExists`] when the collection is already present.
    pub async fn create_collection(
        &self,
        collection: &str,
        options: CollectionOptions,
    ) -> Result<()> {
        let table = table_for(collection)?;
        let mut tx = self.pool.begin().await?;

        if catalog_contains(&mut tx, collection).await? {
            return Err(Error::CollectionExists(collection.to_string()));
        }

        create_backing_table(&mut tx, &table).await?;

        let validator = options
            .validator
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO collection_catalog (name, validator, validation_level, validation_action)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(collection)
        .bind(validator)
        .bind(options.validation_level.as_str())
        .bind(options.validation_action.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!("Created collection '{}'", collection);
        Ok(())
    }

    /// Replace the validator settings of an existing collection
    pub async fn modify_collection(
        &self,
        collection: &str,
        options: CollectionOptions,
    ) -> Result<()> {
        let validator = options
            .validator
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            r#"
            UPDATE collection_catalog
            SET validator = ?, validation_level = ?, validation_action = ?,
                updated_at = CURRENT_TIMESTAMP
            WHERE name = ?
            "#,
        )
        .bind(validator)
        .bind(options.validation_level.as_str())
        .bind(options.validation_action.as_str())
        .bind(collection)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::CollectionNotFound(collection.to_string()));
        }

        info!("Modified collection '{}'", collection);
        Ok(())
    }

    /// Validator settings of a collection (`None` if it does not exist)
    pub async fn collection_options(&self, collection: &str) -> Result<Option<CollectionOptions>> {
        let mut conn = self.pool.acquire().await?;
        load_options(&mut conn, collection).await
    }

    /// Number of documents; 0 for a missing collection
    pub async fn count_documents(&self, collection: &str) -> Result<u64> {
        let table = table_for(collection)?;
        let mut conn = self.pool.acquire().await?;

        if !catalog_contains(&mut conn, collection).await? {
            return Ok(0);
        }

        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&mut *conn)
            .await?;
        Ok(count as u64)
    }

    /// All documents in insertion order; empty for a missing collection
    pub async fn find_all(&self, collection: &str) -> Result<Vec<StoredDocument>> {
        let rows = self.fetch_bodies(collection).await?;
        rows.into_iter()
            .map(|(id, body)| -> Result<StoredDocument> {
                Ok(StoredDocument {
                    id,
                    body: serde_json::from_str(&body)?,
                })
            })
            .collect()
    }

    /// All documents in insertion order, deserialized into `T`
    pub async fn find_all_as<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        let rows = self.fetch_bodies(collection).await?;
        rows.iter()
            .map(|(_, body)| serde_json::from_str(body).map_err(Error::from))
            .collect()
    }

    async fn fetch_bodies(&self, collection: &str) -> Result<Vec<(i64, String)>> {
        let table = table_for(collection)?;
        let mut conn = self.pool.acquire().await?;

        if !catalog_contains(&mut conn, collection).await? {
            return Ok(Vec::new());
        }

        let rows: Vec<(i64, String)> =
            sqlx::query_as(&format!("SELECT _id, body FROM {} ORDER BY _id ASC", table))
                .fetch_all(&mut *conn)
                .await?;
        Ok(rows)
    }

    /// Insert documents, creating the collection if needed
    ///
    /// All-or-nothing: a rejected document aborts the whole batch.
    pub async fn insert_many(&self, collection: &str, docs: &[Document]) -> Result<u64> {
        let table = table_for(collection)?;
        let mut tx = self.pool.begin().await?;

        ensure_collection_on(&mut tx, collection).await?;
        let options = load_options(&mut tx, collection)
            .await?
            .unwrap_or_default();
        let written = write_documents(&mut tx, collection, &table, &options, docs).await?;

        tx.commit().await?;
        Ok(written)
    }

    /// Delete documents by internal identifier; returns the number removed
    pub async fn delete_by_ids(&self, collection: &str, ids: &[i64]) -> Result<u64> {
        let table = table_for(collection)?;
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        if !catalog_contains(&mut tx, collection).await? {
            return Ok(0);
        }

        let sql = format!("DELETE FROM {} WHERE _id = ?", table);
        let mut removed = 0;
        for id in ids {
            removed += sqlx::query(&sql)
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        tx.commit().await?;
        Ok(removed)
    }

    /// Drop a collection with its documents, validator and indexes
    ///
    /// Returns `false` when there was nothing to drop.
    pub async fn drop_collection(&self, collection: &str) -> Result<bool> {
        let table = table_for(collection)?;
        let mut tx = self.pool.begin().await?;

        if !catalog_contains(&mut tx, collection).await? {
            return Ok(false);
        }

        // Dropping the table also drops its SQLite indexes
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM index_catalog WHERE collection = ?")
            .bind(collection)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM collection_catalog WHERE name = ?")
            .bind(collection)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!("Dropped collection '{}'", collection);
        Ok(true)
    }

    /// Atomically replace the full contents of a collection
    ///
    /// Creates the collection if needed. Existing validator and indexes are
    /// kept and apply to the new documents; on any failure the previous
    /// contents remain.
    pub async fn replace_contents(&self, collection: &str, docs: &[Document]) -> Result<u64> {
        let table = table_for(collection)?;
        let mut tx = self.pool.begin().await?;

        ensure_collection_on(&mut tx, collection).await?;
        let options = load_options(&mut tx, collection)
            .await?
            .unwrap_or_default();

        let cleared = sqlx::query(&format!("DELETE FROM {}", table))
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let written = write_documents(&mut tx, collection, &table, &options, docs).await?;

        tx.commit().await?;
        debug!(
            "Replaced contents of '{}': {} removed, {} written",
            collection, cleared, written
        );
        Ok(written)
    }
}

async fn catalog_contains(conn: &mut SqliteConnection, collection: &str) -> Result<bool> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM collection_catalog WHERE name = ?)")
            .bind(collection)
            .fetch_one(&mut *conn)
            .await?;
    Ok(exists)
}

async fn create_backing_table(conn: &mut SqliteConnection, table: &str) -> Result<()> {
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {} (_id INTEGER PRIMARY KEY AUTOINCREMENT, body TEXT NOT NULL)",
        table
    ))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Create a collection without a validator unless it already exists
///
/// Returns `true` if the collection was created.
pub(crate) async fn ensure_collection_on(
    conn: &mut SqliteConnection,
    collection: &str,
) -> Result<bool> {
    let table = table_for(collection)?;
    if catalog_contains(conn, collection).await? {
        return Ok(false);
    }

    create_backing_table(conn, &table).await?;
    sqlx::query("INSERT INTO collection_catalog (name) VALUES (?)")
        .bind(collection)
        .execute(&mut *conn)
        .await?;

    debug!("Implicitly created collection '{}'", collection);
    Ok(true)
}

async fn load_options(
    conn: &mut SqliteConnection,
    collection: &str,
) -> Result<Option<CollectionOptions>> {
    let row: Option<(Option<String>, String, String)> = sqlx::query_as(
        "SELECT validator, validation_level, validation_action FROM collection_catalog WHERE name = ?",
    )
    .bind(collection)
    .fetch_optional(&mut *conn)
    .await?;

    let Some((validator, level, action)) = row else {
        return Ok(None);
    };

    Ok(Some(CollectionOptions {
        validator: validator
            .map(|v| serde_json::from_str(&v))
            .transpose()?,
        validation_level: level.parse()?,
        validation_action: action.parse()?,
    }))
}

async fn write_documents(
    conn: &mut SqliteConnection,
    collection: &str,
    table: &str,
    options: &CollectionOptions,
    docs: &[Document],
) -> Result<u64> {
    let sql = format!("INSERT INTO {} (body) VALUES (?)", table);
    let mut written = 0;

    for doc in docs {
        let violations = options.violations(doc);
        if !violations.is_empty() {
            match options.validation_action {
                ValidationAction::Error => {
                    return Err(Error::DocumentValidation {
                        collection: collection.to_string(),
                        reasons: violations,
                    });
                }
                ValidationAction::Warn => {
                    warn!(
                        "Document failed validation for '{}' (accepted): {}",
                        collection,
                        violations.join("; ")
                    );
                }
            }
        }

        sqlx::query(&sql)
            .bind(serde_json::to_string(doc)?)
            .execute(&mut *conn)
            .await?;
        written += 1;
    }

    Ok(written)
}
