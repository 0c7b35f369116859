//! Secondary indexes
//!
//! Declarative index plans for the destination collections. Each index is
//! identified by `(collection, name)`; ensuring an index that already exists
//! with the same key specification is a no-op, so plans can be re-applied
//! any number of times.
//!
//! Indexes are SQLite expression indexes over `json_extract(body, '$.<path>')`
//! on the collection's backing table, named `<collection>__<name>`. Neither
//! part may contain `__`, so physical names never collide.
//!
//! Unique indexes map a missing or null key to an empty blob, a value
//! `json_extract` never returns: at most one document per unique index may
//! lack the key, as with the explicit-null grouping used by the cleanup.

use crate::db::path::{is_identifier, json_path};
use crate::db::store::{ensure_collection_on, table_for, DocumentStore};
use crate::etl::{COURSES, GRADES, STUDENTS};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::info;

/// One key of an index: a dotted field path and a sort direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexKey {
    pub path: String,
    /// 1 = ascending, -1 = descending
    pub direction: i8,
}

/// Named secondary index on one collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub collection: String,
    pub name: String,
    pub keys: Vec<IndexKey>,
    pub unique: bool,
    /// Recorded only; SQLite builds every index in the foreground
    pub background: bool,
}

impl IndexSpec {
    /// New index; built in background mode unless told otherwise
    pub fn new(collection: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            name: name.into(),
            keys: Vec::new(),
            unique: false,
            background: true,
        }
    }

    /// Add an ascending key
    pub fn asc(mut self, path: impl Into<String>) -> Self {
        self.keys.push(IndexKey {
            path: path.into(),
            direction: 1,
        });
        self
    }

    /// Add a descending key
    pub fn desc(mut self, path: impl Into<String>) -> Self {
        self.keys.push(IndexKey {
            path: path.into(),
            direction: -1,
        });
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Index name as seen by SQLite (index names are database-wide)
    pub fn physical_name(&self) -> String {
        format!("{}__{}", self.collection, self.name)
    }

    fn same_definition(&self, keys: &[IndexKey], unique: bool) -> bool {
        self.keys == keys && self.unique == unique
    }

    fn create_sql(&self) -> Result<String> {
        if !is_identifier(&self.name) || self.name.contains("__") {
            return Err(Error::InvalidInput(format!("invalid index name '{}'", self.name)));
        }
        if self.collection.contains("__") {
            return Err(Error::InvalidInput(format!(
                "collection name '{}' cannot carry indexes",
                self.collection
            )));
        }
        if self.keys.is_empty() {
            return Err(Error::InvalidInput(format!("index '{}' has no keys", self.name)));
        }

        let columns = self
            .keys
            .iter()
            .map(|key| {
                let order = if key.direction < 0 { "DESC" } else { "ASC" };
                let extract = format!("json_extract(body, '{}')", json_path(&key.path)?);
                if self.unique {
                    Ok(format!("IFNULL({}, x'') {}", extract, order))
                } else {
                    Ok(format!("{} {}", extract, order))
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(format!(
            "CREATE {}INDEX IF NOT EXISTS \"{}\" ON {} ({})",
            if self.unique { "UNIQUE " } else { "" },
            self.physical_name(),
            table_for(&self.collection)?,
            columns.join(", ")
        ))
    }
}

/// Whether ensuring an index changed anything
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    Created,
    AlreadyExists,
    /// An index with another name already has this key pattern and
    /// uniqueness; nothing was created
    CoveredBy(String),
}

/// Index as recorded in the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub name: String,
    pub keys: Vec<IndexKey>,
    pub unique: bool,
    pub background: bool,
}

/// Ensure one index exists with exactly this specification
///
/// - same name, same keys and uniqueness: no-op
/// - same name, different definition: [`Error::IndexConflict`]
/// - other name, same keys and uniqueness: [`IndexOutcome::CoveredBy`]
/// - other name, same keys, different uniqueness: [`Error::IndexConflict`]
///
/// Creates the collection if it does not exist yet. A unique index over
/// existing duplicate keys fails with the store's constraint error.
pub async fn ensure_index(store: &DocumentStore, spec: &IndexSpec) -> Result<IndexOutcome> {
    let sql = spec.create_sql()?;
    let mut tx = store.pool().begin().await?;

    ensure_collection_on(&mut tx, &spec.collection).await?;

    let existing: Vec<(String, String, bool)> = sqlx::query_as(
        "SELECT name, keys, is_unique FROM index_catalog WHERE collection = ?",
    )
    .bind(&spec.collection)
    .fetch_all(&mut *tx)
    .await?;

    for (name, keys, unique) in existing {
        let keys: Vec<IndexKey> = serde_json::from_str(&keys)?;

        if name == spec.name {
            if spec.same_definition(&keys, unique) {
                info!("  Index '{}' ({}) already exists", spec.name, spec.collection);
                return Ok(IndexOutcome::AlreadyExists);
            }
            return Err(Error::IndexConflict {
                collection: spec.collection.clone(),
                message: format!(
                    "index '{}' already exists with a different key specification",
                    spec.name
                ),
            });
        }

        if keys == spec.keys {
            if unique == spec.unique {
                info!(
                    "  Index '{}' ({}) covered by existing index '{}'",
                    spec.name, spec.collection, name
                );
                return Ok(IndexOutcome::CoveredBy(name));
            }
            return Err(Error::IndexConflict {
                collection: spec.collection.clone(),
                message: format!(
                    "index '{}' has the same key pattern as existing index '{}' with different uniqueness",
                    spec.name, name
                ),
            });
        }
    }

    sqlx::query(&sql).execute(&mut *tx).await?;
    sqlx::query(
        r#"
        INSERT INTO index_catalog (collection, name, keys, is_unique, background)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&spec.collection)
    .bind(&spec.name)
    .bind(serde_json::to_string(&spec.keys)?)
    .bind(spec.unique)
    .bind(spec.background)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    info!(
        "  ✓ Index '{}' ({}{}) created",
        spec.name,
        spec.collection,
        if spec.unique { ", unique" } else { "" }
    );
    Ok(IndexOutcome::Created)
}

/// Indexes of a collection, ordered by name
pub async fn list_indexes(store: &DocumentStore, collection: &str) -> Result<Vec<IndexInfo>> {
    let rows: Vec<(String, String, bool, bool)> = sqlx::query_as(
        "SELECT name, keys, is_unique, background FROM index_catalog WHERE collection = ? ORDER BY name ASC",
    )
    .bind(collection)
    .fetch_all(store.pool())
    .await?;

    rows.into_iter()
        .map(|(name, keys, unique, background)| -> Result<IndexInfo> {
            Ok(IndexInfo {
                name,
                keys: serde_json::from_str(&keys)?,
                unique,
                background,
            })
        })
        .collect()
}

/// Fixed sets of indexes applied around the migration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPlan {
    /// Identity and reporting indexes, built before the migration
    Baseline,
    /// Access-pattern indexes, built after the migration
    QueryOptimized,
}

impl IndexPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexPlan::Baseline => "baseline",
            IndexPlan::QueryOptimized => "query-optimized",
        }
    }

    /// Index specifications of the plan
    pub fn specs(&self) -> Vec<IndexSpec> {
        match self {
            IndexPlan::Baseline => vec![
                IndexSpec::new(STUDENTS, "idx_students_id").asc("id_student").unique(),
                IndexSpec::new(STUDENTS, "idx_result_education")
                    .asc("final_result")
                    .asc("demographics.highest_education"),
                IndexSpec::new(GRADES, "idx_grades_student_id").asc("id_student"),
                IndexSpec::new(GRADES, "idx_module_type_score")
                    .asc("course_info.code_module")
                    .asc("assessment_info.type")
                    .desc("score"),
                IndexSpec::new(COURSES, "idx_course_unique")
                    .asc("code_module")
                    .asc("code_presentation")
                    .unique(),
            ],
            IndexPlan::QueryOptimized => vec![
                // A student looking up their own grades
                IndexSpec::new(GRADES, "idx_student_id").asc("id_student"),
                // All grades of one student within one course
                IndexSpec::new(GRADES, "idx_course_student")
                    .asc("course_info.code_module")
                    .asc("course_info.code_presentation")
                    .asc("id_student"),
                // Submission timeline per course
                IndexSpec::new(GRADES, "idx_course_date")
                    .asc("course_info.code_module")
                    .asc("course_info.code_presentation")
                    .asc("date_submitted"),
                // Best scores per assessment type
                IndexSpec::new(GRADES, "idx_type_score")
                    .asc("assessment_info.type")
                    .desc("score"),
                IndexSpec::new(STUDENTS, "idx_final_result").asc("final_result"),
                IndexSpec::new(STUDENTS, "idx_course_status")
                    .asc("code_module")
                    .asc("code_presentation")
                    .asc("final_result"),
                IndexSpec::new(COURSES, "idx_course_unique")
                    .asc("code_module")
                    .asc("code_presentation")
                    .unique(),
            ],
        }
    }
}

impl FromStr for IndexPlan {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "baseline" => Ok(IndexPlan::Baseline),
            "query-optimized" => Ok(IndexPlan::QueryOptimized),
            other => Err(Error::InvalidInput(format!("unknown index plan '{}'", other))),
        }
    }
}

/// Outcome of applying an index plan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexBuildReport {
    pub created: Vec<String>,
    pub existing: Vec<String>,
}

/// Apply every index of a plan
pub async fn ensure_indexes(store: &DocumentStore, plan: IndexPlan) -> Result<IndexBuildReport> {
    info!("=== Indexes: applying {} plan ===", plan.as_str());

    let mut report = IndexBuildReport::default();
    for spec in plan.specs() {
        let label = format!("{}.{}", spec.collection, spec.name);
        match ensure_index(store, &spec).await? {
            IndexOutcome::Created => report.created.push(label),
            IndexOutcome::AlreadyExists => report.existing.push(label),
            IndexOutcome::CoveredBy(name) => {
                report.existing.push(format!("{} (as {})", label, name))
            }
        }
    }

    info!(
        "=== Indexes complete: {} created, {} already present ===",
        report.created.len(),
        report.existing.len()
    );
    Ok(report)
}
