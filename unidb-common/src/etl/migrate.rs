//! One-shot migration from the raw extracts to the destination collections
//!
//! Guarded by a collection count: when the guard collection (`grades` by
//! default) already holds documents the migration is treated as done and
//! nothing is written. Otherwise every destination is dropped and rebuilt
//! from the raw extracts.
//!
//! The students extract holds one row per registration. Right after
//! `students` is rebuilt, repeat registrations are removed so that every
//! `id_student` appears once (the first registration written is kept).
//!
//! Dropping a destination also discards its validator and indexes, so the
//! rebuilt collections are unvalidated until validators are installed
//! again. Sentinel values (`-1` scores and dates) are written under those
//! conditions; run an audit to see which documents the validators reject.

use crate::db::dedup::{deduplicate, DedupReport};
use crate::db::store::DocumentStore;
use crate::etl::pipeline::{self, StageReport};
use crate::etl::{COURSES, GRADES, STUDENTS, STUDENT_KEY};
use crate::Result;
use tracing::info;

/// Guard collection used when none is configured
pub const DEFAULT_GUARD_COLLECTION: &str = GRADES;

/// Per-destination counts of a completed migration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub courses: StageReport,
    pub students: StageReport,
    /// Repeat registrations removed from `students`
    pub student_cleanup: DedupReport,
    pub grades: StageReport,
}

/// Result of [`run_migration`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Guard collection was non-empty; no writes were made
    Skipped {
        guard_collection: String,
        existing: u64,
    },
    Completed(MigrationReport),
}

impl MigrationOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, MigrationOutcome::Skipped { .. })
    }
}

/// Run the migration unless `guard_collection` already holds documents
pub async fn run_migration(
    store: &DocumentStore,
    guard_collection: &str,
) -> Result<MigrationOutcome> {
    let existing = store.count_documents(guard_collection).await?;
    if existing > 0 {
        info!(
            "'{}' already holds {} documents, skipping migration",
            guard_collection, existing
        );
        return Ok(MigrationOutcome::Skipped {
            guard_collection: guard_collection.to_string(),
            existing,
        });
    }

    info!("=== Migration: raw extracts -> destination collections ===");

    info!("=== Phase 1: courses ===");
    store.drop_collection(COURSES).await?;
    let courses = pipeline::build_courses(store).await?;
    info!(
        "  ✓ courses: {} written ({} nested assessments dropped)",
        courses.written, courses.dropped
    );

    info!("=== Phase 2: students ===");
    store.drop_collection(STUDENTS).await?;
    let students = pipeline::build_students(store).await?;
    info!(
        "  ✓ students: {} of {} written ({} dropped)",
        students.written, students.read, students.dropped
    );
    let student_cleanup = deduplicate(store, STUDENTS, STUDENT_KEY).await?;

    info!("=== Phase 3: grades ===");
    store.drop_collection(GRADES).await?;
    let grades = pipeline::build_grades(store).await?;
    info!(
        "  ✓ grades: {} written from {} submissions ({} dropped)",
        grades.written, grades.read, grades.dropped
    );

    info!("=== Migration complete ===");
    Ok(MigrationOutcome::Completed(MigrationReport {
        courses,
        students,
        student_cleanup,
        grades,
    }))
}
