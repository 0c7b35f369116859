//! Duplicate cleanup
//!
//! Groups the documents of a collection by a nominally-unique business key
//! and keeps only the first-inserted document (smallest `_id`) of every
//! group. Collections without duplicates are left untouched, so the cleanup
//! can run any number of times.

use crate::db::path::group_key;
use crate::db::store::DocumentStore;
use crate::Result;
use std::collections::HashMap;
use tracing::{debug, info};

/// Outcome of a duplicate cleanup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupReport {
    /// Distinct key values seen
    pub groups_scanned: usize,
    /// Key values held by more than one document
    pub duplicate_groups: usize,
    /// Documents deleted
    pub removed: u64,
}

/// Remove all but the first document of every `key_path` group
///
/// Documents missing the key are grouped together with explicit nulls.
pub async fn deduplicate(
    store: &DocumentStore,
    collection: &str,
    key_path: &str,
) -> Result<DedupReport> {
    info!(
        "=== Cleanup: removing duplicate '{}' values in '{}' ===",
        key_path, collection
    );

    let docs = store.find_all(collection).await?;

    // Documents arrive in _id order, so each group's first id is its smallest
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<i64>> = HashMap::new();
    for doc in &docs {
        let key = group_key(doc.get(key_path));
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(doc.id);
    }

    let mut report = DedupReport {
        groups_scanned: groups.len(),
        ..DedupReport::default()
    };

    let mut doomed = Vec::new();
    for key in &order {
        let ids = &groups[key];
        if ids.len() > 1 {
            report.duplicate_groups += 1;
            debug!("  {} = {}: keeping _id {}, removing {}", key_path, key, ids[0], ids.len() - 1);
            doomed.extend_from_slice(&ids[1..]);
        }
    }

    report.removed = store.delete_by_ids(collection, &doomed).await?;

    info!(
        "=== Cleanup complete: {} duplicate groups, {} documents removed ===",
        report.duplicate_groups, report.removed
    );
    Ok(report)
}
