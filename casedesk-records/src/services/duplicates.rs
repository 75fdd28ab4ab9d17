//! Duplicate detection and merge
//!
//! Detection keys every record by (provider, patient name, adjuster number);
//! a record with N adjuster numbers lands under N keys. Merge copies the
//! duplicates' comments into the primary with provenance, renumbers the
//! primary's timeline chronologically and deletes the duplicates, all in one
//! transaction.

use casedesk_common::{time, Error, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::info;
use uuid::Uuid;

use super::{parse_id, parse_ids};
use crate::db::records::DuplicateKeys;
use crate::db::{begin_write, comments, records};
use crate::models::{Comment, MergeReport, Record, SourceRecordSnapshot};

fn norm(value: &str) -> String {
    value.trim().to_lowercase()
}

fn adj_set(record: &Record) -> HashSet<String> {
    record
        .fields
        .adj_values()
        .iter()
        .map(|v| norm(v))
        .collect()
}

/// Ids of every record that shares a (provider, patient, adjuster number)
/// key with at least one other record
pub fn duplicate_ids(keys: &[DuplicateKeys]) -> BTreeSet<Uuid> {
    let mut groups: HashMap<(String, String, String), BTreeSet<Uuid>> = HashMap::new();
    for record in keys {
        let provider = norm(&record.provider);
        let pt_name = norm(&record.pt_name);
        if provider.is_empty() || pt_name.is_empty() {
            continue;
        }
        for adj in &record.adj_number {
            let adj = adj.value.trim();
            if adj.is_empty() {
                continue;
            }
            groups
                .entry((provider.clone(), pt_name.clone(), adj.to_string()))
                .or_default()
                .insert(record.id);
        }
    }

    groups
        .into_values()
        .filter(|ids| ids.len() > 1)
        .flatten()
        .collect()
}

/// Guard against merging records that only collided in detection
pub fn check_mergeable(primary: &Record, duplicate: &Record) -> Result<()> {
    if norm(&primary.fields.provider) != norm(&duplicate.fields.provider)
        || norm(&primary.fields.pt_name) != norm(&duplicate.fields.pt_name)
    {
        return Err(Error::InvalidArgument(format!(
            "Record {} does not match the primary's provider and patient name",
            duplicate.id
        )));
    }

    let primary_adj = adj_set(primary);
    if !primary_adj.is_empty() && adj_set(duplicate).is_disjoint(&primary_adj) {
        return Err(Error::InvalidArgument(format!(
            "Record {} shares no adjuster number with the primary",
            duplicate.id
        )));
    }

    Ok(())
}

fn snapshot_of(record: &Record) -> SourceRecordSnapshot {
    SourceRecordSnapshot {
        provider: record.fields.provider.clone(),
        pt_name: record.fields.pt_name.clone(),
        adj_numbers: record.fields.adj_values(),
        record_created_at: record.record_created_at,
        assigned_collector: record.assigned_collector.clone(),
    }
}

/// Copies of the duplicates' comments not yet merged into the primary
pub fn plan_merged_comments(
    primary: &Record,
    duplicates: &[Record],
    merged_at: DateTime<Utc>,
) -> Vec<Comment> {
    let already_merged: HashSet<(Uuid, Uuid)> =
        primary.comments.iter().filter_map(Comment::merge_key).collect();

    let mut planned = Vec::new();
    for duplicate in duplicates {
        let snapshot = snapshot_of(duplicate);
        for original in &duplicate.comments {
            if already_merged.contains(&(duplicate.id, original.id)) {
                continue;
            }
            planned.push(Comment {
                id: Uuid::new_v4(),
                is_from_merged_record: true,
                source_record_id: Some(duplicate.id),
                source_comment_id: Some(original.id),
                source_record_snapshot: Some(snapshot.clone()),
                merged_at: Some(merged_at),
                ..original.clone()
            });
        }
    }
    planned
}

#[derive(Clone)]
pub struct DuplicateEngine {
    db: SqlitePool,
}

impl DuplicateEngine {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Every record in a duplicate cluster, sorted by provider then patient
    pub async fn find_duplicates(&self) -> Result<Vec<Record>> {
        let mut conn = self.db.acquire().await?;
        let keys = records::duplicate_keys(&mut conn).await?;
        let scanned = keys.len();

        let wanted: Vec<Uuid> = duplicate_ids(&keys).into_iter().collect();
        let mut found = records::load_records(&mut conn, &wanted).await?;
        found.sort_by(|a, b| {
            a.fields
                .provider
                .cmp(&b.fields.provider)
                .then_with(|| a.fields.pt_name.cmp(&b.fields.pt_name))
        });

        info!(scanned, cluster_records = found.len(), "Duplicate scan complete");
        Ok(found)
    }

    /// Merge the selected duplicates into the primary record
    pub async fn merge_selected<S: AsRef<str>>(
        &self,
        primary_id: &str,
        duplicate_ids: &[S],
    ) -> Result<MergeReport> {
        let primary_id = parse_id(primary_id, "primary record")?;
        if duplicate_ids.is_empty() {
            return Err(Error::InvalidArgument(
                "duplicateIds must be a non-empty list".to_string(),
            ));
        }

        let mut dup_ids: Vec<Uuid> = Vec::with_capacity(duplicate_ids.len());
        for id in parse_ids(duplicate_ids, "duplicate record")? {
            if id == primary_id {
                return Err(Error::InvalidArgument(
                    "primaryId must not be included in duplicateIds".to_string(),
                ));
            }
            if !dup_ids.contains(&id) {
                dup_ids.push(id);
            }
        }

        let mut tx = begin_write(&self.db).await?;

        let primary = records::load_record(&mut tx, primary_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Primary record not found: {}", primary_id)))?;
        let duplicates = records::load_records(&mut tx, &dup_ids).await?;
        if duplicates.len() != dup_ids.len() {
            let found: HashSet<Uuid> = duplicates.iter().map(|r| r.id).collect();
            let missing: Vec<String> = dup_ids
                .iter()
                .filter(|id| !found.contains(id))
                .map(Uuid::to_string)
                .collect();
            return Err(Error::NotFound(format!(
                "Duplicate records not found: {}",
                missing.join(", ")
            )));
        }

        for duplicate in &duplicates {
            check_mergeable(&primary, duplicate)?;
        }

        let now = time::now();
        let planned = plan_merged_comments(&primary, &duplicates, now);

        if !planned.is_empty() {
            let mut position = comments::front_position(&mut tx, primary_id).await?;
            for comment in &planned {
                comments::insert_comment(&mut tx, primary_id, position, comment).await?;
                position -= 1;
            }
            comments::renumber_chronologically(&mut tx, primary_id).await?;
            records::touch(&mut tx, primary_id, now).await?;
        }

        let deleted_duplicates = records::delete_records(&mut tx, &dup_ids).await?;
        tx.commit().await?;

        let report = MergeReport {
            primary_id,
            merged_records: dup_ids.len(),
            merged_comments: planned.len(),
            deleted_duplicates,
        };

        info!(
            primary_id = %primary_id,
            merged_records = report.merged_records,
            merged_comments = report.merged_comments,
            deleted = report.deleted_duplicates,
            "Merged duplicates"
        );

        Ok(report)
    }
}
