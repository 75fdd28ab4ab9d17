//! Record creation, field updates and bulk deletion

use casedesk_common::{time, Actor, Error, Result};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use super::assignment::{resolve_collector, CollectorTarget};
use super::reference_id::next_reference_id;
use super::{parse_id, parse_ids};
use crate::db::records::{self, InsertRecord};
use crate::db::{begin_write, history};
use crate::models::{derive_outstanding, DeleteReport, Record, RecordFields, RecordPatch};

#[derive(Clone)]
pub struct RecordWriter {
    db: SqlitePool,
}

impl RecordWriter {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create a record, optionally pre-assigned to a collector.
    ///
    /// A reference id collision triggers one redraw before failing with
    /// [`Error::Conflict`].
    pub async fn create(
        &self,
        fields: RecordFields,
        assigned_collector: Option<&str>,
        actor: Option<&Actor>,
    ) -> Result<Record> {
        let fields = normalize_new_fields(fields)?;
        let target = match assigned_collector {
            Some(value) => resolve_collector(&mut *self.db.acquire().await?, value).await?,
            None => CollectorTarget::Unassigned,
        };
        let assigned_by = actor.map(|a| a.user_id);

        let mut attempt = 0;
        let id = loop {
            attempt += 1;
            match self.insert_new(&fields, target, assigned_by).await {
                Ok(id) => break id,
                Err(e) if e.is_unique_violation() && attempt < 2 => {
                    warn!(error = %e, "Reference id collision, drawing a fresh id");
                }
                Err(e) if e.is_unique_violation() => {
                    return Err(Error::Conflict(format!(
                        "Could not allocate a unique reference id: {}",
                        e
                    )));
                }
                Err(e) => return Err(e),
            }
        };

        let record = records::load_record(&mut *self.db.acquire().await?, id)
            .await?
            .ok_or_else(|| Error::Internal(format!("Created record vanished: {}", id)))?;

        info!(
            record_id = %record.id,
            reference_id = %record.reference_id,
            collector = ?target.collector_id(),
            "Created record"
        );

        Ok(record)
    }

    async fn insert_new(
        &self,
        fields: &RecordFields,
        target: CollectorTarget,
        assigned_by: Option<Uuid>,
    ) -> Result<Uuid> {
        // Drawn outside the insert transaction so a failed insert still
        // advances the counter
        let reference_id = next_reference_id(&mut *self.db.acquire().await?).await?;

        let id = Uuid::new_v4();
        let now = time::now();
        let collector = target.collector_id();

        let mut tx = begin_write(&self.db).await?;
        records::insert_record(
            &mut tx,
            &InsertRecord {
                id,
                reference_id: &reference_id,
                fields,
                assigned_collector: collector,
                assigned_by,
                created_at: now,
            },
        )
        .await?;

        if collector.is_some() {
            history::append_history(&mut tx, id, None, collector, assigned_by, now).await?;
        }
        tx.commit().await?;

        Ok(id)
    }

    /// Apply a typed patch
    pub async fn update(&self, id: &str, patch: RecordPatch, actor: &Actor) -> Result<Record> {
        let id = parse_id(id, "record")?;

        let mut tx = begin_write(&self.db).await?;
        let current = records::load_record(&mut tx, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Record not found: {}", id)))?;

        if let Some(provider) = patch.provider.as_deref() {
            if provider.trim() != current.fields.provider.trim() && !actor.role.is_admin() {
                return Err(Error::Forbidden(
                    "Only admins may change a record's provider".to_string(),
                ));
            }
            if provider.trim().is_empty() {
                return Err(Error::InvalidArgument("provider must not be empty".to_string()));
            }
        }
        if matches!(patch.pt_name.as_deref(), Some(name) if name.trim().is_empty()) {
            return Err(Error::InvalidArgument("ptName must not be empty".to_string()));
        }

        let touches_billing = patch.touches_billing();
        let mut fields = current.fields;
        patch.apply_to(&mut fields);
        fields.provider = fields.provider.trim().to_string();
        fields.pt_name = fields.pt_name.trim().to_string();

        records::update_fields(&mut tx, id, &fields, time::now()).await?;
        let record = records::load_record(&mut tx, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Record not found: {}", id)))?;
        tx.commit().await?;

        info!(
            record_id = %id,
            actor = %actor.user_id,
            billing = touches_billing,
            "Updated record"
        );

        Ok(record)
    }

    /// Delete records by id; any malformed id rejects the whole batch
    pub async fn delete_many<S: AsRef<str>>(&self, ids: &[S]) -> Result<DeleteReport> {
        if ids.is_empty() {
            return Err(Error::InvalidArgument("No record ids provided".to_string()));
        }
        let ids = parse_ids(ids, "record")?;

        let mut tx = begin_write(&self.db).await?;
        let deleted_count = records::delete_records(&mut tx, &ids).await?;
        tx.commit().await?;

        info!(requested = ids.len(), deleted_count, "Deleted records");

        Ok(DeleteReport { deleted_count })
    }
}

/// Trim names, require them, and fill `outstanding` from billing
fn normalize_new_fields(mut fields: RecordFields) -> Result<RecordFields> {
    fields.provider = fields.provider.trim().to_string();
    fields.pt_name = fields.pt_name.trim().to_string();

    if fields.provider.is_empty() {
        return Err(Error::InvalidArgument("provider is required".to_string()));
    }
    if fields.pt_name.is_empty() {
        return Err(Error::InvalidArgument("ptName is required".to_string()));
    }

    if let Some(outstanding) = derive_outstanding(fields.bill, fields.paid) {
        fields.outstanding = Some(outstanding);
    }

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_fields_require_names() {
        let err = normalize_new_fields(RecordFields::new("  ", "Pat")).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let err = normalize_new_fields(RecordFields::new("Clinic", "")).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_new_fields_derive_outstanding() {
        let mut fields = RecordFields::new(" Clinic ", "Pat");
        fields.bill = Some(1000.0);
        fields.paid = Some(400.0);
        fields.outstanding = Some(5.0);

        let fields = normalize_new_fields(fields).unwrap();
        assert_eq!(fields.provider, "Clinic");
        assert_eq!(fields.outstanding, Some(600.0));
    }
}
