//! Record list and lookup queries
//!
//! Role scoping comes from [`VisibilityPolicy`]; this module adds the
//! caller's own filters (collector, search, dashboard category) on top and
//! paginates.

use casedesk_common::time::{business_end_of_day, business_to_utc, parse_calendar_date};
use casedesk_common::{Actor, Error, Result, Role};
use chrono::{DateTime, NaiveTime, Utc};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

use super::assignment::UNASSIGNED;
use super::parse_id;
use super::visibility::{can_view, redact_for_role, VisibilityPolicy};
use crate::db::records::{self, fetch_ids};
use crate::models::{AssignmentSummaryEntry, Page, Record, RecordListItem};
use crate::pagination::{calculate_pagination, clamp_limit};

/// Collector dashboard tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Records the pinned collector has commented on
    History,
    /// Records the pinned collector has not commented on yet
    Active,
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "history" => Ok(Category::History),
            "active" => Ok(Category::Active),
            other => Err(Error::InvalidArgument(format!("Unknown category: {}", other))),
        }
    }
}

/// List parameters as received from the caller
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub collector_id: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CollectorFilter {
    Any,
    Unassigned,
    Collector(Uuid),
}

/// Fully resolved WHERE clause of a list query
#[derive(Debug, Clone)]
struct ListFilters {
    policy: VisibilityPolicy,
    collector: CollectorFilter,
    search: Option<String>,
    category: Option<Category>,
}

impl ListFilters {
    fn resolve(actor: &Actor, query: &ListQuery) -> Result<Self> {
        let requested = query
            .collector_id
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty());

        let collector = match actor.role {
            Role::Collector => {
                if matches!(requested, Some(v) if v.eq_ignore_ascii_case(UNASSIGNED)) {
                    return Err(Error::InvalidArgument(
                        "Collectors cannot view unassigned records".to_string(),
                    ));
                }
                CollectorFilter::Collector(actor.user_id)
            }
            Role::PaymentRedeemer => CollectorFilter::Any,
            _ => match requested {
                None => CollectorFilter::Any,
                Some(v) if v.eq_ignore_ascii_case(UNASSIGNED) => CollectorFilter::Unassigned,
                Some(v) => CollectorFilter::Collector(parse_id(v, "collector")?),
            },
        };

        let category = query
            .category
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .map(Category::from_str)
            .transpose()?;

        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Self {
            policy: VisibilityPolicy::for_listing(actor),
            collector,
            search,
            category,
        })
    }

    fn pinned_collector(&self) -> Option<Uuid> {
        match self.collector {
            CollectorFilter::Collector(id) => Some(id),
            _ => None,
        }
    }

    fn push_where(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        builder.push(" WHERE ");
        self.policy.push_sql(builder);

        match self.collector {
            CollectorFilter::Any => {}
            CollectorFilter::Unassigned => {
                builder.push(" AND records.assigned_collector IS NULL");
            }
            CollectorFilter::Collector(id) => {
                builder
                    .push(" AND records.assigned_collector = ")
                    .push_bind(id.to_string());
            }
        }

        if let Some(search) = &self.search {
            let pattern = format!("%{}%", escape_like(search));
            builder.push(" AND (records.provider LIKE ");
            builder.push_bind(pattern.clone()).push(" ESCAPE '\\'");
            builder.push(" OR records.pt_name LIKE ");
            builder.push_bind(pattern.clone()).push(" ESCAPE '\\'");
            builder.push(
                " OR EXISTS (SELECT 1 FROM json_each(records.adj_number) adj \
                 WHERE json_extract(adj.value, '$.value') LIKE ",
            );
            builder.push_bind(pattern.clone()).push(" ESCAPE '\\')");
            builder.push(" OR records.lien_status LIKE ");
            builder.push_bind(pattern.clone()).push(" ESCAPE '\\'");
            builder.push(" OR records.case_status LIKE ");
            builder.push_bind(pattern.clone()).push(" ESCAPE '\\'");
            builder.push(
                " OR EXISTS (SELECT 1 FROM record_comments sc \
                 WHERE sc.record_id = records.id AND sc.status LIKE ",
            );
            builder.push_bind(pattern.clone()).push(" ESCAPE '\\')");
            builder.push(" OR records.reference_id LIKE ");
            builder.push_bind(pattern).push(" ESCAPE '\\')");
        }

        if let (Some(category), Some(collector)) = (self.category, self.pinned_collector()) {
            let exists = match category {
                Category::History => " AND EXISTS",
                Category::Active => " AND NOT EXISTS",
            };
            builder
                .push(exists)
                .push(" (SELECT 1 FROM record_comments ac WHERE ac.record_id = records.id AND ac.author = ")
                .push_bind(collector.to_string())
                .push(")");
        }
    }
}

/// Escape `%`, `_` and the escape character itself for a LIKE pattern
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Window start: a bare date means Pacific midnight
pub fn window_start(value: &str) -> Result<DateTime<Utc>> {
    parse_window_bound(value, |date| business_to_utc(date, NaiveTime::MIN))
}

/// Window end: a bare date means the end of that Pacific day
pub fn window_end(value: &str) -> Result<DateTime<Utc>> {
    parse_window_bound(value, business_end_of_day)
}

fn parse_window_bound(
    value: &str,
    from_date: impl Fn(chrono::NaiveDate) -> DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(instant.with_timezone(&Utc));
    }
    parse_calendar_date(trimmed).map(from_date)
}

#[derive(Clone)]
pub struct RecordQuery {
    db: SqlitePool,
}

impl RecordQuery {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Role-scoped, filtered, newest-first page of records
    pub async fn find_all(&self, actor: &Actor, query: &ListQuery) -> Result<Page<RecordListItem>> {
        let filters = ListFilters::resolve(actor, query)?;
        let limit = clamp_limit(query.limit);

        let mut conn = self.db.acquire().await?;

        let mut count: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM records");
        filters.push_where(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

        let pagination = calculate_pagination(total, query.page.unwrap_or(1), limit);

        let mut select: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT records.id FROM records");
        filters.push_where(&mut select);
        select
            .push(" ORDER BY records.created_at DESC, records.rowid DESC LIMIT ")
            .push_bind(pagination.limit)
            .push(" OFFSET ")
            .push_bind(pagination.offset);
        let ids = fetch_ids(&mut conn, &mut select).await?;

        debug!(
            role = %actor.role,
            filters = ?filters,
            total,
            page = pagination.page,
            "Listed records"
        );

        let pinned = filters.pinned_collector();
        let want_last_comment = filters.category == Some(Category::History);

        let data = records::load_records(&mut conn, &ids)
            .await?
            .into_iter()
            .map(|mut record| {
                let last_comment_date = match (want_last_comment, pinned) {
                    (true, Some(collector)) => record
                        .comments
                        .iter()
                        .filter(|c| c.author.id == collector)
                        .map(|c| c.created_at)
                        .max(),
                    _ => None,
                };
                redact_for_role(&mut record, actor.role);
                RecordListItem {
                    record,
                    last_comment_date,
                }
            })
            .collect();

        Ok(Page {
            data,
            total,
            page: pagination.page,
            limit: pagination.limit,
        })
    }

    /// Unscoped lookup
    pub async fn find_by_id(&self, id: &str) -> Result<Record> {
        let id = parse_id(id, "record")?;
        records::load_record(&mut *self.db.acquire().await?, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Record not found: {}", id)))
    }

    /// Lookup honouring the actor's read access, with redaction applied
    pub async fn find_visible_by_id(&self, actor: &Actor, id: &str) -> Result<Record> {
        let mut record = self.find_by_id(id).await?;
        if !can_view(actor, &record) {
            return Err(Error::Forbidden(format!(
                "Record {} is not visible to this user",
                record.id
            )));
        }
        redact_for_role(&mut record, actor.role);
        Ok(record)
    }

    /// Distinct non-empty provider names, sorted
    pub async fn unique_providers(&self) -> Result<Vec<String>> {
        let providers: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT provider FROM records WHERE TRIM(provider) != '' ORDER BY provider",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(providers)
    }

    /// Assignment state of records whose current or any past assignment
    /// falls inside the window
    pub async fn assignment_summary(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<AssignmentSummaryEntry>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT records.id FROM records");

        if start.is_some() || end.is_some() {
            builder.push(" WHERE (");
            push_range(&mut builder, "records.assigned_at", start, end);
            builder.push(" OR EXISTS (SELECT 1 FROM assignment_history h WHERE h.record_id = records.id AND ");
            push_range(&mut builder, "h.assigned_at", start, end);
            builder.push("))");
        }
        builder.push(" ORDER BY records.created_at ASC, records.rowid ASC");

        let mut conn = self.db.acquire().await?;
        let ids = fetch_ids(&mut conn, &mut builder).await?;
        let records = records::load_records(&mut conn, &ids).await?;

        Ok(records
            .into_iter()
            .map(|record| AssignmentSummaryEntry {
                record_id: record.id,
                adj_number: record.fields.adj_values(),
                provider: record.fields.provider,
                pt_name: record.fields.pt_name,
                assigned_collector: record.assigned_collector,
                assigned_by: record.assigned_by,
                assigned_at: record.assigned_at,
                assignment_history: record.assignment_history,
            })
            .collect())
    }
}

fn push_range(
    builder: &mut QueryBuilder<'_, Sqlite>,
    column: &str,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) {
    builder.push("(").push(column).push(" IS NOT NULL");
    if let Some(start) = start {
        builder
            .push(" AND ")
            .push(column)
            .push(" >= ")
            .push_bind(casedesk_common::time::to_db(start));
    }
    if let Some(end) = end {
        builder
            .push(" AND ")
            .push(column)
            .push(" <= ")
            .push_bind(casedesk_common::time::to_db(end));
    }
    builder.push(")");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn actor(role: Role) -> Actor {
        Actor::new(Uuid::new_v4(), role, "someone")
    }

    #[test]
    fn test_collector_is_pinned_to_own_queue() {
        let collector = actor(Role::Collector);
        let other = Uuid::new_v4().to_string();
        let query = ListQuery {
            collector_id: Some(other),
            ..Default::default()
        };
        let filters = ListFilters::resolve(&collector, &query).unwrap();
        assert_eq!(filters.pinned_collector(), Some(collector.user_id));
    }

    #[test]
    fn test_collector_cannot_ask_for_unassigned() {
        let query = ListQuery {
            collector_id: Some("unassigned".to_string()),
            ..Default::default()
        };
        let err = ListFilters::resolve(&actor(Role::Collector), &query).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let admin = ListFilters::resolve(&actor(Role::Admin), &query).unwrap();
        assert_eq!(admin.collector, CollectorFilter::Unassigned);
    }

    #[test]
    fn test_redeemer_ignores_collector_filter() {
        let query = ListQuery {
            collector_id: Some("not-an-id".to_string()),
            ..Default::default()
        };
        let filters = ListFilters::resolve(&actor(Role::PaymentRedeemer), &query).unwrap();
        assert_eq!(filters.collector, CollectorFilter::Any);
    }

    #[test]
    fn test_malformed_collector_filter_rejected() {
        let query = ListQuery {
            collector_id: Some("not-an-id".to_string()),
            ..Default::default()
        };
        assert!(ListFilters::resolve(&actor(Role::Admin), &query).is_err());
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn test_window_bounds_in_business_time() {
        // 2024-07-01 is PDT (UTC-7)
        assert_eq!(
            window_start("2024-07-01").unwrap(),
            Utc.with_ymd_and_hms(2024, 7, 1, 7, 0, 0).unwrap()
        );
        assert_eq!(
            window_end("2024-07-01").unwrap(),
            Utc.with_ymd_and_hms(2024, 7, 2, 7, 0, 0).unwrap() - chrono::Duration::milliseconds(1)
        );
        assert_eq!(
            window_start("2024-07-01T10:00:00Z").unwrap(),
            Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap()
        );
    }
}
