//! Per-provider case status summary

use casedesk_common::{Actor, Result, Role};
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::BTreeMap;
use tracing::debug;

use super::visibility::VisibilityPolicy;
use crate::models::{ProviderSummary, StatusCount};

/// Summary buckets in reporting order. Case statuses matching none of these
/// are left out of the summary.
static STATUS_BUCKETS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)c ?& ?r.*granted", "C & R (GRANTED)"),
        (r"(?i)cic.*pend", "CIC PENDING"),
        (r"(?i)settled", "SETTLED"),
    ]
    .into_iter()
    .filter_map(|(pattern, label)| Regex::new(pattern).ok().map(|re| (re, label)))
    .collect()
});

/// Bucket index and label for a raw case status
pub fn bucket_for(case_status: &str) -> Option<(usize, &'static str)> {
    STATUS_BUCKETS
        .iter()
        .enumerate()
        .find(|(_, (re, _))| re.is_match(case_status))
        .map(|(idx, (_, label))| (idx, *label))
}

#[derive(Clone)]
pub struct SummaryEngine {
    db: SqlitePool,
}

impl SummaryEngine {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Case status counts per provider, sorted by provider
    pub async fn provider_summary(&self, actor: &Actor) -> Result<Vec<ProviderSummary>> {
        let policy = match actor.role {
            Role::Collector | Role::Provider => VisibilityPolicy::for_listing(actor),
            _ => VisibilityPolicy::Everything,
        };
        if policy == VisibilityPolicy::Nothing {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT records.provider, records.case_status, COUNT(*) FROM records WHERE ",
        );
        policy.push_sql(&mut builder);
        builder.push(
            " AND TRIM(records.provider) != '' \
             AND records.case_status IS NOT NULL AND records.case_status != '' \
             GROUP BY records.provider, records.case_status",
        );

        let rows: Vec<(String, String, i64)> = builder.build_query_as().fetch_all(&self.db).await?;

        let summaries = summarize(rows);
        debug!(role = %actor.role, providers = summaries.len(), "Built provider summary");
        Ok(summaries)
    }
}

fn summarize(rows: Vec<(String, String, i64)>) -> Vec<ProviderSummary> {
    let mut by_provider: BTreeMap<String, BTreeMap<usize, (&'static str, u64)>> = BTreeMap::new();

    for (provider, case_status, count) in rows {
        let Some((idx, label)) = bucket_for(&case_status) else {
            continue;
        };
        let entry = by_provider
            .entry(provider)
            .or_default()
            .entry(idx)
            .or_insert((label, 0));
        entry.1 += u64::try_from(count).unwrap_or(0);
    }

    by_provider
        .into_iter()
        .map(|(provider, buckets)| {
            let statuses: Vec<StatusCount> = buckets
                .into_values()
                .map(|(label, count)| StatusCount {
                    status: label.to_string(),
                    count,
                })
                .collect();
            let total_count = statuses.iter().map(|s| s.count).sum();
            ProviderSummary {
                provider,
                statuses,
                total_count,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_for_known_statuses() {
        assert_eq!(bucket_for("C & R (GRANTED)").map(|b| b.1), Some("C & R (GRANTED)"));
        assert_eq!(bucket_for("c&r granted").map(|b| b.1), Some("C & R (GRANTED)"));
        assert_eq!(bucket_for("CIC PENDING").map(|b| b.1), Some("CIC PENDING"));
        assert_eq!(bucket_for("SETTLED").map(|b| b.1), Some("SETTLED"));
        assert_eq!(bucket_for("A & S GRANTED"), None);
        assert_eq!(bucket_for("ADR CASE - SETTED AND PAID ADR"), None);
    }

    #[test]
    fn test_summarize_groups_and_totals() {
        let rows = vec![
            ("Zeta".to_string(), "SETTLED".to_string(), 2),
            ("Acme".to_string(), "SETTLED".to_string(), 1),
            ("Acme".to_string(), "C & R (GRANTED)".to_string(), 3),
            ("Acme".to_string(), "A & S GRANTED".to_string(), 7),
        ];
        let summary = summarize(rows);

        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].provider, "Acme");
        assert_eq!(summary[0].total_count, 4);
        assert_eq!(summary[0].statuses[0].status, "C & R (GRANTED)");
        assert_eq!(summary[0].statuses[1].status, "SETTLED");
        assert_eq!(summary[1].provider, "Zeta");
    }
}
