//! Role-scoped visibility
//!
//! One named policy per role. A policy renders itself as a SQL predicate for
//! list queries and as a plain Rust predicate for single-record checks; both
//! forms express the same rule.

use casedesk_common::{Actor, Role};
use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

use crate::db::records::WFP_QUEUE_CONDITION;
use crate::models::{CommentStatus, Record};

/// Padding stripped from provider names; must match [`PROVIDER_TRIM_SQL`]
pub const PROVIDER_PAD: [char; 4] = [' ', '\t', '\n', '\r'];

/// SQL form of [`normalize_provider`] applied to `records.provider`
const PROVIDER_TRIM_SQL: &str = "LOWER(TRIM(records.provider, char(32, 9, 10, 13)))";

/// Provider names compare trimmed of [`PROVIDER_PAD`] and ASCII-lowercased
/// (SQLite `LOWER` folds ASCII only)
pub fn normalize_provider(value: &str) -> String {
    value.trim_matches(&PROVIDER_PAD[..]).to_ascii_lowercase()
}

/// Case-insensitive, whitespace-tolerant provider comparison
pub fn provider_matches(record_provider: &str, identity: &str) -> bool {
    let identity = normalize_provider(identity);
    !identity.is_empty() && normalize_provider(record_provider) == identity
}

/// Roles that never see `payment_received` comments
pub fn redacts_payments(role: Role) -> bool {
    matches!(
        role,
        Role::Collector | Role::HearingRepresentative | Role::Provider
    )
}

/// Drop `payment_received` comments from a response for roles that may not see them
pub fn redact_for_role(record: &mut Record, role: Role) {
    if redacts_payments(role) {
        record
            .comments
            .retain(|c| c.status != CommentStatus::PaymentReceived);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityPolicy {
    Everything,
    /// Records assigned to this collector
    CollectorQueue { collector: Uuid },
    /// Records whose provider matches this (normalized) name
    ProviderNamed { name: String },
    /// Records assigned to this redeemer whose top comment is an open `wfp`
    RedeemerWfpQueue { redeemer: Uuid },
    /// Records assigned to this redeemer, whatever their top comment
    RedeemerAssigned { redeemer: Uuid },
    Nothing,
}

impl VisibilityPolicy {
    /// Policy for list queries and summaries
    pub fn for_listing(actor: &Actor) -> Self {
        match actor.role {
            Role::PaymentRedeemer => VisibilityPolicy::RedeemerWfpQueue {
                redeemer: actor.user_id,
            },
            _ => Self::base(actor),
        }
    }

    /// Policy for calendar and notification views
    pub fn for_events(actor: &Actor) -> Self {
        match actor.role {
            Role::PaymentRedeemer => VisibilityPolicy::RedeemerAssigned {
                redeemer: actor.user_id,
            },
            _ => Self::base(actor),
        }
    }

    fn base(actor: &Actor) -> Self {
        match actor.role {
            Role::Collector => VisibilityPolicy::CollectorQueue {
                collector: actor.user_id,
            },
            Role::Provider => {
                let name = normalize_provider(&actor.display_identity());
                if name.is_empty() {
                    VisibilityPolicy::Nothing
                } else {
                    VisibilityPolicy::ProviderNamed { name }
                }
            }
            Role::PaymentRedeemer => VisibilityPolicy::RedeemerAssigned {
                redeemer: actor.user_id,
            },
            Role::SuperAdmin
            | Role::Admin
            | Role::Verifier
            | Role::PaymentPoster
            | Role::HearingRepresentative => VisibilityPolicy::Everything,
        }
    }

    pub fn permits(&self, record: &Record) -> bool {
        match self {
            VisibilityPolicy::Everything => true,
            VisibilityPolicy::CollectorQueue { collector } => {
                record.collector_id() == Some(*collector)
            }
            VisibilityPolicy::ProviderNamed { name } => {
                normalize_provider(&record.fields.provider) == *name
            }
            VisibilityPolicy::RedeemerWfpQueue { redeemer } => {
                record.redeemer_id() == Some(*redeemer)
                    && record
                        .top_comment()
                        .map(|c| c.status == CommentStatus::Wfp && !c.is_completed)
                        .unwrap_or(false)
            }
            VisibilityPolicy::RedeemerAssigned { redeemer } => {
                record.redeemer_id() == Some(*redeemer)
            }
            VisibilityPolicy::Nothing => false,
        }
    }

    /// Append this policy as a parenthesized predicate over `records`
    pub fn push_sql(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            VisibilityPolicy::Everything => {
                builder.push("(1 = 1)");
            }
            VisibilityPolicy::CollectorQueue { collector } => {
                builder
                    .push("(records.assigned_collector = ")
                    .push_bind(collector.to_string())
                    .push(")");
            }
            VisibilityPolicy::ProviderNamed { name } => {
                builder
                    .push("(")
                    .push(PROVIDER_TRIM_SQL)
                    .push(" = ")
                    .push_bind(name.clone())
                    .push(")");
            }
            VisibilityPolicy::RedeemerWfpQueue { redeemer } => {
                builder
                    .push("(records.assigned_payment_redeemer = ")
                    .push_bind(redeemer.to_string())
                    .push(" AND ")
                    .push(WFP_QUEUE_CONDITION)
                    .push(")");
            }
            VisibilityPolicy::RedeemerAssigned { redeemer } => {
                builder
                    .push("(records.assigned_payment_redeemer = ")
                    .push_bind(redeemer.to_string())
                    .push(")");
            }
            VisibilityPolicy::Nothing => {
                builder.push("(1 = 0)");
            }
        }
    }
}

/// Single-record read access
///
/// Collectors may also open records they have worked on after reassignment;
/// redeemers likewise keep access to records they commented on.
pub fn can_view(actor: &Actor, record: &Record) -> bool {
    match actor.role {
        Role::Collector | Role::PaymentRedeemer => {
            VisibilityPolicy::for_events(actor).permits(record)
                || record.has_comment_by(actor.user_id)
        }
        _ => VisibilityPolicy::for_events(actor).permits(record),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Comment, RecordFields};
    use casedesk_common::UserRef;
    use chrono::Utc;

    fn record(provider: &str) -> Record {
        let now = Utc::now();
        Record {
            id: Uuid::new_v4(),
            reference_id: "REF-0000001".to_string(),
            fields: RecordFields::new(provider, "Pat Doe"),
            comments: Vec::new(),
            assigned_collector: None,
            assigned_at: None,
            assigned_by: None,
            assignment_history: Vec::new(),
            assigned_payment_redeemer: None,
            payment_assigned_at: None,
            payment_assigned_by: None,
            record_created_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    fn comment(status: CommentStatus, author: Uuid) -> Comment {
        let now = Utc::now();
        Comment {
            id: Uuid::new_v4(),
            text: "note".to_string(),
            status,
            author: UserRef::bare(author),
            scheduled_date: None,
            scheduled_time: None,
            offer_amount: None,
            check_number: None,
            check_date: None,
            check_amount: None,
            check_copy: None,
            is_completed: false,
            completed_at: None,
            is_from_merged_record: false,
            source_record_id: None,
            source_comment_id: None,
            source_record_snapshot: None,
            merged_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_provider_match_tolerates_case_and_whitespace() {
        assert!(provider_matches(" acme clinic ", "Acme Clinic"));
        assert!(!provider_matches("Acme Clinic", "Other Clinic"));
        assert!(!provider_matches("", "  "));
    }

    #[test]
    fn test_provider_padding_matches_sql_trim_set() {
        assert!(provider_matches("\tAcme\r\n", "acme"));
        // SQLite TRIM leaves a non-breaking space in place, so must we
        assert!(!provider_matches("\u{a0}Acme\u{a0}", "acme"));
        assert_eq!(PROVIDER_PAD.len(), PROVIDER_TRIM_SQL.matches(',').count() + 1);
    }

    #[test]
    fn test_provider_policy() {
        let actor = Actor::new(Uuid::new_v4(), Role::Provider, "acme").with_full_name("Acme Clinic");
        let policy = VisibilityPolicy::for_listing(&actor);
        assert!(policy.permits(&record(" acme clinic ")));
        assert!(!policy.permits(&record("Bay Ortho")));

        let nameless = Actor::new(Uuid::new_v4(), Role::Provider, " ");
        assert_eq!(VisibilityPolicy::for_listing(&nameless), VisibilityPolicy::Nothing);
    }

    #[test]
    fn test_redeemer_queue_needs_open_wfp_on_top() {
        let redeemer = Uuid::new_v4();
        let actor = Actor::new(redeemer, Role::PaymentRedeemer, "pr");
        let mut rec = record("Clinic");
        rec.assigned_payment_redeemer = Some(UserRef::bare(redeemer));
        rec.comments.push(comment(CommentStatus::Wfp, Uuid::new_v4()));

        assert!(VisibilityPolicy::for_listing(&actor).permits(&rec));

        rec.comments.insert(0, comment(CommentStatus::Callback, Uuid::new_v4()));
        assert!(!VisibilityPolicy::for_listing(&actor).permits(&rec));
        assert!(VisibilityPolicy::for_events(&actor).permits(&rec));
    }

    #[test]
    fn test_collector_can_view_commented_record() {
        let collector = Uuid::new_v4();
        let actor = Actor::new(collector, Role::Collector, "c");
        let mut rec = record("Clinic");
        assert!(!can_view(&actor, &rec));

        rec.comments.push(comment(CommentStatus::Lvm, collector));
        assert!(can_view(&actor, &rec));
    }

    #[test]
    fn test_redaction_only_for_listed_roles() {
        let mut rec = record("Clinic");
        rec.comments.push(comment(CommentStatus::PaymentReceived, Uuid::new_v4()));
        rec.comments.push(comment(CommentStatus::Wfp, Uuid::new_v4()));

        let mut for_admin = rec.clone();
        redact_for_role(&mut for_admin, Role::Admin);
        assert_eq!(for_admin.comments.len(), 2);

        redact_for_role(&mut rec, Role::HearingRepresentative);
        assert_eq!(rec.comments.len(), 1);
        assert_eq!(rec.comments[0].status, CommentStatus::Wfp);
    }
}
