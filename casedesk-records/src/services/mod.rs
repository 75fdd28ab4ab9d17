//! Record engines
//!
//! Each engine owns a pool handle and runs every per-record mutation inside
//! one transaction. Engines take an already-resolved [`Actor`] and never
//! authenticate.
//!
//! [`Actor`]: casedesk_common::Actor

pub mod assignment;
pub mod comments;
pub mod duplicates;
pub mod events;
pub mod import;
pub mod query;
pub mod reference_id;
pub mod summary;
pub mod visibility;
pub mod writer;

pub use assignment::{AssignmentEngine, CollectorTarget};
pub use comments::{CommentEngine, NewComment};
pub use duplicates::DuplicateEngine;
pub use events::EventEngine;
pub use import::{ImportEngine, ImportField};
pub use query::{Category, ListQuery, RecordQuery};
pub use summary::SummaryEngine;
pub use visibility::VisibilityPolicy;
pub use writer::RecordWriter;

use casedesk_common::{Error, Result};
use uuid::Uuid;

/// Parse a caller-supplied id
pub(crate) fn parse_id(value: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(value.trim())
        .map_err(|_| Error::InvalidArgument(format!("Invalid {} id: {}", what, value)))
}

/// Parse every id or fail on the first malformed one
pub(crate) fn parse_ids<S: AsRef<str>>(values: &[S], what: &str) -> Result<Vec<Uuid>> {
    values.iter().map(|v| parse_id(v.as_ref(), what)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ids_is_all_or_nothing() {
        let good = Uuid::new_v4().to_string();
        assert_eq!(parse_ids(&[good.as_str()], "record").unwrap().len(), 1);

        let err = parse_ids(&[good.as_str(), "nope"], "record").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
