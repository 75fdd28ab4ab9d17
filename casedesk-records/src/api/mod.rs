//! HTTP API handlers for casedesk-records

pub mod assignments;
pub mod auth;
pub mod comments;
pub mod duplicates;
pub mod events;
pub mod health;
pub mod records;

pub use assignments::assignment_routes;
pub use auth::{CurrentActor, ADMINS};
pub use comments::comment_routes;
pub use duplicates::duplicate_routes;
pub use events::event_routes;
pub use health::health_routes;
pub use records::record_routes;
