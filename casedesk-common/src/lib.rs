//! # Casedesk Common Library
//!
//! Shared code for the casedesk services:
//! - Error taxonomy
//! - Identity model (roles, actors, user references)
//! - Database initialization, migrations and the user directory
//! - Configuration loading
//! - Business-timezone time utilities
//! - Record reference id formatting

pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod reference;
pub mod time;

pub use error::{Error, Result};
pub use identity::{Actor, Role, User, UserRef};
