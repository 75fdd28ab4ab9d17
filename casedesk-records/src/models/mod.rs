//! Domain types

pub mod enums;
pub mod events;
pub mod record;
pub mod reports;

pub use enums::*;
pub use events::*;
pub use record::*;
pub use reports::*;
