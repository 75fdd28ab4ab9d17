//! Database initialization, migrations and the user directory

pub mod init;
pub mod migrations;
pub mod users;

pub use init::*;
pub use migrations::*;
pub use users::*;
