//! Database initialization, schema sync, migrations and settings

pub mod init;
pub mod migrations;
pub mod schema_sync;
pub mod settings;
pub mod table_schemas;

pub use init::*;
pub use migrations::*;
pub use settings::*;
