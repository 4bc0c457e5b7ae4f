//! Database driver implementations.
//!
//! Each driver implements the [`Connection`] trait family from
//! [`crate::core`]:
//!
//! - [`sqlite`]: SQLite files and in-memory databases via `rusqlite`
//!
//! # Adding New Databases
//!
//! 1. Create a new module under `drivers/`
//! 2. Implement `Connection`, `Statement` and `Rows` for it
//! 3. Add its type name to [`SUPPORTED_TYPES`] and a branch to [`connect`]

pub mod sqlite;

pub use sqlite::SqliteConnection;

use tracing::info;

use crate::config::DatabaseConfig;
use crate::core::Connection;
use crate::error::{MigrateError, Result};
use crate::pipeline::Target;

/// Database types accepted in `origin.type` / `destination.type`.
pub const SUPPORTED_TYPES: &[&str] = &["sqlite"];

/// Path that opens a private in-memory database.
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Open a connection for one side of the migration.
pub fn connect(config: &DatabaseConfig, target: Target) -> Result<Box<dyn Connection>> {
    match config.r#type.as_str() {
        "sqlite" => {
            let connection = if config.path == IN_MEMORY_PATH {
                SqliteConnection::open_in_memory()
            } else {
                SqliteConnection::open(&config.path)
            }
            .map_err(|source| MigrateError::Connection { target, source })?;

            info!("Connected to {} database: sqlite {}", target, config.path);
            Ok(Box::new(connection))
        }
        other => Err(MigrateError::Config(format!(
            "{target}.type '{other}' is not supported"
        ))),
    }
}
