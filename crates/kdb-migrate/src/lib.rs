//! # kdb-migrate
//!
//! Plan-driven row migration between two relational databases.
//!
//! A [`MigrationPlan`] declares statements to run before and after the data
//! transfer plus any number of [`Step`]s, each pairing a query on the
//! *origin* database with an insert on the *destination*. Running the plan:
//!
//! - **Compiles** every action, preparing its statements and reporting every
//!   failure at once
//! - **Executes** before-statements, steps and after-statements in order,
//!   stopping at the first failure
//! - **Streams** each step's rows into the destination in batches
//! - **Commits** both databases on success and rolls both back on failure
//!
//! SQL uses `:name` parameter references, bound from a shared map of
//! constants and, for inserts, from each origin row by lower-cased column
//! label.
//!
//! ## Example
//!
//! ```rust,no_run
//! use kdb_migrate::{Config, Orchestrator};
//!
//! fn main() -> kdb_migrate::Result<()> {
//!     let config = Config::load("migration.yaml")?;
//!     let result = Orchestrator::new(config)?.run(false)?;
//!     println!("Migrated {} rows", result.rows_transferred);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod sql;
pub mod transfer;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use config::{Config, DatabaseConfig, HookConfig, MigrationConfig, StepConfig};
pub use core::{Connection, DriverError, Parameters, Rows, SqlNullType, SqlValue, Statement};
pub use drivers::SqliteConnection;
pub use error::{MigrateError, Result};
pub use orchestrator::{HealthCheckResult, MigrationResult, Orchestrator};
pub use pipeline::{Action, MigrationPlan, MigrationPlanBuilder, Step, StepResult, Target, Timing};
pub use sql::{PreparedSql, SqlTemplate};
pub use transfer::{BatchWriter, DEFAULT_BATCH_SIZE};
