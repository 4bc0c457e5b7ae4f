//! Driver traits the migration engine runs against.
//!
//! - [`Connection`]: an open, transaction-scoped connection to one database
//! - [`Statement`]: a prepared statement with positional `?` placeholders
//! - [`Rows`]: a forward-only result set produced by a query statement
//!
//! All calls are synchronous and block for their full duration. Statements
//! borrow their connection and result sets borrow their statement, so the
//! borrow checker enforces that nothing outlives what produced it. Dropping a
//! statement or result set releases it; there is no separate close call.

use crate::core::value::{SqlNullType, SqlValue};

/// Error raised by a driver. Any `std::error::Error` converts into it.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for driver calls.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// An open connection with auto-commit disabled.
///
/// Implementations must not commit implicitly: changes become durable only
/// through [`commit`](Connection::commit).
pub trait Connection {
    /// Prepare a statement using positional `?` placeholders.
    fn prepare<'c>(&'c self, sql: &str) -> DriverResult<Box<dyn Statement + 'c>>;

    /// Commit the current transaction.
    fn commit(&self) -> DriverResult<()>;

    /// Roll back the current transaction.
    fn rollback(&self) -> DriverResult<()>;

    /// Close the connection. Uncommitted work is discarded.
    fn close(&mut self) -> DriverResult<()>;

    /// Get the database type identifier (e.g., "sqlite").
    fn db_type(&self) -> &str;
}

/// A prepared statement.
///
/// Parameter indexes are 1-based, as in the placeholder order of the SQL.
pub trait Statement {
    /// Number of placeholders the driver found in the SQL.
    fn parameter_count(&self) -> usize;

    /// Whether executing this statement produces rows.
    fn is_query(&self) -> bool;

    /// Declared type of the placeholder at `index`, used for typed NULLs.
    fn parameter_type(&self, index: usize) -> DriverResult<SqlNullType>;

    /// Bind a value to the placeholder at `index`.
    fn bind(&mut self, index: usize, value: &SqlValue<'_>) -> DriverResult<()>;

    /// Execute a non-query statement, returning the affected row count.
    fn execute(&mut self) -> DriverResult<u64>;

    /// Execute a query statement.
    fn query(&mut self) -> DriverResult<Box<dyn Rows + '_>>;

    /// Queue the current bindings as one batch entry.
    fn add_batch(&mut self) -> DriverResult<()>;

    /// Send all queued batch entries, returning the affected row count.
    fn execute_batch(&mut self) -> DriverResult<u64>;
}

/// A forward-only result set.
pub trait Rows {
    /// Column labels, in select-list order.
    fn column_labels(&self) -> &[String];

    /// Advance to the next row. Values are in the order of [`column_labels`](Rows::column_labels).
    fn next_row(&mut self) -> DriverResult<Option<Vec<SqlValue<'static>>>>;
}
