//! Parameterized SQL.
//!
//! - [`SqlTemplate`]: SQL text with `:name` references, parsed once at plan time
//! - [`PreparedSql`]: a template prepared on a connection, ready to bind and run

mod prepared;
mod template;

pub use prepared::PreparedSql;
pub use template::SqlTemplate;
