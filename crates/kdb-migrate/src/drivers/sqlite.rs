//! SQLite driver backed by `rusqlite`.
//!
//! The connection keeps an explicit transaction open at all times, so work
//! only becomes durable through [`Connection::commit`]. Batch entries are
//! buffered in the statement and replayed one by one on
//! [`Statement::execute_batch`], inside that transaction.
//!
//! SQL holding nothing but whitespace and comments, such as the tail of
//! `DELETE FROM dept; -- cleanup`, prepares as an empty statement that
//! executes as a no-op.

use std::path::Path;

use rusqlite::fallible_iterator::FallibleIterator;
use rusqlite::types::{Value, ValueRef};
use rusqlite::Batch;
use tracing::debug;

use crate::core::{Connection, DriverResult, Rows, SqlNullType, SqlValue, Statement};

/// A SQLite database opened with auto-commit disabled.
pub struct SqliteConnection {
    conn: Option<rusqlite::Connection>,
}

impl SqliteConnection {
    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> DriverResult<Self> {
        let path = path.as_ref();
        debug!("Opening SQLite database: {}", path.display());
        Self::from_connection(rusqlite::Connection::open(path)?)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> DriverResult<Self> {
        Self::from_connection(rusqlite::Connection::open_in_memory()?)
    }

    /// Take over an existing connection and start a transaction on it.
    pub fn from_connection(conn: rusqlite::Connection) -> DriverResult<Self> {
        conn.execute_batch("BEGIN")?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&self) -> DriverResult<&rusqlite::Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| "SQLite connection is closed".into())
    }
}

impl Connection for SqliteConnection {
    fn prepare<'c>(&'c self, sql: &str) -> DriverResult<Box<dyn Statement + 'c>> {
        let conn = self.conn()?;
        let statement = match Batch::new(conn, sql).next()? {
            Some(_) => Some(conn.prepare(sql)?),
            None => {
                debug!("Empty SQLite statement: {:?}", sql);
                None
            }
        };
        let count = statement.as_ref().map_or(0, |s| s.parameter_count());
        let values = vec![Value::Null; count];
        Ok(Box::new(SqliteStatement {
            statement,
            values,
            batch: Vec::new(),
        }))
    }

    fn commit(&self) -> DriverResult<()> {
        self.conn()?.execute_batch("COMMIT; BEGIN")?;
        Ok(())
    }

    fn rollback(&self) -> DriverResult<()> {
        self.conn()?.execute_batch("ROLLBACK; BEGIN")?;
        Ok(())
    }

    fn close(&mut self) -> DriverResult<()> {
        match self.conn.take() {
            Some(conn) => conn.close().map_err(|(_, e)| e.into()),
            None => Ok(()),
        }
    }

    fn db_type(&self) -> &str {
        "sqlite"
    }
}

struct SqliteStatement<'c> {
    /// `None` when the SQL holds no statement at all.
    statement: Option<rusqlite::Statement<'c>>,
    /// Values bound for the next execution, by position.
    values: Vec<Value>,
    batch: Vec<Vec<Value>>,
}

impl SqliteStatement<'_> {
    fn bind_all(statement: &mut rusqlite::Statement<'_>, values: &[Value]) -> DriverResult<()> {
        for (i, value) in values.iter().enumerate() {
            statement.raw_bind_parameter(i + 1, value)?;
        }
        Ok(())
    }

    fn run(statement: &mut Option<rusqlite::Statement<'_>>, values: &[Value]) -> DriverResult<u64> {
        match statement {
            Some(statement) => {
                Self::bind_all(statement, values)?;
                Ok(statement.raw_execute()? as u64)
            }
            None => Ok(0),
        }
    }
}

impl Statement for SqliteStatement<'_> {
    fn parameter_count(&self) -> usize {
        self.values.len()
    }

    fn is_query(&self) -> bool {
        self.statement.as_ref().is_some_and(|s| s.column_count() > 0)
    }

    fn parameter_type(&self, _index: usize) -> DriverResult<SqlNullType> {
        // SQLite does not declare parameter types; a NULL is a NULL.
        Ok(SqlNullType::default())
    }

    fn bind(&mut self, index: usize, value: &SqlValue<'_>) -> DriverResult<()> {
        let slot = index
            .checked_sub(1)
            .and_then(|i| self.values.get_mut(i))
            .ok_or_else(|| format!("parameter index {index} out of range"))?;
        *slot = to_sqlite(value);
        Ok(())
    }

    fn execute(&mut self) -> DriverResult<u64> {
        Self::run(&mut self.statement, &self.values)
    }

    fn query(&mut self) -> DriverResult<Box<dyn Rows + '_>> {
        let statement = self
            .statement
            .as_mut()
            .ok_or("empty statement returns no rows")?;
        Self::bind_all(statement, &self.values)?;
        let labels = statement
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        Ok(Box::new(SqliteRows {
            labels,
            rows: statement.raw_query(),
        }))
    }

    fn add_batch(&mut self) -> DriverResult<()> {
        self.batch.push(self.values.clone());
        Ok(())
    }

    fn execute_batch(&mut self) -> DriverResult<u64> {
        let mut affected = 0u64;
        for values in std::mem::take(&mut self.batch) {
            affected += Self::run(&mut self.statement, &values)?;
        }
        Ok(affected)
    }
}

struct SqliteRows<'s> {
    labels: Vec<String>,
    rows: rusqlite::Rows<'s>,
}

impl Rows for SqliteRows<'_> {
    fn column_labels(&self) -> &[String] {
        &self.labels
    }

    fn next_row(&mut self) -> DriverResult<Option<Vec<SqlValue<'static>>>> {
        let width = self.labels.len();
        match self.rows.next()? {
            Some(row) => {
                let mut values = Vec::with_capacity(width);
                for i in 0..width {
                    values.push(from_sqlite(row.get_ref(i)?));
                }
                Ok(Some(values))
            }
            None => Ok(None),
        }
    }
}

/// Convert a value to its SQLite storage class.
///
/// Types SQLite has no class for are stored as text.
pub fn to_sqlite(value: &SqlValue<'_>) -> Value {
    match value {
        SqlValue::Null(_) => Value::Null,
        SqlValue::Bool(b) => Value::Integer(i64::from(*b)),
        SqlValue::I16(i) => Value::Integer(i64::from(*i)),
        SqlValue::I32(i) => Value::Integer(i64::from(*i)),
        SqlValue::I64(i) => Value::Integer(*i),
        SqlValue::F32(f) => Value::Real(f64::from(*f)),
        SqlValue::F64(f) => Value::Real(*f),
        SqlValue::Text(s) => Value::Text(s.to_string()),
        SqlValue::Bytes(b) => Value::Blob(b.to_vec()),
        SqlValue::Uuid(u) => Value::Text(u.hyphenated().to_string()),
        SqlValue::Decimal(d) => Value::Text(d.to_string()),
        SqlValue::DateTime(dt) => Value::Text(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        SqlValue::DateTimeOffset(dt) => Value::Text(dt.to_rfc3339()),
        SqlValue::Date(d) => Value::Text(d.format("%Y-%m-%d").to_string()),
        SqlValue::Time(t) => Value::Text(t.format("%H:%M:%S%.f").to_string()),
    }
}

/// Convert a SQLite column value.
pub fn from_sqlite(value: ValueRef<'_>) -> SqlValue<'static> {
    match value {
        ValueRef::Null => SqlValue::Null(SqlNullType::default()),
        ValueRef::Integer(i) => SqlValue::I64(i),
        ValueRef::Real(f) => SqlValue::F64(f),
        ValueRef::Text(bytes) => SqlValue::text_owned(String::from_utf8_lossy(bytes)),
        ValueRef::Blob(bytes) => SqlValue::from(bytes.to_vec()),
    }
}
