//! Recording in-memory driver for unit tests.
//!
//! `MockConnection` answers queries from canned rows, counts placeholders by
//! scanning for `?`, and records every driver call as an [`Event`] so tests
//! can assert ordering, batch flushes and that every statement was released.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::core::{
    Connection, DriverError, DriverResult, Rows, SqlNullType, SqlValue, Statement,
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    Prepare(String),
    Execute(String),
    Query(String),
    Flush { sql: String, rows: usize },
    RowsClosed(String),
    StatementClosed(String),
    Commit,
    Rollback,
    Close,
}

type CannedRows = (Vec<String>, Vec<Vec<SqlValue<'static>>>);

#[derive(Default)]
struct MockState {
    events: Vec<Event>,
    executed: Vec<(String, Vec<SqlValue<'static>>)>,
    written: Vec<Vec<SqlValue<'static>>>,
}

#[derive(Default)]
pub(crate) struct MockConnection {
    queries: HashMap<String, CannedRows>,
    parameter_types: HashMap<String, Vec<SqlNullType>>,
    parameter_counts: Vec<(String, usize)>,
    fail_prepare: Vec<String>,
    fail_execute: Vec<String>,
    fail_read_after: Option<usize>,
    fail_commit: bool,
    fail_rollback: bool,
    fail_close: bool,
    state: RefCell<MockState>,
}

fn matches_any(fragments: &[String], sql: &str) -> bool {
    fragments.iter().any(|f| sql.contains(f.as_str()))
}

fn mock_error(message: String) -> DriverError {
    message.into()
}

impl MockConnection {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Answer `sql` (exact, trimmed) with the given rows.
    pub(crate) fn with_rows(
        mut self,
        sql: &str,
        labels: &[&str],
        rows: Vec<Vec<SqlValue<'static>>>,
    ) -> Self {
        self.queries.insert(
            sql.trim().to_string(),
            (labels.iter().map(|l| l.to_string()).collect(), rows),
        );
        self
    }

    pub(crate) fn with_parameter_types(mut self, sql: &str, types: Vec<SqlNullType>) -> Self {
        self.parameter_types.insert(sql.trim().to_string(), types);
        self
    }

    /// Report `count` placeholders for any SQL containing `fragment`.
    pub(crate) fn with_parameter_count(mut self, fragment: &str, count: usize) -> Self {
        self.parameter_counts.push((fragment.to_string(), count));
        self
    }

    pub(crate) fn failing_prepare(mut self, fragment: &str) -> Self {
        self.fail_prepare.push(fragment.to_string());
        self
    }

    pub(crate) fn failing_execute(mut self, fragment: &str) -> Self {
        self.fail_execute.push(fragment.to_string());
        self
    }

    pub(crate) fn failing_read_after(mut self, rows: usize) -> Self {
        self.fail_read_after = Some(rows);
        self
    }

    pub(crate) fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    pub(crate) fn failing_rollback(mut self) -> Self {
        self.fail_rollback = true;
        self
    }

    pub(crate) fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.state.borrow().events.clone()
    }

    /// Values bound at each `execute` call, with the SQL executed.
    pub(crate) fn executed(&self) -> Vec<(String, Vec<SqlValue<'static>>)> {
        self.state.borrow().executed.clone()
    }

    /// Rows sent through `execute_batch`, in flush order.
    pub(crate) fn written(&self) -> Vec<Vec<SqlValue<'static>>> {
        self.state.borrow().written.clone()
    }

    pub(crate) fn flush_count(&self) -> usize {
        self.count(|e| matches!(e, Event::Flush { .. }))
    }

    pub(crate) fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.state.borrow().events.iter().filter(|e| predicate(e)).count()
    }

    /// Statements prepared but not yet dropped.
    pub(crate) fn open_statements(&self) -> usize {
        let prepared = self.count(|e| matches!(e, Event::Prepare(_)));
        let closed = self.count(|e| matches!(e, Event::StatementClosed(_)));
        prepared - closed
    }

    fn record(&self, event: Event) {
        self.state.borrow_mut().events.push(event);
    }
}

impl Connection for MockConnection {
    fn prepare<'c>(&'c self, sql: &str) -> DriverResult<Box<dyn Statement + 'c>> {
        if matches_any(&self.fail_prepare, sql) {
            return Err(mock_error(format!("syntax error near '{}'", sql.trim())));
        }
        self.record(Event::Prepare(sql.to_string()));

        let params = self
            .parameter_counts
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
            .map(|(_, count)| *count)
            .unwrap_or_else(|| sql.matches('?').count());

        Ok(Box::new(MockStatement {
            conn: self,
            sql: sql.to_string(),
            params,
            current: vec![SqlValue::Null(SqlNullType::String); params],
            batch: Vec::new(),
        }))
    }

    fn commit(&self) -> DriverResult<()> {
        self.record(Event::Commit);
        if self.fail_commit {
            return Err(mock_error("commit refused".to_string()));
        }
        Ok(())
    }

    fn rollback(&self) -> DriverResult<()> {
        self.record(Event::Rollback);
        if self.fail_rollback {
            return Err(mock_error("rollback refused".to_string()));
        }
        Ok(())
    }

    fn close(&mut self) -> DriverResult<()> {
        self.record(Event::Close);
        if self.fail_close {
            return Err(mock_error("close refused".to_string()));
        }
        Ok(())
    }

    fn db_type(&self) -> &str {
        "mock"
    }
}

struct MockStatement<'c> {
    conn: &'c MockConnection,
    sql: String,
    params: usize,
    current: Vec<SqlValue<'static>>,
    batch: Vec<Vec<SqlValue<'static>>>,
}

impl MockStatement<'_> {
    fn check_execute(&self) -> DriverResult<()> {
        if matches_any(&self.conn.fail_execute, &self.sql) {
            return Err(mock_error(format!("cannot execute '{}'", self.sql.trim())));
        }
        Ok(())
    }
}

impl Statement for MockStatement<'_> {
    fn parameter_count(&self) -> usize {
        self.params
    }

    fn is_query(&self) -> bool {
        self.sql.trim_start().to_uppercase().starts_with("SELECT")
    }

    fn parameter_type(&self, index: usize) -> DriverResult<SqlNullType> {
        Ok(self
            .conn
            .parameter_types
            .get(self.sql.trim())
            .and_then(|types| types.get(index - 1))
            .copied()
            .unwrap_or_default())
    }

    fn bind(&mut self, index: usize, value: &SqlValue<'_>) -> DriverResult<()> {
        if index == 0 || index > self.current.len() {
            return Err(mock_error(format!("parameter index {index} out of range")));
        }
        self.current[index - 1] = value.clone().into_owned();
        Ok(())
    }

    fn execute(&mut self) -> DriverResult<u64> {
        self.check_execute()?;
        self.conn.record(Event::Execute(self.sql.clone()));
        self.conn
            .state
            .borrow_mut()
            .executed
            .push((self.sql.clone(), self.current.clone()));
        Ok(1)
    }

    fn query(&mut self) -> DriverResult<Box<dyn Rows + '_>> {
        self.check_execute()?;
        self.conn.record(Event::Query(self.sql.clone()));
        let (labels, rows) = self
            .conn
            .queries
            .get(self.sql.trim())
            .cloned()
            .unwrap_or_default();
        Ok(Box::new(MockRows {
            conn: self.conn,
            sql: self.sql.clone(),
            labels,
            rows: rows.into_iter(),
            read: 0,
        }))
    }

    fn add_batch(&mut self) -> DriverResult<()> {
        self.batch.push(self.current.clone());
        Ok(())
    }

    fn execute_batch(&mut self) -> DriverResult<u64> {
        self.check_execute()?;
        let rows = std::mem::take(&mut self.batch);
        self.conn.record(Event::Flush {
            sql: self.sql.clone(),
            rows: rows.len(),
        });
        let count = rows.len() as u64;
        self.conn.state.borrow_mut().written.extend(rows);
        Ok(count)
    }
}

impl Drop for MockStatement<'_> {
    fn drop(&mut self) {
        self.conn.record(Event::StatementClosed(self.sql.clone()));
    }
}

struct MockRows<'c> {
    conn: &'c MockConnection,
    sql: String,
    labels: Vec<String>,
    rows: std::vec::IntoIter<Vec<SqlValue<'static>>>,
    read: usize,
}

impl Rows for MockRows<'_> {
    fn column_labels(&self) -> &[String] {
        &self.labels
    }

    fn next_row(&mut self) -> DriverResult<Option<Vec<SqlValue<'static>>>> {
        if self.conn.fail_read_after == Some(self.read) {
            return Err(mock_error(format!("connection reset after {} rows", self.read)));
        }
        self.read += 1;
        Ok(self.rows.next())
    }
}

impl Drop for MockRows<'_> {
    fn drop(&mut self) {
        self.conn.record(Event::RowsClosed(self.sql.clone()));
    }
}
