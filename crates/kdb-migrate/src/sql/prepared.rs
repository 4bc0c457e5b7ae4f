//! A template bound to a live statement.

use crate::core::{DriverResult, Parameters, Rows, SqlNullType, SqlValue, Statement};

/// A prepared [`SqlTemplate`](super::SqlTemplate).
///
/// Holds the driver statement together with the parameter names and the
/// placeholder types resolved at preparation, so repeated rows can be bound
/// without asking the driver again. Dropping it releases the statement.
pub struct PreparedSql<'c> {
    statement: Box<dyn Statement + 'c>,
    sql: String,
    parameter_names: Vec<String>,
    parameter_types: Vec<SqlNullType>,
}

impl<'c> PreparedSql<'c> {
    pub(crate) fn new(
        statement: Box<dyn Statement + 'c>,
        sql: String,
        parameter_names: Vec<String>,
        parameter_types: Vec<SqlNullType>,
    ) -> Self {
        Self {
            statement,
            sql,
            parameter_names,
            parameter_types,
        }
    }

    /// Original SQL text of the template.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Whether the statement produces rows.
    pub fn is_query(&self) -> bool {
        self.statement.is_query()
    }

    /// Bind every placeholder from `parameters`.
    pub fn bind_parameters(&mut self, parameters: &Parameters) -> DriverResult<()> {
        self.bind(|name| parameters.get(name))
    }

    /// Bind every placeholder, looking each name up through `lookup`.
    ///
    /// A name that resolves to nothing, or to a NULL, binds as a NULL of the
    /// placeholder's declared type.
    pub fn bind<'v, F>(&mut self, lookup: F) -> DriverResult<()>
    where
        F: Fn(&str) -> Option<&'v SqlValue<'static>>,
    {
        for (i, name) in self.parameter_names.iter().enumerate() {
            match lookup(name.as_str()) {
                Some(value) if !value.is_null() => self.statement.bind(i + 1, value)?,
                _ => self
                    .statement
                    .bind(i + 1, &SqlValue::Null(self.parameter_types[i]))?,
            }
        }
        Ok(())
    }

    pub fn execute(&mut self) -> DriverResult<u64> {
        self.statement.execute()
    }

    pub fn query(&mut self) -> DriverResult<Box<dyn Rows + '_>> {
        self.statement.query()
    }

    pub fn add_batch(&mut self) -> DriverResult<()> {
        self.statement.add_batch()
    }

    pub fn execute_batch(&mut self) -> DriverResult<u64> {
        self.statement.execute_batch()
    }
}

impl std::fmt::Debug for PreparedSql<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedSql")
            .field("sql", &self.sql)
            .field("parameter_names", &self.parameter_names)
            .field("parameter_types", &self.parameter_types)
            .finish_non_exhaustive()
    }
}
