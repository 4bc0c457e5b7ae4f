//! SQL text with named `:parameter` references.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::core::{Connection, DriverResult, Parameters};
use crate::error::{MigrateError, Result};

use super::prepared::PreparedSql;

/// Matches a parameter reference: a colon, a letter or underscore, then
/// letters, digits or underscores.
///
/// This is a lexical scan. It does not know about quoted literals, so
/// `':name'` inside a string constant is taken as a parameter reference,
/// and a PostgreSQL cast such as `x::text` is read as a reference to `text`.
static PARAMETER_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":[_\p{Latin}][_\p{Latin}0-9]*").expect("static regex must compile")
});

/// An immutable SQL statement with named parameters.
///
/// Each `:name` reference is replaced by a positional `?` placeholder, and the
/// names are kept in occurrence order (repeats included), so the n-th `?`
/// binds the n-th name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlTemplate {
    sql: String,
    parameterized_sql: String,
    parameter_names: Vec<String>,
}

impl SqlTemplate {
    /// Parse `sql`, extracting its parameter references.
    pub fn new(sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let parameterized_sql = PARAMETER_REFERENCE.replace_all(&sql, "?").into_owned();
        let parameter_names = PARAMETER_REFERENCE
            .find_iter(&sql)
            .map(|m| m.as_str()[1..].to_string())
            .collect();

        Self {
            sql,
            parameterized_sql,
            parameter_names,
        }
    }

    /// Split a block of `;`-separated statements into templates.
    ///
    /// Fragments are trimmed and empty ones dropped. Semicolons inside
    /// string literals are not recognized.
    pub fn parse_block(block: &str) -> Vec<SqlTemplate> {
        block
            .split(';')
            .map(str::trim)
            .filter(|fragment| !fragment.is_empty())
            .map(SqlTemplate::new)
            .collect()
    }

    /// Original SQL text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// SQL with every parameter reference replaced by `?`.
    pub fn parameterized_sql(&self) -> &str {
        &self.parameterized_sql
    }

    /// Parameter names in occurrence order.
    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }

    /// Check whether `text` is exactly one parameter reference.
    pub fn is_parameter_reference(text: &str) -> bool {
        PARAMETER_REFERENCE
            .find(text)
            .is_some_and(|m| m.start() == 0 && m.end() == text.len())
    }

    /// Prepare this template on `connection` and bind `parameters`.
    ///
    /// For queries every referenced name must be present in `parameters`.
    /// Non-query statements skip that check: their values arrive later, one
    /// row at a time, through [`PreparedSql::bind`]. Every name missing from
    /// `parameters` is bound as a NULL of the placeholder's declared type.
    pub fn prepare<'c>(
        &self,
        connection: &'c dyn Connection,
        parameters: &Parameters,
    ) -> Result<PreparedSql<'c>> {
        debug!("Preparing statement: {}", self.parameterized_sql);

        let statement = connection
            .prepare(&self.parameterized_sql)
            .map_err(|e| self.preparation_error(e))?;

        let expected = statement.parameter_count();
        if expected != self.parameter_names.len() {
            return Err(MigrateError::ParameterCountMismatch {
                sql: self.sql.clone(),
                expected,
                actual: self.parameter_names.len(),
            });
        }

        if statement.is_query() {
            let missing = self.missing_parameters(parameters);
            if !missing.is_empty() {
                return Err(MigrateError::MissingParameter {
                    sql: self.sql.clone(),
                    missing,
                });
            }
        }

        let parameter_types = (1..=expected)
            .map(|index| statement.parameter_type(index))
            .collect::<DriverResult<Vec<_>>>()
            .map_err(|e| self.preparation_error(e))?;

        let mut prepared = PreparedSql::new(
            statement,
            self.sql.clone(),
            self.parameter_names.clone(),
            parameter_types,
        );
        prepared
            .bind_parameters(parameters)
            .map_err(|e| self.preparation_error(e))?;

        Ok(prepared)
    }

    /// Referenced names absent from `parameters`, each listed once.
    fn missing_parameters(&self, parameters: &Parameters) -> Vec<String> {
        let mut missing: Vec<String> = Vec::new();
        for name in &self.parameter_names {
            if !parameters.contains_key(name) && !missing.contains(name) {
                missing.push(name.clone());
            }
        }
        missing
    }

    fn preparation_error(&self, source: crate::core::DriverError) -> MigrateError {
        MigrateError::Preparation {
            context: format!("statement:\n{}", self.sql),
            source,
        }
    }
}
