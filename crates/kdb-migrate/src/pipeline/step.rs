//! Migration steps: an origin query paired with a destination insert.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::Parameters;
use crate::error::{MigrateError, Result};
use crate::sql::{PreparedSql, SqlTemplate};
use crate::transfer::BatchWriter;

use super::action::{ActionCompiler, Executable, Runtime};

/// A named select → insert pair.
///
/// Every row of `select` (run on the origin) is bound into `insert` (run on
/// the destination) by lower-cased column label.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Step {
    name: String,
    select: Option<SqlTemplate>,
    insert: Option<SqlTemplate>,
    batch_size: Option<usize>,
}

impl Step {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the origin query.
    pub fn select(mut self, sql: impl Into<String>) -> Self {
        self.select = Some(SqlTemplate::new(sql));
        self
    }

    /// Set the destination insert.
    pub fn insert(mut self, sql: impl Into<String>) -> Self {
        self.insert = Some(SqlTemplate::new(sql));
        self
    }

    /// Override the run's batch size for this step.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn batch_size_override(&self) -> Option<usize> {
        self.batch_size
    }

    /// Check that both statements are set and the batch size is positive.
    ///
    /// All violations are reported together.
    pub fn validate(&self) -> Result<()> {
        let mut messages = Vec::new();
        if self.select.is_none() {
            messages.push("No select statement specified".to_string());
        }
        if self.insert.is_none() {
            messages.push("No insert statement specified".to_string());
        }
        if let Some(size) = self.batch_size.filter(|size| *size == 0) {
            messages.push(format!("Invalid batch size: {size}"));
        }

        if messages.is_empty() {
            Ok(())
        } else {
            Err(MigrateError::Validation(format!(
                "step '{}': {}",
                self.name,
                messages.join(". ")
            )))
        }
    }
}

impl ActionCompiler for Step {
    type Compiled<'c> = CompiledStep<'c>;

    /// Prepare the select on the origin and the insert on the destination.
    ///
    /// Both are attempted even if the first fails, so both failures are
    /// reported together.
    fn compile<'c>(
        &self,
        runtime: &Runtime<'c>,
    ) -> std::result::Result<CompiledStep<'c>, Vec<MigrateError>> {
        let (Some(select), Some(insert)) = (&self.select, &self.insert) else {
            return Err(vec![self.validate().err().unwrap_or_else(|| {
                MigrateError::Validation(format!("step '{}' is incomplete", self.name))
            })]);
        };
        let batch_size = self.batch_size.unwrap_or(runtime.batch_size);

        let select = select
            .prepare(runtime.origin, runtime.parameters)
            .map_err(|e| {
                MigrateError::preparation(format!("select statement for '{}'", self.name), e)
            });
        let writer = BatchWriter::prepare(insert, runtime.destination, batch_size).map_err(|e| {
            MigrateError::preparation(format!("insert statement for '{}'", self.name), e)
        });

        match (select, writer) {
            (Ok(select), Ok(writer)) => Ok(CompiledStep {
                name: self.name.clone(),
                select,
                writer,
                parameters: runtime.parameters,
            }),
            (select, writer) => Err([select.err(), writer.err()].into_iter().flatten().collect()),
        }
    }
}

/// A step with both statements prepared.
#[derive(Debug)]
pub struct CompiledStep<'c> {
    name: String,
    select: PreparedSql<'c>,
    writer: BatchWriter<'c>,
    parameters: &'c Parameters,
}

impl Executable for CompiledStep<'_> {
    type Output = StepResult;

    /// Drain the origin query into the destination insert.
    fn execute(mut self) -> Result<StepResult> {
        let context = || format!("migration step '{}'", self.name);

        let rows = self
            .select
            .query()
            .map_err(|e| MigrateError::execution(context(), e))?;
        let count = self
            .writer
            .drain(rows, self.parameters)
            .map_err(|e| MigrateError::execution(context(), e))?;

        let result = StepResult::new(self.name.clone(), count);
        info!("{}", result);
        Ok(result)
    }
}

/// Rows transferred by one step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepResult {
    pub name: String,
    pub count: u64,
}

impl StepResult {
    pub fn new(name: impl Into<String>, count: u64) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} rows migrated", self.name, self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SqlValue;
    use crate::testing::{Event, MockConnection};

    const SELECT: &str = "SELECT deptno, dname FROM dept";
    const INSERT: &str = "INSERT INTO dept(deptno, dname) VALUES(:deptno, :dname)";

    fn dept_step() -> Step {
        Step::new("Load departments").select(SELECT).insert(INSERT)
    }

    fn origin() -> MockConnection {
        MockConnection::new().with_rows(
            SELECT,
            &["DEPTNO", "DNAME"],
            vec![
                vec![SqlValue::I32(10), SqlValue::text_owned("ACCOUNTING")],
                vec![SqlValue::I32(20), SqlValue::text_owned("RESEARCH")],
                vec![SqlValue::I32(30), SqlValue::text_owned("SALES")],
                vec![SqlValue::I32(40), SqlValue::text_owned("OPERATIONS")],
                vec![SqlValue::I32(50), SqlValue::text_owned("SUPPORT")],
            ],
        )
    }

    fn runtime<'c>(
        origin: &'c MockConnection,
        destination: &'c MockConnection,
        parameters: &'c Parameters,
    ) -> Runtime<'c> {
        Runtime {
            origin,
            destination,
            parameters,
            batch_size: 2,
        }
    }

    #[test]
    fn test_validate_reports_every_violation() {
        let err = Step::new("empty").batch_size(0).validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation failed: step 'empty': No select statement specified. \
             No insert statement specified. Invalid batch size: 0"
        );
        assert!(dept_step().batch_size(4).validate().is_ok());
    }

    #[test]
    fn test_step_transfers_all_rows() {
        let origin = origin();
        let destination = MockConnection::new();
        let parameters = Parameters::new();

        let compiled = dept_step()
            .compile(&runtime(&origin, &destination, &parameters))
            .unwrap();
        let result = compiled.execute().unwrap();

        assert_eq!(result, StepResult::new("Load departments", 5));
        assert_eq!(destination.written().len(), 5);
        // runtime default of 2 rows per batch
        assert_eq!(destination.flush_count(), 3);
        assert_eq!(origin.open_statements(), 0);
        assert_eq!(destination.open_statements(), 0);
    }

    #[test]
    fn test_step_batch_size_overrides_runtime_default() {
        let origin = origin();
        let destination = MockConnection::new();
        let parameters = Parameters::new();

        let compiled = dept_step()
            .batch_size(5)
            .compile(&runtime(&origin, &destination, &parameters))
            .unwrap();
        compiled.execute().unwrap();

        assert_eq!(destination.flush_count(), 1);
    }

    #[test]
    fn test_both_preparation_failures_are_reported() {
        let origin = MockConnection::new().failing_prepare("FROM dept");
        let destination = MockConnection::new().failing_prepare("INSERT INTO dept");
        let parameters = Parameters::new();

        let failures = dept_step()
            .compile(&runtime(&origin, &destination, &parameters))
            .unwrap_err();

        let messages: Vec<String> = failures.iter().map(ToString::to_string).collect();
        assert_eq!(
            messages,
            [
                "Error preparing select statement for 'Load departments'",
                "Error preparing insert statement for 'Load departments'",
            ]
        );
    }

    #[test]
    fn test_select_released_when_insert_fails() {
        let origin = origin();
        let destination = MockConnection::new().failing_prepare("INSERT INTO dept");
        let parameters = Parameters::new();

        let failures = dept_step()
            .compile(&runtime(&origin, &destination, &parameters))
            .unwrap_err();

        assert_eq!(failures.len(), 1);
        assert_eq!(origin.count(|e| matches!(e, Event::Prepare(_))), 1);
        assert_eq!(origin.open_statements(), 0);
    }

    #[test]
    fn test_select_parameters_come_from_runtime() {
        let select = "SELECT deptno, dname FROM dept WHERE deptno >= ?";
        let origin = MockConnection::new().with_rows(
            select,
            &["deptno", "dname"],
            vec![vec![SqlValue::I32(30), SqlValue::text_owned("SALES")]],
        );
        let destination = MockConnection::new();
        let step = Step::new("Some departments")
            .select("SELECT deptno, dname FROM dept WHERE deptno >= :min_deptno")
            .insert(INSERT);

        let missing = step
            .compile(&runtime(&origin, &destination, &Parameters::new()))
            .unwrap_err();
        assert_eq!(missing.len(), 1);

        let parameters: Parameters = [("min_deptno".to_string(), SqlValue::I32(30))].into();
        let result = step
            .compile(&runtime(&origin, &destination, &parameters))
            .unwrap()
            .execute()
            .unwrap();
        assert_eq!(result.count, 1);
    }

    #[test]
    fn test_execution_failure_names_step() {
        let origin = origin();
        let destination = MockConnection::new().failing_execute("INSERT INTO dept");
        let parameters = Parameters::new();

        let err = dept_step()
            .compile(&runtime(&origin, &destination, &parameters))
            .unwrap()
            .execute()
            .unwrap_err();

        assert_eq!(err.to_string(), "Error executing migration step 'Load departments'");
        assert_eq!(destination.open_statements(), 0);
        assert_eq!(origin.open_statements(), 0);
    }

    #[test]
    fn test_step_result_display() {
        assert_eq!(
            StepResult::new("Load employees", 14).to_string(),
            "Load employees: 14 rows migrated"
        );
    }
}
