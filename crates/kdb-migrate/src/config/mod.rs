//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::path::Path;

use serde_yaml::Value;

use crate::core::{Parameters, SqlValue};
use crate::error::{MigrateError, Result};
use crate::pipeline::{MigrationPlan, Step, Target};

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// The configured constants as bindable values.
    pub fn parameters(&self) -> Result<Parameters> {
        self.parameters
            .iter()
            .map(|(name, value)| Ok((name.clone(), parameter_value(name, value)?)))
            .collect()
    }

    /// Build the migration plan described by this configuration.
    pub fn plan(&self) -> Result<MigrationPlan> {
        let mut builder = MigrationPlan::builder()
            .commit_at_end(self.migration.commit_at_end)
            .auto_close(self.migration.auto_close);

        for hook in &self.before {
            builder = builder.before(hook.target, &hook.sql);
        }
        for step in &self.steps {
            let mut declared = Step::new(&step.name)
                .select(&step.select)
                .insert(&step.insert);
            if let Some(size) = step.batch_size {
                declared = declared.batch_size(size);
            }
            builder = builder.step(declared);
        }
        for hook in &self.after {
            builder = builder.after(hook.target, &hook.sql);
        }

        builder.build()
    }

    /// Settings for one side of the migration.
    pub fn database(&self, target: Target) -> &DatabaseConfig {
        match target {
            Target::Origin => &self.origin,
            Target::Destination => &self.destination,
        }
    }
}

/// Convert a YAML scalar into a parameter value.
///
/// Integers become `I64`, other numbers `F64`; `~` is a NULL.
pub fn parameter_value(name: &str, value: &Value) -> Result<SqlValue<'static>> {
    match value {
        Value::Null => Ok(SqlValue::Null(Default::default())),
        Value::Bool(b) => Ok(SqlValue::Bool(*b)),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Ok(SqlValue::I64(i)),
            (None, Some(f)) => Ok(SqlValue::F64(f)),
            (None, None) => Err(MigrateError::Config(format!(
                "parameter '{name}' is out of range: {n}"
            ))),
        },
        Value::String(s) => Ok(SqlValue::text_owned(s.as_str())),
        Value::Tagged(tagged) => parameter_value(name, &tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => Err(MigrateError::Config(format!(
            "parameter '{name}' must be a scalar value"
        ))),
    }
}

/// Parse a `name=value` assignment, reading the value as a YAML scalar.
pub fn parse_parameter(assignment: &str) -> Result<(String, SqlValue<'static>)> {
    let (name, raw) = assignment.split_once('=').ok_or_else(|| {
        MigrateError::Config(format!("expected name=value, got '{assignment}'"))
    })?;
    let name = name.trim();
    if name.is_empty() {
        return Err(MigrateError::Config(format!(
            "parameter name missing in '{assignment}'"
        )));
    }

    // anything that does not read as a YAML scalar is taken verbatim
    let value = match serde_yaml::from_str::<Value>(raw) {
        Ok(value @ (Value::Bool(_) | Value::Number(_) | Value::String(_))) => value,
        Ok(Value::Null) if !raw.is_empty() => Value::Null,
        _ => Value::String(raw.to_string()),
    };
    Ok((name.to_string(), parameter_value(name, &value)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Action;

    const CONFIG: &str = r#"
origin:
  path: hr.db
destination:
  path: warehouse.db
migration:
  batch_size: 4
parameters:
  creation_date: "2024-01-31 12:00:00"
  region: 7
  ratio: 0.5
  active: true
  missing: ~
before:
  - target: destination
    sql: |
      DELETE FROM emp;
      DELETE FROM dept;
after:
  - target: destination
    sql: UPDATE dept SET loaded = 1
steps:
  - name: Load departments
    select: SELECT deptno, dname FROM dept
    insert: INSERT INTO dept(deptno, dname, created) VALUES(:deptno, :dname, :creation_date)
  - name: Load employees
    select: SELECT empno, ename, deptno FROM emp
    insert: INSERT INTO emp(empno, ename, deptno) VALUES(:empno, :ename, :deptno)
    batch_size: 2
"#;

    #[test]
    fn test_from_yaml_and_plan() {
        let config = Config::from_yaml(CONFIG).unwrap();
        let plan = config.plan().unwrap();

        // two before statements, two steps, one after statement
        assert_eq!(plan.actions().len(), 5);
        let steps: Vec<&str> = plan.steps().map(|s| s.name()).collect();
        assert_eq!(steps, ["Load departments", "Load employees"]);
        assert_eq!(plan.steps().nth(1).unwrap().batch_size_override(), Some(2));
        assert!(matches!(plan.actions()[0], Action::Statement(_)));
        assert!(plan.commit_at_end());
    }

    #[test]
    fn test_database_by_target() {
        let config = Config::from_yaml(CONFIG).unwrap();
        assert_eq!(config.database(Target::Origin).path, "hr.db");
        assert_eq!(config.database(Target::Destination).path, "warehouse.db");
    }

    #[test]
    fn test_parameters_convert_scalars() {
        let config = Config::from_yaml(CONFIG).unwrap();
        let parameters = config.parameters().unwrap();

        assert_eq!(
            parameters["creation_date"],
            SqlValue::text_owned("2024-01-31 12:00:00")
        );
        assert_eq!(parameters["region"], SqlValue::I64(7));
        assert_eq!(parameters["ratio"], SqlValue::F64(0.5));
        assert_eq!(parameters["active"], SqlValue::Bool(true));
        assert!(parameters["missing"].is_null());
    }

    #[test]
    fn test_non_scalar_parameter_rejected() {
        let value: Value = serde_yaml::from_str("[1, 2]").unwrap();
        assert!(parameter_value("ids", &value).is_err());
    }

    #[test]
    fn test_parse_parameter() {
        assert_eq!(
            parse_parameter("deptno=10").unwrap(),
            ("deptno".to_string(), SqlValue::I64(10))
        );
        assert_eq!(
            parse_parameter("dname=SALES").unwrap(),
            ("dname".to_string(), SqlValue::text_owned("SALES"))
        );
        assert_eq!(
            parse_parameter("note=a: b").unwrap().1,
            SqlValue::text_owned("a: b")
        );
        assert_eq!(
            parse_parameter("empty=").unwrap().1,
            SqlValue::text_owned("")
        );
        assert!(parse_parameter("novalue").is_err());
        assert!(parse_parameter("=1").is_err());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = Config::load("/nonexistent/migration.yaml").unwrap_err();
        assert!(matches!(err, MigrateError::Io(_)));
    }
}
