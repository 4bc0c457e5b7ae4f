//! Configuration type definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::pipeline::Target;
use crate::transfer::DEFAULT_BATCH_SIZE;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database rows are read from.
    pub origin: DatabaseConfig,

    /// Database rows are written to.
    pub destination: DatabaseConfig,

    /// Run policy.
    #[serde(default)]
    pub migration: MigrationConfig,

    /// Constants available to every statement as `:name`.
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_yaml::Value>,

    /// Statement blocks run before the steps, in order.
    #[serde(default)]
    pub before: Vec<HookConfig>,

    /// Statement blocks run after the steps, in order.
    #[serde(default)]
    pub after: Vec<HookConfig>,

    /// Select → insert steps, in order.
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// Connection settings for one database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Driver name (default: "sqlite").
    #[serde(default = "default_sqlite")]
    pub r#type: String,

    /// Database file path, or `:memory:`.
    #[serde(default)]
    pub path: String,
}

/// Run policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Rows per insert batch for steps without their own (default: 1024).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Commit both databases on success, roll both back on failure (default: true).
    #[serde(default = "default_true")]
    pub commit_at_end: bool,

    /// Close both connections when the run ends (default: true).
    #[serde(default = "default_true")]
    pub auto_close: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            commit_at_end: true,
            auto_close: true,
        }
    }
}

/// A block of `;`-separated statements run on one database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookConfig {
    pub target: Target,
    pub sql: String,
}

/// One select → insert step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepConfig {
    pub name: String,

    /// Query run on the origin.
    pub select: String,

    /// Insert run on the destination once per selected row.
    pub insert: String,

    /// Overrides `migration.batch_size` for this step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
}

fn default_sqlite() -> String {
    "sqlite".to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let yaml = r#"
origin:
  path: hr.db
destination:
  path: warehouse.db
steps:
  - name: Load departments
    select: SELECT deptno, dname FROM dept
    insert: INSERT INTO dept(deptno, dname) VALUES(:deptno, :dname)
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.origin.r#type, "sqlite");
        assert_eq!(config.migration, MigrationConfig::default());
        assert_eq!(config.migration.batch_size, 1024);
        assert!(config.parameters.is_empty());
        assert!(config.before.is_empty());
        assert_eq!(config.steps[0].batch_size, None);
    }

    #[test]
    fn test_hooks_and_overrides() {
        let yaml = r#"
origin:
  type: sqlite
  path: hr.db
destination:
  path: warehouse.db
migration:
  batch_size: 500
  commit_at_end: false
before:
  - target: destination
    sql: DELETE FROM emp; DELETE FROM dept
after:
  - target: origin
    sql: UPDATE export_log SET done = 1
steps:
  - name: Load employees
    select: SELECT * FROM emp
    insert: INSERT INTO emp(empno) VALUES(:empno)
    batch_size: 100
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.migration.batch_size, 500);
        assert!(!config.migration.commit_at_end);
        assert!(config.migration.auto_close);
        assert_eq!(config.before[0].target, Target::Destination);
        assert_eq!(config.after[0].target, Target::Origin);
        assert_eq!(config.steps[0].batch_size, Some(100));
    }

    #[test]
    fn test_unknown_target_rejected() {
        let yaml = r#"
origin: { path: a.db }
destination: { path: b.db }
before:
  - target: both
    sql: DELETE FROM emp
"#;
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }
}
