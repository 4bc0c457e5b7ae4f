//! Configuration validation.

use std::collections::HashSet;

use super::{Config, DatabaseConfig};
use crate::drivers::{IN_MEMORY_PATH, SUPPORTED_TYPES};
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    validate_database("origin", &config.origin)?;
    validate_database("destination", &config.destination)?;

    // Cannot migrate into the database being read
    if config.origin.r#type == config.destination.r#type
        && config.origin.path == config.destination.path
        && config.origin.path != IN_MEMORY_PATH
    {
        return Err(MigrateError::Config(
            "origin and destination cannot be the same database".into(),
        ));
    }

    if config.migration.batch_size == 0 {
        return Err(MigrateError::Config(
            "migration.batch_size must be at least 1".into(),
        ));
    }

    for (name, value) in &config.parameters {
        super::parameter_value(name, value)?;
    }

    for (phase, hooks) in [("before", &config.before), ("after", &config.after)] {
        if let Some(i) = hooks.iter().position(|hook| hook.sql.trim().is_empty()) {
            return Err(MigrateError::Config(format!("{phase}[{i}].sql is required")));
        }
    }

    if config.steps.is_empty() {
        return Err(MigrateError::Config(
            "at least one step is required".into(),
        ));
    }

    let mut names = HashSet::new();
    for (i, step) in config.steps.iter().enumerate() {
        if step.name.trim().is_empty() {
            return Err(MigrateError::Config(format!("steps[{i}].name is required")));
        }
        if !names.insert(step.name.as_str()) {
            return Err(MigrateError::Config(format!(
                "duplicate step name '{}'",
                step.name
            )));
        }
        if step.select.trim().is_empty() {
            return Err(MigrateError::Config(format!(
                "steps[{i}].select is required"
            )));
        }
        if step.insert.trim().is_empty() {
            return Err(MigrateError::Config(format!(
                "steps[{i}].insert is required"
            )));
        }
        if let Some(0) = step.batch_size {
            return Err(MigrateError::Config(format!(
                "steps[{i}].batch_size must be at least 1"
            )));
        }
    }

    Ok(())
}

fn validate_database(side: &str, database: &DatabaseConfig) -> Result<()> {
    if !SUPPORTED_TYPES.contains(&database.r#type.as_str()) {
        return Err(MigrateError::Config(format!(
            "{side}.type must be one of {:?}, got '{}'",
            SUPPORTED_TYPES, database.r#type
        )));
    }
    if database.path.trim().is_empty() {
        return Err(MigrateError::Config(format!("{side}.path is required")));
    }
    Ok(())
}
