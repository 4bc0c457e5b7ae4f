//! Error types for the migration library.

use thiserror::Error;

use crate::core::DriverError;
use crate::pipeline::Target;

/// Exit code for configuration and plan validation errors.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code for compile-phase failures (statements that could not be prepared).
pub const EXIT_COMPILE_ERROR: u8 = 2;
/// Exit code for execution failures.
pub const EXIT_EXECUTION_ERROR: u8 = 3;
/// Exit code for commit failures.
pub const EXIT_COMMIT_ERROR: u8 = 4;
/// Exit code for connection failures.
pub const EXIT_CONNECTION_ERROR: u8 = 5;
/// Exit code for I/O errors (missing config file, etc.).
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for migration operations.
///
/// Every variant carries a description of what was being attempted. Wrapped
/// causes are reachable through [`std::error::Error::source`].
#[derive(Error, Debug)]
pub enum MigrateError {
    /// The driver reports a different number of placeholders than the template found.
    #[error("Statement parameter count mismatch, expected: {expected}, got: {actual}\n  SQL: {sql}")]
    ParameterCountMismatch {
        sql: String,
        expected: usize,
        actual: usize,
    },

    /// A query references parameters absent from the supplied values.
    #[error("Missing statement parameters: {}\n  SQL: {sql}", missing.join(", "))]
    MissingParameter { sql: String, missing: Vec<String> },

    /// The driver rejected a statement or its parameter binding.
    #[error("Error preparing {context}")]
    Preparation {
        context: String,
        #[source]
        source: DriverError,
    },

    /// The driver failed while executing, flushing a batch or reading rows.
    #[error("Error executing {context}")]
    Execution {
        context: String,
        #[source]
        source: DriverError,
    },

    /// Committing one of the two connections failed.
    #[error("Error committing on {target} database")]
    Commit {
        target: Target,
        #[source]
        source: DriverError,
    },

    /// Structural problem with a step or plan (zero steps, missing SQL, bad batch size).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Several independent failures collected during the same phase.
    #[error("Error {context}: {} failure(s)", failures.len())]
    Aggregate {
        context: String,
        failures: Vec<MigrateError>,
    },

    /// Opening a database connection failed.
    #[error("Error connecting to {target} database")]
    Connection {
        target: Target,
        #[source]
        source: DriverError,
    },

    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Preparation error from any driver-level cause.
    pub fn preparation(context: impl Into<String>, source: impl Into<DriverError>) -> Self {
        MigrateError::Preparation {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Create an Execution error from any driver-level cause.
    pub fn execution(context: impl Into<String>, source: impl Into<DriverError>) -> Self {
        MigrateError::Execution {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Create an Aggregate error.
    pub fn aggregate(context: impl Into<String>, failures: Vec<MigrateError>) -> Self {
        MigrateError::Aggregate {
            context: context.into(),
            failures,
        }
    }

    /// The individual failures behind this error.
    ///
    /// An aggregate yields its children; any other error yields itself.
    pub fn failures(&self) -> Vec<&MigrateError> {
        match self {
            MigrateError::Aggregate { failures, .. } => failures.iter().collect(),
            other => vec![other],
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) | MigrateError::Validation(_) => {
                EXIT_CONFIG_ERROR
            }
            MigrateError::ParameterCountMismatch { .. }
            | MigrateError::MissingParameter { .. }
            | MigrateError::Preparation { .. } => EXIT_COMPILE_ERROR,
            MigrateError::Execution { .. } | MigrateError::Json(_) => EXIT_EXECUTION_ERROR,
            MigrateError::Commit { .. } => EXIT_COMMIT_ERROR,
            MigrateError::Connection { .. } => EXIT_CONNECTION_ERROR,
            MigrateError::Io(_) => EXIT_IO_ERROR,
            MigrateError::Aggregate { failures, .. } => failures
                .first()
                .map(MigrateError::exit_code)
                .unwrap_or(EXIT_COMPILE_ERROR),
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);
        self.append_details(&mut output, 1);
        output
    }

    fn append_details(&self, output: &mut String, indent: usize) {
        let pad = "  ".repeat(indent);

        if let MigrateError::Aggregate { failures, .. } = self {
            for (i, failure) in failures.iter().enumerate() {
                output.push_str(&format!("\n{}{}. {}", pad, i + 1, failure));
                failure.append_details(output, indent + 1);
            }
            return;
        }

        // Add error chain for wrapped errors
        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\n{}Caused by:\n{}  {}: {}", pad, pad, depth, err));
            source = err.source();
            depth += 1;
        }
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
