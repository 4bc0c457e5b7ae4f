//! Compile-then-execute contract shared by every plan action.
//!
//! Compiling prepares an action against a [`Runtime`] without running it and
//! either yields an executable or every reason it cannot run. Executing
//! consumes the executable, so its statements are released exactly once
//! whether it succeeds, fails or is never run.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{Connection, Parameters};
use crate::error::{MigrateError, Result};
use crate::sql::{PreparedSql, SqlTemplate};

/// When a statement action runs relative to the steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timing {
    Before,
    After,
}

impl fmt::Display for Timing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timing::Before => f.write_str("before"),
            Timing::After => f.write_str("after"),
        }
    }
}

/// Which of the two databases an action runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Origin,
    Destination,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Origin => f.write_str("origin"),
            Target::Destination => f.write_str("destination"),
        }
    }
}

/// Live bindings for one run of a plan.
#[derive(Clone, Copy)]
pub struct Runtime<'c> {
    pub origin: &'c dyn Connection,
    pub destination: &'c dyn Connection,
    /// Constants available to every template.
    pub parameters: &'c Parameters,
    /// Rows per batch for steps that do not set their own.
    pub batch_size: usize,
}

impl<'c> Runtime<'c> {
    pub fn connection(&self, target: Target) -> &'c dyn Connection {
        match target {
            Target::Origin => self.origin,
            Target::Destination => self.destination,
        }
    }
}

/// Turns a declared action into something runnable.
pub trait ActionCompiler {
    type Compiled<'c>: Executable;

    /// Prepare the action. Never executes anything.
    ///
    /// On failure, everything this call managed to prepare has already been
    /// released.
    fn compile<'c>(
        &self,
        runtime: &Runtime<'c>,
    ) -> std::result::Result<Self::Compiled<'c>, Vec<MigrateError>>;
}

/// A compiled action.
pub trait Executable {
    type Output;

    fn execute(self) -> Result<Self::Output>;
}

/// A standalone statement run before or after the steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementAction {
    timing: Timing,
    target: Target,
    template: SqlTemplate,
}

impl StatementAction {
    pub fn new(timing: Timing, target: Target, template: SqlTemplate) -> Self {
        Self {
            timing,
            target,
            template,
        }
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn template(&self) -> &SqlTemplate {
        &self.template
    }
}

impl ActionCompiler for StatementAction {
    type Compiled<'c> = CompiledStatement<'c>;

    fn compile<'c>(
        &self,
        runtime: &Runtime<'c>,
    ) -> std::result::Result<CompiledStatement<'c>, Vec<MigrateError>> {
        self.template
            .prepare(runtime.connection(self.target), runtime.parameters)
            .map(|prepared| CompiledStatement {
                timing: self.timing,
                target: self.target,
                prepared,
            })
            .map_err(|e| {
                vec![MigrateError::preparation(
                    format!(
                        "'{}' statement on {} ({})",
                        self.timing,
                        self.target,
                        self.template.sql()
                    ),
                    e,
                )]
            })
    }
}

/// A prepared before/after statement.
#[derive(Debug)]
pub struct CompiledStatement<'c> {
    timing: Timing,
    target: Target,
    prepared: PreparedSql<'c>,
}

impl Executable for CompiledStatement<'_> {
    type Output = ();

    /// Run the statement for its side effect.
    ///
    /// A query declared as a hook is not read and is skipped.
    fn execute(mut self) -> Result<()> {
        if self.prepared.is_query() {
            debug!(
                "Skipping query declared as '{}' statement on {}: {}",
                self.timing,
                self.target,
                self.prepared.sql()
            );
            return Ok(());
        }

        let affected = self.prepared.execute().map_err(|e| {
            MigrateError::execution(
                format!(
                    "'{}' on {} ({})",
                    self.timing,
                    self.target,
                    self.prepared.sql()
                ),
                e,
            )
        })?;
        debug!(
            "Executed '{}' statement on {} ({} rows affected)",
            self.timing, self.target, affected
        );
        Ok(())
    }
}
