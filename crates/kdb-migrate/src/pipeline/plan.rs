//! The migration plan and its run lifecycle.

use tracing::{debug, info, warn};

use crate::core::{Connection, Parameters};
use crate::error::{MigrateError, Result};
use crate::sql::SqlTemplate;

use super::action::{
    ActionCompiler, CompiledStatement, Executable, Runtime, StatementAction, Target, Timing,
};
use super::step::{CompiledStep, Step, StepResult};

/// One declared unit of plan work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Statement(StatementAction),
    Step(Step),
}

/// An ordered set of actions plus the policy wrapping a run.
///
/// Built and validated once through [`MigrationPlan::builder`], then run any
/// number of times against fresh connection pairs.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    actions: Vec<Action>,
    commit_at_end: bool,
    auto_close: bool,
}

/// Everything a run prepared, grouped by phase.
struct CompiledPlan<'c> {
    before: Vec<CompiledStatement<'c>>,
    steps: Vec<CompiledStep<'c>>,
    after: Vec<CompiledStatement<'c>>,
}

impl MigrationPlan {
    pub fn builder() -> MigrationPlanBuilder {
        MigrationPlanBuilder::default()
    }

    /// Actions in declaration order.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.actions.iter().filter_map(|action| match action {
            Action::Step(step) => Some(step),
            Action::Statement(_) => None,
        })
    }

    pub fn commit_at_end(&self) -> bool {
        self.commit_at_end
    }

    pub fn auto_close(&self) -> bool {
        self.auto_close
    }

    fn statements(&self, timing: Timing) -> impl Iterator<Item = &StatementAction> {
        self.actions.iter().filter_map(move |action| match action {
            Action::Statement(statement) if statement.timing() == timing => Some(statement),
            _ => None,
        })
    }

    /// Run the plan against two open connections.
    ///
    /// Compiles every action, executes before-statements, steps and
    /// after-statements in that order, then commits both connections when
    /// `commit_at_end` is set. Any failure with `commit_at_end` set rolls both
    /// connections back. With `auto_close` set both connections are closed
    /// whatever the outcome. Rollback and close errors are logged and dropped.
    ///
    /// Compile and commit failures come back as a
    /// [`MigrateError::Aggregate`]; an execution failure comes back alone.
    pub fn run(
        &self,
        origin: &mut dyn Connection,
        destination: &mut dyn Connection,
        parameters: &Parameters,
        batch_size: usize,
    ) -> Result<Vec<StepResult>> {
        let outcome = self.run_and_commit(&*origin, &*destination, parameters, batch_size);

        if let Err(e) = &outcome {
            if self.commit_at_end {
                warn!("Migration failed, rolling back: {}", e);
                rollback(Target::Origin, &*origin);
                rollback(Target::Destination, &*destination);
            }
        }

        if self.auto_close {
            close(Target::Origin, origin);
            close(Target::Destination, destination);
        }

        outcome
    }

    /// Compile every action and release it without executing anything.
    ///
    /// Reports the same aggregate as [`run`](MigrationPlan::run) would for
    /// the compile phase. Never commits, rolls back or closes.
    pub fn dry_run(
        &self,
        origin: &dyn Connection,
        destination: &dyn Connection,
        parameters: &Parameters,
        batch_size: usize,
    ) -> Result<()> {
        let runtime = runtime(origin, destination, parameters, batch_size)?;
        let compiled = self.compile(&runtime)?;
        info!(
            "Dry run: {} before statements, {} steps, {} after statements compiled",
            compiled.before.len(),
            compiled.steps.len(),
            compiled.after.len()
        );
        Ok(())
    }

    fn run_and_commit(
        &self,
        origin: &dyn Connection,
        destination: &dyn Connection,
        parameters: &Parameters,
        batch_size: usize,
    ) -> Result<Vec<StepResult>> {
        let runtime = runtime(origin, destination, parameters, batch_size)?;

        info!("Compiling migration plan ({} actions)", self.actions.len());
        let compiled = self.compile(&runtime)?;

        let results = execute(compiled)?;

        if self.commit_at_end {
            commit(origin, destination)?;
            debug!("Committed origin and destination");
        }

        let rows: u64 = results.iter().map(|r| r.count).sum();
        info!("Migration complete: {} steps, {} rows", results.len(), rows);
        Ok(results)
    }

    /// Compile before-statements, steps and after-statements.
    ///
    /// Every action is attempted. If any fails, everything that did compile
    /// is dropped, releasing its statements, before the aggregate returns.
    fn compile<'c>(&self, runtime: &Runtime<'c>) -> Result<CompiledPlan<'c>> {
        let mut failures = Vec::new();

        let before = compile_all(self.statements(Timing::Before), runtime, &mut failures);
        let steps = compile_all(self.steps(), runtime, &mut failures);
        let after = compile_all(self.statements(Timing::After), runtime, &mut failures);

        if !failures.is_empty() {
            return Err(MigrateError::aggregate("compiling migration plan", failures));
        }
        Ok(CompiledPlan {
            before,
            steps,
            after,
        })
    }
}

fn runtime<'c>(
    origin: &'c dyn Connection,
    destination: &'c dyn Connection,
    parameters: &'c Parameters,
    batch_size: usize,
) -> Result<Runtime<'c>> {
    if batch_size == 0 {
        return Err(MigrateError::Validation(format!(
            "Invalid batch size: {batch_size}"
        )));
    }
    Ok(Runtime {
        origin,
        destination,
        parameters,
        batch_size,
    })
}

fn compile_all<'a, 'c, A>(
    actions: impl Iterator<Item = &'a A>,
    runtime: &Runtime<'c>,
    failures: &mut Vec<MigrateError>,
) -> Vec<A::Compiled<'c>>
where
    A: ActionCompiler + 'a,
{
    let mut compiled = Vec::new();
    for action in actions {
        match action.compile(runtime) {
            Ok(executable) => compiled.push(executable),
            Err(mut errors) => failures.append(&mut errors),
        }
    }
    compiled
}

/// Run every phase in order, stopping at the first failure.
///
/// Unexecuted actions are dropped on the way out.
fn execute(compiled: CompiledPlan<'_>) -> Result<Vec<StepResult>> {
    let CompiledPlan {
        before,
        steps,
        after,
    } = compiled;

    info!("Phase 1: Running {} before statements", before.len());
    execute_all(before)?;

    info!("Phase 2: Running {} migration steps", steps.len());
    let results = execute_all(steps)?;

    info!("Phase 3: Running {} after statements", after.len());
    execute_all(after)?;

    Ok(results)
}

fn execute_all<E: Executable>(executables: Vec<E>) -> Result<Vec<E::Output>> {
    let mut outputs = Vec::with_capacity(executables.len());
    for executable in executables {
        outputs.push(executable.execute()?);
    }
    Ok(outputs)
}

/// Commit both connections, attempting the second even if the first fails.
fn commit(origin: &dyn Connection, destination: &dyn Connection) -> Result<()> {
    let failures: Vec<MigrateError> = [(Target::Origin, origin), (Target::Destination, destination)]
        .into_iter()
        .filter_map(|(target, connection)| {
            connection
                .commit()
                .err()
                .map(|source| MigrateError::Commit { target, source })
        })
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(MigrateError::aggregate("committing migration", failures))
    }
}

fn rollback(target: Target, connection: &dyn Connection) {
    if let Err(e) = connection.rollback() {
        debug!("Ignoring rollback failure on {} database: {}", target, e);
    }
}

fn close(target: Target, connection: &mut dyn Connection) {
    if let Err(e) = connection.close() {
        debug!("Ignoring close failure on {} database: {}", target, e);
    }
}

/// Collects actions and policy for a [`MigrationPlan`].
#[derive(Debug, Clone)]
pub struct MigrationPlanBuilder {
    actions: Vec<Action>,
    commit_at_end: bool,
    auto_close: bool,
}

impl Default for MigrationPlanBuilder {
    fn default() -> Self {
        Self {
            actions: Vec::new(),
            commit_at_end: true,
            auto_close: true,
        }
    }
}

impl MigrationPlanBuilder {
    /// Commit both connections after a successful run, roll back on failure.
    pub fn commit_at_end(mut self, commit_at_end: bool) -> Self {
        self.commit_at_end = commit_at_end;
        self
    }

    /// Close both connections when the run ends.
    pub fn auto_close(mut self, auto_close: bool) -> Self {
        self.auto_close = auto_close;
        self
    }

    /// Add one before-statement per `;`-separated statement in `block`.
    pub fn before(self, target: Target, block: &str) -> Self {
        self.statements(Timing::Before, target, block)
    }

    /// Add one after-statement per `;`-separated statement in `block`.
    pub fn after(self, target: Target, block: &str) -> Self {
        self.statements(Timing::After, target, block)
    }

    pub fn step(mut self, step: Step) -> Self {
        self.actions.push(Action::Step(step));
        self
    }

    fn statements(mut self, timing: Timing, target: Target, block: &str) -> Self {
        self.actions.extend(
            SqlTemplate::parse_block(block)
                .into_iter()
                .map(|template| Action::Statement(StatementAction::new(timing, target, template))),
        );
        self
    }

    /// Validate every step and the plan as a whole.
    ///
    /// A single problem is returned as is; several are aggregated.
    pub fn build(self) -> Result<MigrationPlan> {
        let mut failures: Vec<MigrateError> = self
            .actions
            .iter()
            .filter_map(|action| match action {
                Action::Step(step) => step.validate().err(),
                Action::Statement(_) => None,
            })
            .collect();

        if !self.actions.iter().any(|a| matches!(a, Action::Step(_))) {
            failures.push(MigrateError::Validation(
                "No migration steps specified".to_string(),
            ));
        }

        match failures.len() {
            0 => Ok(MigrationPlan {
                actions: self.actions,
                commit_at_end: self.commit_at_end,
                auto_close: self.auto_close,
            }),
            1 => Err(failures.remove(0)),
            _ => Err(MigrateError::aggregate("validating migration plan", failures)),
        }
    }
}
