//! Plan-driven migration pipeline.
//!
//! - [`MigrationPlan`]: ordered actions plus commit/close policy; runs a plan
//!   against an origin and a destination connection
//! - [`Step`]: a named origin query feeding a destination insert
//! - [`StatementAction`]: a statement run before or after the steps
//!
//! # Run lifecycle
//!
//! Every action is first compiled against a [`Runtime`] ([`ActionCompiler`]).
//! Compilation only prepares statements and reports every failure at once.
//! The compiled actions are then executed ([`Executable`]) phase by phase
//! (before, steps, after), stopping at the first failure. A successful run
//! commits both connections; a failed one rolls both back.
//!
//! Statements prepared during compilation are owned by the compiled actions
//! and are released when those are executed or dropped.

mod action;
mod plan;
mod step;

pub use action::{
    ActionCompiler, CompiledStatement, Executable, Runtime, StatementAction, Target, Timing,
};
pub use plan::{Action, MigrationPlan, MigrationPlanBuilder};
pub use step::{CompiledStep, Step, StepResult};
