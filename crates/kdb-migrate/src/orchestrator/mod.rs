//! Migration orchestrator - main workflow coordinator.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Config;
use crate::core::{Connection, DriverResult, Parameters, SqlValue};
use crate::drivers;
use crate::error::Result;
use crate::pipeline::{MigrationPlan, StepResult, Target};

/// Migration orchestrator.
///
/// Owns the two connections and the plan built from a [`Config`].
pub struct Orchestrator {
    plan: MigrationPlan,
    parameters: Parameters,
    batch_size: usize,
    origin: Box<dyn Connection>,
    destination: Box<dyn Connection>,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status ("completed" or "dry_run").
    pub status: String,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Rows transferred per step. A dry run reports zero for every step.
    pub steps: Vec<StepResult>,

    /// Total rows transferred.
    pub rows_transferred: u64,

    /// Average throughput (rows/second).
    pub rows_per_second: u64,
}

impl MigrationResult {
    /// Serialize as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Connectivity of both databases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub origin_connected: bool,
    pub origin_latency_ms: u64,
    pub origin_error: Option<String>,
    pub destination_connected: bool,
    pub destination_latency_ms: u64,
    pub destination_error: Option<String>,
    /// Both databases answered.
    pub healthy: bool,
}

impl Orchestrator {
    /// Validate `config`, build its plan and connect to both databases.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let plan = config.plan()?;
        let parameters = config.parameters()?;
        let batch_size = config.migration.batch_size;

        let origin = drivers::connect(config.database(Target::Origin), Target::Origin)?;
        let destination =
            drivers::connect(config.database(Target::Destination), Target::Destination)?;

        Ok(Self {
            plan,
            parameters,
            batch_size,
            origin,
            destination,
        })
    }

    /// Add or replace a constant available to every statement.
    pub fn with_parameter(mut self, name: impl Into<String>, value: SqlValue<'static>) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    /// Override `migration.batch_size`.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn plan(&self) -> &MigrationPlan {
        &self.plan
    }

    /// Run the migration, or only compile it when `dry_run` is set.
    pub fn run(mut self, dry_run: bool) -> Result<MigrationResult> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let start = Instant::now();

        info!("Starting migration run: {}", run_id);
        info!(
            "Plan: {} steps, {} parameters, batch size {}",
            self.plan.steps().count(),
            self.parameters.len(),
            self.batch_size
        );

        let steps = if dry_run {
            self.plan.dry_run(
                self.origin.as_ref(),
                self.destination.as_ref(),
                &self.parameters,
                self.batch_size,
            )?;
            self.plan
                .steps()
                .map(|step| StepResult::new(step.name(), 0))
                .collect()
        } else {
            self.plan.run(
                self.origin.as_mut(),
                self.destination.as_mut(),
                &self.parameters,
                self.batch_size,
            )?
        };

        let duration = start.elapsed();
        let rows_transferred: u64 = steps.iter().map(|s| s.count).sum();
        let rows_per_second = if duration.as_secs_f64() > 0.0 {
            (rows_transferred as f64 / duration.as_secs_f64()) as u64
        } else {
            0
        };

        let result = MigrationResult {
            run_id,
            status: if dry_run { "dry_run" } else { "completed" }.to_string(),
            duration_seconds: duration.as_secs_f64(),
            started_at,
            completed_at: Utc::now(),
            steps,
            rows_transferred,
            rows_per_second,
        };

        info!(
            "Migration {}: {} rows in {:.2}s ({} rows/sec)",
            result.status, result.rows_transferred, result.duration_seconds, result.rows_per_second
        );
        Ok(result)
    }

    /// Run `SELECT 1` on both databases.
    pub fn health_check(&self) -> Result<HealthCheckResult> {
        let (origin_latency_ms, origin_error) = probe(self.origin.as_ref());
        let (destination_latency_ms, destination_error) = probe(self.destination.as_ref());

        Ok(HealthCheckResult {
            origin_connected: origin_error.is_none(),
            origin_latency_ms,
            destination_connected: destination_error.is_none(),
            destination_latency_ms,
            healthy: origin_error.is_none() && destination_error.is_none(),
            origin_error,
            destination_error,
        })
    }
}

fn probe(connection: &dyn Connection) -> (u64, Option<String>) {
    let start = Instant::now();
    let error = ping(connection).err().map(|e| e.to_string());
    (start.elapsed().as_millis() as u64, error)
}

fn ping(connection: &dyn Connection) -> DriverResult<()> {
    let mut statement = connection.prepare("SELECT 1")?;
    let mut rows = statement.query()?;
    rows.next_row()?;
    Ok(())
}
