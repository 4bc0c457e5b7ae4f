//! kdb-migrate CLI - run plan-driven row migrations between two databases.

use clap::{Parser, Subcommand};
use kdb_migrate::config::parse_parameter;
use kdb_migrate::{Action, Config, MigrateError, Orchestrator, Timing};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "kdb-migrate")]
#[command(about = "Plan-driven row migration between two databases")]
#[command(version)]
struct Cli {
    /// Path to YAML migration file
    #[arg(short, long, default_value = "migration.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the migration plan
    Run {
        /// Dry run: prepare every statement without executing anything
        #[arg(long)]
        dry_run: bool,

        /// Override migration.batch_size
        #[arg(long)]
        batch_size: Option<usize>,

        /// Set a statement parameter (name=value); may be repeated
        #[arg(long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,
    },

    /// Validate the migration file and plan without connecting
    Validate,

    /// Test database connections
    HealthCheck,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run {
            dry_run,
            batch_size,
            params,
        } => {
            let mut orchestrator = Orchestrator::new(config)?;

            for assignment in &params {
                let (name, value) = parse_parameter(assignment)?;
                orchestrator = orchestrator.with_parameter(name, value);
            }
            if let Some(size) = batch_size {
                orchestrator = orchestrator.with_batch_size(size);
            }

            let result = orchestrator.run(dry_run)?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                let status_msg = if dry_run { "Dry run completed!" } else { "Migration completed!" };
                println!("\n{}", status_msg);
                println!("  Run ID: {}", result.run_id);
                println!("  Duration: {:.2}s", result.duration_seconds);
                for step in &result.steps {
                    println!("  {}", step);
                }
                println!("  Rows: {}", result.rows_transferred);
                println!("  Throughput: {} rows/sec", result.rows_per_second);
            }
        }

        Commands::Validate => {
            let plan = config.plan()?;
            let count = |timing: Timing| {
                plan.actions()
                    .iter()
                    .filter(|a| matches!(a, Action::Statement(s) if s.timing() == timing))
                    .count()
            };

            if cli.output_json {
                let steps: Vec<&str> = plan.steps().map(|s| s.name()).collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "valid": true,
                        "steps": steps,
                        "before_statements": count(Timing::Before),
                        "after_statements": count(Timing::After),
                    }))?
                );
            } else {
                println!("Configuration is valid");
                println!("  Before statements: {}", count(Timing::Before));
                for step in plan.steps() {
                    println!("  Step: {}", step.name());
                }
                println!("  After statements: {}", count(Timing::After));
            }
        }

        Commands::HealthCheck => {
            let orchestrator = Orchestrator::new(config)?;
            let result = orchestrator.health_check()?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Origin: {} ({}ms)",
                    if result.origin_connected { "OK" } else { "FAILED" },
                    result.origin_latency_ms
                );
                if let Some(ref err) = result.origin_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Destination: {} ({}ms)",
                    if result.destination_connected { "OK" } else { "FAILED" },
                    result.destination_latency_ms
                );
                if let Some(ref err) = result.destination_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(MigrateError::Config("Health check failed".to_string()));
            }
        }
    }

    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so --output-json keeps stdout clean
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
