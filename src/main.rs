//! sensor-risk - Industrial Sensor Risk Engine
//!
//! Scores sensor readings for anomaly risk and forecasts time to critical
//! limits. Predictions are written to stdout as JSON lines; logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Simulated plant: random-walk readings for two machines every 5s
//! cargo run --release
//!
//! # Score a phased scenario feed
//! ./simulation --seed 7 | ./sensor-risk --stdin
//!
//! # Replay a CSV file (machine_id,sensor_type,value[,timestamp])
//! ./sensor-risk --csv readings.csv
//!
//! # Train and persist outlier models, write a starter config
//! ./sensor-risk train
//! ./sensor-risk init-config sensor_risk.toml
//! ```
//!
//! # Environment Variables
//!
//! - `SENSOR_RISK_CONFIG`: Path to the engine config TOML (default: ./sensor_risk.toml)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use sensor_risk::config::defaults::{EVICTION_EVERY_TICKS, SIMULATION_TICK_MS};
use sensor_risk::model::training::generate_sample_training_data;
use sensor_risk::source::{self, RandomWalk};
use sensor_risk::{
    AlertLevel, AlertPolicy, EngineConfig, ModelBank, Observation, PredictionResult,
    ProfileRegistry, RiskEngine,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "sensor-risk")]
#[command(about = "Industrial sensor anomaly scoring and trend forecasting")]
#[command(version)]
struct CliArgs {
    /// Engine config file (overrides SENSOR_RISK_CONFIG and ./sensor_risk.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Read JSON-lines observations from stdin
    #[arg(long, conflicts_with = "csv")]
    stdin: bool,

    /// Replay observations from a CSV file
    #[arg(long, value_name = "PATH")]
    csv: Option<PathBuf>,

    /// Simulated machines (simulation mode)
    #[arg(long, default_value = "2", value_parser = clap::value_parser!(u16).range(1..=1000))]
    machines: u16,

    /// Milliseconds between simulated ticks
    #[arg(long, default_value_t = SIMULATION_TICK_MS)]
    interval_ms: u64,

    /// Stop each simulated machine after this many ticks
    #[arg(long)]
    ticks: Option<u64>,

    /// Only print readings that trigger an alert
    #[arg(long)]
    alerts_only: bool,

    /// Score with the threshold fallback only (skip outlier models)
    #[arg(long)]
    no_models: bool,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Train outlier models for every configured sensor type and save them
    Train,

    /// Print synthetic observations as JSON lines
    SampleData {
        /// Total observations, split evenly across machine/sensor pairs
        #[arg(long, default_value = "1000")]
        samples: usize,

        /// Machine ids (comma-separated; defaults to machine-001,machine-002)
        #[arg(long, value_delimiter = ',')]
        machines: Vec<String>,

        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Write the default engine config as TOML
    InitConfig {
        /// Destination path
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

// ============================================================================
// Output
// ============================================================================

#[derive(Serialize)]
struct ScoredReading<'a> {
    machine_id: &'a str,
    sensor_type: &'a str,
    value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<DateTime<Utc>>,
    #[serde(flatten)]
    prediction: &'a PredictionResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    alert: Option<AlertLevel>,
}

/// Log escalations and print the scored reading.
fn emit(obs: &Observation, result: &PredictionResult, policy: &AlertPolicy, alerts_only: bool) -> Result<()> {
    let decision = policy.evaluate(result);
    let level = decision.level();

    match level {
        Some(AlertLevel::EmergencyStop) => error!(
            machine = %obs.machine_id,
            sensor = %obs.sensor_type,
            risk = result.risk_probability,
            "Emergency stop: {}", result.message
        ),
        Some(AlertLevel::Alert) => warn!(
            machine = %obs.machine_id,
            sensor = %obs.sensor_type,
            risk = result.risk_probability,
            "Alert: {}", result.message
        ),
        Some(AlertLevel::Predictive) => warn!(
            machine = %obs.machine_id,
            sensor = %obs.sensor_type,
            risk = result.risk_probability,
            "Predictive alert: {} within {} minutes", result.message, result.time_to_threshold
        ),
        Some(AlertLevel::AtRisk) | None => {}
    }

    if alerts_only && !decision.is_notable() {
        return Ok(());
    }

    let record = ScoredReading {
        machine_id: &obs.machine_id,
        sensor_type: &obs.sensor_type,
        value: obs.value,
        timestamp: obs.timestamp,
        prediction: result,
        alert: level,
    };
    println!("{}", serde_json::to_string(&record).context("Failed to serialize prediction")?);
    Ok(())
}

// ============================================================================
// Input Modes
// ============================================================================

/// Score JSON-lines observations from stdin until EOF or cancellation.
async fn run_stdin(engine: Arc<RiskEngine>, policy: AlertPolicy, alerts_only: bool, cancel: CancellationToken) -> Result<u64> {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut scored = 0u64;

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line.context("Failed to read stdin")?,
        };
        let Some(line) = line else { break };

        match source::parse_json_line(&line) {
            Ok(Some(obs)) => {
                let result = engine.predict(&obs);
                emit(&obs, &result, &policy, alerts_only)?;
                scored += 1;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Skipping malformed observation"),
        }
    }
    Ok(scored)
}

/// Score every row of a CSV file in order.
fn run_csv(engine: &RiskEngine, path: &std::path::Path, policy: AlertPolicy, alerts_only: bool, cancel: &CancellationToken) -> Result<u64> {
    let observations = source::read_csv_observations(path)
        .with_context(|| format!("Failed to load observations from {}", path.display()))?;

    let mut scored = 0u64;
    for obs in &observations {
        if cancel.is_cancelled() {
            break;
        }
        let result = engine.predict(obs);
        emit(obs, &result, &policy, alerts_only)?;
        scored += 1;
    }
    Ok(scored)
}

#[derive(Debug, Clone)]
enum TaskName {
    Machine(String),
    Evictor,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::Machine(id) => write!(f, "Machine[{}]", id),
            TaskName::Evictor => write!(f, "Evictor"),
        }
    }
}

/// Spawn one random-walk ingestion task per machine.
fn spawn_machine_tasks(
    task_set: &mut JoinSet<Result<TaskName>>,
    engine: &Arc<RiskEngine>,
    args: &CliArgs,
    policy: AlertPolicy,
    cancel_token: &CancellationToken,
) {
    for n in 1..=args.machines {
        let machine_id = format!("machine-{:03}", n);
        let mut walk = RandomWalk::new(machine_id.as_str(), engine.registry());
        let engine = Arc::clone(engine);
        let cancel = cancel_token.clone();
        let interval_ms = args.interval_ms.max(1);
        let max_ticks = args.ticks;
        let alerts_only = args.alerts_only;

        task_set.spawn(async move {
            info!("[{}] Task starting", walk.machine_id());
            let mut rng = StdRng::from_entropy();
            let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
            let mut ticks = 0u64;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        for obs in walk.tick(&mut rng) {
                            let result = engine.predict(&obs);
                            emit(&obs, &result, &policy, alerts_only)?;
                        }
                        ticks += 1;
                        if max_ticks.is_some_and(|max| ticks >= max) {
                            break;
                        }
                    }
                }
            }
            Ok(TaskName::Machine(machine_id))
        });
    }
}

/// Spawn the idle-history evictor when a TTL is configured.
fn spawn_evictor(task_set: &mut JoinSet<Result<TaskName>>, engine: &Arc<RiskEngine>, interval_ms: u64, cancel: CancellationToken) {
    if engine.config().engine.idle_ttl_secs.is_none() {
        return;
    }
    let engine = Arc::clone(engine);
    let period = Duration::from_millis(interval_ms.max(1).saturating_mul(EVICTION_EVERY_TICKS));

    task_set.spawn(async move {
        let mut interval = tokio::time::interval(period);
        // First tick fires immediately
        interval.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    engine.evict_idle();
                }
            }
        }
        Ok(TaskName::Evictor)
    });
}

/// Monitor tasks; cancel everything on the first failure or once every
/// machine task has finished.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    mut machines_running: usize,
    cancel_token: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("Supervisor: shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("Supervisor: task {} completed", task_name);
                        if matches!(task_name, TaskName::Machine(_)) {
                            machines_running = machines_running.saturating_sub(1);
                            if machines_running == 0 {
                                info!("Supervisor: all machines finished");
                                cancel_token.cancel();
                                break;
                            }
                        }
                    }
                    Some(Ok(Err(e))) => {
                        error!("Supervisor: task failed with error: {}", e);
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!("Supervisor: task panicked: {}", e);
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {
                        info!("Supervisor: all tasks completed");
                        break;
                    }
                }
            }
        }
    }

    while let Some(result) = task_set.join_next().await {
        if let Ok(Ok(task_name)) = result {
            info!("Supervisor: task {} stopped", task_name);
        }
    }
    Ok(())
}

// ============================================================================
// Subcommands
// ============================================================================

fn run_train(config: &EngineConfig) -> Result<()> {
    let registry = ProfileRegistry::from_config(config).context("Invalid sensor profiles")?;
    let bank = ModelBank::train_all(&registry, &config.models).context("Model training failed")?;
    info!(models = bank.len(), dir = %config.models.dir.display(), "Training complete");
    Ok(())
}

fn run_sample_data(config: &EngineConfig, samples: usize, machines: &[String], seed: Option<u64>) -> Result<()> {
    let registry = ProfileRegistry::from_config(config).context("Invalid sensor profiles")?;
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let data = generate_sample_training_data(&registry, samples, machines, &mut rng);
    for obs in &data {
        println!("{}", serde_json::to_string(obs)?);
    }
    info!(count = data.len(), "Sample data written");
    Ok(())
}

fn run_init_config(path: &std::path::Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    EngineConfig::default()
        .save_to_file(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Logs on stderr; stdout carries JSON output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => EngineConfig::load(),
    };

    match &args.command {
        Some(SubCommand::Train) => return run_train(&config),
        Some(SubCommand::SampleData { samples, machines, seed }) => {
            return run_sample_data(&config, *samples, machines, *seed);
        }
        Some(SubCommand::InitConfig { path, force }) => return run_init_config(path, *force),
        None => {}
    }

    let policy = AlertPolicy::from(&config);
    let no_models = args.no_models;
    let engine = tokio::task::spawn_blocking(move || {
        if no_models {
            RiskEngine::with_fallback_only(config)
        } else {
            RiskEngine::from_config(config)
        }
    })
    .await
    .context("Engine initialization task failed")?
    .context("Invalid sensor profiles")?
    .into_shared();

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    if args.stdin {
        info!("Input: stdin (JSON-lines observations)");
        let scored = run_stdin(Arc::clone(&engine), policy, args.alerts_only, cancel_token).await?;
        info!(scored, tracked_keys = engine.tracked_keys(), "stdin closed");
    } else if let Some(path) = &args.csv {
        info!(path = %path.display(), "Input: CSV replay");
        let scored = run_csv(&engine, path, policy, args.alerts_only, &cancel_token)?;
        info!(scored, tracked_keys = engine.tracked_keys(), "CSV replay complete");
    } else {
        info!(
            machines = args.machines,
            interval_ms = args.interval_ms,
            "Input: simulated plant (random walk)"
        );
        let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();
        spawn_machine_tasks(&mut task_set, &engine, &args, policy, &cancel_token);
        spawn_evictor(&mut task_set, &engine, args.interval_ms, cancel_token.clone());
        run_supervisor(&mut task_set, usize::from(args.machines), cancel_token).await?;
    }

    info!("sensor-risk shutdown complete");
    Ok(())
}
