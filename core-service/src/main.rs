//! TwinShield CLI - ingest telemetry, run simulations, demo fleet

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;

use twinshield_core::constants::{APP_NAME, APP_VERSION};
use twinshield_core::logic::fleet::mock_fleet;
use twinshield_core::logic::ingest::{BatchReport, TelemetryIngestor, TelemetryInput};
use twinshield_core::logic::model::scorer_from_config;
use twinshield_core::logic::response::LogSink;
use twinshield_core::logic::simulation::{RunRecorder, SimulationCoordinator, SimulationRun};
use twinshield_core::logic::twin::InMemoryTwinStore;
use twinshield_core::logic::PipelineConfig;

#[derive(Parser)]
#[command(name = "twinshield", version, about = "Digital-twin threat simulation pipeline")]
struct Cli {
    /// Pre-trained scoring weights (JSON); overrides TWINSHIELD_MODEL_PATH
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    /// Expected SHA-256 of the weights file
    #[arg(long, global = true)]
    model_sha256: Option<String>,

    /// Max concurrent per-device tasks
    #[arg(long, global = true)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize and apply a JSONL telemetry file, print the batch report
    Ingest { file: PathBuf },

    /// Optionally ingest a JSONL file, then run a simulation and print it
    Run {
        #[arg(long)]
        input: Option<PathBuf>,

        /// Append the sealed run to the run log
        #[arg(long, default_value_t = false)]
        record: bool,

        /// Log every recommended action
        #[arg(long, default_value_t = false)]
        emit_actions: bool,
    },

    /// Seed a mock fleet and run a simulation over it
    Demo {
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    log::info!("Starting {} v{}", APP_NAME, APP_VERSION);

    let mut config = PipelineConfig::from_env();
    if let Some(model) = cli.model {
        config.model_path = Some(model);
    }
    if let Some(sha) = cli.model_sha256 {
        config.model_sha256 = Some(sha);
    }
    if let Some(workers) = cli.workers {
        config.max_workers = workers;
    }

    let store = Arc::new(InMemoryTwinStore::new());
    let ingestor = TelemetryIngestor::new(store.clone(), config.clone());

    match cli.command {
        Command::Ingest { file } => {
            let report = ingest_file(&ingestor, &file).await?;
            print_json(&report)?;
        }

        Command::Run { input, record, emit_actions } => {
            if let Some(file) = input {
                let report = ingest_file(&ingestor, &file).await?;
                log::info!("Ingested {} message(s) from {}", report.accepted, file.display());
            }

            let mut coordinator =
                SimulationCoordinator::new(store.clone(), scorer_from_config(&config), config.clone());
            if emit_actions {
                coordinator = coordinator.with_sink(Arc::new(LogSink));
            }

            let run = coordinator.run().await;
            if record {
                record_run(&config, &run)?;
            }
            print_json(&run)?;
        }

        Command::Demo { seed } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let batch = mock_fleet(&mut rng).into_iter().map(TelemetryInput::from).collect();
            let report = ingestor.ingest(batch).await;
            log::info!("Seeded {} mock device(s)", report.devices.len());

            let coordinator = SimulationCoordinator::new(store.clone(), scorer_from_config(&config), config.clone());
            let run = coordinator.run().await;
            print_demo(&run);
        }
    }

    Ok(())
}

async fn ingest_file(ingestor: &TelemetryIngestor, file: &PathBuf) -> Result<BatchReport> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("reading telemetry from {}", file.display()))?;
    Ok(ingestor.ingest_lines(&text).await)
}

fn record_run(config: &PipelineConfig, run: &SimulationRun) -> Result<()> {
    let recorder = RunRecorder::new(config.run_log_dir.clone());
    recorder
        .append(run)
        .with_context(|| format!("appending run to {}", recorder.base_dir().display()))?;
    log::info!("Run {} recorded under {}", run.run_id, recorder.base_dir().display());
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_demo(run: &SimulationRun) {
    println!(
        "Run {}: {} devices, {} high risk, {} low confidence",
        run.run_id, run.total_devices, run.high_risk_count, run.low_confidence_count
    );
    for device in &run.devices {
        println!(
            "  {:<16} {:<11} {:>5.1}%",
            device.device_id,
            device.prediction.predicted_type.display_name(),
            device.prediction.highest_threat * 100.0
        );
        for action in &device.actions {
            println!("      - {}", action.text);
        }
    }
}
