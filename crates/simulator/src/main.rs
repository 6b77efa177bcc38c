//! Simulation entry point.

use common::{Clock, SystemClock};
use event_store::InMemoryEventStore;
use simulator::{Config, LogFormat, Simulation, SimulatorError};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn init_tracing(config: &Config) -> Result<(), SimulatorError> {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    }
    .map_err(|e| SimulatorError::Tracing(e.to_string()))
}

#[tokio::main]
async fn main() -> Result<(), SimulatorError> {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config)?;

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| SimulatorError::Metrics(e.to_string()))?;

    tracing::info!(
        days = config.days,
        codes_per_day = config.codes_per_day,
        workers = config.workers,
        contenders = config.contenders,
        "starting simulation"
    );

    // 3. Run against a fresh store until done or interrupted
    let simulation = Simulation::new(InMemoryEventStore::new(), config);
    let report = tokio::select! {
        result = simulation.run(SystemClock.now()) => result?,
        _ = signal::ctrl_c() => {
            tracing::info!("received SIGINT, stopping simulation");
            return Err(SimulatorError::Interrupted);
        }
    };

    // 4. Report
    match serde_json::to_string(&report) {
        Ok(json) => tracing::info!(report = %json, "simulation complete"),
        Err(e) => tracing::warn!(error = %e, "could not serialize report"),
    }
    tracing::info!(metrics = %metrics_handle.render(), "final metrics");

    Ok(())
}
