mod config;

use config::Config;
use kaizen_common::SystemClock;
use kaizen_detector::OpportunityDetector;
use kaizen_engine::KaizenEngine;
use kaizen_experiments::InMemoryExperimentBackend;
use kaizen_metrics::MetricRegistry;
use kaizen_safety::{default_bounds, SafetyBounds};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    info!("Starting Kaizen control plane");

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("kaizen.toml"));
    let config = Config::load(&config_path)?;

    info!(
        detection_interval_ms = config.engine.detection_interval_ms,
        metrics_port = config.metrics.port,
        "loaded configuration"
    );

    let registry = Arc::new(MetricRegistry::new());
    let clock = Arc::new(SystemClock);
    let safety = Arc::new(SafetyBounds::new(default_bounds()));
    let detector = Arc::new(OpportunityDetector::new(config.detector.clone(), clock.clone()));
    let backend = Arc::new(InMemoryExperimentBackend::new());

    let engine = match KaizenEngine::new(
        config.engine.clone(),
        registry.clone(),
        safety,
        detector,
        backend,
        clock,
    ) {
        Ok(engine) => engine,
        Err(e) => {
            error!("failed to construct engine: {}", e);
            return Err(anyhow::anyhow!("engine construction failed: {e}"));
        }
    };

    engine.initialize().await?;
    engine.start().await?;
    info!("engine started");

    let metrics_task = if config.metrics.http_enabled {
        let addr: SocketAddr = ([0, 0, 0, 0], config.metrics.port).into();
        let registry = registry.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = kaizen_metrics::serve(registry, addr).await {
                error!("metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, stopping engine");

    engine.stop().await?;
    if let Some(task) = metrics_task {
        task.abort();
    }

    info!("shutdown complete");
    Ok(())
}
