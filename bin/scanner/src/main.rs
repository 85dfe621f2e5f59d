use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use common::Config;
use engine::{
    BinanceCandleSource, Pipeline, PipelineConfig, ScanResult, ScanService, ScanSettings, Scanner,
};

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    info!(
        symbols = cfg.symbols.len(),
        interval = %cfg.interval,
        reference = %cfg.reference_symbol,
        "Scanner starting"
    );

    let mut pipeline_cfg = PipelineConfig::load_or_default(&cfg.pipeline_config_path)
        .unwrap_or_else(|e| panic!("Invalid pipeline config {}: {e}", cfg.pipeline_config_path));
    pipeline_cfg.ranker.top_n = cfg.top_n;
    let pipeline = Arc::new(
        Pipeline::from_config(pipeline_cfg).unwrap_or_else(|e| panic!("Pipeline setup failed: {e}")),
    );

    // ── Market data ───────────────────────────────────────────────────────────
    let source = BinanceCandleSource::new(&cfg.exchange_base_url)
        .unwrap_or_else(|e| panic!("Failed to build HTTP client: {e}"));

    // ── Scan service ──────────────────────────────────────────────────────────
    let scanner = Scanner::new(Arc::new(source), pipeline, ScanSettings::from_config(&cfg));
    let (service, handle) = ScanService::new(scanner);
    tokio::spawn(service.run());

    // Periodic trigger; overlapping ticks coalesce inside the service.
    let ticker = handle.clone();
    let period = Duration::from_secs(cfg.scan_period_secs.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            ticker.request_scan().await;
        }
    });

    // Print each published result as one JSON line on stdout.
    let mut results = handle.subscribe();
    tokio::spawn(async move {
        while results.changed().await.is_ok() {
            let latest = results.borrow_and_update().clone();
            match latest {
                Some(ScanResult::Completed(report)) => match serde_json::to_string(report.as_ref()) {
                    Ok(line) => println!("{line}"),
                    Err(e) => error!(error = %e, "Failed to serialize scan report"),
                },
                Some(ScanResult::Unavailable { cycle_id, reason }) => {
                    warn!(cycle_id, reason = %reason, "Scan could not run");
                }
                None => {}
            }
        }
    });

    info!(period_secs = period.as_secs(), "All subsystems started. Waiting for shutdown signal.");
    tokio::signal::ctrl_c().await.unwrap();
    handle.shutdown().await;
    info!("Shutdown signal received. Exiting.");
}
