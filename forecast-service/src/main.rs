use anyhow::{bail, Result};
use demand_client::domain::PredictionResult;
use forecast_service::{
    config::AppConfig,
    metrics_export,
    model::ModelHandle,
    observability,
    pipeline::Source,
    sources::SessionCsvFileSource,
    transform::{ForecastSummary, TemporalWindow},
    ForecastService,
};
use futures::TryStreamExt;
use serde::Serialize;
use std::{env, sync::Arc, time::Duration};

#[derive(Serialize)]
struct ForecastReport<'a> {
    results: &'a [PredictionResult],
    summary: &'a ForecastSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    window: Option<&'a TemporalWindow>,
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: forecast-service <sessions_csv_path> [--with-window]");
    }
    let csv_path = &args[1];
    let with_window = args[2..].iter().any(|a| a == "--with-window");

    // Load configuration
    let cfg = AppConfig::load()?;

    if cfg.metrics.is_some() {
        metrics_export::init()?;
    }

    // Fail fast on a missing or incompatible artifact.
    let model = Arc::new(ModelHandle::lazy(&cfg.model.path));
    model.get()?;

    let service = ForecastService::new(model, Duration::from_millis(cfg.model.inference_timeout_ms));

    let source = SessionCsvFileSource::new(csv_path);
    let records: Vec<_> = source.stream().await.map_ok(|env| env.payload).try_collect().await?;
    tracing::info!(sessions = records.len(), path = %csv_path, "sessions read");

    let outcome = service.forecast(records).await;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_export::write_textfile(&metrics_cfg.textfile_path)?;
    }

    let forecast = outcome?;
    let report = ForecastReport {
        results: &forecast.results,
        summary: &forecast.summary,
        window: with_window.then_some(&forecast.window),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
