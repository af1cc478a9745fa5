use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use demand_client::domain::SessionRecord;

use crate::model::ModelHandle;
use crate::pipeline::{run_forecast, ForecastError};
use crate::sources::read_sessions;
use crate::transform::Forecast;

/// Async front of the pipeline.
///
/// Each request runs on the blocking pool against the shared model and is
/// abandoned with `ForecastError::Inference` once `inference_timeout` passes.
#[derive(Clone)]
pub struct ForecastService {
    model: Arc<ModelHandle>,
    inference_timeout: Duration,
}

impl ForecastService {
    pub fn new(model: Arc<ModelHandle>, inference_timeout: Duration) -> Self {
        Self {
            model,
            inference_timeout,
        }
    }

    /// Parses a raw CSV upload and forecasts from it.
    pub async fn forecast_upload(&self, upload: &[u8]) -> Result<Forecast, ForecastError> {
        let digest = blake3::hash(upload).to_hex();
        tracing::info!(upload_digest = %digest, bytes = upload.len(), "upload received");

        let records = parse_upload(upload)?;
        self.forecast(records).await
    }

    pub async fn forecast(&self, records: Vec<SessionRecord>) -> Result<Forecast, ForecastError> {
        metrics::counter!("forecast_requests_total").increment(1);
        let started = Instant::now();
        let sessions = records.len();

        let model = Arc::clone(&self.model);
        let task = tokio::task::spawn_blocking(move || {
            let predictor = model.get()?;
            run_forecast(&records, predictor.as_ref())
        });

        let res = match tokio::time::timeout(self.inference_timeout, task).await {
            Ok(Ok(res)) => res,
            Ok(Err(join_err)) => Err(ForecastError::Inference(format!("forecast task failed: {join_err}"))),
            Err(_) => Err(ForecastError::Inference(format!(
                "forecast did not finish within {} ms",
                self.inference_timeout.as_millis()
            ))),
        };

        let elapsed = started.elapsed();
        match &res {
            Ok(forecast) => {
                metrics::histogram!("forecast_inference_seconds").record(elapsed.as_secs_f64());
                tracing::info!(
                    sessions,
                    stations = forecast.results.len(),
                    total_kwh = forecast.summary.total_predicted_kwh,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "forecast completed"
                );
            }
            Err(e) => {
                metrics::counter!("forecast_failures_total", "kind" => e.kind()).increment(1);
                tracing::warn!(error = %e, kind = e.kind(), sessions, "forecast failed");
            }
        }
        res
    }
}

/// An upload rejected while parsing never reaches `forecast`, so it is
/// counted as a request here.
fn parse_upload(upload: &[u8]) -> Result<Vec<SessionRecord>, ForecastError> {
    read_sessions(upload).map_err(|e| {
        metrics::counter!("forecast_requests_total").increment(1);
        metrics::counter!("forecast_failures_total", "kind" => e.kind()).increment(1);
        tracing::warn!(error = %e, kind = e.kind(), "upload rejected");
        e
    })
}
