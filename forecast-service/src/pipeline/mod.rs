use std::{pin::Pin, time::SystemTime};

use demand_client::domain::SessionRecord;
use futures::Stream;

use crate::model::SequencePredictor;
use crate::transform::{
    aggregate_sessions, build_window, compose_forecast, station_locations, validate_aggregates,
    validate_sessions, Forecast, NormalizationParams, WINDOW_DAYS,
};

#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    pub received_at: SystemTime,
}

#[derive(thiserror::Error, Debug)]
pub enum ForecastError {
    #[error("data format error in '{field}': {reason}")]
    DataFormat { field: String, reason: String },
    #[error("insufficient history: {available} distinct days available, at least {required} required")]
    InsufficientHistory { required: usize, available: usize },
    #[error("shape mismatch on {dimension}: model expects {expected}, got {actual}")]
    ShapeMismatch {
        dimension: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("model load error: {0}")]
    ModelLoad(String),
    #[error("inference error: {0}")]
    Inference(String),
}

impl ForecastError {
    pub fn data_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Short label used for the failure metric.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DataFormat { .. } => "data_format",
            Self::InsufficientHistory { .. } => "insufficient_history",
            Self::ShapeMismatch { .. } => "shape_mismatch",
            Self::ModelLoad(_) => "model_load",
            Self::Inference(_) => "inference",
        }
    }
}

#[async_trait::async_trait]
pub trait Source<T>: Send + Sync {
    async fn stream(
        &self,
    ) -> Pin<Box<dyn Stream<Item = Result<Envelope<T>, ForecastError>> + Send>>;
}

/// Runs one forecast request end to end: validate, aggregate, normalize,
/// window, predict, compose.
///
/// Every intermediate value is owned by this call; only `predictor` is shared.
pub fn run_forecast(
    records: &[SessionRecord],
    predictor: &dyn SequencePredictor,
) -> Result<Forecast, ForecastError> {
    validate_sessions(records)?;

    let aggregates = aggregate_sessions(records);
    validate_aggregates(&aggregates)?;
    let params = NormalizationParams::fit(&aggregates);
    let normalized = params.normalize_all(&aggregates);
    tracing::debug!(
        rows = aggregates.len(),
        energy_min = params.energy.min,
        energy_max = params.energy.max,
        "aggregated and normalized sessions"
    );

    let window = build_window(&normalized, WINDOW_DAYS)?;
    for (station_id, missing) in window.missing_days() {
        tracing::warn!(station_id = %station_id, missing_days = missing, "zero-filled days in window");
    }

    if window.station_count() != predictor.input_width() {
        return Err(ForecastError::ShapeMismatch {
            dimension: "stations",
            expected: predictor.input_width(),
            actual: window.station_count(),
        });
    }

    let prediction = predictor.predict(&window.to_tensor())?;
    let locations = station_locations(&aggregates);

    compose_forecast(&prediction, window, &params.energy, &locations)
}
