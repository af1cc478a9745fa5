use std::collections::BTreeMap;

use demand_client::domain::{PredictionResult, StationLocation};
use ndarray::Array1;
use serde::Serialize;

use super::{FeatureScale, TemporalWindow};
use crate::pipeline::ForecastError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastSummary {
    pub station_count: usize,
    pub total_predicted_kwh: f64,
    pub mean_predicted_kwh: f64,
    pub peak_station_id: Option<String>,
}

impl ForecastSummary {
    /// Expects `results` already ranked.
    pub fn from_ranked(results: &[PredictionResult]) -> Self {
        let total: f64 = results.iter().map(|r| r.predicted_energy_kwh).sum();
        let mean = if results.is_empty() {
            0.0
        } else {
            total / results.len() as f64
        };
        Self {
            station_count: results.len(),
            total_predicted_kwh: total,
            mean_predicted_kwh: mean,
            peak_station_id: results.first().map(|r| r.station_id.clone()),
        }
    }
}

/// Output of one forecast request.
#[derive(Debug, Clone, Serialize)]
pub struct Forecast {
    pub results: Vec<PredictionResult>,
    pub summary: ForecastSummary,
    /// Normalized input window, kept for diagnostics.
    pub window: TemporalWindow,
}

/// Sorts descending by predicted energy, ties ascending by station id.
pub fn rank_results(results: &mut [PredictionResult]) {
    results.sort_by(|a, b| {
        b.predicted_energy_kwh
            .total_cmp(&a.predicted_energy_kwh)
            .then_with(|| a.station_id.cmp(&b.station_id))
    });
}

/// Denormalizes `prediction` with the energy scale, attaches station
/// locations and ranks the rows.
pub fn compose_forecast(
    prediction: &Array1<f64>,
    window: TemporalWindow,
    energy: &FeatureScale,
    locations: &BTreeMap<String, StationLocation>,
) -> Result<Forecast, ForecastError> {
    if prediction.len() != window.station_count() {
        return Err(ForecastError::ShapeMismatch {
            dimension: "prediction",
            expected: window.station_count(),
            actual: prediction.len(),
        });
    }

    let mut results = Vec::with_capacity(prediction.len());
    for (station_id, normalized) in window.station_ids().iter().zip(prediction.iter()) {
        if !normalized.is_finite() {
            return Err(ForecastError::Inference(format!(
                "non-finite prediction for station '{station_id}'"
            )));
        }
        let location = locations.get(station_id).ok_or_else(|| {
            ForecastError::data_format("station", format!("no location known for station '{station_id}'"))
        })?;
        let predicted_energy_kwh = energy.denormalize(*normalized);
        if !predicted_energy_kwh.is_finite() {
            return Err(ForecastError::Inference(format!(
                "prediction for station '{station_id}' is not finite after denormalization"
            )));
        }
        results.push(PredictionResult {
            station_id: station_id.clone(),
            predicted_energy_kwh,
            latitude: location.latitude,
            longitude: location.longitude,
        });
    }

    rank_results(&mut results);
    let summary = ForecastSummary::from_ranked(&results);

    Ok(Forecast {
        results,
        summary,
        window,
    })
}
