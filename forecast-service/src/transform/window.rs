use std::collections::{BTreeMap, BTreeSet};

use demand_client::domain::StationDayAggregate;
use ndarray::{s, Array2, Array3, Axis};
use serde::Serialize;
use time::Date;

use crate::pipeline::ForecastError;

/// Number of most recent days fed to the model.
pub const WINDOW_DAYS: usize = 7;

/// Day × station matrix of normalized energy.
///
/// Rows are strictly increasing by day, columns are sorted by station id.
/// Cells with no aggregate row hold 0.0 and are marked unobserved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemporalWindow {
    days: Vec<Date>,
    station_ids: Vec<String>,
    values: Array2<f64>,
    #[serde(skip)]
    observed: Array2<bool>,
}

impl TemporalWindow {
    pub fn days(&self) -> &[Date] {
        &self.days
    }

    pub fn station_ids(&self) -> &[String] {
        &self.station_ids
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    pub fn station_count(&self) -> usize {
        self.station_ids.len()
    }

    pub fn is_observed(&self, day_idx: usize, station_idx: usize) -> bool {
        self.observed[[day_idx, station_idx]]
    }

    /// Keeps the `days` most recent rows.
    pub fn tail(&self, days: usize) -> Result<TemporalWindow, ForecastError> {
        let available = self.day_count();
        if available < days {
            return Err(ForecastError::InsufficientHistory {
                required: days,
                available,
            });
        }
        let start = available - days;

        Ok(TemporalWindow {
            days: self.days[start..].to_vec(),
            station_ids: self.station_ids.clone(),
            values: self.values.slice(s![start.., ..]).to_owned(),
            observed: self.observed.slice(s![start.., ..]).to_owned(),
        })
    }

    /// Model input of shape (1, days, stations).
    pub fn to_tensor(&self) -> Array3<f64> {
        self.values.clone().insert_axis(Axis(0))
    }

    /// Stations with zero-filled cells, with the number of such days.
    pub fn missing_days(&self) -> Vec<(String, usize)> {
        self.station_ids
            .iter()
            .zip(self.observed.axis_iter(Axis(1)))
            .filter_map(|(id, column)| {
                let missing = column.iter().filter(|seen| !**seen).count();
                (missing > 0).then(|| (id.clone(), missing))
            })
            .collect()
    }
}

/// Pivots normalized rows into a full-history window, one row per distinct day.
pub fn pivot_energy(rows: &[StationDayAggregate]) -> TemporalWindow {
    let days: Vec<Date> = rows.iter().map(|r| r.day).collect::<BTreeSet<_>>().into_iter().collect();
    let station_ids: Vec<String> = rows
        .iter()
        .map(|r| r.station_id.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect();

    let day_idx: BTreeMap<Date, usize> = days.iter().enumerate().map(|(i, d)| (*d, i)).collect();
    let station_idx: BTreeMap<&str, usize> =
        station_ids.iter().enumerate().map(|(i, s)| (s.as_str(), i)).collect();

    let shape = (days.len(), station_ids.len());
    let mut values = Array2::zeros(shape);
    let mut observed = Array2::from_elem(shape, false);
    for row in rows {
        let cell = [day_idx[&row.day], station_idx[row.station_id.as_str()]];
        values[cell] += row.energy_sum;
        observed[cell] = true;
    }

    TemporalWindow {
        days,
        station_ids,
        values,
        observed,
    }
}

/// Pivot then keep the last `days` rows.
pub fn build_window(rows: &[StationDayAggregate], days: usize) -> Result<TemporalWindow, ForecastError> {
    let window = pivot_energy(rows).tail(days)?;
    tracing::debug!(
        days = window.day_count(),
        stations = window.station_count(),
        "window built"
    );
    Ok(window)
}
