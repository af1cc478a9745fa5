use demand_client::domain::{SessionRecord, StationDayAggregate};
use time::macros::datetime;

use crate::pipeline::ForecastError;

/// Pure validation of a `SessionRecord`.
///
/// Rules:
/// - energy and duration must be finite and non-negative.
/// - latitude must lie in [-90, 90], longitude in [-180, 180].
/// - ts must be within a broad sanity window [2000-01-01, 2100-01-01].
pub fn validate_session(rec: &SessionRecord) -> Result<(), ForecastError> {
    let invalid = |field: &str, what: String| {
        ForecastError::data_format(field, format!("{what} (station '{}')", rec.station_id))
    };

    if rec.station_id.trim().is_empty() {
        return Err(ForecastError::data_format("station", "empty station identifier"));
    }

    if !rec.energy_kwh.is_finite() || rec.energy_kwh < 0.0 {
        return Err(invalid(
            "energy",
            format!("energy must be finite and non-negative, got {}", rec.energy_kwh),
        ));
    }

    if !rec.duration_min.is_finite() || rec.duration_min < 0.0 {
        return Err(invalid(
            "duration",
            format!("duration must be finite and non-negative, got {}", rec.duration_min),
        ));
    }

    if !(-90.0..=90.0).contains(&rec.latitude) {
        return Err(invalid("latitude", format!("latitude out of range: {}", rec.latitude)));
    }

    if !(-180.0..=180.0).contains(&rec.longitude) {
        return Err(invalid("longitude", format!("longitude out of range: {}", rec.longitude)));
    }

    let min_ts = datetime!(2000-01-01 00:00:00 UTC);
    let max_ts = datetime!(2100-01-01 00:00:00 UTC);

    if rec.ts < min_ts || rec.ts > max_ts {
        return Err(invalid("timestamp", format!("timestamp out of allowed range: {}", rec.ts)));
    }

    Ok(())
}

/// Validates every record, failing on the first bad one.
pub fn validate_sessions(records: &[SessionRecord]) -> Result<(), ForecastError> {
    for rec in records {
        if let Err(e) = validate_session(rec) {
            metrics::counter!("session_validation_rejected_total").increment(1);
            return Err(e);
        }
    }
    Ok(())
}

/// Rejects station-days whose sums overflowed.
///
/// Each session is finite on its own, but a day of very large sessions can
/// still sum to infinity, which would leave the energy scale undefined.
pub fn validate_aggregates(aggregates: &[StationDayAggregate]) -> Result<(), ForecastError> {
    for agg in aggregates {
        for (field, value) in [("energy", agg.energy_sum), ("duration", agg.duration_sum)] {
            if !value.is_finite() {
                metrics::counter!("session_validation_rejected_total").increment(1);
                return Err(ForecastError::data_format(
                    field,
                    format!(
                        "daily {field} total is not finite for station '{}' on {}",
                        agg.station_id, agg.day
                    ),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> SessionRecord {
        SessionRecord {
            station_id: "s-1".to_string(),
            ts: datetime!(2024-01-01 00:00:00 UTC),
            energy_kwh: 1.0,
            duration_min: 45.0,
            latitude: 37.44,
            longitude: -122.16,
        }
    }

    #[test]
    fn accepts_valid_record() {
        assert!(validate_session(&record()).is_ok());
    }

    #[test]
    fn rejects_negative_energy() {
        let mut rec = record();
        rec.energy_kwh = -0.1;

        let res = validate_session(&rec);
        assert!(matches!(res, Err(ForecastError::DataFormat { ref field, .. }) if field == "energy"));
    }

    #[test]
    fn rejects_nan_duration() {
        let mut rec = record();
        rec.duration_min = f64::NAN;

        let res = validate_session(&rec);
        assert!(matches!(res, Err(ForecastError::DataFormat { ref field, .. }) if field == "duration"));
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        let mut rec = record();
        rec.latitude = 91.0;
        assert!(validate_session(&rec).is_err());

        let mut rec = record();
        rec.longitude = -180.5;
        assert!(validate_session(&rec).is_err());
    }

    #[test]
    fn rejects_out_of_range_ts() {
        let mut rec = record();
        rec.ts = datetime!(1800-01-01 00:00:00 UTC);

        let res = validate_session(&rec);
        assert!(matches!(res, Err(ForecastError::DataFormat { ref field, .. }) if field == "timestamp"));
    }

    #[test]
    fn zero_energy_session_is_allowed() {
        let mut rec = record();
        rec.energy_kwh = 0.0;
        rec.duration_min = 0.0;

        assert!(validate_sessions(&[rec]).is_ok());
    }

    #[test]
    fn rejects_daily_total_that_overflows() {
        let agg = |energy: f64| StationDayAggregate {
            station_id: "s-1".to_string(),
            day: time::macros::date!(2024-01-01),
            energy_sum: energy,
            duration_sum: 30.0,
            latitude: 37.44,
            longitude: -122.16,
        };

        assert!(validate_aggregates(&[agg(1.0e308)]).is_ok());

        let res = validate_aggregates(&[agg(1.0e308), agg(1.0e308 + 1.0e308)]);
        match res {
            Err(ForecastError::DataFormat { field, reason }) => {
                assert_eq!(field, "energy");
                assert!(reason.contains("s-1"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
