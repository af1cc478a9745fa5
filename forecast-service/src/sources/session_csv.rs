use std::{fs::File, io::Read, path::PathBuf, time::SystemTime};

use csv::StringRecord;
use demand_client::domain::SessionRecord;
use futures::Stream;
use time::{
    format_description::{well_known::Rfc3339, BorrowedFormatItem},
    macros::format_description,
    Date, OffsetDateTime, PrimitiveDateTime,
};

use crate::pipeline::{Envelope, ForecastError, Source};

/// CSV upload of charging sessions.
///
/// Required columns (header names matched case-insensitively):
/// - station: `Station` | `station_id`
/// - timestamp: `Timestamp` | `ts`
/// - energy: `Energy Delivered (kWh)` | `energy_kwh` | `energy_delivered_kwh`
/// - duration: `Duration (mins)` | `duration_min` | `duration_minutes`
/// - latitude: `Latitude` | `lat`
/// - longitude: `Longitude` | `lon` | `lng`
///
/// Any other column is ignored.
pub struct SessionCsvFileSource {
    path: PathBuf,
}

impl SessionCsvFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

const COLUMNS: [(&str, &[&str]); 6] = [
    ("station", &["station", "station_id"]),
    ("timestamp", &["timestamp", "ts"]),
    ("energy", &["energy delivered (kwh)", "energy_kwh", "energy_delivered_kwh"]),
    ("duration", &["duration (mins)", "duration_min", "duration_minutes"]),
    ("latitude", &["latitude", "lat"]),
    ("longitude", &["longitude", "lon", "lng"]),
];

/// Positions of the required columns in the header row, in `COLUMNS` order.
#[derive(Debug, Clone, Copy)]
struct ColumnMap([usize; 6]);

impl ColumnMap {
    fn resolve(headers: &StringRecord) -> Result<Self, ForecastError> {
        let mut idx = [0; 6];
        for (slot, (field, aliases)) in idx.iter_mut().zip(COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| aliases.contains(&h.trim().to_ascii_lowercase().as_str()))
                .ok_or_else(|| ForecastError::data_format(field, "missing required column"))?;
        }
        Ok(Self(idx))
    }
}

const NAIVE_FORMATS: [&[BorrowedFormatItem<'static>]; 5] = [
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]"),
    format_description!("[month padding:none]/[day padding:none]/[year] [hour padding:none]:[minute]:[second]"),
    format_description!("[month padding:none]/[day padding:none]/[year] [hour padding:none]:[minute]"),
];

/// Parses an absolute timestamp. Strings without an offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let s = raw.trim();
    if let Ok(ts) = OffsetDateTime::parse(s, &Rfc3339) {
        return Some(ts);
    }

    let spaced = s.replacen('T', " ", 1);
    for format in NAIVE_FORMATS {
        if let Ok(ts) = PrimitiveDateTime::parse(&spaced, format) {
            return Some(ts.assume_utc());
        }
    }

    Date::parse(s, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|d| d.midnight().assume_utc())
}

fn parse_number(field: &str, raw: &str, line: u64) -> Result<f64, ForecastError> {
    raw.trim()
        .parse()
        .map_err(|e| ForecastError::data_format(field, format!("invalid value '{raw}' on line {line}: {e}")))
}

fn record_to_session(record: &StringRecord, columns: &ColumnMap) -> Result<SessionRecord, ForecastError> {
    let line = record.position().map(|p| p.line()).unwrap_or(0);
    let [station, ts, energy, duration, latitude, longitude] = columns.0;
    let get = |field: &str, idx: usize| -> Result<&str, ForecastError> {
        record
            .get(idx)
            .ok_or_else(|| ForecastError::data_format(field, format!("missing value on line {line}")))
    };

    let station_id = get("station", station)?.trim().to_string();
    if station_id.is_empty() {
        return Err(ForecastError::data_format("station", format!("empty station on line {line}")));
    }

    let ts_str = get("timestamp", ts)?;
    let ts = parse_timestamp(ts_str).ok_or_else(|| {
        ForecastError::data_format("timestamp", format!("unparseable timestamp '{ts_str}' on line {line}"))
    })?;

    Ok(SessionRecord {
        station_id,
        ts,
        energy_kwh: parse_number("energy", get("energy", energy)?, line)?,
        duration_min: parse_number("duration", get("duration", duration)?, line)?,
        latitude: parse_number("latitude", get("latitude", latitude)?, line)?,
        longitude: parse_number("longitude", get("longitude", longitude)?, line)?,
    })
}

fn read_csv_headers<R: Read>(rdr: &mut csv::Reader<R>) -> Result<ColumnMap, ForecastError> {
    let headers = rdr
        .headers()
        .map_err(|e| ForecastError::data_format("header", format!("failed to read CSV headers: {e}")))?;
    ColumnMap::resolve(headers)
}

/// Parses a whole upload, failing on the first malformed row.
pub fn read_sessions<R: Read>(reader: R) -> Result<Vec<SessionRecord>, ForecastError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let columns = read_csv_headers(&mut rdr)?;

    let mut out = Vec::new();
    for result in rdr.records() {
        let record =
            result.map_err(|e| ForecastError::data_format("row", format!("failed to read CSV record: {e}")))?;
        match record_to_session(&record, &columns) {
            Ok(session) => out.push(session),
            Err(e) => {
                metrics::counter!("session_csv_parse_errors_total").increment(1);
                return Err(e);
            }
        }
    }
    Ok(out)
}

#[async_trait::async_trait]
impl Source<SessionRecord> for SessionCsvFileSource {
    async fn stream(
        &self,
    ) -> std::pin::Pin<Box<dyn Stream<Item = Result<Envelope<SessionRecord>, ForecastError>> + Send>> {
        // Blocking CSV reader inside a single async task; uploads are small.
        let path = self.path.clone();
        let s = async_stream::try_stream! {
            let file = File::open(&path)
                .map_err(|e| ForecastError::data_format("upload", format!("failed to open CSV file: {e}")))?;
            let mut rdr = csv::Reader::from_reader(file);
            let columns = read_csv_headers(&mut rdr)?;

            for result in rdr.records() {
                let record = result.map_err(|e| ForecastError::data_format(
                    "row",
                    format!("failed to read CSV record: {e}"),
                ))?;

                let session = match record_to_session(&record, &columns) {
                    Ok(s) => s,
                    Err(e) => {
                        metrics::counter!("session_csv_parse_errors_total").increment(1);
                        Err(e)?
                    }
                };

                yield Envelope {
                    payload: session,
                    received_at: SystemTime::now(),
                };
            }
        };

        Box::pin(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use time::macros::datetime;

    const UPLOAD: &str = "\
Station,Timestamp,Energy Delivered (kWh),Duration (mins),Latitude,Longitude,Port Type
BRYANT 1,2024-01-01 08:15:00,6.25,95,37.4385,-122.1606,Level 2
HAMILTON 2,2024-01-01T19:40:05Z,11.0,120,37.4448,-122.1600,Level 2
";

    #[test]
    fn parses_upload_with_display_headers() {
        let sessions = read_sessions(UPLOAD.as_bytes()).unwrap();

        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].station_id, "BRYANT 1");
        assert_eq!(sessions[0].ts, datetime!(2024-01-01 08:15:00 UTC));
        assert_eq!(sessions[0].energy_kwh, 6.25);
        assert_eq!(sessions[0].duration_min, 95.0);
        assert_eq!(sessions[1].ts, datetime!(2024-01-01 19:40:05 UTC));
        assert_eq!(sessions[1].longitude, -122.16);
    }

    #[test]
    fn accepts_snake_case_headers_in_any_order() {
        let csv = "lat,lon,energy_kwh,duration_min,ts,station_id\n1.5,2.5,3.0,4.0,2024-02-03,s-9\n";

        let sessions = read_sessions(csv.as_bytes()).unwrap();

        assert_eq!(sessions[0].station_id, "s-9");
        assert_eq!(sessions[0].ts, datetime!(2024-02-03 00:00:00 UTC));
        assert_eq!(sessions[0].latitude, 1.5);
        assert_eq!(sessions[0].longitude, 2.5);
    }

    #[test]
    fn missing_column_names_the_field() {
        let csv = "Station,Timestamp,Energy Delivered (kWh),Latitude,Longitude\nA,2024-01-01,1,2,3\n";

        let res = read_sessions(csv.as_bytes());

        assert!(matches!(res, Err(ForecastError::DataFormat { ref field, .. }) if field == "duration"));
    }

    #[test]
    fn unparseable_timestamp_is_data_format_error() {
        let csv = "Station,Timestamp,Energy Delivered (kWh),Duration (mins),Latitude,Longitude\nA,yesterday,1,2,3,4\n";

        let res = read_sessions(csv.as_bytes());

        match res {
            Err(ForecastError::DataFormat { field, reason }) => {
                assert_eq!(field, "timestamp");
                assert!(reason.contains("yesterday"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn non_numeric_energy_is_data_format_error() {
        let csv = "Station,Timestamp,Energy Delivered (kWh),Duration (mins),Latitude,Longitude\nA,2024-01-01,lots,2,3,4\n";

        let res = read_sessions(csv.as_bytes());

        assert!(matches!(res, Err(ForecastError::DataFormat { ref field, .. }) if field == "energy"));
    }

    #[test]
    fn timestamp_formats() {
        assert_eq!(
            parse_timestamp("2024-03-10T12:00:00+02:00"),
            Some(datetime!(2024-03-10 12:00:00 +02:00))
        );
        assert_eq!(
            parse_timestamp("2024-03-10 12:00:00.250"),
            Some(datetime!(2024-03-10 12:00:00.25 UTC))
        );
        assert_eq!(parse_timestamp("2024-03-10T07:05"), Some(datetime!(2024-03-10 07:05:00 UTC)));
        assert_eq!(parse_timestamp("7/29/2011 20:17"), Some(datetime!(2011-07-29 20:17:00 UTC)));
        assert_eq!(parse_timestamp("7/29/2011 20:17:35"), Some(datetime!(2011-07-29 20:17:35 UTC)));
        assert_eq!(parse_timestamp("2024-13-40"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[tokio::test]
    async fn file_source_streams_envelopes() {
        let path = std::env::temp_dir().join(format!("forecast-sessions-{}.csv", std::process::id()));
        std::fs::write(&path, UPLOAD).unwrap();

        let source = SessionCsvFileSource::new(&path);
        let sessions: Vec<SessionRecord> = source
            .stream()
            .await
            .map_ok(|env| env.payload)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(sessions, read_sessions(UPLOAD.as_bytes()).unwrap());
        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn file_source_reports_missing_file() {
        let source = SessionCsvFileSource::new("/nonexistent/sessions.csv");

        let res: Result<Vec<_>, _> = source.stream().await.try_collect().await;

        assert!(matches!(res, Err(ForecastError::DataFormat { .. })));
    }
}
