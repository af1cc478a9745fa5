use time::{Date, OffsetDateTime};

/// One charging session as uploaded.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionRecord {
    pub station_id: String,
    pub ts: OffsetDateTime,
    pub energy_kwh: f64,
    pub duration_min: f64,
    pub latitude: f64,
    pub longitude: f64,
}

impl SessionRecord {
    /// Calendar day of the session, taken in the timestamp's own offset.
    pub fn day(&self) -> Date {
        self.ts.date()
    }
}
