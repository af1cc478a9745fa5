use time::Date;

/// Sum of all sessions of one station on one calendar day.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StationDayAggregate {
    pub station_id: String,
    pub day: Date,
    pub energy_sum: f64,
    pub duration_sum: f64,
    pub latitude: f64,
    pub longitude: f64,
}

impl StationDayAggregate {
    pub fn location(&self) -> StationLocation {
        StationLocation {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StationLocation {
    pub latitude: f64,
    pub longitude: f64,
}
