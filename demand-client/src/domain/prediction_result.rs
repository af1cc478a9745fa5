/// Next-day demand estimate for one station, in kWh.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PredictionResult {
    pub station_id: String,
    pub predicted_energy_kwh: f64,
    pub latitude: f64,
    pub longitude: f64,
}
