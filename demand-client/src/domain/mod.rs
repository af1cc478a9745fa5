pub mod prediction_result;
pub mod session_record;
pub mod station_day;

pub use prediction_result::PredictionResult;
pub use session_record::SessionRecord;
pub use station_day::{StationDayAggregate, StationLocation};
