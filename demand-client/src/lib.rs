//! Domain types shared between the forecast pipeline and the display
//! collaborators that consume its output.

pub mod domain;

pub use domain::{PredictionResult, SessionRecord, StationDayAggregate, StationLocation};
