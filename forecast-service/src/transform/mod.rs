//! Pure transforms from uploaded sessions to ranked station forecasts.
//!
//! Each stage takes immutable input and returns new values, so the stages can
//! be tested in isolation and chained by `pipeline::run_forecast`.

pub mod aggregate;
pub mod compose;
pub mod normalize;
pub mod validate;
pub mod window;

pub use aggregate::{aggregate_sessions, station_locations};
pub use compose::{compose_forecast, rank_results, Forecast, ForecastSummary};
pub use normalize::{FeatureScale, NormalizationParams};
pub use validate::{validate_aggregates, validate_session, validate_sessions};
pub use window::{build_window, pivot_energy, TemporalWindow, WINDOW_DAYS};
