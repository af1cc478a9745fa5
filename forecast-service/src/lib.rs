pub mod config;
pub mod metrics_export;
pub mod model;
pub mod observability;
pub mod pipeline;
pub mod service;
pub mod sources;
pub mod transform;

pub use pipeline::{run_forecast, Envelope, ForecastError};
pub use service::ForecastService;
