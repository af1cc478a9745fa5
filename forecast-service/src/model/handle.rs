use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use once_cell::sync::OnceCell;

use super::{SequenceModel, SequencePredictor};
use crate::pipeline::ForecastError;

/// Process-wide, read-only model shared by all requests.
///
/// Constructed explicitly and passed to whoever predicts. A lazy handle loads
/// the artifact on first `get`; concurrent first callers block on the same
/// load instead of loading twice. A failed load is not cached, so every call
/// keeps failing with `ModelLoad` until the artifact is fixed.
pub struct ModelHandle {
    path: Option<PathBuf>,
    model: OnceCell<Arc<dyn SequencePredictor>>,
}

impl ModelHandle {
    pub fn lazy<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: Some(path.into()),
            model: OnceCell::new(),
        }
    }

    pub fn preloaded(model: Arc<dyn SequencePredictor>) -> Self {
        Self {
            path: None,
            model: OnceCell::with_value(model),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.model.get().is_some()
    }

    pub fn get(&self) -> Result<Arc<dyn SequencePredictor>, ForecastError> {
        self.model
            .get_or_try_init(|| {
                let path = self
                    .path
                    .as_deref()
                    .ok_or_else(|| ForecastError::ModelLoad("no model artifact path configured".to_string()))?;
                let model = match SequenceModel::load(path) {
                    Ok(m) => m,
                    Err(e) => {
                        metrics::counter!("model_load_failures_total").increment(1);
                        tracing::error!(error = %e, path = %path.display(), "model load failed");
                        return Err(e);
                    }
                };
                metrics::counter!("model_loads_total").increment(1);
                tracing::info!(
                    path = %path.display(),
                    digest = %model.digest(),
                    layers = model.layer_summary().len(),
                    "model loaded"
                );
                Ok(Arc::new(model) as Arc<dyn SequencePredictor>)
            })
            .cloned()
    }
}
