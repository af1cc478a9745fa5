use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::pipeline::ForecastError;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Sigmoid,
    Tanh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Padding {
    #[default]
    Valid,
    Same,
}

/// One layer as exported from the training environment. Weight layouts follow
/// the Keras conventions (`kernel[input][output]`, LSTM gates in i, f, c, o
/// order).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Layer {
    Conv1d {
        filters: usize,
        kernel_size: usize,
        #[serde(default)]
        padding: Padding,
        #[serde(default)]
        activation: Activation,
        /// `[kernel_size][in_channels][filters]`
        kernel: Vec<Vec<Vec<f64>>>,
        bias: Vec<f64>,
    },
    MaxPooling1d {
        pool_size: usize,
    },
    Lstm {
        units: usize,
        #[serde(default)]
        return_sequences: bool,
        /// `[in][4 * units]`
        kernel: Vec<Vec<f64>>,
        /// `[units][4 * units]`
        recurrent_kernel: Vec<Vec<f64>>,
        bias: Vec<f64>,
    },
    Dropout {
        #[serde(default)]
        rate: f64,
    },
    Flatten,
    Dense {
        #[serde(default)]
        activation: Activation,
        /// `[in][out]`
        kernel: Vec<Vec<f64>>,
        bias: Vec<f64>,
    },
}

impl Layer {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Conv1d { .. } => "conv1d",
            Self::MaxPooling1d { .. } => "max_pooling1d",
            Self::Lstm { .. } => "lstm",
            Self::Dropout { .. } => "dropout",
            Self::Flatten => "flatten",
            Self::Dense { .. } => "dense",
        }
    }
}

/// Persisted model: expected input shape plus the layer stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub time_steps: usize,
    pub stations: usize,
    pub layers: Vec<Layer>,
}

impl ModelArtifact {
    pub fn from_json(bytes: &[u8]) -> Result<Self, ForecastError> {
        let artifact: ModelArtifact = serde_json::from_slice(bytes)
            .map_err(|e| ForecastError::ModelLoad(format!("failed to parse model artifact: {e}")))?;
        if artifact.format_version != FORMAT_VERSION {
            return Err(ForecastError::ModelLoad(format!(
                "unsupported artifact format_version {} (expected {FORMAT_VERSION})",
                artifact.format_version
            )));
        }
        Ok(artifact)
    }
}

/// Reads an artifact from disk, returning it with the BLAKE3 hex digest of the
/// file bytes.
pub fn read_artifact(path: &Path) -> Result<(ModelArtifact, String), ForecastError> {
    let bytes = std::fs::read(path).map_err(|e| {
        ForecastError::ModelLoad(format!("failed to read model artifact '{}': {e}", path.display()))
    })?;
    let digest = blake3::hash(&bytes).to_hex().to_string();
    let artifact = ModelArtifact::from_json(&bytes)?;
    Ok((artifact, digest))
}
