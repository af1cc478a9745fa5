//! Pre-trained sequence model: artifact format, layer math and the shared
//! handle requests predict through.

pub mod artifact;
pub mod handle;
pub mod layers;

use std::path::Path;

use ndarray::{Array1, Array3, Axis};

use crate::pipeline::ForecastError;
use crate::transform::WINDOW_DAYS;

pub use artifact::{read_artifact, Activation, Layer, ModelArtifact, Padding};
pub use handle::ModelHandle;
use layers::{Activations, CompiledLayer, Shape};

/// Maps a `(1, time_steps, stations)` window to one normalized value per
/// station.
///
/// Implementations must not mutate state in `predict`; it is called
/// concurrently from many requests.
pub trait SequencePredictor: Send + Sync {
    fn time_steps(&self) -> usize;

    /// Number of stations the model was trained on.
    fn input_width(&self) -> usize;

    fn predict(&self, input: &Array3<f64>) -> Result<Array1<f64>, ForecastError>;
}

#[derive(Debug, Clone)]
pub struct SequenceModel {
    time_steps: usize,
    stations: usize,
    layers: Vec<CompiledLayer>,
    summary: Vec<String>,
    digest: String,
}

impl SequenceModel {
    /// Compiles the layer stack, checking every weight shape and that the
    /// stack maps `(time_steps, stations)` to a vector of `stations`.
    pub fn from_artifact(artifact: ModelArtifact, digest: String) -> Result<Self, ForecastError> {
        if artifact.time_steps != WINDOW_DAYS {
            return Err(ForecastError::ModelLoad(format!(
                "model expects {} time steps, pipeline window is {WINDOW_DAYS} days",
                artifact.time_steps
            )));
        }
        if artifact.stations == 0 {
            return Err(ForecastError::ModelLoad("model has zero stations".to_string()));
        }

        let mut shape = Shape::Sequence {
            steps: artifact.time_steps,
            features: artifact.stations,
        };
        let mut compiled_layers = Vec::with_capacity(artifact.layers.len());
        let mut summary = Vec::with_capacity(artifact.layers.len());
        for (idx, layer) in artifact.layers.iter().enumerate() {
            let (compiled, out) = layers::compile(layer, shape).map_err(|e| {
                ForecastError::ModelLoad(format!("layer {idx} ({}): {e}", layer.name()))
            })?;
            summary.push(format!("{} {shape} -> {out}", layer.name()));
            compiled_layers.push(compiled);
            shape = out;
        }

        if shape != Shape::Vector(artifact.stations) {
            return Err(ForecastError::ModelLoad(format!(
                "model output shape {shape} does not match ({}) stations",
                artifact.stations
            )));
        }

        Ok(Self {
            time_steps: artifact.time_steps,
            stations: artifact.stations,
            layers: compiled_layers,
            summary,
            digest,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ForecastError> {
        let (artifact, digest) = read_artifact(path)?;
        Self::from_artifact(artifact, digest)
    }

    /// BLAKE3 hex digest of the artifact bytes.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// One line per layer: name, input shape and output shape.
    pub fn layer_summary(&self) -> &[String] {
        &self.summary
    }
}

impl SequencePredictor for SequenceModel {
    fn time_steps(&self) -> usize {
        self.time_steps
    }

    fn input_width(&self) -> usize {
        self.stations
    }

    fn predict(&self, input: &Array3<f64>) -> Result<Array1<f64>, ForecastError> {
        let (batch, steps, stations) = input.dim();
        for (dimension, expected, actual) in [
            ("batch", 1, batch),
            ("time_steps", self.time_steps, steps),
            ("stations", self.stations, stations),
        ] {
            if expected != actual {
                return Err(ForecastError::ShapeMismatch {
                    dimension,
                    expected,
                    actual,
                });
            }
        }

        let mut value = Activations::Sequence(input.index_axis(Axis(0), 0).to_owned());
        for layer in &self.layers {
            value = layer.forward(value);
        }

        match value {
            Activations::Vector(out) => Ok(out),
            Activations::Sequence(_) => Err(ForecastError::Inference(
                "model produced a sequence instead of a station vector".to_string(),
            )),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Conv1D -> MaxPooling1D -> LSTM -> Dropout -> LSTM -> Dropout -> Dense,
    /// small and with fixed weights.
    pub(crate) fn cnn_lstm_artifact(stations: usize) -> ModelArtifact {
        let filters = 2;
        let units = 3;
        ModelArtifact {
            format_version: 1,
            time_steps: WINDOW_DAYS,
            stations,
            layers: vec![
                Layer::Conv1d {
                    filters,
                    kernel_size: 2,
                    padding: Padding::Valid,
                    activation: Activation::Relu,
                    kernel: vec![vec![vec![0.5, -0.25]; stations]; 2],
                    bias: vec![0.1; filters],
                },
                Layer::MaxPooling1d { pool_size: 2 },
                Layer::Lstm {
                    units,
                    return_sequences: true,
                    kernel: vec![vec![0.2; 4 * units]; filters],
                    recurrent_kernel: vec![vec![0.1; 4 * units]; units],
                    bias: vec![0.0; 4 * units],
                },
                Layer::Dropout { rate: 0.2 },
                Layer::Lstm {
                    units,
                    return_sequences: false,
                    kernel: vec![vec![-0.1; 4 * units]; units],
                    recurrent_kernel: vec![vec![0.05; 4 * units]; units],
                    bias: vec![0.0; 4 * units],
                },
                Layer::Dropout { rate: 0.2 },
                Layer::Dense {
                    activation: Activation::Linear,
                    kernel: vec![vec![1.0; stations]; units],
                    bias: vec![0.5; stations],
                },
            ],
        }
    }

    #[test]
    fn compiles_cnn_lstm_stack() {
        let model = SequenceModel::from_artifact(cnn_lstm_artifact(4), "d".to_string()).unwrap();

        assert_eq!(model.input_width(), 4);
        assert_eq!(model.time_steps(), 7);
        assert_eq!(
            model.layer_summary(),
            &[
                "conv1d (7, 4) -> (6, 2)".to_string(),
                "max_pooling1d (6, 2) -> (3, 2)".to_string(),
                "lstm (3, 2) -> (3, 3)".to_string(),
                "dropout (3, 3) -> (3, 3)".to_string(),
                "lstm (3, 3) -> (3)".to_string(),
                "dropout (3) -> (3)".to_string(),
                "dense (3) -> (4)".to_string(),
            ]
        );
    }

    #[test]
    fn prediction_is_deterministic_and_station_wide() {
        let model = SequenceModel::from_artifact(cnn_lstm_artifact(3), "d".to_string()).unwrap();
        let input = Array3::from_shape_fn((1, 7, 3), |(_, t, s)| (t * 3 + s) as f64 / 21.0);

        let first = model.predict(&input).unwrap();
        let second = model.predict(&input).unwrap();

        assert_eq!(first.len(), 3);
        assert!(first.iter().all(|v| v.is_finite()));
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_wrong_input_width() {
        let model = SequenceModel::from_artifact(cnn_lstm_artifact(3), "d".to_string()).unwrap();

        let res = model.predict(&Array3::zeros((1, 7, 4)));

        assert!(matches!(
            res,
            Err(ForecastError::ShapeMismatch {
                dimension: "stations",
                expected: 3,
                actual: 4
            })
        ));
    }

    #[test]
    fn rejects_output_width_different_from_stations() {
        let mut artifact = cnn_lstm_artifact(3);
        artifact.layers.pop();
        artifact.layers.push(Layer::Dense {
            activation: Activation::Linear,
            kernel: vec![vec![1.0; 2]; 3],
            bias: vec![0.0; 2],
        });

        let res = SequenceModel::from_artifact(artifact, "d".to_string());
        assert!(matches!(res, Err(ForecastError::ModelLoad(_))));
    }

    #[test]
    fn rejects_model_trained_on_other_window_length() {
        let mut artifact = cnn_lstm_artifact(3);
        artifact.time_steps = 14;

        let res = SequenceModel::from_artifact(artifact, "d".to_string());
        assert!(matches!(res, Err(ForecastError::ModelLoad(_))));
    }

    #[test]
    fn rejects_stack_ending_in_sequence() {
        let mut artifact = cnn_lstm_artifact(2);
        artifact.layers.truncate(4);

        let res = SequenceModel::from_artifact(artifact, "d".to_string());
        assert!(matches!(res, Err(ForecastError::ModelLoad(_))));
    }
}
