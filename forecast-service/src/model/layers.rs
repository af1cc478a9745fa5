//! Inference-only layer math over `ndarray` buffers.

use ndarray::{s, Array1, Array2, Array3};

use super::artifact::{Activation, Layer, Padding};

impl Activation {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Self::Linear => x,
            Self::Relu => x.max(0.0),
            Self::Sigmoid => sigmoid(x),
            Self::Tanh => x.tanh(),
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Shape of the value flowing between layers, batch dimension excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Sequence { steps: usize, features: usize },
    Vector(usize),
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequence { steps, features } => write!(f, "({steps}, {features})"),
            Self::Vector(width) => write!(f, "({width})"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Activations {
    Sequence(Array2<f64>),
    Vector(Array1<f64>),
}

#[derive(Debug, Clone)]
pub struct LstmLayer {
    units: usize,
    return_sequences: bool,
    kernel: Array2<f64>,
    recurrent_kernel: Array2<f64>,
    bias: Array1<f64>,
}

impl LstmLayer {
    fn run(&self, x: &Array2<f64>) -> Activations {
        let u = self.units;
        let mut h = Array1::<f64>::zeros(u);
        let mut c = Array1::<f64>::zeros(u);
        let mut outputs = Array2::<f64>::zeros((x.nrows(), u));

        for (t, x_t) in x.outer_iter().enumerate() {
            let z = x_t.dot(&self.kernel) + h.dot(&self.recurrent_kernel) + &self.bias;
            let i = z.slice(s![0..u]).mapv(sigmoid);
            let f = z.slice(s![u..2 * u]).mapv(sigmoid);
            let g = z.slice(s![2 * u..3 * u]).mapv(f64::tanh);
            let o = z.slice(s![3 * u..4 * u]).mapv(sigmoid);

            c = &f * &c + &i * &g;
            h = &o * &c.mapv(f64::tanh);
            outputs.row_mut(t).assign(&h);
        }

        if self.return_sequences {
            Activations::Sequence(outputs)
        } else {
            Activations::Vector(h)
        }
    }
}

#[derive(Debug, Clone)]
pub enum CompiledLayer {
    Conv1d {
        kernel: Array3<f64>,
        bias: Array1<f64>,
        padding: Padding,
        activation: Activation,
    },
    MaxPooling1d {
        pool_size: usize,
    },
    Lstm(LstmLayer),
    Identity,
    Flatten,
    Dense {
        kernel: Array2<f64>,
        bias: Array1<f64>,
        activation: Activation,
    },
}

fn vector(name: &str, values: &[f64], len: usize) -> Result<Array1<f64>, String> {
    if values.len() != len {
        return Err(format!("{name} has length {}, expected {len}", values.len()));
    }
    Ok(Array1::from(values.to_vec()))
}

fn matrix(name: &str, rows: &[Vec<f64>], dim: (usize, usize)) -> Result<Array2<f64>, String> {
    if rows.len() != dim.0 || rows.iter().any(|r| r.len() != dim.1) {
        return Err(format!("{name} is not a {}x{} matrix", dim.0, dim.1));
    }
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec(dim, flat).map_err(|e| format!("{name}: {e}"))
}

fn tensor3(name: &str, values: &[Vec<Vec<f64>>], dim: (usize, usize, usize)) -> Result<Array3<f64>, String> {
    let well_formed = values.len() == dim.0
        && values
            .iter()
            .all(|plane| plane.len() == dim.1 && plane.iter().all(|r| r.len() == dim.2));
    if !well_formed {
        return Err(format!("{name} is not a {}x{}x{} tensor", dim.0, dim.1, dim.2));
    }
    let flat: Vec<f64> = values.iter().flatten().flatten().copied().collect();
    Array3::from_shape_vec(dim, flat).map_err(|e| format!("{name}: {e}"))
}

/// Checks `layer` against the incoming shape and converts its weights.
pub fn compile(layer: &Layer, input: Shape) -> Result<(CompiledLayer, Shape), String> {
    match (layer, input) {
        (
            Layer::Conv1d {
                filters,
                kernel_size,
                padding,
                activation,
                kernel,
                bias,
            },
            Shape::Sequence { steps, features },
        ) => {
            if *kernel_size == 0 {
                return Err("conv1d kernel_size must be positive".to_string());
            }
            let out_steps = match padding {
                Padding::Same => steps,
                Padding::Valid if steps >= *kernel_size => steps - kernel_size + 1,
                Padding::Valid => {
                    return Err(format!("conv1d kernel_size {kernel_size} exceeds {steps} time steps"));
                }
            };
            let compiled = CompiledLayer::Conv1d {
                kernel: tensor3("conv1d kernel", kernel, (*kernel_size, features, *filters))?,
                bias: vector("conv1d bias", bias, *filters)?,
                padding: *padding,
                activation: *activation,
            };
            Ok((
                compiled,
                Shape::Sequence {
                    steps: out_steps,
                    features: *filters,
                },
            ))
        }
        (Layer::MaxPooling1d { pool_size }, Shape::Sequence { steps, features }) => {
            if *pool_size == 0 || steps < *pool_size {
                return Err(format!("pool_size {pool_size} does not fit {steps} time steps"));
            }
            Ok((
                CompiledLayer::MaxPooling1d { pool_size: *pool_size },
                Shape::Sequence {
                    steps: steps / pool_size,
                    features,
                },
            ))
        }
        (
            Layer::Lstm {
                units,
                return_sequences,
                kernel,
                recurrent_kernel,
                bias,
            },
            Shape::Sequence { steps, features },
        ) => {
            let gates = 4 * units;
            let compiled = LstmLayer {
                units: *units,
                return_sequences: *return_sequences,
                kernel: matrix("lstm kernel", kernel, (features, gates))?,
                recurrent_kernel: matrix("lstm recurrent_kernel", recurrent_kernel, (*units, gates))?,
                bias: vector("lstm bias", bias, gates)?,
            };
            let out = if *return_sequences {
                Shape::Sequence {
                    steps,
                    features: *units,
                }
            } else {
                Shape::Vector(*units)
            };
            Ok((CompiledLayer::Lstm(compiled), out))
        }
        (Layer::Dropout { .. }, shape) => Ok((CompiledLayer::Identity, shape)),
        (Layer::Flatten, Shape::Sequence { steps, features }) => {
            Ok((CompiledLayer::Flatten, Shape::Vector(steps * features)))
        }
        (Layer::Flatten, shape @ Shape::Vector(_)) => Ok((CompiledLayer::Flatten, shape)),
        (
            Layer::Dense {
                activation,
                kernel,
                bias,
            },
            shape,
        ) => {
            let width = match shape {
                Shape::Sequence { features, .. } => features,
                Shape::Vector(width) => width,
            };
            let out = bias.len();
            let compiled = CompiledLayer::Dense {
                kernel: matrix("dense kernel", kernel, (width, out))?,
                bias: vector("dense bias", bias, out)?,
                activation: *activation,
            };
            let out_shape = match shape {
                Shape::Sequence { steps, .. } => Shape::Sequence { steps, features: out },
                Shape::Vector(_) => Shape::Vector(out),
            };
            Ok((compiled, out_shape))
        }
        (layer, shape) => Err(format!("{} cannot take input of shape {shape}", layer.name())),
    }
}

fn conv1d(x: &Array2<f64>, kernel: &Array3<f64>, bias: &Array1<f64>, padding: Padding) -> Array2<f64> {
    let (k, channels, filters) = kernel.dim();
    let steps = x.nrows();
    let (out_steps, pad_left) = match padding {
        Padding::Same => (steps, (k - 1) / 2),
        Padding::Valid => (steps + 1 - k, 0),
    };

    let mut out = Array2::<f64>::zeros((out_steps, filters));
    for t in 0..out_steps {
        let mut acc = bias.clone();
        for i in 0..k {
            let Some(src) = (t + i).checked_sub(pad_left).filter(|src| *src < steps) else {
                continue;
            };
            for c in 0..channels {
                acc.scaled_add(x[[src, c]], &kernel.slice(s![i, c, ..]));
            }
        }
        out.row_mut(t).assign(&acc);
    }
    out
}

fn max_pool(x: &Array2<f64>, pool_size: usize) -> Array2<f64> {
    let out_steps = x.nrows() / pool_size;
    let mut out = Array2::<f64>::zeros((out_steps, x.ncols()));
    for t in 0..out_steps {
        let block = x.slice(s![t * pool_size..(t + 1) * pool_size, ..]);
        for (f, column) in block.columns().into_iter().enumerate() {
            out[[t, f]] = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        }
    }
    out
}

impl CompiledLayer {
    /// Shapes were checked by `compile`, so mismatched variants cannot occur
    /// for a model built through it.
    pub fn forward(&self, input: Activations) -> Activations {
        match (self, input) {
            (
                Self::Conv1d {
                    kernel,
                    bias,
                    padding,
                    activation,
                },
                Activations::Sequence(x),
            ) => {
                let mut out = conv1d(&x, kernel, bias, *padding);
                out.mapv_inplace(|v| activation.apply(v));
                Activations::Sequence(out)
            }
            (Self::MaxPooling1d { pool_size }, Activations::Sequence(x)) => {
                Activations::Sequence(max_pool(&x, *pool_size))
            }
            (Self::Lstm(lstm), Activations::Sequence(x)) => lstm.run(&x),
            (Self::Flatten, Activations::Sequence(x)) => Activations::Vector(x.iter().copied().collect()),
            (
                Self::Dense {
                    kernel,
                    bias,
                    activation,
                },
                Activations::Vector(x),
            ) => {
                let mut out = x.dot(kernel) + bias;
                out.mapv_inplace(|v| activation.apply(v));
                Activations::Vector(out)
            }
            (
                Self::Dense {
                    kernel,
                    bias,
                    activation,
                },
                Activations::Sequence(x),
            ) => {
                let mut out = x.dot(kernel) + bias;
                out.mapv_inplace(|v| activation.apply(v));
                Activations::Sequence(out)
            }
            (_, passthrough) => passthrough,
        }
    }
}
