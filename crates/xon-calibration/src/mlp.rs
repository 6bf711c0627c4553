//! Small dense network with sigmoid hidden activations and hand-written backprop

use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};
use xon_core::{XonError, XonResult};

/// Fully connected layer, `y = x W^T + b`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Linear {
    /// `out_features x in_features`
    pub weight: Array2<f32>,
    pub bias: Array1<f32>,
}

impl Linear {
    /// Uniform `(-1/sqrt(fan_in), 1/sqrt(fan_in))` initialization
    pub fn new<R: Rng + ?Sized>(in_features: usize, out_features: usize, rng: &mut R) -> Self {
        let bound = 1.0 / (in_features as f32).sqrt();
        Linear {
            weight: Array2::from_shape_fn((out_features, in_features), |_| {
                rng.gen_range(-bound..bound)
            }),
            bias: Array1::from_shape_fn(out_features, |_| rng.gen_range(-bound..bound)),
        }
    }

    pub fn in_features(&self) -> usize {
        self.weight.ncols()
    }

    pub fn out_features(&self) -> usize {
        self.weight.nrows()
    }

    fn forward(&self, x: &ArrayView2<f32>) -> Array2<f32> {
        x.dot(&self.weight.t()) + &self.bias
    }
}

fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

/// Per-layer parameter gradients, same layout as the network
#[derive(Debug, Clone)]
pub struct Gradients {
    layers: Vec<(Array2<f32>, Array1<f32>)>,
}

impl Gradients {
    /// Global L2 norm over every parameter
    pub fn norm(&self) -> f32 {
        self.layers
            .iter()
            .map(|(w, b)| w.iter().chain(b.iter()).map(|g| g * g).sum::<f32>())
            .sum::<f32>()
            .sqrt()
    }

    /// Rescale so the global norm is at most `max_norm`; returns the norm
    /// before clipping
    pub fn clip_norm(&mut self, max_norm: f32) -> f32 {
        let norm = self.norm();
        let coef = max_norm / (norm + 1e-6);
        if coef < 1.0 {
            for (w, b) in &mut self.layers {
                w.mapv_inplace(|g| g * coef);
                b.mapv_inplace(|g| g * coef);
            }
        }
        norm
    }
}

/// Multi-layer perceptron: linear layers with a sigmoid between consecutive
/// layers and no activation on the output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mlp {
    layers: Vec<Linear>,
}

impl Mlp {
    /// Build `in_features -> layer_features[0] -> ... -> layer_features[n-1]`
    pub fn new<R: Rng + ?Sized>(
        in_features: usize,
        layer_features: &[usize],
        rng: &mut R,
    ) -> XonResult<Self> {
        if in_features == 0 || layer_features.is_empty() || layer_features.contains(&0) {
            return Err(XonError::InvalidConfig {
                reason: format!("invalid layer sizes {} -> {:?}", in_features, layer_features),
            });
        }

        let mut layers = Vec::with_capacity(layer_features.len());
        let mut fan_in = in_features;
        for &out in layer_features {
            layers.push(Linear::new(fan_in, out, rng));
            fan_in = out;
        }
        Ok(Mlp { layers })
    }

    /// Rebuild from stored layers, checking that consecutive shapes chain
    pub fn from_layers(layers: Vec<Linear>) -> XonResult<Self> {
        if layers.is_empty() {
            return Err(XonError::InvalidConfig {
                reason: "network needs at least one layer".to_string(),
            });
        }
        for pair in layers.windows(2) {
            if pair[0].out_features() != pair[1].in_features() {
                return Err(XonError::ShapeMismatch {
                    context: "layer chain",
                    expected: pair[0].out_features(),
                    actual: pair[1].in_features(),
                });
            }
        }
        for layer in &layers {
            if layer.bias.len() != layer.out_features() {
                return Err(XonError::ShapeMismatch {
                    context: "layer bias",
                    expected: layer.out_features(),
                    actual: layer.bias.len(),
                });
            }
        }
        Ok(Mlp { layers })
    }

    pub fn layers(&self) -> &[Linear] {
        &self.layers
    }

    pub fn in_features(&self) -> usize {
        self.layers[0].in_features()
    }

    pub fn out_features(&self) -> usize {
        self.layers[self.layers.len() - 1].out_features()
    }

    /// Output sizes of each layer, the last one being the action size
    pub fn layer_features(&self) -> Vec<usize> {
        self.layers.iter().map(Linear::out_features).collect()
    }

    fn check_input(&self, x: &ArrayView2<f32>) -> XonResult<()> {
        if x.ncols() != self.in_features() {
            return Err(XonError::ShapeMismatch {
                context: "network input",
                expected: self.in_features(),
                actual: x.ncols(),
            });
        }
        Ok(())
    }

    /// Batched forward pass, `B x in -> B x out`
    pub fn forward(&self, x: ArrayView2<f32>) -> XonResult<Array2<f32>> {
        self.check_input(&x)?;
        let mut activations = self.trace(x);
        Ok(activations.pop().unwrap_or_default())
    }

    /// Activations of every layer, input first
    fn trace(&self, x: ArrayView2<f32>) -> Vec<Array2<f32>> {
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        activations.push(x.to_owned());
        let last = self.layers.len() - 1;

        for (i, layer) in self.layers.iter().enumerate() {
            let mut z = layer.forward(&activations[i].view());
            if i < last {
                z.mapv_inplace(sigmoid);
            }
            activations.push(z);
        }
        activations
    }

    /// Loss `mean_b(sum_j((t - y)^2))` and its gradients
    pub fn loss_and_gradients(
        &self,
        x: ArrayView2<f32>,
        targets: ArrayView2<f32>,
    ) -> XonResult<(f32, Gradients)> {
        self.check_input(&x)?;
        if targets.ncols() != self.out_features() || targets.nrows() != x.nrows() {
            return Err(XonError::ShapeMismatch {
                context: "training targets",
                expected: x.nrows() * self.out_features(),
                actual: targets.len(),
            });
        }

        let batch = x.nrows().max(1) as f32;
        let activations = self.trace(x);
        let output = &activations[self.layers.len()];

        let error = output - &targets;
        let loss = error.mapv(|e| e * e).sum() / batch;

        // dL/dz for the output layer
        let mut delta = error.mapv(|e| 2.0 * e / batch);
        let mut grads = Vec::with_capacity(self.layers.len());

        for i in (0..self.layers.len()).rev() {
            let input = &activations[i];
            grads.push((delta.t().dot(input), delta.sum_axis(Axis(0))));

            if i > 0 {
                let upstream = delta.dot(&self.layers[i].weight);
                delta = upstream * &input.mapv(|a| a * (1.0 - a));
            }
        }
        grads.reverse();

        Ok((loss, Gradients { layers: grads }))
    }

    /// Plain gradient descent update
    pub fn apply_sgd(&mut self, gradients: &Gradients, lr: f32) {
        for (layer, (gw, gb)) in self.layers.iter_mut().zip(&gradients.layers) {
            layer.weight.scaled_add(-lr, gw);
            layer.bias.scaled_add(-lr, gb);
        }
    }
}
