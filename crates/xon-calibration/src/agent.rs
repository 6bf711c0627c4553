//! Feature-to-action agent

use crate::mlp::Mlp;
use crate::snapshot::{load_snapshot, save_snapshot, Snapshot};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::Rng;
use std::path::{Path, PathBuf};
use tracing::info;
use xon_core::{XonError, XonResult};

/// Size of the on-screen action space
pub const ACTION_DIM: usize = 2;

/// Named network mapping EEG features to a 2D position
#[derive(Debug, Clone)]
pub struct Agent {
    name: String,
    net: Mlp,
}

impl Agent {
    /// Randomly initialized agent with the given hidden layer sizes
    pub fn new<R: Rng + ?Sized>(
        name: &str,
        in_features: usize,
        hidden_layers: &[usize],
        out_features: usize,
        rng: &mut R,
    ) -> XonResult<Self> {
        let mut layers = hidden_layers.to_vec();
        layers.push(out_features);
        let net = Mlp::new(in_features, &layers, rng)?;

        Ok(Agent {
            name: name.to_string(),
            net,
        })
    }

    /// Agent whose parameters come from snapshot `snapshot_name` in `dir`
    pub fn from_snapshot(
        name: &str,
        dir: &Path,
        snapshot_name: &str,
        in_features: usize,
        out_features: usize,
    ) -> XonResult<Self> {
        let net = load_snapshot(dir, snapshot_name)?.into_network()?;
        if net.in_features() != in_features {
            return Err(XonError::ShapeMismatch {
                context: "snapshot input features",
                expected: in_features,
                actual: net.in_features(),
            });
        }
        if net.out_features() != out_features {
            return Err(XonError::ShapeMismatch {
                context: "snapshot output features",
                expected: out_features,
                actual: net.out_features(),
            });
        }

        info!(agent = name, snapshot = snapshot_name, "agent initialized from snapshot");
        Ok(Agent {
            name: name.to_string(),
            net,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn network(&self) -> &Mlp {
        &self.net
    }

    pub(crate) fn network_mut(&mut self) -> &mut Mlp {
        &mut self.net
    }

    pub fn in_features(&self) -> usize {
        self.net.in_features()
    }

    /// Action for a single feature vector
    pub fn act(&self, features: ArrayView1<f32>) -> XonResult<Array1<f32>> {
        let batch = features.insert_axis(Axis(0));
        let actions = self.net.forward(batch)?;
        Ok(actions.index_axis_move(Axis(0), 0))
    }

    /// Actions for a `B x in` batch
    pub fn act_batch(&self, features: ArrayView2<f32>) -> XonResult<Array2<f32>> {
        self.net.forward(features)
    }

    /// Save parameters to `dir/<name>`
    pub fn snapshot(&self, dir: &Path) -> XonResult<PathBuf> {
        save_snapshot(dir, &Snapshot::of(&self.name, &self.net))
    }
}
