//! Named parameter snapshots stored as JSON

use crate::mlp::{Linear, Mlp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use xon_core::{XonError, XonResult};

/// On-disk form of a trained network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: String,
    pub saved_at: DateTime<Utc>,
    pub in_features: usize,
    pub layer_features: Vec<usize>,
    pub layers: Vec<Linear>,
}

impl Snapshot {
    pub fn of(name: &str, net: &Mlp) -> Self {
        Snapshot {
            name: name.to_string(),
            saved_at: Utc::now(),
            in_features: net.in_features(),
            layer_features: net.layer_features(),
            layers: net.layers().to_vec(),
        }
    }

    /// Rebuild the network, checking the stored shape header against the layers
    pub fn into_network(self) -> XonResult<Mlp> {
        let net = Mlp::from_layers(self.layers)?;
        if net.in_features() != self.in_features {
            return Err(XonError::ShapeMismatch {
                context: "snapshot input",
                expected: self.in_features,
                actual: net.in_features(),
            });
        }
        if net.layer_features() != self.layer_features {
            return Err(XonError::ShapeMismatch {
                context: "snapshot layers",
                expected: self.layer_features.len(),
                actual: net.layer_features().len(),
            });
        }
        Ok(net)
    }
}

/// Location of snapshot `name` under `dir`
pub fn snapshot_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(name)
}

fn snapshot_error(path: &Path, reason: impl ToString) -> XonError {
    XonError::Snapshot {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Write a snapshot, creating the directory if needed
pub fn save_snapshot(dir: &Path, snapshot: &Snapshot) -> XonResult<PathBuf> {
    let path = snapshot_path(dir, &snapshot.name);
    fs::create_dir_all(dir).map_err(|e| snapshot_error(&path, e))?;

    let file = File::create(&path).map_err(|e| snapshot_error(&path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, snapshot).map_err(|e| snapshot_error(&path, e))?;
    writer.flush().map_err(|e| snapshot_error(&path, e))?;

    info!(path = %path.display(), "saved snapshot");
    Ok(path)
}

pub fn load_snapshot(dir: &Path, name: &str) -> XonResult<Snapshot> {
    let path = snapshot_path(dir, name);
    let file = File::open(&path).map_err(|e| snapshot_error(&path, e))?;
    let snapshot =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| snapshot_error(&path, e))?;

    info!(path = %path.display(), "loaded snapshot");
    Ok(snapshot)
}
