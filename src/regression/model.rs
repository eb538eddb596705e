use std::{fs, path::Path};

use anyhow::{anyhow, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{error::PipelineError, io::write_atomic};

use super::{forest::RandomForest, metrics::ModelMetrics};

/// Version of the persisted model layout.
pub const MODEL_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// A fitted forest together with the feature order it was trained on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub format_version: u32,
    /// Training column order; prediction inputs are rearranged to match it.
    pub feature_names: Vec<String>,
    pub forest: RandomForest,
    pub metrics: ModelMetrics,
    /// Largest importances, in decreasing order.
    pub importances: Vec<FeatureImportance>,
    /// Hex SHA-256 of the serialized forest.
    pub checksum: String,
}

fn forest_checksum(forest: &RandomForest) -> Result<String> {
    let bytes = serde_json::to_vec(forest).context("[regression::model] Failed to serialize forest")?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

impl TrainedModel {
    pub fn new(
        feature_names: Vec<String>,
        forest: RandomForest,
        metrics: ModelMetrics,
        importances: Vec<FeatureImportance>,
    ) -> Result<Self> {
        ensure!(
            feature_names.len() == forest.n_features(),
            "[regression::model] {} feature names for a forest over {} features",
            feature_names.len(), forest.n_features(),
        );
        let checksum = forest_checksum(&forest)?;
        Ok(Self { format_version: MODEL_FORMAT_VERSION, feature_names, forest, metrics, importances, checksum })
    }

    /// Write the model as JSON, atomically.
    pub fn save(&self, path: &Path, force: bool) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)
            .context("[regression::model] Failed to serialize model")?;
        write_atomic(path, force, &bytes)?;
        log::info!("[regression::model] saved {} trees to {}", self.forest.n_trees(), path.display());
        Ok(())
    }

    /// Read a model and verify its version and forest checksum.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("[regression::model] Failed to read model file: {}", path.display()))?;
        let model: Self = serde_json::from_slice(&bytes)
            .with_context(|| format!("[regression::model] Failed to parse model file: {}", path.display()))?;

        if model.format_version != MODEL_FORMAT_VERSION {
            return Err(anyhow!(PipelineError::InvalidInput(format!(
                "model {} has format version {}, expected {MODEL_FORMAT_VERSION}",
                path.display(), model.format_version,
            ))));
        }
        let checksum = forest_checksum(&model.forest)?;
        if checksum != model.checksum {
            return Err(anyhow!(PipelineError::InvalidInput(format!(
                "model {} is corrupt: forest checksum {checksum} does not match {}",
                path.display(), model.checksum,
            ))));
        }
        ensure!(
            model.feature_names.len() == model.forest.n_features(),
            PipelineError::InvalidInput(format!("model {} lists {} features for a forest over {}",
                path.display(), model.feature_names.len(), model.forest.n_features()))
        );
        Ok(model)
    }
}
