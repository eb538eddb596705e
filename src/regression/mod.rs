//! Random-forest regression of building population from extracted features.
//!
//! [`Trainer`] fits a bagged ensemble of CART trees on a labelled feature
//! table and returns a [`TrainedModel`]; [`Predictor`] applies a model to a
//! table whose columns are matched by name, so column order never matters.

mod forest;
mod metrics;
mod model;
mod predict;
mod trainer;
mod tree;

use anyhow::{anyhow, Context, Result};
use ndarray::Array2;
use polars::{frame::DataFrame, prelude::DataType};

use crate::error::PipelineError;

pub use forest::RandomForest;
pub use metrics::{mae, r2, rmse, ModelMetrics, RegressionMetrics};
pub use model::{FeatureImportance, TrainedModel, MODEL_FORMAT_VERSION};
pub use predict::{Predictor, PREDICTION_COLUMN};
pub use trainer::Trainer;
pub use tree::{RegressionTree, TreeParams};

/// File label used in errors about in-memory feature tables.
const FEATURE_TABLE: &str = "feature table";

/// The named columns of `table` as an `(rows, names.len())` matrix. Nulls are errors.
fn feature_matrix(table: &DataFrame, names: &[&str]) -> Result<Array2<f64>> {
    let mut x = Array2::zeros((table.height(), names.len()));
    for (j, &name) in names.iter().enumerate() {
        let column = table.column(name)
            .map_err(|_| anyhow!(PipelineError::missing_column(FEATURE_TABLE, name)))?
            .cast(&DataType::Float64)
            .with_context(|| format!("[regression] feature {name:?} is not numeric"))?;
        for (i, value) in column.f64()?.into_iter().enumerate() {
            x[[i, j]] = value.ok_or_else(|| anyhow!(PipelineError::InvalidInput(
                format!("null feature {name:?} at row {i}")
            )))?;
        }
    }
    Ok(x)
}
