use anyhow::{anyhow, ensure, Context, Result};
use ndarray::{Array1, Axis};
use polars::{frame::DataFrame, prelude::DataType};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::{
    config::TrainConfig,
    error::PipelineError,
    types::{ID_COLUMN, TARGET_COLUMN},
};

use super::{
    feature_matrix,
    forest::RandomForest,
    metrics::{ModelMetrics, RegressionMetrics},
    model::{FeatureImportance, TrainedModel},
    tree::TreeParams,
    FEATURE_TABLE,
};

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float32 | DataType::Float64 | DataType::Int32 | DataType::Int64 | DataType::UInt32 | DataType::UInt64
    )
}

/// Fits a random forest on a labelled feature table.
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainConfig,
}

impl Trainer {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.config.max_depth,
            min_samples_split: self.config.min_samples_split,
            min_samples_leaf: self.config.min_samples_leaf,
            max_features: self.config.max_features,
        }
    }

    /// Feature columns: every numeric column except the id and the target, in table order.
    pub fn feature_columns(table: &DataFrame) -> Vec<String> {
        table.get_columns().iter()
            .filter(|c| c.name().as_str() != ID_COLUMN && c.name().as_str() != TARGET_COLUMN)
            .filter(|c| {
                let numeric = is_numeric(c.dtype());
                if !numeric {
                    log::debug!("[regression::trainer] skipping non-numeric column {:?}", c.name().as_str());
                }
                numeric
            })
            .map(|c| c.name().to_string())
            .collect()
    }

    /// Train on the rows that carry a finite target, holding out a shuffled test partition.
    pub fn fit(&self, table: &DataFrame) -> Result<TrainedModel> {
        let feature_names = Self::feature_columns(table);
        ensure!(
            !feature_names.is_empty(),
            PipelineError::InvalidInput("feature table has no numeric feature columns".to_string())
        );

        let target = table.column(TARGET_COLUMN)
            .map_err(|_| anyhow!(PipelineError::missing_column(FEATURE_TABLE, TARGET_COLUMN)))?
            .cast(&DataType::Float64)
            .context("[regression::trainer] target column is not numeric")?;
        let labelled: Vec<(usize, f64)> = target.f64()?.into_iter()
            .enumerate()
            .filter_map(|(row, value)| value.filter(|v| v.is_finite()).map(|v| (row, v)))
            .collect();
        let dropped_rows = table.height() - labelled.len();
        if dropped_rows > 0 {
            log::info!("[regression::trainer] dropped {dropped_rows} rows without a usable target");
        }
        if labelled.is_empty() {
            return Err(anyhow!(PipelineError::EmptyTrainingSet));
        }

        let names: Vec<&str> = feature_names.iter().map(String::as_str).collect();
        let all = feature_matrix(table, &names)?;
        let rows: Vec<usize> = labelled.iter().map(|&(row, _)| row).collect();
        let x = all.select(Axis(0), &rows);
        let y = Array1::from_iter(labelled.iter().map(|&(_, v)| v));

        // Shuffled holdout; row positions below refer to `x` and `y`.
        let n = rows.len();
        let n_test = if n >= 2 {
            ((n as f64 * self.config.test_fraction).round() as usize).clamp(1, n - 1)
        } else {
            0
        };
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut StdRng::seed_from_u64(self.config.seed));
        let (test, train) = order.split_at(n_test);

        let (x_train, y_train) = (x.select(Axis(0), train), y.select(Axis(0), train));
        let forest = RandomForest::fit(x_train.view(), y_train.view(), self.config.n_trees, &self.tree_params(), self.config.seed);

        let train_metrics = RegressionMetrics::evaluate(&y_train.to_vec(), &forest.predict(x_train.view()))
            .ok_or_else(|| anyhow!(PipelineError::EmptyTrainingSet))?;
        let (x_test, y_test) = (x.select(Axis(0), test), y.select(Axis(0), test));
        let test_metrics = RegressionMetrics::evaluate(&y_test.to_vec(), &forest.predict(x_test.view()));

        let mut importances: Vec<FeatureImportance> = feature_names.iter()
            .zip(forest.importances())
            .map(|(feature, &importance)| FeatureImportance { feature: feature.clone(), importance })
            .collect();
        importances.sort_by(|a, b| b.importance.total_cmp(&a.importance).then_with(|| a.feature.cmp(&b.feature)));
        importances.truncate(self.config.top_importances);

        log::info!(
            "[regression::trainer] {} trees on {} rows ({} held out), {} features",
            forest.n_trees(), train.len(), test.len(), feature_names.len(),
        );
        match &test_metrics {
            Some(m) => log::info!("[regression::trainer] test MAE {:.3} RMSE {:.3} R2 {:.3}", m.mae, m.rmse, m.r2),
            None => log::warn!("[regression::trainer] a single labelled row leaves no test partition"),
        }
        if let Some(top) = importances.first() {
            log::info!("[regression::trainer] top feature {} ({:.3})", top.feature, top.importance);
        }

        let metrics = ModelMetrics { train: train_metrics, test: test_metrics, dropped_rows };
        TrainedModel::new(feature_names, forest, metrics, importances)
    }
}
