use anyhow::{anyhow, Result};
use ndarray::Array2;
use polars::{frame::DataFrame, prelude::{Column, DataType}};

use crate::{
    config::MissingFeaturePolicy,
    error::PipelineError,
    types::{ID_COLUMN, TARGET_COLUMN},
};

use super::{feature_matrix, model::TrainedModel};

/// Name of the estimate column in prediction outputs.
pub const PREDICTION_COLUMN: &str = "predicted_population";

/// Applies a trained model to a feature table, matching columns by name.
#[derive(Debug, Clone, Copy, Default)]
pub struct Predictor {
    policy: MissingFeaturePolicy,
}

impl Predictor {
    pub fn new(policy: MissingFeaturePolicy) -> Self {
        Self { policy }
    }

    /// Feature matrix in the model's training order.
    fn aligned(&self, model: &TrainedModel, table: &DataFrame) -> Result<Array2<f64>> {
        let missing: Vec<String> = model.feature_names.iter()
            .filter(|name| table.column(name).is_err())
            .cloned()
            .collect();

        if !missing.is_empty() {
            match self.policy {
                MissingFeaturePolicy::Fail => return Err(anyhow!(PipelineError::FeatureMismatch { missing })),
                MissingFeaturePolicy::ZeroFill => {
                    for name in &missing {
                        log::warn!("[regression::predict] feature {name} is absent; filling with 0");
                    }
                }
            }
        }

        let present: Vec<&str> = model.feature_names.iter()
            .map(String::as_str)
            .filter(|name| !missing.iter().any(|m| m == name))
            .collect();
        let values = feature_matrix(table, &present)?;

        let mut x = Array2::zeros((table.height(), model.feature_names.len()));
        let mut k = 0;
        for (j, name) in model.feature_names.iter().enumerate() {
            if missing.contains(name) { continue }
            x.column_mut(j).assign(&values.column(k));
            k += 1;
        }
        Ok(x)
    }

    /// One estimate per row of `table`.
    pub fn predict(&self, model: &TrainedModel, table: &DataFrame) -> Result<Vec<f64>> {
        let x = self.aligned(model, table)?;
        let predictions = model.forest.predict(x.view());
        log::info!("[regression::predict] predicted {} rows", predictions.len());
        Ok(predictions)
    }

    /// `building_id, predicted_population` followed by the input's feature columns.
    pub fn predict_frame(&self, model: &TrainedModel, table: &DataFrame) -> Result<DataFrame> {
        let predictions = self.predict(model, table)?;

        let mut columns = Vec::with_capacity(table.width() + 1);
        match table.column(ID_COLUMN) {
            Ok(ids) => columns.push(ids.cast(&DataType::String)?),
            Err(_) => columns.push(Column::new(
                ID_COLUMN.into(),
                (0..table.height()).map(|i| i.to_string()).collect::<Vec<_>>(),
            )),
        }
        columns.push(Column::new(PREDICTION_COLUMN.into(), predictions));
        columns.extend(
            table.get_columns().iter()
                .filter(|c| c.name().as_str() != ID_COLUMN && c.name().as_str() != TARGET_COLUMN)
                .cloned(),
        );
        Ok(DataFrame::new(columns)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::TrainConfig, regression::Trainer};

    fn frame(names: &[&str], n: usize) -> DataFrame {
        let mut columns = vec![Column::new(ID_COLUMN.into(), (0..n).map(|i| format!("b{i}")).collect::<Vec<_>>())];
        for (j, name) in names.iter().enumerate() {
            columns.push(Column::new((*name).into(), (0..n).map(|i| (i * (j + 1)) as f64).collect::<Vec<_>>()));
        }
        DataFrame::new(columns).unwrap()
    }

    fn model() -> TrainedModel {
        let mut df = frame(&["a", "b"], 30);
        let target: Vec<f64> = (0..30).map(|i| i as f64 * 0.5).collect();
        df.with_column(Column::new(TARGET_COLUMN.into(), target)).unwrap();
        Trainer::new(TrainConfig { n_trees: 5, ..Default::default() }).fit(&df).unwrap()
    }

    #[test]
    fn missing_feature_fails_by_default() {
        let err = Predictor::default().predict(&model(), &frame(&["a"], 3)).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PipelineError>(),
            Some(&PipelineError::FeatureMismatch { missing: vec!["b".into()] }),
        );
    }

    #[test]
    fn zero_fill_substitutes_missing_features() {
        let model = model();
        let partial = frame(&["a"], 3);
        let mut zeroed = frame(&["a"], 3);
        zeroed.with_column(Column::new("b".into(), vec![0.0; 3])).unwrap();

        let predictor = Predictor::new(MissingFeaturePolicy::ZeroFill);
        assert_eq!(predictor.predict(&model, &partial).unwrap(), predictor.predict(&model, &zeroed).unwrap());
    }

    #[test]
    fn output_frame_layout() {
        let out = Predictor::default().predict_frame(&model(), &frame(&["a", "b", "extra"], 4)).unwrap();
        let names: Vec<String> = out.get_column_names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, [ID_COLUMN, PREDICTION_COLUMN, "a", "b", "extra"]);
        assert_eq!(out.height(), 4);
    }
}
