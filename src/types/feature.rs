use anyhow::{Result, ensure};
use polars::{frame::DataFrame, prelude::Column};

use crate::error::PipelineError;

/// Name of the identifier column in feature tables.
pub const ID_COLUMN: &str = "building_id";
/// Name of the regression target column in feature tables.
pub const TARGET_COLUMN: &str = "population";

/// Named numeric inputs for one building, in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    building_id: String,
    values: Vec<(String, f64)>,
    target: Option<f64>,
}

impl FeatureVector {
    pub fn new(building_id: impl Into<String>) -> Self {
        Self { building_id: building_id.into(), values: Vec::new(), target: None }
    }

    pub(crate) fn push(&mut self, name: impl Into<String>, value: f64) {
        self.values.push((name.into(), value));
    }

    pub fn with_target(mut self, target: Option<f64>) -> Self {
        self.target = target;
        self
    }

    #[inline] pub fn building_id(&self) -> &str { &self.building_id }
    #[inline] pub fn values(&self) -> &[(String, f64)] { &self.values }
    #[inline] pub fn target(&self) -> Option<f64> { self.target }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.iter().find(|(n, _)| n == name).map(|&(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(n, _)| n.as_str())
    }
}

/// One feature vector per building, all sharing the same feature names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    rows: Vec<FeatureVector>,
}

impl FeatureTable {
    pub fn new(rows: Vec<FeatureVector>) -> Self { Self { rows } }

    #[inline] pub fn rows(&self) -> &[FeatureVector] { &self.rows }
    #[inline] pub fn len(&self) -> usize { self.rows.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    /// Attach regression targets by building id; buildings without a label keep `None`.
    pub fn with_targets(self, lookup: impl Fn(&str) -> Option<f64>) -> Self {
        Self {
            rows: self.rows.into_iter()
                .map(|row| {
                    let target = lookup(row.building_id());
                    row.with_target(target)
                })
                .collect(),
        }
    }

    /// Convert to a DataFrame: `building_id`, the features in order, then `population` if any row has one.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let names: Vec<&str> = self.rows.first()
            .map(|row| row.names().collect())
            .unwrap_or_default();

        for row in &self.rows {
            ensure!(
                row.names().eq(names.iter().copied()),
                PipelineError::InvalidInput(format!("feature names of {} differ from the first row", row.building_id()))
            );
        }

        let mut columns = Vec::with_capacity(names.len() + 2);
        columns.push(Column::new(
            ID_COLUMN.into(),
            self.rows.iter().map(|row| row.building_id().to_string()).collect::<Vec<_>>(),
        ));
        for (j, name) in names.iter().enumerate() {
            columns.push(Column::new(
                (*name).into(),
                self.rows.iter().map(|row| row.values()[j].1).collect::<Vec<f64>>(),
            ));
        }
        if self.rows.iter().any(|row| row.target().is_some()) {
            columns.push(Column::new(
                TARGET_COLUMN.into(),
                self.rows.iter().map(FeatureVector::target).collect::<Vec<Option<f64>>>(),
            ));
        }

        Ok(DataFrame::new(columns)?)
    }
}
