use ndarray::{ArrayView1, ArrayView2};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::tree::{RegressionTree, TreeParams};

/// Bagged ensemble of regression trees; predictions are the mean over trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    n_features: usize,
    trees: Vec<RegressionTree>,
    /// Impurity-decrease importances, summing to 1 (all 0 when no tree splits).
    importances: Vec<f64>,
}

impl RandomForest {
    #[inline] pub fn n_trees(&self) -> usize { self.trees.len() }
    #[inline] pub fn n_features(&self) -> usize { self.n_features }
    #[inline] pub fn importances(&self) -> &[f64] { &self.importances }

    /// Fit `n_trees` trees, each on a bootstrap sample of the rows of `x`.
    /// The same seed always yields the same forest.
    pub fn fit(x: ArrayView2<f64>, y: ArrayView1<f64>, n_trees: usize, params: &TreeParams, seed: u64) -> Self {
        let (n, m) = x.dim();
        let y = y.to_vec();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut importances = vec![0.0; m];
        let mut trees = Vec::with_capacity(n_trees);

        for _ in 0..n_trees {
            let bootstrap: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
            let mut tree_importances = vec![0.0; m];
            trees.push(RegressionTree::fit(x, &y, &bootstrap, params, &mut rng, &mut tree_importances));
            normalize(&mut tree_importances);
            importances.iter_mut().zip(&tree_importances).for_each(|(total, v)| *total += v);
        }
        normalize(&mut importances);

        log::debug!(
            "[regression::forest] {} trees, max depth {}",
            trees.len(), trees.iter().map(RegressionTree::depth).max().unwrap_or(0),
        );
        Self { n_features: m, trees, importances }
    }

    /// Mean prediction of the trees for one row.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() { return 0.0 }
        self.trees.iter().map(|tree| tree.predict_row(row)).sum::<f64>() / self.trees.len() as f64
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> Vec<f64> {
        x.rows().into_iter()
            .map(|row| match row.as_slice() {
                Some(slice) => self.predict_row(slice),
                None => self.predict_row(&row.to_vec()),
            })
            .collect()
    }
}

fn normalize(values: &mut [f64]) {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        values.iter_mut().for_each(|v| *v /= total);
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array1, Array2};

    use super::*;

    fn params() -> TreeParams {
        TreeParams { max_depth: 6, min_samples_split: 2, min_samples_leaf: 1, max_features: None }
    }

    fn data() -> (Array2<f64>, Array1<f64>) {
        // Feature 0 drives the target, feature 1 is noise-free filler.
        let x = Array2::from_shape_fn((60, 2), |(i, j)| if j == 0 { i as f64 } else { (i % 3) as f64 });
        let y = Array1::from_shape_fn(60, |i| 2.0 * i as f64);
        (x, y)
    }

    #[test]
    fn same_seed_same_forest() {
        let (x, y) = data();
        let a = RandomForest::fit(x.view(), y.view(), 10, &params(), 42);
        let b = RandomForest::fit(x.view(), y.view(), 10, &params(), 42);
        assert_eq!(a, b);
        assert_eq!(a.n_trees(), 10);
        assert_eq!(a.n_features(), 2);
    }

    #[test]
    fn importances_sum_to_one_and_favor_the_signal() {
        let (x, y) = data();
        let forest = RandomForest::fit(x.view(), y.view(), 20, &params(), 7);
        let total: f64 = forest.importances().iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(forest.importances()[0] > forest.importances()[1]);
    }

    #[test]
    fn predictions_track_the_target() {
        let (x, y) = data();
        let forest = RandomForest::fit(x.view(), y.view(), 20, &params(), 42);
        let predictions = forest.predict(x.view());
        let mae = predictions.iter().zip(y.iter()).map(|(p, t)| (p - t).abs()).sum::<f64>() / 60.0;
        assert!(mae < 5.0, "mae {mae}");
    }
}
