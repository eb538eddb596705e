use ndarray::ArrayView2;
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

/// Feature index stored for leaf nodes.
const LEAF: i32 = -2;

/// Stopping rules shared by every tree of a forest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn per split; all of them when `None`.
    pub max_features: Option<usize>,
}

/// Best split found for one node.
struct Split {
    feature: usize,
    threshold: f64,
    left_len: usize,
    sse: f64, // summed squared error of both children
}

/// CART regression tree stored as flat node arrays. Node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    feature: Vec<i32>,   // LEAF for leaves
    threshold: Vec<f64>, // x[feature] <= threshold goes left
    left: Vec<u32>,
    right: Vec<u32>,
    value: Vec<f64>,     // mean target of the node's samples
}

impl RegressionTree {
    #[inline] pub fn node_count(&self) -> usize { self.value.len() }
    #[inline] pub fn is_leaf(&self, node: usize) -> bool { self.feature[node] == LEAF }

    pub fn depth(&self) -> usize {
        fn walk(tree: &RegressionTree, node: usize) -> usize {
            if tree.is_leaf(node) { return 0 }
            1 + walk(tree, tree.left[node] as usize).max(walk(tree, tree.right[node] as usize))
        }
        if self.value.is_empty() { 0 } else { walk(self, 0) }
    }

    /// Grow a tree on the rows `samples` of `x` (repeats allowed, as in a bootstrap sample).
    /// Impurity decreases are added to `importances`, indexed by feature.
    pub fn fit(
        x: ArrayView2<f64>,
        y: &[f64],
        samples: &[usize],
        params: &TreeParams,
        rng: &mut impl Rng,
        importances: &mut [f64],
    ) -> Self {
        let mut tree = Self { feature: vec![], threshold: vec![], left: vec![], right: vec![], value: vec![] };
        let mut samples = samples.to_vec();
        tree.grow(x, y, &mut samples, 0, params, rng, importances);
        tree
    }

    fn push_leaf(&mut self, value: f64) -> usize {
        self.feature.push(LEAF);
        self.threshold.push(0.0);
        self.left.push(0);
        self.right.push(0);
        self.value.push(value);
        self.value.len() - 1
    }

    #[allow(clippy::too_many_arguments)]
    fn grow(
        &mut self,
        x: ArrayView2<f64>,
        y: &[f64],
        samples: &mut [usize],
        depth: usize,
        params: &TreeParams,
        rng: &mut impl Rng,
        importances: &mut [f64],
    ) -> usize {
        let n = samples.len();
        let mean = samples.iter().map(|&i| y[i]).sum::<f64>() / n.max(1) as f64;
        let sse: f64 = samples.iter().map(|&i| (y[i] - mean).powi(2)).sum();
        let node = self.push_leaf(mean);

        if depth >= params.max_depth
            || n < params.min_samples_split.max(2)
            || n < 2 * params.min_samples_leaf
            || sse <= f64::EPSILON * mean.abs().max(1.0)
        {
            return node;
        }

        let Some(split) = best_split(x, y, samples, params, rng) else { return node };
        if split.sse >= sse {
            return node;
        }
        importances[split.feature] += sse - split.sse;

        sort_by_feature(x, samples, split.feature);
        let (left, right) = samples.split_at_mut(split.left_len);
        let l = self.grow(x, y, left, depth + 1, params, rng, importances);
        let r = self.grow(x, y, right, depth + 1, params, rng, importances);

        self.feature[node] = split.feature as i32;
        self.threshold[node] = split.threshold;
        self.left[node] = l as u32;
        self.right[node] = r as u32;
        node
    }

    /// Prediction for one row of features, in training column order.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut node = 0;
        while !self.is_leaf(node) {
            node = if row[self.feature[node] as usize] <= self.threshold[node] {
                self.left[node] as usize
            } else {
                self.right[node] as usize
            };
        }
        self.value[node]
    }
}

fn sort_by_feature(x: ArrayView2<f64>, samples: &mut [usize], feature: usize) {
    samples.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));
}

/// Lowest-error split over a random subset of the features, scanning sorted values once per feature.
fn best_split(
    x: ArrayView2<f64>,
    y: &[f64],
    samples: &mut [usize],
    params: &TreeParams,
    rng: &mut impl Rng,
) -> Option<Split> {
    let n = samples.len();
    let min_leaf = params.min_samples_leaf.max(1);

    let mut candidates: Vec<usize> = (0..x.ncols()).collect();
    candidates.shuffle(rng);
    candidates.truncate(params.max_features.unwrap_or(x.ncols()).clamp(1, x.ncols().max(1)));

    let total_sum: f64 = samples.iter().map(|&i| y[i]).sum();
    let total_sq: f64 = samples.iter().map(|&i| y[i] * y[i]).sum();

    let mut best: Option<Split> = None;
    for feature in candidates {
        sort_by_feature(x, samples, feature);

        let (mut left_sum, mut left_sq) = (0.0, 0.0);
        for k in 1..n {
            let yi = y[samples[k - 1]];
            left_sum += yi;
            left_sq += yi * yi;
            if k < min_leaf || n - k < min_leaf { continue }

            let (lo, hi) = (x[[samples[k - 1], feature]], x[[samples[k], feature]]);
            if lo >= hi { continue } // no threshold separates equal values

            let (nl, nr) = (k as f64, (n - k) as f64);
            let right_sum = total_sum - left_sum;
            let sse = (left_sq - left_sum * left_sum / nl) + (total_sq - left_sq - right_sum * right_sum / nr);

            if best.as_ref().is_none_or(|b| sse < b.sse) {
                let mid = lo + (hi - lo) / 2.0;
                let threshold = if mid < hi { mid } else { lo };
                best = Some(Split { feature, threshold, left_len: k, sse: sse.max(0.0) });
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn params(max_depth: usize) -> TreeParams {
        TreeParams { max_depth, min_samples_split: 2, min_samples_leaf: 1, max_features: None }
    }

    #[test]
    fn step_function_is_learned_exactly() {
        let x = Array2::from_shape_fn((10, 1), |(i, _)| i as f64);
        let y: Vec<f64> = (0..10).map(|i| if i < 4 { 1.0 } else { 7.0 }).collect();
        let samples: Vec<usize> = (0..10).collect();
        let mut importances = vec![0.0];

        let tree = RegressionTree::fit(x.view(), &y, &samples, &params(5), &mut StdRng::seed_from_u64(1), &mut importances);
        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict_row(&[2.0]), 1.0);
        assert_eq!(tree.predict_row(&[3.5]), 1.0);
        assert_eq!(tree.predict_row(&[8.0]), 7.0);
        assert!(importances[0] > 0.0);
    }

    #[test]
    fn depth_limit_and_constant_target() {
        let x = Array2::from_shape_fn((16, 2), |(i, j)| (i * (j + 1)) as f64);
        let y: Vec<f64> = (0..16).map(|i| i as f64).collect();
        let samples: Vec<usize> = (0..16).collect();
        let mut importances = vec![0.0; 2];
        let tree = RegressionTree::fit(x.view(), &y, &samples, &params(2), &mut StdRng::seed_from_u64(1), &mut importances);
        assert!(tree.depth() <= 2);

        let flat = vec![3.0; 16];
        let tree = RegressionTree::fit(x.view(), &flat, &samples, &params(8), &mut StdRng::seed_from_u64(1), &mut importances);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.predict_row(&[100.0, 100.0]), 3.0);
    }

    #[test]
    fn min_samples_leaf_is_respected() {
        let x = Array2::from_shape_fn((6, 1), |(i, _)| i as f64);
        let y = vec![0.0, 0.0, 0.0, 0.0, 0.0, 10.0];
        let samples: Vec<usize> = (0..6).collect();
        let mut importances = vec![0.0];
        let p = TreeParams { min_samples_leaf: 3, ..params(4) };
        let tree = RegressionTree::fit(x.view(), &y, &samples, &p, &mut StdRng::seed_from_u64(1), &mut importances);
        // The only admissible split is 3 | 3.
        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.predict_row(&[5.0]), 10.0 / 3.0);
    }
}
