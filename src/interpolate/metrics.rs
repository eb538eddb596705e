use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    config::{AmbiguityPolicy, MatchMode, PointAssignment},
    io::write_atomic,
};

/// Summary of one interpolation run, written next to the outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpolationMetrics {
    /// "zones" or "points".
    pub source_kind: String,
    pub mode: MatchMode,
    /// Radius of the successful proximity pass.
    pub radius_m: Option<f64>,
    /// Ambiguity resolution (zone sources).
    pub policy: Option<AmbiguityPolicy>,
    /// Point distribution variant (point sources).
    pub assignment: Option<PointAssignment>,
    pub references: usize,
    pub buildings: usize,
    pub total_source_population: f64,
    pub total_assigned_population: f64,
    pub matched_targets: usize,
    pub unmatched_targets: usize,
    pub ambiguous_targets: usize,
    /// References whose matched buildings have zero total area (nothing assigned).
    pub zero_area_references: usize,
    /// References that matched no building (population not assigned).
    pub references_without_targets: usize,
    /// The method preserves the source total and every reference assigned its population.
    pub conserves_population: bool,
}

impl InterpolationMetrics {
    /// Assigned minus source population.
    pub fn population_difference(&self) -> f64 {
        self.total_assigned_population - self.total_source_population
    }

    pub fn write_json(&self, path: &Path, force: bool) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)
            .context("[interpolate::metrics] Failed to serialize metrics")?;
        write_atomic(path, force, &bytes)
    }
}
