//! Pipeline configuration.
//!
//! Every field has a default, so an empty JSON object `{}` is a valid config.
//! Values are validated once, up front, by [`PipelineConfig::validate`].

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::{error::PipelineError, geom::Crs};

/// Predicate used to associate targets with references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Target geometry lies entirely within the reference polygon.
    Containment,
    /// Target geometry intersects a disc around the reference anchor.
    Proximity,
    /// Each target takes only its closest reference within `max_radius_m`.
    Nearest,
}

impl MatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::Containment => "containment",
            MatchMode::Proximity => "proximity",
            MatchMode::Nearest => "nearest",
        }
    }
}

/// Resolution of targets matched by several zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// Keep the target only in the zone it overlaps most (conserves population).
    GreatestOverlap,
    /// Average the target's proportional shares over all matched zones.
    Average,
    /// Fail the run on the first ambiguous target.
    Reject,
}

/// How population points are spread over the buildings they match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointAssignment {
    /// Each building gets the mean population of its matched points (not split).
    Mean,
    /// Each point's population is split over its buildings by area.
    AreaSplit,
}

/// What the predictor does when a trained feature is absent from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFeaturePolicy {
    #[default]
    Fail,
    ZeroFill,
}

/// Explicit mapping from logical fields to source column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    /// Identifier column; row position is used when absent.
    pub id: Option<String>,
    pub population: String,
    /// WKT polygon column (zone sources).
    pub geometry: Option<String>,
    /// Coordinate columns (point sources).
    pub longitude: Option<String>,
    pub latitude: Option<String>,
    /// Identifier property of building features; feature id or position when absent.
    pub building_id: Option<String>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            id: None,
            population: "population".to_string(),
            geometry: None,
            longitude: None,
            latitude: None,
            building_id: None,
        }
    }
}

impl ColumnMapping {
    /// Coordinate column pair, if both are configured.
    pub fn coordinates(&self) -> Option<(&str, &str)> {
        Some((self.longitude.as_deref()?, self.latitude.as_deref()?))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub mode: MatchMode,
    /// Initial search radius for proximity matching (metres).
    pub radius_m: f64,
    /// Multiplier applied to the radius when a pass finds nothing.
    pub escalation_factor: f64,
    /// Largest radius the escalation ladder may reach (metres).
    pub max_radius_m: f64,
    pub ambiguity: AmbiguityPolicy,
    pub point_assignment: PointAssignment,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            mode: MatchMode::Containment,
            radius_m: 10.0,
            escalation_factor: 10.0,
            max_radius_m: 1000.0,
            ambiguity: AmbiguityPolicy::GreatestOverlap,
            point_assignment: PointAssignment::Mean,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub poi_radii_m: Vec<u32>,
    pub road_radius_m: u32,
    pub density_radius_m: u32,
    pub ratio_epsilon: f64,
    /// `building` tag values one-hot encoded as `bld_type_<value>`; other tagged
    /// buildings go to `bld_type_other`, untagged ones to `bld_type_unknown`.
    pub building_types: Vec<String>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            poi_radii_m: vec![100, 250, 500],
            road_radius_m: 250,
            density_radius_m: 100,
            ratio_epsilon: 1e-3,
            building_types: ["apartments", "house", "detached", "residential", "commercial", "industrial", "yes"]
                .map(String::from).into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Fraction of rows held out for evaluation.
    pub test_fraction: f64,
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split; all of them when `None`.
    pub max_features: Option<usize>,
    pub seed: u64,
    /// How many importances are kept in the model summary.
    pub top_importances: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
            top_importances: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Working (metric) CRS, e.g. "EPSG:32640"; automatic UTM when absent.
    pub working_crs: Option<String>,
    /// CRS assumed for sources that do not declare one.
    pub assume_source_crs: Option<String>,
    pub columns: ColumnMapping,
    pub matching: MatchConfig,
    pub features: FeatureConfig,
    pub training: TrainConfig,
    pub missing_features: MissingFeaturePolicy,
}

impl PipelineConfig {
    /// Read a JSON config file; absent fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("[config] Failed to open config file: {}", path.display()))?;
        let config: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("[config] Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// The assumed source CRS, defaulting to geographic WGS84.
    pub fn source_crs(&self) -> Result<Crs> {
        self.assume_source_crs.as_deref().map(Crs::parse).unwrap_or(Ok(Crs::Wgs84))
    }

    /// The configured working CRS, if one was set.
    pub fn working_crs(&self) -> Result<Option<Crs>> {
        self.working_crs.as_deref().map(Crs::parse).transpose()
    }

    pub fn validate(&self) -> Result<()> {
        fn invalid(msg: String) -> PipelineError { PipelineError::InvalidInput(msg) }

        let m = &self.matching;
        ensure!(m.radius_m.is_finite() && m.radius_m > 0.0, invalid(format!("radius_m must be positive, got {}", m.radius_m)));
        ensure!(m.escalation_factor > 1.0, invalid(format!("escalation_factor must exceed 1, got {}", m.escalation_factor)));
        ensure!(m.max_radius_m >= m.radius_m, invalid(format!("max_radius_m ({}) is below radius_m ({})", m.max_radius_m, m.radius_m)));

        let f = &self.features;
        ensure!(f.poi_radii_m.iter().all(|&r| r > 0), invalid("poi_radii_m must be positive".to_string()));
        ensure!(f.road_radius_m > 0 && f.density_radius_m > 0, invalid("feature radii must be positive".to_string()));
        ensure!(f.ratio_epsilon > 0.0, invalid(format!("ratio_epsilon must be positive, got {}", f.ratio_epsilon)));
        for (i, kind) in f.building_types.iter().enumerate() {
            ensure!(
                !kind.is_empty() && kind.trim() == kind,
                invalid(format!("building type {kind:?} is empty or padded with whitespace"))
            );
            ensure!(
                !["other", "unknown"].iter().any(|r| r.eq_ignore_ascii_case(kind)),
                invalid(format!("building type {kind:?} is reserved"))
            );
            ensure!(
                !f.building_types[..i].iter().any(|k| k.eq_ignore_ascii_case(kind)),
                invalid(format!("building type {kind:?} is listed twice"))
            );
        }

        let t = &self.training;
        ensure!(t.test_fraction > 0.0 && t.test_fraction < 1.0, invalid(format!("test_fraction must be in (0, 1), got {}", t.test_fraction)));
        ensure!(t.n_trees > 0, invalid("n_trees must be positive".to_string()));
        ensure!(t.min_samples_leaf > 0, invalid("min_samples_leaf must be positive".to_string()));
        ensure!(t.max_features != Some(0), invalid("max_features must be positive".to_string()));

        let c = &self.columns;
        ensure!(
            c.longitude.is_some() == c.latitude.is_some(),
            invalid("longitude and latitude columns must be configured together".to_string())
        );

        self.source_crs()?;
        self.working_crs()?;
        Ok(())
    }
}
