//! Stage orchestration: load, align, match, interpolate, featurize, train, predict.
//!
//! Every input is reprojected into the single working CRS of the run right
//! after it is loaded. The working CRS is the configured one, or the UTM zone
//! of the first loaded layer's centre.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use geo::{Geometry, Rect};
use polars::frame::DataFrame;
use serde_json::{json, Map, Value};

use crate::{
    config::PipelineConfig,
    error::PipelineError,
    features::{FeatureContext, FeatureExtractor},
    geom::{assume_crs, Crs, Geometries, GeometryAdapter, Reprojector},
    interpolate::{Interpolation, Interpolator},
    io::{self, csv::write_csv, geojson},
    matcher::SpatialMatcher,
    regression::{Predictor, Trainer, TrainedModel, PREDICTION_COLUMN},
    types::{Building, FeatureTable, PopulationPoint, PopulationSource},
};

pub const POPULATION_CSV: &str = "buildings_population.csv";
pub const POPULATION_GEOJSON: &str = "buildings_population.geojson";
pub const METRICS_JSON: &str = "interpolation_metrics.json";
pub const FEATURES_CSV: &str = "features.csv";
pub const MODEL_JSON: &str = "model.json";
pub const PREDICTIONS_CSV: &str = "buildings_predicted.csv";
pub const PREDICTIONS_GEOJSON: &str = "buildings_predicted.geojson";

/// Input files of a full run.
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    pub population: PathBuf,
    pub buildings: PathBuf,
    pub pois: Option<PathBuf>,
    pub roads: Option<PathBuf>,
}

/// Everything a full run produces, held in memory until written.
#[derive(Debug, Clone)]
pub struct PipelineOutputs {
    /// Buildings in the working CRS.
    pub buildings: Vec<Building>,
    pub interpolation: Interpolation,
    /// Features of every building, labelled where interpolation matched it.
    pub features: FeatureTable,
    pub model: TrainedModel,
    /// `building_id, predicted_population, <features...>` for every building.
    pub predictions: DataFrame,
}

pub struct Pipeline {
    config: PipelineConfig,
    adapter: Option<GeometryAdapter>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let adapter = config.working_crs()?.map(GeometryAdapter::new).transpose()?;
        Ok(Self { config, adapter })
    }

    #[inline] pub fn config(&self) -> &PipelineConfig { &self.config }

    /// The adapter of the run; fixed by the configuration or by the first loaded layer.
    pub fn adapter(&self) -> Result<&GeometryAdapter> {
        self.adapter.as_ref().ok_or_else(|| anyhow!(PipelineError::Crs(
            "working CRS is not known until a layer has been loaded".to_string()
        )))
    }

    /// Fix the working CRS from the centre of `bounds` (given in `crs`) unless already set.
    fn settle_adapter(&mut self, bounds: Option<Rect<f64>>, crs: &Crs) -> Result<&GeometryAdapter> {
        if self.adapter.is_none() {
            let centre = bounds
                .ok_or_else(|| anyhow!(PipelineError::InvalidInput("cannot choose a working CRS for empty input".to_string())))?
                .center();
            let lonlat = Reprojector::new(crs, &Crs::Wgs84)?.coord(centre)?;
            self.adapter = Some(GeometryAdapter::auto_utm(lonlat.x, lonlat.y)?);
        }
        self.adapter()
    }

    fn source_crs(&self, declared: Option<Crs>) -> Result<Crs> {
        Ok(assume_crs(declared, &self.config.source_crs()?))
    }

    /// Read a population source and bring it into the working CRS.
    pub fn load_population(&mut self, path: &Path) -> Result<PopulationSource> {
        let loaded = io::read_population(path, &self.config.columns)?;
        let crs = self.source_crs(loaded.crs)?;
        let bounds = match &loaded.data {
            PopulationSource::Zones(zones) => Geometries::new(zones.iter().map(|z| z.geometry().clone()).collect()).bounds(),
            PopulationSource::Points(points) => Geometries::new(points.iter().map(PopulationPoint::location).collect()).bounds(),
        };
        let adapter = self.settle_adapter(bounds, &crs)?;
        adapter.reproject_source(&loaded.data, Some(&crs))
            .with_context(|| format!("[pipeline] reprojecting {}", path.display()))
    }

    /// Read building footprints and bring them into the working CRS.
    pub fn load_buildings(&mut self, path: &Path) -> Result<Vec<Building>> {
        let loaded = io::read_buildings(path, self.config.columns.building_id.as_deref())?;
        let crs = self.source_crs(loaded.crs)?;
        let bounds = Geometries::new(loaded.data.iter().map(|b| b.geometry().clone()).collect()).bounds();
        let adapter = self.settle_adapter(bounds, &crs)?;
        adapter.reproject_buildings(&loaded.data, Some(&crs))
            .with_context(|| format!("[pipeline] reprojecting {}", path.display()))
    }

    /// Read optional POI and road layers and index them with the buildings.
    pub fn load_context(&self, pois: Option<&Path>, roads: Option<&Path>, buildings: &[Building]) -> Result<FeatureContext> {
        let pois: Vec<Geometry<f64>> = match pois {
            Some(path) => {
                let loaded = io::read_pois(path)?;
                let crs = self.source_crs(loaded.crs)?;
                self.adapter()?.reproject_all(&loaded.data, Some(&crs))?
            }
            None => Vec::new(),
        };
        let roads = match roads {
            Some(path) => {
                let loaded = io::read_roads(path)?;
                let crs = self.source_crs(loaded.crs)?;
                self.adapter()?.reproject_all(&loaded.data, Some(&crs))?
            }
            None => Vec::new(),
        };
        let context = FeatureContext::new(pois, roads, buildings);
        log::info!(
            "[pipeline] context: {} POIs, {} road segments, {} buildings",
            context.poi_count(), context.road_segment_count(), buildings.len(),
        );
        Ok(context)
    }

    /// Match buildings to the source and distribute its population.
    pub fn assign_population(&self, source: &PopulationSource, buildings: &[Building]) -> Result<Interpolation> {
        let matches = SpatialMatcher::new(self.config.matching.clone()).run(source, buildings)?;
        Interpolator::new(self.adapter()?.clone(), self.config.matching.clone()).run(source, buildings, &matches)
    }

    pub fn featurize(&self, buildings: &[Building], context: &FeatureContext) -> Result<FeatureTable> {
        let extractor = FeatureExtractor::new(self.adapter()?, context, self.config.features.clone())?;
        Ok(extractor.extract_all(buildings))
    }

    /// Fit a model on the labelled rows of `table`.
    pub fn train(&self, table: &FeatureTable) -> Result<TrainedModel> {
        Trainer::new(self.config.training.clone()).fit(&table.to_dataframe()?)
    }

    pub fn predict(&self, model: &TrainedModel, table: &FeatureTable) -> Result<DataFrame> {
        Predictor::new(self.config.missing_features).predict_frame(model, &table.to_dataframe()?)
    }

    /// All stages in order. Nothing is written; see [`Pipeline::write_outputs`].
    pub fn run(&mut self, inputs: &PipelineInputs) -> Result<PipelineOutputs> {
        let source = self.load_population(&inputs.population)?;
        let buildings = self.load_buildings(&inputs.buildings)?;
        let context = self.load_context(inputs.pois.as_deref(), inputs.roads.as_deref(), &buildings)?;

        let interpolation = self.assign_population(&source, &buildings)?;
        let labels = interpolation.labels();
        let features = self.featurize(&buildings, &context)?
            .with_targets(|id| labels.get(id).copied());
        drop(labels);

        let model = self.train(&features)?;
        let predictions = self.predict(&model, &features)?;

        Ok(PipelineOutputs { buildings, interpolation, features, model, predictions })
    }

    /// Population CSV and GeoJSON plus the interpolation metrics, under `dir`.
    pub fn write_population(&self, dir: &Path, buildings: &[Building], interpolation: &Interpolation, force: bool) -> Result<()> {
        write_csv(&mut interpolation.to_dataframe()?, &dir.join(POPULATION_CSV), force)?;
        self.write_buildings(&dir.join(POPULATION_GEOJSON), buildings, force, |i| {
            let p = &interpolation.populations()[i];
            Map::from_iter([("population".to_string(), json!(p.population)), ("matched".to_string(), json!(p.matched))])
        })?;
        interpolation.metrics().write_json(&dir.join(METRICS_JSON), force)?;
        log::info!("[pipeline] wrote population outputs to {}", dir.display());
        Ok(())
    }

    /// Every output of [`Pipeline::run`], under `dir`.
    pub fn write_outputs(&self, dir: &Path, outputs: &PipelineOutputs, force: bool) -> Result<()> {
        self.write_population(dir, &outputs.buildings, &outputs.interpolation, force)?;
        write_csv(&mut outputs.features.to_dataframe()?, &dir.join(FEATURES_CSV), force)?;
        outputs.model.save(&dir.join(MODEL_JSON), force)?;
        write_csv(&mut outputs.predictions.clone(), &dir.join(PREDICTIONS_CSV), force)?;

        let predicted: Vec<Option<f64>> = outputs.predictions.column(PREDICTION_COLUMN)?.f64()?.into_iter().collect();
        self.write_buildings(&dir.join(PREDICTIONS_GEOJSON), &outputs.buildings, force, |i| {
            Map::from_iter([(PREDICTION_COLUMN.to_string(), json!(predicted.get(i).copied().flatten()))])
        })?;
        log::info!("[pipeline] wrote model and predictions to {}", dir.display());
        Ok(())
    }

    /// Buildings as WGS84 GeoJSON with per-building properties.
    fn write_buildings(&self, path: &Path, buildings: &[Building], force: bool, properties: impl Fn(usize) -> Map<String, Value>) -> Result<()> {
        let to_wgs84 = self.adapter()?.from_working(&Crs::Wgs84)?;
        let features = buildings.iter().enumerate()
            .map(|(i, building)| {
                let geometry = to_wgs84.apply(building.geometry())
                    .with_context(|| format!("[pipeline] building {}", building.id()))?;
                let mut props = Map::new();
                props.insert("building_id".to_string(), Value::from(building.id()));
                props.extend(properties(i));
                Ok(geojson::feature(building.id(), &geometry, props))
            })
            .collect::<Result<Vec<_>>>()?;
        geojson::write_features(path, features, force)
    }
}
