//! Loading population sources, buildings and context layers from disk.

use std::{collections::BTreeMap, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use geo::{Geometry, Line, MultiPolygon, Point};
use polars::frame::DataFrame;

use crate::{
    config::ColumnMapping,
    error::PipelineError,
    geom::Crs,
    types::{ensure_unique_ids, Building, BuildingAttributes, PopulationPoint, PopulationSource, Zone},
};

use super::{csv, geojson::{self, GeoFeature}, shp, wkt, xlsx};

/// Data read from a file plus the CRS the file declares, if any.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub data: T,
    pub crs: Option<Crs>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format { Csv, GeoJson, Shapefile, Spreadsheet }

fn format_of(path: &Path) -> Result<Format> {
    let ext = path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "csv" => Ok(Format::Csv),
        "geojson" | "json" => Ok(Format::GeoJson),
        "shp" => Ok(Format::Shapefile),
        "xlsx" | "xlsm" | "xls" | "ods" => Ok(Format::Spreadsheet),
        _ => bail!(PipelineError::InvalidInput(format!("unsupported file type: {}", path.display()))),
    }
}

/// Read a population source (zones or points) from CSV, a spreadsheet or GeoJSON.
pub fn read_population(path: &Path, columns: &ColumnMapping) -> Result<Loaded<PopulationSource>> {
    let loaded = match format_of(path)? {
        Format::Csv => Loaded { data: population_from_table(&csv::read_csv(path)?, path, columns)?, crs: None },
        Format::Spreadsheet => Loaded { data: population_from_table(&xlsx::read_sheet(path)?, path, columns)?, crs: None },
        Format::GeoJson => {
            let read = geojson::read_features(path)?;
            Loaded { data: population_from_features(path, read.features, columns)?, crs: read.crs }
        }
        Format::Shapefile => bail!(PipelineError::InvalidInput(format!(
            "population sources are read from CSV, spreadsheets or GeoJSON, not {}", path.display()
        ))),
    };
    loaded.data.ensure_unique_ids()
        .with_context(|| format!("[io::source] reading {}", path.display()))?;
    log::info!("[io] read {} population {} from {}", loaded.data.len(), loaded.data.kind(), path.display());
    Ok(loaded)
}

/// Zones (WKT column) or points (coordinate columns) from a table read out of `path`.
fn population_from_table(df: &DataFrame, path: &Path, columns: &ColumnMapping) -> Result<PopulationSource> {
    let population = csv::float_values(df, &columns.population, path)?;
    let ids = match &columns.id {
        Some(id) => csv::string_values(df, id, path)?,
        None => (0..df.height()).map(|i| i.to_string()).collect(),
    };

    let population_at = |row: usize| -> Result<f64> {
        population[row].ok_or_else(|| anyhow!(PipelineError::InvalidInput(format!(
            "missing {:?} value for {} in {}", columns.population, ids[row], path.display()
        ))))
    };

    if let Some(geometry) = &columns.geometry {
        let wkts = csv::string_values(df, geometry, path)?;
        let zones = wkts.iter().enumerate()
            .map(|(row, text)| {
                let geometry = wkt::parse_wkt_multipolygon(text)
                    .with_context(|| format!("[io::source] zone {} in {}", ids[row], path.display()))?;
                Zone::new(ids[row].clone(), population_at(row)?, geometry)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(PopulationSource::Zones(zones))
    } else if let Some((lon, lat)) = columns.coordinates() {
        let xs = csv::float_values(df, lon, path)?;
        let ys = csv::float_values(df, lat, path)?;
        let points = (0..df.height())
            .map(|row| {
                let (Some(x), Some(y)) = (xs[row], ys[row]) else {
                    bail!(PipelineError::InvalidInput(format!("missing coordinates for {} in {}", ids[row], path.display())));
                };
                PopulationPoint::new(ids[row].clone(), population_at(row)?, Point::new(x, y))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(PopulationSource::Points(points))
    } else {
        bail!(PipelineError::InvalidInput(
            "column mapping must name a geometry column or longitude/latitude columns".to_string()
        ))
    }
}

fn feature_id(feature: &GeoFeature, key: Option<&str>, position: usize) -> String {
    key.and_then(|k| feature.text(k))
        .or_else(|| feature.id.clone())
        .unwrap_or_else(|| position.to_string())
}

fn population_from_features(path: &Path, features: Vec<GeoFeature>, columns: &ColumnMapping) -> Result<PopulationSource> {
    let mut zones = Vec::new();
    let mut points = Vec::new();

    for (i, feature) in features.iter().enumerate() {
        let id = feature_id(feature, columns.id.as_deref(), i);
        let population = match feature.properties.get(&columns.population) {
            None => bail!(PipelineError::missing_column(path.display().to_string(), &columns.population)),
            Some(_) => feature.number(&columns.population).ok_or_else(|| anyhow!(PipelineError::InvalidInput(
                format!("non-numeric {:?} for {id} in {}", columns.population, path.display())
            )))?,
        };
        match &feature.geometry {
            Geometry::Polygon(polygon) => zones.push(Zone::new(id, population, MultiPolygon(vec![polygon.clone()]))?),
            Geometry::MultiPolygon(mp) => zones.push(Zone::new(id, population, mp.clone())?),
            Geometry::Point(point) => points.push(PopulationPoint::new(id, population, *point)?),
            _ => bail!(PipelineError::InvalidInput(format!(
                "population feature {id} in {} is neither a polygon nor a point", path.display()
            ))),
        }
    }

    match (zones.is_empty(), points.is_empty()) {
        (_, true) => Ok(PopulationSource::Zones(zones)),
        (true, false) => Ok(PopulationSource::Points(points)),
        (false, false) => bail!(PipelineError::InvalidInput(format!(
            "{} mixes polygon zones and population points", path.display()
        ))),
    }
}

const LEVEL_KEYS: [&str; 2] = ["building:levels", "levels"];

fn attributes_from(mut fields: BTreeMap<String, String>) -> BuildingAttributes {
    let levels = LEVEL_KEYS.iter().find_map(|key| fields.get(*key).and_then(|v| BuildingAttributes::parse_levels(v)));
    for key in LEVEL_KEYS {
        fields.remove(key);
    }
    BuildingAttributes {
        levels,
        kind: fields.remove("building"),
        name: fields.remove("name"),
        extra: fields,
    }
}

/// Read building footprints from GeoJSON or an ESRI Shapefile. Non-polygon features are skipped.
pub fn read_buildings(path: &Path, id_key: Option<&str>) -> Result<Loaded<Vec<Building>>> {
    let loaded = match format_of(path)? {
        Format::GeoJson => {
            let read = geojson::read_features(path)?;
            let mut skipped = read.skipped;
            let mut buildings = Vec::with_capacity(read.features.len());
            for (i, feature) in read.features.iter().enumerate() {
                let geometry = match &feature.geometry {
                    Geometry::Polygon(polygon) => MultiPolygon(vec![polygon.clone()]),
                    Geometry::MultiPolygon(mp) => mp.clone(),
                    _ => { skipped += 1; continue }
                };
                let id_key = id_key.unwrap_or("id");
                let id = feature_id(feature, Some(id_key), i);
                let fields = feature.properties.keys()
                    .filter(|key| key.as_str() != id_key)
                    .filter_map(|key| Some((key.clone(), feature.text(key)?)))
                    .collect();
                buildings.push(Building::new(id, geometry).with_attributes(attributes_from(fields)));
            }
            if skipped > 0 {
                log::warn!("[io] skipped {skipped} non-polygon features in {}", path.display());
            }
            Loaded { data: buildings, crs: read.crs }
        }
        Format::Shapefile => {
            let buildings = shp::read_shapefile(path)?.into_iter().enumerate()
                .map(|(i, (shape, record))| {
                    let geometry = shp::shape_to_multipolygon(shape)
                        .with_context(|| format!("[io::source] Error converting shape {i} in shapefile: {}", path.display()))?;
                    let mut fields = shp::record_fields(record);
                    let id = id_key.and_then(|k| fields.remove(k)).unwrap_or_else(|| i.to_string());
                    Ok(Building::new(id, geometry).with_attributes(attributes_from(fields)))
                })
                .collect::<Result<Vec<_>>>()?;
            Loaded { data: buildings, crs: shp::crs_from_prj(path) }
        }
        Format::Csv | Format::Spreadsheet => bail!(PipelineError::InvalidInput(format!(
            "buildings are read from GeoJSON or Shapefile, not {}", path.display()
        ))),
    };
    ensure_unique_ids("building", loaded.data.iter().map(Building::id))
        .with_context(|| format!("[io::source] reading {}", path.display()))?;
    log::info!("[io] read {} buildings from {}", loaded.data.len(), path.display());
    Ok(loaded)
}

/// Read points of interest (any geometry type) from GeoJSON.
pub fn read_pois(path: &Path) -> Result<Loaded<Vec<Geometry<f64>>>> {
    let read = geojson::read_features(path)?;
    log::info!("[io] read {} POIs from {}", read.features.len(), path.display());
    Ok(Loaded { data: read.features.into_iter().map(|f| f.geometry).collect(), crs: read.crs })
}

/// Read road centrelines from GeoJSON as individual segments. Non-linear features are ignored.
pub fn read_roads(path: &Path) -> Result<Loaded<Vec<Line<f64>>>> {
    let read = geojson::read_features(path)?;
    let segments: Vec<Line<f64>> = read.features.iter()
        .flat_map(|feature| match &feature.geometry {
            Geometry::LineString(ls) => ls.lines().collect::<Vec<_>>(),
            Geometry::MultiLineString(mls) => mls.iter().flat_map(|ls| ls.lines()).collect(),
            Geometry::Line(line) => vec![*line],
            _ => Vec::new(),
        })
        .collect();
    log::info!("[io] read {} road segments from {}", segments.len(), path.display());
    Ok(Loaded { data: segments, crs: read.crs })
}
