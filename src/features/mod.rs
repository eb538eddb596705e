//! Per-building feature extraction.

mod context;

use std::{collections::BTreeMap, f64::consts::PI};

use anyhow::Result;

use crate::{
    config::FeatureConfig,
    geom::{Crs, GeometryAdapter, Reprojector},
    types::{Building, FeatureTable, FeatureVector},
};

pub use context::FeatureContext;

/// Count of non-finite values replaced by 0, per feature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SanitizeReport {
    replaced: BTreeMap<String, usize>,
}

impl SanitizeReport {
    pub fn total(&self) -> usize { self.replaced.values().sum() }
    pub fn get(&self, feature: &str) -> usize { self.replaced.get(feature).copied().unwrap_or(0) }
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> { self.replaced.iter().map(|(k, &v)| (k.as_str(), v)) }
}

/// Replace a non-finite value by 0, counting the replacement.
fn sanitize(name: &str, value: f64, report: &mut SanitizeReport) -> f64 {
    if value.is_finite() {
        return value;
    }
    *report.replaced.entry(name.to_string()).or_default() += 1;
    0.0
}

/// Computes the fixed feature set for buildings in the working CRS.
pub struct FeatureExtractor<'a> {
    adapter: &'a GeometryAdapter,
    context: &'a FeatureContext,
    config: FeatureConfig,
    to_wgs84: Reprojector,
}

impl<'a> FeatureExtractor<'a> {
    pub fn new(adapter: &'a GeometryAdapter, context: &'a FeatureContext, config: FeatureConfig) -> Result<Self> {
        let to_wgs84 = adapter.from_working(&Crs::Wgs84)?;
        Ok(Self { adapter, context, config, to_wgs84 })
    }

    /// Feature names, in output order.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = [
            "bld_area_m2", "bld_perimeter_m", "area_to_perimeter_ratio",
            "centroid_lon", "centroid_lat", "levels", "volume_estimate",
        ].map(String::from).into();
        names.push("has_building_tag".into());
        names.extend(self.config.building_types.iter().map(|t| format!("bld_type_{t}")));
        names.extend(["bld_type_other".to_string(), "bld_type_unknown".to_string()]);
        names.extend(self.config.poi_radii_m.iter().map(|r| format!("pois_within_{r}m")));
        names.push(format!("roadlen_{}m", self.config.road_radius_m));
        names.push(format!("bld_density_{}m", self.config.density_radius_m));
        names
    }

    /// Features of one building; non-finite values are replaced by 0 and logged.
    pub fn extract(&self, building: &Building) -> FeatureVector {
        let mut report = SanitizeReport::default();
        let features = self.extract_counted(building, &mut report);
        for (name, _) in report.iter() {
            log::warn!("[features] non-finite {name} for building {} replaced by 0", building.id());
        }
        features
    }

    fn extract_counted(&self, building: &Building, report: &mut SanitizeReport) -> FeatureVector {
        let geometry = building.geometry();
        let area = self.adapter.area(geometry);
        let perimeter = self.adapter.perimeter(geometry);
        let levels = f64::from(building.attributes().levels.unwrap_or(1));
        let centroid = self.adapter.centroid(geometry);
        let lonlat = centroid.and_then(|c| self.to_wgs84.apply(&c).ok());

        let mut raw: Vec<(String, f64)> = vec![
            ("bld_area_m2".into(), area),
            ("bld_perimeter_m".into(), perimeter),
            ("area_to_perimeter_ratio".into(), area / (perimeter + self.config.ratio_epsilon)),
            ("centroid_lon".into(), lonlat.map_or(f64::NAN, |p| p.x())),
            ("centroid_lat".into(), lonlat.map_or(f64::NAN, |p| p.y())),
            ("levels".into(), levels),
            ("volume_estimate".into(), area * levels),
        ];
        raw.extend(self.building_type(building.attributes().kind.as_deref()));
        for &r in &self.config.poi_radii_m {
            let count = centroid.map_or(f64::NAN, |c| self.context.pois_within(c, f64::from(r)) as f64);
            raw.push((format!("pois_within_{r}m"), count));
        }
        let road_radius = f64::from(self.config.road_radius_m);
        raw.push((
            format!("roadlen_{}m", self.config.road_radius_m),
            centroid.map_or(f64::NAN, |c| self.context.road_length_within(c, road_radius)),
        ));
        let density_radius = f64::from(self.config.density_radius_m);
        let hectares = PI * density_radius * density_radius / 10_000.0;
        raw.push((
            format!("bld_density_{}m", self.config.density_radius_m),
            centroid.map_or(f64::NAN, |c| self.context.buildings_within(c, density_radius) as f64 / hectares),
        ));

        let mut features = FeatureVector::new(building.id());
        for (name, value) in raw {
            let value = sanitize(&name, value, report);
            features.push(name, value);
        }
        features
    }

    /// `has_building_tag` followed by the one-hot `bld_type_*` columns.
    fn building_type(&self, kind: Option<&str>) -> Vec<(String, f64)> {
        let kind = kind.map(str::trim).filter(|k| !k.is_empty());
        let known = kind.and_then(|k| self.config.building_types.iter().position(|t| t.eq_ignore_ascii_case(k)));
        let flag = |on: bool| if on { 1.0 } else { 0.0 };

        let mut out = vec![("has_building_tag".to_string(), flag(kind.is_some()))];
        out.extend(self.config.building_types.iter().enumerate()
            .map(|(i, t)| (format!("bld_type_{t}"), flag(known == Some(i)))));
        out.push(("bld_type_other".into(), flag(kind.is_some() && known.is_none())));
        out.push(("bld_type_unknown".into(), flag(kind.is_none())));
        out
    }

    /// Features of every building, with the count of replaced values per feature.
    pub fn extract_all_counted(&self, buildings: &[Building]) -> (FeatureTable, SanitizeReport) {
        let mut report = SanitizeReport::default();
        let rows = buildings.iter().map(|b| self.extract_counted(b, &mut report)).collect();
        for (name, count) in report.iter() {
            log::warn!("[features] replaced {count} non-finite {name} values by 0");
        }
        log::info!("[features] extracted {} features for {} buildings", self.feature_names().len(), buildings.len());
        (FeatureTable::new(rows), report)
    }

    pub fn extract_all(&self, buildings: &[Building]) -> FeatureTable {
        self.extract_all_counted(buildings).0
    }
}
