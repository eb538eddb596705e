//! GeoJSON feature collections through the `geojson` crate.

use std::{fs, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use geojson::{feature::Id, Feature, FeatureCollection, GeoJson, JsonObject, JsonValue};

use crate::geom::Crs;

use super::write::write_atomic;

/// One feature with its geometry converted to `geo`.
#[derive(Debug, Clone)]
pub(crate) struct GeoFeature {
    pub(crate) id: Option<String>,
    pub(crate) geometry: geo::Geometry<f64>,
    pub(crate) properties: JsonObject,
}

impl GeoFeature {
    /// A property as a string; numbers and booleans are formatted.
    pub(crate) fn text(&self, key: &str) -> Option<String> {
        match self.properties.get(key)? {
            JsonValue::String(s) => Some(s.trim().to_string()),
            JsonValue::Number(n) => Some(n.to_string()),
            JsonValue::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// A property as a number; numeric strings are parsed.
    pub(crate) fn number(&self, key: &str) -> Option<f64> {
        match self.properties.get(key)? {
            JsonValue::Number(n) => n.as_f64(),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Features read from one file plus the CRS it declares (legacy `crs` member), if any.
#[derive(Debug, Clone)]
pub(crate) struct GeoFeatures {
    pub(crate) features: Vec<GeoFeature>,
    pub(crate) crs: Option<Crs>,
    /// Features dropped because they had no geometry.
    pub(crate) skipped: usize,
}

/// Read a GeoJSON `FeatureCollection` from `path`.
pub(crate) fn read_features(path: &Path) -> Result<GeoFeatures> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("[io::geojson::read] Failed to open GeoJSON file: {}", path.display()))?;
    let geojson: GeoJson = text.parse()
        .with_context(|| format!("[io::geojson::read] Failed to parse GeoJSON from {}", path.display()))?;

    let GeoJson::FeatureCollection(collection) = geojson else {
        bail!("[io::geojson::read] {} is not a FeatureCollection", path.display());
    };

    let crs = collection.foreign_members.as_ref()
        .and_then(|members| members.get("crs"))
        .map(declared_crs)
        .transpose()
        .with_context(|| format!("[io::geojson::read] Unsupported crs member in {}", path.display()))?;

    let mut features = Vec::with_capacity(collection.features.len());
    let mut skipped = 0;
    for (i, feature) in collection.features.into_iter().enumerate() {
        let Some(geometry) = feature.geometry.as_ref() else {
            skipped += 1;
            continue;
        };
        let geometry: geo::Geometry<f64> = geometry.try_into()
            .with_context(|| format!("[io::geojson::read] Failed to convert geometry of feature {i} in {}", path.display()))?;
        let id = feature.id.as_ref().map(|id| match id {
            Id::String(s) => s.clone(),
            Id::Number(n) => n.to_string(),
        });
        features.push(GeoFeature { id, geometry, properties: feature.properties.unwrap_or_default() });
    }

    Ok(GeoFeatures { features, crs, skipped })
}

/// Parse the pre-RFC 7946 `"crs": {"type": "name", "properties": {"name": ...}}` member.
fn declared_crs(value: &JsonValue) -> Result<Crs> {
    let name = value.pointer("/properties/name")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| anyhow!("crs member has no properties.name"))?;
    if name.ends_with("CRS84") {
        return Ok(Crs::Wgs84);
    }
    // "urn:ogc:def:crs:EPSG::3857" or "EPSG:3857"
    let code = name.rsplit(':').next().unwrap_or(name);
    Crs::parse(code)
}

/// Build one output feature from a geometry and its properties.
pub(crate) fn feature(id: &str, geometry: &geo::MultiPolygon<f64>, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(geometry))),
        id: Some(Id::String(id.to_string())),
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Write features as a GeoJSON `FeatureCollection`, atomically.
pub(crate) fn write_features(path: &Path, features: Vec<Feature>, force: bool) -> Result<()> {
    let collection = GeoJson::from(FeatureCollection { bbox: None, features, foreign_members: None });
    write_atomic(path, force, collection.to_string().as_bytes())
        .with_context(|| format!("[io::geojson::write] Failed to write GeoJSON to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use geo::{polygon, MultiPolygon};
    use serde_json::json;

    use super::*;

    #[test]
    fn reads_features_ids_and_properties() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.geojson");
        fs::write(&path, json!({
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3857"}},
            "features": [
                {"type": "Feature", "id": 17, "properties": {"building:levels": "3", "name": "A"},
                 "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]}},
                {"type": "Feature", "properties": {}, "geometry": null},
                {"type": "Feature", "properties": {"population": 4},
                 "geometry": {"type": "Point", "coordinates": [2.5, 3.5]}},
            ],
        }).to_string()).unwrap();

        let read = read_features(&path).unwrap();
        assert_eq!(read.crs, Some(Crs::WebMercator));
        assert_eq!(read.skipped, 1);
        assert_eq!(read.features.len(), 2);
        assert_eq!(read.features[0].id.as_deref(), Some("17"));
        assert_eq!(read.features[0].number("building:levels"), Some(3.0));
        assert_eq!(read.features[0].text("name").as_deref(), Some("A"));
        assert_eq!(read.features[1].number("population"), Some(4.0));
        assert!(matches!(read.features[1].geometry, geo::Geometry::Point(_)));
    }

    #[test]
    fn missing_crs_member_is_undeclared() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.geojson");
        fs::write(&path, r#"{"type": "FeatureCollection", "features": []}"#).unwrap();
        assert_eq!(read_features(&path).unwrap().crs, None);
    }

    #[test]
    fn written_features_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.geojson");
        let square = MultiPolygon(vec![polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)]]);
        let mut props = JsonObject::new();
        props.insert("population".into(), json!(12.5));

        write_features(&path, vec![feature("b1", &square, props)], false).unwrap();
        let read = read_features(&path).unwrap();
        assert_eq!(read.features[0].id.as_deref(), Some("b1"));
        assert_eq!(read.features[0].number("population"), Some(12.5));
    }
}
