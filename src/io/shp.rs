//! ESRI Shapefile reading (polygon layers with a `.dbf` attribute table).

use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{bail, Context, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use regex::Regex;
use shapefile::{dbase::{FieldValue, Record}, Reader, Shape};

use crate::geom::Crs;

/// Reads all shapes + attribute records from a given `.shp` file path.
pub(crate) fn read_shapefile(path: &Path) -> Result<Vec<(Shape, Record)>> {
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("[io::shp::read] Failed to open shapefile: {}", path.display()))?;

    let mut items = Vec::with_capacity(reader.shape_count()?);
    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result
            .with_context(|| format!("[io::shp::read] Error reading shape+record in {}", path.display()))?;
        items.push((shape, record));
    }
    Ok(items)
}

/// Coerce a generic shape into an owned multipolygon, raising error if different shape.
pub(crate) fn shape_to_multipolygon(shape: Shape) -> Result<MultiPolygon<f64>> {
    match shape {
        Shape::Polygon(polygon) => Ok(shp_to_geo(&polygon)),
        Shape::NullShape => Ok(MultiPolygon(vec![])),
        other => bail!("found non-Polygon shape in layer: {:?}", other.shapetype()),
    }
}

/// Convert shapefile::Polygon to geo::MultiPolygon<f64>
pub(crate) fn shp_to_geo(p: &shapefile::Polygon) -> MultiPolygon<f64> {
    /// Get the signed area of a geo::Coord list (negative for clockwise)
    fn signed_area(pts: &[Coord<f64>]) -> f64 {
        pts.windows(2).map(|w| w[0].x * w[1].y - w[1].x * w[0].y).sum::<f64>() / 2.0
    }

    let mut polys: Vec<Polygon<f64>> = Vec::new();
    let mut current_exterior: Option<LineString<f64>> = None;
    let mut current_holes: Vec<LineString<f64>> = Vec::new();

    // Shapefile stores each exterior (clockwise) followed by its holes.
    for ring in p.rings() {
        let mut coords: Vec<Coord<f64>> = ring.points().iter().map(|pt| Coord { x: pt.x, y: pt.y }).collect();
        if coords.first() != coords.last() {
            coords.push(coords[0]);
        }
        let is_exterior = signed_area(&coords) < 0.0;
        let ls = LineString(coords);

        if is_exterior {
            if let Some(ext) = current_exterior.take() {
                polys.push(Polygon::new(ext, std::mem::take(&mut current_holes)));
            }
            current_exterior = Some(ls);
        } else {
            current_holes.push(ls);
        }
    }
    if let Some(ext) = current_exterior {
        polys.push(Polygon::new(ext, current_holes));
    }

    MultiPolygon(polys)
}

/// Attribute values of a record as strings, keyed by field name. Empty fields are left out.
pub(crate) fn record_fields(record: Record) -> BTreeMap<String, String> {
    record.into_iter()
        .filter_map(|(field, value)| {
            let text = match value {
                FieldValue::Character(Some(s)) => s.trim().to_string(),
                FieldValue::Numeric(Some(n)) => n.to_string(),
                FieldValue::Float(Some(n)) => n.to_string(),
                FieldValue::Integer(n) => n.to_string(),
                FieldValue::Double(n) => n.to_string(),
                FieldValue::Logical(Some(b)) => b.to_string(),
                _ => return None,
            };
            (!text.is_empty()).then_some((field, text))
        })
        .collect()
}

/// CRS declared by the `.prj` sidecar, if there is one we understand.
pub(crate) fn crs_from_prj(path: &Path) -> Option<Crs> {
    let wkt = fs::read_to_string(path.with_extension("prj")).ok()?;
    let re = Regex::new(r#"AUTHORITY\["EPSG",\s*"?(\d+)"?\]\s*\]\s*$"#).ok()?;
    if let Some(crs) = re.captures(wkt.trim()).and_then(|c| Crs::parse(&c[1]).ok()) {
        return Some(crs);
    }
    if wkt.trim_start().starts_with("GEOGCS") && wkt.contains("WGS_1984") {
        return Some(Crs::Wgs84);
    }
    let utm = Regex::new(r"WGS_1984_UTM_Zone_(\d{1,2})([NS])").ok()?;
    utm.captures(&wkt).and_then(|c| {
        let zone: u8 = c[1].parse().ok()?;
        (1..=60).contains(&zone).then_some(Crs::Utm { zone, south: &c[2] == "S" })
    })
}

#[cfg(test)]
mod tests {
    use geo::Area;
    use shapefile::{Point, PolygonRing};

    use super::*;

    #[test]
    fn rings_are_grouped_by_orientation() {
        // Clockwise exterior, counter-clockwise hole, second clockwise exterior.
        let polygon = shapefile::Polygon::with_rings(vec![
            PolygonRing::Outer(vec![Point::new(0.0, 0.0), Point::new(0.0, 10.0), Point::new(10.0, 10.0), Point::new(10.0, 0.0), Point::new(0.0, 0.0)]),
            PolygonRing::Inner(vec![Point::new(4.0, 4.0), Point::new(6.0, 4.0), Point::new(6.0, 6.0), Point::new(4.0, 6.0), Point::new(4.0, 4.0)]),
            PolygonRing::Outer(vec![Point::new(20.0, 0.0), Point::new(20.0, 1.0), Point::new(21.0, 1.0), Point::new(21.0, 0.0), Point::new(20.0, 0.0)]),
        ]);
        let mp = shp_to_geo(&polygon);
        assert_eq!(mp.0.len(), 2);
        assert_eq!(mp.0[0].interiors().len(), 1);
        assert_eq!(mp.unsigned_area(), 97.0);
    }

    #[test]
    fn prj_sidecar_crs() {
        let dir = tempfile::tempdir().unwrap();
        let shp = dir.path().join("buildings.shp");
        assert_eq!(crs_from_prj(&shp), None);

        fs::write(dir.path().join("buildings.prj"),
            r#"PROJCS["WGS_1984_UTM_Zone_40N",GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]]],PROJECTION["Transverse_Mercator"]]"#,
        ).unwrap();
        assert_eq!(crs_from_prj(&shp), Some(Crs::Utm { zone: 40, south: false }));

        fs::write(dir.path().join("buildings.prj"),
            r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137,298.257223563]],PRIMEM["Greenwich",0],UNIT["Degree",0.017453292519943295]]"#,
        ).unwrap();
        assert_eq!(crs_from_prj(&shp), Some(Crs::Wgs84));
    }
}
