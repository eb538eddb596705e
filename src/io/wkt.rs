//! WKT geometry columns: POINT, POLYGON and MULTIPOLYGON through the `wkt` crate.

use anyhow::{anyhow, bail, Result};
use geo::{CoordsIter, Geometry, MultiPolygon, Polygon};
use wkt::TryFromWkt;

use crate::error::PipelineError;

/// Parse a WKT point, polygon or multipolygon.
pub(crate) fn parse_wkt(text: &str) -> Result<Geometry<f64>> {
    let geometry = Geometry::<f64>::try_from_wkt_str(text)
        .map_err(|e| anyhow!(PipelineError::InvalidInput(format!("bad WKT {:?}: {e}", abbreviate(text)))))?;

    let polygons: Vec<&Polygon<f64>> = match &geometry {
        Geometry::Point(_) => vec![],
        Geometry::Polygon(polygon) => vec![polygon],
        Geometry::MultiPolygon(mp) => mp.iter().collect(),
        _ => bail!(PipelineError::InvalidInput(format!("unsupported WKT geometry {:?}", abbreviate(text)))),
    };
    // Rings are closed on conversion, so a valid ring has at least 4 coordinates.
    let short_ring = polygons.iter()
        .flat_map(|poly| std::iter::once(poly.exterior()).chain(poly.interiors()))
        .any(|ring| ring.0.len() < 4);
    if short_ring {
        bail!(PipelineError::InvalidInput(format!("ring with fewer than 3 points in WKT {:?}", abbreviate(text))));
    }
    if geometry.coords_iter().any(|c| !(c.x.is_finite() && c.y.is_finite())) {
        bail!(PipelineError::InvalidInput(format!("non-finite coordinate in WKT {:?}", abbreviate(text))));
    }
    Ok(geometry)
}

/// Parse a WKT polygon or multipolygon into a multipolygon.
pub(crate) fn parse_wkt_multipolygon(text: &str) -> Result<MultiPolygon<f64>> {
    match parse_wkt(text)? {
        Geometry::Polygon(polygon) => Ok(MultiPolygon(vec![polygon])),
        Geometry::MultiPolygon(mp) => Ok(mp),
        _ => bail!(PipelineError::InvalidInput(format!("expected POLYGON or MULTIPOLYGON, got {:?}", abbreviate(text)))),
    }
}

fn abbreviate(text: &str) -> String {
    match text.char_indices().nth(48) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use geo::{Area, Point};

    use super::*;

    #[test]
    fn point() {
        assert_eq!(parse_wkt("POINT (56.25 58.01)").unwrap(), Geometry::Point(Point::new(56.25, 58.01)));
        assert_eq!(parse_wkt("POINT Z (1 2 3)").unwrap(), Geometry::Point(Point::new(1.0, 2.0)));
    }

    #[test]
    fn polygon_with_hole() {
        let mp = parse_wkt_multipolygon(
            "POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0), (4 4, 6 4, 6 6, 4 6, 4 4))",
        ).unwrap();
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.0[0].interiors().len(), 1);
        assert_eq!(mp.unsigned_area(), 96.0);
    }

    #[test]
    fn multipolygon() {
        let mp = parse_wkt_multipolygon(
            "MULTIPOLYGON (((0 0, 1 0, 1 1, 0 0)), ((5 5, 7 5, 7 7, 5 7, 5 5)))",
        ).unwrap();
        assert_eq!(mp.0.len(), 2);
        assert_eq!(mp.unsigned_area(), 4.5);
        assert!(parse_wkt_multipolygon("MULTIPOLYGON EMPTY").unwrap().0.is_empty());
    }

    #[test]
    fn malformed_input_is_invalid() {
        for bad in ["", "POLYGON ((0 0, 1 1))", "POLYGON ((0 0, 1 0, 1 1, 0 0)", "LINESTRING (0 0, 1 1)"] {
            let err = parse_wkt(bad).unwrap_err();
            assert!(matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::InvalidInput(_))), "{bad}");
        }
        assert!(parse_wkt_multipolygon("POINT (0 0)").is_err());
    }
}
