//! Planar distances and lengths in the working (metric) CRS.

use geo::{Distance, Euclidean, Geometry, Length, Line, LineString, MultiPolygon, Point};

/// Total length of all rings of a multipolygon.
pub(crate) fn perimeter(mp: &MultiPolygon<f64>) -> f64 {
    mp.iter()
        .flat_map(|poly| std::iter::once(poly.exterior()).chain(poly.interiors()))
        .map(|ring| Euclidean.length(ring))
        .sum()
}

/// Euclidean distance from a geometry to a point; 0 inside polygons.
pub(crate) trait DistanceToPoint {
    fn distance_to_point(&self, p: Point<f64>) -> f64;
}

impl DistanceToPoint for Point<f64> {
    fn distance_to_point(&self, p: Point<f64>) -> f64 { Euclidean.distance(self, &p) }
}

impl DistanceToPoint for Line<f64> {
    fn distance_to_point(&self, p: Point<f64>) -> f64 { Euclidean.distance(&p, self) }
}

impl DistanceToPoint for LineString<f64> {
    fn distance_to_point(&self, p: Point<f64>) -> f64 { Euclidean.distance(&p, self) }
}

impl DistanceToPoint for MultiPolygon<f64> {
    fn distance_to_point(&self, p: Point<f64>) -> f64 { Euclidean.distance(&p, self) }
}

impl DistanceToPoint for Geometry<f64> {
    fn distance_to_point(&self, p: Point<f64>) -> f64 { Euclidean.distance(&p, self) }
}
