use geo::{Euclidean, Geometry, Length, Line, MultiPolygon, Point};

use crate::{
    geom::Geometries,
    types::Building,
};

/// Spatial layers the features of a building are measured against, all in the working CRS.
#[derive(Debug, Clone)]
pub struct FeatureContext {
    pois: Geometries<Geometry<f64>>,
    roads: Geometries<Line<f64>>,
    buildings: Geometries<MultiPolygon<f64>>,
}

impl FeatureContext {
    pub fn new(pois: Vec<Geometry<f64>>, roads: Vec<Line<f64>>, buildings: &[Building]) -> Self {
        Self {
            pois: Geometries::new(pois),
            roads: Geometries::new(roads),
            buildings: Geometries::new(buildings.iter().map(|b| b.geometry().clone()).collect()),
        }
    }

    /// Context with buildings only (no POI or road layers).
    pub fn buildings_only(buildings: &[Building]) -> Self {
        Self::new(Vec::new(), Vec::new(), buildings)
    }

    #[inline] pub fn poi_count(&self) -> usize { self.pois.len() }
    #[inline] pub fn road_segment_count(&self) -> usize { self.roads.len() }

    pub(crate) fn pois_within(&self, centre: Point<f64>, radius: f64) -> usize {
        self.pois.within_disc(centre, radius).len()
    }

    /// Total length of the road segments that intersect the disc.
    pub(crate) fn road_length_within(&self, centre: Point<f64>, radius: f64) -> f64 {
        self.roads.within_disc(centre, radius).into_iter()
            .map(|i| Euclidean.length(&self.roads.shapes()[i]))
            .sum()
    }

    pub(crate) fn buildings_within(&self, centre: Point<f64>, radius: f64) -> usize {
        self.buildings.within_disc(centre, radius).len()
    }
}
