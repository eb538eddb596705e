use geo::{BoundingRect, Coord, Point, Rect};
use rstar::{RTree, AABB};

use super::bbox::{disc_envelope, BoundingBox};
use super::distance::DistanceToPoint;

/// A collection of geometries with an R-tree over their bounding boxes.
#[derive(Debug, Clone)]
pub(crate) struct Geometries<G> {
    shapes: Vec<G>,
    rtree: RTree<BoundingBox>,
}

impl<G> Geometries<G>
where
    G: BoundingRect<f64>,
    G::Output: Into<Option<Rect<f64>>>,
{
    /// Construct the collection, bulk-loading the R-tree. Empty geometries are not indexed.
    pub(crate) fn new(shapes: Vec<G>) -> Self {
        Self {
            rtree: RTree::bulk_load(
                shapes.iter().enumerate()
                    .filter_map(|(i, shape)| shape.bounding_rect().into().map(|rect| BoundingBox::new(i, rect)))
                    .collect()
            ),
            shapes,
        }
    }

    /// Get the number of geometries.
    #[inline] pub(crate) fn len(&self) -> usize { self.shapes.len() }

    /// Get a reference to the list of geometries.
    #[inline] pub(crate) fn shapes(&self) -> &[G] { &self.shapes }

    /// Indices of geometries whose bounding box intersects the envelope.
    #[inline]
    pub(crate) fn query(&self, envelope: &AABB<[f64; 2]>) -> impl Iterator<Item = usize> + '_ {
        self.rtree.locate_in_envelope_intersecting(envelope).map(BoundingBox::idx)
    }

    /// Compute the bounding rectangle of all geometries.
    pub(crate) fn bounds(&self) -> Option<Rect<f64>> {
        self.shapes.iter()
            .filter_map(|shape| shape.bounding_rect().into())
            .reduce(|a, b| Rect::new(
                Coord { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                Coord { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
            ))
    }
}

impl<G> Geometries<G>
where
    G: BoundingRect<f64> + DistanceToPoint,
    G::Output: Into<Option<Rect<f64>>>,
{
    /// Indices (ascending) of geometries intersecting the disc of `radius` around `center`.
    pub(crate) fn within_disc(&self, center: Point<f64>, radius: f64) -> Vec<usize> {
        let mut hits: Vec<usize> = self.query(&disc_envelope(center.0, radius))
            .filter(|&i| self.shapes[i].distance_to_point(center) <= radius)
            .collect();
        hits.sort_unstable();
        hits
    }
}

#[cfg(test)]
mod tests {
    use geo::{line_string, point, polygon, MultiPolygon, Point};

    use super::Geometries;

    #[test]
    fn bounds_cover_all_shapes() {
        let geoms = Geometries::new(vec![point!(x: 0.0, y: 5.0), point!(x: 3.0, y: -1.0)]);
        let rect = geoms.bounds().unwrap();
        assert_eq!((rect.min().x, rect.min().y, rect.max().x, rect.max().y), (0.0, -1.0, 3.0, 5.0));
    }

    #[test]
    fn within_disc_uses_true_distance() {
        // Corner of the bbox envelope is inside the square query, but outside the disc.
        let geoms = Geometries::new(vec![point!(x: 9.0, y: 9.0), point!(x: 5.0, y: 0.0)]);
        assert_eq!(geoms.within_disc(Point::new(0.0, 0.0), 10.0), vec![1]);
    }

    #[test]
    fn within_disc_for_lines_and_polygons() {
        let roads = Geometries::new(vec![line_string![(x: -50.0, y: 20.0), (x: 50.0, y: 20.0)]]);
        assert_eq!(roads.within_disc(Point::new(0.0, 0.0), 25.0), vec![0]);
        assert!(roads.within_disc(Point::new(0.0, 0.0), 15.0).is_empty());

        let blds = Geometries::new(vec![MultiPolygon(vec![
            polygon![(x: -1.0, y: -1.0), (x: 1.0, y: -1.0), (x: 1.0, y: 1.0), (x: -1.0, y: 1.0)],
        ])]);
        assert_eq!(blds.within_disc(Point::new(0.0, 0.0), 0.0), vec![0]);
    }
}
