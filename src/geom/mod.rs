//! Geometry adapter: CRS handling, reprojection, metric measures and spatial indexing.

mod adapter;
mod bbox;
mod crs;
mod distance;
mod geom;

pub use adapter::{assume_crs, reproject, GeometryAdapter, Measures, Reprojector};
pub use crs::Crs;
pub(crate) use distance::DistanceToPoint;
pub(crate) use geom::Geometries;
