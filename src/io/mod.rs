//! IO module for format-specific reading and writing operations.
//!
//! - `csv` - tabular data through polars (sources, feature tables, outputs)
//! - `geojson` - feature collections through the `geojson` crate
//! - `shp` - ESRI Shapefile building layers
//! - `wkt` - minimal WKT reader for geometry columns in CSV sources
//! - `xlsx` - spreadsheet population tables through `calamine`
//! - `write` - write-then-rename outputs

pub(crate) mod csv;
pub(crate) mod geojson;
pub(crate) mod shp;
pub(crate) mod wkt;
pub(crate) mod xlsx;
mod source;
mod write;

pub use source::{read_buildings, read_pois, read_population, read_roads, Loaded};
pub use write::{assert_not_stdout, write_atomic, PendingWrite};
