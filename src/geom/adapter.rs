use anyhow::{anyhow, Context, Result};
use geo::{Area, Centroid, Coord, MapCoords, MultiPolygon, Point};
use proj4rs::{proj::Proj as Proj4, transform::transform};

use crate::{error::PipelineError, types::{Building, PopulationPoint, PopulationSource, Zone}};

use super::{crs::Crs, distance};

/// Fall back to `fallback` when a source does not declare its CRS.
pub fn assume_crs(declared: Option<Crs>, fallback: &Crs) -> Crs {
    declared.unwrap_or_else(|| {
        log::info!("[geom] no CRS declared, assuming {fallback}");
        fallback.clone()
    })
}

/// Reproject a geometry collection from `from` into `to`. An undeclared source CRS is an error.
pub fn reproject<G>(geometries: &[G], from: Option<&Crs>, to: &Crs) -> Result<Vec<G>>
where
    G: MapCoords<f64, f64, Output = G> + Clone,
{
    let from = from.ok_or_else(|| anyhow!(PipelineError::Crs("source geometry has no CRS".to_string())))?;
    let proj = Reprojector::new(from, to)?;
    geometries.iter()
        .enumerate()
        .map(|(i, g)| proj.apply(g).with_context(|| format!("[geom::reproject] geometry {i}")))
        .collect()
}

/// Coordinate transform between two CRSs; a no-op when both are equal.
pub struct Reprojector {
    projs: Option<(Proj4, Proj4)>,
    from_geographic: bool,
    to_geographic: bool,
    label: String,
}

impl Reprojector {
    pub fn new(from: &Crs, to: &Crs) -> Result<Self> {
        let label = format!("{from} -> {to}");
        if from == to {
            return Ok(Self { projs: None, from_geographic: false, to_geographic: false, label });
        }

        let build = |crs: &Crs| {
            let proj_string = crs.proj4();
            Proj4::from_proj_string(&proj_string)
                .map_err(|e| anyhow!(PipelineError::Crs(format!("failed to build PROJ.4 {proj_string:?}: {e}"))))
        };

        Ok(Self {
            projs: Some((build(from)?, build(to)?)),
            from_geographic: from.is_geographic(),
            to_geographic: to.is_geographic(),
            label,
        })
    }

    #[inline] pub fn is_identity(&self) -> bool { self.projs.is_none() }

    /// Transform one coordinate (degrees in and out for geographic systems).
    pub fn coord(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        let Some((from, to)) = &self.projs else { return Ok(coord) };

        let mut point = if self.from_geographic {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };
        transform(from, to, &mut point)
            .map_err(|e| anyhow!(PipelineError::Crs(format!("transform {} failed at {coord:?}: {e}", self.label))))?;

        let out = if self.to_geographic {
            Coord { x: point.0.to_degrees(), y: point.1.to_degrees() }
        } else {
            Coord { x: point.0, y: point.1 }
        };
        if !(out.x.is_finite() && out.y.is_finite()) {
            return Err(anyhow!(PipelineError::Crs(format!("transform {} is undefined at {coord:?}", self.label))));
        }
        Ok(out)
    }

    /// Transform every coordinate of a geometry.
    pub fn apply<G>(&self, geometry: &G) -> Result<G>
    where
        G: MapCoords<f64, f64, Output = G> + Clone,
    {
        if self.is_identity() {
            return Ok(geometry.clone());
        }
        geometry.try_map_coords(|coord| self.coord(coord))
    }
}

/// Area, perimeter and centroid of one geometry; see [`GeometryAdapter::measure`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measures {
    pub area_m2: f64,
    pub perimeter_m: f64,
    pub centroid: Option<Point<f64>>,
}

/// Geometry operations for a run, all carried out in one metric working CRS.
///
/// [`area`](Self::area), [`perimeter`](Self::perimeter) and [`centroid`](Self::centroid)
/// take geometry that is already in the working CRS, i.e. the output of one of the
/// `reproject_*` methods. Geometry in any other CRS goes through [`measure`](Self::measure),
/// which reprojects before measuring.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryAdapter {
    working: Crs,
}

impl GeometryAdapter {
    /// Create an adapter. Geographic working systems are refused, so that areas
    /// and distances are never computed in degrees.
    pub fn new(working: Crs) -> Result<Self> {
        if working.is_geographic() {
            return Err(anyhow!(PipelineError::Crs(format!(
                "working CRS {working} is geographic; a projected (metric) CRS is required"
            ))));
        }
        Ok(Self { working })
    }

    /// Adapter working in the UTM zone of a lon/lat centre.
    pub fn auto_utm(lon: f64, lat: f64) -> Result<Self> {
        if !(lon.is_finite() && lat.is_finite()) {
            return Err(anyhow!(PipelineError::Crs(format!("cannot choose a UTM zone for ({lon}, {lat})"))));
        }
        let working = Crs::utm_for(lon, lat);
        log::info!("[geom] working CRS {working} chosen for centre ({lon:.4}, {lat:.4})");
        Self::new(working)
    }

    #[inline] pub fn working_crs(&self) -> &Crs { &self.working }

    /// Transform from a source CRS into the working CRS.
    /// Fails when the source CRS is unknown; see [`assume_crs`].
    pub fn to_working(&self, from: Option<&Crs>) -> Result<Reprojector> {
        let from = from.ok_or_else(|| anyhow!(PipelineError::Crs("source geometry has no CRS".to_string())))?;
        Reprojector::new(from, &self.working)
    }

    /// Transform from the working CRS into `to`.
    pub fn from_working(&self, to: &Crs) -> Result<Reprojector> {
        Reprojector::new(&self.working, to)
    }

    /// Planar area in square metres of a working-CRS geometry; 0 for empty geometries.
    #[inline]
    pub fn area(&self, geometry: &MultiPolygon<f64>) -> f64 {
        geometry.unsigned_area()
    }

    /// Total ring length in metres of a working-CRS geometry; 0 for empty geometries.
    #[inline]
    pub fn perimeter(&self, geometry: &MultiPolygon<f64>) -> f64 {
        distance::perimeter(geometry)
    }

    /// Area-weighted centroid in the working CRS; `None` for empty geometries.
    #[inline]
    pub fn centroid(&self, geometry: &MultiPolygon<f64>) -> Option<Point<f64>> {
        geometry.centroid()
    }

    /// Measures of a geometry given in `crs`. It is reprojected into the working
    /// CRS first, and the centroid is expressed back in `crs`.
    pub fn measure(&self, geometry: &MultiPolygon<f64>, crs: &Crs) -> Result<Measures> {
        let working = Reprojector::new(crs, &self.working)?.apply(geometry)?;
        let centroid = match self.centroid(&working) {
            Some(c) => Some(self.from_working(crs)?.apply(&c)?),
            None => None,
        };
        Ok(Measures { area_m2: self.area(&working), perimeter_m: self.perimeter(&working), centroid })
    }

    /// Reproject a population source into the working CRS.
    pub fn reproject_source(&self, source: &PopulationSource, from: Option<&Crs>) -> Result<PopulationSource> {
        let proj = self.to_working(from)?;
        Ok(match source {
            PopulationSource::Zones(zones) => PopulationSource::Zones(
                zones.iter()
                    .map(|zone| {
                        let geometry = proj.apply(zone.geometry())
                            .with_context(|| format!("[geom::reproject] zone {}", zone.id()))?;
                        Zone::new(zone.id(), zone.population(), geometry)
                    })
                    .collect::<Result<_>>()?,
            ),
            PopulationSource::Points(points) => PopulationSource::Points(
                points.iter()
                    .map(|point| {
                        let location = proj.apply(&point.location())
                            .with_context(|| format!("[geom::reproject] point {}", point.id()))?;
                        PopulationPoint::new(point.id(), point.population(), location)
                    })
                    .collect::<Result<_>>()?,
            ),
        })
    }

    /// Reproject building footprints into the working CRS. Attributes are carried over.
    pub fn reproject_buildings(&self, buildings: &[Building], from: Option<&Crs>) -> Result<Vec<Building>> {
        let proj = self.to_working(from)?;
        buildings.iter()
            .map(|building| {
                let geometry = proj.apply(building.geometry())
                    .with_context(|| format!("[geom::reproject] building {}", building.id()))?;
                Ok(Building::new(building.id(), geometry).with_attributes(building.attributes().clone()))
            })
            .collect()
    }

    /// Reproject any geometry collection (POIs, roads) into the working CRS.
    pub fn reproject_all<G>(&self, geometries: &[G], from: Option<&Crs>) -> Result<Vec<G>>
    where
        G: MapCoords<f64, f64, Output = G> + Clone,
    {
        reproject(geometries, from, &self.working)
    }
}
