use anyhow::{Result, ensure};
use geo::{InteriorPoint, MultiPolygon, Point};

use crate::error::PipelineError;

/// A polygon administrative or survey unit carrying an aggregate population count.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    id: String,
    population: f64,
    geometry: MultiPolygon<f64>,
}

impl Zone {
    pub fn new(id: impl Into<String>, population: f64, geometry: MultiPolygon<f64>) -> Result<Self> {
        let id = id.into();
        check_population(&id, population)?;
        Ok(Self { id, population, geometry })
    }

    #[inline] pub fn id(&self) -> &str { &self.id }
    #[inline] pub fn population(&self) -> f64 { self.population }
    #[inline] pub fn geometry(&self) -> &MultiPolygon<f64> { &self.geometry }

    /// A point guaranteed to lie inside the zone, used as its proximity anchor.
    pub fn anchor(&self) -> Option<Point<f64>> { self.geometry.interior_point() }
}

/// An addressed point carrying a population count.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationPoint {
    id: String,
    population: f64,
    location: Point<f64>,
}

impl PopulationPoint {
    pub fn new(id: impl Into<String>, population: f64, location: Point<f64>) -> Result<Self> {
        let id = id.into();
        check_population(&id, population)?;
        ensure!(
            location.x().is_finite() && location.y().is_finite(),
            PipelineError::InvalidInput(format!("population point {id} has non-finite coordinates"))
        );
        Ok(Self { id, population, location })
    }

    #[inline] pub fn id(&self) -> &str { &self.id }
    #[inline] pub fn population(&self) -> f64 { self.population }
    #[inline] pub fn location(&self) -> Point<f64> { self.location }
}

/// Population-bearing references: either area zones or addressed points.
#[derive(Debug, Clone, PartialEq)]
pub enum PopulationSource {
    Zones(Vec<Zone>),
    Points(Vec<PopulationPoint>),
}

impl PopulationSource {
    pub fn len(&self) -> usize {
        match self {
            Self::Zones(zones) => zones.len(),
            Self::Points(points) => points.len(),
        }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Reference ids in input order.
    pub fn ids(&self) -> Vec<&str> {
        match self {
            Self::Zones(zones) => zones.iter().map(Zone::id).collect(),
            Self::Points(points) => points.iter().map(PopulationPoint::id).collect(),
        }
    }

    pub(crate) fn ensure_unique_ids(&self) -> Result<()> {
        super::ensure_unique_ids(self.kind().trim_end_matches('s'), self.ids())
    }

    /// Sum of the population over every reference.
    pub fn total_population(&self) -> f64 {
        match self {
            Self::Zones(zones) => zones.iter().map(Zone::population).sum(),
            Self::Points(points) => points.iter().map(PopulationPoint::population).sum(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Zones(_) => "zones",
            Self::Points(_) => "points",
        }
    }
}

fn check_population(id: &str, population: f64) -> Result<()> {
    ensure!(
        population.is_finite() && population >= 0.0,
        PipelineError::InvalidInput(format!("population of {id} must be a non-negative number, got {population}"))
    );
    Ok(())
}
