//! Spatial matching of population references (zones, points) to building targets.

mod nearest;

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use geo::{BoundingRect, Contains, MultiPolygon, Point, Relate};
use rstar::AABB;
use smallvec::SmallVec;

use crate::{
    config::{MatchConfig, MatchMode},
    error::PipelineError,
    geom::{DistanceToPoint, Geometries},
    types::{ensure_unique_ids, Building, Match, MatchRelation, PopulationSource},
};

pub use nearest::{nearest, NearestMatch};

/// All associations found in one matching run.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchSet {
    mode: MatchMode,
    radius_m: Option<f64>,
    matches: Vec<Match>,
    by_target: BTreeMap<String, SmallVec<[usize; 2]>>, // target id -> indices into `matches`
}

impl MatchSet {
    pub(crate) fn new(mode: MatchMode, radius_m: Option<f64>, matches: Vec<Match>) -> Self {
        let mut by_target: BTreeMap<String, SmallVec<[usize; 2]>> = BTreeMap::new();
        for (i, m) in matches.iter().enumerate() {
            by_target.entry(m.target_id.clone()).or_default().push(i);
        }
        Self { mode, radius_m, matches, by_target }
    }

    #[inline] pub fn mode(&self) -> MatchMode { self.mode }

    /// Radius of the successful proximity pass; `None` in containment mode.
    #[inline] pub fn radius_m(&self) -> Option<f64> { self.radius_m }

    #[inline] pub fn matches(&self) -> &[Match] { &self.matches }
    #[inline] pub fn len(&self) -> usize { self.matches.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.matches.is_empty() }

    /// Number of distinct targets with at least one reference.
    #[inline] pub fn matched_targets(&self) -> usize { self.by_target.len() }

    /// Reference ids matched by a target, in match order.
    pub fn references_of(&self, target_id: &str) -> Vec<&str> {
        self.by_target.get(target_id)
            .map(|idxs| idxs.iter().map(|&i| self.matches[i].reference_id.as_str()).collect())
            .unwrap_or_default()
    }

    /// Targets (by id order) that matched more than one reference.
    pub fn ambiguous(&self) -> impl Iterator<Item = (&str, Vec<&str>)> + '_ {
        self.by_target.iter()
            .filter(|(_, idxs)| idxs.len() > 1)
            .map(|(target, idxs)| (target.as_str(), idxs.iter().map(|&i| self.matches[i].reference_id.as_str()).collect()))
    }

    /// Targets without any reference, in input order.
    pub fn unmatched<'a>(&self, targets: &'a [Building]) -> Vec<&'a str> {
        targets.iter()
            .map(Building::id)
            .filter(|id| !self.by_target.contains_key(*id))
            .collect()
    }
}

/// Associates targets with references by containment or proximity.
#[derive(Debug, Clone)]
pub struct SpatialMatcher {
    config: MatchConfig,
}

impl SpatialMatcher {
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    /// Match every reference against every building. All geometry must be in the working CRS.
    ///
    /// Proximity mode escalates the radius by `escalation_factor` while nothing matches,
    /// up to and including `max_radius_m`. Zero matches in any mode is a [`PipelineError::NoMatchFound`].
    pub fn run(&self, source: &PopulationSource, buildings: &[Building]) -> Result<MatchSet> {
        source.ensure_unique_ids()?;
        ensure_unique_ids("building", buildings.iter().map(Building::id))?;
        let targets = Geometries::new(buildings.iter().map(|b| b.geometry().clone()).collect());
        let mode = self.config.mode;

        let set = match mode {
            MatchMode::Containment => {
                let matches = containment(source, buildings, &targets);
                if matches.is_empty() {
                    return Err(no_match(mode, None));
                }
                MatchSet::new(mode, None, matches)
            }
            MatchMode::Proximity => {
                let anchors = anchors(source);
                let mut radius = self.config.radius_m;
                loop {
                    let matches = proximity(&anchors, buildings, &targets, radius);
                    if !matches.is_empty() {
                        break MatchSet::new(mode, Some(radius), matches);
                    }
                    if radius >= self.config.max_radius_m {
                        return Err(no_match(mode, Some(radius)));
                    }
                    // The last step is clamped so the ceiling itself is always tried.
                    let next = (radius * self.config.escalation_factor).min(self.config.max_radius_m);
                    log::info!("[matcher] no match within {radius} m, escalating to {next} m");
                    radius = next;
                }
            }
            MatchMode::Nearest => {
                let found = nearest(source, buildings, self.config.max_radius_m);
                if found.is_empty() {
                    return Err(no_match(mode, Some(self.config.max_radius_m)));
                }
                let matches = found.into_iter()
                    .map(|n| Match { reference_id: n.reference_id, target_id: n.target_id, relation: MatchRelation::Within { distance_m: n.distance_m } })
                    .collect();
                MatchSet::new(mode, Some(self.config.max_radius_m), matches)
            }
        };

        log::info!(
            "[matcher] {} mode: {} matches, {} of {} buildings matched",
            mode.as_str(), set.len(), set.matched_targets(), buildings.len(),
        );
        Ok(set)
    }
}

fn no_match(mode: MatchMode, last_radius_m: Option<f64>) -> anyhow::Error {
    anyhow!(PipelineError::NoMatchFound { mode: mode.as_str().to_string(), last_radius_m })
}

/// Point each reference is measured from: zone interior point or the population point itself.
pub(crate) fn anchors(source: &PopulationSource) -> Vec<(&str, Point<f64>)> {
    match source {
        PopulationSource::Zones(zones) => zones.iter()
            .filter_map(|zone| Some((zone.id(), zone.anchor()?)))
            .collect(),
        PopulationSource::Points(points) => points.iter()
            .map(|point| (point.id(), point.location()))
            .collect(),
    }
}

fn envelope(geometry: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    let rect = geometry.bounding_rect()?;
    Some(AABB::from_corners(rect.min().into(), rect.max().into()))
}

/// Zones contain whole buildings; buildings contain population points.
fn containment(source: &PopulationSource, buildings: &[Building], targets: &Geometries<MultiPolygon<f64>>) -> Vec<Match> {
    let mut matches = Vec::new();
    let mut push = |reference_id: &str, j: usize| matches.push(Match {
        reference_id: reference_id.to_string(),
        target_id: buildings[j].id().to_string(),
        relation: MatchRelation::Contained,
    });

    match source {
        PopulationSource::Zones(zones) => {
            for zone in zones {
                let Some(env) = envelope(zone.geometry()) else { continue };
                let mut hits: Vec<usize> = targets.query(&env)
                    .filter(|&j| zone.geometry().relate(&targets.shapes()[j]).is_contains())
                    .collect();
                hits.sort_unstable();
                hits.into_iter().for_each(|j| push(zone.id(), j));
            }
        }
        PopulationSource::Points(points) => {
            for point in points {
                let p = point.location();
                let env = AABB::from_corners([p.x(), p.y()], [p.x(), p.y()]);
                let mut hits: Vec<usize> = targets.query(&env)
                    .filter(|&j| targets.shapes()[j].contains(&p))
                    .collect();
                hits.sort_unstable();
                hits.into_iter().for_each(|j| push(point.id(), j));
            }
        }
    }
    matches
}

fn proximity(anchors: &[(&str, Point<f64>)], buildings: &[Building], targets: &Geometries<MultiPolygon<f64>>, radius: f64) -> Vec<Match> {
    anchors.iter()
        .flat_map(|&(reference_id, anchor)| {
            targets.within_disc(anchor, radius).into_iter().map(move |j| Match {
                reference_id: reference_id.to_string(),
                target_id: buildings[j].id().to_string(),
                relation: MatchRelation::Within { distance_m: targets.shapes()[j].distance_to_point(anchor) },
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use geo::{polygon, MultiPolygon, Point};

    use super::*;
    use crate::types::{PopulationPoint, Zone};

    fn square(x0: f64, y0: f64, side: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: x0, y: y0), (x: x0 + side, y: y0), (x: x0 + side, y: y0 + side), (x: x0, y: y0 + side),
        ]])
    }

    fn config(mode: MatchMode) -> MatchConfig {
        MatchConfig { mode, ..Default::default() }
    }

    #[test]
    fn containment_requires_whole_building_inside() {
        let source = PopulationSource::Zones(vec![Zone::new("z", 10.0, square(0.0, 0.0, 100.0)).unwrap()]);
        let buildings = vec![
            Building::new("inside", square(10.0, 10.0, 10.0)),
            Building::new("straddles", square(95.0, 10.0, 10.0)),
            Building::new("outside", square(200.0, 0.0, 10.0)),
        ];
        let set = SpatialMatcher::new(config(MatchMode::Containment)).run(&source, &buildings).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.references_of("inside"), ["z"]);
        assert_eq!(set.unmatched(&buildings), ["straddles", "outside"]);
    }

    #[test]
    fn overlapping_zones_give_multiple_references() {
        let source = PopulationSource::Zones(vec![
            Zone::new("a", 1.0, square(0.0, 0.0, 50.0)).unwrap(),
            Zone::new("b", 1.0, square(0.0, 0.0, 100.0)).unwrap(),
        ]);
        let buildings = vec![Building::new("t", square(10.0, 10.0, 5.0))];
        let set = SpatialMatcher::new(config(MatchMode::Containment)).run(&source, &buildings).unwrap();
        assert_eq!(set.ambiguous().collect::<Vec<_>>(), [("t", vec!["a", "b"])]);
    }

    #[test]
    fn points_inside_buildings() {
        let source = PopulationSource::Points(vec![PopulationPoint::new("p", 3.0, Point::new(15.0, 15.0)).unwrap()]);
        let buildings = vec![Building::new("b", square(10.0, 10.0, 10.0)), Building::new("c", square(30.0, 10.0, 10.0))];
        let set = SpatialMatcher::new(config(MatchMode::Containment)).run(&source, &buildings).unwrap();
        assert_eq!(set.matches()[0].target_id, "b");
        assert_eq!(set.matches()[0].relation, MatchRelation::Contained);
    }

    #[test]
    fn containment_without_matches_fails() {
        let source = PopulationSource::Zones(vec![Zone::new("z", 10.0, square(0.0, 0.0, 10.0)).unwrap()]);
        let buildings = vec![Building::new("far", square(500.0, 500.0, 10.0))];
        let err = SpatialMatcher::new(config(MatchMode::Containment)).run(&source, &buildings).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PipelineError>(),
            Some(&PipelineError::NoMatchFound { mode: "containment".into(), last_radius_m: None }),
        );
    }

    #[test]
    fn proximity_escalates_until_a_match() {
        let source = PopulationSource::Points(vec![PopulationPoint::new("p", 3.0, Point::new(0.0, 0.0)).unwrap()]);
        let buildings = vec![Building::new("b", square(50.0, 0.0, 10.0))];
        let set = SpatialMatcher::new(config(MatchMode::Proximity)).run(&source, &buildings).unwrap();
        assert_eq!(set.radius_m(), Some(100.0));
        assert_eq!(set.matches()[0].relation, MatchRelation::Within { distance_m: 50.0 });
    }

    #[test]
    fn proximity_ladder_terminates() {
        let source = PopulationSource::Points(vec![PopulationPoint::new("p", 3.0, Point::new(0.0, 0.0)).unwrap()]);
        let buildings = vec![Building::new("b", square(5000.0, 0.0, 10.0))];
        let err = SpatialMatcher::new(config(MatchMode::Proximity)).run(&source, &buildings).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PipelineError>(),
            Some(&PipelineError::NoMatchFound { mode: "proximity".into(), last_radius_m: Some(1000.0) }),
        );
    }

    #[test]
    fn ladder_tries_the_ceiling_when_the_factor_overshoots() {
        // 30 m, 300 m, then 3000 m clamped to the 1000 m ceiling.
        let source = PopulationSource::Points(vec![PopulationPoint::new("p", 3.0, Point::new(0.0, 0.0)).unwrap()]);
        let buildings = vec![Building::new("b", square(500.0, 0.0, 10.0))];
        let config = MatchConfig { mode: MatchMode::Proximity, radius_m: 30.0, ..Default::default() };
        let set = SpatialMatcher::new(config).run(&source, &buildings).unwrap();
        assert_eq!(set.radius_m(), Some(1000.0));
        assert_eq!(set.references_of("b"), ["p"]);
    }

    #[test]
    fn duplicate_building_ids_are_rejected() {
        let source = PopulationSource::Zones(vec![Zone::new("z", 100.0, square(0.0, 0.0, 100.0)).unwrap()]);
        let buildings = vec![Building::new("x", square(10.0, 10.0, 10.0)), Building::new("x", square(50.0, 50.0, 10.0))];
        let err = SpatialMatcher::new(config(MatchMode::Containment)).run(&source, &buildings).unwrap_err();
        assert!(matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::InvalidInput(_))));
    }
}
