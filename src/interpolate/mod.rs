//! Areal interpolation: distributing reference populations onto matched buildings.

mod metrics;

use std::collections::BTreeMap;

use ahash::AHashMap;
use anyhow::{anyhow, Result};
use geo::{Area, BooleanOps};
use polars::{frame::DataFrame, prelude::Column};

use crate::{
    config::{AmbiguityPolicy, MatchConfig, PointAssignment},
    error::PipelineError,
    geom::GeometryAdapter,
    matcher::MatchSet,
    types::{ensure_unique_ids, Building, PopulationSource, Zone, ID_COLUMN, TARGET_COLUMN},
};

pub use metrics::InterpolationMetrics;

/// Column flagging buildings that a reference was matched to.
pub const MATCHED_COLUMN: &str = "matched";

/// Split `population` over `areas` proportionally. A zero total area assigns 0 to every target.
fn area_weighted<'a>(population: f64, areas: &[(&'a str, f64)]) -> Vec<(&'a str, f64)> {
    let total: f64 = areas.iter().map(|&(_, a)| a).sum();
    areas.iter()
        .map(|&(id, area)| (id, if total > 0.0 { population * area / total } else { 0.0 }))
        .collect()
}

/// Area-weighted share of a zone's population for each of its matched targets.
pub fn interpolate(adapter: &GeometryAdapter, zone: &Zone, targets: &[&Building]) -> BTreeMap<String, f64> {
    let areas: Vec<(&str, f64)> = targets.iter().map(|b| (b.id(), adapter.area(b.geometry()))).collect();
    area_weighted(zone.population(), &areas).into_iter()
        .map(|(id, share)| (id.to_string(), share))
        .collect()
}

/// Estimated population of one building.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildingPopulation {
    pub building_id: String,
    pub population: f64,
    pub matched: bool,
}

/// Result of an interpolation run: one entry per building, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpolation {
    populations: Vec<BuildingPopulation>,
    metrics: InterpolationMetrics,
}

impl Interpolation {
    #[inline] pub fn populations(&self) -> &[BuildingPopulation] { &self.populations }
    #[inline] pub fn metrics(&self) -> &InterpolationMetrics { &self.metrics }

    /// Population assigned to matched buildings, by id. Unmatched buildings are absent.
    pub fn labels(&self) -> AHashMap<&str, f64> {
        self.populations.iter()
            .filter(|p| p.matched)
            .map(|p| (p.building_id.as_str(), p.population))
            .collect()
    }

    /// `building_id, population, matched` table.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        Ok(DataFrame::new(vec![
            Column::new(ID_COLUMN.into(), self.populations.iter().map(|p| p.building_id.as_str()).collect::<Vec<_>>()),
            Column::new(TARGET_COLUMN.into(), self.populations.iter().map(|p| p.population).collect::<Vec<_>>()),
            Column::new(MATCHED_COLUMN.into(), self.populations.iter().map(|p| p.matched).collect::<Vec<_>>()),
        ])?)
    }
}

/// Applies areal interpolation to every reference of a match set.
#[derive(Debug, Clone)]
pub struct Interpolator {
    adapter: GeometryAdapter,
    config: MatchConfig,
}

impl Interpolator {
    pub fn new(adapter: GeometryAdapter, config: MatchConfig) -> Self {
        Self { adapter, config }
    }

    pub fn run(&self, source: &PopulationSource, buildings: &[Building], matches: &MatchSet) -> Result<Interpolation> {
        source.ensure_unique_ids()?;
        ensure_unique_ids("building", buildings.iter().map(Building::id))?;
        let index: AHashMap<&str, usize> = buildings.iter().enumerate().map(|(i, b)| (b.id(), i)).collect();

        // Reference id -> matched building indices, in match order.
        let mut by_reference: AHashMap<&str, Vec<usize>> = AHashMap::new();
        for m in matches.matches() {
            let &j = index.get(m.target_id.as_str())
                .ok_or_else(|| anyhow!("[interpolate] match refers to unknown building {}", m.target_id))?;
            by_reference.entry(m.reference_id.as_str()).or_default().push(j);
        }

        let ambiguous: Vec<(&str, Vec<&str>)> = matches.ambiguous().collect();
        let mut assigned = vec![0.0; buildings.len()];
        let mut zero_area_references = 0;
        let mut references_without_targets = 0;

        let (policy, assignment, conserves_population) = match source {
            PopulationSource::Zones(zones) => {
                let policy = self.config.ambiguity;
                match policy {
                    AmbiguityPolicy::Reject => {
                        if let Some((target, refs)) = ambiguous.first() {
                            return Err(anyhow!(PipelineError::AmbiguousMatchPolicyViolation {
                                target_id: target.to_string(),
                                references: refs.iter().map(|r| r.to_string()).collect(),
                            }));
                        }
                    }
                    AmbiguityPolicy::GreatestOverlap => {
                        let zone_index: AHashMap<&str, &Zone> = zones.iter().map(|z| (z.id(), z)).collect();
                        for (target, refs) in &ambiguous {
                            let Some(&j) = index.get(*target) else { continue };
                            let keep = greatest_overlap(&buildings[j], refs, &zone_index);
                            for r in refs.iter().filter(|&&r| r != keep) {
                                if let Some(list) = by_reference.get_mut(r) {
                                    list.retain(|&k| k != j);
                                }
                            }
                            log::debug!("[interpolate] building {target} kept in zone {keep} of {refs:?}");
                        }
                    }
                    AmbiguityPolicy::Average => {}
                }

                let mut counts = vec![0usize; buildings.len()];
                for zone in zones {
                    let targets = by_reference.get(zone.id()).map(Vec::as_slice).unwrap_or_default();
                    if targets.is_empty() {
                        references_without_targets += 1;
                        log::debug!("[interpolate] zone {} matched no building", zone.id());
                        continue;
                    }
                    let areas: Vec<(&str, f64)> = targets.iter()
                        .map(|&j| (buildings[j].id(), self.adapter.area(buildings[j].geometry())))
                        .collect();
                    if areas.iter().all(|&(_, a)| a <= 0.0) {
                        zero_area_references += 1;
                        log::debug!("[interpolate] zone {} has zero building area; assigning 0", zone.id());
                    }
                    for (&j, (_, share)) in targets.iter().zip(area_weighted(zone.population(), &areas)) {
                        assigned[j] += share;
                        counts[j] += 1;
                    }
                }
                if policy == AmbiguityPolicy::Average {
                    for (value, &n) in assigned.iter_mut().zip(&counts) {
                        if n > 1 { *value /= n as f64 }
                    }
                }
                (Some(policy), None, policy != AmbiguityPolicy::Average)
            }
            PopulationSource::Points(points) => {
                let assignment = self.config.point_assignment;
                let mut counts = vec![0usize; buildings.len()];
                for point in points {
                    let targets = by_reference.get(point.id()).map(Vec::as_slice).unwrap_or_default();
                    if targets.is_empty() {
                        references_without_targets += 1;
                        continue;
                    }
                    match assignment {
                        PointAssignment::Mean => {
                            for &j in targets {
                                assigned[j] += point.population();
                                counts[j] += 1;
                            }
                        }
                        PointAssignment::AreaSplit => {
                            let areas: Vec<(&str, f64)> = targets.iter()
                                .map(|&j| (buildings[j].id(), self.adapter.area(buildings[j].geometry())))
                                .collect();
                            if areas.iter().all(|&(_, a)| a <= 0.0) {
                                zero_area_references += 1;
                            }
                            for (&j, (_, share)) in targets.iter().zip(area_weighted(point.population(), &areas)) {
                                assigned[j] += share;
                            }
                        }
                    }
                }
                if assignment == PointAssignment::Mean {
                    for (value, &n) in assigned.iter_mut().zip(&counts) {
                        if n > 1 { *value /= n as f64 }
                    }
                }
                (None, Some(assignment), assignment == PointAssignment::AreaSplit)
            }
        };

        let populations: Vec<BuildingPopulation> = buildings.iter().zip(assigned)
            .map(|(b, population)| BuildingPopulation {
                building_id: b.id().to_string(),
                population,
                matched: !matches.references_of(b.id()).is_empty(),
            })
            .collect();

        let matched_targets = populations.iter().filter(|p| p.matched).count();
        let metrics = InterpolationMetrics {
            source_kind: source.kind().to_string(),
            mode: matches.mode(),
            radius_m: matches.radius_m(),
            policy,
            assignment,
            references: source.len(),
            buildings: buildings.len(),
            total_source_population: source.total_population(),
            total_assigned_population: populations.iter().map(|p| p.population).sum(),
            matched_targets,
            unmatched_targets: buildings.len() - matched_targets,
            ambiguous_targets: ambiguous.len(),
            zero_area_references,
            references_without_targets,
            conserves_population: conserves_population && references_without_targets == 0 && zero_area_references == 0,
        };

        log::info!(
            "[interpolate] assigned {:.1} of {:.1} to {} buildings ({} unmatched, {} ambiguous)",
            metrics.total_assigned_population, metrics.total_source_population,
            metrics.matched_targets, metrics.unmatched_targets, metrics.ambiguous_targets,
        );
        if metrics.unmatched_targets > 0 {
            log::warn!("[interpolate] {} buildings matched no reference and get 0", metrics.unmatched_targets);
        }

        Ok(Interpolation { populations, metrics })
    }
}

/// Zone (of `refs`) with the largest intersection area with the building; ties go to the lowest zone id.
fn greatest_overlap<'a>(building: &Building, refs: &[&'a str], zones: &AHashMap<&str, &Zone>) -> &'a str {
    let mut best: Option<(&'a str, f64)> = None;
    for &r in refs {
        let overlap = zones.get(r)
            .map(|zone| zone.geometry().intersection(building.geometry()).unsigned_area())
            .unwrap_or(0.0);
        best = match best {
            Some((id, area)) => {
                let tie = (area - overlap).abs() <= 1e-9 * area.max(overlap).max(1.0);
                if (tie && id <= r) || (!tie && area > overlap) { Some((id, area)) } else { Some((r, overlap)) }
            }
            None => Some((r, overlap)),
        };
    }
    best.map(|(id, _)| id).unwrap_or_default()
}
