use geo::{Centroid, Point};

use crate::{
    geom::{DistanceToPoint, Geometries},
    types::{Building, PopulationSource},
};

use super::anchors;

/// The single closest reference for one target.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestMatch {
    pub target_id: String,
    pub reference_id: String,
    pub distance_m: f64,
}

/// Pair each building with the reference whose anchor is closest to the building centroid,
/// considering only references within `max_distance_m`.
///
/// Exact distance ties go to the lexicographically lowest reference id, and the output is
/// sorted by target id, so repeated calls give identical results.
pub fn nearest(references: &PopulationSource, targets: &[Building], max_distance_m: f64) -> Vec<NearestMatch> {
    let anchors = anchors(references);
    let index = Geometries::new(anchors.iter().map(|&(_, p)| p).collect::<Vec<Point<f64>>>());

    let mut found: Vec<NearestMatch> = targets.iter()
        .filter_map(|target| {
            let centre = target.geometry().centroid()?;
            let (j, distance_m) = index.within_disc(centre, max_distance_m).into_iter()
                .map(|j| (j, index.shapes()[j].distance_to_point(centre)))
                .min_by(|(a, da), (b, db)| da.total_cmp(db).then_with(|| anchors[*a].0.cmp(anchors[*b].0)))?;
            Some(NearestMatch { target_id: target.id().to_string(), reference_id: anchors[j].0.to_string(), distance_m })
        })
        .collect();

    found.sort_by(|a, b| a.target_id.cmp(&b.target_id));
    found
}
