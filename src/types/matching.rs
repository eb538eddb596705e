use serde::{Deserialize, Serialize};

/// How a target was associated with a reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MatchRelation {
    /// Target lies entirely within the reference geometry.
    Contained,
    /// Target lies within `distance_m` of the reference anchor.
    Within { distance_m: f64 },
}

/// One (reference, target) association produced by the spatial matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub reference_id: String,
    pub target_id: String,
    pub relation: MatchRelation,
}
