use ahash::AHashSet;
use anyhow::{bail, Result};

use crate::error::PipelineError;

mod building;
mod feature;
mod matching;
mod source;

pub use building::{Building, BuildingAttributes};
pub use feature::{FeatureTable, FeatureVector, ID_COLUMN, TARGET_COLUMN};
pub use matching::{Match, MatchRelation};
pub use source::{PopulationPoint, PopulationSource, Zone};

/// Ids join matches to buildings and references, so each must occur once.
pub(crate) fn ensure_unique_ids<'a>(what: &str, ids: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let mut seen = AHashSet::new();
    for id in ids {
        if !seen.insert(id) {
            bail!(PipelineError::InvalidInput(format!("duplicate {what} id {id:?}")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_ids_are_invalid() {
        assert!(ensure_unique_ids("building", ["a", "b", "c"]).is_ok());
        let err = ensure_unique_ids("building", ["a", "b", "a"]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PipelineError>(),
            Some(&PipelineError::InvalidInput("duplicate building id \"a\"".into())),
        );
    }
}
