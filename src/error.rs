use thiserror::Error;

/// Typed failures of the population pipeline.
///
/// Library functions return `anyhow::Result`; these errors sit at the root of
/// the chain so callers can `downcast_ref::<PipelineError>()` to branch on them.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    /// Geometry has an undefined or unsupported coordinate reference system.
    #[error("CRS error: {0}")]
    Crs(String),

    /// The spatial matcher produced zero associations, even after radius escalation.
    #[error("no match found in {mode} mode (last radius tried: {last_radius_m:?} m)")]
    NoMatchFound { mode: String, last_radius_m: Option<f64> },

    /// A target matched several references and the policy forbids it.
    #[error("target {target_id} matched {} references {references:?} and the ambiguity policy rejects it", .references.len())]
    AmbiguousMatchPolicyViolation { target_id: String, references: Vec<String> },

    /// Zero usable rows remain after dropping rows with a missing target.
    #[error("training set is empty after dropping rows with missing target")]
    EmptyTrainingSet,

    /// Inference-time features do not cover the training-time features.
    #[error("feature mismatch: missing {missing:?}")]
    FeatureMismatch { missing: Vec<String> },

    /// A required column is absent from a source file.
    #[error("missing column {column:?} in {file}")]
    MissingColumn { file: String, column: String },

    /// Malformed input values (negative population, bad WKT, bad config, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl PipelineError {
    pub(crate) fn missing_column(file: impl Into<String>, column: impl Into<String>) -> Self {
        Self::MissingColumn { file: file.into(), column: column.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::PipelineError;

    #[test]
    fn downcast_through_anyhow() {
        let err: anyhow::Error = PipelineError::EmptyTrainingSet.into();
        let err = err.context("[regression::trainer] fit");
        assert_eq!(err.downcast_ref::<PipelineError>(), Some(&PipelineError::EmptyTrainingSet));
    }

    #[test]
    fn missing_column_names_file_and_column() {
        let msg = PipelineError::missing_column("zones.csv", "INHAB").to_string();
        assert!(msg.contains("zones.csv") && msg.contains("INHAB"));
    }
}
