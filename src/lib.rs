#![doc = "Per-building population estimation: spatial matching, areal interpolation, feature extraction and random-forest regression"]
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod features;
pub mod geom;
pub mod interpolate;
pub mod io;
pub mod matcher;
pub mod pipeline;
pub mod regression;
pub mod types;

#[doc(inline)]
pub use config::{AmbiguityPolicy, MatchMode, MissingFeaturePolicy, PipelineConfig, PointAssignment};

#[doc(inline)]
pub use error::PipelineError;

#[doc(inline)]
pub use geom::{Crs, GeometryAdapter};

#[doc(inline)]
pub use pipeline::{Pipeline, PipelineInputs, PipelineOutputs};

#[doc(inline)]
pub use types::{Building, BuildingAttributes, FeatureTable, FeatureVector, PopulationPoint, PopulationSource, Zone};
