use clap::{Args, Parser, Subcommand, ValueHint};
use std::path::PathBuf;

use crate::config::MatchMode;

/// Per-building population estimation
#[derive(Parser, Debug)]
#[command(name = "bldpop", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Pipeline configuration (JSON); every field has a default
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Match buildings to a population source and distribute its population
    Interpolate(InterpolateArgs),

    /// Compute the per-building feature table
    Featurize(FeaturizeArgs),

    /// Train a random-forest model on a labelled feature table
    Train(TrainArgs),

    /// Apply a trained model to a feature table
    Predict(PredictArgs),

    /// Full pipeline: interpolate, featurize, train and predict
    Run(RunArgs),
}

#[derive(Args, Debug)]
pub struct InterpolateArgs {
    /// Population zones or points (CSV or GeoJSON)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub population: PathBuf,

    /// Building footprints (GeoJSON or Shapefile)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub buildings: PathBuf,

    /// Output directory
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub out: PathBuf,

    /// Override the configured match mode
    #[arg(long, value_enum)]
    pub mode: Option<MatchMode>,

    /// Override the configured initial search radius (metres)
    #[arg(long)]
    pub radius: Option<f64>,

    /// Overwrite existing outputs
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct FeaturizeArgs {
    /// Building footprints (GeoJSON or Shapefile)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub buildings: PathBuf,

    /// Points of interest (GeoJSON)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub pois: Option<PathBuf>,

    /// Road network (GeoJSON line strings)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub roads: Option<PathBuf>,

    /// Population labels (CSV with building_id, population) to attach as the target
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub labels: Option<PathBuf>,

    /// Output feature table (CSV; "-" is rejected)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub out: PathBuf,

    /// Overwrite if the file exists
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Labelled feature table (CSV)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub features: PathBuf,

    /// Output model file (JSON)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub model: PathBuf,

    /// Overwrite if the file exists
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Feature table (CSV)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub features: PathBuf,

    /// Trained model (JSON)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub model: PathBuf,

    /// Output predictions (CSV)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub out: PathBuf,

    /// Fill features missing from the table with 0 instead of failing
    #[arg(long)]
    pub zero_fill: bool,

    /// Overwrite if the file exists
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Population zones or points (CSV or GeoJSON)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub population: PathBuf,

    /// Building footprints (GeoJSON or Shapefile)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub buildings: PathBuf,

    /// Points of interest (GeoJSON)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub pois: Option<PathBuf>,

    /// Road network (GeoJSON line strings)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub roads: Option<PathBuf>,

    /// Output directory
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub out: PathBuf,

    /// Overwrite existing outputs
    #[arg(long)]
    pub force: bool,
}
