use anyhow::Result;

use crate::cli::{Cli, PredictArgs};
use crate::commands::load_config;
use crate::config::MissingFeaturePolicy;
use crate::io::{assert_not_stdout, csv};
use crate::regression::{Predictor, TrainedModel};

pub fn run(cli: &Cli, args: &PredictArgs) -> Result<()> {
    assert_not_stdout(&args.out)?;

    let config = load_config(cli)?;
    let policy = if args.zero_fill { MissingFeaturePolicy::ZeroFill } else { config.missing_features };

    let model = TrainedModel::load(&args.model)?;
    let table = csv::read_csv(&args.features)?;
    let mut predictions = Predictor::new(policy).predict_frame(&model, &table)?;
    csv::write_csv(&mut predictions, &args.out, args.force)?;

    println!("Predicted {} buildings -> {}", predictions.height(), args.out.display());
    Ok(())
}
