use anyhow::Result;

use crate::cli::{Cli, TrainArgs};
use crate::commands::load_config;
use crate::io::{assert_not_stdout, csv};
use crate::regression::Trainer;

pub fn run(cli: &Cli, args: &TrainArgs) -> Result<()> {
    assert_not_stdout(&args.model)?;

    let config = load_config(cli)?;
    let table = csv::read_csv(&args.features)?;
    let model = Trainer::new(config.training).fit(&table)?;
    model.save(&args.model, args.force)?;

    match &model.metrics.test {
        Some(test) => println!(
            "Trained {} trees (test R2 {:.3}, MAE {:.3}) -> {}",
            model.forest.n_trees(), test.r2, test.mae, args.model.display(),
        ),
        None => println!("Trained {} trees -> {}", model.forest.n_trees(), args.model.display()),
    }
    for importance in &model.importances {
        println!("  {:<28} {:.4}", importance.feature, importance.importance);
    }
    Ok(())
}
