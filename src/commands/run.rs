use anyhow::Result;

use crate::cli::{Cli, RunArgs};
use crate::commands::load_config;
use crate::io::assert_not_stdout;
use crate::pipeline::{Pipeline, PipelineInputs};

pub fn run(cli: &Cli, args: &RunArgs) -> Result<()> {
    assert_not_stdout(&args.out)?;

    let mut pipeline = Pipeline::new(load_config(cli)?)?;
    let inputs = PipelineInputs {
        population: args.population.clone(),
        buildings: args.buildings.clone(),
        pois: args.pois.clone(),
        roads: args.roads.clone(),
    };
    let outputs = pipeline.run(&inputs)?;
    pipeline.write_outputs(&args.out, &outputs, args.force)?;

    let metrics = outputs.interpolation.metrics();
    println!(
        "Assigned {:.1} people to {} of {} buildings; model over {} features -> {}",
        metrics.total_assigned_population, metrics.matched_targets, metrics.buildings,
        outputs.model.feature_names.len(), args.out.display(),
    );
    Ok(())
}
