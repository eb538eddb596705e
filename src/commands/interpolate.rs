use anyhow::Result;

use crate::cli::{Cli, InterpolateArgs};
use crate::commands::load_config;
use crate::io::assert_not_stdout;
use crate::pipeline::Pipeline;

pub fn run(cli: &Cli, args: &InterpolateArgs) -> Result<()> {
    assert_not_stdout(&args.out)?;

    let mut config = load_config(cli)?;
    if let Some(mode) = args.mode { config.matching.mode = mode }
    if let Some(radius) = args.radius {
        config.matching.radius_m = radius;
        config.matching.max_radius_m = config.matching.max_radius_m.max(radius);
    }

    log::info!(
        "[interpolate] population={} buildings={} -> {}",
        args.population.display(), args.buildings.display(), args.out.display(),
    );

    let mut pipeline = Pipeline::new(config)?;
    let source = pipeline.load_population(&args.population)?;
    let buildings = pipeline.load_buildings(&args.buildings)?;
    let interpolation = pipeline.assign_population(&source, &buildings)?;
    pipeline.write_population(&args.out, &buildings, &interpolation, args.force)?;

    let metrics = interpolation.metrics();
    println!(
        "Assigned {:.1} of {:.1} people to {} buildings ({} unmatched) -> {}",
        metrics.total_assigned_population, metrics.total_source_population,
        metrics.matched_targets, metrics.unmatched_targets, args.out.display(),
    );
    Ok(())
}
