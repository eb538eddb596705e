use std::path::Path;

use ahash::AHashMap;
use anyhow::Result;

use crate::cli::{Cli, FeaturizeArgs};
use crate::commands::load_config;
use crate::interpolate::MATCHED_COLUMN;
use crate::io::{assert_not_stdout, csv};
use crate::pipeline::Pipeline;
use crate::types::{ID_COLUMN, TARGET_COLUMN};

/// `building_id -> population` from a labels CSV. Rows without a value, or
/// marked unmatched by `interpolate`, are skipped.
fn read_labels(path: &Path) -> Result<AHashMap<String, f64>> {
    let df = csv::read_csv(path)?;
    let ids = csv::string_values(&df, ID_COLUMN, path)?;
    let values = csv::float_values(&df, TARGET_COLUMN, path)?;
    let matched: Vec<bool> = match df.column(MATCHED_COLUMN) {
        Ok(column) => column.bool()?.into_iter().map(|m| m.unwrap_or(false)).collect(),
        Err(_) => vec![true; df.height()],
    };
    Ok(ids.into_iter().zip(values).zip(matched)
        .filter_map(|((id, v), matched)| matched.then_some((id, v?)))
        .collect())
}

pub fn run(cli: &Cli, args: &FeaturizeArgs) -> Result<()> {
    assert_not_stdout(&args.out)?;

    let mut pipeline = Pipeline::new(load_config(cli)?)?;
    let buildings = pipeline.load_buildings(&args.buildings)?;
    let context = pipeline.load_context(args.pois.as_deref(), args.roads.as_deref(), &buildings)?;
    let mut table = pipeline.featurize(&buildings, &context)?;

    if let Some(path) = &args.labels {
        let labels = read_labels(path)?;
        log::info!("[featurize] {} labels from {}", labels.len(), path.display());
        table = table.with_targets(|id| labels.get(id).copied());
    }

    csv::write_csv(&mut table.to_dataframe()?, &args.out, args.force)?;
    println!("Wrote features for {} buildings -> {}", table.len(), args.out.display());
    Ok(())
}
