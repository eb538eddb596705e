//! CSV tables through polars.

use std::{fs::File, path::Path};

use anyhow::{anyhow, Context, Result};
use polars::{
    frame::DataFrame,
    io::{SerReader, SerWriter},
    prelude::{Column, CsvReader, CsvWriter, DataType},
};

use crate::error::PipelineError;

use super::write::PendingWrite;

/// Reads a CSV file from `path` into a Polars DataFrame.
pub(crate) fn read_csv(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)
        .with_context(|| format!("[io::csv::read] Failed to open CSV file: {}", path.display()))?;
    CsvReader::new(file)
        .finish()
        .with_context(|| format!("[io::csv::read] Failed to read CSV from {:?}", path))
}

/// Write a DataFrame to a CSV file, atomically.
pub(crate) fn write_csv(df: &mut DataFrame, path: &Path, force: bool) -> Result<()> {
    let mut sink = PendingWrite::open(path, force)?;
    CsvWriter::new(&mut sink)
        .finish(df)
        .with_context(|| format!("[io::csv::write] Failed to write CSV to {:?}", path))?;
    sink.commit()
}

/// Look up a mapped column, failing with `MissingColumn` naming the file.
pub(crate) fn require_column<'a>(df: &'a DataFrame, name: &str, file: &Path) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| anyhow!(PipelineError::missing_column(file.display().to_string(), name)))
}

/// Column values as strings (numbers are formatted); nulls are errors.
pub(crate) fn string_values(df: &DataFrame, name: &str, file: &Path) -> Result<Vec<String>> {
    let column = require_column(df, name, file)?.cast(&DataType::String)?;
    column.str()?.into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.map(str::to_string).ok_or_else(|| anyhow!(PipelineError::InvalidInput(
                format!("null {name:?} at row {row} of {}", file.display())
            )))
        })
        .collect()
}

/// Column values as `f64`; nulls and unparseable values become `None`.
pub(crate) fn float_values(df: &DataFrame, name: &str, file: &Path) -> Result<Vec<Option<f64>>> {
    let column = require_column(df, name, file)?;
    let column = match column.dtype() {
        DataType::String => column.str()?.into_iter()
            .map(|value| value.and_then(|s| s.trim().parse::<f64>().ok()))
            .collect::<Vec<_>>(),
        _ => column.cast(&DataType::Float64)
            .with_context(|| format!("[io::csv] column {name:?} of {} is not numeric", file.display()))?
            .f64()?.into_iter()
            .collect::<Vec<_>>(),
    };
    Ok(column)
}
