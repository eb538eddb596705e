//! Spreadsheet tables (xlsx, xls, ods) through calamine, as polars frames.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto, Data, Range, Reader};
use polars::{frame::DataFrame, prelude::Column};

use crate::error::PipelineError;

/// Read the first worksheet; its first row holds the column names.
pub(crate) fn read_sheet(path: &Path) -> Result<DataFrame> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("[io::xlsx] Failed to open spreadsheet: {}", path.display()))?;
    let range = workbook.worksheet_range_at(0)
        .ok_or_else(|| anyhow!(PipelineError::InvalidInput(format!("spreadsheet {} has no worksheet", path.display()))))?
        .with_context(|| format!("[io::xlsx] Failed to read first worksheet of {}", path.display()))?;
    range_to_dataframe(&range)
        .with_context(|| format!("[io::xlsx] converting {}", path.display()))
}

fn number(cell: &Data) -> Option<f64> {
    match cell {
        Data::Int(v) => Some(*v as f64),
        Data::Float(v) => Some(*v),
        _ => None,
    }
}

fn text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) if s.trim().is_empty() => None,
        other => Some(other.to_string()),
    }
}

/// Columns whose cells are all numbers become `Int64` (when integral) or `Float64`;
/// anything else is a string column. Empty cells are nulls.
pub(crate) fn range_to_dataframe(range: &Range<Data>) -> Result<DataFrame> {
    let mut rows = range.rows();
    let header: Vec<String> = rows.next()
        .ok_or_else(|| anyhow!(PipelineError::InvalidInput("spreadsheet is empty".to_string())))?
        .iter()
        .enumerate()
        .map(|(j, cell)| text(cell).unwrap_or_else(|| format!("column_{j}")))
        .collect();
    let body: Vec<&[Data]> = rows.collect();
    let cell = |row: &[Data], j: usize| row.get(j).unwrap_or(&Data::Empty).clone();

    let columns = header.iter().enumerate()
        .map(|(j, name)| {
            let cells: Vec<Data> = body.iter().map(|row| cell(row, j)).collect();
            let present = || cells.iter().filter(|c| !matches!(c, Data::Empty));
            if present().all(|c| number(c).is_some()) {
                let values: Vec<Option<f64>> = cells.iter().map(number).collect();
                if values.iter().flatten().all(|v| v.fract() == 0.0 && v.abs() < 9.0e15) {
                    Column::new(name.as_str().into(), values.iter().map(|v| v.map(|v| v as i64)).collect::<Vec<_>>())
                } else {
                    Column::new(name.as_str().into(), values)
                }
            } else {
                Column::new(name.as_str().into(), cells.iter().map(text).collect::<Vec<_>>())
            }
        })
        .collect();
    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use polars::prelude::DataType;

    use super::*;

    fn sheet(cells: &[&[Data]]) -> Range<Data> {
        let (rows, cols) = (cells.len() as u32, cells[0].len() as u32);
        let mut range = Range::new((0, 0), (rows - 1, cols - 1));
        for (i, row) in cells.iter().enumerate() {
            for (j, cell) in row.iter().enumerate() {
                range.set_value((i as u32, j as u32), cell.clone());
            }
        }
        range
    }

    #[test]
    fn columns_are_typed_from_their_cells() {
        let s = |v: &str| Data::String(v.to_string());
        let range = sheet(&[
            &[s("OKTMO"), s("INHAB"), s("LON"), s("name")],
            &[Data::Float(7.0), Data::Float(120.0), Data::Float(56.25), s("Perm")],
            &[Data::Float(8.0), Data::Empty, Data::Float(56.5), Data::Float(3.0)],
        ]);
        let df = range_to_dataframe(&range).unwrap();

        assert_eq!(df.height(), 2);
        assert_eq!(df.column("OKTMO").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("INHAB").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("INHAB").unwrap().null_count(), 1);
        assert_eq!(df.column("LON").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("name").unwrap().dtype(), &DataType::String);
    }
}
