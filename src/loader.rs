#![cfg(not(tarpaulin_include))]

use crate::cell::CellValue;
use crate::error::{DeskError, Result};
use crate::grid::Grid;
use calamine::{Data, Reader, open_workbook_auto};
use std::fs;
use std::path::Path;

/// Load a grid from a CSV file
///
/// Each record becomes one grid row. Quoted fields may contain commas,
/// doubled quotes and line breaks. Fields that read back identically as
/// numbers become `CellValue::Number`, so "42" is numeric but "007" stays
/// text.
///
/// # Arguments
/// * `filepath` - Path to the CSV file to load
///
/// # Returns
/// * `Result<Grid>` - One row per record, rows may differ in length
///
/// # Examples
/// ```no_run
/// use sheetdesk::loader::from_csv;
///
/// match from_csv("catalogue.csv") {
///     Ok(grid) => println!("Loaded {} rows", grid.len()),
///     Err(e) => eprintln!("Error loading CSV: {}", e),
/// }
/// ```
pub fn from_csv(filepath: impl AsRef<Path>) -> Result<Grid> {
    let text = fs::read_to_string(filepath)?;
    parse_csv(&text)
}

/// Parse CSV text into a grid. Ragged records are kept as they are.
pub fn parse_csv(text: &str) -> Result<Grid> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut grid = Grid::new();
    for record in reader.records() {
        let record = record?;
        grid.push(record.iter().map(csv_cell).collect());
    }
    Ok(grid)
}

fn csv_cell(field: &str) -> CellValue {
    if field.is_empty() {
        return CellValue::Empty;
    }
    match field.parse::<f64>() {
        Ok(n) if n.is_finite() && CellValue::Number(n).stringify() == field => CellValue::Number(n),
        _ => CellValue::Text(field.to_string()),
    }
}

/// Load a grid from a JSON array of arrays of strings, numbers and nulls.
pub fn from_json(filepath: impl AsRef<Path>) -> Result<Grid> {
    let text = fs::read_to_string(filepath)?;
    let rows: Vec<Vec<serde_json::Value>> = serde_json::from_str(&text)?;
    Ok(rows
        .iter()
        .map(|row| row.iter().map(CellValue::from_json).collect())
        .collect())
}

/// Load the first sheet of an Excel workbook
///
/// Cells keep their position on the sheet: rows and columns before the
/// first used cell come back empty, so header detection sees the same
/// layout a user does. Formulas contribute their cached values.
///
/// # Arguments
/// * `filepath` - Path to the `.xlsx`, `.xlsm`, `.xls` or `.ods` file
///
/// # Returns
/// * `Result<Grid>` - The first sheet, or an empty grid for an empty sheet
///
/// # Examples
/// ```no_run
/// use sheetdesk::loader::from_excel;
///
/// match from_excel("catalogue.xlsx") {
///     Ok(grid) => println!("Loaded {} rows", grid.len()),
///     Err(e) => eprintln!("Error loading Excel: {}", e),
/// }
/// ```
pub fn from_excel(filepath: impl AsRef<Path>) -> Result<Grid> {
    let path = filepath.as_ref();
    let mut workbook = open_workbook_auto(path)?;

    // Get the first worksheet
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range?,
        None => {
            return Err(DeskError::UnsupportedFile(format!(
                "{} has no sheets",
                path.display()
            )));
        }
    };

    let Some((first_row, first_col)) = range.start() else {
        return Ok(Grid::new());
    };

    let mut grid: Grid = vec![Vec::new(); first_row as usize];
    for row in range.rows() {
        let mut cells = vec![CellValue::Empty; first_col as usize];
        cells.extend(row.iter().map(excel_cell));
        grid.push(cells);
    }
    Ok(grid)
}

fn excel_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        other => CellValue::Text(other.to_string()),
    }
}

/// Detect the file type by extension and load the grid.
pub fn load_grid(filepath: impl AsRef<Path>) -> Result<Grid> {
    let path = filepath.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    match extension.as_deref() {
        Some("csv") => from_csv(path),
        Some("json") => from_json(path),
        Some("xlsx" | "xlsm" | "xls" | "ods") => from_excel(path),
        Some(ext) => Err(DeskError::UnsupportedFile(format!(
            "unsupported file extension: {}",
            ext
        ))),
        None => Err(DeskError::UnsupportedFile(format!(
            "{} has no extension",
            path.display()
        ))),
    }
}
