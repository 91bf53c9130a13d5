use crate::cell::{CellValue, Row};
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

lazy_static! {
    static ref LINE_BREAKS: Regex = Regex::new(r"[\r\n]+").unwrap();
}

/// Words that mark a row as the header row.
pub const HEADER_KEYWORDS: [&str; 7] = ["id", "name", "brand", "product", "sku", "ean", "upc"];

/// Group assigned to leading columns when a group row exists.
pub const DEFAULT_GROUP_WITH_GROUP_ROW: &str = "Identification";
/// Group assigned to every column when there is no group row.
pub const DEFAULT_GROUP: &str = "General";

pub const DEFAULT_SCAN_ROWS: usize = 10;

/// Row-major cell grid of the first sheet.
pub type Grid = Vec<Vec<CellValue>>;

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ColumnMetadata {
    pub header: String,
    pub group: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct ParsedGrid {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
    pub column_metadata: Vec<ColumnMetadata>,
}

impl ParsedGrid {
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.rows.is_empty()
    }
}

/// Turns a raw grid with an unknown header layout into typed rows.
#[derive(Clone, Debug)]
pub struct GridParser {
    pub scan_rows: usize,
}

impl Default for GridParser {
    fn default() -> Self {
        GridParser {
            scan_rows: DEFAULT_SCAN_ROWS,
        }
    }
}

fn cell_text(cell: &CellValue) -> String {
    cell.stringify().trim().to_string()
}

/// Absent values become empty text on ingestion.
fn normalize(value: Option<&CellValue>) -> CellValue {
    match value {
        None | Some(CellValue::Empty) => CellValue::Text(String::new()),
        Some(other) => other.clone(),
    }
}

fn has_content(row: &[CellValue]) -> bool {
    row.iter().any(|c| !c.is_blank())
}

impl GridParser {
    pub fn new(scan_rows: usize) -> Self {
        GridParser { scan_rows }
    }

    /// Parse a raw grid into headers, column groups and rows
    ///
    /// The header row is the first of the top `scan_rows` rows holding two
    /// header keywords, or one keyword and more than three filled cells.
    /// Without one, the first row with content is used.
    ///
    /// # Arguments
    /// * `grid` - Cells of the first sheet, row-major, rows may be ragged
    ///
    /// # Returns
    /// * `ParsedGrid` - Empty when no cell has content, never an error
    ///
    /// # Examples
    /// ```
    /// use sheetdesk::{CellValue, GridParser};
    ///
    /// let grid: Vec<Vec<CellValue>> = vec![
    ///     vec!["Spring catalogue".into()],
    ///     vec!["SKU".into(), "Name".into()],
    ///     vec!["a1".into(), "Soap".into()],
    /// ];
    /// let parsed = GridParser::default().parse(&grid);
    /// assert_eq!(parsed.headers, vec!["SKU", "Name"]);
    /// assert_eq!(parsed.column_metadata[0].group, "Spring catalogue");
    /// ```
    pub fn parse(&self, grid: &[Vec<CellValue>]) -> ParsedGrid {
        let Some((header_index, group_index)) = self.detect_header_row(grid) else {
            return ParsedGrid::default();
        };
        debug!(
            "header row {} group row {:?} of {} rows",
            header_index,
            group_index,
            grid.len()
        );

        let header_row = &grid[header_index];
        let group_row = group_index.map(|i| grid[i].as_slice());
        let default_group = if group_row.is_some() {
            DEFAULT_GROUP_WITH_GROUP_ROW
        } else {
            DEFAULT_GROUP
        };

        let mut headers = Vec::new();
        let mut column_metadata = Vec::new();
        // Original column positions of the surviving headers
        let mut kept_columns = Vec::new();
        let mut current_group = String::new();

        for (index, cell) in header_row.iter().enumerate() {
            let header = LINE_BREAKS.replace_all(&cell_text(cell), " ").into_owned();
            if header.is_empty() {
                continue;
            }

            if let Some(groups) = group_row {
                current_group = groups.get(index).map(cell_text).unwrap_or_default();
            }

            let group = if current_group.is_empty() {
                default_group.to_string()
            } else {
                current_group.clone()
            };

            column_metadata.push(ColumnMetadata {
                header: header.clone(),
                group,
            });
            headers.push(header);
            kept_columns.push(index);
        }

        let mut seen = BTreeSet::new();
        for header in &headers {
            if !seen.insert(header.as_str()) {
                warn!("duplicate header {:?}; later column shadows earlier in rows", header);
            }
        }

        let rows = grid[header_index + 1..]
            .iter()
            .enumerate()
            .map(|(row_index, raw)| {
                let mut row = Row::new(row_index);
                for (header, &column) in headers.iter().zip(&kept_columns) {
                    row.set(header, normalize(raw.get(column)));
                }
                row
            })
            .collect();

        ParsedGrid {
            headers,
            rows,
            column_metadata,
        }
    }

    /// Returns the header row index and, when present, the group row index.
    /// `None` when no row has content.
    fn detect_header_row(&self, grid: &[Vec<CellValue>]) -> Option<(usize, Option<usize>)> {
        for (i, row) in grid.iter().take(self.scan_rows).enumerate() {
            if !has_content(row) {
                continue;
            }

            let texts: Vec<String> = row.iter().map(|c| cell_text(c).to_lowercase()).collect();
            let matches = HEADER_KEYWORDS
                .iter()
                .filter(|k| texts.iter().any(|t| t == *k))
                .count();
            let filled = texts.iter().filter(|t| !t.is_empty()).count();

            if matches >= 2 || (matches >= 1 && filled > 3) {
                let group = (i > 0 && has_content(&grid[i - 1])).then(|| i - 1);
                return Some((i, group));
            }
        }

        let first_filled = grid.iter().position(|row| has_content(row))?;
        Some((first_filled, None))
    }
}

pub fn parse_grid(grid: &[Vec<CellValue>]) -> ParsedGrid {
    GridParser::default().parse(grid)
}
