use crate::cell::{CellValue, Row};
use crate::error::{DeskError, Result};
use crate::grid::{ColumnMetadata, ParsedGrid};
use crate::history::{DEFAULT_HISTORY_CAPACITY, History};
use crate::query::FilterState;
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub const DEFAULT_UNIQUE_VALUE_CAP: usize = 200;

/// One edit inside a batch. `position` addresses the live row array.
#[derive(Clone, Debug, PartialEq)]
pub struct CellChange {
    pub position: usize,
    pub column: String,
    pub value: CellValue,
}

impl CellChange {
    pub fn new(position: usize, column: &str, value: impl Into<CellValue>) -> Self {
        CellChange {
            position,
            column: column.to_string(),
            value: value.into(),
        }
    }
}

/// Loaded records, their pristine snapshot and the undo history.
///
/// Live rows are shared through `Arc` so a history entry only costs one
/// pointer per row; mutators replace the row they touch and the array as a
/// whole, so readers never see a half-applied edit.
#[derive(Clone, Debug)]
pub struct Dataset {
    headers: Vec<String>,
    column_metadata: Vec<ColumnMetadata>,
    rows: Vec<Arc<Row>>,
    snapshot: Vec<Row>,
    history: History<Vec<Arc<Row>>>,
    has_image_links: bool,
}

impl Default for Dataset {
    fn default() -> Self {
        Dataset::with_history_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

/// A header names an image link column when it mentions "image" together
/// with link/url/src, or is exactly "image".
fn is_image_link_header(header: &str) -> bool {
    let lower = header.to_lowercase();
    lower.contains("image")
        && (lower.contains("link") || lower.contains("url") || lower.contains("src") || lower == "image")
}

impl Dataset {
    pub fn with_history_capacity(capacity: usize) -> Self {
        Dataset {
            headers: Vec::new(),
            column_metadata: Vec::new(),
            rows: Vec::new(),
            snapshot: Vec::new(),
            history: History::with_capacity(capacity),
            has_image_links: false,
        }
    }

    /// Replace everything with a parsed grid
    ///
    /// Rows are tagged `0..n` in load order and copied into a fresh
    /// snapshot that later change detection compares against. History is
    /// discarded.
    ///
    /// # Arguments
    /// * `parsed` - Output of the grid parser
    pub fn load(&mut self, parsed: &ParsedGrid) {
        let snapshot: Vec<Row> = parsed
            .rows
            .iter()
            .enumerate()
            .map(|(row_index, row)| Row {
                row_index,
                values: row.values.clone(),
            })
            .collect();

        self.rows = snapshot.iter().cloned().map(Arc::new).collect();
        self.snapshot = snapshot;
        self.headers = parsed.headers.clone();
        self.column_metadata = parsed.column_metadata.clone();
        self.history.clear();
        self.has_image_links = self.headers.iter().any(|h| is_image_link_header(h));

        info!(
            "loaded {} rows x {} columns (image links: {})",
            self.rows.len(),
            self.headers.len(),
            self.has_image_links
        );
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn column_metadata(&self) -> &[ColumnMetadata] {
        &self.column_metadata
    }

    pub fn rows(&self) -> &[Arc<Row>] {
        &self.rows
    }

    pub fn snapshot(&self) -> &[Row] {
        &self.snapshot
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn has_image_links(&self) -> bool {
        self.has_image_links
    }

    fn check_position(&self, position: usize) -> Result<()> {
        if position < self.rows.len() {
            Ok(())
        } else {
            Err(DeskError::InvalidIndex {
                index: position,
                len: self.rows.len(),
            })
        }
    }

    fn check_column(&self, column: &str) -> Result<()> {
        if self.headers.iter().any(|h| h == column) {
            Ok(())
        } else {
            Err(DeskError::UnknownColumn(column.to_string()))
        }
    }

    /// Set one cell as a single undo step
    ///
    /// # Arguments
    /// * `position` - Index into the live rows, not the load-time tag
    /// * `column` - Header of the cell
    /// * `value` - New value
    ///
    /// # Returns
    /// * `Result<()>` - `InvalidIndex` or `UnknownColumn` without touching
    ///   rows or history
    pub fn update_cell(&mut self, position: usize, column: &str, value: CellValue) -> Result<()> {
        self.check_position(position)?;
        self.check_column(column)?;

        let mut rows = self.rows.clone();
        rows[position] = Arc::new(rows[position].with(column, value));
        self.history.push(std::mem::replace(&mut self.rows, rows));
        Ok(())
    }

    /// Applies every change as a single undo step. Nothing is applied when
    /// any change is invalid.
    pub fn bulk_update(&mut self, changes: &[CellChange]) -> Result<()> {
        for change in changes {
            self.check_position(change.position)?;
            self.check_column(&change.column)?;
        }
        if changes.is_empty() {
            return Ok(());
        }

        let mut rows = self.rows.clone();
        for change in changes {
            let row = &mut rows[change.position];
            *row = Arc::new(row.with(&change.column, change.value.clone()));
        }
        self.history.push(std::mem::replace(&mut self.rows, rows));
        debug!("bulk update of {} cells", changes.len());
        Ok(())
    }

    /// Removes the row at `position`. Later rows shift down by one.
    pub fn delete_row(&mut self, position: usize) -> Result<()> {
        self.check_position(position)?;

        let rows = self
            .rows
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != position)
            .map(|(_, row)| Arc::clone(row))
            .collect();
        self.history.push(std::mem::replace(&mut self.rows, rows));
        Ok(())
    }

    /// Restores the rows from before the last mutation. Returns false when
    /// there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.history.pop() {
            Some(rows) => {
                self.rows = rows;
                true
            }
            None => false,
        }
    }

    /// Whether the live row tagged `row_index` differs from its snapshot.
    pub fn is_changed(&self, row_index: usize) -> bool {
        self.rows
            .iter()
            .find(|row| row.row_index == row_index)
            .is_some_and(|row| self.row_changed(row))
    }

    pub fn row_changed(&self, row: &Row) -> bool {
        match self.snapshot.get(row.row_index) {
            Some(original) => self
                .headers
                .iter()
                .any(|h| row.text(h) != original.text(h)),
            None => false,
        }
    }

    /// Sets `column` on every live row passing the changed-only and column
    /// filters, as one undo step. Returns how many rows were updated.
    pub fn apply_to_filtered(
        &mut self,
        column: &str,
        value: CellValue,
        filters: &FilterState,
        show_only_changed: bool,
    ) -> Result<usize> {
        self.check_column(column)?;

        let mut rows = self.rows.clone();
        let mut updated = 0;
        for row in rows.iter_mut() {
            if show_only_changed && !self.row_changed(row) {
                continue;
            }
            if !filters.matches(row) {
                continue;
            }
            *row = Arc::new(row.with(column, value.clone()));
            updated += 1;
        }
        self.history.push(std::mem::replace(&mut self.rows, rows));
        Ok(updated)
    }

    /// Sorted distinct non-empty values per column, stopping once a column
    /// collects more than `cap` values.
    pub fn unique_values(&self, cap: usize) -> BTreeMap<String, Vec<String>> {
        let mut result = BTreeMap::new();
        for header in &self.headers {
            let mut values = BTreeSet::new();
            for row in &self.rows {
                match row.get(header) {
                    Some(value) if !value.is_missing() => {
                        values.insert(value.stringify());
                        if values.len() > cap {
                            break;
                        }
                    }
                    _ => {}
                }
            }
            if !values.is_empty() {
                result.insert(header.clone(), values.into_iter().collect());
            }
        }
        result
    }
}
