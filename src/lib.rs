/*!
# Sheetdesk

An in-memory engine for editing catalogue-style spreadsheets whose header
layout is not known in advance.

## Overview

A spreadsheet reader hands the engine a raw grid of cells from the first
sheet. The engine finds the header row on its own, keeps typed records,
lets a user edit and undo, derives a filtered and sorted view on every
change, and matches uploaded images to records by their cell values.

## Architecture

### Parsing
- **GridParser** - Detects the header row from a small keyword vocabulary,
  an optional group row above it, and extracts one record per data row.

### State
- **Dataset** - Live rows, an immutable snapshot taken at load time for
  change detection, and a bounded undo history (50 steps by default).
- **AppState** - Single owner of the dataset, the view inputs and the asset
  map. Every mutation replaces whole arrays, so reads never observe a
  partial edit.

### Query
- **derive_view** - Changed-only filter, free-text or `column:text` search,
  per-column allow lists and a stable blanks-last natural sort.
- **value_counts** - Top values of a column across the current view.

### Assets
- **resolve_image** - Exact key, key-with-extension or literal URL match,
  column by column.
- **UploadScheduler** - At most five uploads in flight, results published
  in batches of ten and once more when the queue drains.

## Modules

- **cell**: `CellValue` and `Row`
- **grid**: header detection and grid parsing
- **history**: bounded undo stack
- **dataset**: rows, snapshot and mutators
- **query**: filters, search, sort and view derivation
- **assets**: asset map and image resolution
- **upload**: concurrent upload scheduling
- **state**: the `AppState` controller
- **loader**: CSV and JSON grid readers
- **commands**: interactive shell grammar
- **config**: engine limits
- **error**: `DeskError`
*/

pub mod assets;
pub mod cell;
pub mod commands;
pub mod config;
pub mod dataset;
pub mod error;
pub mod grid;
pub mod history;
pub mod loader;
pub mod query;
pub mod state;
pub mod upload;

/// Re-export the everyday types to make them easier to use
pub use assets::{AssetMap, resolve_image};
pub use cell::{CellValue, Row};
pub use config::Config;
pub use dataset::{CellChange, Dataset};
pub use error::{DeskError, Result};
pub use grid::{ColumnMetadata, Grid, GridParser, ParsedGrid, parse_grid};
pub use query::{FilterState, HAS_VALUE, SortSpec, ViewQuery, ViewRow, derive_view, value_counts};
pub use state::AppState;
pub use upload::{AssetFile, UploadProgress, UploadScheduler, Uploader};
