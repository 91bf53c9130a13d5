use crate::assets::{AssetMap, is_image_file, resolve_image};
use crate::cell::{CellValue, Row};
use crate::config::Config;
use crate::dataset::{CellChange, Dataset};
use crate::error::Result;
use crate::grid::{ColumnMetadata, GridParser, ParsedGrid};
use crate::query::{FilterState, SortSpec, ViewQuery, ViewRow, derive_view, value_counts};
use crate::upload::{AssetFile, UploadProgress, UploadScheduler, Uploader};
use std::collections::{BTreeMap, BTreeSet};

/// Owns the dataset, the view inputs and the asset map, and exposes every
/// operation the presentation layer calls.
pub struct AppState {
    config: Config,
    parser: GridParser,
    dataset: Dataset,
    query: ViewQuery,
    assets: AssetMap,
}

impl Default for AppState {
    fn default() -> Self {
        AppState::new(Config::default())
    }
}

impl AppState {
    pub fn new(config: Config) -> Self {
        AppState {
            parser: GridParser::new(config.header_scan_rows),
            dataset: Dataset::with_history_capacity(config.history_capacity),
            query: ViewQuery::default(),
            assets: AssetMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Parse a raw grid and make it the current dataset
    ///
    /// History, filters, search, sort and the changed-only flag are reset.
    /// Uploaded assets are kept.
    ///
    /// # Arguments
    /// * `grid` - Cells of the first sheet
    ///
    /// # Returns
    /// * `ParsedGrid` - What the parser found, for reporting
    pub fn load_grid(&mut self, grid: &[Vec<CellValue>]) -> ParsedGrid {
        let parsed = self.parser.parse(grid);
        self.load(&parsed);
        parsed
    }

    pub fn load(&mut self, parsed: &ParsedGrid) {
        self.dataset.load(parsed);
        self.query = ViewQuery::default();
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn headers(&self) -> &[String] {
        self.dataset.headers()
    }

    pub fn column_metadata(&self) -> &[ColumnMetadata] {
        self.dataset.column_metadata()
    }

    pub fn query(&self) -> &ViewQuery {
        &self.query
    }

    pub fn assets(&self) -> &AssetMap {
        &self.assets
    }

    pub fn view(&self) -> Vec<ViewRow> {
        derive_view(&self.dataset, &self.query)
    }

    pub fn set_filter(&mut self, column: &str, values: BTreeSet<String>) {
        self.query.filters.set_filter(column, values);
    }

    pub fn toggle_filter_value(&mut self, column: &str, value: &str) {
        self.query.filters.toggle_value(column, value);
    }

    pub fn clear_filters(&mut self) {
        self.query.filters.clear();
    }

    pub fn filters(&self) -> &FilterState {
        &self.query.filters
    }

    pub fn set_search_query(&mut self, query: &str) {
        self.query.search = query.to_string();
    }

    pub fn set_sort(&mut self, sort: Option<SortSpec>) {
        self.query.sort = sort;
    }

    pub fn set_show_only_changed(&mut self, show: bool) {
        self.query.show_only_changed = show;
    }

    pub fn update_cell(&mut self, position: usize, column: &str, value: CellValue) -> Result<()> {
        self.dataset.update_cell(position, column, value)
    }

    pub fn bulk_update(&mut self, changes: &[CellChange]) -> Result<()> {
        self.dataset.bulk_update(changes)
    }

    pub fn delete_row(&mut self, position: usize) -> Result<()> {
        self.dataset.delete_row(position)
    }

    pub fn undo(&mut self) -> bool {
        self.dataset.undo()
    }

    pub fn can_undo(&self) -> bool {
        self.dataset.can_undo()
    }

    /// Sets `column` on every row matching the current changed-only flag and
    /// column filters.
    pub fn apply_to_filtered(&mut self, column: &str, value: CellValue) -> Result<usize> {
        self.dataset.apply_to_filtered(
            column,
            value,
            &self.query.filters,
            self.query.show_only_changed,
        )
    }

    pub fn unique_values(&self) -> BTreeMap<String, Vec<String>> {
        self.dataset.unique_values(self.config.unique_value_cap)
    }

    /// Most frequent values of `column` across the current view.
    pub fn value_counts(&self, column: &str, limit: usize) -> Vec<(String, usize)> {
        value_counts(&self.view(), column, limit)
    }

    pub fn merge_assets(&mut self, batch: impl IntoIterator<Item = (String, String)>) {
        self.assets.extend(batch);
    }

    pub fn resolve_image(&self, row: &Row) -> Option<String> {
        resolve_image(row, &self.assets)
    }

    pub fn scheduler<U: Uploader>(&self, uploader: U) -> UploadScheduler<U> {
        UploadScheduler::new(uploader)
            .with_limits(self.config.max_concurrent_uploads, self.config.flush_threshold)
    }

    /// Upload the image files among `files`
    ///
    /// Files without an image extension are skipped before enqueueing.
    /// Results are merged into the asset map batch by batch.
    ///
    /// # Arguments
    /// * `uploader` - Transfers a single file
    /// * `files` - Candidate files
    ///
    /// # Returns
    /// * `UploadProgress` - Final counters; `total` counts only image files
    pub async fn upload_images<U: Uploader>(
        &mut self,
        uploader: U,
        files: Vec<AssetFile>,
    ) -> UploadProgress {
        let images: Vec<AssetFile> = files
            .into_iter()
            .filter(|f| is_image_file(&f.path))
            .collect();
        let run = self.scheduler(uploader).enqueue(images);
        run.publish_into(&mut self.assets).await
    }
}
