use crate::cell::Row;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

lazy_static! {
    static ref URL_REGEX: Regex = Regex::new(r"^https?://").unwrap();
}

const IMAGE_EXTENSIONS: [&str; 10] = [
    "png", "jpg", "jpeg", "gif", "webp", "bmp", "svg", "avif", "tif", "tiff",
];

/// Asset key (usually a filename) to URL. Entries are only ever added.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct AssetMap {
    entries: BTreeMap<String, String>,
}

impl AssetMap {
    pub fn new() -> Self {
        AssetMap::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, url: impl Into<String>) {
        self.entries.insert(key.into(), url.into());
    }

    /// Merges a published batch; later keys overwrite earlier ones.
    pub fn extend(&mut self, batch: impl IntoIterator<Item = (String, String)>) {
        self.entries.extend(batch);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// First key, in key order, that is `stem` followed by an extension.
    pub fn find_with_extension(&self, stem: &str) -> Option<&str> {
        let prefix = format!("{}.", stem);
        self.entries
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(_, url)| url.as_str())
            .next()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Find the image for a row
///
/// Cells are scanned in column order and the first cell that matches wins.
/// Per cell, an exact key match beats a key with an extension, which beats
/// the cell itself being an http(s) URL. Blank cells never match.
///
/// # Arguments
/// * `row` - Record to resolve
/// * `assets` - Uploaded asset names and their URLs
///
/// # Returns
/// * `Option<String>` - The image URL, or `None` when no cell matches
///
/// # Examples
/// ```
/// use sheetdesk::{AssetMap, Row, resolve_image};
///
/// let mut assets = AssetMap::new();
/// assets.insert("sku123.jpg", "/uploads/sku123.jpg");
///
/// let mut row = Row::new(0);
/// row.set("SKU", "sku123".into());
/// assert_eq!(resolve_image(&row, &assets).as_deref(), Some("/uploads/sku123.jpg"));
/// ```
pub fn resolve_image(row: &Row, assets: &AssetMap) -> Option<String> {
    for (_, value) in &row.values {
        if value.is_blank() {
            continue;
        }
        let text = value.stringify();

        if let Some(url) = assets.get(&text) {
            return Some(url.to_string());
        }
        if let Some(url) = assets.find_with_extension(&text) {
            return Some(url.to_string());
        }
        if URL_REGEX.is_match(&text) {
            return Some(text);
        }
    }
    None
}

/// Whether `path` names an image file by extension.
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellValue;

    fn row(cells: &[(&str, &str)]) -> Row {
        let mut row = Row::new(0);
        for (column, value) in cells {
            row.set(column, CellValue::from(*value));
        }
        row
    }

    #[test]
    fn exact_key_beats_extension_match() {
        let mut assets = AssetMap::new();
        assets.insert("sku1", "exact");
        assets.insert("sku1.png", "ext");
        assert_eq!(resolve_image(&row(&[("SKU", "sku1")]), &assets).as_deref(), Some("exact"));
    }

    #[test]
    fn extension_match_requires_dot() {
        let mut assets = AssetMap::new();
        assets.insert("sku12.jpg", "other");
        assets.insert("sku1.jpg", "mine");
        assert_eq!(resolve_image(&row(&[("SKU", "sku1")]), &assets).as_deref(), Some("mine"));
        assert_eq!(resolve_image(&row(&[("SKU", "sku")]), &assets), None);
    }

    #[test]
    fn first_matching_column_wins() {
        let mut assets = AssetMap::new();
        assets.insert("b.png", "from-b");
        let r = row(&[("Link", "https://cdn/x.png"), ("SKU", "b")]);
        assert_eq!(resolve_image(&r, &assets).as_deref(), Some("https://cdn/x.png"));
    }

    #[test]
    fn blank_cells_are_skipped() {
        let mut assets = AssetMap::new();
        assets.insert(".hidden", "nope");
        assert_eq!(resolve_image(&row(&[("SKU", "")]), &assets), None);
    }

    #[test]
    fn image_extensions() {
        assert!(is_image_file(Path::new("a/b/Photo.JPG")));
        assert!(!is_image_file(Path::new("notes.txt")));
        assert!(!is_image_file(Path::new("README")));
    }
}
