use crate::dataset::DEFAULT_UNIQUE_VALUE_CAP;
use crate::error::Result;
use crate::grid::DEFAULT_SCAN_ROWS;
use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::upload::{DEFAULT_FLUSH_THRESHOLD, DEFAULT_MAX_CONCURRENT_UPLOADS};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Engine limits. Every field is optional in the JSON form and falls back
/// to its default.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    pub history_capacity: usize,
    pub max_concurrent_uploads: usize,
    pub flush_threshold: usize,
    pub header_scan_rows: usize,
    pub unique_value_cap: usize,
    pub upload_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            max_concurrent_uploads: DEFAULT_MAX_CONCURRENT_UPLOADS,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            header_scan_rows: DEFAULT_SCAN_ROWS,
            unique_value_cap: DEFAULT_UNIQUE_VALUE_CAP,
            upload_base_url: "/uploads".to_string(),
        }
    }
}

impl Config {
    /// Load limits from a JSON file
    ///
    /// # Arguments
    /// * `path` - JSON object with any subset of the fields
    ///
    /// # Returns
    /// * `Result<Config>` - Missing fields take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Like `load`, but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("no config at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        Config::load(path)
    }
}
