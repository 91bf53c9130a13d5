//! Bounded-concurrency asset uploads.
//!
//! A fixed pool of workers drains a shared FIFO queue. Each finished upload
//! is reported to a coordinator task that keeps the counters, buffers
//! successful results and publishes them in batches. A failed file is only
//! counted; it never stops the rest of the batch.

use crate::assets::AssetMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;

pub const DEFAULT_MAX_CONCURRENT_UPLOADS: usize = 5;
pub const DEFAULT_FLUSH_THRESHOLD: usize = 10;

#[derive(Clone, Debug, PartialEq)]
pub struct AssetFile {
    pub name: String,
    pub path: PathBuf,
}

impl AssetFile {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        AssetFile {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Uses the file name of `path` as the asset name.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        AssetFile { name, path }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct UploadedAsset {
    pub key: String,
    pub url: String,
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("upload rejected: {0}")]
    Rejected(String),
}

/// Transfers one file and reports where it ended up.
pub trait Uploader: Send + Sync + 'static {
    fn upload_one(
        &self,
        file: AssetFile,
    ) -> impl Future<Output = Result<UploadedAsset, UploadError>> + Send;
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
pub struct UploadProgress {
    pub total: usize,
    /// Finished uploads, successful or not.
    pub completed: usize,
    pub failed: usize,
}

impl UploadProgress {
    pub fn succeeded(&self) -> usize {
        self.completed - self.failed
    }

    pub fn percent(&self) -> usize {
        if self.total == 0 {
            return 0;
        }
        (self.completed * 100 + self.total / 2) / self.total
    }

    pub fn is_done(&self) -> bool {
        self.completed == self.total
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum UploadEvent {
    Progress(UploadProgress),
    /// A batch of results ready to merge into the asset map.
    Published(Vec<(String, String)>),
    Finished(UploadProgress),
}

/// Event stream of one `enqueue` call.
pub struct UploadRun {
    events: mpsc::UnboundedReceiver<UploadEvent>,
}

impl UploadRun {
    pub async fn next_event(&mut self) -> Option<UploadEvent> {
        self.events.recv().await
    }

    /// Drains the run, merging every published batch into `assets` as it
    /// arrives. Returns the final counters.
    pub async fn publish_into(mut self, assets: &mut AssetMap) -> UploadProgress {
        let mut progress = UploadProgress::default();
        while let Some(event) = self.events.recv().await {
            match event {
                UploadEvent::Progress(p) => progress = p,
                UploadEvent::Published(batch) => assets.extend(batch),
                UploadEvent::Finished(p) => {
                    progress = p;
                    break;
                }
            }
        }
        progress
    }
}

pub struct UploadScheduler<U: Uploader> {
    uploader: Arc<U>,
    max_concurrent: usize,
    flush_threshold: usize,
}

type Completion = (String, Result<UploadedAsset, UploadError>);

impl<U: Uploader> UploadScheduler<U> {
    pub fn new(uploader: U) -> Self {
        UploadScheduler {
            uploader: Arc::new(uploader),
            max_concurrent: DEFAULT_MAX_CONCURRENT_UPLOADS,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
        }
    }

    pub fn with_limits(mut self, max_concurrent: usize, flush_threshold: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self.flush_threshold = flush_threshold.max(1);
        self
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Start uploading files and return the run's event stream
    ///
    /// Files are taken in order by at most `max_concurrent` workers. Must be
    /// called from within a tokio runtime.
    ///
    /// # Arguments
    /// * `files` - Files to upload, in queue order
    ///
    /// # Returns
    /// * `UploadRun` - Progress after every finished file, published batches
    ///   of `flush_threshold` results, a final batch with the remainder, and
    ///   a closing `Finished` event
    pub fn enqueue(&self, files: Vec<AssetFile>) -> UploadRun {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let total = files.len();
        let queue = Arc::new(Mutex::new(VecDeque::from(files)));
        let (done_tx, done_rx) = mpsc::unbounded_channel::<Completion>();

        let mut workers = JoinSet::new();
        for worker in 0..self.max_concurrent.min(total) {
            let queue = Arc::clone(&queue);
            let uploader = Arc::clone(&self.uploader);
            let done_tx = done_tx.clone();
            workers.spawn(async move {
                loop {
                    let next = queue.lock().await.pop_front();
                    let Some(file) = next else { break };
                    debug!("worker {} uploading {}", worker, file.name);
                    let name = file.name.clone();
                    let result = uploader.upload_one(file).await;
                    if done_tx.send((name, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(done_tx);

        tokio::spawn(coordinate(total, self.flush_threshold, done_rx, workers, events_tx));
        UploadRun { events: events_rx }
    }
}

async fn coordinate(
    total: usize,
    flush_threshold: usize,
    mut done_rx: mpsc::UnboundedReceiver<Completion>,
    mut workers: JoinSet<()>,
    events: mpsc::UnboundedSender<UploadEvent>,
) {
    let mut progress = UploadProgress {
        total,
        ..UploadProgress::default()
    };
    let mut buffer: Vec<(String, String)> = Vec::new();

    // Closes once every worker has run out of queued files
    while let Some((name, result)) = done_rx.recv().await {
        progress.completed += 1;
        match result {
            Ok(asset) => buffer.push((asset.key, asset.url)),
            Err(e) => {
                progress.failed += 1;
                warn!("failed to upload {}: {}", name, e);
            }
        }
        if buffer.len() >= flush_threshold {
            let _ = events.send(UploadEvent::Published(std::mem::take(&mut buffer)));
        }
        let _ = events.send(UploadEvent::Progress(progress));
    }

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            warn!("upload worker stopped: {}", e);
        }
    }

    if !buffer.is_empty() {
        let _ = events.send(UploadEvent::Published(buffer));
    }
    info!(
        "uploaded {} of {} assets ({} failed)",
        progress.succeeded(),
        progress.total,
        progress.failed
    );
    let _ = events.send(UploadEvent::Finished(progress));
}

/// Registers local files under a base URL without moving any bytes.
#[derive(Clone, Debug)]
pub struct LocalUploader {
    base_url: String,
}

impl LocalUploader {
    pub fn new(base_url: impl Into<String>) -> Self {
        LocalUploader {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Uploader for LocalUploader {
    async fn upload_one(&self, file: AssetFile) -> Result<UploadedAsset, UploadError> {
        let metadata = tokio::fs::metadata(&file.path).await?;
        if !metadata.is_file() {
            return Err(UploadError::Rejected(format!("{} is not a file", file.path.display())));
        }
        Ok(UploadedAsset {
            url: format!("{}/{}", self.base_url, file.name),
            key: file.name,
        })
    }
}
