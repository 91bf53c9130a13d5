use sheetdesk::upload::{LocalUploader, UploadEvent, UploadedAsset, UploadError};
use sheetdesk::{AppState, AssetFile, CellValue, Config, UploadScheduler, Uploader};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_files(dir: &Path, names: &[&str]) -> Vec<AssetFile> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            fs::write(&path, b"bytes").unwrap();
            AssetFile::from_path(path)
        })
        .collect()
}

fn products() -> Vec<Vec<CellValue>> {
    vec![
        vec!["SKU".into(), "Name".into(), "Photo".into()],
        vec!["p1".into(), "Soap".into(), "".into()],
        vec!["p2".into(), "Gel".into(), "https://cdn.example/gel.png".into()],
        vec!["p3".into(), "Foam".into(), "".into()],
    ]
}

#[tokio::test]
async fn uploads_images_and_skips_other_files() {
    let dir = tempdir().unwrap();
    let mut files = write_files(dir.path(), &["p1.jpg", "p3.PNG", "notes.txt"]);
    files.push(AssetFile::from_path(dir.path().join("missing.gif")));

    let mut state = AppState::default();
    state.load_grid(&products());
    let progress = state.upload_images(LocalUploader::new("/uploads/"), files).await;

    assert_eq!(progress.total, 3);
    assert_eq!(progress.completed, 3);
    assert_eq!(progress.failed, 1);
    assert!(progress.is_done());
    assert_eq!(state.assets().len(), 2);
    assert_eq!(state.assets().get("p1.jpg"), Some("/uploads/p1.jpg"));

    let view = state.view();
    assert_eq!(state.resolve_image(&view[0].row).as_deref(), Some("/uploads/p1.jpg"));
    assert_eq!(
        state.resolve_image(&view[1].row).as_deref(),
        Some("https://cdn.example/gel.png")
    );
    assert_eq!(state.resolve_image(&view[2].row).as_deref(), Some("/uploads/p3.PNG"));
}

#[tokio::test]
async fn later_uploads_overwrite_earlier_keys() {
    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    let mut state = AppState::default();

    let files = write_files(first.path(), &["p1.jpg"]);
    state.upload_images(LocalUploader::new("/a"), files).await;
    let files = write_files(second.path(), &["p1.jpg"]);
    state.upload_images(LocalUploader::new("/b"), files).await;

    assert_eq!(state.assets().len(), 1);
    assert_eq!(state.assets().get("p1.jpg"), Some("/b/p1.jpg"));
}

/// Answers immediately but refuses names starting with "bad".
struct PickyUploader;

impl Uploader for PickyUploader {
    async fn upload_one(&self, file: AssetFile) -> Result<UploadedAsset, UploadError> {
        tokio::task::yield_now().await;
        if file.name.starts_with("bad") {
            return Err(UploadError::Rejected(file.name));
        }
        Ok(UploadedAsset {
            url: format!("mem://{}", file.name),
            key: file.name,
        })
    }
}

#[tokio::test]
async fn config_limits_drive_batching() {
    let config = Config {
        flush_threshold: 3,
        max_concurrent_uploads: 2,
        ..Config::default()
    };
    let state = AppState::new(config);
    let scheduler = state.scheduler(PickyUploader);
    assert_eq!(scheduler.max_concurrent(), 2);

    let files: Vec<AssetFile> = (0..8)
        .map(|i| {
            let name = if i == 4 { "bad.png".to_string() } else { format!("{}.png", i) };
            AssetFile::new(name.clone(), name)
        })
        .collect();

    let mut run = scheduler.enqueue(files);
    let mut batches = Vec::new();
    let mut finished = None;
    while let Some(event) = run.next_event().await {
        match event {
            UploadEvent::Published(batch) => batches.push(batch.len()),
            UploadEvent::Progress(p) => assert!(p.completed <= p.total),
            UploadEvent::Finished(p) => finished = Some(p),
        }
    }

    assert_eq!(batches, vec![3, 3, 1]);
    let finished = finished.unwrap();
    assert_eq!(finished.succeeded(), 7);
    assert_eq!(finished.failed, 1);
    assert_eq!(finished.percent(), 100);
}

#[tokio::test]
async fn empty_upload_finishes_at_once() {
    let scheduler = UploadScheduler::new(PickyUploader);
    let mut run = scheduler.enqueue(Vec::new());
    assert!(matches!(
        run.next_event().await,
        Some(UploadEvent::Finished(p)) if p.total == 0 && p.is_done()
    ));
    assert!(run.next_event().await.is_none());
}
