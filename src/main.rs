#![cfg(not(tarpaulin_include))]

use log::info;
use sheetdesk::assets::is_image_file;
use sheetdesk::commands::{Command, HELP};
use sheetdesk::query::DEFAULT_TOP_VALUES;
use sheetdesk::upload::LocalUploader;
use sheetdesk::{AppState, AssetFile, CellValue, Config, DeskError, HAS_VALUE, ViewRow, loader};
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

const DEFAULT_VIEW_ROWS: usize = 20;
const CELL_WIDTH: usize = 16;

fn truncate(text: &str) -> String {
    if text.chars().count() > CELL_WIDTH {
        let mut short: String = text.chars().take(CELL_WIDTH - 1).collect();
        short.push('~');
        short
    } else {
        text.to_string()
    }
}

fn print_view(state: &AppState, limit: usize) {
    let view = state.view();
    let headers = state.headers();
    println!(
        "       {}",
        headers
            .iter()
            .map(|h| format!("{:<w$}", truncate(h), w = CELL_WIDTH))
            .collect::<Vec<_>>()
            .join(" ")
    );
    for (i, item) in view.iter().take(limit).enumerate() {
        let marker = if state.dataset().row_changed(&item.row) { '*' } else { ' ' };
        let cells: Vec<String> = headers
            .iter()
            .map(|h| format!("{:<w$}", truncate(&item.row.text(h)), w = CELL_WIDTH))
            .collect();
        println!("{:>5}{} {}", i + 1, marker, cells.join(" "));
    }
    println!(
        "({} of {} rows shown, {} filters, undo {})",
        view.len().min(limit),
        view.len(),
        state.filters().len(),
        if state.can_undo() { "available" } else { "empty" }
    );
}

fn view_row(state: &AppState, pos: usize) -> Result<ViewRow, DeskError> {
    let view = state.view();
    let len = view.len();
    view.into_iter()
        .nth(pos - 1)
        .ok_or(DeskError::InvalidIndex { index: pos, len })
}

fn collect_files(paths: &[PathBuf]) -> Result<Vec<AssetFile>, DeskError> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut entries: Vec<PathBuf> = fs::read_dir(path)?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.is_file())
                .collect();
            entries.sort();
            files.extend(entries.into_iter().map(|p| AssetFile::from_path(p)));
        } else {
            files.push(AssetFile::from_path(path.clone()));
        }
    }
    Ok(files)
}

fn load(state: &mut AppState, path: &Path) -> Result<String, DeskError> {
    let grid = loader::load_grid(path)?;
    let parsed = state.load_grid(&grid);
    if parsed.is_empty() {
        return Ok("empty file".to_string());
    }
    Ok(format!("{} rows, {} columns", parsed.rows.len(), parsed.headers.len()))
}

async fn run_command(state: &mut AppState, command: Command) -> Result<String, DeskError> {
    match command {
        Command::Load(path) => load(state, &path),
        Command::View(limit) => {
            print_view(state, limit.unwrap_or(DEFAULT_VIEW_ROWS));
            Ok("ok".to_string())
        }
        Command::Groups => {
            for meta in state.column_metadata() {
                println!("  {:<20} {}", meta.group, meta.header);
            }
            Ok("ok".to_string())
        }
        Command::Search(query) => {
            state.set_search_query(&query);
            Ok(format!("{} rows", state.view().len()))
        }
        Command::Filter { column, values } => {
            state.set_filter(&column, values.into_iter().collect());
            Ok(format!("{} rows", state.view().len()))
        }
        Command::HasValue(column) => {
            state.toggle_filter_value(&column, HAS_VALUE);
            Ok(format!("{} rows", state.view().len()))
        }
        Command::Unfilter(column) => {
            state.set_filter(&column, Default::default());
            Ok(format!("{} rows", state.view().len()))
        }
        Command::ClearFilters => {
            state.clear_filters();
            Ok(format!("{} rows", state.view().len()))
        }
        Command::Sort(sort) => {
            state.set_sort(sort);
            Ok("ok".to_string())
        }
        Command::ChangedOnly(show) => {
            state.set_show_only_changed(show);
            Ok(format!("{} rows", state.view().len()))
        }
        Command::Set { pos, column, value } => {
            let target = view_row(state, pos)?;
            state.update_cell(target.position, &column, CellValue::from(value))?;
            Ok("ok".to_string())
        }
        Command::Fill { column, value } => {
            let updated = state.apply_to_filtered(&column, CellValue::from(value))?;
            Ok(format!("{} rows updated", updated))
        }
        Command::Delete(pos) => {
            let target = view_row(state, pos)?;
            state.delete_row(target.position)?;
            Ok("ok".to_string())
        }
        Command::Undo => {
            let status = if state.undo() { "ok" } else { "nothing to undo" };
            Ok(status.to_string())
        }
        Command::Upload(paths) => {
            let files = collect_files(&paths)?;
            let skipped = files.iter().filter(|f| !is_image_file(&f.path)).count();
            let uploader = LocalUploader::new(state.config().upload_base_url.clone());
            let progress = state.upload_images(uploader, files).await;
            Ok(format!(
                "{}/{} uploaded, {} failed, {} skipped, {} assets",
                progress.succeeded(),
                progress.total,
                progress.failed,
                skipped,
                state.assets().len()
            ))
        }
        Command::Image(pos) => {
            let target = view_row(state, pos)?;
            Ok(state
                .resolve_image(&target.row)
                .unwrap_or_else(|| "no image".to_string()))
        }
        Command::Values(column) => {
            let values = state.unique_values();
            match values.get(&column) {
                Some(values) => {
                    for value in values {
                        println!("  {}", value);
                    }
                    Ok(format!("{} values", values.len()))
                }
                None => Ok("no values".to_string()),
            }
        }
        Command::Counts { column, limit } => {
            let total = state.view().len();
            let counts = state.value_counts(&column, limit.unwrap_or(DEFAULT_TOP_VALUES));
            for (value, count) in &counts {
                let share = *count as f64 * 100.0 / total as f64;
                println!("  {:<w$} {:>6} {:>5.1}%", truncate(value), count, share, w = CELL_WIDTH);
            }
            Ok(format!("{} of {} rows", counts.iter().map(|(_, c)| c).sum::<usize>(), total))
        }
        Command::Help => {
            println!("{}", HELP);
            Ok("ok".to_string())
        }
        Command::Quit => Ok("bye".to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    let config = match args.get(2) {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default("sheetdesk.json")?,
    };
    let mut state = AppState::new(config);

    let mut status = String::from("ok");
    if let Some(path) = args.get(1) {
        status = load(&mut state, Path::new(path)).unwrap_or_else(|e| e.to_string());
    }
    info!("sheetdesk ready");

    let mut start_time = Instant::now();
    loop {
        let elapsed_time = start_time.elapsed().as_secs_f64();
        print!("[{:.1}] ({}) > ", elapsed_time, status);
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        start_time = Instant::now();

        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                status = e.to_string();
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        status = run_command(&mut state, command)
            .await
            .unwrap_or_else(|e| e.to_string());
    }

    Ok(())
}
