use thiserror::Error;

/// Errors surfaced by the data engine and its host helpers.
#[derive(Error, Debug)]
pub enum DeskError {
    #[error("row index {index} is out of bounds for {len} rows")]
    InvalidIndex { index: usize, len: usize },

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("unsupported file: {0}")]
    UnsupportedFile(String),

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    Excel(#[from] calamine::Error),
}

pub type Result<T> = std::result::Result<T, DeskError>;
