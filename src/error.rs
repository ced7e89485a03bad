use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("input has no usable rows")]
    EmptyInput,
}

pub type Result<T> = std::result::Result<T, ReportError>;
