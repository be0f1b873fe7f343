use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV decoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("line has {found} fields, expected {expected}")]
    ColumnCount { expected: usize, found: usize },

    #[error("column '{column}' has non-numeric value '{value}'")]
    Number { column: &'static str, value: String },

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("store error: {message}")]
    Store { message: String },

    #[error("configuration error: {message}")]
    Config { message: String },
}

pub type Result<T> = std::result::Result<T, IngestError>;
