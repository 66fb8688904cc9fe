use thiserror::Error;

/// Failures that abort a whole load. Per-row problems never surface here;
/// they end up in [`Dataset::rejected`](super::model::Dataset::rejected).
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("source is missing required column(s): {}", .missing.join(", "))]
    MalformedSource { missing: Vec<String> },

    #[error("unsupported file extension: .{0}")]
    UnsupportedFormat(String),

    #[error("reading source: {0}")]
    Io(#[from] std::io::Error),

    #[error("parsing delimited text: {0}")]
    Csv(#[from] csv::Error),

    #[error("parsing JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a top-level JSON array of objects")]
    JsonShape,

    #[error("reading parquet: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("reading arrow batch: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("writing delimited text: {0}")]
    Csv(#[from] csv::Error),

    #[error("writing export: {0}")]
    Io(#[from] std::io::Error),

    #[error("writing parquet: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("building arrow batch: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}
