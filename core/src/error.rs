use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Attribution API error (batch {batch}): {detail}")]
    AttributionApi { batch: usize, detail: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Report export error: {0}")]
    Export(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
