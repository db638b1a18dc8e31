use thiserror::Error;

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("TLE directory not found: {0}")]
    DirectoryNotFound(String),
    #[error("TLE file read error: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Invalid TLE format in {file}: {message}")]
    InvalidTle { file: String, message: String },
    #[error("Propagation error: {0}")]
    Propagation(String),
    #[error("No satellite matching '{0}' found in local TLEs")]
    NotFound(String),
    #[error("Several satellites match '{query}': {candidates}")]
    Ambiguous { query: String, candidates: String },
    #[error("No pass of {satellite} found within the next {hours} hours")]
    NoPass { satellite: String, hours: i64 },
}
