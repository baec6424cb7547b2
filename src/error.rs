use thiserror::Error;

#[derive(Error, Debug)]
pub enum VodError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unresolved: {0}")]
    Unresolved(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, VodError>;
