use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download error: {0}")]
    Download(#[from] atd_engine::DownloadError),

    #[error("Invalid configuration file {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl AppError {
    /// A user interrupt is a deliberate stop, not a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Download(e) if e.is_cancelled())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
