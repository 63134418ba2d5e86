use reqwest::StatusCode;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("download cancelled")]
    Cancelled,

    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("{what} not found on page {url}")]
    Resolution { what: &'static str, url: String },

    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("request failed with HTTP {status} during {operation} for {url}")]
    HttpStatus {
        status: StatusCode,
        url: String,
        operation: &'static str,
    },

    #[error("playlist error: {reason}")]
    Playlist { reason: String },

    #[error("manifest {manifest} lists no segments")]
    EmptyManifest { manifest: String },

    #[error("segment fetch error for {url}: {reason}")]
    Fetch {
        url: String,
        reason: String,
        retryable: bool,
    },

    #[error("transcode failed ({status}): {reason}")]
    Transcode { status: String, reason: String },

    #[error("invalid episode selection: {0}")]
    Validation(String),

    #[error("I/O error while {op} {}: {source}", path.display())]
    IoPath {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    #[error("internal error: {reason}")]
    Internal { reason: String },
}

/// Coarse classification used when reporting per-item outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Resolution,
    Fetch,
    Transcode,
    Validation,
    Cancelled,
    Io,
    Other,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resolution => "resolution",
            Self::Fetch => "fetch",
            Self::Transcode => "transcode",
            Self::Validation => "validation",
            Self::Cancelled => "cancelled",
            Self::Io => "io",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DownloadError {
    pub fn invalid_url(input: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.to_string(),
        }
    }

    pub fn not_found(what: &'static str, url: impl Into<String>) -> Self {
        Self::Resolution {
            what,
            url: url.into(),
        }
    }

    pub fn http_status(
        status: StatusCode,
        url: impl Into<String>,
        operation: &'static str,
    ) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
            operation,
        }
    }

    pub fn playlist(reason: impl Into<String>) -> Self {
        Self::Playlist {
            reason: reason.into(),
        }
    }

    pub fn fetch(url: impl Into<String>, reason: impl Into<String>, retryable: bool) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.into(),
            retryable,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn io_path(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::IoPath {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Cancelled => ErrorKind::Cancelled,
            Self::InvalidUrl { .. } | Self::Resolution { .. } => ErrorKind::Resolution,
            Self::Network { .. }
            | Self::HttpStatus { .. }
            | Self::Playlist { .. }
            | Self::EmptyManifest { .. }
            | Self::Fetch { .. } => ErrorKind::Fetch,
            Self::Transcode { .. } => ErrorKind::Transcode,
            Self::Validation(_) => ErrorKind::Validation,
            Self::IoPath { .. } | Self::Io { .. } => ErrorKind::Io,
            Self::Configuration { .. } | Self::Internal { .. } => ErrorKind::Other,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Cancelled
            | Self::InvalidUrl { .. }
            | Self::Resolution { .. }
            | Self::EmptyManifest { .. }
            | Self::Playlist { .. }
            | Self::Transcode { .. }
            | Self::Validation(_)
            | Self::Configuration { .. }
            | Self::Internal { .. } => false,
            Self::HttpStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::Fetch { retryable, .. } => *retryable,
            Self::Network { source } => is_retryable_reqwest_error(source),
            Self::IoPath { .. } | Self::Io { .. } => true,
        }
    }
}

/// Classify a reqwest error as retryable or non-retryable.
///
/// Retryable: connect, timeout, request, body read, and decode errors.
/// Non-retryable: redirect and builder errors.
pub fn is_retryable_reqwest_error(e: &reqwest::Error) -> bool {
    e.is_connect() || e.is_timeout() || e.is_request() || e.is_body() || e.is_decode()
}
