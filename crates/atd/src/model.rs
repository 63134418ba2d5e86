//! Core value types shared by the engine, the orchestrator and callers.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::episodes::EpisodeSelector;
use crate::error::{DownloadError, ErrorKind};

/// Ordered segment addresses of one stream. Order is playback order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentList {
    uris: Arc<[String]>,
}

impl SegmentList {
    pub fn new(uris: Vec<String>) -> Self {
        Self { uris: uris.into() }
    }

    pub fn len(&self) -> usize {
        self.uris.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.uris.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &str> {
        self.uris.iter().map(String::as_str)
    }
}

impl FromIterator<String> for SegmentList {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Whether the reassembled stream is kept as-is or converted afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Raw,
    Transcoded,
}

/// Where one item ends up on disk.
///
/// Both siblings share one stem: `<stem>.<raw>` holds the reassembled stream
/// and `<stem>.<transcoded>` the remuxed container. The final path is one of
/// the two, chosen by the format, but both are known so a re-run in either
/// mode recognises an artifact left by the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    raw_path: PathBuf,
    transcoded_path: PathBuf,
    format: OutputFormat,
}

impl DownloadTarget {
    /// Build a target under `dir` for `stem` with the given extensions.
    pub fn in_dir(
        dir: &Path,
        stem: &str,
        format: OutputFormat,
        raw_extension: &str,
        transcoded_extension: &str,
    ) -> Self {
        Self {
            raw_path: dir.join(with_extension(stem.into(), raw_extension)),
            transcoded_path: dir.join(with_extension(stem.into(), transcoded_extension)),
            format,
        }
    }

    pub fn final_path(&self) -> &Path {
        match self.format {
            OutputFormat::Raw => &self.raw_path,
            OutputFormat::Transcoded => &self.transcoded_path,
        }
    }

    pub fn raw_path(&self) -> &Path {
        &self.raw_path
    }

    pub fn transcoded_path(&self) -> &Path {
        &self.transcoded_path
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn wants_transcode(&self) -> bool {
        self.format == OutputFormat::Transcoded
    }

    /// File the fetch phase writes into before it is complete.
    pub fn partial_raw_path(&self) -> PathBuf {
        partial_path(&self.raw_path)
    }

    /// File the transcoder writes into before it is complete.
    pub fn partial_final_path(&self) -> PathBuf {
        partial_path(self.final_path())
    }

    /// Short display name (the file name of the final artifact).
    pub fn name(&self) -> String {
        self.final_path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

fn with_extension(mut stem: OsString, ext: &str) -> OsString {
    stem.push(".");
    stem.push(ext);
    stem
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

/// One requested unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    /// A movie or a single episode page.
    Single { page_url: String },
    /// The episodes of a listing page that the selector picks.
    Series {
        listing_url: String,
        selector: EpisodeSelector,
    },
}

/// Per-item result. Failures are values so one item never aborts its siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Completed { path: PathBuf },
    Skipped { path: PathBuf },
    Failed { kind: ErrorKind, reason: String },
}

impl DownloadOutcome {
    pub fn failed(err: &DownloadError) -> Self {
        Self::Failed {
            kind: err.kind(),
            reason: err.to_string(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Failed {
                kind: ErrorKind::Cancelled,
                ..
            }
        )
    }
}

impl fmt::Display for DownloadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed { path } => write!(f, "completed: {}", path.display()),
            Self::Skipped { path } => write!(f, "skipped, already present: {}", path.display()),
            Self::Failed { kind, reason } => write!(f, "failed ({kind}): {reason}"),
        }
    }
}

/// Outcome of one episode of a series run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    /// 1-based position in the listing.
    pub ordinal: usize,
    pub page_url: String,
    pub outcome: DownloadOutcome,
}

/// Progress notifications emitted while an item is processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started { name: String, total_segments: usize },
    SegmentWritten { name: String, index: usize, bytes: u64 },
    Transcoding { name: String },
    Finished { name: String },
}

pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync + 'static>;
