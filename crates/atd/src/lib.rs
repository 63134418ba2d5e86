//! Segmented stream downloader for movies, episodes and whole series.
//!
//! Item pages are resolved to an HLS manifest and a title, segments are
//! fetched with a bounded pool and written in manifest order, and the result
//! can be remuxed with ffmpeg. Output files on disk are the only state: a
//! finished artifact is never fetched again.

pub mod config;
pub mod episodes;
pub mod error;
pub mod hls;
pub mod model;
pub mod orchestrator;
pub mod source;
pub mod transcode;
pub mod utils;

pub use config::{DownloaderConfig, create_client};
pub use episodes::EpisodeSelector;
pub use error::{DownloadError, ErrorKind};
pub use hls::{RetryPolicy, SegmentDownloader, SegmentedDownloadEngine};
pub use model::{
    DownloadOutcome, DownloadTarget, ItemReport, OutputFormat, ProgressCallback, ProgressEvent,
    SegmentList, WorkItem,
};
pub use orchestrator::{Downloader, OrchestratorConfig};
pub use source::{ManifestSource, ResolvedItem, WebSource};
pub use transcode::{FfmpegRemuxer, PostProcessor, RemuxConfig};
pub use tokio_util::sync::CancellationToken;
