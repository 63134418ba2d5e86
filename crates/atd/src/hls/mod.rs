//! Segmented (HLS) stream acquisition.

pub mod engine;
pub mod fetcher;
pub mod playlist;
pub mod retry;
pub mod writer;

pub use engine::SegmentedDownloadEngine;
pub use fetcher::{SegmentDownloader, SegmentFetcher, SegmentJob};
pub use playlist::{ParsedManifest, PlaylistLoader, parse_manifest};
pub use retry::{RetryPolicy, retry_with_backoff};
