//! Page resolution: item page -> manifest + title, listing page -> episode pages.

pub mod parser;
pub mod web;

use async_trait::async_trait;

use crate::error::DownloadError;
use crate::model::SegmentList;

pub use parser::{ListingPageParser, PageParser, VideoPage, VideoPageParser};
pub use web::WebSource;

/// A playable item resolved from its page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedItem {
    pub manifest_url: String,
    /// Display title, used to name the output file.
    pub title: Option<String>,
}

#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Resolve an item page. Fails with a resolution error when the page has no stream.
    async fn resolve_item(&self, page_url: &str) -> Result<ResolvedItem, DownloadError>;

    /// Episode page URLs of a series listing, in listing order. An empty
    /// listing is `Ok(vec![])`; a page without a listing is an error.
    async fn resolve_listing(&self, listing_url: &str) -> Result<Vec<String>, DownloadError>;

    /// Ordered segment URLs of a manifest.
    async fn load_segments(&self, manifest_url: &str) -> Result<SegmentList, DownloadError>;
}
