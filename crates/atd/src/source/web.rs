use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use super::parser::{ListingPageParser, PageParser, VideoPageParser};
use super::{ManifestSource, ResolvedItem};
use crate::error::DownloadError;
use crate::hls::playlist::PlaylistLoader;
use crate::model::SegmentList;

/// [`ManifestSource`] that fetches pages and manifests with the shared client.
#[derive(Clone)]
pub struct WebSource {
    client: Client,
    playlists: PlaylistLoader,
}

impl WebSource {
    pub fn new(client: Client) -> Self {
        Self {
            playlists: PlaylistLoader::new(client.clone()),
            client,
        }
    }

    async fn fetch_page(&self, url: &Url) -> Result<String, DownloadError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(status, url.as_str(), "page fetch"));
        }
        let bytes = response.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn parse_url(input: &str) -> Result<Url, DownloadError> {
    Url::parse(input.trim()).map_err(|e| DownloadError::invalid_url(input, e))
}

#[async_trait]
impl ManifestSource for WebSource {
    #[instrument(skip(self))]
    async fn resolve_item(&self, page_url: &str) -> Result<ResolvedItem, DownloadError> {
        let url = parse_url(page_url)?;
        let html = self.fetch_page(&url).await?;
        let page = VideoPageParser.parse(&url, &html)?;
        debug!(manifest = %page.manifest_url, title = ?page.title, "Resolved item page");
        Ok(ResolvedItem {
            manifest_url: page.manifest_url,
            title: page.title,
        })
    }

    #[instrument(skip(self))]
    async fn resolve_listing(&self, listing_url: &str) -> Result<Vec<String>, DownloadError> {
        let url = parse_url(listing_url)?;
        let html = self.fetch_page(&url).await?;
        let episodes = ListingPageParser.parse(&url, &html)?;
        debug!(episodes = episodes.len(), "Resolved listing page");
        Ok(episodes)
    }

    async fn load_segments(&self, manifest_url: &str) -> Result<SegmentList, DownloadError> {
        self.playlists.load_segments(manifest_url).await
    }
}
