// Manifest loading: fetch, parse, pick a variant, flatten into a SegmentList.

use m3u8_rs::{MasterPlaylist, MediaPlaylist, Playlist, parse_playlist_res};
use reqwest::Client;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::DownloadError;
use crate::model::SegmentList;

/// Master playlists may point at further master playlists; stop following
/// after this many hops.
const MAX_PLAYLIST_HOPS: usize = 4;

/// Result of parsing one manifest document.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedManifest {
    /// A master playlist; the selected variant's media playlist must be loaded next.
    Variant(Url),
    /// A media playlist with absolute segment URLs, in playback order.
    Segments { segments: SegmentList, ended: bool },
}

/// Parse manifest bytes fetched from `playlist_url`.
pub fn parse_manifest(bytes: &[u8], playlist_url: &Url) -> Result<ParsedManifest, DownloadError> {
    match parse_playlist_res(bytes) {
        Ok(Playlist::MasterPlaylist(master)) => {
            select_variant(&master, playlist_url).map(ParsedManifest::Variant)
        }
        Ok(Playlist::MediaPlaylist(media)) => media_segments(&media, playlist_url),
        Err(e) => Err(DownloadError::playlist(format!(
            "failed to parse manifest {playlist_url}: {e}"
        ))),
    }
}

/// Highest-bandwidth variant that is not an I-frame-only rendition.
fn select_variant(master: &MasterPlaylist, playlist_url: &Url) -> Result<Url, DownloadError> {
    let variant = master
        .variants
        .iter()
        .filter(|v| !v.is_i_frame)
        .max_by_key(|v| v.bandwidth)
        .ok_or_else(|| DownloadError::playlist("master playlist has no playable variants"))?;

    playlist_url.join(&variant.uri).map_err(|e| {
        DownloadError::playlist(format!(
            "could not join {playlist_url} with variant URI {}: {e}",
            variant.uri
        ))
    })
}

fn media_segments(
    media: &MediaPlaylist,
    playlist_url: &Url,
) -> Result<ParsedManifest, DownloadError> {
    let segments = media
        .segments
        .iter()
        .map(|segment| {
            playlist_url
                .join(&segment.uri)
                .map(String::from)
                .map_err(|e| {
                    DownloadError::playlist(format!("bad segment URI {}: {e}", segment.uri))
                })
        })
        .collect::<Result<SegmentList, _>>()?;

    Ok(ParsedManifest::Segments {
        segments,
        ended: media.end_list,
    })
}

/// Loads a manifest over HTTP and returns its segments.
#[derive(Clone)]
pub struct PlaylistLoader {
    client: Client,
}

impl PlaylistLoader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    #[instrument(skip(self))]
    pub async fn load_segments(&self, manifest_url: &str) -> Result<SegmentList, DownloadError> {
        let mut url =
            Url::parse(manifest_url).map_err(|e| DownloadError::invalid_url(manifest_url, e))?;

        for _ in 0..MAX_PLAYLIST_HOPS {
            let bytes = self.fetch(&url).await?;
            match parse_manifest(&bytes, &url)? {
                ParsedManifest::Variant(next) => {
                    debug!(variant = %next, "Selected media playlist from master");
                    url = next;
                }
                ParsedManifest::Segments { segments, ended } => {
                    if segments.is_empty() {
                        return Err(DownloadError::EmptyManifest {
                            manifest: url.to_string(),
                        });
                    }
                    if !ended {
                        warn!(
                            playlist = %url,
                            segments = segments.len(),
                            "Playlist has no ENDLIST tag, downloading the segments listed so far"
                        );
                    }
                    debug!(playlist = %url, segments = segments.len(), "Loaded media playlist");
                    return Ok(segments);
                }
            }
        }

        Err(DownloadError::playlist(format!(
            "gave up after {MAX_PLAYLIST_HOPS} nested master playlists at {url}"
        )))
    }

    async fn fetch(&self, url: &Url) -> Result<bytes::Bytes, DownloadError> {
        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(DownloadError::http_status(
                response.status(),
                url.as_str(),
                "manifest fetch",
            ));
        }
        Ok(response.bytes().await?)
    }
}
