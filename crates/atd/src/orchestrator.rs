//! Maps movies, episodes and series onto the segmented download engine.

use futures::{StreamExt, stream};
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::config::{DownloaderConfig, create_client};
use crate::episodes::EpisodeSelector;
use crate::error::DownloadError;
use crate::hls::{SegmentFetcher, SegmentedDownloadEngine};
use crate::model::{
    DownloadOutcome, DownloadTarget, ItemReport, OutputFormat, ProgressCallback, WorkItem,
};
use crate::source::{ManifestSource, ResolvedItem, WebSource};
use crate::transcode::{FfmpegRemuxer, RemuxConfig};
use crate::utils::fs::ensure_dir_all_sync;
use crate::utils::{sanitize_filename, stem_from_url};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub output_dir: PathBuf,
    /// Parallel segment fetches within one item.
    pub segment_concurrency: usize,
    /// Remux the raw stream after download.
    pub transcode: bool,
    pub raw_extension: String,
    pub transcoded_extension: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            segment_concurrency: 16,
            transcode: false,
            raw_extension: "ts".to_string(),
            transcoded_extension: "mp4".to_string(),
        }
    }
}

/// Owns the page source and the engine for one run. Both share a single HTTP client.
pub struct Downloader {
    config: OrchestratorConfig,
    source: Arc<dyn ManifestSource>,
    engine: SegmentedDownloadEngine,
}

impl Downloader {
    /// Build the web-backed downloader: one client for pages, manifests and
    /// segments, plus an ffmpeg remuxer for transcoding.
    pub fn new(
        config: OrchestratorConfig,
        http: &DownloaderConfig,
        remux: RemuxConfig,
        token: CancellationToken,
    ) -> Result<Self, DownloadError> {
        let client = create_client(http)?;
        let source = Arc::new(WebSource::new(client.clone()));
        let fetcher = Arc::new(SegmentFetcher::new(client, http.segment_timeout));
        let engine = SegmentedDownloadEngine::new(fetcher, http.retry.clone(), token)
            .with_post_processor(Arc::new(FfmpegRemuxer::new(remux)));
        Self::with_parts(config, source, engine)
    }

    /// Assemble a downloader from explicit parts. Creates the output directory.
    pub fn with_parts(
        config: OrchestratorConfig,
        source: Arc<dyn ManifestSource>,
        engine: SegmentedDownloadEngine,
    ) -> Result<Self, DownloadError> {
        if config.segment_concurrency == 0 {
            return Err(DownloadError::Configuration {
                reason: "segment concurrency must be at least 1".to_string(),
            });
        }
        ensure_dir_all_sync(&config.output_dir)?;
        Ok(Self {
            config,
            source,
            engine,
        })
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.engine = self.engine.with_progress(progress);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    fn token(&self) -> &CancellationToken {
        self.engine.cancellation_token()
    }

    async fn cancellable<T>(
        &self,
        fut: impl Future<Output = Result<T, DownloadError>>,
    ) -> Result<T, DownloadError> {
        tokio::select! {
            biased;
            _ = self.token().cancelled() => Err(DownloadError::Cancelled),
            result = fut => result,
        }
    }

    fn target_for(&self, stem: &str) -> DownloadTarget {
        let format = if self.config.transcode {
            OutputFormat::Transcoded
        } else {
            OutputFormat::Raw
        };
        DownloadTarget::in_dir(
            &self.config.output_dir,
            stem,
            format,
            &self.config.raw_extension,
            &self.config.transcoded_extension,
        )
    }

    /// Download one movie or episode page. Errors propagate to the caller.
    #[instrument(skip(self))]
    pub async fn download_single(&self, page_url: &str) -> Result<DownloadOutcome, DownloadError> {
        let item = self.resolve(page_url).await?;
        let stem = item_stem(page_url, item.title.as_deref());
        self.download_resolved(&item, &stem).await
    }

    async fn resolve(&self, page_url: &str) -> Result<ResolvedItem, DownloadError> {
        if self.token().is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        self.cancellable(self.source.resolve_item(page_url)).await
    }

    async fn download_resolved(
        &self,
        item: &ResolvedItem,
        stem: &str,
    ) -> Result<DownloadOutcome, DownloadError> {
        if self.token().is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        let target = self.target_for(stem);
        info!(target = %target.final_path().display(), "Resolved item");

        let source = self.source.as_ref();
        let manifest_url = item.manifest_url.as_str();
        self.engine
            .fetch_and_assemble_with(&target, self.config.segment_concurrency, move || {
                source.load_segments(manifest_url)
            })
            .await
    }

    /// Download the selected episodes of a listing.
    ///
    /// Returns exactly one report per selected episode. Per-episode errors
    /// become `Failed` outcomes; only an unusable listing page or an invalid
    /// concurrency fails the whole call. Reports are in completion order when
    /// `item_concurrency > 1`, in listing order otherwise.
    #[instrument(skip(self, selector), fields(selector = %selector))]
    pub async fn download_series(
        &self,
        listing_url: &str,
        selector: &EpisodeSelector,
        item_concurrency: usize,
    ) -> Result<Vec<ItemReport>, DownloadError> {
        if item_concurrency == 0 {
            return Err(DownloadError::Configuration {
                reason: "item concurrency must be at least 1".to_string(),
            });
        }

        let episodes = self
            .cancellable(self.source.resolve_listing(listing_url))
            .await?;
        if let Some(max) = selector.max_ordinal() {
            if max > episodes.len() {
                warn!(
                    requested = max,
                    available = episodes.len(),
                    "Selection goes past the end of the listing, extra ordinals ignored"
                );
            }
        }

        let total = episodes.len();
        let selected: Vec<(usize, String)> = episodes
            .into_iter()
            .enumerate()
            .map(|(i, url)| (i + 1, url))
            .filter(|(ordinal, _)| selector.contains(*ordinal))
            .collect();
        info!(total, selected = selected.len(), item_concurrency, "Downloading series");

        // Every selected page is resolved before any download starts, so file
        // names can be made unique across the whole selection.
        let resolved: Vec<(usize, String, Result<ResolvedItem, DownloadError>)> =
            stream::iter(selected)
                .map(|(ordinal, page_url)| async move {
                    let item = self.resolve(&page_url).await;
                    (ordinal, page_url, item)
                })
                .buffered(item_concurrency)
                .collect()
                .await;
        let stems = episode_stems(&resolved);

        let episodes = resolved
            .into_iter()
            .zip(stems)
            .map(|((ordinal, page_url, item), stem)| self.run_episode(ordinal, page_url, item, stem));
        let reports = if item_concurrency == 1 {
            let mut reports = Vec::new();
            for episode in episodes {
                reports.push(episode.await);
            }
            reports
        } else {
            stream::iter(episodes)
                .buffer_unordered(item_concurrency)
                .collect()
                .await
        };
        Ok(reports)
    }

    /// Run a [`WorkItem`]. A single item yields one report with ordinal 1.
    pub async fn run(
        &self,
        item: &WorkItem,
        item_concurrency: usize,
    ) -> Result<Vec<ItemReport>, DownloadError> {
        match item {
            WorkItem::Single { page_url } => {
                let outcome = self.download_single(page_url).await?;
                Ok(vec![ItemReport {
                    ordinal: 1,
                    page_url: page_url.clone(),
                    outcome,
                }])
            }
            WorkItem::Series {
                listing_url,
                selector,
            } => {
                self.download_series(listing_url, selector, item_concurrency)
                    .await
            }
        }
    }

    async fn run_episode(
        &self,
        ordinal: usize,
        page_url: String,
        item: Result<ResolvedItem, DownloadError>,
        stem: String,
    ) -> ItemReport {
        let result = match item {
            Ok(item) => self.download_resolved(&item, &stem).await,
            Err(e) => Err(e),
        };
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => DownloadOutcome::failed(&e),
            Err(e) => {
                error!(ordinal, url = %page_url, kind = %e.kind(), error = %e, "Episode failed");
                DownloadOutcome::failed(&e)
            }
        };
        ItemReport {
            ordinal,
            page_url,
            outcome,
        }
    }
}

/// File stem for an item: the sanitized title, else the page URL's last segment.
fn item_stem(page_url: &str, title: Option<&str>) -> String {
    title
        .filter(|t| !t.trim().is_empty())
        .map(sanitize_filename)
        .unwrap_or_else(|| stem_from_url(page_url))
}

/// Stems for a resolved selection, one per entry.
///
/// A stem shared by several episodes (typically a page titled with the series
/// name) gets the page's own URL stem appended, or the ordinal when that is
/// the same text. The result depends only on the listing, never on which
/// worker finished first.
fn episode_stems(resolved: &[(usize, String, Result<ResolvedItem, DownloadError>)]) -> Vec<String> {
    let stems: Vec<Option<String>> = resolved
        .iter()
        .map(|(_, page_url, item)| {
            item.as_ref()
                .ok()
                .map(|item| item_stem(page_url, item.title.as_deref()))
        })
        .collect();

    let mut uses: HashMap<&str, usize> = HashMap::new();
    for stem in stems.iter().flatten() {
        *uses.entry(stem.as_str()).or_default() += 1;
    }

    stems
        .iter()
        .zip(resolved)
        .map(|(stem, (ordinal, page_url, _))| match stem {
            Some(stem) if uses.get(stem.as_str()).copied().unwrap_or(0) > 1 => {
                let url_stem = stem_from_url(page_url);
                if url_stem == *stem {
                    format!("{stem} ({ordinal})")
                } else {
                    format!("{stem} - {url_stem}")
                }
            }
            Some(stem) => stem.clone(),
            None => String::new(),
        })
        .collect()
}
