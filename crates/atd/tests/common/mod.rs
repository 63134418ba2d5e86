#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use rand::RngExt;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use atd_engine::hls::SegmentJob;
use atd_engine::{
    CancellationToken, DownloadError, ManifestSource, PostProcessor, ResolvedItem,
    SegmentDownloader, SegmentList,
};

/// Body served for the segment at `url`.
pub fn body_for(url: &str) -> Bytes {
    Bytes::from(format!("<{url}>"))
}

/// What a strictly sequential fetch-and-append of `segments` would produce.
pub fn sequential_bytes(segments: &SegmentList) -> Vec<u8> {
    segments.iter().flat_map(|url| body_for(url).to_vec()).collect()
}

pub fn segment_list(prefix: &str, n: usize) -> SegmentList {
    (0..n).map(|i| format!("http://cdn.test/{prefix}/{i}.ts")).collect()
}

/// Segment fetcher with random latency that records call counts and peak parallelism.
#[derive(Default)]
pub struct FakeFetcher {
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
    pub failing: HashSet<String>,
    pub max_delay_ms: u64,
    /// Extra latency for segment 0 only.
    pub head_delay_ms: u64,
    head_done: AtomicBool,
    /// Highest index started while segment 0 was still in flight.
    furthest_ahead: AtomicUsize,
}

impl FakeFetcher {
    pub fn with_delay(max_delay_ms: u64) -> Self {
        Self {
            max_delay_ms,
            ..Self::default()
        }
    }

    pub fn with_slow_head(head_delay_ms: u64) -> Self {
        Self {
            head_delay_ms,
            ..Self::default()
        }
    }

    pub fn failing_on(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn furthest_ahead(&self) -> usize {
        self.furthest_ahead.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SegmentDownloader for FakeFetcher {
    async fn download_segment(&self, job: &SegmentJob) -> Result<Bytes, DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if job.index > 0 && !self.head_done.load(Ordering::SeqCst) {
            self.furthest_ahead.fetch_max(job.index, Ordering::SeqCst);
        }

        let mut delay = if self.max_delay_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=self.max_delay_ms)
        };
        if job.index == 0 {
            delay += self.head_delay_ms;
        }
        tokio::time::sleep(Duration::from_millis(delay)).await;
        if job.index == 0 {
            self.head_done.store(true, Ordering::SeqCst);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&job.url) {
            return Err(DownloadError::fetch(&job.url, "HTTP 404 Not Found", false));
        }
        Ok(body_for(&job.url))
    }
}

/// Post-processor that copies input to output, or fails with a fixed status.
#[derive(Default)]
pub struct FakeRemuxer {
    pub fail: bool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl PostProcessor for FakeRemuxer {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        _token: &CancellationToken,
    ) -> Result<(), DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            tokio::fs::write(output, b"half-written").await?;
            return Err(DownloadError::Transcode {
                status: "exit code 1".to_string(),
                reason: "Invalid data found when processing input".to_string(),
            });
        }
        let mut data = b"MP4:".to_vec();
        data.extend(tokio::fs::read(input).await?);
        tokio::fs::write(output, data).await?;
        Ok(())
    }
}

/// In-memory site: listing of episode pages, each with its own manifest.
pub struct FakeSite {
    pub episodes: Vec<String>,
    /// Page URLs whose resolution fails.
    pub broken_pages: HashSet<String>,
    pub segments_per_item: usize,
    pub titles: HashMap<String, String>,
    pub manifest_loads: AtomicUsize,
}

impl FakeSite {
    pub fn with_episodes(n: usize, segments_per_item: usize) -> Self {
        Self {
            episodes: (1..=n)
                .map(|i| format!("http://site.test/show-ep-{i}.html"))
                .collect(),
            broken_pages: HashSet::new(),
            segments_per_item,
            titles: HashMap::new(),
            manifest_loads: AtomicUsize::new(0),
        }
    }

    pub fn titled(mut self, ordinal: usize, title: &str) -> Self {
        self.titles
            .insert(self.episodes[ordinal - 1].clone(), title.to_string());
        self
    }

    pub fn break_page(mut self, ordinal: usize) -> Self {
        self.broken_pages.insert(self.episodes[ordinal - 1].clone());
        self
    }
}

#[async_trait]
impl ManifestSource for FakeSite {
    async fn resolve_item(&self, page_url: &str) -> Result<ResolvedItem, DownloadError> {
        if self.broken_pages.contains(page_url) {
            return Err(DownloadError::not_found("stream source", page_url));
        }
        Ok(ResolvedItem {
            manifest_url: format!("{page_url}#manifest"),
            title: self.titles.get(page_url).cloned(),
        })
    }

    async fn resolve_listing(&self, _listing_url: &str) -> Result<Vec<String>, DownloadError> {
        Ok(self.episodes.clone())
    }

    async fn load_segments(&self, manifest_url: &str) -> Result<SegmentList, DownloadError> {
        self.manifest_loads.fetch_add(1, Ordering::SeqCst);
        let prefix = manifest_url.replace(['/', ':', '#', '.'], "_");
        Ok(segment_list(&prefix, self.segments_per_item))
    }
}
