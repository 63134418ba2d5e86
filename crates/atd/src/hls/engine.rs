// Segmented download engine.
//
// Fetches every segment of one item with a bounded pool, appends them to a
// partial file in manifest order as each head-of-line fetch lands, promotes
// the partial file once complete, then optionally hands it to a
// post-processor.

use bytes::Bytes;
use futures::{StreamExt, stream};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::DownloadError;
use crate::hls::fetcher::{SegmentDownloader, SegmentJob};
use crate::hls::retry::{RetryPolicy, retry_with_backoff};
use crate::hls::writer::OrderedSegmentWriter;
use crate::model::{DownloadOutcome, DownloadTarget, ProgressCallback, ProgressEvent, SegmentList};
use crate::transcode::PostProcessor;
use crate::utils::fs::{is_file, promote, remove_if_exists};

pub struct SegmentedDownloadEngine {
    downloader: Arc<dyn SegmentDownloader>,
    post_processor: Option<Arc<dyn PostProcessor>>,
    retry: RetryPolicy,
    token: CancellationToken,
    progress: Option<ProgressCallback>,
}

impl SegmentedDownloadEngine {
    pub fn new(
        downloader: Arc<dyn SegmentDownloader>,
        retry: RetryPolicy,
        token: CancellationToken,
    ) -> Self {
        Self {
            downloader,
            post_processor: None,
            retry,
            token,
            progress: None,
        }
    }

    pub fn with_post_processor(mut self, post_processor: Arc<dyn PostProcessor>) -> Self {
        self.post_processor = Some(post_processor);
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Download `segments` into `target` using up to `concurrency` parallel fetches.
    ///
    /// Returns `Skipped` without touching the network when the final artifact
    /// already exists.
    pub async fn fetch_and_assemble(
        &self,
        segments: SegmentList,
        target: &DownloadTarget,
        concurrency: usize,
    ) -> Result<DownloadOutcome, DownloadError> {
        self.fetch_and_assemble_with(target, concurrency, || async move { Ok(segments) })
            .await
    }

    /// Like [`fetch_and_assemble`](Self::fetch_and_assemble), but the segment
    /// list is produced lazily. `load_segments` runs only when the fetch phase
    /// is actually needed, so skipped and transcode-only items cost no
    /// manifest request.
    #[instrument(skip_all, fields(target = %target.name(), concurrency = concurrency))]
    pub async fn fetch_and_assemble_with<F, Fut>(
        &self,
        target: &DownloadTarget,
        concurrency: usize,
        load_segments: F,
    ) -> Result<DownloadOutcome, DownloadError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<SegmentList, DownloadError>> + Send,
    {
        if concurrency == 0 {
            return Err(DownloadError::Configuration {
                reason: "segment concurrency must be at least 1".to_string(),
            });
        }
        if target.wants_transcode() && self.post_processor.is_none() {
            return Err(DownloadError::Configuration {
                reason: "transcoding requested but no post-processor is configured".to_string(),
            });
        }

        // A transcoded artifact counts as done whichever format was asked for.
        for done in [target.transcoded_path(), target.final_path()] {
            if is_file(done).await {
                info!(path = %done.display(), "Already present, skipping");
                return Ok(DownloadOutcome::Skipped {
                    path: done.to_path_buf(),
                });
            }
        }

        if target.wants_transcode() && is_file(target.raw_path()).await {
            info!(path = %target.raw_path().display(), "Raw file present, transcoding only");
        } else {
            let segments = load_segments().await?;
            if segments.is_empty() {
                return Err(DownloadError::EmptyManifest {
                    manifest: target.name(),
                });
            }
            self.fetch_phase(&segments, target, concurrency).await?;
        }

        if target.wants_transcode() {
            self.transcode_phase(target).await?;
        }

        self.emit(ProgressEvent::Finished {
            name: target.name(),
        });
        info!(path = %target.final_path().display(), "Download complete");
        Ok(DownloadOutcome::Completed {
            path: target.final_path().to_path_buf(),
        })
    }

    async fn fetch_phase(
        &self,
        segments: &SegmentList,
        target: &DownloadTarget,
        concurrency: usize,
    ) -> Result<(), DownloadError> {
        let partial = target.partial_raw_path();
        let name = target.name();
        self.emit(ProgressEvent::Started {
            name: name.clone(),
            total_segments: segments.len(),
        });
        info!(segments = segments.len(), concurrency, "Fetching segments");

        match self.write_segments(segments, &partial, &name, concurrency).await {
            Ok(bytes) => {
                promote(&partial, target.raw_path()).await?;
                debug!(bytes, path = %target.raw_path().display(), "Raw stream assembled");
                Ok(())
            }
            Err(e) => {
                if let Err(cleanup) = remove_if_exists(&partial).await {
                    warn!(error = %cleanup, "Failed to remove partial file");
                }
                Err(e)
            }
        }
    }

    async fn write_segments(
        &self,
        segments: &SegmentList,
        partial: &Path,
        name: &str,
        concurrency: usize,
    ) -> Result<u64, DownloadError> {
        let mut writer = OrderedSegmentWriter::create(partial).await?;

        let jobs = segments.iter().enumerate().map(|(index, url)| SegmentJob {
            index,
            url: url.to_string(),
        });
        // Results are yielded in job order and a finished fetch keeps its slot
        // until everything before it is written, so at most `concurrency`
        // segments are ever held in memory. A pool of one is plain sequential.
        let mut fetches = stream::iter(jobs)
            .map(|job| self.fetch_segment(job))
            .buffered(concurrency);

        loop {
            let next = tokio::select! {
                biased;
                _ = self.token.cancelled() => return Err(DownloadError::Cancelled),
                next = fetches.next() => next,
            };
            let Some(result) = next else { break };
            let (index, data) = result?;
            let bytes = writer.append(index, data).await?;
            self.emit(ProgressEvent::SegmentWritten {
                name: name.to_string(),
                index,
                bytes,
            });
        }

        writer.finish(segments.len()).await
    }

    async fn fetch_segment(&self, job: SegmentJob) -> Result<(usize, Bytes), DownloadError> {
        let downloader = self.downloader.as_ref();
        let job_ref = &job;
        let data = retry_with_backoff(&self.retry, &self.token, move |_| {
            downloader.download_segment(job_ref)
        })
        .await
        .inspect_err(|e| {
            if !e.is_cancelled() {
                warn!(index = job.index, url = %job.url, error = %e, "Segment failed");
            }
        })?;
        Ok((job.index, data))
    }

    async fn transcode_phase(&self, target: &DownloadTarget) -> Result<(), DownloadError> {
        let Some(post_processor) = self.post_processor.as_ref() else {
            return Err(DownloadError::Configuration {
                reason: "transcoding requested but no post-processor is configured".to_string(),
            });
        };

        self.emit(ProgressEvent::Transcoding {
            name: target.name(),
        });
        let partial = target.partial_final_path();

        if let Err(e) = post_processor
            .transcode(target.raw_path(), &partial, &self.token)
            .await
        {
            if let Err(cleanup) = remove_if_exists(&partial).await {
                warn!(error = %cleanup, "Failed to remove partial transcode output");
            }
            warn!(raw = %target.raw_path().display(), error = %e, "Transcode failed, raw file kept");
            return Err(e);
        }

        promote(&partial, target.final_path()).await?;
        if let Err(e) = remove_if_exists(target.raw_path()).await {
            warn!(error = %e, "Transcoded, but failed to remove the raw file");
        }
        Ok(())
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(progress) = &self.progress {
            progress(event);
        }
    }
}
