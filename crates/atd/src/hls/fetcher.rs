// Segment fetcher: raw download of one media segment.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::Client;
use std::time::Duration;
use tracing::{instrument, trace};

use crate::error::DownloadError;

/// One unit of fetch work: a segment address and its position in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentJob {
    pub index: usize,
    pub url: String,
}

#[async_trait]
pub trait SegmentDownloader: Send + Sync {
    /// Fetch the raw bytes of a single segment. One attempt; callers retry.
    async fn download_segment(&self, job: &SegmentJob) -> Result<Bytes, DownloadError>;
}

/// HTTP implementation backed by the shared `reqwest::Client`.
pub struct SegmentFetcher {
    http_client: Client,
    segment_timeout: Duration,
}

impl SegmentFetcher {
    // Bodies larger than this are streamed chunk by chunk into one buffer.
    const STREAMING_THRESHOLD_BYTES: u64 = 4 * 1024 * 1024;

    pub fn new(http_client: Client, segment_timeout: Duration) -> Self {
        Self {
            http_client,
            segment_timeout,
        }
    }

    async fn stream_response(&self, response: reqwest::Response) -> Result<Bytes, DownloadError> {
        let content_length = response.content_length().unwrap_or(0) as usize;
        let mut buffer = BytesMut::with_capacity(content_length);
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            buffer.extend_from_slice(&chunk?);
        }

        Ok(buffer.freeze())
    }
}

#[async_trait]
impl SegmentDownloader for SegmentFetcher {
    #[instrument(skip(self, job), fields(index = job.index))]
    async fn download_segment(&self, job: &SegmentJob) -> Result<Bytes, DownloadError> {
        let mut request = self.http_client.get(&job.url);
        if self.segment_timeout > Duration::ZERO {
            request = request.timeout(self.segment_timeout);
        }
        let response = request.send().await?;

        let status = response.status();
        if status.is_client_error() && status != reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DownloadError::fetch(
                &job.url,
                format!("client error {status}"),
                false,
            ));
        }
        if !status.is_success() {
            return Err(DownloadError::http_status(status, &job.url, "segment fetch"));
        }

        let bytes = if response
            .content_length()
            .is_some_and(|len| len > Self::STREAMING_THRESHOLD_BYTES)
        {
            self.stream_response(response).await?
        } else {
            response.bytes().await?
        };

        trace!(url = %job.url, size = bytes.len(), "Downloaded segment");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> SegmentFetcher {
        SegmentFetcher::new(Client::new(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_downloads_segment_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/seg0.ts")
            .with_status(200)
            .with_body("segment-zero")
            .create_async()
            .await;

        let job = SegmentJob {
            index: 0,
            url: format!("{}/seg0.ts", server.url()),
        };
        let bytes = fetcher().download_segment(&job).await.unwrap();
        assert_eq!(&bytes[..], b"segment-zero");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_not_found_is_permanent() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/missing.ts")
            .with_status(404)
            .create_async()
            .await;

        let job = SegmentJob {
            index: 3,
            url: format!("{}/missing.ts", server.url()),
        };
        let err = fetcher().download_segment(&job).await.unwrap_err();
        assert!(matches!(err, DownloadError::Fetch { retryable: false, .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/busy.ts")
            .with_status(503)
            .create_async()
            .await;

        let job = SegmentJob {
            index: 1,
            url: format!("{}/busy.ts", server.url()),
        };
        let err = fetcher().download_segment(&job).await.unwrap_err();
        assert!(matches!(err, DownloadError::HttpStatus { .. }));
        assert!(err.is_retryable());
    }
}
