// Ordered segment writer.
//
// Appends segments to the partial file strictly by index. The engine yields
// fetch results in manifest order, so anything arriving out of sequence is a
// bug and is rejected instead of being buffered.

use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, trace};

use crate::error::DownloadError;

pub struct OrderedSegmentWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    next_index: usize,
    bytes_written: u64,
}

impl OrderedSegmentWriter {
    /// Create (or truncate) the file at `path`.
    pub async fn create(path: &Path) -> Result<Self, DownloadError> {
        let file = File::create(path)
            .await
            .map_err(|e| DownloadError::io_path("creating", path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            next_index: 0,
            bytes_written: 0,
        })
    }

    /// Append the segment at `index`, which must be the next one expected.
    /// Returns the number of bytes appended.
    pub async fn append(&mut self, index: usize, data: Bytes) -> Result<u64, DownloadError> {
        if index != self.next_index {
            return Err(DownloadError::Internal {
                reason: format!("segment {index} delivered while expecting {}", self.next_index),
            });
        }
        self.writer
            .write_all(&data)
            .await
            .map_err(|e| DownloadError::io_path("writing", &self.path, e))?;

        let len = data.len() as u64;
        self.bytes_written += len;
        self.next_index += 1;
        trace!(index, len, "Appended segment");
        Ok(len)
    }

    /// Flush and sync after checking that exactly `total` segments were written.
    pub async fn finish(mut self, total: usize) -> Result<u64, DownloadError> {
        if self.next_index != total {
            return Err(DownloadError::Internal {
                reason: format!("{} of {total} segments written", self.next_index),
            });
        }
        self.writer
            .flush()
            .await
            .map_err(|e| DownloadError::io_path("flushing", &self.path, e))?;
        self.writer
            .get_ref()
            .sync_all()
            .await
            .map_err(|e| DownloadError::io_path("syncing", &self.path, e))?;
        debug!(path = %self.path.display(), bytes = self.bytes_written, "Partial file complete");
        Ok(self.bytes_written)
    }
}
