//! One progress bar per item being downloaded.

use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use atd_engine::{ProgressCallback, ProgressEvent};

struct ItemBar {
    bar: ProgressBar,
    bytes: u64,
}

pub struct ProgressRenderer {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ItemBar>>,
}

impl ProgressRenderer {
    pub fn new(enabled: bool) -> Arc<Self> {
        let target = if enabled {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        Arc::new(Self {
            multi: MultiProgress::with_draw_target(target),
            bars: Mutex::new(HashMap::new()),
        })
    }

    /// Shared handle, used by the log writer to print above the bars.
    pub fn multi(&self) -> MultiProgress {
        self.multi.clone()
    }

    pub fn callback(self: &Arc<Self>) -> ProgressCallback {
        let renderer = Arc::clone(self);
        Arc::new(move |event| renderer.handle(event))
    }

    fn bars(&self) -> MutexGuard<'_, HashMap<String, ItemBar>> {
        self.bars.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn segment_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{prefix:.bold} [{elapsed_precise}] {wide_bar:.cyan/blue} {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{prefix:.bold} {spinner:.yellow} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    pub fn handle(&self, event: ProgressEvent) {
        let mut bars = self.bars();
        match event {
            ProgressEvent::Started {
                name,
                total_segments,
            } => {
                let bar = self.multi.add(ProgressBar::new(total_segments as u64));
                bar.set_style(Self::segment_style());
                bar.set_prefix(name.clone());
                if let Some(old) = bars.insert(name, ItemBar { bar, bytes: 0 }) {
                    old.bar.finish_and_clear();
                }
            }
            ProgressEvent::SegmentWritten { name, bytes, .. } => {
                if let Some(item) = bars.get_mut(&name) {
                    item.bytes += bytes;
                    item.bar.inc(1);
                    item.bar.set_message(HumanBytes(item.bytes).to_string());
                }
            }
            ProgressEvent::Transcoding { name } => {
                let item = bars.entry(name.clone()).or_insert_with(|| ItemBar {
                    bar: self.multi.add(ProgressBar::new_spinner()),
                    bytes: 0,
                });
                item.bar.set_style(Self::spinner_style());
                item.bar.set_prefix(name);
                item.bar.set_message("remuxing with ffmpeg");
                item.bar.enable_steady_tick(Duration::from_millis(120));
            }
            ProgressEvent::Finished { name } => {
                if let Some(item) = bars.remove(&name) {
                    item.bar.finish_and_clear();
                }
            }
        }
    }

    /// Drop bars of items that never finished (failed or interrupted).
    pub fn clear(&self) {
        for (_, item) in self.bars().drain() {
            item.bar.abandon();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_lifecycle() {
        let renderer = ProgressRenderer::new(false);
        let callback = renderer.callback();

        callback(ProgressEvent::Started {
            name: "ep.ts".to_string(),
            total_segments: 3,
        });
        callback(ProgressEvent::SegmentWritten {
            name: "ep.ts".to_string(),
            index: 0,
            bytes: 2048,
        });
        {
            let bars = renderer.bars();
            let item = &bars["ep.ts"];
            assert_eq!(item.bar.position(), 1);
            assert_eq!(item.bytes, 2048);
        }

        callback(ProgressEvent::Finished {
            name: "ep.ts".to_string(),
        });
        assert!(renderer.bars().is_empty());
    }

    #[test]
    fn test_clear_drops_unfinished_bars() {
        let renderer = ProgressRenderer::new(false);
        renderer.handle(ProgressEvent::Transcoding {
            name: "movie.mp4".to_string(),
        });
        assert_eq!(renderer.bars().len(), 1);
        renderer.clear();
        assert!(renderer.bars().is_empty());
    }
}
