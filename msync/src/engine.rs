//! Parallel transfer engine
//!
//! Drains the planned transfer queue through a transport's
//! copy-if-absent primitive with a bounded number of operations in
//! flight. A single item's failure is logged and counted, never
//! cancelling sibling transfers; the engine joins all in-flight work
//! before reporting the final summary.

use std::path::Path;

use futures::StreamExt;

use common::plan::TransferItem;
use remote::CopyOutcome;

/// The remote-copy primitive the engine drives.
///
/// The engine polls all item futures on one control task, so
/// implementations never need to be `Send`.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Copy `source` into `dest_dir` unless a same-named file is already
    /// present there.
    async fn copy_if_absent(&self, source: &Path, dest_dir: &str)
        -> anyhow::Result<CopyOutcome>;
}

impl Transport for remote::Session {
    async fn copy_if_absent(
        &self,
        source: &Path,
        dest_dir: &str,
    ) -> anyhow::Result<CopyOutcome> {
        Ok(remote::Session::copy_if_absent(self, source, dest_dir).await?)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct Summary {
    pub copied: usize,
    /// Items skipped because the destination already had the file.
    pub skipped: usize,
    pub failed: usize,
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "copied: {}, already present: {}, failed: {}",
            self.copied, self.skipped, self.failed
        )
    }
}

/// Run every queued transfer with at most `workers` in flight.
///
/// `workers` must be positive; 1 degenerates to sequential execution.
/// All items are attempted regardless of individual failures.
pub async fn run<T: Transport + Sync>(
    queue: &[TransferItem],
    transport: &T,
    workers: usize,
) -> Summary {
    let slots = throttle::TransferSlots::new(workers);
    let summary = tokio::sync::Mutex::new(Summary::default());
    futures::stream::iter(queue)
        .for_each_concurrent(None, |item| {
            let slots = &slots;
            let summary = &summary;
            async move {
                let _slot = slots.acquire().await;
                match transport.copy_if_absent(&item.source, &item.dest_dir).await {
                    Ok(CopyOutcome::Copied) => {
                        tracing::info!("transferred {:?} -> {}", &item.source, &item.dest_dir);
                        summary.lock().await.copied += 1;
                    }
                    Ok(CopyOutcome::SkippedExisting) => {
                        tracing::debug!(
                            "{:?} already present in {}",
                            &item.source,
                            &item.dest_dir
                        );
                        summary.lock().await.skipped += 1;
                    }
                    Err(error) => {
                        tracing::error!(
                            "failed to transfer {:?} -> {}: {:#}",
                            &item.source,
                            &item.dest_dir,
                            &error
                        );
                        summary.lock().await.failed += 1;
                    }
                }
            }
        })
        .await;
    summary.into_inner()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct RecordingTransport {
        active: AtomicUsize,
        high_water: AtomicUsize,
        fail_source: Option<&'static str>,
        skip_source: Option<&'static str>,
    }

    impl RecordingTransport {
        fn new() -> Self {
            Self {
                active: AtomicUsize::new(0),
                high_water: AtomicUsize::new(0),
                fail_source: None,
                skip_source: None,
            }
        }

        fn high_water(&self) -> usize {
            self.high_water.load(Ordering::SeqCst)
        }
    }

    impl Transport for RecordingTransport {
        async fn copy_if_absent(
            &self,
            source: &Path,
            _dest_dir: &str,
        ) -> anyhow::Result<CopyOutcome> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.high_water.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            let name = source.file_name().unwrap().to_str().unwrap();
            if self.fail_source == Some(name) {
                anyhow::bail!("simulated transfer failure");
            }
            if self.skip_source == Some(name) {
                return Ok(CopyOutcome::SkippedExisting);
            }
            Ok(CopyOutcome::Copied)
        }
    }

    fn make_queue(n: usize) -> Vec<TransferItem> {
        (1..=n)
            .map(|i| TransferItem {
                source: PathBuf::from(format!("{i:02}.mkv")),
                dest_dir: "/srv/media/Shows/X/Season 1".to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_worker_bound() {
        let queue = make_queue(20);
        let transport = RecordingTransport::new();
        let summary = run(&queue, &transport, 3).await;
        assert_eq!(summary.copied, 20);
        assert!(
            transport.high_water() <= 3,
            "saw {} concurrent transfers",
            transport.high_water()
        );
        assert!(transport.high_water() >= 2, "transfers never overlapped");
    }

    #[tokio::test]
    async fn single_worker_runs_sequentially() {
        let queue = make_queue(6);
        let transport = RecordingTransport::new();
        let summary = run(&queue, &transport, 1).await;
        assert_eq!(summary.copied, 6);
        assert_eq!(transport.high_water(), 1);
    }

    #[tokio::test]
    async fn one_failure_does_not_cancel_siblings() {
        let queue = make_queue(10);
        let transport = RecordingTransport {
            fail_source: Some("07.mkv"),
            ..RecordingTransport::new()
        };
        let summary = run(&queue, &transport, 3).await;
        assert_eq!(summary.copied, 9);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 0);
    }

    #[tokio::test]
    async fn existing_destination_files_are_skipped() {
        let queue = make_queue(3);
        let transport = RecordingTransport {
            skip_source: Some("02.mkv"),
            ..RecordingTransport::new()
        };
        let summary = run(&queue, &transport, 2).await;
        assert_eq!(summary.copied, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    async fn empty_queue_reports_nothing() {
        let transport = RecordingTransport::new();
        let summary = run(&[], &transport, 3).await;
        assert_eq!(summary, Summary::default());
    }
}
