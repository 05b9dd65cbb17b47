//! Media library sync tools - `msync-shows` and `msync-movies`
//!
//! Both binaries share the same pipeline:
//!
//! 1. The planner (`common::plan`) walks the local library once and
//!    classifies every file name into an episode identity, a movie, a
//!    companion subtitle or something to skip, building a queue of
//!    (source, destination directory) work items plus the deduplicated
//!    set of directories to create.
//! 2. A multiplexed SSH session (`remote::Session`) is opened once per
//!    run, destination directories are created in a single remote
//!    round-trip, and the session is reused by every transfer.
//! 3. The transfer engine ([`engine`]) drains the queue with a bounded
//!    number of concurrent rsync copies, skipping files that already
//!    exist on the remote and isolating per-item failures.
//!
//! Re-running a sync is safe: existing destination files are skipped,
//! never overwritten, so an interrupted run simply resumes on the next
//! invocation.

use std::path::PathBuf;

pub mod engine;

/// Everything one sync run needs, assembled from CLI flags and their
/// environment-variable mirrors.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub endpoint: remote::Endpoint,
    pub transport: remote::TransportConfig,
    pub scan_root: PathBuf,
    pub plan: common::plan::Settings,
    /// Concurrent transfer bound (1 = sequential).
    pub workers: usize,
    /// Log planned actions without opening a session or transferring.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct SyncSummary {
    pub stats: common::plan::Stats,
    pub transfers: engine::Summary,
    pub walk_failed: bool,
}

impl SyncSummary {
    /// A run succeeds only when every item transferred (or was already
    /// present) and the whole tree could be enumerated.
    pub fn is_success(&self) -> bool {
        self.transfers.failed == 0 && !self.walk_failed
    }
}

impl std::fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "parsed:          {:>8}\n\
             skipped locally: {:>8}\n\
             copied:          {:>8}\n\
             already present: {:>8}\n\
             failed:          {:>8}",
            self.stats.parsed,
            self.stats.skipped,
            self.transfers.copied,
            self.transfers.skipped,
            self.transfers.failed,
        )
    }
}

/// Plan and execute one sync run.
///
/// Planning happens entirely locally; the remote session is only opened
/// once there is (potentially) work to do and is closed before
/// returning. Directory creation completes in full before the first
/// transfer starts.
pub async fn run_sync(settings: SyncSettings) -> anyhow::Result<SyncSummary> {
    let plan = common::plan::plan(&settings.scan_root, &settings.plan)?;
    tracing::info!(
        "planned {} transfers into {} directories, {} files skipped",
        plan.queue.len(),
        plan.directories.len(),
        plan.stats.skipped
    );
    if settings.dry_run {
        for dir in &plan.directories {
            tracing::info!("would create {}", dir);
        }
        for item in &plan.queue {
            tracing::info!("would transfer {:?} -> {}", &item.source, &item.dest_dir);
        }
        return Ok(SyncSummary {
            stats: plan.stats,
            transfers: engine::Summary::default(),
            walk_failed: plan.walk_failed,
        });
    }
    let session = remote::Session::open(settings.endpoint, settings.transport).await;
    if let Err(error) = session.ensure_directories(&plan.directories).await {
        // transfers into missing directories fail and are counted below
        tracing::warn!("could not create destination directories: {:#}", &error);
    }
    let transfers = engine::run(&plan.queue, &session, settings.workers).await;
    session.close().await;
    Ok(SyncSummary {
        stats: plan.stats,
        transfers,
        walk_failed: plan.walk_failed,
    })
}
