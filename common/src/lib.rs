//! Shared library for the msync tools - `msync-shows` and `msync-movies`
//!
//! The planning half of a sync run lives here: classifying loosely
//! structured media file names into show/season/episode identities,
//! normalizing titles into canonical destination directory names, and
//! walking a local library tree into a queue of transfer work items.
//! Everything in this crate is pure local computation - no network I/O.
//!
//! The crate also owns the runtime bootstrap ([`run`]) used by both
//! binaries: tracing setup, tokio runtime construction and the final
//! summary printout.

pub mod classify;
pub mod config;
pub mod normalize;
pub mod plan;
pub mod version;

pub use config::{OutputConfig, RuntimeConfig};

fn init_tracing(output: &OutputConfig) {
    let level = if output.quiet {
        "off"
    } else {
        match output.verbose {
            0 => "error",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Set up tracing and a tokio runtime, run the async entry point and
/// print the summary when requested.
///
/// Returns `None` when the entry point failed; the caller maps that to a
/// non-zero exit code.
pub fn run<F, Fut, Summary>(
    output: &OutputConfig,
    runtime: &RuntimeConfig,
    func: F,
) -> Option<Summary>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<Summary>>,
    Summary: std::fmt::Display,
{
    init_tracing(output);
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if runtime.max_workers > 0 {
        builder.worker_threads(runtime.max_workers);
    }
    let rt = match builder.build() {
        Ok(rt) => rt,
        Err(error) => {
            tracing::error!("failed to create tokio runtime: {}", &error);
            return None;
        }
    };
    match rt.block_on(func()) {
        Ok(summary) => {
            if output.print_summary {
                println!("{}", &summary);
            }
            Some(summary)
        }
        Err(error) => {
            if !output.quiet {
                tracing::error!("{:#}", &error);
            }
            None
        }
    }
}
