//! Transport profiles and transfer tuning
//!
//! A [`TransportConfig`] is built once from the selected profile and
//! threaded explicitly into the session; nothing here is ambient state.
//! The LAN profile favors throughput on trusted fast links (no
//! compression, whole-file transfers); the WAN profile compresses with a
//! configurable level, skips already-compressed media extensions and
//! resumes partial transfers when the installed rsync supports it.

/// Network profile selecting transfer tuning parameters.
///
/// Selection is always caller-supplied, never auto-detected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TransportProfile {
    /// Trusted fast link: no compression, whole-file transfers.
    #[default]
    Lan,
    /// Slow or metered link: adaptive compression and resumable
    /// transfers.
    Wan,
}

/// Transfer tuning derived from the selected profile.
#[derive(Debug, Clone, Default)]
pub struct TransportConfig {
    pub profile: TransportProfile,
    /// Compression level for the WAN profile (ignored under LAN).
    pub compress_level: u8,
    /// Transport cipher forwarded to the transfer channel's ssh.
    pub cipher: Option<String>,
}

/// What the locally installed rsync can do, probed once at session open.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportCapabilities {
    /// `--compress-choice` is available (rsync >= 3.2).
    pub compress_choice: bool,
    /// `--append-verify` resumable appends are available (rsync >= 3.0).
    pub append_verify: bool,
}

/// Extensions that are already compressed and not worth compressing again.
pub const SKIP_COMPRESS_EXTENSIONS: &str =
    "7z/avi/bz2/flac/flv/gz/jpg/jpeg/m4a/m4v/mkv/mov/mp3/mp4/mpeg/mpg/ogg/png/rar/ts/webm/wmv/xz/zip";

impl TransportConfig {
    pub fn new(profile: TransportProfile, compress_level: u8, cipher: Option<String>) -> Self {
        Self {
            profile,
            compress_level,
            cipher,
        }
    }

    /// Tuning arguments for one rsync invocation.
    pub fn rsync_args(&self, capabilities: &TransportCapabilities) -> Vec<String> {
        match self.profile {
            TransportProfile::Lan => vec!["--whole-file".to_string()],
            TransportProfile::Wan => {
                let mut args = vec![
                    "--compress".to_string(),
                    format!("--compress-level={}", self.compress_level),
                    format!("--skip-compress={SKIP_COMPRESS_EXTENSIONS}"),
                ];
                if capabilities.compress_choice {
                    args.push("--compress-choice=zstd".to_string());
                }
                if capabilities.append_verify {
                    args.push("--append-verify".to_string());
                    args.push("--partial".to_string());
                }
                args
            }
        }
    }
}

/// Probe the installed rsync once and derive its capabilities.
///
/// A failed probe downgrades to the conservative feature set rather than
/// failing the run.
pub async fn probe_capabilities() -> TransportCapabilities {
    match rsync_version().await {
        Some((major, minor)) => {
            let capabilities = TransportCapabilities {
                compress_choice: (major, minor) >= (3, 2),
                append_verify: (major, minor) >= (3, 0),
            };
            tracing::debug!(
                "rsync {}.{} capabilities: {:?}",
                major,
                minor,
                capabilities
            );
            capabilities
        }
        None => {
            tracing::warn!("could not determine rsync version, assuming a minimal feature set");
            TransportCapabilities::default()
        }
    }
}

async fn rsync_version() -> Option<(u32, u32)> {
    let output = tokio::process::Command::new("rsync")
        .arg("--version")
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    parse_rsync_version(&String::from_utf8_lossy(&output.stdout))
}

// first line looks like: "rsync  version 3.2.7  protocol version 31"
fn parse_rsync_version(text: &str) -> Option<(u32, u32)> {
    let first = text.lines().next()?;
    let token = first
        .split_whitespace()
        .skip_while(|token| *token != "version")
        .nth(1)?;
    let mut parts = token.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}
