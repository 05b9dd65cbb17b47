//! Remote session management for the msync tools
//!
//! One multiplexed SSH connection is established per run and shared by
//! every remote operation: batched destination-directory creation and
//! the per-file copy-if-absent primitive (rsync riding the multiplexed
//! control channel). Connection establishment failure at open time is a
//! warning, not an error - the first real remote operation retries with
//! a fresh connection and surfaces the failure as its own.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod transport;

pub use transport::{TransportCapabilities, TransportConfig, TransportProfile};

/// Where to connect: host, optional login user and ssh port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub user: Option<String>,
    pub port: u16,
}

impl Endpoint {
    fn destination(&self) -> String {
        let host = self.host.as_str();
        let port = self.port;
        match self.user.as_deref() {
            Some(user) => format!("ssh://{user}@{host}:{port}"),
            None => format!("ssh://{host}:{port}"),
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.user.as_deref() {
            Some(user) => write!(f, "{}@{}:{}", user, self.host, self.port),
            None => write!(f, "{}:{}", self.host, self.port),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to establish ssh connection to {endpoint}")]
    Connect {
        endpoint: String,
        #[source]
        source: openssh::Error,
    },
    #[error("remote {program} failed: {detail}")]
    RemoteCommand { program: &'static str, detail: String },
    #[error("failed to run {program}")]
    Spawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("transfer of {path:?} failed: {detail}")]
    Transfer { path: PathBuf, detail: String },
}

/// Outcome of a copy-if-absent operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied,
    /// The destination already had a file with this name; left untouched.
    SkippedExisting,
}

/// A multiplexed SSH session shared by all remote operations of one run.
///
/// The underlying connection is established lazily and re-established
/// once when a liveness probe finds it stale. [`Session::close`] is
/// idempotent and tolerates a session that never connected.
pub struct Session {
    endpoint: Endpoint,
    config: TransportConfig,
    capabilities: TransportCapabilities,
    master: tokio::sync::Mutex<Option<Arc<openssh::Session>>>,
}

impl Session {
    /// Probe transport capabilities and attempt the initial connection.
    ///
    /// A connection failure here is logged as a warning; callers retry
    /// lazily on the first real remote operation.
    pub async fn open(endpoint: Endpoint, config: TransportConfig) -> Self {
        let capabilities = transport::probe_capabilities().await;
        let session = Self {
            endpoint,
            config,
            capabilities,
            master: tokio::sync::Mutex::new(None),
        };
        if let Err(error) = session.master().await {
            tracing::warn!(
                "ssh connection to {} not yet available: {:#}",
                session.endpoint,
                &error
            );
        }
        session
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn capabilities(&self) -> &TransportCapabilities {
        &self.capabilities
    }

    /// The live multiplexed connection, probing and replacing a stale one.
    async fn master(&self) -> Result<Arc<openssh::Session>, SessionError> {
        let mut guard = self.master.lock().await;
        if let Some(session) = guard.as_ref() {
            if session.check().await.is_ok() {
                return Ok(session.clone());
            }
            tracing::warn!(
                "multiplexed connection to {} went stale, reconnecting",
                self.endpoint
            );
            *guard = None;
        }
        let destination = self.endpoint.destination();
        tracing::debug!("connecting to {}", destination);
        let session = openssh::Session::connect(&destination, openssh::KnownHosts::Accept)
            .await
            .map_err(|source| SessionError::Connect {
                endpoint: self.endpoint.to_string(),
                source,
            })?;
        let session = Arc::new(session);
        *guard = Some(session.clone());
        Ok(session)
    }

    /// Create every destination directory in a single remote round-trip.
    pub async fn ensure_directories(
        &self,
        directories: &BTreeSet<String>,
    ) -> Result<(), SessionError> {
        if directories.is_empty() {
            return Ok(());
        }
        let master = self.master().await?;
        create_directories(&MasterRunner { master }, directories).await?;
        tracing::debug!(
            "created {} destination directories on {}",
            directories.len(),
            self.endpoint
        );
        Ok(())
    }

    /// Copy `source` into the remote `dest_dir` unless a file with the
    /// same name already exists there. Existing files are skipped, never
    /// overwritten or re-verified.
    pub async fn copy_if_absent(
        &self,
        source: &Path,
        dest_dir: &str,
    ) -> Result<CopyOutcome, SessionError> {
        let master = self.master().await?;
        let mut ssh_transport = format!(
            "ssh -o ControlPath={} -o ControlMaster=no -p {}",
            master.control_socket().display(),
            self.endpoint.port
        );
        if let Some(user) = &self.endpoint.user {
            ssh_transport.push_str(&format!(" -l {user}"));
        }
        if let Some(cipher) = &self.config.cipher {
            ssh_transport.push_str(&format!(" -c {cipher}"));
        }
        let mut cmd = tokio::process::Command::new("rsync");
        cmd.arg("--ignore-existing")
            .arg("--itemize-changes")
            .arg("--protect-args")
            .args(self.config.rsync_args(&self.capabilities))
            .arg("-e")
            .arg(&ssh_transport)
            .arg(source)
            .arg(format!("{}:{}/", self.endpoint.host, dest_dir))
            .stdin(std::process::Stdio::null());
        tracing::debug!("rsync {:?} -> {}", source, dest_dir);
        let output = cmd.output().await.map_err(|source_err| SessionError::Spawn {
            program: "rsync",
            source: source_err,
        })?;
        if !output.status.success() {
            return Err(SessionError::Transfer {
                path: source.to_path_buf(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        // with --itemize-changes a transferred file shows up as an
        // itemized line; no line means it already existed and was skipped
        let stdout = String::from_utf8_lossy(&output.stdout);
        let transferred = stdout
            .lines()
            .any(|line| line.starts_with('<') || line.starts_with('>'));
        Ok(if transferred {
            CopyOutcome::Copied
        } else {
            CopyOutcome::SkippedExisting
        })
    }

    /// Close the multiplexed connection.
    ///
    /// Safe to call when the session never connected, and safe to call
    /// more than once.
    pub async fn close(&self) {
        let mut guard = self.master.lock().await;
        let Some(session) = guard.take() else {
            tracing::debug!("session to {} already closed or never opened", self.endpoint);
            return;
        };
        match Arc::try_unwrap(session) {
            Ok(session) => {
                if let Err(error) = session.close().await {
                    tracing::warn!("error closing ssh session: {}", &error);
                }
            }
            Err(_shared) => {
                tracing::debug!("ssh session still shared, closing on last drop");
            }
        }
    }
}

/// One remote command dispatch; every call costs one network round-trip.
trait RunCommand {
    async fn run(&self, program: &'static str, args: &[String]) -> Result<(), SessionError>;
}

struct MasterRunner {
    master: Arc<openssh::Session>,
}

impl RunCommand for MasterRunner {
    async fn run(&self, program: &'static str, args: &[String]) -> Result<(), SessionError> {
        let mut cmd = Arc::clone(&self.master).arc_command(program);
        cmd.args(args);
        let status = cmd.status().await.map_err(|error| SessionError::RemoteCommand {
            program,
            detail: format!("{error:#}"),
        })?;
        if !status.success() {
            return Err(SessionError::RemoteCommand {
                program,
                detail: format!("exited with {status}"),
            });
        }
        Ok(())
    }
}

/// Batch all directories into one `mkdir -p` dispatch.
async fn create_directories<R: RunCommand>(
    runner: &R,
    directories: &BTreeSet<String>,
) -> Result<(), SessionError> {
    let mut args: Vec<String> = vec!["-p".to_string(), "--".to_string()];
    args.extend(directories.iter().cloned());
    runner.run("mkdir", &args).await
}
