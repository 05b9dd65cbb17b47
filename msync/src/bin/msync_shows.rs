use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "msync-shows",
    version = common::version::long(),
    about = "Sync an episodic TV library to a remote media server over a multiplexed SSH connection",
    long_about = "`msync-shows` scans a local TV library, parses show/season/episode identity out \
of loosely structured file names and copies new episodes (with their companion subtitles) into \
`<remote>/Shows/<Show Name>/Season <N>` on the remote host.

Files already present on the remote are skipped, so re-running after an interruption is safe.
Every flag has an environment-variable mirror (SSH_HOST, SSH_USER, SSH_PORT, LOCAL_SHOWS_DIR,
REMOTE_BASE_PATH, SYNC_PROFILE, WORKERS, SHOW_ALIASES_FILE).

EXIT CODES:
    0 - every planned item transferred or was already present
    1 - configuration error, enumeration failure or any transfer failure
    2 - argument parsing error

EXAMPLES:
    # Sync over the local network with three concurrent transfers
    msync-shows --host nas.lan --user media --local ~/shows --summary

    # Preview what would happen, without touching the network
    msync-shows --host nas.lan --local ~/shows --dry-run -v

    # Slow link: compress, resume partial transfers
    msync-shows --host vps.example --profile wan --compress-level 6 --local ~/shows"
)]
struct Args {
    // Remote
    /// Remote host to sync to
    #[arg(short = 'H', long, env = "SSH_HOST", value_name = "HOST", help_heading = "Remote")]
    host: String,

    /// Login user on the remote host
    #[arg(short, long, env = "SSH_USER", value_name = "USER", help_heading = "Remote")]
    user: Option<String>,

    /// SSH port on the remote host
    #[arg(
        short,
        long,
        env = "SSH_PORT",
        default_value_t = 2222,
        value_name = "PORT",
        help_heading = "Remote"
    )]
    port: u16,

    /// Remote base path the media library lives under
    #[arg(
        short,
        long,
        env = "REMOTE_BASE_PATH",
        default_value = "/srv/media",
        value_name = "DIR",
        help_heading = "Remote"
    )]
    remote: String,

    // Local
    /// Local directory to scan for episodes
    #[arg(short, long, env = "LOCAL_SHOWS_DIR", value_name = "DIR", help_heading = "Local")]
    local: std::path::PathBuf,

    /// Alias table rewriting show titles (one `key = value` per line)
    #[arg(long, env = "SHOW_ALIASES_FILE", value_name = "FILE", help_heading = "Local")]
    aliases: Option<std::path::PathBuf>,

    // Transfer
    /// Number of concurrent transfers
    #[arg(
        short,
        long,
        env = "WORKERS",
        default_value_t = 3,
        value_parser = clap::value_parser!(u16).range(1..=64),
        value_name = "N",
        help_heading = "Transfer"
    )]
    workers: u16,

    /// Transport tuning profile
    #[arg(
        long,
        env = "SYNC_PROFILE",
        default_value = "lan",
        value_name = "PROFILE",
        help_heading = "Transfer"
    )]
    profile: remote::TransportProfile,

    /// Compression level for the wan profile
    #[arg(long, default_value_t = 3, value_name = "N", help_heading = "Transfer")]
    compress_level: u8,

    /// Transport cipher for the transfer channel
    #[arg(long, value_name = "CIPHER", help_heading = "Transfer")]
    cipher: Option<String>,

    /// Log planned actions without opening a session or transferring
    #[arg(short = 'n', long, help_heading = "Transfer")]
    dry_run: bool,

    // Progress & output
    /// Verbose level: -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Progress & output")]
    verbose: u8,

    /// Print summary at the end
    #[arg(long, help_heading = "Progress & output")]
    summary: bool,

    /// Quiet mode, don't report errors
    #[arg(short = 'q', long = "quiet", help_heading = "Progress & output")]
    quiet: bool,

    // Advanced settings
    /// Number of worker threads, 0 means number of cores
    #[arg(
        long,
        default_value_t = 0,
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_workers: usize,
}

async fn async_main(args: Args) -> Result<msync::SyncSummary> {
    anyhow::ensure!(
        args.local.is_dir(),
        "local shows directory {:?} does not exist",
        args.local
    );
    let aliases = match &args.aliases {
        Some(path) => common::normalize::AliasTable::load(path)?,
        None => common::normalize::AliasTable::default(),
    };
    let settings = msync::SyncSettings {
        endpoint: remote::Endpoint {
            host: args.host.clone(),
            user: args.user.clone(),
            port: args.port,
        },
        transport: remote::TransportConfig::new(
            args.profile,
            args.compress_level,
            args.cipher.clone(),
        ),
        scan_root: args.local.clone(),
        plan: common::plan::Settings {
            mode: common::plan::ScanMode::Shows,
            remote_base: args.remote.clone(),
            aliases,
        },
        workers: args.workers as usize,
        dry_run: args.dry_run,
    };
    msync::run_sync(settings).await
}

fn main() {
    let args = Args::parse();
    let func = {
        let args = args.clone();
        || async_main(args)
    };
    let output = common::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
        print_summary: args.summary,
    };
    let runtime = common::RuntimeConfig {
        max_workers: args.max_workers,
    };
    match common::run(&output, &runtime, func) {
        Some(summary) if summary.is_success() => std::process::exit(0),
        _ => std::process::exit(1),
    }
}
