//! notifyd - Popup Notification Daemon
//!
//! Receives notification calls on a Unix socket and shows them as overlay
//! surfaces stacked at one screen edge.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults
//! notifyd
//!
//! # Custom socket path
//! notifyd --socket-path /tmp/notifyd.sock
//!
//! # With config file
//! notifyd --config ~/.config/notifyd/config.toml
//!
//! # Keep every committed frame as a PNG
//! notifyd --frame-dir /tmp/notifyd-frames
//!
//! # Daemonize (run in background)
//! notifyd --daemonize
//!
//! # Verbose logging
//! RUST_LOG=debug notifyd
//! ```
//!
//! # Signals
//!
//! - `SIGTERM` / `SIGINT`: Graceful shutdown (every surface is released)

mod server;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

use notifyd_core::config::default_config_path;
use notifyd_core::{
    default_socket_path, load_config_from_path, HeadlessPlatform, MonospaceText,
    NotificationManager,
};

use server::DaemonServer;

/// notifyd - popup notification daemon
#[derive(Parser, Debug)]
#[command(name = "notifyd")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Unix socket path for client calls
    #[arg(short = 's', long, env = "NOTIFYD_SOCKET", value_name = "PATH")]
    socket_path: Option<PathBuf>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "NOTIFYD_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run as daemon (fork to background)
    #[arg(short = 'd', long)]
    daemonize: bool,

    /// PID file path
    #[arg(long, env = "NOTIFYD_PID_FILE", value_name = "PATH")]
    pid_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "NOTIFYD_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Directory that receives every committed frame as a PNG
    #[arg(long, env = "NOTIFYD_FRAME_DIR", value_name = "DIR")]
    frame_dir: Option<PathBuf>,
}

/// PID file next to the default socket
fn default_pid_path() -> PathBuf {
    default_socket_path().with_file_name("notifyd.pid")
}

/// Write PID file
fn write_pid_file(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create PID directory: {}", parent.display()))?;
    }

    let pid = std::process::id();
    let mut file = fs::File::create(path)
        .with_context(|| format!("Failed to create PID file: {}", path.display()))?;
    writeln!(file, "{pid}")?;

    info!(pid = pid, path = %path.display(), "PID file created");
    Ok(())
}

/// Remove PID file
fn remove_pid_file(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            warn!(error = %e, path = %path.display(), "Failed to remove PID file");
        } else {
            info!(path = %path.display(), "PID file removed");
        }
    }
}

/// Refuse to start when the PID file names a live process
fn check_existing_daemon(pid_path: &Path) -> Result<()> {
    if !pid_path.exists() {
        return Ok(());
    }

    let pid_str = fs::read_to_string(pid_path)
        .with_context(|| format!("Failed to read PID file: {}", pid_path.display()))?;

    let pid: i32 = pid_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid PID in {}", pid_path.display()))?;

    // 0 and negatives address process groups, never a single daemon
    if pid > 0 && kill(Pid::from_raw(pid), None).is_ok() {
        anyhow::bail!(
            "Another notifyd is already running (PID: {pid}). \
             Stop it first or remove {} if it's stale.",
            pid_path.display()
        );
    }

    warn!(pid = pid, "Removing stale PID file");
    fs::remove_file(pid_path)?;
    Ok(())
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("notifyd={level},notifyd_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

/// Daemonize the process (fork to background)
///
/// Must run before the async runtime exists.
fn daemonize() -> Result<()> {
    use nix::unistd::{fork, setsid, ForkResult};

    // SAFETY: no other threads exist yet
    match unsafe { fork() } {
        Ok(ForkResult::Parent { .. }) => std::process::exit(0),
        Ok(ForkResult::Child) => {}
        Err(e) => anyhow::bail!("First fork failed: {e}"),
    }

    setsid().context("setsid failed")?;

    // Second fork so the daemon can never reacquire a controlling terminal
    // SAFETY: still single-threaded
    match unsafe { fork() } {
        Ok(ForkResult::Parent { .. }) => std::process::exit(0),
        Ok(ForkResult::Child) => {}
        Err(e) => anyhow::bail!("Second fork failed: {e}"),
    }

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), pid = std::process::id(), "notifyd starting");

    let config_path = args.config.clone().or_else(default_config_path);
    let config = load_config_from_path(config_path).context("Invalid configuration")?;
    info!(source = %config.source(), "Configuration loaded");

    let socket_path = args.socket_path.clone().unwrap_or_else(default_socket_path);
    let pid_path = args.pid_file.clone().unwrap_or_else(default_pid_path);
    info!(socket_path = %socket_path.display(), pid_path = %pid_path.display(), "Paths resolved");

    check_existing_daemon(&pid_path)?;

    if args.daemonize {
        info!("Daemonizing...");
        daemonize()?;
        info!(pid = std::process::id(), "Daemonized");
    }

    write_pid_file(&pid_path)?;

    // Single-threaded: the manager and every connection task share one thread
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;

    let result = runtime.block_on(run(args, config, socket_path.clone()));

    info!("Shutting down...");
    remove_pid_file(&pid_path);

    if socket_path.exists() {
        if let Err(e) = fs::remove_file(&socket_path) {
            warn!(error = %e, "Failed to remove socket file");
        }
    }

    match result {
        Ok(()) => {
            info!("notifyd stopped cleanly");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "notifyd stopped with error");
            Err(e)
        }
    }
}

async fn run(args: Args, config: notifyd_core::NotifydConfig, socket_path: PathBuf) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;

    let shutdown_clone = Arc::clone(&shutdown);
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, initiating shutdown"),
            _ = sigint.recv() => info!("Received SIGINT, initiating shutdown"),
        }
        shutdown_clone.store(true, Ordering::SeqCst);
    });

    let platform = HeadlessPlatform::connect(args.frame_dir)
        .context("Display platform is missing a required capability")?;
    let text = MonospaceText::new(config.appearance.font.clone());
    let manager = NotificationManager::create(config, platform, text);

    let server = DaemonServer::new(socket_path);
    server.run(manager, shutdown).await
}
