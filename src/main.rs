//! Host readiness preflight - entry point.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use miette::Result;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt};

use lab_preflight::host::LinuxHost;
use lab_preflight::logging::SessionLog;
use lab_preflight::preflight::{DEFAULT_SWITCH_NAME, Preflight, PreflightConfig};
use lab_preflight::workspace::VolumePreference;

/// Fixed subdirectory on the chosen volume holding the session log.
const LOG_DIR: &str = "lab-preflight";

/// Session log file name; appended across runs.
const LOG_FILE: &str = "preflight.log";

/// Host readiness preflight for the lab provisioning tool.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Session log file (defaults to <volume>/lab-preflight/preflight.log)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Volume root for the workspace folder (skips the preferred/fallback probe)
    #[arg(long)]
    workspace_root: Option<PathBuf>,

    /// Name of the external virtual switch
    #[arg(long, default_value = DEFAULT_SWITCH_NAME)]
    switch_name: String,

    /// Do not wait for a keypress before exiting
    #[arg(long, default_value = "false")]
    non_interactive: bool,

    /// Enable verbose diagnostics on stderr
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Operator-facing output goes through the session log; tracing carries
    // developer diagnostics on stderr.
    let filter = if args.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let volumes = match args.workspace_root {
        Some(root) => VolumePreference {
            preferred: root.clone(),
            fallback: root,
        },
        None => VolumePreference::default(),
    };

    let log_path = args
        .log_file
        .unwrap_or_else(|| default_log_path(&volumes));
    let mut log = SessionLog::open(&log_path)?;

    let config = PreflightConfig::default()
        .with_switch_name(args.switch_name)
        .with_volumes(volumes);
    let host = LinuxHost::new();

    let status = Preflight::new(&host, config).run(&mut log);
    log.close();

    if !args.non_interactive && std::io::stdin().is_terminal() {
        wait_for_key();
    }

    Ok(ExitCode::from(status))
}

/// Session log location on the chosen volume.
fn default_log_path(volumes: &VolumePreference) -> PathBuf {
    let root = if volumes.preferred.is_dir() {
        &volumes.preferred
    } else {
        &volumes.fallback
    };
    root.join(LOG_DIR).join(LOG_FILE)
}

/// Holds the console window open until the operator presses a key.
fn wait_for_key() {
    use crossterm::event::{Event, read};
    use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

    println!("Press any key to exit...");
    if enable_raw_mode().is_err() {
        return;
    }
    loop {
        match read() {
            Ok(Event::Key(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
    let _ = disable_raw_mode();
}
