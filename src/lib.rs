//! Host readiness preflight for a KVM lab provisioner.
//!
//! This crate inspects a machine's virtualization capability, hardware
//! resources, and filesystem layout, then prepares the preconditions a
//! separate lab provisioning tool needs before it can run: an external
//! virtual switch backed by a physical adapter, and a workspace folder on a
//! preferred volume. The run is a linear sequence of idempotent checks with
//! an early-exit policy on fatal conditions; re-running against a ready host
//! performs no mutations.
//!
//! # Platform
//!
//! The stock capability implementations target a Linux/KVM host (procfs,
//! sysfs, systemd, `ip`). Every platform call goes through a narrow trait in
//! [`host`], so the orchestration also runs unchanged against the
//! fixture-backed host used by the tests.
//!
//! # Example
//!
//! ```no_run
//! use lab_preflight::host::LinuxHost;
//! use lab_preflight::logging::SessionLog;
//! use lab_preflight::preflight::{Preflight, PreflightConfig};
//!
//! fn main() -> miette::Result<()> {
//!     let host = LinuxHost::new();
//!     let mut log = SessionLog::open("/var/lib/lab-preflight/preflight.log")?;
//!
//!     let status = Preflight::new(&host, PreflightConfig::default()).run(&mut log);
//!     log.close();
//!
//!     std::process::exit(i32::from(status.code()));
//! }
//! ```

pub mod error;
pub mod host;
pub mod logging;
pub mod preflight;
pub mod workspace;

// Re-export commonly used types
pub use error::{Error, Result};
pub use preflight::{ExitStatus, Preflight, PreflightConfig};
