//! The ordered preflight run.
//!
//! Eight concerns executed strictly forward: session banner, privilege gate,
//! virtualization feature, virtualization runtime, network switch, resource
//! requirements, workspace, summary. Any step may short-circuit the
//! remainder with a fatal outcome. Every external mutation is
//! create-if-absent, so re-running against a ready host performs no
//! mutations at all.
//!
//! # Example
//!
//! ```no_run
//! use lab_preflight::host::LinuxHost;
//! use lab_preflight::logging::SessionLog;
//! use lab_preflight::preflight::{Preflight, PreflightConfig};
//!
//! let host = LinuxHost::new();
//! let mut log = SessionLog::open("/var/lib/lab-preflight/preflight.log")?;
//! let status = Preflight::new(&host, PreflightConfig::default()).run(&mut log);
//! log.close();
//! # Ok::<(), lab_preflight::error::LogError>(())
//! ```

mod outcome;
mod steps;

pub use outcome::{ExitStatus, Outcome};

use std::path::PathBuf;

use tracing::debug;

use crate::host::Host;
use crate::logging::SessionLog;
use crate::workspace::VolumePreference;

/// Default name of the external virtual switch (bridge names are capped at
/// 15 characters).
pub const DEFAULT_SWITCH_NAME: &str = "labsw0";

/// Default workspace folder name under the chosen volume.
pub const DEFAULT_WORKSPACE_DIR: &str = "lab-sources";

/// Virtualization runtime services probed by the advisory check.
pub const DEFAULT_VIRT_SERVICES: [&str; 3] = ["libvirtd", "virtqemud", "virtlogd"];

/// Minimum recommended RAM in GB.
pub const MIN_RAM_GB: f64 = 16.0;

/// Minimum recommended free disk space on the primary volume in GB.
pub const MIN_FREE_DISK_GB: f64 = 150.0;

/// Minimum recommended logical core count.
pub const MIN_CORES: usize = 4;

/// Settings for a preflight run.
///
/// # Example
///
/// ```
/// use lab_preflight::preflight::PreflightConfig;
///
/// let config = PreflightConfig::default()
///     .with_switch_name("labsw1")
///     .with_workspace_dir("lab");
/// ```
#[derive(Debug, Clone)]
pub struct PreflightConfig {
    /// Name of the external virtual switch to ensure.
    pub switch_name: String,

    /// Preferred/fallback volume pair for the workspace.
    pub volumes: VolumePreference,

    /// Workspace folder name under the chosen volume.
    pub workspace_dir: String,

    /// Virtualization runtime services to probe.
    pub services: Vec<String>,
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            switch_name: String::from(DEFAULT_SWITCH_NAME),
            volumes: VolumePreference::default(),
            workspace_dir: String::from(DEFAULT_WORKSPACE_DIR),
            services: DEFAULT_VIRT_SERVICES.iter().map(|s| String::from(*s)).collect(),
        }
    }
}

impl PreflightConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the external switch name.
    #[must_use]
    pub fn with_switch_name(mut self, name: impl Into<String>) -> Self {
        self.switch_name = name.into();
        self
    }

    /// Sets the volume preference.
    #[must_use]
    pub fn with_volumes(mut self, volumes: VolumePreference) -> Self {
        self.volumes = volumes;
        self
    }

    /// Sets the workspace folder name.
    #[must_use]
    pub fn with_workspace_dir(mut self, name: impl Into<String>) -> Self {
        self.workspace_dir = name.into();
        self
    }

    /// Sets the probed service list.
    #[must_use]
    pub fn with_services<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.services = services.into_iter().map(Into::into).collect();
        self
    }
}

/// Transient data threaded between steps.
#[derive(Debug, Default)]
pub(crate) struct RunState {
    /// Resolved workspace path, set by the workspace step.
    pub(crate) workspace: Option<PathBuf>,
}

/// Runs every preflight step in order and reduces the outcomes.
pub struct Preflight<'a> {
    config: PreflightConfig,
    host: &'a dyn Host,
}

impl<'a> Preflight<'a> {
    /// Creates a runner over the given host capabilities.
    #[must_use]
    pub fn new(host: &'a dyn Host, config: PreflightConfig) -> Self {
        Self { config, host }
    }

    /// Executes the ordered step list.
    ///
    /// Warnings are counted and the run continues; the first fatal outcome
    /// stops the run with its status. The caller owns the log and closes it
    /// after this returns, whatever the status.
    pub fn run(&self, log: &mut SessionLog) -> ExitStatus {
        log.info(format!(
            "Host readiness preflight v{}",
            env!("CARGO_PKG_VERSION")
        ));

        let steps: [(&str, fn(&Self, &mut SessionLog, &mut RunState) -> Outcome); 6] = [
            ("privilege gate", Self::privilege_gate),
            ("virtualization feature", Self::virtualization_feature),
            ("virtualization runtime", Self::virtualization_runtime),
            ("network switch", Self::network_switch),
            ("resource requirements", Self::resource_requirements),
            ("workspace", Self::workspace),
        ];

        let mut state = RunState::default();
        let mut warnings = 0usize;

        for (name, step) in steps {
            debug!(step = name, "Running preflight step");
            match step(self, log, &mut state) {
                Outcome::Continue => {}
                Outcome::Warn(_) => warnings += 1,
                Outcome::Fatal(status, _) => return status,
            }
        }

        self.summary(log, &state, warnings);
        ExitStatus::Ready
    }

    fn summary(&self, log: &mut SessionLog, state: &RunState, warnings: usize) {
        let workspace = state
            .workspace
            .as_ref()
            .map_or_else(|| String::from("-"), |p| p.display().to_string());

        log.info("==========================================");
        log.info("Host readiness summary");
        log.info(format!("  Workspace : {workspace}"));
        log.info(format!("  Switch    : {}", self.config.switch_name));
        log.info("==========================================");

        if warnings > 0 {
            log.warn(format!(
                "Host is ready with {warnings} warning(s); review the transcript."
            ));
        } else {
            log.info("Host is ready for lab provisioning.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = PreflightConfig::default();
        assert_eq!(config.switch_name, DEFAULT_SWITCH_NAME);
        assert_eq!(config.workspace_dir, DEFAULT_WORKSPACE_DIR);
        assert_eq!(config.services.len(), DEFAULT_VIRT_SERVICES.len());
        assert_eq!(config.volumes, VolumePreference::default());
    }

    #[test]
    fn test_config_builder_chain() {
        let config = PreflightConfig::new()
            .with_switch_name("labsw1")
            .with_workspace_dir("lab")
            .with_services(["libvirtd"]);

        assert_eq!(config.switch_name, "labsw1");
        assert_eq!(config.workspace_dir, "lab");
        assert_eq!(config.services, vec![String::from("libvirtd")]);
    }

    #[test]
    fn test_switch_name_fits_bridge_limit() {
        assert!(DEFAULT_SWITCH_NAME.len() <= 15);
    }
}
