//! The individual preflight steps.
//!
//! Each step consults the host through its capability traits, writes its own
//! transcript lines in contract order, and returns a tagged [`Outcome`] for
//! the runner to reduce. No step depends on a later one; the selected
//! adapter is used inside the network step and not retained afterwards.

use crate::host::{FeatureState, SwitchSpec};
use crate::logging::SessionLog;
use crate::workspace::{FolderState, prepare_workspace, probe_permissions, validate_no_whitespace};

use super::outcome::{ExitStatus, Outcome};
use super::{MIN_CORES, MIN_FREE_DISK_GB, MIN_RAM_GB, Preflight, RunState};

/// Bytes per GB, matching how the minimums were measured.
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Converts bytes to GB rounded to one decimal.
fn gb(bytes: u64) -> f64 {
    let exact = bytes as f64 / BYTES_PER_GB;
    (exact * 10.0).round() / 10.0
}

impl Preflight<'_> {
    /// Elevation is required for every mutation that may follow; nothing can
    /// grant it mid-run, so a miss is immediately fatal.
    pub(super) fn privilege_gate(&self, log: &mut SessionLog, _state: &mut RunState) -> Outcome {
        if self.host.is_elevated() {
            log.info("Running with administrative rights.");
            return Outcome::Continue;
        }

        let msg = "Administrative rights are required; re-run as root.";
        log.error(msg);
        Outcome::Fatal(ExitStatus::Failed, msg.to_string())
    }

    /// Queries the virtualization feature and enables it when necessary.
    ///
    /// Exit code 2 distinguishes "re-run after reboot" from "fix and retry".
    pub(super) fn virtualization_feature(
        &self,
        log: &mut SessionLog,
        _state: &mut RunState,
    ) -> Outcome {
        match self.host.feature_state() {
            Ok(FeatureState::Enabled) => {
                log.info("Virtualization feature is enabled.");
                Outcome::Continue
            }
            Ok(state) => {
                log.warn(format!(
                    "Virtualization feature is not enabled (state: {state}); enabling it now."
                ));
                if let Err(e) = self.host.enable_feature() {
                    log.warn(format!("Enable attempt failed: {e}"));
                }
                let msg = "A restart is required before virtualization can be used; re-run afterwards.";
                log.warn(msg);
                Outcome::Fatal(ExitStatus::RestartRequired, msg.to_string())
            }
            Err(e) => {
                let msg = format!("Failed to query virtualization feature state: {e}");
                log.error(&msg);
                Outcome::Fatal(ExitStatus::Failed, msg)
            }
        }
    }

    /// Advisory probe of the virtualization runtime services.
    ///
    /// The underlying signal is known unreliable; this step can warn but
    /// must never produce a fatal outcome.
    pub(super) fn virtualization_runtime(
        &self,
        log: &mut SessionLog,
        _state: &mut RunState,
    ) -> Outcome {
        let names = &self.config.services;
        match self.host.running_services(names) {
            Ok(0) => {
                let msg = format!(
                    "None of the virtualization services ({}) report running; continuing anyway.",
                    names.join(", ")
                );
                log.warn(&msg);
                Outcome::Warn(msg)
            }
            Ok(count) => {
                log.info(format!(
                    "{count} of {} virtualization services running.",
                    names.len()
                ));
                Outcome::Continue
            }
            Err(e) => {
                let msg = format!("Virtualization service probe failed: {e}; continuing anyway.");
                log.warn(&msg);
                Outcome::Warn(msg)
            }
        }
    }

    /// Selects the first up, connected, physical adapter and ensures the
    /// external switch exists bound to it.
    pub(super) fn network_switch(&self, log: &mut SessionLog, _state: &mut RunState) -> Outcome {
        let adapters = match self.host.adapters() {
            Ok(adapters) => adapters,
            Err(e) => {
                let msg = format!("Failed to enumerate network adapters: {e}");
                log.error(&msg);
                return Outcome::Fatal(ExitStatus::Failed, msg);
            }
        };

        let Some(adapter) = adapters.iter().find(|a| a.is_eligible()).cloned() else {
            let msg = "No active physical network adapter found.";
            log.error(msg);
            log.warn("Adapters visible on this host:");
            log.warn(format!("  {:<16} {:<8} {}", "NAME", "STATUS", "DESCRIPTION"));
            for a in &adapters {
                log.warn(format!("  {:<16} {:<8} {}", a.name, a.status(), a.description));
            }
            return Outcome::Fatal(ExitStatus::Failed, msg.to_string());
        };

        log.info(format!(
            "Selected network adapter {} ({}).",
            adapter.name, adapter.description
        ));

        match self.host.find_switch(&self.config.switch_name) {
            Ok(Some(existing)) => {
                log.info(format!(
                    "Virtual switch {} already exists; leaving it untouched.",
                    existing.name
                ));
                Outcome::Continue
            }
            Ok(None) => {
                let spec = SwitchSpec {
                    name: self.config.switch_name.clone(),
                    adapter: adapter.name.clone(),
                    share_with_host: true,
                };
                match self.host.create_switch(&spec) {
                    Ok(()) => {
                        log.info(format!(
                            "Created external virtual switch {} on {}.",
                            spec.name, spec.adapter
                        ));
                        Outcome::Continue
                    }
                    Err(e) => {
                        let msg = format!("{e}");
                        log.error(&msg);
                        Outcome::Fatal(ExitStatus::Failed, msg)
                    }
                }
            }
            Err(e) => {
                let msg = format!(
                    "Failed to query virtual switch {}: {e}",
                    self.config.switch_name
                );
                log.error(&msg);
                Outcome::Fatal(ExitStatus::Failed, msg)
            }
        }
    }

    /// Reads host resources and compares them against the minimums.
    ///
    /// Shortfalls warn; even a failed metrics read only logs an error and
    /// lets the remaining steps proceed.
    pub(super) fn resource_requirements(
        &self,
        log: &mut SessionLog,
        _state: &mut RunState,
    ) -> Outcome {
        let snapshot = match self.host.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let msg = format!("{e}; skipping resource checks.");
                log.error(&msg);
                return Outcome::Warn(msg);
            }
        };

        let ram_gb = gb(snapshot.total_ram_bytes);
        let disk_gb = gb(snapshot.free_disk_bytes);

        log.info(format!("Operating system: {}", snapshot.os_name));
        log.info(format!("Memory: {ram_gb:.1} GB"));
        log.info(format!("Free disk on primary volume: {disk_gb:.1} GB"));
        log.info(format!("Logical cores: {}", snapshot.logical_cores));

        let mut shortfall = false;
        if ram_gb < MIN_RAM_GB {
            log.warn(format!(
                "Memory below recommended minimum: {ram_gb:.1} GB measured, {MIN_RAM_GB:.0} GB required."
            ));
            shortfall = true;
        }
        if disk_gb < MIN_FREE_DISK_GB {
            log.warn(format!(
                "Free disk space below recommended minimum: {disk_gb:.1} GB measured, {MIN_FREE_DISK_GB:.0} GB required."
            ));
            shortfall = true;
        }
        if snapshot.logical_cores < MIN_CORES {
            log.warn(format!(
                "Core count below recommended minimum: {} measured, {MIN_CORES} required.",
                snapshot.logical_cores
            ));
            shortfall = true;
        }

        if shortfall {
            let msg = String::from(
                "Hardware requirements not fully met; provisioning may be slow or fail.",
            );
            log.warn(&msg);
            Outcome::Warn(msg)
        } else {
            log.info("Hardware requirements met.");
            Outcome::Continue
        }
    }

    /// Chooses the volume, ensures the workspace folder, and validates the
    /// resolved path.
    pub(super) fn workspace(&self, log: &mut SessionLog, state: &mut RunState) -> Outcome {
        let volume = match self.config.volumes.choose() {
            Ok(volume) => volume,
            Err(e) => {
                let msg = format!("{e}");
                log.error(&msg);
                return Outcome::Fatal(ExitStatus::Failed, msg);
            }
        };

        let mut warned = false;
        if volume.is_fallback {
            log.warn(format!(
                "Preferred volume {} not present; using {} instead.",
                self.config.volumes.preferred.display(),
                volume.root.display()
            ));
            warned = true;
        } else {
            log.info(format!("Using volume {}.", volume.root.display()));
        }

        let (path, folder_state) = match prepare_workspace(&volume.root, &self.config.workspace_dir)
        {
            Ok(prepared) => prepared,
            Err(e) => {
                let msg = format!("{e}");
                log.error(&msg);
                return Outcome::Fatal(ExitStatus::Failed, msg);
            }
        };

        match folder_state {
            FolderState::Created => log.info(format!("Created workspace folder {}.", path.display())),
            FolderState::AlreadyPresent => {
                log.info(format!("Workspace folder {} already present.", path.display()));
            }
        }

        // The whitespace rule applies whether or not the folder pre-existed.
        if let Err(e) = validate_no_whitespace(&path) {
            let msg = format!("{e}");
            log.error(&msg);
            return Outcome::Fatal(ExitStatus::Failed, msg);
        }

        match probe_permissions(&path) {
            Ok(description) => log.info(format!("Workspace permissions: {description}.")),
            Err(e) => {
                log.warn(format!("Could not read workspace permissions: {e}."));
                warned = true;
            }
        }

        state.workspace = Some(path);
        if warned {
            Outcome::Warn(String::from("workspace prepared with warnings"))
        } else {
            Outcome::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gb_rounds_to_one_decimal() {
        assert_eq!(gb(8 * 1024 * 1024 * 1024), 8.0);
        assert_eq!(gb(16_000_000_000), 14.9);
        assert_eq!(gb(0), 0.0);
    }
}
