//! Host capability interfaces.
//!
//! Every external concern the preflight consults is modeled as a narrow
//! trait, so the orchestration can run against the real host or against
//! deterministic fixtures in tests. [`LinuxHost`] is the stock
//! implementation; [`fixtures::FixtureHost`] answers from fixed values and
//! records invocations.

pub mod fixtures;
mod linux;

pub use linux::LinuxHost;

use crate::error::HostError;

/// State of the host virtualization feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureState {
    /// Hardware virtualization is available to the hypervisor layer.
    Enabled,
    /// The CPU supports virtualization but the feature is not active.
    Disabled,
    /// No virtualization support is visible; firmware may hide it.
    Unknown,
}

impl std::fmt::Display for FeatureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enabled => write!(f, "enabled"),
            Self::Disabled => write!(f, "disabled"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A network adapter as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adapter {
    /// Interface name (e.g. `enp3s0`).
    pub name: String,
    /// Driver or device description, best-effort.
    pub description: String,
    /// Administratively up.
    pub is_up: bool,
    /// Physical link detected (carrier).
    pub is_connected: bool,
    /// Backed by a virtual device rather than physical hardware.
    pub is_virtual: bool,
}

impl Adapter {
    /// True when the adapter qualifies to back the external switch:
    /// up, connected, and physical.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        self.is_up && self.is_connected && !self.is_virtual
    }

    /// Short status string for diagnostic listings.
    #[must_use]
    pub fn status(&self) -> &'static str {
        if self.is_up { "up" } else { "down" }
    }
}

/// An existing virtual switch on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchDescriptor {
    /// Switch (bridge) name.
    pub name: String,
    /// Adapter currently bound to the switch, when one is.
    pub adapter: Option<String>,
}

/// Request to create a virtual switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchSpec {
    /// Switch (bridge) name.
    pub name: String,
    /// Physical adapter to bind.
    pub adapter: String,
    /// Keep the management OS attached to the switch.
    pub share_with_host: bool,
}

/// Point-in-time host resource measurements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSnapshot {
    /// Total installed RAM in bytes.
    pub total_ram_bytes: u64,
    /// Free space on the primary system volume in bytes.
    pub free_disk_bytes: u64,
    /// Logical core count.
    pub logical_cores: usize,
    /// OS display name.
    pub os_name: String,
}

/// Elevation state of the calling process.
pub trait PrivilegeProbe {
    /// True when the process runs with administrative rights.
    fn is_elevated(&self) -> bool;
}

/// Query and enable the host virtualization feature.
pub trait VirtFeature {
    /// Current state of the virtualization feature.
    ///
    /// # Errors
    ///
    /// Returns an error when the state cannot be determined at all; this is
    /// distinct from a determinate [`FeatureState::Unknown`].
    fn feature_state(&self) -> Result<FeatureState, HostError>;

    /// Best-effort enable of the virtualization feature.
    ///
    /// Never triggers a restart itself; the caller decides whether one is
    /// required.
    ///
    /// # Errors
    ///
    /// Returns an error when the enable operation fails outright.
    fn enable_feature(&self) -> Result<(), HostError>;
}

/// Probe named virtualization runtime services.
pub trait ServiceProbe {
    /// Number of the named services currently reporting a running state.
    ///
    /// # Errors
    ///
    /// Returns an error when the probe itself cannot run. Callers treat this
    /// signal as advisory.
    fn running_services(&self, names: &[String]) -> Result<usize, HostError>;
}

/// Enumerate host network adapters.
pub trait NetInventory {
    /// All adapters in platform enumeration order, unfiltered.
    ///
    /// # Errors
    ///
    /// Returns an error when the platform listing is unavailable.
    fn adapters(&self) -> Result<Vec<Adapter>, HostError>;
}

/// Query and create virtual switches.
pub trait SwitchProvider {
    /// Looks up an existing switch by name.
    ///
    /// # Errors
    ///
    /// Returns an error when the query cannot be answered.
    fn find_switch(&self, name: &str) -> Result<Option<SwitchDescriptor>, HostError>;

    /// Creates the switch described by `spec`.
    ///
    /// # Errors
    ///
    /// Returns an error when creation fails (adapter busy, permissions, ...).
    fn create_switch(&self, spec: &SwitchSpec) -> Result<(), HostError>;
}

/// Read host resource metrics.
pub trait MetricsProbe {
    /// Point-in-time snapshot of RAM, disk, cores, and OS identity.
    ///
    /// # Errors
    ///
    /// Returns an error when the metrics cannot be read.
    fn snapshot(&self) -> Result<ResourceSnapshot, HostError>;
}

/// Umbrella over every capability the preflight consults.
pub trait Host:
    PrivilegeProbe + VirtFeature + ServiceProbe + NetInventory + SwitchProvider + MetricsProbe
{
}

impl<T> Host for T where
    T: PrivilegeProbe + VirtFeature + ServiceProbe + NetInventory + SwitchProvider + MetricsProbe
{
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(is_up: bool, is_connected: bool, is_virtual: bool) -> Adapter {
        Adapter {
            name: String::from("eth0"),
            description: String::from("e1000e"),
            is_up,
            is_connected,
            is_virtual,
        }
    }

    #[test]
    fn test_adapter_eligibility() {
        assert!(adapter(true, true, false).is_eligible());
        assert!(!adapter(false, true, false).is_eligible());
        assert!(!adapter(true, false, false).is_eligible());
        assert!(!adapter(true, true, true).is_eligible());
    }

    #[test]
    fn test_adapter_status() {
        assert_eq!(adapter(true, true, false).status(), "up");
        assert_eq!(adapter(false, false, false).status(), "down");
    }

    #[test]
    fn test_feature_state_display() {
        assert_eq!(FeatureState::Enabled.to_string(), "enabled");
        assert_eq!(FeatureState::Disabled.to_string(), "disabled");
        assert_eq!(FeatureState::Unknown.to_string(), "unknown");
    }
}
