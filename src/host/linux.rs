//! Real host capability implementations for a Linux/KVM lab host.
//!
//! Probing goes through procfs and sysfs where the kernel exposes the
//! answer directly; mutations shell out to the standard host tools
//! (`modprobe`, `ip`). Service states come from systemd.

use std::fs;
use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::error::HostError;

use super::{
    Adapter, FeatureState, MetricsProbe, NetInventory, PrivilegeProbe, ResourceSnapshot,
    ServiceProbe, SwitchDescriptor, SwitchProvider, SwitchSpec, VirtFeature,
};

/// Device node exposed once the KVM modules are loaded.
const KVM_DEVICE: &str = "/dev/kvm";

/// Root of the kernel's network interface listing.
const NET_CLASS: &str = "/sys/class/net";

/// Capability implementations backed by the live system.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxHost;

impl LinuxHost {
    /// Creates the real host backend.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl PrivilegeProbe for LinuxHost {
    fn is_elevated(&self) -> bool {
        nix::unistd::geteuid().is_root()
    }
}

impl VirtFeature for LinuxHost {
    fn feature_state(&self) -> Result<FeatureState, HostError> {
        let cpuinfo = fs::read_to_string("/proc/cpuinfo").map_err(|e| HostError::FeatureQuery {
            context: String::from("/proc/cpuinfo"),
            source: e,
        })?;

        // No VMX/SVM flag visible means either unsupported hardware or the
        // feature is switched off in firmware; the kernel cannot tell which.
        if cpu_virt_flag(&cpuinfo).is_none() {
            return Ok(FeatureState::Unknown);
        }

        if Path::new(KVM_DEVICE).exists() {
            Ok(FeatureState::Enabled)
        } else {
            Ok(FeatureState::Disabled)
        }
    }

    fn enable_feature(&self) -> Result<(), HostError> {
        let cpuinfo = fs::read_to_string("/proc/cpuinfo").map_err(|e| HostError::FeatureQuery {
            context: String::from("/proc/cpuinfo"),
            source: e,
        })?;

        let module = match cpu_virt_flag(&cpuinfo) {
            Some(VirtFlag::Vmx) => "kvm_intel",
            Some(VirtFlag::Svm) => "kvm_amd",
            None => "kvm",
        };

        debug!(module, "Loading KVM module");
        run_host_tool("modprobe", &[module]).map_err(|e| HostError::FeatureEnable {
            context: e.to_string(),
        })
    }
}

impl ServiceProbe for LinuxHost {
    fn running_services(&self, names: &[String]) -> Result<usize, HostError> {
        let mut running = 0;
        for name in names {
            let status = Command::new("systemctl")
                .args(["is-active", "--quiet", name])
                .status()
                .map_err(|e| HostError::ServiceProbe {
                    context: format!("failed to spawn systemctl: {e}"),
                })?;
            debug!(service = %name, active = status.success(), "Probed service");
            if status.success() {
                running += 1;
            }
        }
        Ok(running)
    }
}

impl NetInventory for LinuxHost {
    fn adapters(&self) -> Result<Vec<Adapter>, HostError> {
        let entries = fs::read_dir(NET_CLASS)
            .map_err(|e| HostError::AdapterEnumeration { source: e })?;

        let mut adapters = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| HostError::AdapterEnumeration { source: e })?;
            let name = entry.file_name().to_string_lossy().to_string();
            adapters.push(read_adapter(&name, &entry.path()));
        }
        Ok(adapters)
    }
}

impl SwitchProvider for LinuxHost {
    fn find_switch(&self, name: &str) -> Result<Option<SwitchDescriptor>, HostError> {
        let iface = Path::new(NET_CLASS).join(name);
        if !iface.join("bridge").exists() {
            return Ok(None);
        }

        // Bound ports are listed under brif/.
        let adapter = fs::read_dir(iface.join("brif"))
            .ok()
            .and_then(|mut entries| entries.next())
            .and_then(std::result::Result::ok)
            .map(|e| e.file_name().to_string_lossy().to_string());

        Ok(Some(SwitchDescriptor {
            name: name.to_string(),
            adapter,
        }))
    }

    fn create_switch(&self, spec: &SwitchSpec) -> Result<(), HostError> {
        debug!(name = %spec.name, adapter = %spec.adapter, "Creating bridge");

        let mut commands = vec![
            vec!["link", "add", "name", &spec.name, "type", "bridge"],
            vec!["link", "set", &spec.adapter, "master", &spec.name],
        ];
        // An in-namespace bridge is always reachable from the management OS;
        // sharing decides whether it comes up for host traffic immediately.
        if spec.share_with_host {
            commands.push(vec!["link", "set", &spec.name, "up"]);
        }

        for args in &commands {
            run_host_tool("ip", args).map_err(|e| HostError::SwitchCreate {
                name: spec.name.clone(),
                context: e.to_string(),
            })?;
        }
        Ok(())
    }
}

impl MetricsProbe for LinuxHost {
    fn snapshot(&self) -> Result<ResourceSnapshot, HostError> {
        let sys = sysinfo::System::new_all();

        let disks = sysinfo::Disks::new_with_refreshed_list();
        let free_disk_bytes = disks
            .list()
            .iter()
            .find(|d| d.mount_point() == Path::new("/"))
            .map(sysinfo::Disk::available_space)
            .ok_or_else(|| HostError::Metrics {
                context: String::from("no disk mounted at /"),
            })?;

        let os_name = sysinfo::System::long_os_version()
            .or_else(sysinfo::System::name)
            .unwrap_or_else(|| String::from("unknown"));

        Ok(ResourceSnapshot {
            total_ram_bytes: sys.total_memory(),
            free_disk_bytes,
            logical_cores: sys.cpus().len(),
            os_name,
        })
    }
}

/// CPU virtualization flag families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VirtFlag {
    /// Intel VT-x.
    Vmx,
    /// AMD-V.
    Svm,
}

/// Scans /proc/cpuinfo content for a hardware virtualization flag.
fn cpu_virt_flag(cpuinfo: &str) -> Option<VirtFlag> {
    for line in cpuinfo.lines() {
        let Some(flags) = line.strip_prefix("flags") else {
            continue;
        };
        for flag in flags.trim_start_matches([':', '\t', ' ']).split_whitespace() {
            match flag {
                "vmx" => return Some(VirtFlag::Vmx),
                "svm" => return Some(VirtFlag::Svm),
                _ => {}
            }
        }
    }
    None
}

/// Builds an adapter record from its sysfs directory.
///
/// Virtual devices (bridges, veth, tunnels) have no `device` symlink. The
/// `carrier` attribute fails to read while the interface is down, which
/// counts as not connected.
fn read_adapter(name: &str, sysfs: &Path) -> Adapter {
    let is_virtual = !sysfs.join("device").exists();
    let is_up = read_trimmed(&sysfs.join("operstate")).is_some_and(|s| s == "up");
    let is_connected = read_trimmed(&sysfs.join("carrier")).is_some_and(|s| s == "1");
    let description = read_trimmed(&sysfs.join("device").join("uevent"))
        .as_deref()
        .and_then(parse_driver)
        .map(str::to_string)
        .unwrap_or_default();

    Adapter {
        name: name.to_string(),
        description,
        is_up,
        is_connected,
        is_virtual,
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

/// Extracts the DRIVER field from a device uevent blob.
fn parse_driver(uevent: &str) -> Option<&str> {
    uevent
        .lines()
        .find_map(|line| line.strip_prefix("DRIVER="))
}

/// Runs a host tool and maps a failure status to an error carrying stderr.
fn run_host_tool(program: &str, args: &[&str]) -> Result<(), HostError> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| HostError::ReadFailed {
            context: format!("failed to spawn {program}"),
            source: e,
        })?;

    if !output.status.success() {
        return Err(HostError::CommandFailed {
            command: format!("{program} {}", args.join(" ")),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_cpu_virt_flag_intel() {
        let cpuinfo = "processor\t: 0\nflags\t\t: fpu vme vmx ssse3\n";
        assert_eq!(cpu_virt_flag(cpuinfo), Some(VirtFlag::Vmx));
    }

    #[test]
    fn test_cpu_virt_flag_amd() {
        let cpuinfo = "processor\t: 0\nflags\t\t: fpu vme svm sse4_2\n";
        assert_eq!(cpu_virt_flag(cpuinfo), Some(VirtFlag::Svm));
    }

    #[test]
    fn test_cpu_virt_flag_absent() {
        let cpuinfo = "processor\t: 0\nflags\t\t: fpu vme sse4_2\n";
        assert_eq!(cpu_virt_flag(cpuinfo), None);
    }

    #[test]
    fn test_cpu_virt_flag_does_not_match_substrings() {
        // "svme" is not "svm"
        let cpuinfo = "flags\t\t: svme vmxoff\n";
        assert_eq!(cpu_virt_flag(cpuinfo), None);
    }

    #[test]
    fn test_parse_driver() {
        let uevent = "DRIVER=e1000e\nPCI_CLASS=20000\n";
        assert_eq!(parse_driver(uevent), Some("e1000e"));
        assert_eq!(parse_driver("PCI_CLASS=20000\n"), None);
    }

    fn write_attr(dir: &Path, name: &str, content: &str) {
        let mut file = File::create(dir.join(name)).expect("failed to create attr");
        writeln!(file, "{content}").expect("failed to write attr");
    }

    #[test]
    fn test_read_adapter_physical_up() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let sysfs = tmp.path().join("eth0");
        fs::create_dir_all(sysfs.join("device")).expect("failed to create device dir");
        write_attr(&sysfs, "operstate", "up");
        write_attr(&sysfs, "carrier", "1");
        write_attr(&sysfs.join("device"), "uevent", "DRIVER=e1000e");

        let adapter = read_adapter("eth0", &sysfs);
        assert!(adapter.is_up);
        assert!(adapter.is_connected);
        assert!(!adapter.is_virtual);
        assert_eq!(adapter.description, "e1000e");
        assert!(adapter.is_eligible());
    }

    #[test]
    fn test_read_adapter_virtual_down() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let sysfs = tmp.path().join("virbr0");
        fs::create_dir_all(&sysfs).expect("failed to create iface dir");
        write_attr(&sysfs, "operstate", "down");
        // No carrier attribute while down, no device symlink at all.

        let adapter = read_adapter("virbr0", &sysfs);
        assert!(!adapter.is_up);
        assert!(!adapter.is_connected);
        assert!(adapter.is_virtual);
        assert!(!adapter.is_eligible());
    }
}
