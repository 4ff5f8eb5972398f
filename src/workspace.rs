//! Workspace volume selection and folder preparation.
//!
//! The workspace is the root folder for lab artifacts. It lives on a
//! preferred volume when that volume is present, otherwise on a fixed
//! fallback, and its resolved path must not contain whitespace: the lab
//! provisioning tool that runs after the preflight fails on such paths.

use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::WorkspaceError;

/// Volume preference for the workspace and the session log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumePreference {
    /// Volume used when present.
    pub preferred: PathBuf,
    /// Volume used otherwise.
    pub fallback: PathBuf,
}

impl Default for VolumePreference {
    fn default() -> Self {
        Self {
            preferred: PathBuf::from("/data"),
            fallback: PathBuf::from("/var/lib"),
        }
    }
}

/// The volume chosen for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChosenVolume {
    /// Volume root directory.
    pub root: PathBuf,
    /// True when the preferred volume was absent and the fallback was taken.
    pub is_fallback: bool,
}

impl VolumePreference {
    /// Picks the preferred volume when it exists, the fallback otherwise.
    /// The choice is fixed for the run.
    ///
    /// # Errors
    ///
    /// Returns `WorkspaceError::NoVolume` when neither volume root exists.
    pub fn choose(&self) -> Result<ChosenVolume, WorkspaceError> {
        if self.preferred.is_dir() {
            return Ok(ChosenVolume {
                root: self.preferred.clone(),
                is_fallback: false,
            });
        }
        if self.fallback.is_dir() {
            return Ok(ChosenVolume {
                root: self.fallback.clone(),
                is_fallback: true,
            });
        }
        Err(WorkspaceError::NoVolume {
            preferred: self.preferred.display().to_string(),
            fallback: self.fallback.display().to_string(),
        })
    }
}

/// Whether the workspace folder pre-existed or was just created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderState {
    /// The folder was created by this run.
    Created,
    /// The folder already existed; nothing was mutated.
    AlreadyPresent,
}

/// Ensures the workspace folder exists under the chosen volume root.
///
/// Idempotent: a pre-existing folder is reported as such and left untouched.
///
/// # Errors
///
/// Returns `WorkspaceError::CreateFailed` when the folder is absent and
/// cannot be created.
pub fn prepare_workspace(
    root: &Path,
    name: &str,
) -> Result<(PathBuf, FolderState), WorkspaceError> {
    let path = root.join(name);

    if path.is_dir() {
        debug!(path = %path.display(), "Workspace folder already present");
        return Ok((path, FolderState::AlreadyPresent));
    }

    fs::create_dir_all(&path).map_err(|e| WorkspaceError::CreateFailed {
        path: path.display().to_string(),
        source: e,
    })?;
    debug!(path = %path.display(), "Created workspace folder");

    Ok((path, FolderState::Created))
}

/// Rejects workspace paths containing any whitespace character.
///
/// Runs regardless of whether the folder pre-existed or was just created.
///
/// # Errors
///
/// Returns `WorkspaceError::WhitespaceInPath` on the first offending path.
pub fn validate_no_whitespace(path: &Path) -> Result<(), WorkspaceError> {
    if path.to_string_lossy().chars().any(char::is_whitespace) {
        return Err(WorkspaceError::WhitespaceInPath {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

/// Best-effort read of the folder's access-control metadata.
///
/// Returns a short owner/mode description for the transcript.
///
/// # Errors
///
/// Returns `WorkspaceError::PermissionProbe` when the metadata cannot be
/// read; callers treat that as a warning, never fatal.
pub fn probe_permissions(path: &Path) -> Result<String, WorkspaceError> {
    let metadata = fs::metadata(path).map_err(|e| WorkspaceError::PermissionProbe {
        path: path.display().to_string(),
        source: e,
    })?;

    let mode = metadata.permissions().mode() & 0o777;
    let uid = metadata.uid();
    let owner = nix::unistd::User::from_uid(nix::unistd::Uid::from_raw(uid))
        .ok()
        .flatten()
        .map_or_else(|| uid.to_string(), |user| user.name);

    Ok(format!("owner {owner}, mode {mode:o}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_choose_prefers_preferred_volume() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let preference = VolumePreference {
            preferred: tmp.path().to_path_buf(),
            fallback: tmp.path().join("absent"),
        };

        let chosen = preference.choose().expect("choose should succeed");
        assert_eq!(chosen.root, tmp.path());
        assert!(!chosen.is_fallback);
    }

    #[test]
    fn test_choose_falls_back_when_preferred_absent() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let preference = VolumePreference {
            preferred: tmp.path().join("absent"),
            fallback: tmp.path().to_path_buf(),
        };

        let chosen = preference.choose().expect("choose should succeed");
        assert_eq!(chosen.root, tmp.path());
        assert!(chosen.is_fallback);
    }

    #[test]
    fn test_choose_fails_when_no_volume_exists() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let preference = VolumePreference {
            preferred: tmp.path().join("absent-a"),
            fallback: tmp.path().join("absent-b"),
        };

        let result = preference.choose();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("No usable volume"));
    }

    #[test]
    fn test_prepare_workspace_creates_folder() {
        let tmp = TempDir::new().expect("failed to create temp dir");

        let (path, state) =
            prepare_workspace(tmp.path(), "lab-sources").expect("prepare should succeed");
        assert!(path.is_dir());
        assert_eq!(state, FolderState::Created);
    }

    #[test]
    fn test_prepare_workspace_is_idempotent() {
        let tmp = TempDir::new().expect("failed to create temp dir");

        let (first, _) =
            prepare_workspace(tmp.path(), "lab-sources").expect("first prepare should succeed");
        let (second, state) =
            prepare_workspace(tmp.path(), "lab-sources").expect("second prepare should succeed");

        assert_eq!(first, second);
        assert_eq!(state, FolderState::AlreadyPresent);
    }

    #[test]
    fn test_prepare_workspace_reports_creation_failure() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let blocker = tmp.path().join("lab-sources");
        fs::write(&blocker, b"not a directory").expect("failed to create blocking file");

        let result = prepare_workspace(tmp.path(), "lab-sources");
        assert!(result.is_err(), "a plain file must block folder creation");
    }

    #[test]
    fn test_validate_no_whitespace() {
        assert!(validate_no_whitespace(Path::new("/data/lab-sources")).is_ok());
        assert!(validate_no_whitespace(Path::new("/data/lab sources")).is_err());
        assert!(validate_no_whitespace(Path::new("/data/lab\tsources")).is_err());
    }

    #[test]
    fn test_probe_permissions_reports_mode() {
        let tmp = TempDir::new().expect("failed to create temp dir");

        let description = probe_permissions(tmp.path()).expect("probe should succeed");
        assert!(description.contains("mode 7"), "got: {description}");
        assert!(description.contains("owner "), "got: {description}");
    }

    #[test]
    fn test_probe_permissions_missing_path_errors() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let result = probe_permissions(&tmp.path().join("absent"));
        assert!(result.is_err());
    }
}
