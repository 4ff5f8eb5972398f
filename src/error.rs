//! Error types for the preflight checker.
//!
//! Uses thiserror for deriving std::error::Error and miette for rich diagnostics.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the application.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Session log could not be opened or written
    #[error("Session log error")]
    #[diagnostic(code(preflight::log))]
    Log(#[from] LogError),

    /// A host capability call failed
    #[error("Host capability error")]
    #[diagnostic(code(preflight::host))]
    Host(#[from] HostError),

    /// Workspace preparation failed
    #[error("Workspace preparation failed")]
    #[diagnostic(code(preflight::workspace))]
    Workspace(#[from] WorkspaceError),

    /// I/O error
    #[error("I/O error: {0}")]
    #[diagnostic(code(preflight::io))]
    Io(#[from] std::io::Error),
}

/// Errors opening or writing the session log.
#[derive(Error, Debug, Diagnostic)]
pub enum LogError {
    /// Log directory could not be created
    #[error("Failed to create log directory {path}")]
    #[diagnostic(
        code(preflight::log::create_dir),
        help("Check that the volume is mounted and writable")
    )]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Log file could not be opened for append
    #[error("Failed to open session log {path}")]
    #[diagnostic(code(preflight::log::open))]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by host capability implementations.
#[derive(Error, Debug, Diagnostic)]
pub enum HostError {
    /// Virtualization feature state could not be determined
    #[error("Failed to query virtualization feature state: {context}")]
    #[diagnostic(
        code(preflight::host::feature_query),
        help("Verify /proc/cpuinfo is readable and the KVM modules are installed")
    )]
    FeatureQuery {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Virtualization feature could not be enabled
    #[error("Failed to enable virtualization feature: {context}")]
    #[diagnostic(
        code(preflight::host::feature_enable),
        help("Load the module manually: modprobe kvm_intel (or kvm_amd)")
    )]
    FeatureEnable { context: String },

    /// Runtime service states could not be read
    #[error("Failed to probe virtualization services: {context}")]
    #[diagnostic(code(preflight::host::service_probe))]
    ServiceProbe { context: String },

    /// Network adapter listing failed
    #[error("Failed to enumerate network adapters")]
    #[diagnostic(code(preflight::host::adapters))]
    AdapterEnumeration {
        #[source]
        source: std::io::Error,
    },

    /// Virtual switch could not be created
    #[error("Failed to create virtual switch {name}: {context}")]
    #[diagnostic(
        code(preflight::host::switch_create),
        help("The adapter may already be enslaved to another bridge")
    )]
    SwitchCreate { name: String, context: String },

    /// Host resource metrics could not be read
    #[error("Failed to read host metrics: {context}")]
    #[diagnostic(code(preflight::host::metrics))]
    Metrics { context: String },

    /// A host tool invocation returned a failure status
    #[error("Host command `{command}` failed: {stderr}")]
    #[diagnostic(code(preflight::host::command))]
    CommandFailed { command: String, stderr: String },

    /// Failed to read system information
    #[error("Failed to read system information: {context}")]
    #[diagnostic(code(preflight::host::read_failed))]
    ReadFailed {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors preparing the workspace folder.
#[derive(Error, Debug, Diagnostic)]
pub enum WorkspaceError {
    /// Neither candidate volume exists
    #[error("No usable volume: neither {preferred} nor {fallback} exists")]
    #[diagnostic(
        code(preflight::workspace::no_volume),
        help("Mount a data volume or pass --workspace-root")
    )]
    NoVolume { preferred: String, fallback: String },

    /// Workspace folder could not be created
    #[error("Failed to create workspace folder {path}")]
    #[diagnostic(code(preflight::workspace::create))]
    CreateFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Workspace path contains whitespace
    #[error("Workspace path contains whitespace: {path}")]
    #[diagnostic(
        code(preflight::workspace::whitespace),
        help("The lab provisioning tool fails on such paths; choose another folder")
    )]
    WhitespaceInPath { path: String },

    /// Access-control metadata could not be read
    #[error("Failed to read permissions for {path}")]
    #[diagnostic(code(preflight::workspace::permissions))]
    PermissionProbe {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;
