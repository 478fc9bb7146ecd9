//! Structured error types for profd
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Every session-control failure is returned to the caller as a structured
//! value; none of these abort the daemon.

use super::types::{AppId, Pid};
use std::path::PathBuf;
use thiserror::Error;

/// Failure taxonomy for monitoring and profiling-session control.
#[derive(Error, Debug)]
pub enum ProfilingError {
    /// The data cache could not allocate a per-process slot.
    #[error("cannot allocate a sample cache for {0}")]
    ResourceExhausted(Pid),

    /// Process lookup resolved to nothing; the app is not running.
    #[error("{0} is not running")]
    NotRunning(Pid),

    /// A heavy-profiling session is already active for this application.
    #[error("a profiling session is already active for {0}")]
    AlreadyProfiling(AppId),

    /// A usage sampler or thread monitor refused to track the process.
    #[error("sampler registration failed for {pid}: {source}")]
    Registration {
        pid: Pid,
        #[source]
        source: WatchError,
    },

    /// A backend engine reported a start/stop failure.
    #[error("profiling backend failed: {0}")]
    Backend(#[from] EngineError),

    /// The staged trace file could not be read back.
    #[error("failed to read staged trace {path}: {source}")]
    TraceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Session bookkeeping violated an invariant. Logged and failed closed;
    /// shared state is dropped rather than trusted.
    #[error("inconsistent session state: {0}")]
    InconsistentState(String),
}

/// Error reported by a backend trace engine's start/stop contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct EngineError(pub String);

impl From<&str> for EngineError {
    fn from(msg: &str) -> Self {
        EngineError(msg.to_string())
    }
}

/// Error reported by a usage sampler or thread monitor registration call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct WatchError(pub String);

impl From<&str> for WatchError {
    fn from(msg: &str) -> Self {
        WatchError(msg.to_string())
    }
}
