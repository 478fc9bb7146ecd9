//! Backend trace engines and the closed dispatch over them
//!
//! Heavy profiling runs on exactly one of three engine kinds per session:
//! a sampling profiler, a system-wide trace engine, or the runtime's own
//! default engine (which internally selects sampled vs. instrumented
//! tracing). The set is closed: selection is a tagged-variant dispatch, not
//! open plugin lookup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::domain::{AppId, EngineError, Pid};

/// Which engine serves a profiling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// Hardware-counter sampling profiler (per-app call stacks).
    SamplingProfiler,
    /// System-wide trace capture.
    SystemTrace,
    /// The runtime's built-in engine; honors [`TraceMode`].
    Runtime,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SamplingProfiler => "sampling-profiler",
            Self::SystemTrace => "system-trace",
            Self::Runtime => "runtime",
        };
        write!(f, "{name}")
    }
}

/// Sub-mode of the [`BackendKind::Runtime`] engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TraceMode {
    #[default]
    Sampled,
    Instrumented,
}

/// Everything a start call carries, snapshotted by the registry at start
/// time: the process may die before stop, so stop must be able to recover
/// the backend kind without re-querying the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    pub pid: Pid,
    pub backend: BackendKind,
    pub mode: TraceMode,
    pub sampling_interval_us: i32,
    /// ABI/CPU architecture hint for engines that record per-arch.
    pub abi_arch: String,
}

/// Outcome of a successful start: where the engine stages its capture.
pub type StagingPath = PathBuf;

/// Start/stop contract each backend engine fulfils.
///
/// `start` returns the staging path the engine will capture into; `stop`
/// finalizes the capture when `want_trace` is set, or just tears the
/// session down when it is not. Call duration is whatever the engine takes;
/// no cancellation exists at this layer.
pub trait TraceEngine: Send + Sync {
    fn start(&self, app_id: &AppId, request: &StartRequest) -> Result<StagingPath, EngineError>;
    fn stop(&self, app_id: &AppId, want_trace: bool) -> Result<(), EngineError>;
}

/// Owns one engine per [`BackendKind`] and selects exactly one per call.
pub struct BackendDispatcher {
    sampling_profiler: Box<dyn TraceEngine>,
    system_trace: Box<dyn TraceEngine>,
    runtime: Box<dyn TraceEngine>,
}

impl BackendDispatcher {
    #[must_use]
    pub fn new(
        sampling_profiler: Box<dyn TraceEngine>,
        system_trace: Box<dyn TraceEngine>,
        runtime: Box<dyn TraceEngine>,
    ) -> Self {
        Self { sampling_profiler, system_trace, runtime }
    }

    /// The engine serving `kind`.
    #[must_use]
    pub fn engine_for(&self, kind: BackendKind) -> &dyn TraceEngine {
        match kind {
            BackendKind::SamplingProfiler => self.sampling_profiler.as_ref(),
            BackendKind::SystemTrace => self.system_trace.as_ref(),
            BackendKind::Runtime => self.runtime.as_ref(),
        }
    }
}

impl fmt::Debug for BackendDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendDispatcher").finish_non_exhaustive()
    }
}
