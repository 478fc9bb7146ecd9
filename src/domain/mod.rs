//! Domain model for profd
//!
//! Core identifier newtypes, sample payloads, and the structured error
//! taxonomy shared by the session-control and read paths.

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{
    AppId, Pid, SnapshotThread, ThreadActivity, ThreadSample, ThreadSnapshot, ThreadState, Tid,
    Timestamp, TraceId, UsageSample,
};

pub use errors::{EngineError, ProfilingError, WatchError};
