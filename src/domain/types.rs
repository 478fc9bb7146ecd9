//! Domain types providing compile-time safety and self-documentation
//!
//! Newtype wrappers prevent common bugs like passing a TID where a PID is
//! expected, and make function signatures more expressive.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Process ID of a monitored application process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pid(pub i32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PID:{}", self.0)
    }
}

impl From<i32> for Pid {
    fn from(pid: i32) -> Self {
        Pid(pid)
    }
}

/// Thread ID assigned by the kernel, distinct from [`Pid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tid(pub i32);

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TID:{}", self.0)
    }
}

/// Monotonic daemon timestamp in nanoseconds, supplied by the
/// [`Clock`](crate::ports::Clock) port.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Timestamp(pub i64);

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

/// Identifier assigned to a captured trace when it is handed back to the
/// caller of a stop call. Allocated from a process-wide monotonic counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraceId(pub i32);

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trace#{}", self.0)
    }
}

/// Resolved application identifier (cmdline / package name) for a process.
///
/// An empty identifier never exists as an `AppId`: process lookup reports a
/// dead or unknown process as `None` instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppId(String);

impl AppId {
    /// Wrap a non-empty application identifier.
    ///
    /// # Panics
    /// Panics if `id` is empty; callers must map "not running" to the
    /// absence of an `AppId`, not an empty one.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        assert!(!id.is_empty(), "application identifier cannot be empty");
        Self(id)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AppId {
    fn from(s: &str) -> Self {
        AppId::new(s)
    }
}

/// One CPU usage measurement for a monitored process.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UsageSample {
    pub end_timestamp: Timestamp,
    pub app_cpu_time_ms: i64,
    pub system_cpu_time_ms: i64,
    pub elapsed_time_ms: i64,
}

/// Scheduler state of a thread, as reported by the thread monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadState {
    Running,
    Sleeping,
    Waiting,
    Stopped,
    Zombie,
    Dead,
    Unknown,
}

/// One thread as it appeared in a full snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotThread {
    pub tid: Tid,
    pub name: String,
    pub state: ThreadState,
}

/// A full picture of a process's threads at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    pub timestamp: Timestamp,
    pub threads: Vec<SnapshotThread>,
}

/// A state change observed for one thread between snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadActivity {
    pub tid: Tid,
    pub name: String,
    pub state: ThreadState,
    pub timestamp: Timestamp,
}

/// One thread-monitor sample: the snapshot it was derived from plus the
/// activities (state changes) detected since the previous sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadSample {
    pub snapshot: ThreadSnapshot,
    pub activities: Vec<ThreadActivity>,
}
