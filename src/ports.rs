//! Collaborator contracts consumed by the session-control and read paths
//!
//! The core never implements these itself: per-process sample storage, the
//! concrete sampling algorithms, and wall-clock time all live behind these
//! traits so the service can be exercised with fakes and wired to real
//! collaborators by the daemon.

use crate::domain::{Pid, ThreadSample, ThreadSnapshot, Timestamp, UsageSample, WatchError};

/// A time-windowed thread query result from the data cache: a best-effort
/// initial snapshot plus the ordered per-sample activities in the window.
#[derive(Debug, Clone, Default)]
pub struct ThreadsQuery {
    pub snapshot: ThreadSnapshot,
    pub samples: Vec<ThreadSample>,
}

/// Per-process store of timestamped usage and thread samples, queried by
/// time window.
pub trait DataCache: Send + Sync {
    /// Allocate the per-process slot. Returns `false` when the cache cannot
    /// take another process.
    fn allocate(&self, pid: Pid) -> bool;

    /// Release the per-process slot and everything stored in it.
    fn deallocate(&self, pid: Pid);

    /// Usage samples for `pid` in `[from, to)`, oldest first.
    fn retrieve(&self, pid: Pid, from: Timestamp, to: Timestamp) -> Vec<UsageSample>;

    /// Thread snapshot and activity samples for `pid` in `[from, to)`.
    fn threads(&self, pid: Pid, from: Timestamp, to: Timestamp) -> ThreadsQuery;
}

/// A background sampler that can be pointed at a process: the CPU usage
/// sampler and the thread-state monitor both satisfy this contract.
pub trait ProcessWatcher: Send + Sync {
    fn add_process(&self, pid: Pid) -> Result<(), WatchError>;
    fn remove_process(&self, pid: Pid) -> Result<(), WatchError>;
}

/// Source of daemon timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// System clock reporting nanoseconds since the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let elapsed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX))
    }
}

/// Destination for samples drained from a channel by the collector thread.
pub trait SampleSink<T>: Send + Sync {
    fn accept(&self, sample: T);
}
