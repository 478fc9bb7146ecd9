//! Session registry: per-application heavy-profiling bookkeeping
//!
//! One cohesive structure holds everything a session leaves behind (the
//! pid→app mapping, the start timestamp, the snapshotted start request, the
//! engine's staging path) plus the daemon-wide [`TraceSlot`]. The registry
//! holds no lock of its own; [`ProfilerService`](crate::service::ProfilerService)
//! owns it behind a single mutex so every lifecycle transition is atomic
//! with respect to concurrent queries of the same application.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::backend::{StagingPath, StartRequest};
use crate::domain::{AppId, Pid, Timestamp};

/// Facts recorded for one active session.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub started_at: Timestamp,
    pub request: StartRequest,
    pub staging_path: StagingPath,
}

/// The single daemon-wide pointer to the most recently staged trace file.
///
/// Non-empty iff a trace is staged. Sessions own their staging paths; the
/// slot only remembers the last one so a forced cleanup with no matching
/// session can still discard a stale capture.
#[derive(Debug, Default)]
pub struct TraceSlot {
    path: Option<PathBuf>,
}

impl TraceSlot {
    pub fn stage(&mut self, path: PathBuf) {
        self.path = Some(path);
    }

    #[must_use]
    pub fn staged(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn clear(&mut self) {
        self.path = None;
    }

    /// Clear the slot if it points at `path`.
    pub fn clear_if(&mut self, path: &Path) {
        if self.path.as_deref() == Some(path) {
            self.path = None;
        }
    }
}

/// Per-application session state: Idle (no record) or Profiling (a record
/// exists). A session exists for an application iff a start-request
/// snapshot is recorded for it.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    app_by_pid: HashMap<Pid, AppId>,
    sessions: HashMap<AppId, SessionRecord>,
    trace_slot: TraceSlot,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful start: pid→app, the session record, and the
    /// staged path in the daemon-wide slot.
    pub fn begin(&mut self, pid: Pid, app: AppId, record: SessionRecord) {
        self.trace_slot.stage(record.staging_path.clone());
        self.app_by_pid.insert(pid, app.clone());
        self.sessions.insert(app, record);
    }

    #[must_use]
    pub fn app_for(&self, pid: Pid) -> Option<&AppId> {
        self.app_by_pid.get(&pid)
    }

    #[must_use]
    pub fn session(&self, app: &AppId) -> Option<&SessionRecord> {
        self.sessions.get(app)
    }

    #[must_use]
    pub fn is_profiling(&self, app: &AppId) -> bool {
        self.sessions.contains_key(app)
    }

    /// Erase every trace of the session for `pid`/`app` and delete its
    /// staged file. The application is Idle afterwards no matter what.
    pub fn end(&mut self, pid: Pid, app: &AppId) {
        self.app_by_pid.remove(&pid);
        if let Some(record) = self.sessions.remove(app) {
            remove_staged_file(&record.staging_path);
            self.trace_slot.clear_if(&record.staging_path);
        }
    }

    /// Drop the pid→app mapping without touching the session record. Used
    /// when bookkeeping is found inconsistent and must fail closed.
    pub fn evict_pid(&mut self, pid: Pid) {
        self.app_by_pid.remove(&pid);
    }

    /// Discard a genuinely stale staged trace, if any, and clear the slot.
    /// Returns the path it deleted. A staged path still owned by a live
    /// session is left alone (slot included): that session's stop must be
    /// able to read its own capture back.
    pub fn discard_staged_trace(&mut self) -> Option<PathBuf> {
        let staged = self.trace_slot.staged()?.to_path_buf();
        if self.sessions.values().any(|r| r.staging_path == staged) {
            return None;
        }
        remove_staged_file(&staged);
        self.trace_slot.clear();
        Some(staged)
    }

    #[must_use]
    pub fn staged_trace(&self) -> Option<&Path> {
        self.trace_slot.staged()
    }
}

/// Best-effort removal; the file may never have been created if the engine
/// failed between staging and capture.
fn remove_staged_file(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            log::warn!("could not remove staged trace {}: {err}", path.display());
        }
    }
}
