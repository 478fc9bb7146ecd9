//! Profiling controller: monitoring, session control, and read queries
//!
//! [`ProfilerService`] composes the session registry, the backend
//! dispatcher, and the external collaborators (data cache, usage sampler,
//! thread monitor, process lookup, clock) behind the service boundary the
//! transport layer exposes. Session-control operations for all applications
//! share one registry mutex, held across the backend call, so every
//! lifecycle transition is atomic with respect to concurrent queries.

pub mod threads;

pub use threads::{ActivityEvent, ThreadReport, ThreadsResponse};

use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::backend::{BackendDispatcher, StartRequest};
use crate::domain::{Pid, ProfilingError, Timestamp, TraceId, UsageSample};
use crate::ports::{Clock, DataCache, ProcessWatcher};
use crate::process_lookup::ProcessLookup;
use crate::session::{SessionRecord, SessionRegistry};

/// Result of a stop call. Both fields are set together: a trace is handed
/// back only when one was requested and the backend stop succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StopResponse {
    pub trace: Option<Vec<u8>>,
    pub trace_id: Option<TraceId>,
}

/// Answer to a profiling-state query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfilingStatus {
    pub being_profiled: bool,
    pub check_timestamp: Timestamp,
    pub start_timestamp: Option<Timestamp>,
    pub start_request: Option<StartRequest>,
}

/// The sampling-and-control core behind the daemon's service boundary.
pub struct ProfilerService {
    cache: Arc<dyn DataCache>,
    usage_sampler: Arc<dyn ProcessWatcher>,
    thread_monitor: Arc<dyn ProcessWatcher>,
    lookup: Arc<dyn ProcessLookup>,
    clock: Arc<dyn Clock>,
    backends: BackendDispatcher,
    sessions: Mutex<SessionRegistry>,
    next_trace_id: AtomicI32,
}

impl ProfilerService {
    #[must_use]
    pub fn new(
        cache: Arc<dyn DataCache>,
        usage_sampler: Arc<dyn ProcessWatcher>,
        thread_monitor: Arc<dyn ProcessWatcher>,
        lookup: Arc<dyn ProcessLookup>,
        clock: Arc<dyn Clock>,
        backends: BackendDispatcher,
    ) -> Self {
        Self {
            cache,
            usage_sampler,
            thread_monitor,
            lookup,
            clock,
            backends,
            sessions: Mutex::new(SessionRegistry::new()),
            next_trace_id: AtomicI32::new(1),
        }
    }

    fn lock_sessions(&self) -> MutexGuard<'_, SessionRegistry> {
        self.sessions.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Usage samples for `pid` in `[from, to)`.
    #[must_use]
    pub fn get_data(&self, pid: Pid, from: Timestamp, to: Timestamp) -> Vec<UsageSample> {
        self.cache.retrieve(pid, from, to)
    }

    /// Thread snapshot plus per-thread activity histories for the window.
    #[must_use]
    pub fn get_threads(&self, pid: Pid, from: Timestamp, to: Timestamp) -> ThreadsResponse {
        threads::assemble(self.cache.threads(pid, from, to))
    }

    /// Begin lightweight monitoring of `pid`: allocate its cache slot and
    /// register it with the usage sampler and the thread monitor.
    ///
    /// Partial failure rolls back every step that had already succeeded, so
    /// a failed start leaves no cache slot allocated and no registration
    /// behind.
    ///
    /// # Errors
    /// [`ProfilingError::ResourceExhausted`] if the cache refuses the slot;
    /// [`ProfilingError::Registration`] if either sampler refuses the
    /// process.
    pub fn start_monitoring(&self, pid: Pid) -> Result<(), ProfilingError> {
        if !self.cache.allocate(pid) {
            return Err(ProfilingError::ResourceExhausted(pid));
        }

        if let Err(source) = self.usage_sampler.add_process(pid) {
            self.cache.deallocate(pid);
            return Err(ProfilingError::Registration { pid, source });
        }

        if let Err(source) = self.thread_monitor.add_process(pid) {
            if let Err(err) = self.usage_sampler.remove_process(pid) {
                log::warn!("rollback of usage sampler for {pid} failed: {err}");
            }
            self.cache.deallocate(pid);
            return Err(ProfilingError::Registration { pid, source });
        }

        log::info!("monitoring started for {pid}");
        Ok(())
    }

    /// Stop monitoring `pid`: release its cache slot, unregister it from
    /// both watchers, and force cleanup of any heavy-profiling session still
    /// active for it. Monitoring stop never leaves a dangling session.
    ///
    /// # Errors
    /// [`ProfilingError::Registration`] if a watcher failed to unregister
    /// the process; forced cleanup still runs first.
    pub fn stop_monitoring(&self, pid: Pid) -> Result<(), ProfilingError> {
        self.cache.deallocate(pid);
        let sampler = self.usage_sampler.remove_process(pid);
        let monitor = self.thread_monitor.remove_process(pid);

        if let Err(err) = self.cleanup(pid, false) {
            log::warn!("forced session cleanup for {pid} failed: {err}");
        }

        log::info!("monitoring stopped for {pid}");
        sampler.and(monitor).map_err(|source| ProfilingError::Registration { pid, source })
    }

    /// Start a heavy-profiling session for `request.pid` on the backend the
    /// request names. On success the registry records the start timestamp, a
    /// full snapshot of the request, and the engine's staging path.
    ///
    /// # Errors
    /// [`ProfilingError::NotRunning`] if the pid resolves to no application;
    /// [`ProfilingError::AlreadyProfiling`] if the application already has a
    /// session; [`ProfilingError::Backend`] if the engine's start fails, in
    /// which case no session state is created.
    pub fn start_profiling(&self, request: StartRequest) -> Result<(), ProfilingError> {
        let pid = request.pid;
        let app = self.lookup.resolve(pid).ok_or(ProfilingError::NotRunning(pid))?;

        let mut sessions = self.lock_sessions();
        if sessions.is_profiling(&app) {
            return Err(ProfilingError::AlreadyProfiling(app));
        }

        let engine = self.backends.engine_for(request.backend);
        let staging_path = engine.start(&app, &request)?;
        let started_at = self.clock.now();

        log::info!("profiling started for {app} ({pid}) via {} backend", request.backend);
        sessions.begin(pid, app, SessionRecord { started_at, request, staging_path });
        Ok(())
    }

    /// Stop the session for `pid` and hand back the captured trace.
    ///
    /// A pid with no tracked session is a non-error no-op; if a stale trace
    /// no live session owns is still staged, it is deleted on the way out.
    /// For a tracked pid the registry returns to Idle afterwards, success
    /// or failure.
    ///
    /// # Errors
    /// [`ProfilingError::Backend`] with the engine's message if its stop
    /// fails; [`ProfilingError::TraceRead`] if the staged file cannot be
    /// read back; [`ProfilingError::InconsistentState`] if bookkeeping for
    /// `pid` is broken.
    pub fn stop_profiling(&self, pid: Pid) -> Result<StopResponse, ProfilingError> {
        self.cleanup(pid, true)
    }

    /// Whether `pid`'s application is being profiled, and since when.
    #[must_use]
    pub fn query_state(&self, pid: Pid) -> ProfilingStatus {
        let check_timestamp = self.clock.now();
        let idle = ProfilingStatus {
            being_profiled: false,
            check_timestamp,
            start_timestamp: None,
            start_request: None,
        };

        let Some(app) = self.lookup.resolve(pid) else {
            return idle;
        };

        let sessions = self.lock_sessions();
        match sessions.session(&app) {
            Some(record) => ProfilingStatus {
                being_profiled: true,
                check_timestamp,
                start_timestamp: Some(record.started_at),
                start_request: Some(record.request.clone()),
            },
            None => idle,
        }
    }

    /// Shared stop/cleanup path. The backend kind is recovered from the
    /// stored start-request snapshot; the process may already be dead and
    /// cannot be re-queried.
    fn cleanup(&self, pid: Pid, want_trace: bool) -> Result<StopResponse, ProfilingError> {
        let mut sessions = self.lock_sessions();

        let Some(app) = sessions.app_for(pid).cloned() else {
            if let Some(stale) = sessions.discard_staged_trace() {
                log::debug!("discarded stale staged trace {}", stale.display());
            }
            return Ok(StopResponse::default());
        };

        let Some(record) = sessions.session(&app).cloned() else {
            sessions.evict_pid(pid);
            let detail = format!("{pid} maps to {app} but no session record exists");
            log::error!("{detail}");
            return Err(ProfilingError::InconsistentState(detail));
        };

        let engine = self.backends.engine_for(record.request.backend);
        let stopped = engine.stop(&app, want_trace);

        let result = if want_trace {
            match stopped {
                Ok(()) => read_trace(&record.staging_path).map(|bytes| StopResponse {
                    trace: Some(bytes),
                    trace_id: Some(TraceId(self.next_trace_id.fetch_add(1, Ordering::Relaxed))),
                }),
                Err(err) => Err(ProfilingError::Backend(err)),
            }
        } else {
            if let Err(err) = stopped {
                log::warn!("backend stop during forced cleanup of {app} failed: {err}");
            }
            Ok(StopResponse::default())
        };

        // The application returns to Idle whatever the outcome above was.
        sessions.end(pid, &app);
        result
    }
}

fn read_trace(path: &Path) -> Result<Vec<u8>, ProfilingError> {
    fs::read(path)
        .map_err(|source| ProfilingError::TraceRead { path: path.to_path_buf(), source })
}
