//! End-to-end session lifecycle tests against fake collaborators.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use profd::backend::{BackendDispatcher, BackendKind, StartRequest, TraceEngine, TraceMode};
use profd::domain::{AppId, EngineError, Pid, ProfilingError, Timestamp, TraceId, WatchError};
use profd::ports::{Clock, DataCache, ProcessWatcher, ThreadsQuery};
use profd::process_lookup::ProcessLookup;
use profd::service::{ProfilerService, StopResponse};
use tempfile::TempDir;

#[derive(Default)]
struct FakeCache {
    slots: Mutex<HashSet<i32>>,
    capacity: usize,
    canned_threads: Mutex<ThreadsQuery>,
}

impl FakeCache {
    fn with_capacity(capacity: usize) -> Self {
        Self { capacity, ..Self::default() }
    }

    fn allocated(&self, pid: Pid) -> bool {
        self.slots.lock().unwrap().contains(&pid.0)
    }
}

impl DataCache for FakeCache {
    fn allocate(&self, pid: Pid) -> bool {
        let mut slots = self.slots.lock().unwrap();
        if slots.len() >= self.capacity {
            return false;
        }
        slots.insert(pid.0);
        true
    }

    fn deallocate(&self, pid: Pid) {
        self.slots.lock().unwrap().remove(&pid.0);
    }

    fn retrieve(
        &self,
        _pid: Pid,
        _from: Timestamp,
        _to: Timestamp,
    ) -> Vec<profd::domain::UsageSample> {
        Vec::new()
    }

    fn threads(&self, _pid: Pid, _from: Timestamp, _to: Timestamp) -> ThreadsQuery {
        self.canned_threads.lock().unwrap().clone()
    }
}

#[derive(Default)]
struct FakeWatcher {
    added: Mutex<Vec<i32>>,
    removed: Mutex<Vec<i32>>,
    fail_add: AtomicBool,
}

impl ProcessWatcher for FakeWatcher {
    fn add_process(&self, pid: Pid) -> Result<(), WatchError> {
        if self.fail_add.load(Ordering::Relaxed) {
            return Err(WatchError::from("watcher refused the process"));
        }
        self.added.lock().unwrap().push(pid.0);
        Ok(())
    }

    fn remove_process(&self, pid: Pid) -> Result<(), WatchError> {
        self.removed.lock().unwrap().push(pid.0);
        Ok(())
    }
}

#[derive(Default)]
struct FakeLookup {
    apps: Mutex<HashMap<i32, String>>,
}

impl FakeLookup {
    fn register(&self, pid: Pid, app: &str) {
        self.apps.lock().unwrap().insert(pid.0, app.to_string());
    }

    fn kill(&self, pid: Pid) {
        self.apps.lock().unwrap().remove(&pid.0);
    }
}

impl ProcessLookup for FakeLookup {
    fn resolve(&self, pid: Pid) -> Option<AppId> {
        self.apps.lock().unwrap().get(&pid.0).map(|app| AppId::new(app.clone()))
    }
}

struct FakeClock(AtomicI64);

impl Clock for FakeClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.0.fetch_add(10, Ordering::Relaxed))
    }
}

struct FakeEngine {
    name: &'static str,
    dir: PathBuf,
    payload: &'static [u8],
    fail_start: AtomicBool,
    fail_stop: AtomicBool,
    stops: Mutex<Vec<(String, bool)>>,
}

impl FakeEngine {
    fn new(name: &'static str, dir: &TempDir, payload: &'static [u8]) -> Arc<Self> {
        Arc::new(Self {
            name,
            dir: dir.path().to_path_buf(),
            payload,
            fail_start: AtomicBool::new(false),
            fail_stop: AtomicBool::new(false),
            stops: Mutex::new(Vec::new()),
        })
    }

    fn staging_path(&self) -> PathBuf {
        self.dir.join(format!("{}.trace", self.name))
    }

    fn stops(&self) -> Vec<(String, bool)> {
        self.stops.lock().unwrap().clone()
    }
}

struct SharedEngine(Arc<FakeEngine>);

impl TraceEngine for SharedEngine {
    fn start(&self, _app: &AppId, _request: &StartRequest) -> Result<PathBuf, EngineError> {
        if self.0.fail_start.load(Ordering::Relaxed) {
            return Err(EngineError::from("engine failed to start"));
        }
        let path = self.0.staging_path();
        fs::write(&path, self.0.payload).expect("fake engine stages a file");
        Ok(path)
    }

    fn stop(&self, app: &AppId, want_trace: bool) -> Result<(), EngineError> {
        self.0.stops.lock().unwrap().push((app.as_str().to_string(), want_trace));
        if self.0.fail_stop.load(Ordering::Relaxed) {
            return Err(EngineError::from("engine failed to stop"));
        }
        Ok(())
    }
}

struct Harness {
    service: ProfilerService,
    cache: Arc<FakeCache>,
    usage: Arc<FakeWatcher>,
    monitor: Arc<FakeWatcher>,
    lookup: Arc<FakeLookup>,
    sampling: Arc<FakeEngine>,
    systrace: Arc<FakeEngine>,
    runtime: Arc<FakeEngine>,
    _dir: TempDir,
}

fn harness() -> Harness {
    harness_with_cache(FakeCache::with_capacity(8))
}

fn harness_with_cache(cache: FakeCache) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(cache);
    let usage = Arc::new(FakeWatcher::default());
    let monitor = Arc::new(FakeWatcher::default());
    let lookup = Arc::new(FakeLookup::default());
    let sampling = FakeEngine::new("sampling", &dir, b"sampling-profile-bytes");
    let systrace = FakeEngine::new("systrace", &dir, b"system-trace-bytes");
    let runtime = FakeEngine::new("runtime", &dir, b"runtime-trace-bytes");

    let dispatcher = BackendDispatcher::new(
        Box::new(SharedEngine(Arc::clone(&sampling))),
        Box::new(SharedEngine(Arc::clone(&systrace))),
        Box::new(SharedEngine(Arc::clone(&runtime))),
    );

    let service = ProfilerService::new(
        Arc::clone(&cache) as Arc<dyn DataCache>,
        Arc::clone(&usage) as Arc<dyn ProcessWatcher>,
        Arc::clone(&monitor) as Arc<dyn ProcessWatcher>,
        Arc::clone(&lookup) as Arc<dyn ProcessLookup>,
        Arc::new(FakeClock(AtomicI64::new(1_000))),
        dispatcher,
    );

    Harness {
        service,
        cache,
        usage,
        monitor,
        lookup,
        sampling,
        systrace,
        runtime,
        _dir: dir,
    }
}

fn request(pid: i32, backend: BackendKind) -> StartRequest {
    StartRequest {
        pid: Pid(pid),
        backend,
        mode: TraceMode::Sampled,
        sampling_interval_us: 1_000,
        abi_arch: "arm64".to_string(),
    }
}

#[test]
fn test_start_then_stop_returns_trace_and_idles() {
    let h = harness();
    h.lookup.register(Pid(7), "com.example.game");

    h.service.start_profiling(request(7, BackendKind::SamplingProfiler)).unwrap();
    let staged = h.sampling.staging_path();
    let expected = fs::read(&staged).unwrap();

    let response = h.service.stop_profiling(Pid(7)).unwrap();
    assert_eq!(response.trace.as_deref(), Some(expected.as_slice()));
    assert_eq!(response.trace_id, Some(TraceId(1)));
    assert!(!staged.exists(), "staged file is deleted after stop");
    assert_eq!(h.sampling.stops(), vec![("com.example.game".to_string(), true)]);

    // Registry is Idle again: no start-request snapshot remains.
    assert!(!h.service.query_state(Pid(7)).being_profiled);
}

#[test]
fn test_stop_monitoring_cleans_up_active_session() {
    let h = harness();
    h.lookup.register(Pid(7), "com.example.game");

    h.service.start_monitoring(Pid(7)).unwrap();
    h.service.start_profiling(request(7, BackendKind::SystemTrace)).unwrap();
    let staged = h.systrace.staging_path();
    assert!(staged.exists());

    h.service.stop_monitoring(Pid(7)).unwrap();

    // Forced cleanup ran even though stop_profiling was never called.
    assert_eq!(h.systrace.stops(), vec![("com.example.game".to_string(), false)]);
    assert!(!staged.exists());
    assert!(!h.service.query_state(Pid(7)).being_profiled);
    assert!(!h.cache.allocated(Pid(7)));
    assert_eq!(*h.usage.removed.lock().unwrap(), vec![7]);
    assert_eq!(*h.monitor.removed.lock().unwrap(), vec![7]);
}

#[test]
fn test_untracked_stop_is_noop_and_spares_live_capture() {
    let h = harness();
    h.lookup.register(Pid(7), "com.example.game");

    h.service.start_profiling(request(7, BackendKind::Runtime)).unwrap();
    let staged = h.runtime.staging_path();
    assert!(staged.exists());

    // No session is tracked for pid 99: a non-error no-op. The staged
    // capture belongs to pid 7's live session and must survive.
    let response = h.service.stop_profiling(Pid(99)).unwrap();
    assert_eq!(response, StopResponse::default());
    assert!(staged.exists(), "live session's staged capture must not be discarded");

    // The live session still hands its own bytes back.
    let stopped = h.service.stop_profiling(Pid(7)).unwrap();
    assert_eq!(stopped.trace.as_deref(), Some(b"runtime-trace-bytes".as_slice()));
    assert!(!staged.exists());
}

#[test]
fn test_untracked_stop_with_nothing_staged_is_noop() {
    let h = harness();
    h.lookup.register(Pid(7), "com.example.game");

    // A full start/stop cycle leaves the registry Idle and the slot empty.
    h.service.start_profiling(request(7, BackendKind::Runtime)).unwrap();
    h.service.stop_profiling(Pid(7)).unwrap();

    let response = h.service.stop_profiling(Pid(99)).unwrap();
    assert_eq!(response, StopResponse::default());
    assert!(!h.service.query_state(Pid(7)).being_profiled);
}

#[test]
fn test_start_profiling_requires_running_process() {
    let h = harness();
    let err = h.service.start_profiling(request(12, BackendKind::SamplingProfiler)).unwrap_err();
    assert!(matches!(err, ProfilingError::NotRunning(Pid(12))));
    assert!(!h.service.query_state(Pid(12)).being_profiled);
}

#[test]
fn test_backend_start_failure_creates_no_session() {
    let h = harness();
    h.lookup.register(Pid(7), "com.example.game");
    h.sampling.fail_start.store(true, Ordering::Relaxed);

    let err = h.service.start_profiling(request(7, BackendKind::SamplingProfiler)).unwrap_err();
    assert!(err.to_string().contains("engine failed to start"));
    assert!(!h.service.query_state(Pid(7)).being_profiled);

    // And a stop afterwards is the untracked no-op.
    assert_eq!(h.service.stop_profiling(Pid(7)).unwrap(), StopResponse::default());
}

#[test]
fn test_backend_stop_failure_still_returns_to_idle() {
    let h = harness();
    h.lookup.register(Pid(7), "com.example.game");

    h.service.start_profiling(request(7, BackendKind::SamplingProfiler)).unwrap();
    let staged = h.sampling.staging_path();
    h.sampling.fail_stop.store(true, Ordering::Relaxed);

    let err = h.service.stop_profiling(Pid(7)).unwrap_err();
    assert!(err.to_string().contains("engine failed to stop"));
    assert!(!staged.exists(), "staged file is deleted even on failure");
    assert!(!h.service.query_state(Pid(7)).being_profiled);
}

#[test]
fn test_second_start_for_same_app_rejected() {
    let h = harness();
    h.lookup.register(Pid(7), "com.example.game");

    h.service.start_profiling(request(7, BackendKind::SamplingProfiler)).unwrap();
    let err = h.service.start_profiling(request(7, BackendKind::SystemTrace)).unwrap_err();
    assert!(matches!(err, ProfilingError::AlreadyProfiling(_)));

    // The original session is untouched.
    let state = h.service.query_state(Pid(7));
    assert!(state.being_profiled);
    assert_eq!(state.start_request.unwrap().backend, BackendKind::SamplingProfiler);
}

#[test]
fn test_stop_recovers_backend_from_snapshot_after_process_death() {
    let h = harness();
    h.lookup.register(Pid(7), "com.example.game");

    h.service.start_profiling(request(7, BackendKind::SystemTrace)).unwrap();
    // The process dies; live lookup no longer resolves it.
    h.lookup.kill(Pid(7));

    let response = h.service.stop_profiling(Pid(7)).unwrap();
    assert!(response.trace.is_some());
    assert_eq!(h.systrace.stops(), vec![("com.example.game".to_string(), true)]);
}

#[test]
fn test_query_state_reports_snapshot_and_timestamps() {
    let h = harness();
    h.lookup.register(Pid(7), "com.example.game");

    let mut req = request(7, BackendKind::Runtime);
    req.mode = TraceMode::Instrumented;
    h.service.start_profiling(req.clone()).unwrap();

    let state = h.service.query_state(Pid(7));
    assert!(state.being_profiled);
    assert_eq!(state.start_request, Some(req));
    let started = state.start_timestamp.unwrap();
    assert!(state.check_timestamp > started);
}

#[test]
fn test_trace_ids_are_monotonic() {
    let h = harness();
    h.lookup.register(Pid(7), "com.example.game");
    h.lookup.register(Pid(8), "com.example.maps");

    h.service.start_profiling(request(7, BackendKind::SamplingProfiler)).unwrap();
    let first = h.service.stop_profiling(Pid(7)).unwrap().trace_id.unwrap();

    h.service.start_profiling(request(8, BackendKind::SamplingProfiler)).unwrap();
    let second = h.service.stop_profiling(Pid(8)).unwrap().trace_id.unwrap();

    assert_eq!(first, TraceId(1));
    assert_eq!(second, TraceId(2));
}

#[test]
fn test_start_monitoring_exhausted_cache() {
    let h = harness_with_cache(FakeCache::with_capacity(0));
    let err = h.service.start_monitoring(Pid(7)).unwrap_err();
    assert!(matches!(err, ProfilingError::ResourceExhausted(Pid(7))));
    assert!(h.usage.added.lock().unwrap().is_empty());
}

#[test]
fn test_start_monitoring_rolls_back_on_watcher_failure() {
    let h = harness();
    h.monitor.fail_add.store(true, Ordering::Relaxed);

    let err = h.service.start_monitoring(Pid(7)).unwrap_err();
    assert!(matches!(err, ProfilingError::Registration { pid: Pid(7), .. }));

    // The cache slot and the usage-sampler registration were rolled back.
    assert!(!h.cache.allocated(Pid(7)));
    assert_eq!(*h.usage.added.lock().unwrap(), vec![7]);
    assert_eq!(*h.usage.removed.lock().unwrap(), vec![7]);
}

#[test]
fn test_get_threads_falls_back_to_first_sample_snapshot() {
    use profd::domain::{SnapshotThread, ThreadSample, ThreadSnapshot, ThreadState, Tid};

    let cache = FakeCache::with_capacity(8);
    let embedded = ThreadSnapshot {
        timestamp: Timestamp(50),
        threads: vec![SnapshotThread {
            tid: Tid(21),
            name: "render".to_string(),
            state: ThreadState::Running,
        }],
    };
    *cache.canned_threads.lock().unwrap() = ThreadsQuery {
        snapshot: ThreadSnapshot::default(), // cache's own snapshot names no threads
        samples: vec![ThreadSample { snapshot: embedded.clone(), activities: vec![] }],
    };

    let h = harness_with_cache(cache);
    let response = h.service.get_threads(Pid(7), Timestamp(0), Timestamp(100));
    assert_eq!(response.initial_snapshot, Some(embedded));
}
