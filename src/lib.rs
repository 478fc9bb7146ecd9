//! # profd: sampling-and-control core of an on-device profiling daemon
//!
//! profd continuously moves sampled performance data from background
//! collector threads to queryable storage, and separately orchestrates
//! start/stop of heavier, on-demand profiling sessions against one of
//! several backend engines per monitored application process.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  background producers                        │
//! │        (usage sampler, thread monitor: external)             │
//! └───────────────────────────┬──────────────────────────────────┘
//!                             │ push (never blocks, drop-oldest)
//!                             ▼
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐
//! │ SampleChannel│──▶│  Collector   │──▶│  Data Cache (port)   │
//! │   (channel)  │   │ (consumer)   │   │  queried by window   │
//! └──────────────┘   └──────────────┘   └──────────┬───────────┘
//!                                                  │ retrieve/threads
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      ProfilerService                         │
//! │  read path: GetData / GetThreads  ◀──────────────────────────┤
//! │  control path: Start/StopMonitoring, Start/Stop/Query        │
//! │                profiling                                     │
//! │        │                                                     │
//! │        ▼                                                     │
//! │  ┌───────────────┐      ┌─────────────────────────────┐     │
//! │  │SessionRegistry│      │     BackendDispatcher       │     │
//! │  │ (one session  │      │ sampling-profiler │ system- │     │
//! │  │  per app)     │      │ trace │ runtime (2 modes)   │     │
//! │  └───────────────┘      └─────────────────────────────┘     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`channel`]: the bounded/unbounded blocking producer-consumer queue
//! - [`collector`]: the consumer thread draining a channel into a sink
//! - [`session`]: per-application session bookkeeping and the trace slot
//! - [`backend`]: the closed set of trace engines and dispatch over them
//! - [`service`]: the controller composing registry, dispatcher, and ports
//! - [`ports`]: collaborator contracts (data cache, watchers, clock, sink)
//! - [`process_lookup`]: pid → application identifier resolution
//! - [`domain`]: identifier newtypes, sample payloads, error taxonomy
//!
//! ## Lifecycle guarantees
//!
//! - At most one heavy-profiling session per application at any time.
//! - Stop/cleanup always returns the application to Idle, success or
//!   failure, even when the monitored process died mid-session (the start
//!   request is snapshotted so the backend kind never has to be re-queried).
//! - Monitoring stop unconditionally cleans up any session left behind.

pub mod backend;
pub mod channel;
pub mod collector;
pub mod domain;
pub mod ports;
pub mod process_lookup;
pub mod service;
pub mod session;
