//! Read-path assembly of thread/activity samples
//!
//! Turns a time-windowed [`ThreadsQuery`] from the data cache into the
//! response shape callers expect: one best-effort initial snapshot plus
//! per-thread activity histories, ordered by ascending thread id.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::{ThreadSnapshot, ThreadState, Tid, Timestamp};
use crate::ports::ThreadsQuery;

/// A state change in a thread's activity history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActivityEvent {
    pub timestamp: Timestamp,
    pub new_state: ThreadState,
}

/// One thread's activity history within the queried window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadReport {
    pub tid: Tid,
    pub name: String,
    pub activities: Vec<ActivityEvent>,
}

/// Response to a threads query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThreadsResponse {
    pub initial_snapshot: Option<ThreadSnapshot>,
    /// Ascending by tid.
    pub threads: Vec<ThreadReport>,
}

/// Assemble the response for a thread query window.
///
/// The initial snapshot is the cache's own snapshot when it names at least
/// one thread; otherwise the snapshot embedded in the earliest sample, if
/// any sample exists. Activities are grouped by tid across all samples,
/// keeping the first-seen name per thread and the occurrence order of
/// events within each thread.
#[must_use]
pub fn assemble(query: ThreadsQuery) -> ThreadsResponse {
    let ThreadsQuery { snapshot, samples } = query;

    let initial_snapshot = if snapshot.threads.is_empty() {
        samples.first().map(|sample| sample.snapshot.clone())
    } else {
        Some(snapshot)
    };

    // BTreeMap keeps the final thread list ordered by ascending tid.
    let mut threads: BTreeMap<Tid, ThreadReport> = BTreeMap::new();
    for sample in &samples {
        for activity in &sample.activities {
            let report = threads.entry(activity.tid).or_insert_with(|| ThreadReport {
                tid: activity.tid,
                name: activity.name.clone(),
                activities: Vec::new(),
            });
            report.activities.push(ActivityEvent {
                timestamp: activity.timestamp,
                new_state: activity.state,
            });
        }
    }

    ThreadsResponse { initial_snapshot, threads: threads.into_values().collect() }
}
