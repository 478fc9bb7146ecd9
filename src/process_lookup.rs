//! Resolve a PID to its application identifier via `/proc`.

use anyhow::{Context, Result};
use std::fs;

use crate::domain::{AppId, Pid};

/// Maps a process ID to the application identifier it runs as.
///
/// Resolution is live: a process that has died resolves to `None`, which is
/// why the session registry snapshots the start request instead of
/// re-querying at stop time.
pub trait ProcessLookup: Send + Sync {
    /// The application identifier for `pid`, or `None` if the process is
    /// not running (or has no readable cmdline).
    fn resolve(&self, pid: Pid) -> Option<AppId>;
}

/// `/proc/<pid>/cmdline`-backed lookup.
#[derive(Debug, Default, Clone, Copy)]
pub struct CmdlineLookup;

impl ProcessLookup for CmdlineLookup {
    fn resolve(&self, pid: Pid) -> Option<AppId> {
        match read_cmdline(pid) {
            Ok(cmdline) if !cmdline.is_empty() => Some(AppId::new(cmdline)),
            Ok(_) => None,
            Err(err) => {
                log::debug!("cmdline lookup for {pid} failed: {err:#}");
                None
            }
        }
    }
}

/// Read the first NUL-separated argument of `/proc/<pid>/cmdline`.
///
/// Zombie processes and kernel threads expose an empty cmdline; both are
/// reported as an empty string, which the caller treats as "not running".
fn read_cmdline(pid: Pid) -> Result<String> {
    let path = format!("/proc/{}/cmdline", pid.0);
    let raw = fs::read(&path).with_context(|| format!("cannot read {path}"))?;
    let first = raw.split(|b| *b == 0).next().unwrap_or(&[]);
    Ok(String::from_utf8_lossy(first).into_owned())
}
