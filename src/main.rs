//! Headless smoke binary: sample one process's CPU usage from `/proc`,
//! pump the samples through the production channel/collector pair, and
//! print them as JSON lines.
//!
//! This is the wiring harness for the library core, not a transport: it
//! exists to exercise the sampling data path end to end on a live process.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use profd::channel::SampleChannel;
use profd::collector::Collector;
use profd::domain::{Pid, Timestamp, UsageSample};
use profd::ports::{Clock, SampleSink, SystemClock};

#[derive(Parser)]
#[command(
    name = "profd",
    about = "Sample a process's CPU usage and stream it as JSON lines",
    after_help = "\
EXAMPLES:
    profd --pid 1234                         Sample until interrupted
    profd --pid 1234 --duration 10           Sample for 10 seconds
    profd --pid 1234 --capacity 512          Bound the sample buffer"
)]
struct Args {
    /// Process ID to sample
    #[arg(short, long)]
    pid: i32,

    /// Sampling interval in milliseconds
    #[arg(long, default_value = "200")]
    interval_ms: u64,

    /// Stop after N seconds (0 = until the process disappears)
    #[arg(long, default_value = "0")]
    duration: u64,

    /// Channel capacity; oldest samples are dropped once full (0 = unbounded)
    #[arg(long, default_value = "0")]
    capacity: usize,
}

/// Prints each sample as one JSON object per line.
struct JsonLineSink;

impl SampleSink<UsageSample> for JsonLineSink {
    fn accept(&self, sample: UsageSample) {
        match serde_json::to_string(&sample) {
            Ok(line) => {
                let mut stdout = std::io::stdout().lock();
                if writeln!(stdout, "{line}").is_err() {
                    log::warn!("stdout closed, dropping sample");
                }
            }
            Err(err) => log::warn!("could not serialize sample: {err}"),
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let pid = Pid(args.pid);

    let channel = Arc::new(if args.capacity > 0 {
        SampleChannel::bounded(args.capacity)
    } else {
        SampleChannel::unbounded()
    });
    let collector = Collector::spawn(
        Arc::clone(&channel),
        Arc::new(JsonLineSink) as Arc<dyn SampleSink<UsageSample>>,
    )
    .context("failed to spawn the sample collector")?;

    let clock = SystemClock;
    let ticks_per_sec = clock_ticks_per_sec();
    let interval = Duration::from_millis(args.interval_ms.max(1));
    let started = Instant::now();
    log::info!("sampling {pid} every {}ms", args.interval_ms.max(1));

    loop {
        match read_usage(pid, ticks_per_sec, &clock, started.elapsed()) {
            Ok(sample) => {
                channel.push(sample);
            }
            Err(err) => {
                log::info!("stopping: {err:#}");
                break;
            }
        }

        if args.duration > 0 && started.elapsed() >= Duration::from_secs(args.duration) {
            break;
        }
        std::thread::sleep(interval);
    }

    let forwarded = collector.shutdown();
    log::info!("forwarded {forwarded} samples for {pid}");
    Ok(())
}

/// One usage measurement from `/proc/<pid>/stat` (utime + stime) and the
/// aggregate cpu line of `/proc/stat`. `elapsed` is how long this sampling
/// run has been going.
fn read_usage(
    pid: Pid,
    ticks_per_sec: i64,
    clock: &SystemClock,
    elapsed: Duration,
) -> Result<UsageSample> {
    let stat_path = format!("/proc/{}/stat", pid.0);
    let stat = fs::read_to_string(&stat_path).with_context(|| format!("cannot read {stat_path}"))?;
    let (utime, stime) = parse_proc_ticks(&stat)?;

    let system = fs::read_to_string("/proc/stat").context("cannot read /proc/stat")?;
    let cpu_line = system.lines().next().context("empty /proc/stat")?;
    let system_ticks: i64 =
        cpu_line.split_whitespace().skip(1).filter_map(|f| f.parse::<i64>().ok()).sum();

    Ok(usage_sample(clock.now(), elapsed, utime + stime, system_ticks, ticks_per_sec))
}

/// utime and stime from a `/proc/<pid>/stat` line.
fn parse_proc_ticks(stat: &str) -> Result<(i64, i64)> {
    // Fields after the parenthesized comm: state(0) ... utime(11) stime(12).
    let after_comm =
        stat.rfind(')').map(|i| &stat[i + 1..]).context("invalid /proc stat format")?;
    let fields: Vec<&str> = after_comm.split_whitespace().collect();
    let utime: i64 = fields.get(11).context("missing utime")?.parse()?;
    let stime: i64 = fields.get(12).context("missing stime")?.parse()?;
    Ok((utime, stime))
}

fn usage_sample(
    now: Timestamp,
    elapsed: Duration,
    app_ticks: i64,
    system_ticks: i64,
    ticks_per_sec: i64,
) -> UsageSample {
    UsageSample {
        end_timestamp: now,
        app_cpu_time_ms: ticks_to_ms(app_ticks, ticks_per_sec),
        system_cpu_time_ms: ticks_to_ms(system_ticks, ticks_per_sec),
        elapsed_time_ms: i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX),
    }
}

fn ticks_to_ms(ticks: i64, ticks_per_sec: i64) -> i64 {
    ticks * 1000 / ticks_per_sec.max(1)
}

#[allow(unsafe_code)]
fn clock_ticks_per_sec() -> i64 {
    // SAFETY: sysconf has no memory-safety preconditions.
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks > 0 {
        ticks
    } else {
        100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_proc_ticks() {
        // comm can contain parentheses; fields after the last ')' count.
        let stat = "1234 (my (odd) app) S 1 1234 1234 0 -1 4194304 \
                    100 0 5 0 842 311 0 0 20 0 8 0 12345 0 0";
        assert_eq!(parse_proc_ticks(stat).unwrap(), (842, 311));
    }

    #[test]
    fn test_elapsed_is_run_relative_not_epoch() {
        let sample = usage_sample(
            Timestamp(1_700_000_000_000_000_000), // epoch-scale nanoseconds
            Duration::from_millis(2_500),
            200,
            1_000,
            100,
        );
        assert_eq!(sample.elapsed_time_ms, 2_500);
        assert_eq!(sample.app_cpu_time_ms, 2_000);
        assert_eq!(sample.system_cpu_time_ms, 10_000);
    }
}
