use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use sysinfo::{CpuRefreshKind, System};
use thiserror::Error;

/// Hosts with a native load-average facility never need the fallback tracker.
pub const NATIVE_LOAD_API: bool = cfg!(not(windows));

const SAMPLE_INTERVAL: Duration = Duration::from_millis(250);
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Smoothing window for the derived load estimate.
const LOAD_DECAY: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("no CPU counters are visible to this process")]
    NoCpus,

    #[error("failed to spawn the sampling thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Read side of "current system load" as the logger sees it.
///
/// Reads are instant or absent; implementations never make the caller wait
/// for load data.
pub trait LoadSampler {
    fn load_average(&mut self) -> Option<f64>;

    /// Release any underlying sampling resource. Idempotent.
    fn shutdown(&mut self) {}
}

/// Queries the host's load-average facility directly.
pub struct NativeLoadSampler;

impl LoadSampler for NativeLoadSampler {
    fn load_average(&mut self) -> Option<f64> {
        let avg = System::load_average();
        // A negative one-minute average means the facility could not be read.
        (avg.one >= 0.0).then_some(avg.one)
    }
}

struct SharedSample {
    /// Bit pattern of the latest smoothed load. NaN until the first sample.
    load: AtomicU64,
    stop: AtomicBool,
}

/// Fallback sampler for hosts without a load-average facility.
///
/// A dedicated thread keeps a smoothed estimate of CPU demand warm;
/// `getloadavg` is a single atomic read.
pub struct PlatformLoadTracker {
    shared: Arc<SharedSample>,
    worker: Option<JoinHandle<()>>,
}

impl PlatformLoadTracker {
    pub fn start() -> Result<Self, TrackerError> {
        let mut system = System::new();
        system.refresh_cpu_specifics(CpuRefreshKind::everything());
        if system.cpus().is_empty() {
            return Err(TrackerError::NoCpus);
        }

        let shared = Arc::new(SharedSample {
            load: AtomicU64::new(f64::NAN.to_bits()),
            stop: AtomicBool::new(false),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("load-tracker".to_string())
            .spawn(move || sample_loop(system, worker_shared))?;

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Latest sample, or `None` before the first sample or after `close`.
    pub fn getloadavg(&self) -> Option<f64> {
        self.worker.as_ref()?;
        let load = f64::from_bits(self.shared.load.load(Ordering::Acquire));
        (!load.is_nan()).then_some(load)
    }

    /// Stop the sampling thread and release its handle. Idempotent.
    pub fn close(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.shared.stop.store(true, Ordering::Release);
        let _ = worker.join();
    }
}

impl Drop for PlatformLoadTracker {
    fn drop(&mut self) {
        self.close();
    }
}

fn sample_loop(mut system: System, shared: Arc<SharedSample>) {
    let alpha = 1.0 - (-SAMPLE_INTERVAL.as_secs_f64() / LOAD_DECAY.as_secs_f64()).exp();
    let mut smoothed = None;
    let mut since_sample = Duration::ZERO;

    while !shared.stop.load(Ordering::Acquire) {
        if since_sample >= SAMPLE_INTERVAL {
            since_sample = Duration::ZERO;
            system.refresh_cpu_usage();
            // Busy cores' worth of work, the same unit as a load average.
            let busy = system
                .cpus()
                .iter()
                .map(|cpu| f64::from(cpu.cpu_usage()))
                .sum::<f64>()
                / 100.0;
            let next = match smoothed {
                Some(previous) => previous + alpha * (busy - previous),
                None => busy,
            };
            smoothed = Some(next);
            shared.load.store(next.to_bits(), Ordering::Release);
        }
        std::thread::sleep(STOP_POLL_INTERVAL);
        since_sample += STOP_POLL_INTERVAL;
    }
}

/// Adapts an owned [`PlatformLoadTracker`] to the sampler interface.
pub struct TrackedLoadSampler {
    tracker: PlatformLoadTracker,
}

impl TrackedLoadSampler {
    pub fn new(tracker: PlatformLoadTracker) -> Self {
        Self { tracker }
    }
}

impl LoadSampler for TrackedLoadSampler {
    fn load_average(&mut self) -> Option<f64> {
        self.tracker.getloadavg()
    }

    fn shutdown(&mut self) {
        self.tracker.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_sampler_reports_current_load() {
        if !NATIVE_LOAD_API {
            return;
        }
        let mut sampler = NativeLoadSampler;
        assert!(sampler.load_average().is_some_and(|load| load >= 0.0));
    }

    #[test]
    fn tracker_produces_a_sample() {
        let mut tracker = PlatformLoadTracker::start().unwrap();
        std::thread::sleep(Duration::from_millis(1000));
        assert!(tracker.getloadavg().is_some_and(|load| load >= 0.0));
        tracker.close();
    }

    #[test]
    fn close_is_idempotent_and_forgets_samples() {
        let mut tracker = PlatformLoadTracker::start().unwrap();
        tracker.close();
        tracker.close();
        assert_eq!(tracker.getloadavg(), None);
    }

    #[test]
    fn shut_down_sampler_reports_absent() {
        let tracker = PlatformLoadTracker::start().unwrap();
        let mut sampler = TrackedLoadSampler::new(tracker);
        sampler.shutdown();
        sampler.shutdown();
        assert_eq!(sampler.load_average(), None);
    }
}
