/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Process self-observation for the benchmark report: a sampling thread-count
//! monitor and the memory high-water marks from `/proc/self/status`.
//!
//! Both observers are owned by the driver and passed nothing global; on
//! platforms without procfs they degrade to reporting nothing.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread::JoinHandle,
    time::Duration,
};

const SAMPLE_INTERVAL: Duration = Duration::from_millis(10);

/// Samples the process thread count until stopped, retaining the peak.
///
/// The peak includes the sampling thread itself; [`ThreadMonitor::stop`]
/// subtracts it so the report reflects the observed workload.
#[derive(Debug)]
pub struct ThreadMonitor {
    stop: Arc<AtomicBool>,
    peak: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl ThreadMonitor {
    /// Spawn the sampling thread and begin monitoring.
    pub fn start() -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let peak = Arc::new(AtomicUsize::new(1));

        let handle = std::thread::spawn({
            let stop = Arc::clone(&stop);
            let peak = Arc::clone(&peak);
            move || {
                while !stop.load(Ordering::Relaxed) {
                    if let Some(current) = current_thread_count() {
                        peak.fetch_max(current, Ordering::Relaxed);
                    }
                    std::thread::sleep(SAMPLE_INTERVAL);
                }
            }
        });

        Self { stop, peak, handle }
    }

    /// Stop sampling and return the peak thread count, excluding the monitor.
    pub fn stop(self) -> usize {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.handle.join();
        self.peak.load(Ordering::Relaxed).saturating_sub(1)
    }
}

/// The `Threads:` value from `/proc/self/status`, when available.
pub fn current_thread_count() -> Option<usize> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    status
        .lines()
        .find_map(|line| line.strip_prefix("Threads:"))
        .and_then(|rest| rest.trim().parse().ok())
}

/// Print the `VmPeak:` and `VmHWM:` lines of the process self-report.
pub fn print_memory_footprint() {
    let Ok(status) = std::fs::read_to_string("/proc/self/status") else {
        return;
    };
    for line in status.lines() {
        if line.starts_with("VmPeak:") || line.starts_with("VmHWM:") {
            println!("{line}");
        }
    }
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(target_os = "linux")]
    fn thread_count_is_positive() {
        assert!(current_thread_count().unwrap() >= 1);
    }

    #[test]
    fn monitor_observes_spawned_threads() {
        let monitor = ThreadMonitor::start();

        // Hold a few extra threads alive across at least one sample interval.
        let workers: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| std::thread::sleep(Duration::from_millis(100))))
            .collect();
        std::thread::sleep(Duration::from_millis(50));
        for worker in workers {
            worker.join().unwrap();
        }

        let peak = monitor.stop();
        if cfg!(target_os = "linux") {
            // Main thread plus four workers, at minimum.
            assert!(peak >= 5, "peak {peak} too low");
        }
    }
}
