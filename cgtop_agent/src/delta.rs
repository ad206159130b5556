//! Previous-sample bookkeeping: turns monotonic raw counters into rates.
//!
//! Owned by the scanner alone; sessions never see it.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct DeltaTracker {
    /// Last usage counter per node and when it was read.
    cpu_prev: HashMap<PathBuf, (u64, Instant)>,
    net_prev: Option<u64>,
}

impl DeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// CPU usage of `key` since it was last sampled, in percent of one core
    /// (microseconds of CPU per microsecond of wall time, times 100).
    ///
    /// Wall time is measured from the previous observation of this key, so a
    /// node skipped for several ticks or a late tick still yields the true
    /// rate. `fallback` is used only when no time has elapsed.
    ///
    /// The first observation of a key only records the baseline and reports 0.
    /// A counter that went backwards (node recreated under the same path) is
    /// reported as 0, never negative.
    pub fn cpu_percent(
        &mut self,
        key: &Path,
        usage_usec: u64,
        now: Instant,
        fallback: Duration,
    ) -> f64 {
        let (prev, then) = match self.cpu_prev.get_mut(key) {
            Some(entry) => std::mem::replace(entry, (usage_usec, now)),
            None => {
                self.cpu_prev.insert(key.to_path_buf(), (usage_usec, now));
                return 0.0;
            }
        };
        let elapsed = now.saturating_duration_since(then);
        let wall = if elapsed.is_zero() { fallback } else { elapsed };
        let wall_usec = wall.as_micros() as f64;
        if wall_usec <= 0.0 {
            return 0.0;
        }
        usage_usec.saturating_sub(prev) as f64 / wall_usec * 100.0
    }

    /// Bytes moved since the previous tick on the global network counter.
    pub fn net_delta(&mut self, total_bytes: u64) -> u64 {
        match self.net_prev.replace(total_bytes) {
            Some(prev) => total_bytes.saturating_sub(prev),
            None => 0,
        }
    }

    /// Drop CPU baselines for paths not seen in the latest scan.
    pub fn retain_seen(&mut self, seen: &HashSet<PathBuf>) {
        self.cpu_prev.retain(|k, _| seen.contains(k));
    }

    /// Forget every baseline; the next observation of each key reports 0.
    pub fn reset(&mut self) {
        self.cpu_prev.clear();
        self.net_prev = None;
    }

    pub fn len(&self) -> usize {
        self.cpu_prev.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cpu_prev.is_empty()
    }
}
