//! Tree scanner: enumerates control-group directories, samples each one and
//! assembles an immutable [`Snapshot`].

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::trace;

use crate::delta::DeltaTracker;
use crate::paths;
use crate::source::CgroupFs;
use crate::state::Snapshot;
use crate::types::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Walk every descendant of the root each tick.
    Full,
    /// List only the children of directories sessions are looking at.
    Level,
}

impl std::str::FromStr for ScanMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(ScanMode::Full),
            "level" => Ok(ScanMode::Level),
            other => Err(format!("unknown scan mode '{other}' (expected full or level)")),
        }
    }
}

/// What one tick should visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanPlan {
    Full,
    Level {
        /// Directories whose immediate children are listed.
        cursors: BTreeSet<PathBuf>,
        /// Individual nodes sampled directly (focus targets).
        nodes: BTreeSet<PathBuf>,
    },
}

impl ScanPlan {
    pub fn level(cursor: impl Into<PathBuf>) -> Self {
        ScanPlan::Level {
            cursors: [cursor.into()].into_iter().collect(),
            nodes: BTreeSet::new(),
        }
    }
}

pub struct Scanner {
    root: PathBuf,
    source: CgroupFs,
    deltas: DeltaTracker,
    prune: bool,
    tick: u64,
}

impl Scanner {
    pub fn new(root: impl Into<PathBuf>, source: CgroupFs, prune: bool) -> Self {
        Self {
            root: root.into(),
            source,
            deltas: DeltaTracker::new(),
            prune,
            tick: 0,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Forget rate baselines, e.g. after sampling was paused.
    pub fn reset_baselines(&mut self) {
        self.deltas.reset();
    }

    /// Run one scan pass now. `interval` is the tick period, used as the
    /// rate denominator only when no time has passed since a node's last read.
    pub fn scan(&mut self, plan: &ScanPlan, interval: Duration) -> Snapshot {
        self.scan_at(plan, interval, Instant::now())
    }

    /// Like [`Scanner::scan`], with the measurement instant supplied.
    pub fn scan_at(&mut self, plan: &ScanPlan, interval: Duration, now: Instant) -> Snapshot {
        self.tick += 1;
        let dirs: Vec<PathBuf> = match plan {
            ScanPlan::Full => walk_tree(&self.root),
            ScanPlan::Level { cursors, nodes } => {
                let mut dirs: BTreeSet<PathBuf> = BTreeSet::new();
                for cursor in cursors {
                    dirs.extend(list_children(cursor));
                }
                dirs.extend(nodes.iter().cloned());
                dirs.into_iter().collect()
            }
        };

        let net_delta = self
            .source
            .net_total_bytes()
            .map(|total| self.deltas.net_delta(total))
            .unwrap_or(0);

        let mut seen: HashSet<PathBuf> = HashSet::with_capacity(dirs.len());
        let mut nodes = Vec::with_capacity(dirs.len());
        for dir in dirs {
            let Some(raw) = self.source.sample(&dir) else {
                trace!("skipping vanished node {}", dir.display());
                continue;
            };
            let cpu_percent = raw
                .cpu_usage_usec
                .map(|usage| self.deltas.cpu_percent(&dir, usage, now, interval))
                .unwrap_or(0.0);
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "/".to_string());
            nodes.push(Node {
                name,
                path: dir.to_string_lossy().into_owned(),
                identifier: paths::identifier(&dir),
                cpu_percent,
                memory: raw.memory_bytes.unwrap_or(0) / 1024 / 1024,
                pid_count: raw.pid_count.unwrap_or(0),
                net_delta: if dir == self.root { net_delta } else { 0 },
                frozen: raw.frozen.unwrap_or(false),
            });
            seen.insert(dir);
        }
        if self.prune {
            self.deltas.retain_seen(&seen);
        }
        nodes.sort_by(|a, b| a.path.cmp(&b.path));

        Snapshot {
            nodes,
            net_delta,
            tick: self.tick,
            ts_unix_ms: unix_ms(),
        }
    }
}

fn unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Immediate child directories; symlinks are not followed.
fn list_children(dir: &Path) -> Vec<PathBuf> {
    let Ok(rd) = fs::read_dir(dir) else {
        return Vec::new();
    };
    rd.filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.path())
        .collect()
}

/// The root and every descendant directory. Unreadable subtrees are skipped.
fn walk_tree(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    if !root.is_dir() {
        return out;
    }
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        stack.extend(list_children(&dir));
        out.push(dir);
    }
    out
}
