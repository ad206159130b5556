//! Shared agent state: the latest snapshot, session watch registrations and
//! connection bookkeeping.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, RwLock};

use crate::config::AgentConfig;
use crate::scanner::ScanPlan;
use crate::types::Node;

/// One completed scan pass. Never mutated after publish.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub nodes: Vec<Node>,
    /// System-wide network bytes over the tick.
    pub net_delta: u64,
    pub tick: u64,
    pub ts_unix_ms: i64,
}

/// Holder of the latest snapshot: one writer (the sampler), many readers.
///
/// The lock only guards an `Arc` swap, so the critical section does not
/// depend on tree size and readers never see a half-written tick.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: RwLock<Arc<Snapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn publish(&self, snapshot: Snapshot) {
        let next = Arc::new(snapshot);
        *self.current.write().await = next;
    }

    pub async fn read(&self) -> Arc<Snapshot> {
        self.current.read().await.clone()
    }
}

/// What one session is looking at, for single-level scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watch {
    pub cursor: PathBuf,
    pub focus: Option<PathBuf>,
}

/// Per-session watch registrations, keyed by session id.
#[derive(Debug, Default)]
pub struct WatchSet {
    inner: Mutex<HashMap<u64, Watch>>,
}

impl WatchSet {
    pub fn set(&self, session: u64, watch: Watch) {
        if let Ok(mut m) = self.inner.lock() {
            m.insert(session, watch);
        }
    }

    pub fn remove(&self, session: u64) {
        if let Ok(mut m) = self.inner.lock() {
            m.remove(&session);
        }
    }

    /// Union of all registrations as a single-level scan plan.
    pub fn plan(&self) -> ScanPlan {
        let mut cursors = BTreeSet::new();
        let mut nodes = BTreeSet::new();
        if let Ok(m) = self.inner.lock() {
            for w in m.values() {
                cursors.insert(w.cursor.clone());
                if let Some(f) = &w.focus {
                    nodes.insert(f.clone());
                }
            }
        }
        ScanPlan::Level { cursors, nodes }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AgentConfig>,
    pub snapshots: Arc<SnapshotStore>,
    pub watches: Arc<WatchSet>,

    // Adaptive sampling controls
    pub client_count: Arc<AtomicUsize>,
    pub wake_sampler: Arc<Notify>,
    pub next_session: Arc<AtomicU64>,
    pub hostname: String,
}

impl AppState {
    pub fn new(config: AgentConfig) -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|s| s.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            config: Arc::new(config),
            snapshots: Arc::new(SnapshotStore::new()),
            watches: Arc::new(WatchSet::default()),
            client_count: Arc::new(AtomicUsize::new(0)),
            wake_sampler: Arc::new(Notify::new()),
            next_session: Arc::new(AtomicU64::new(1)),
            hostname,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(tick: u64, n: usize) -> Snapshot {
        Snapshot {
            nodes: (0..n)
                .map(|i| Node {
                    name: format!("{tick}-{i}"),
                    path: format!("/cg/{i}"),
                    identifier: String::new(),
                    cpu_percent: 0.0,
                    memory: 0,
                    pid_count: 0,
                    net_delta: 0,
                    frozen: false,
                })
                .collect(),
            net_delta: 0,
            tick,
            ts_unix_ms: 0,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn readers_never_observe_mixed_ticks() {
        let store = Arc::new(SnapshotStore::new());
        store.publish(tagged(0, 50)).await;

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for tick in 1..=300u64 {
                    store.publish(tagged(tick, 50)).await;
                    tokio::task::yield_now().await;
                }
            })
        };
        let mut readers = Vec::new();
        for _ in 0..4 {
            let store = store.clone();
            readers.push(tokio::spawn(async move {
                for _ in 0..300 {
                    let snap = store.read().await;
                    let prefix = format!("{}-", snap.tick);
                    assert_eq!(snap.nodes.len(), 50);
                    assert!(snap.nodes.iter().all(|n| n.name.starts_with(&prefix)));
                    tokio::task::yield_now().await;
                }
            }));
        }
        writer.await.unwrap();
        for r in readers {
            r.await.unwrap();
        }
        assert_eq!(store.read().await.tick, 300);
    }

    #[test]
    fn watch_set_plan_is_union() {
        let w = WatchSet::default();
        w.set(
            1,
            Watch {
                cursor: "/cg".into(),
                focus: None,
            },
        );
        w.set(
            2,
            Watch {
                cursor: "/cg/a".into(),
                focus: Some("/cg/b/c".into()),
            },
        );
        w.set(
            3,
            Watch {
                cursor: "/cg".into(),
                focus: None,
            },
        );
        match w.plan() {
            ScanPlan::Level { cursors, nodes } => {
                assert_eq!(cursors.len(), 2);
                assert_eq!(nodes.len(), 1);
            }
            other => panic!("unexpected plan {other:?}"),
        }
        w.remove(2);
        match w.plan() {
            ScanPlan::Level { cursors, nodes } => {
                assert_eq!(cursors.len(), 1);
                assert!(nodes.is_empty());
            }
            other => panic!("unexpected plan {other:?}"),
        }
    }
}
