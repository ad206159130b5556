//! Background sampler: scans the control-group tree once per tick and
//! publishes the result, so per-connection pushers only read the latest
//! snapshot.

use std::sync::atomic::Ordering;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::scanner::{ScanMode, ScanPlan, Scanner};
use crate::source::CgroupFs;
use crate::state::{AppState, Snapshot};

pub fn build_scanner(state: &AppState) -> Scanner {
    let cfg = &state.config;
    Scanner::new(&cfg.root, CgroupFs::new(&cfg.net_dev), cfg.prune_deltas)
}

/// Spawn the single scanning task. It owns the scanner (and its rate
/// baselines) exclusively and exits when `shutdown` flips to `true`.
pub fn spawn_sampler(state: AppState, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = state.config.tick;
        let mut scanner = Some(build_scanner(&state));
        let mut ticker = interval(period);
        // A slow scan delays the next one instead of stacking up ticks.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            "sampler started: root={} mode={:?} period={:?}",
            state.config.root.display(),
            state.config.scan_mode,
            period
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }

            if state.config.pause_when_idle && state.client_count.load(Ordering::Relaxed) == 0 {
                debug!("no clients; sampler idle");
                // Nothing published before the pause may reach the next session.
                state.snapshots.publish(Snapshot::default()).await;
                tokio::select! {
                    _ = state.wake_sampler.notified() => {}
                    _ = shutdown.changed() => break,
                }
                if let Some(s) = scanner.as_mut() {
                    s.reset_baselines();
                }
                ticker.reset();
                debug!("client connected; sampler resumed");
            }

            let plan = match state.config.scan_mode {
                ScanMode::Full => ScanPlan::Full,
                ScanMode::Level => state.watches.plan(),
            };
            let Some(mut owned) = scanner.take() else {
                break;
            };
            // Filesystem walking is blocking work.
            let res = tokio::task::spawn_blocking(move || {
                let snap = owned.scan(&plan, period);
                (owned, snap)
            })
            .await;
            match res {
                Ok((back, snap)) => {
                    scanner = Some(back);
                    state.snapshots.publish(snap).await;
                }
                Err(e) => {
                    error!("scan task failed: {e}");
                    break;
                }
            }
        }
        info!("sampler stopped");
    })
}
