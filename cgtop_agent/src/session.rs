//! Per-connection session state and the view derived from it each tick.
//!
//! Views are computed from exactly one snapshot read. Focus wins over search,
//! search wins over cursor browsing.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::paths;
use crate::state::{Snapshot, Watch};
use crate::types::{ActionKind, ClientCommand, ViewMessage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub cursor: PathBuf,
    /// Lowercased; `None` when no search is active.
    pub search: Option<String>,
    pub focus: Option<PathBuf>,
}

impl SessionState {
    pub fn new(root: &Path) -> Self {
        Self {
            cursor: root.to_path_buf(),
            search: None,
            focus: None,
        }
    }

    pub fn watch(&self) -> Watch {
        Watch {
            cursor: self.cursor.clone(),
            focus: self.focus.clone(),
        }
    }
}

/// An `action` request split off from the rest of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    pub kind: ActionKind,
    pub target: Option<String>,
}

/// Apply the navigation fields of `cmd` to `state`; returns the action part,
/// if any, for the executor. Fields are independent; within one command
/// navigation is applied before search so `{path, search}` keeps the query.
pub fn apply_command(state: &mut SessionState, root: &Path, cmd: ClientCommand) -> Option<PendingAction> {
    if let Some(raw) = cmd.path {
        match paths::resolve_under(root, &raw) {
            Some(cursor) => {
                state.cursor = cursor;
                state.search = None;
            }
            None => debug!("ignoring navigation outside root: {raw}"),
        }
    }
    if let Some(q) = cmd.search {
        let q = q.trim().to_lowercase();
        state.search = (!q.is_empty()).then_some(q);
    }
    if let Some(f) = cmd.focus {
        state.focus = if f.trim().is_empty() {
            None
        } else {
            let resolved = paths::resolve_target(root, &f);
            if resolved.is_none() {
                debug!("focus target '{f}' does not resolve under root");
            }
            resolved
        };
    }
    cmd.action.map(|kind| PendingAction {
        kind,
        target: cmd.target,
    })
}

/// Derive the outbound view for one tick.
pub fn compute_view(state: &SessionState, snap: &Snapshot, root: &Path) -> ViewMessage {
    let root_str = root.to_string_lossy();
    let nodes = if let Some(focus) = &state.focus {
        let focus = focus.to_string_lossy();
        snap.nodes
            .iter()
            .find(|n| n.path == focus)
            .cloned()
            .into_iter()
            .collect()
    } else if let Some(q) = &state.search {
        snap.nodes
            .iter()
            .filter(|n| n.path != root_str && n.name.to_lowercase().contains(q.as_str()))
            .cloned()
            .collect()
    } else {
        snap.nodes
            .iter()
            .filter(|n| Path::new(&n.path).parent() == Some(state.cursor.as_path()))
            .cloned()
            .collect()
    };
    ViewMessage {
        location: paths::relative_location(root, &state.cursor),
        nodes,
        net_delta: snap.net_delta,
        tick: snap.tick,
    }
}
