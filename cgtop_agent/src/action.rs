//! Freeze / unfreeze: writes the control file of a node directly. The effect
//! shows up in the snapshot on the next scan tick.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::paths;
use crate::source::FREEZE_FILE;
use crate::types::{ActionAck, ActionKind};

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("target '{0}' is outside the managed tree")]
    OutsideRoot(String),
    #[error("target '{0}' is not a control group")]
    NotAGroup(String),
    #[error("writing {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Resolve a client target to a canonical directory strictly inside `root`.
/// Symlinks are resolved before the containment check.
pub fn validate_target(root: &Path, raw: &str) -> Result<PathBuf, ActionError> {
    let lexical =
        paths::resolve_target(root, raw).ok_or_else(|| ActionError::OutsideRoot(raw.to_string()))?;
    let canonical_root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let canonical = std::fs::canonicalize(&lexical)
        .map_err(|_| ActionError::NotAGroup(raw.to_string()))?;
    if !canonical.starts_with(&canonical_root) {
        return Err(ActionError::OutsideRoot(raw.to_string()));
    }
    if !canonical.is_dir() {
        return Err(ActionError::NotAGroup(raw.to_string()));
    }
    Ok(canonical)
}

pub async fn apply(root: &Path, kind: ActionKind, raw_target: &str) -> Result<PathBuf, ActionError> {
    let target = validate_target(root, raw_target)?;
    let file = target.join(FREEZE_FILE);
    tokio::fs::write(&file, kind.flag())
        .await
        .map_err(|source| ActionError::Write {
            path: file.clone(),
            source,
        })?;
    info!("{:?} applied to {}", kind, target.display());
    Ok(target)
}

/// Run an action and turn the outcome into the acknowledgment frame.
pub async fn apply_and_ack(root: &Path, kind: ActionKind, raw_target: Option<&str>) -> ActionAck {
    let Some(raw) = raw_target else {
        return ActionAck {
            action: kind,
            target: String::new(),
            ok: false,
            error: Some("missing target".to_string()),
        };
    };
    match apply(root, kind, raw).await {
        Ok(target) => ActionAck {
            action: kind,
            target: target.to_string_lossy().into_owned(),
            ok: true,
            error: None,
        },
        Err(e) => {
            warn!("{:?} on '{}' failed: {}", kind, raw, e);
            ActionAck {
                action: kind,
                target: raw.to_string(),
                ok: false,
                error: Some(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree() -> (tempfile::TempDir, PathBuf) {
        let td = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(td.path()).unwrap().join("cg");
        fs::create_dir_all(root.join("a")).unwrap();
        fs::write(root.join("a").join(FREEZE_FILE), "0").unwrap();
        (td, root)
    }

    #[tokio::test]
    async fn freeze_then_unfreeze_writes_flag() {
        let (_td, root) = tree();
        let target = root.join("a");
        apply(&root, ActionKind::Freeze, &target.to_string_lossy())
            .await
            .unwrap();
        assert_eq!(fs::read_to_string(target.join(FREEZE_FILE)).unwrap(), "1");
        apply(&root, ActionKind::Unfreeze, "/a").await.unwrap();
        assert_eq!(fs::read_to_string(target.join(FREEZE_FILE)).unwrap(), "0");
    }

    #[tokio::test]
    async fn identifier_targets_are_accepted() {
        let (_td, root) = tree();
        let target = root.join("a");
        let id = paths::identifier(&target);
        let ack = apply_and_ack(&root, ActionKind::Freeze, Some(&id)).await;
        assert!(ack.ok, "{ack:?}");
        assert_eq!(fs::read_to_string(target.join(FREEZE_FILE)).unwrap(), "1");
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let (td, root) = tree();
        let outside = td.path().join("victim");
        fs::create_dir_all(&outside).unwrap();
        let raw = format!("{}/../victim", root.display());
        let err = apply(&root, ActionKind::Freeze, &raw).await.unwrap_err();
        assert!(matches!(err, ActionError::OutsideRoot(_) | ActionError::NotAGroup(_)));
        assert!(!outside.join(FREEZE_FILE).exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_escape_is_rejected() {
        let (td, root) = tree();
        let outside = td.path().join("victim");
        fs::create_dir_all(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();
        let err = apply(&root, ActionKind::Freeze, "/link").await.unwrap_err();
        assert!(matches!(err, ActionError::OutsideRoot(_)));
        assert!(!outside.join(FREEZE_FILE).exists());
    }

    #[tokio::test]
    async fn missing_target_and_missing_node_are_acknowledged() {
        let (_td, root) = tree();
        let ack = apply_and_ack(&root, ActionKind::Freeze, None).await;
        assert!(!ack.ok);
        let ack = apply_and_ack(&root, ActionKind::Freeze, Some("/nope")).await;
        assert!(!ack.ok);
        assert!(ack.error.unwrap().contains("not a control group"));
    }
}
