//! Path helpers: lexical cleaning, root-relative locations, client path
//! resolution and the opaque node identifier.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path: drop `.`, fold `..` into its parent.
/// Never touches the filesystem; `..` above the root of an absolute path is dropped.
pub fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() && !path.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        if path.has_root() {
            return PathBuf::from("/");
        }
        return PathBuf::from(".");
    }
    out
}

/// `path` expressed relative to `root`, with a leading `/`. The root itself is `/`.
pub fn relative_location(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => "/".to_string(),
        Ok(rel) => format!("/{}", rel.to_string_lossy()),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

/// Resolve a client-supplied path to an absolute path inside `root`.
///
/// Absolute paths already under `root` are taken as-is; anything else is
/// interpreted relative to `root` (`/a` -> `<root>/a`). The result is always
/// lexically inside `root`, otherwise `None`.
pub fn resolve_under(root: &Path, raw: &str) -> Option<PathBuf> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let direct = Path::new(raw);
    if direct.is_absolute() {
        let cleaned = clean(direct);
        if cleaned.starts_with(root) {
            return Some(cleaned);
        }
    }
    let joined = clean(&root.join(raw.trim_start_matches('/')));
    joined.starts_with(root).then_some(joined)
}

/// Stable client-facing key for a node: the base64 encoding of its path.
pub fn identifier(path: &Path) -> String {
    STANDARD.encode(path.to_string_lossy().as_bytes())
}

/// Inverse of [`identifier`]. Returns `None` for anything that is not a
/// well-formed identifier of an absolute path.
pub fn decode_identifier(id: &str) -> Option<PathBuf> {
    let bytes = STANDARD.decode(id.trim()).ok()?;
    let s = String::from_utf8(bytes).ok()?;
    let p = PathBuf::from(s);
    p.is_absolute().then_some(p)
}

/// Resolve a focus target given either as an identifier or as a path.
pub fn resolve_target(root: &Path, raw: &str) -> Option<PathBuf> {
    let raw = raw.trim();
    if !raw.starts_with('/') {
        if let Some(p) = decode_identifier(raw) {
            let p = clean(&p);
            if p.starts_with(root) {
                return Some(p);
            }
        }
    }
    resolve_under(root, raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_folds_dots() {
        assert_eq!(clean(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(clean(Path::new("/../..")), PathBuf::from("/"));
        assert_eq!(clean(Path::new("a/../..")), PathBuf::from(".."));
    }

    #[test]
    fn location_is_root_relative() {
        let root = Path::new("/sys/fs/cgroup");
        assert_eq!(relative_location(root, root), "/");
        assert_eq!(
            relative_location(root, Path::new("/sys/fs/cgroup/system.slice/a.service")),
            "/system.slice/a.service"
        );
    }

    #[test]
    fn resolve_accepts_absolute_and_relative() {
        let root = Path::new("/sys/fs/cgroup");
        assert_eq!(
            resolve_under(root, "/sys/fs/cgroup/a"),
            Some(PathBuf::from("/sys/fs/cgroup/a"))
        );
        assert_eq!(resolve_under(root, "/a"), Some(PathBuf::from("/sys/fs/cgroup/a")));
        assert_eq!(resolve_under(root, "/"), Some(root.to_path_buf()));
        assert_eq!(resolve_under(root, "  "), None);
    }

    #[test]
    fn resolve_never_escapes_root() {
        let root = Path::new("/sys/fs/cgroup");
        assert_eq!(resolve_under(root, "/../../etc"), None);
        assert_eq!(resolve_under(root, "../../../etc/passwd"), None);
        let escaped = resolve_under(root, "/sys/fs/cgroup/../../../etc");
        assert!(escaped.map_or(true, |p| p.starts_with(root)));
    }

    #[test]
    fn identifier_round_trips_and_differs_for_same_name() {
        let a = Path::new("/sys/fs/cgroup/x/db");
        let b = Path::new("/sys/fs/cgroup/y/db");
        assert_ne!(identifier(a), identifier(b));
        assert_eq!(decode_identifier(&identifier(a)).as_deref(), Some(a));
    }

    #[test]
    fn target_by_identifier_or_path() {
        let root = Path::new("/sys/fs/cgroup");
        let p = Path::new("/sys/fs/cgroup/a");
        assert_eq!(resolve_target(root, &identifier(p)).as_deref(), Some(p));
        assert_eq!(resolve_target(root, "/a").as_deref(), Some(p));
        // an identifier pointing outside the root is treated as a relative name
        let outside = identifier(Path::new("/etc"));
        let r = resolve_target(root, &outside).unwrap();
        assert!(r.starts_with(root));
    }
}
