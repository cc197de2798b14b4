use std::{
    io,
    path::{Component, Path, PathBuf},
};

use tokio::fs;
use tracing::{info, warn};

use crate::error::ShareError;

/// Normalizes a client-supplied relative path without touching the
/// filesystem. Root and prefix components are dropped so the result is always
/// relative; `None` means the path climbs above its starting point.
pub fn normalize_relative(requested: &str) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for component in Path::new(requested).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::RootDir | Component::Prefix(_) | Component::CurDir => {}
            Component::ParentDir => {
                if !clean.pop() {
                    return None;
                }
            }
        }
    }
    Some(clean)
}

/// Resolves `requested` against the canonical `root_dir` and returns the
/// canonical result only if it is still inside the root. Anything that
/// escapes (lexically or through symlinks) is reported as not found.
pub async fn resolve_within_root(root_dir: &Path, requested: &str) -> Result<PathBuf, ShareError> {
    let relative = normalize_relative(requested).ok_or_else(|| {
        warn!("Rejected path climbing out of the shared directory: {}", requested);
        ShareError::NotFound("Path not found.".into())
    })?;

    let candidate = root_dir.join(&relative);
    match fs::canonicalize(&candidate).await {
        Ok(canonical) if canonical.starts_with(root_dir) => Ok(canonical),
        Ok(canonical) => {
            warn!(
                "Path traversal attempt: '{}' resolved to '{}' outside '{}'",
                requested,
                canonical.display(),
                root_dir.display()
            );
            Err(ShareError::NotFound("Path not found.".into()))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Path not found: {}", candidate.display());
            Err(ShareError::NotFound("Path not found.".into()))
        }
        Err(e) => Err(ShareError::io("Could not process path.", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_relative_paths() {
        assert_eq!(normalize_relative(""), Some(PathBuf::new()));
        assert_eq!(normalize_relative("."), Some(PathBuf::new()));
        assert_eq!(normalize_relative("/docs/a.txt"), Some(PathBuf::from("docs/a.txt")));
        assert_eq!(normalize_relative("docs/./x/../a.txt"), Some(PathBuf::from("docs/a.txt")));
        assert_eq!(normalize_relative("../../etc/passwd"), None);
        assert_eq!(normalize_relative("docs/../../x"), None);
    }

    #[tokio::test]
    async fn resolves_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::create_dir(root.join("docs")).unwrap();
        std::fs::write(root.join("docs/a.txt"), b"hi").unwrap();

        let resolved = resolve_within_root(&root, "docs/a.txt").await.unwrap();
        assert_eq!(resolved, root.join("docs/a.txt"));
        assert_eq!(resolve_within_root(&root, "").await.unwrap(), root);
    }

    #[tokio::test]
    async fn rejects_escapes_and_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("share");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(dir.path().join("outside.txt"), b"secret").unwrap();
        let root = root.canonicalize().unwrap();

        for requested in ["../outside.txt", "../../etc/passwd", "missing.txt"] {
            let err = resolve_within_root(&root, requested).await.unwrap_err();
            assert!(matches!(err, ShareError::NotFound(_)), "{requested}: {err:?}");
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn rejects_symlinks_leading_outside() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("share");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(dir.path().join("outside.txt"), b"secret").unwrap();
        std::os::unix::fs::symlink(dir.path().join("outside.txt"), root.join("link.txt")).unwrap();
        let root = root.canonicalize().unwrap();

        let err = resolve_within_root(&root, "link.txt").await.unwrap_err();
        assert!(matches!(err, ShareError::NotFound(_)));
    }
}
