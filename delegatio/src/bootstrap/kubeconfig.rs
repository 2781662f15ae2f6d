//! Persisting the admin kubeconfig on the operator host.

use delegatio_shared::{DelegatioError, DelegatioResult};
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Write `blob` to `path`, replacing any previous file.
///
/// Parent directories are created. On Unix the file is readable by the
/// owner only.
pub async fn persist_admin_config(path: &Path, blob: &[u8]) -> DelegatioResult<()> {
    let storage = |what: &str, e: std::io::Error| {
        DelegatioError::Storage(format!("{} {}: {}", what, path.display(), e))
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| storage("failed to create directory for", e))?;
    }

    let mut options = tokio::fs::OpenOptions::new();
    options.create(true).write(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options
        .open(path)
        .await
        .map_err(|e| storage("failed to open", e))?;
    file.write_all(blob)
        .await
        .map_err(|e| storage("failed to write", e))?;
    file.flush().await.map_err(|e| storage("failed to flush", e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .map_err(|e| storage("failed to restrict permissions on", e))?;
    }

    tracing::info!(path = %path.display(), bytes = blob.len(), "admin.conf written to disk");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("admin.conf");

        persist_admin_config(&path, b"first contents").await.unwrap();
        persist_admin_config(&path, b"second").await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"second");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin.conf");
        std::fs::write(&path, b"old").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        persist_admin_config(&path, b"new").await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn unwritable_target_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for writing.
        let err = persist_admin_config(dir.path(), b"x").await.unwrap_err();
        assert!(matches!(err, DelegatioError::Storage(_)));
    }
}
