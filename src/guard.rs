use anyhow::{Context as _, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::cluster::{ClusterError, ClusterResult, Gateway};
use crate::kinds::ResourceKind;

/// Per-run scratch directory for pre-delete backups. The directory is
/// deliberately detached from any cleanup: deleted objects stay recoverable
/// after the process exits.
pub struct DeletionStore {
    dir: PathBuf,
}

impl DeletionStore {
    pub fn for_process() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("ocular-deletions-")
            .tempdir()
            .context("failed to create deletion scratch directory")?
            .keep();
        Ok(Self { dir })
    }

    pub fn at(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Durably write one serialized object under a unique
    /// `{resourceType}-{name}-{random}.yaml` path and return it.
    pub fn backup(&self, resource_type: &str, name: &str, serialized: &str) -> Result<PathBuf> {
        let mut file = tempfile::Builder::new()
            .prefix(&format!("{resource_type}-{name}-"))
            .suffix(".yaml")
            .tempfile_in(&self.dir)
            .with_context(|| format!("failed to create backup file for {resource_type}/{name}"))?;
        file.write_all(serialized.as_bytes())
            .and_then(|()| file.as_file().sync_all())
            .with_context(|| format!("failed to write backup for {resource_type}/{name}"))?;
        let (_, path) = file
            .keep()
            .with_context(|| format!("failed to persist backup for {resource_type}/{name}"))?;
        Ok(path)
    }
}

/// Read the live object, write its backup, then delete, in that order. A
/// delete is never issued before its backup is on disk.
pub async fn delete_one(
    gateway: &Gateway,
    store: &DeletionStore,
    resource_type: &str,
    namespace: &str,
    name: &str,
) -> ClusterResult<PathBuf> {
    let serialized = gateway.object_yaml(resource_type, namespace, name).await?;
    let backup = store
        .backup(resource_type, name, &serialized)
        .map_err(ClusterError::Other)?;
    gateway.delete_object(resource_type, namespace, name).await?;
    Ok(backup)
}

/// Bulk delete for a whole kind. Takes no per-object backups: the single
/// confirmation covers the collection, and snapshotting every object first
/// is out of scope for this path.
pub async fn delete_all(
    gateway: &Gateway,
    kind: &ResourceKind,
    namespace: &str,
) -> ClusterResult<()> {
    gateway.delete_collection(kind, namespace).await
}

#[cfg(test)]
mod tests {
    use super::DeletionStore;

    #[test]
    fn backup_lands_under_the_expected_name_with_full_content() {
        let scratch = tempfile::tempdir().expect("tempdir");
        let store = DeletionStore::at(scratch.path().to_path_buf());

        let path = store
            .backup("pods", "api-0", "kind: Pod\nmetadata:\n  name: api-0\n")
            .expect("backup should be written");

        assert!(path.exists());
        let file_name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(file_name.starts_with("pods-api-0-"));
        assert!(file_name.ends_with(".yaml"));
        // The random infix keeps concurrent backups of the same name apart.
        assert!(file_name.len() > "pods-api-0-.yaml".len());

        let content = std::fs::read_to_string(&path).expect("backup readable");
        assert!(content.contains("name: api-0"));
    }

    #[test]
    fn repeated_backups_of_the_same_object_never_collide() {
        let scratch = tempfile::tempdir().expect("tempdir");
        let store = DeletionStore::at(scratch.path().to_path_buf());

        let first = store.backup("services", "web", "a").unwrap();
        let second = store.backup("services", "web", "b").unwrap();
        assert_ne!(first, second);
        assert_eq!(std::fs::read_to_string(first).unwrap(), "a");
        assert_eq!(std::fs::read_to_string(second).unwrap(), "b");
    }
}
