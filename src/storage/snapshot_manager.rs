use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::storage::snapshot::StoreSnapshot;

/// Persists store snapshots as `snapshot_{sequence}.bin` files.
///
/// ## Format
/// - `bincode` encoding of [`StoreSnapshot`]
/// - SHA-256 checksum verified on every load
///
/// ## Retention
/// Keeps the newest `max_snapshots` files; older ones are removed after each save.
///
/// ## Recovery
/// `load_latest()` walks from the newest file backwards and skips corrupted
/// ones. An empty or missing directory yields `Error::NoSnapshotFound`.
pub struct SnapshotManager {
    snapshot_dir: PathBuf,
    max_snapshots: usize,
}

impl SnapshotManager {
    pub fn new(snapshot_dir: impl AsRef<Path>, max_snapshots: usize) -> Self {
        SnapshotManager {
            snapshot_dir: snapshot_dir.as_ref().to_path_buf(),
            max_snapshots: max_snapshots.max(1),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.snapshot_dir, config.max_snapshots)
    }

    fn path_for(&self, sequence: u64) -> PathBuf {
        self.snapshot_dir.join(format!("snapshot_{}.bin", sequence))
    }

    /// Save snapshot to disk
    pub async fn save_snapshot(&self, snapshot: &StoreSnapshot) -> Result<PathBuf> {
        async_fs::create_dir_all(&self.snapshot_dir).await?;

        let filepath = self.path_for(snapshot.sequence);
        let tmp_path = filepath.with_extension("bin.tmp");

        let data = bincode::serialize(snapshot)
            .map_err(|e| Error::SerializationError(e.to_string()))?;

        // Write then rename so readers never see a partial file
        async_fs::write(&tmp_path, data).await?;
        async_fs::rename(&tmp_path, &filepath).await?;

        tracing::info!(
            "Saved snapshot {} with {} price points to {:?}",
            snapshot.sequence,
            snapshot.points.len(),
            filepath
        );

        self.cleanup_old_snapshots().await?;

        Ok(filepath)
    }

    /// Load the newest snapshot that passes verification
    pub async fn load_latest(&self) -> Result<StoreSnapshot> {
        let snapshots = self.list_snapshots().await?;

        for path in snapshots.iter().rev() {
            match self.load_snapshot(path).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) => tracing::warn!("Skipping unreadable snapshot {:?}: {}", path, e),
            }
        }

        Err(Error::NoSnapshotFound)
    }

    pub async fn load_snapshot_at_sequence(&self, sequence: u64) -> Result<StoreSnapshot> {
        self.load_snapshot(&self.path_for(sequence)).await
    }

    async fn load_snapshot(&self, filepath: &Path) -> Result<StoreSnapshot> {
        let data = async_fs::read(filepath).await?;

        let snapshot: StoreSnapshot = bincode::deserialize(&data)
            .map_err(|e| Error::DeserializationError(e.to_string()))?;

        if !snapshot.verify_checksum() {
            return Err(Error::InvalidChecksum);
        }

        tracing::info!("Loaded snapshot from {:?}", filepath);
        Ok(snapshot)
    }

    /// Snapshot files sorted by sequence, oldest first
    pub async fn list_snapshots(&self) -> Result<Vec<PathBuf>> {
        let mut entries = match async_fs::read_dir(&self.snapshot_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut snapshots = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if let Some(sequence) = sequence_of(&path) {
                snapshots.push((sequence, path));
            }
        }

        snapshots.sort_by_key(|(sequence, _)| *sequence);
        Ok(snapshots.into_iter().map(|(_, path)| path).collect())
    }

    async fn cleanup_old_snapshots(&self) -> Result<()> {
        let snapshots = self.list_snapshots().await?;

        if snapshots.len() <= self.max_snapshots {
            return Ok(());
        }

        let to_delete = snapshots.len() - self.max_snapshots;
        for snapshot_path in snapshots.iter().take(to_delete) {
            async_fs::remove_file(snapshot_path).await?;
            tracing::info!("Deleted old snapshot: {:?}", snapshot_path);
        }

        Ok(())
    }
}

fn sequence_of(path: &Path) -> Option<u64> {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|s| s.strip_prefix("snapshot_"))
        .and_then(|s| s.strip_suffix(".bin"))
        .and_then(|s| s.parse::<u64>().ok())
}
