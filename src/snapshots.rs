//! Snapshot directory management.
//!
//! A snapshot is one JSON file per fetch cycle, named
//! `news_data_YYYYMMDD_HHMMSS.json` and ordered by modification time. The
//! [`SnapshotStore`] owns enumeration, creation and deletion; the fetcher and
//! enricher own the content.
//!
//! # Layout
//!
//! ```text
//! snapshot_dir/
//! ├── news_data_20250506_080012.json
//! ├── news_data_20250506_084501.json
//! └── news_data_20250506_093017.json   <- newest, the one that gets rendered
//! ```

use crate::error::SnapshotError;
use crate::models::SnapshotDoc;
use chrono::Local;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

pub const SNAPSHOT_PREFIX: &str = "news_data_";
pub const SNAPSHOT_EXTENSION: &str = ".json";

/// A snapshot file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub path: PathBuf,
    pub name: String,
    pub modified: SystemTime,
}

impl Snapshot {
    /// Age relative to `now`. Files stamped in the future count as age zero.
    pub fn age_at(&self, now: SystemTime) -> Duration {
        now.duration_since(self.modified).unwrap_or_default()
    }

    /// `true` iff the snapshot is younger than `threshold` at `now`.
    pub fn is_fresh_at(&self, threshold: Duration, now: SystemTime) -> bool {
        self.age_at(now) < threshold
    }

    pub fn is_fresh(&self, threshold: Duration) -> bool {
        self.is_fresh_at(threshold, SystemTime::now())
    }
}

/// What a [`SnapshotStore::cull`] pass removed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CullReport {
    pub expired: Vec<String>,
    pub excess: Vec<String>,
    pub failed: Vec<String>,
}

impl CullReport {
    pub fn removed(&self) -> usize {
        self.expired.len() + self.excess.len()
    }
}

/// Whether `name` follows the snapshot naming convention.
pub fn is_snapshot_name(name: &str) -> bool {
    name.starts_with(SNAPSHOT_PREFIX) && name.ends_with(SNAPSHOT_EXTENSION)
}

/// A directory of timestamped snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// All snapshots, newest first.
    ///
    /// Ordering is by modification time, ties broken by the greater file
    /// name. A missing directory is treated as empty.
    pub async fn list(&self) -> Result<Vec<Snapshot>, SnapshotError> {
        let io_err = |source| SnapshotError::Io {
            path: self.dir.clone(),
            source,
        };

        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(e)),
        };

        let mut snapshots = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !is_snapshot_name(&name) {
                continue;
            }
            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    // Raced with a concurrent delete.
                    debug!(%name, error = %e, "Skipping unreadable snapshot entry");
                    continue;
                }
            };
            let modified = metadata.modified().map_err(io_err)?;
            snapshots.push(Snapshot {
                path: entry.path(),
                name,
                modified,
            });
        }

        snapshots.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.name.cmp(&a.name)));
        Ok(snapshots)
    }

    /// The snapshot with the greatest modification time, if any.
    #[instrument(level = "debug", skip_all, fields(dir = %self.dir.display()))]
    pub async fn newest(&self) -> Result<Option<Snapshot>, SnapshotError> {
        let newest = self.list().await?.into_iter().next();
        match &newest {
            Some(s) => debug!(name = %s.name, "Newest snapshot selected"),
            None => warn!("No snapshots found"),
        }
        Ok(newest)
    }

    /// Remove every snapshot older than `max_age`, then the oldest of the
    /// remainder until at most `max_count` are left.
    ///
    /// Best-effort: deletion failures are logged and reported, never returned.
    #[instrument(level = "info", skip_all, fields(dir = %self.dir.display(), max_count = max_count, max_age_secs = max_age.as_secs()))]
    pub async fn cull(&self, max_count: usize, max_age: Duration) -> CullReport {
        self.cull_at(max_count, max_age, SystemTime::now()).await
    }

    pub async fn cull_at(&self, max_count: usize, max_age: Duration, now: SystemTime) -> CullReport {
        let mut report = CullReport::default();
        let snapshots = match self.list().await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "Could not list snapshots; skipping cull");
                return report;
            }
        };

        let (expired, retained): (Vec<_>, Vec<_>) = snapshots
            .into_iter()
            .partition(|s| s.age_at(now) > max_age);

        for snapshot in expired {
            match fs::remove_file(&snapshot.path).await {
                Ok(()) => {
                    info!(name = %snapshot.name, "Removed expired snapshot");
                    report.expired.push(snapshot.name);
                }
                Err(e) => {
                    warn!(name = %snapshot.name, error = %e, "Failed to remove expired snapshot");
                    report.failed.push(snapshot.name);
                }
            }
        }

        // `retained` is newest first, so the excess is its tail.
        for snapshot in retained.into_iter().skip(max_count) {
            match fs::remove_file(&snapshot.path).await {
                Ok(()) => {
                    info!(name = %snapshot.name, "Removed excess snapshot");
                    report.excess.push(snapshot.name);
                }
                Err(e) => {
                    warn!(name = %snapshot.name, error = %e, "Failed to remove excess snapshot");
                    report.failed.push(snapshot.name);
                }
            }
        }

        report
    }

    /// Write `doc` into a brand-new snapshot named after the current local
    /// time. Never touches an existing file.
    #[instrument(level = "info", skip_all, fields(dir = %self.dir.display(), articles = doc.articles.len()))]
    pub async fn create(&self, doc: &SnapshotDoc) -> Result<Snapshot, SnapshotError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| SnapshotError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let json = encode(&self.dir, doc)?;
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();

        let mut attempt = 0usize;
        loop {
            let name = if attempt == 0 {
                format!("{SNAPSHOT_PREFIX}{stamp}{SNAPSHOT_EXTENSION}")
            } else {
                format!("{SNAPSHOT_PREFIX}{stamp}_{attempt}{SNAPSHOT_EXTENSION}")
            };
            let path = self.dir.join(&name);
            let io_err = |source| SnapshotError::Io {
                path: path.clone(),
                source,
            };

            let mut file = match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(f) => f,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    attempt += 1;
                    continue;
                }
                Err(e) => return Err(io_err(e)),
            };
            file.write_all(json.as_bytes()).await.map_err(io_err)?;
            file.flush().await.map_err(io_err)?;
            drop(file);

            let modified = fs::metadata(&path)
                .await
                .and_then(|m| m.modified())
                .map_err(io_err)?;
            info!(%name, "Wrote snapshot");
            return Ok(Snapshot {
                path,
                name,
                modified,
            });
        }
    }

    pub async fn read(&self, snapshot: &Snapshot) -> Result<SnapshotDoc, SnapshotError> {
        let body = fs::read_to_string(&snapshot.path)
            .await
            .map_err(|source| SnapshotError::Io {
                path: snapshot.path.clone(),
                source,
            })?;
        serde_json::from_str(&body).map_err(|source| SnapshotError::Format {
            path: snapshot.path.clone(),
            source,
        })
    }

    /// Replace the content of an existing snapshot, keeping its name.
    ///
    /// The new content is written to a sibling temp file and renamed over the
    /// original so readers never observe a half-written document.
    #[instrument(level = "info", skip_all, fields(name = %snapshot.name))]
    pub async fn rewrite(&self, snapshot: &Snapshot, doc: &SnapshotDoc) -> Result<(), SnapshotError> {
        let json = encode(&snapshot.path, doc)?;
        let tmp = snapshot.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .await
            .map_err(|source| SnapshotError::Io {
                path: tmp.clone(),
                source,
            })?;
        fs::rename(&tmp, &snapshot.path)
            .await
            .map_err(|source| SnapshotError::Io {
                path: snapshot.path.clone(),
                source,
            })?;
        info!("Rewrote snapshot in place");
        Ok(())
    }
}

fn encode(path: &Path, doc: &SnapshotDoc) -> Result<String, SnapshotError> {
    serde_json::to_string_pretty(doc).map_err(|source| SnapshotError::Format {
        path: path.to_path_buf(),
        source,
    })
}
