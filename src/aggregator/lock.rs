use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use anyhow::{Context, Result};
use chrono::Utc;
use log::{error, warn};

/// Sentinel file marking an aggregation run in progress.
///
/// Created with create-new semantics so two runs racing for it cannot both
/// win. The marker is removed on `release` or, failing that, on drop, so an
/// aborted run never leaves it behind while the process is alive.
#[derive(Debug)]
pub struct LockMarker {
    path: PathBuf,
    released: bool,
}

impl LockMarker {
    /// Returns `None` when another run holds a live marker. A marker older than
    /// `stale_after` is reclaimed once.
    pub fn acquire(path: &Path, stale_after: Option<Duration>) -> Result<Option<Self>> {
        match Self::create(path) {
            Ok(marker) => Ok(Some(marker)),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                if !is_stale(path, stale_after) {
                    return Ok(None);
                }

                warn!(
                    "Reclaiming stale aggregation lock {} (older than {:?})",
                    path.display(),
                    stale_after.unwrap_or_default()
                );
                match fs::remove_file(path) {
                    Ok(()) => {}
                    Err(err) if err.kind() == ErrorKind::NotFound => {}
                    Err(err) => {
                        return Err(err).with_context(|| {
                            format!("failed to remove stale lock {}", path.display())
                        })
                    }
                }

                match Self::create(path) {
                    Ok(marker) => Ok(Some(marker)),
                    Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(None),
                    Err(err) => Err(err)
                        .with_context(|| format!("failed to create lock {}", path.display())),
                }
            }
            Err(err) => {
                Err(err).with_context(|| format!("failed to create lock {}", path.display()))
            }
        }
    }

    fn create(path: &Path) -> std::io::Result<Self> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        let marker = Self {
            path: path.to_path_buf(),
            released: false,
        };
        writeln!(file, "{} {}", std::process::id(), Utc::now().to_rfc3339())?;
        Ok(marker)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(mut self) -> Result<()> {
        self.released = true;
        remove_marker(&self.path)
            .with_context(|| format!("failed to remove lock {}", self.path.display()))
    }
}

impl Drop for LockMarker {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = remove_marker(&self.path) {
            error!(
                "Failed to remove aggregation lock {}: {err}; remove it manually",
                self.path.display()
            );
        }
    }
}

pub fn is_locked(path: &Path) -> bool {
    path.exists()
}

fn remove_marker(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn is_stale(path: &Path, stale_after: Option<Duration>) -> bool {
    let Some(limit) = stale_after else {
        return false;
    };

    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .map(|age| age > limit)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_refused_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("visits.lock");

        let held = LockMarker::acquire(&path, None).unwrap().unwrap();
        assert!(LockMarker::acquire(&path, None).unwrap().is_none());

        held.release().unwrap();
        assert!(!is_locked(&path));
        assert!(LockMarker::acquire(&path, None).unwrap().is_some());
    }

    #[test]
    fn dropping_without_release_still_removes_marker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("visits.lock");

        {
            let _held = LockMarker::acquire(&path, None).unwrap().unwrap();
            assert!(is_locked(&path));
        }
        assert!(!is_locked(&path));
    }

    #[test]
    fn stale_marker_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("visits.lock");
        fs::write(&path, "leftover").unwrap();

        std::thread::sleep(Duration::from_millis(20));
        let marker = LockMarker::acquire(&path, Some(Duration::from_millis(1))).unwrap();
        assert!(marker.is_some());
    }

    #[test]
    fn fresh_foreign_marker_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("visits.lock");
        fs::write(&path, "other run").unwrap();

        let marker = LockMarker::acquire(&path, Some(Duration::from_secs(3600))).unwrap();
        assert!(marker.is_none());
        assert!(is_locked(&path));
    }
}
