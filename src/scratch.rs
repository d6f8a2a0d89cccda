//! Run-file lifecycle management.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use log;
use tempfile;

/// Owns the scratch directory all run files live in and hands out unique
/// paths for new runs.
///
/// Paths are derived from an atomic sequence number, so any number of
/// concurrent tasks can allocate without coordination and without
/// collisions. The directory and anything left in it are removed when the
/// value is dropped; [`ScratchDir::close`] removes it eagerly and surfaces
/// the error instead of swallowing it.
pub struct ScratchDir {
    dir: tempfile::TempDir,
    sequence: AtomicU64,
}

impl ScratchDir {
    /// Creates a fresh scratch directory under `parent`, or under the OS
    /// temporary directory if no parent is given.
    pub fn new(parent: Option<&Path>) -> io::Result<Self> {
        let dir = match parent {
            Some(parent) => tempfile::tempdir_in(parent),
            None => tempfile::tempdir(),
        }?;

        log::info!("using {} as a scratch directory", dir.path().display());

        return Ok(ScratchDir {
            dir,
            sequence: AtomicU64::new(0),
        });
    }

    /// Allocates a run-file path no other task will be handed.
    pub fn next_run_path(&self) -> PathBuf {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.dir.path().join(format!("run-{:08}.bin", seq))
    }

    /// Returns the scratch directory path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Removes the scratch directory and everything left inside it.
    pub fn close(self) -> io::Result<()> {
        self.dir.close()
    }
}
