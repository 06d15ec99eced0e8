use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempPath};
use tracing::{debug, warn};

use crate::error::{EocError, Result};

/// All outputs of one run. Each is written to a temporary file next to its
/// target and only renamed into place by [`OutputBatch::commit`]; dropping an
/// uncommitted batch deletes every temporary.
#[derive(Default)]
pub struct OutputBatch {
    staged: Vec<(NamedTempFile, PathBuf)>,
}

impl OutputBatch {
    pub fn new() -> Self {
        OutputBatch::default()
    }

    pub fn stage<P, F, T>(&mut self, target: P, fill: F) -> Result<T>
    where
        P: AsRef<Path>,
        F: FnOnce(&mut NamedTempFile) -> Result<T>,
    {
        let target = target.as_ref();
        let mut tmp = NamedTempFile::new_in(parent_dir(target))?;
        let out = fill(&mut tmp)?;
        debug!(path = %target.display(), temp = %tmp.path().display(), "staged output");
        self.staged.push((tmp, target.to_path_buf()));
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Renames every staged file onto its target. Targets that already exist
    /// are moved aside first; if one rename fails, every target this batch
    /// touched is put back the way it was.
    pub fn commit(self) -> Result<Vec<PathBuf>> {
        let mut done: Vec<(PathBuf, Option<TempPath>)> = Vec::with_capacity(self.staged.len());
        for (tmp, target) in self.staged {
            let previous = match set_aside(&target) {
                Ok(previous) => previous,
                Err(e) => {
                    roll_back(done);
                    return Err(e);
                }
            };
            if let Err(e) = tmp.persist(&target) {
                if let Some(previous) = previous {
                    restore(&target, previous);
                }
                roll_back(done);
                return Err(EocError::Io(io::Error::new(
                    e.error.kind(),
                    format!("{}: {}", target.display(), e.error),
                )));
            }
            done.push((target, previous));
        }
        Ok(done.into_iter().map(|(target, _)| target).collect())
    }
}

fn parent_dir(target: &Path) -> &Path {
    match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Moves an existing regular file at `target` to a temporary path in the
/// same directory. The copy is deleted when the returned path is dropped.
fn set_aside(target: &Path) -> Result<Option<TempPath>> {
    if !target.is_file() {
        return Ok(None);
    }
    let aside = NamedTempFile::new_in(parent_dir(target))?.into_temp_path();
    fs::rename(target, &aside)?;
    debug!(path = %target.display(), aside = %aside.display(), "moved existing output aside");
    Ok(Some(aside))
}

fn restore(target: &Path, previous: TempPath) {
    if let Err(e) = fs::rename(&previous, target) {
        warn!(path = %target.display(), error = %e, "could not restore previous output");
    }
}

fn roll_back(done: Vec<(PathBuf, Option<TempPath>)>) {
    for (target, previous) in done {
        match previous {
            Some(previous) => restore(&target, previous),
            None => {
                if let Err(e) = fs::remove_file(&target) {
                    warn!(path = %target.display(), error = %e, "could not remove output");
                }
            }
        }
    }
}
