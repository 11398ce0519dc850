use crate::error::Result;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};

/// A fully written and fsynced temporary file that has not yet replaced its
/// target. Dropping it without calling [`StagedWrite::commit`] removes the
/// temporary file and leaves the target untouched.
pub struct StagedWrite {
    tmp: NamedTempFile,
    target: PathBuf,
}

impl StagedWrite {
    pub fn temp_path(&self) -> &Path {
        self.tmp.path()
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename the staged file over the target, then best-effort fsync the
    /// containing directory so the rename itself is durable.
    pub fn commit(self) -> Result<()> {
        let StagedWrite { tmp, target } = self;
        tmp.persist(&target).map_err(|e| e.error)?;
        fsync_dir(parent_dir(&target)).ok();
        Ok(())
    }
}

/// Write `data` into a uniquely named sibling of `path` and force it to disk.
/// The target is not touched until the returned value is committed.
pub fn stage_durable(path: &Path, data: &[u8]) -> Result<StagedWrite> {
    let dir = parent_dir(path);
    std::fs::create_dir_all(dir)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut tmp = Builder::new()
        .prefix(&format!(".tmp.{name}."))
        .tempfile_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    Ok(StagedWrite {
        tmp,
        target: path.to_path_buf(),
    })
}

/// Crash-safe replace: temp file, fsync, rename, directory fsync.
/// A reader sees either the old content or the new content, never a mix.
pub fn write_atomic_durable(path: &Path, data: &[u8]) -> Result<()> {
    stage_durable(path, data)?.commit()
}

/// Append text to a file, creating it (and its parents) if needed.
pub fn append_text(path: &Path, text: &str) -> Result<()> {
    std::fs::create_dir_all(parent_dir(path))?;
    let mut f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    f.write_all(text.as_bytes())?;
    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

// Not supported on every platform/filesystem; callers treat failure as benign.
fn fsync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}
