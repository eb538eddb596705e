use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use tempfile::NamedTempFile;

pub fn assert_not_stdout(path: &Path) -> Result<()> {
    if path == Path::new("-") {
        bail!("stdout is not supported; provide a real file path.");
    }
    Ok(())
}

/// Write-then-rename wrapper, so readers never observe a partial output.
pub struct PendingWrite {
    target: PathBuf,
    tmp: NamedTempFile,
}

impl PendingWrite {
    /// Open a temp file next to `target`. Refuses to clobber an existing file unless `force`.
    pub fn open(target: &Path, force: bool) -> Result<Self> {
        assert_not_stdout(target)?;
        let parent = match target.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)
            .with_context(|| format!("[io::write] create dir {}", parent.display()))?;
        if !force && target.exists() {
            bail!("Refusing to overwrite existing file: {} (use --force)", target.display());
        }
        let tmp = NamedTempFile::new_in(parent)
            .with_context(|| format!("[io::write] create temp file in {}", parent.display()))?;

        Ok(Self { target: target.to_path_buf(), tmp })
    }

    /// Flush, fsync and atomically move the temp file onto the target.
    pub fn commit(mut self) -> Result<()> {
        self.tmp.flush()
            .with_context(|| format!("[io::write] flush {}", self.target.display()))?;
        self.tmp.as_file().sync_all().ok(); // best-effort fsync file
        self.tmp.persist(&self.target)
            .with_context(|| format!("[io::write] rename to {}", self.target.display()))?;
        if let Some(dir) = self.target.parent() {
            let _ = File::open(dir).and_then(|f| f.sync_all());
        }
        Ok(())
    }
}

impl Write for PendingWrite {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> { self.tmp.write(buf) }
    fn flush(&mut self) -> std::io::Result<()> { self.tmp.flush() }
}

/// Write `bytes` to `target` atomically.
pub fn write_atomic(target: &Path, force: bool, bytes: &[u8]) -> Result<()> {
    let mut sink = PendingWrite::open(target, force)?;
    sink.write_all(bytes)
        .with_context(|| format!("[io::write] write {}", target.display()))?;
    sink.commit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_stdout() {
        assert!(assert_not_stdout(Path::new("-")).is_err());
        assert!(PendingWrite::open(Path::new("-"), true).is_err());
    }

    #[test]
    fn overwrite_requires_force() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("out.txt");

        write_atomic(&target, false, b"first").unwrap();
        assert!(write_atomic(&target, false, b"second").is_err());
        assert_eq!(fs::read(&target).unwrap(), b"first");

        write_atomic(&target, true, b"second").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"second");
    }

    #[test]
    fn uncommitted_write_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.txt");
        {
            let mut sink = PendingWrite::open(&target, false).unwrap();
            sink.write_all(b"partial").unwrap();
        }
        assert!(!target.exists());
    }
}
