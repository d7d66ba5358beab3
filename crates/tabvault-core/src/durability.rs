//! Durable file replacement
//!
//! Table files are never rewritten in place. New content goes to a hidden
//! temporary file in the same directory, is synced to stable storage, and is
//! then renamed over the target. Readers see either the old file or the new
//! one, never a partial write.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{TabError, TabResult};

/// Suffix of in-progress temporary files.
pub const PART_SUFFIX: &str = ".part";

static TEMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Flush file contents to stable storage.
///
/// Linux uses fdatasync(), Apple platforms F_FULLFSYNC, Windows
/// FlushFileBuffers(); anything else falls back to `sync_data`.
pub fn sync_file(file: &File) -> io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: the descriptor comes from a live `File`.
        let rc = unsafe { libc::fdatasync(file.as_raw_fd()) };
        if rc == 0 { Ok(()) } else { Err(io::Error::last_os_error()) }
    }

    #[cfg(any(target_os = "macos", target_os = "ios"))]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: the descriptor comes from a live `File`.
        let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_FULLFSYNC) };
        if rc == 0 { Ok(()) } else { Err(io::Error::last_os_error()) }
    }

    #[cfg(target_os = "windows")]
    {
        use std::os::windows::io::AsRawHandle;
        use winapi::um::fileapi::FlushFileBuffers;
        // SAFETY: the handle comes from a live `File`.
        let rc = unsafe { FlushFileBuffers(file.as_raw_handle() as *mut _) };
        if rc != 0 { Ok(()) } else { Err(io::Error::last_os_error()) }
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "ios", target_os = "windows")))]
    {
        file.sync_data()
    }
}

/// Persist a rename by syncing the directory entry.
///
/// No-op on Windows, where directories cannot be opened as files.
pub fn sync_dir(dir: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        let handle = File::open(dir)?;
        // SAFETY: the descriptor comes from a live `File`.
        let rc = unsafe { libc::fsync(std::os::unix::io::AsRawFd::as_raw_fd(&handle)) };
        if rc == 0 { Ok(()) } else { Err(io::Error::last_os_error()) }
    }

    #[cfg(not(unix))]
    {
        let _ = dir;
        Ok(())
    }
}

/// A file being written that replaces `target` only on [`AtomicFile::commit`].
///
/// Dropping an uncommitted `AtomicFile` removes its temporary file.
pub struct AtomicFile {
    file: Option<File>,
    temp_path: PathBuf,
    target: PathBuf,
    written: u64,
}

impl AtomicFile {
    /// Open a fresh temporary file next to `target`.
    ///
    /// The temporary name does not embed the target name, so any name the
    /// directory accepts can be written.
    pub fn create(target: impl AsRef<Path>) -> TabResult<Self> {
        let target = target.as_ref().to_path_buf();
        if target.file_name().is_none() {
            return Err(TabError::Io {
                path: Some(target),
                kind: io::ErrorKind::InvalidInput,
                message: "target has no file name".to_string(),
            });
        }

        let seq = TEMP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let temp_path = parent_dir(&target).join(format!(".{}.{}{}", std::process::id(), seq, PART_SUFFIX));

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .map_err(|e| TabError::io_at(&temp_path, e, "Failed to create temporary file"))?;

        Ok(Self { file: Some(file), temp_path, target, written: 0 })
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Sync the temporary file, rename it over the target, sync the directory.
    pub fn commit(mut self) -> TabResult<PathBuf> {
        if let Some(file) = self.file.as_ref() {
            sync_file(file).map_err(|e| TabError::io_at(&self.temp_path, e, "durable sync failed"))?;
        }
        drop(self.file.take());

        if let Err(e) = fs::rename(&self.temp_path, &self.target) {
            let _ = fs::remove_file(&self.temp_path);
            return Err(TabError::io_at(&self.target, e, "Failed to move file into place"));
        }

        let dir = parent_dir(&self.target);
        if let Err(e) = sync_dir(dir) {
            log::warn!("Directory sync failed for {}: {}", dir.display(), e);
        }
        Ok(self.target.clone())
    }
}

impl Write for AtomicFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "file already committed"))?;
        let n = file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(f) => f.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for AtomicFile {
    fn drop(&mut self) {
        if self.file.take().is_some() {
            let _ = fs::remove_file(&self.temp_path);
        }
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Replace `target` with `bytes` atomically.
pub fn write_atomic(target: impl AsRef<Path>, bytes: &[u8]) -> TabResult<PathBuf> {
    let mut file = AtomicFile::create(target)?;
    let temp = file.temp_path.clone();
    file.write_all(bytes)
        .map_err(|e| TabError::io_at(temp, e, "Failed to write file contents"))?;
    file.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn dir_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_sync_file_success() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"payload").unwrap();
        assert!(sync_file(file.as_file()).is_ok());
    }

    #[test]
    fn test_write_atomic_replaces_target() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("a.tbl");
        fs::write(&target, b"old").unwrap();

        write_atomic(&target, b"new contents").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"new contents");
        assert_eq!(dir_names(tmp.path()), vec!["a.tbl".to_string()]);
    }

    #[test]
    fn test_uncommitted_file_is_removed() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("b.tbl");
        {
            let mut file = AtomicFile::create(&target).unwrap();
            file.write_all(b"partial").unwrap();
            assert_eq!(file.written(), 7);
            assert_eq!(dir_names(tmp.path()).len(), 1);
            assert!(dir_names(tmp.path())[0].ends_with(PART_SUFFIX));
        }
        assert!(dir_names(tmp.path()).is_empty());
        assert!(!target.exists());
    }

    #[test]
    fn test_long_target_name() {
        let tmp = TempDir::new().unwrap();
        let name = format!("{}.tbl", "a".repeat(251));
        let target = tmp.path().join(&name);

        write_atomic(&target, b"abc").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"abc");
        assert_eq!(dir_names(tmp.path()), vec![name]);
    }
}
