// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cross-process advisory lock keyed by sidecar path.
//
// Guards a document's attribute sidecar against an interactive session and a
// batch worker touching it at the same time. The lock lives on a separate
// `<sidecar>.lock` file so the sidecar itself can be replaced atomically
// while the lock is held.

use std::fs::File;
use std::path::{Path, PathBuf};

use folio_core::error::{FolioError, Result};
use tracing::{debug, instrument};

/// Exclusive lock on one sidecar, released when dropped.
#[derive(Debug)]
pub struct SidecarLock {
    file: File,
    path: PathBuf,
}

impl SidecarLock {
    /// Path of the lock file guarding `sidecar`.
    pub fn lock_path(sidecar: &Path) -> PathBuf {
        let mut name = sidecar.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Block until the lock for `sidecar` is held. There is no timeout.
    #[cfg(unix)]
    #[instrument(fields(sidecar = %sidecar.display()))]
    pub fn acquire(sidecar: &Path) -> Result<Self> {
        use std::os::unix::io::AsRawFd;

        let path = Self::lock_path(sidecar);
        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| lock_err(&path, e))?;

        loop {
            let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
            if rc == 0 {
                break;
            }
            let err = std::io::Error::last_os_error();
            if err.kind() != std::io::ErrorKind::Interrupted {
                return Err(lock_err(&path, err));
            }
        }

        debug!(lock = %path.display(), "sidecar lock acquired");
        Ok(Self { file, path })
    }

    #[cfg(not(unix))]
    pub fn acquire(_sidecar: &Path) -> Result<Self> {
        Err(FolioError::PlatformUnavailable)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SidecarLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            unsafe {
                libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
            }
        }
        debug!(lock = %self.path.display(), "sidecar lock released");
    }
}

fn lock_err(path: &Path, err: std::io::Error) -> FolioError {
    FolioError::Lock {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, mpsc};
    use std::time::Duration;

    #[test]
    fn lock_file_sits_next_to_sidecar() {
        assert_eq!(
            SidecarLock::lock_path(Path::new("/docs/a.pdf.data.json")),
            PathBuf::from("/docs/a.pdf.data.json.lock")
        );
    }

    #[test]
    fn second_holder_waits_for_release() {
        let dir = tempfile::tempdir().unwrap();
        let sidecar = dir.path().join("a.pdf.data.json");

        let first = SidecarLock::acquire(&sidecar).unwrap();
        let acquired = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();

        let handle = {
            let sidecar = sidecar.clone();
            let acquired = Arc::clone(&acquired);
            std::thread::spawn(move || {
                tx.send(()).unwrap();
                // A separate open file description, so flock contends.
                let _second = SidecarLock::acquire(&sidecar).unwrap();
                acquired.store(true, Ordering::SeqCst);
            })
        };

        rx.recv().unwrap();
        std::thread::sleep(Duration::from_millis(100));
        assert!(!acquired.load(Ordering::SeqCst));

        drop(first);
        handle.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }

    #[test]
    fn reacquire_after_drop() {
        let dir = tempfile::tempdir().unwrap();
        let sidecar = dir.path().join("b.pdf.data.json");
        drop(SidecarLock::acquire(&sidecar).unwrap());
        let again = SidecarLock::acquire(&sidecar).unwrap();
        assert!(again.path().exists());
    }
}
