//! Platform durable-sync shim
//!
//! The journal rebuild relies on "sync the new file, then rename" for crash
//! atomicity, which is only sound if the sync actually reaches persistent
//! storage. Each platform spells that differently.

use std::fs::File;
use std::io;

/// Ensure file data is durably written to persistent storage.
///
/// - Linux: `fdatasync()` — data without metadata, sufficient here
/// - macOS/iOS: `fcntl(F_FULLFSYNC)` — plain fsync only reaches the disk's
///   volatile write cache on Apple platforms
/// - Windows: `FlushFileBuffers()`
/// - Other: `File::sync_data()` fallback
pub(crate) fn durable_sync(file: &File) -> io::Result<()> {
    imp::durable_sync(file)
}

#[cfg(target_os = "linux")]
mod imp {
    use std::fs::File;
    use std::io;
    use std::os::unix::io::AsRawFd;

    pub(super) fn durable_sync(file: &File) -> io::Result<()> {
        // SAFETY: fdatasync operates on the fd of a live File reference.
        if unsafe { libc::fdatasync(file.as_raw_fd()) } == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
mod imp {
    use std::fs::File;
    use std::io;
    use std::os::unix::io::AsRawFd;

    pub(super) fn durable_sync(file: &File) -> io::Result<()> {
        // SAFETY: fcntl(F_FULLFSYNC) operates on the fd of a live File reference.
        if unsafe { libc::fcntl(file.as_raw_fd(), libc::F_FULLFSYNC) } == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

#[cfg(target_os = "windows")]
mod imp {
    use std::fs::File;
    use std::io;
    use std::os::windows::io::AsRawHandle;
    use winapi::um::fileapi::FlushFileBuffers;

    pub(super) fn durable_sync(file: &File) -> io::Result<()> {
        // SAFETY: FlushFileBuffers operates on the handle of a live File reference.
        if unsafe { FlushFileBuffers(file.as_raw_handle() as *mut _) } != 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "ios",
    target_os = "windows"
)))]
mod imp {
    use std::fs::File;
    use std::io;

    pub(super) fn durable_sync(file: &File) -> io::Result<()> {
        file.sync_data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_durable_sync_succeeds() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"journal bytes").unwrap();

        let result = durable_sync(file.as_file());
        assert!(result.is_ok(), "durable_sync failed: {:?}", result.err());
    }
}
