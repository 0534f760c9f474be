//! Volume discovery and raw volume access.
//!
//! Discovery walks the OS-visible volumes and picks the first one
//! hosting the Windows directory tree. Opening uses backup semantics
//! and a permissive share mode so the handle reads the raw volume
//! underneath the exclusive locks held on in-use system files.

use crate::error::{ExtractionError, Result};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Resolves the volume to scan: an explicit path wins, otherwise the
/// first discovered volume hosting the operating system.
pub fn resolve_volume(explicit: Option<&str>) -> Result<String> {
    match explicit {
        Some(path) => Ok(path.to_string()),
        None => find_system_volume().ok_or(ExtractionError::NoVolumeFound),
    }
}

/// First volume hosting the operating system directory tree, as a raw
/// volume path without the trailing backslash.
pub fn find_system_volume() -> Option<String> {
    enumerate_volumes()
        .into_iter()
        .find(|volume| hosts_windows_directory(volume))
}

/// Whether `\Windows` resolves under the volume root.
fn hosts_windows_directory(volume: &str) -> bool {
    std::fs::metadata(format!("{volume}\\Windows"))
        .map(|metadata| metadata.is_dir())
        .unwrap_or(false)
}

#[cfg(windows)]
fn enumerate_volumes() -> Vec<String> {
    use windows_sys::Win32::Foundation::{INVALID_HANDLE_VALUE, MAX_PATH};
    use windows_sys::Win32::Storage::FileSystem::{
        FindFirstVolumeW, FindNextVolumeW, FindVolumeClose,
    };

    let mut volumes = Vec::new();
    let mut name = [0u16; MAX_PATH as usize + 1];

    unsafe {
        let find_handle = FindFirstVolumeW(name.as_mut_ptr(), name.len() as u32);
        if find_handle == INVALID_HANDLE_VALUE {
            return volumes;
        }
        loop {
            volumes.push(volume_path_from(&name));
            if FindNextVolumeW(find_handle, name.as_mut_ptr(), name.len() as u32) == 0 {
                break;
            }
        }
        FindVolumeClose(find_handle);
    }

    volumes
}

/// Decodes a NUL-terminated UTF-16 volume name, trimming the trailing
/// backslash so paths compose uniformly.
#[cfg(windows)]
fn volume_path_from(buffer: &[u16]) -> String {
    let len = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
    let mut path = String::from_utf16_lossy(&buffer[..len]);
    if path.ends_with('\\') {
        path.pop();
    }
    path
}

#[cfg(not(windows))]
fn enumerate_volumes() -> Vec<String> {
    Vec::new()
}

/// Opens a raw volume (or a disk image) read-only for scanning.
pub fn open_volume(path: impl AsRef<Path>) -> io::Result<File> {
    open_raw(path.as_ref())
}

#[cfg(windows)]
fn open_raw(path: &Path) -> io::Result<File> {
    use std::os::windows::fs::OpenOptionsExt;
    use windows_sys::Win32::Storage::FileSystem::{
        FILE_FLAG_BACKUP_SEMANTICS, FILE_SHARE_READ, FILE_SHARE_WRITE,
    };

    OpenOptions::new()
        .read(true)
        .share_mode(FILE_SHARE_READ | FILE_SHARE_WRITE)
        .custom_flags(FILE_FLAG_BACKUP_SEMANTICS)
        .open(path)
}

#[cfg(not(windows))]
fn open_raw(path: &Path) -> io::Result<File> {
    OpenOptions::new().read(true).open(path)
}
