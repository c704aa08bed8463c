//! Two-byte header markers on stub files.
//!
//! Tagged stubs start with `NV` instead of the `MZ` executable header. UPX
//! refuses files it does not recognise, so a stub is masked back to `MZ` for
//! the duration of a pack and restored to `NV` afterwards.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Marker written over the executable header of tagged stubs.
pub const STUB_SENTINEL: [u8; 2] = *b"NV";

/// Executable header the packer expects to find.
pub const EXE_HEADER: [u8; 2] = *b"MZ";

/// When masked stubs get their sentinel back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RestorePolicy {
    /// Restore only after a successful pack. A failed pack leaves stubs masked.
    #[default]
    OnSuccess,
    /// Restore on every exit path, including packer failure and I/O errors.
    Always,
}

fn read_first_two(file: &mut File) -> std::io::Result<Option<[u8; 2]>> {
    let mut buf = Vec::with_capacity(2);
    file.seek(SeekFrom::Start(0))?;
    Read::by_ref(file).take(2).read_to_end(&mut buf)?;
    Ok(<[u8; 2]>::try_from(buf.as_slice()).ok())
}

/// Read the first two bytes of a file.
///
/// Returns `Ok(None)` for files shorter than two bytes.
pub fn read_marker(path: &Path) -> Result<Option<[u8; 2]>> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open: {}", path.display()))?;
    read_first_two(&mut file).with_context(|| format!("Failed to read header: {}", path.display()))
}

/// Overwrite the first two bytes of `path` with `replacement` if they equal `expected`.
///
/// Returns `Ok(true)` if the file was rewritten. Any other header leaves the
/// file byte-for-byte unmodified.
pub fn swap_marker(path: &Path, expected: [u8; 2], replacement: [u8; 2]) -> Result<bool> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .with_context(|| format!("Failed to open for read/write: {}", path.display()))?;

    let current = read_first_two(&mut file)
        .with_context(|| format!("Failed to read header: {}", path.display()))?;
    if current != Some(expected) {
        return Ok(false);
    }

    file.seek(SeekFrom::Start(0))
        .and_then(|_| file.write_all(&replacement))
        .with_context(|| format!("Failed to write header: {}", path.display()))?;
    Ok(true)
}

/// Stubs currently carrying `MZ` in place of their `NV` sentinel.
///
/// Under [`RestorePolicy::Always`] the stubs are restored when this value is
/// dropped without an explicit [`restore`](Self::restore) or
/// [`leave_masked`](Self::leave_masked).
#[derive(Debug)]
#[must_use = "masked stubs should be restored or explicitly left masked"]
pub struct MaskedStubs {
    paths: Vec<PathBuf>,
    policy: RestorePolicy,
    settled: bool,
}

impl MaskedStubs {
    fn new(policy: RestorePolicy) -> Self {
        Self {
            paths: Vec::new(),
            policy,
            settled: false,
        }
    }

    /// Files that were masked, in source order.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Write the `NV` sentinel back over every masked file.
    pub fn restore(mut self) -> Result<()> {
        self.settled = true;
        restore_all(&self.paths)
    }

    /// Give up on restoration. Returns the files left carrying `MZ`.
    pub fn leave_masked(mut self) -> Vec<PathBuf> {
        self.settled = true;
        std::mem::take(&mut self.paths)
    }
}

impl Drop for MaskedStubs {
    fn drop(&mut self) {
        if self.settled || self.policy != RestorePolicy::Always {
            return;
        }
        if let Err(e) = restore_all(&self.paths) {
            warn!(error = %format!("{e:#}"), "failed to restore stub sentinel");
        }
    }
}

/// Overwrite the first two bytes of `path` with `marker`, whatever they are.
pub fn write_marker(path: &Path, marker: [u8; 2]) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .with_context(|| format!("Failed to open for writing: {}", path.display()))?;
    file.write_all(&marker)
        .with_context(|| format!("Failed to write header: {}", path.display()))
}

fn restore_all(paths: &[PathBuf]) -> Result<()> {
    for path in paths {
        write_marker(path, STUB_SENTINEL)?;
        debug!(path = %path.display(), "restored stub sentinel");
    }
    Ok(())
}

/// Swap `NV` for `MZ` on every source that carries the sentinel.
///
/// If a source cannot be opened, the error is returned. Files masked before
/// the failure are restored under [`RestorePolicy::Always`] and left masked
/// under [`RestorePolicy::OnSuccess`].
pub fn mask_stubs<P: AsRef<Path>>(sources: &[P], policy: RestorePolicy) -> Result<MaskedStubs> {
    let mut masked = MaskedStubs::new(policy);

    for source in sources {
        let path = source.as_ref();
        if swap_marker(path, STUB_SENTINEL, EXE_HEADER)? {
            debug!(path = %path.display(), "masked stub sentinel");
            masked.paths.push(path.to_path_buf());
        }
    }

    Ok(masked)
}
