//! Unpacking a downloaded archive into a fresh bundle directory.

use crate::archiver::Archiver;
use bundle_cache_core::config::BUNDLE_DIR;
use bundle_cache_core::{Error, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name the archive is given inside the bundle directory while unpacking.
pub const RESTORED_ARCHIVE_NAME: &str = "bundle_cache.tar.gz";

/// Restore `archive` into `<work_dir>/.bundle`.
///
/// Runs four steps and stops at the first failure, leaving whatever the
/// earlier steps produced in place:
///
/// 1. create `.bundle` exclusively (an existing directory is never touched)
/// 2. move the archive into it as `bundle_cache.tar.gz`
/// 3. extract it in place
/// 4. delete the archive
pub fn restore_bundle(archiver: &dyn Archiver, archive: &Path, work_dir: &Path) -> Result<PathBuf> {
    let bundle_dir = work_dir.join(BUNDLE_DIR);

    match std::fs::create_dir(&bundle_dir) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(Error::BundleExists(bundle_dir));
        }
        Err(e) => return Err(Error::Io(e)),
    }

    let target = bundle_dir.join(RESTORED_ARCHIVE_NAME);
    move_file(archive, &target)?;

    archiver.extract(&target, &bundle_dir)?;

    std::fs::remove_file(&target)
        .map_err(|e| Error::Extract(format!("Unable to remove archive: {}", e)))?;

    info!(bundle = %bundle_dir.display(), "Bundle restored");
    Ok(bundle_dir)
}

/// Rename, falling back to copy and delete across filesystems.
fn move_file(from: &Path, to: &Path) -> Result<()> {
    let describe = |e: std::io::Error| {
        Error::Move(format!("{} -> {}: {}", from.display(), to.display(), e))
    };

    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => {
            debug!(from = %from.display(), to = %to.display(), "Cross-device move, copying");
            copy_then_remove(from, to)
        }
        Err(e) => Err(describe(e)),
    }
}

fn copy_then_remove(from: &Path, to: &Path) -> Result<()> {
    let describe = |e: std::io::Error| {
        Error::Move(format!("{} -> {}: {}", from.display(), to.display(), e))
    };
    std::fs::copy(from, to).map_err(describe)?;
    std::fs::remove_file(from).map_err(describe)?;
    Ok(())
}
