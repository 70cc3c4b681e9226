//! Cache key derivation.
//!
//! The archive name is a pure function of the prefix, the raw lockfile bytes
//! and the target architecture, so identical lockfiles always map to the
//! same object in storage.

use crate::config::Settings;
use crate::error::{Error, Result};
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory the transient archive is written to.
pub const ARCHIVE_DIR: &str = "/tmp";

const ARCHIVE_EXTENSION: &str = "tar.gz";

/// Name and local location of the archive for one lockfile state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    /// Archive file name, also used verbatim as the object key.
    pub archive_name: String,
    /// Where the archive lives on local disk while in transit.
    pub archive_path: PathBuf,
}

impl CacheKey {
    /// Derive the key from the lockfile and clear any stale archive in `/tmp`.
    pub fn derive(settings: &Settings) -> Result<Self> {
        Self::derive_in(settings, Path::new(ARCHIVE_DIR))
    }

    /// Same as [`CacheKey::derive`] with a custom archive directory.
    pub fn derive_in(settings: &Settings, archive_dir: &Path) -> Result<Self> {
        let lockfile = read_lockfile(&settings.lockfile_path)?;
        let archive_name = archive_name(&settings.prefix, &lockfile, target_arch());
        let archive_path = archive_dir.join(&archive_name);

        remove_stale_archive(&archive_path)?;

        info!(archive = %archive_name, "Derived cache key");
        Ok(Self {
            archive_name,
            archive_path,
        })
    }

    /// Object key in the bucket.
    pub fn object_key(&self) -> &str {
        &self.archive_name
    }
}

/// Lowercase hex SHA-1 of the raw bytes.
pub fn checksum(contents: &[u8]) -> String {
    hex::encode(Sha1::digest(contents))
}

/// `{prefix}_{sha1}_{arch}.tar.gz`
pub fn archive_name(prefix: &str, lockfile: &[u8], arch: &str) -> String {
    format!(
        "{}_{}_{}.{}",
        prefix,
        checksum(lockfile),
        arch,
        ARCHIVE_EXTENSION
    )
}

/// Architecture name of the running build, in the short form used by
/// package ecosystems (`amd64`, `arm64`, `386`, ...).
pub fn target_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "loongarch64" => "loong64",
        "powerpc64" if cfg!(target_endian = "little") => "ppc64le",
        "powerpc64" => "ppc64",
        other => other,
    }
}

fn read_lockfile(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            Error::MissingLockfile(path.to_path_buf())
        } else {
            Error::UnreadableLockfile {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

fn remove_stale_archive(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Removed stale archive");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(Error::StaleArchive {
            path: path.to_path_buf(),
            source,
        }),
    }
}
