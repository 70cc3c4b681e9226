//! Bundle directory archiving.
//!
//! Archives are gzip-compressed tarballs whose entries are relative to the
//! bundle directory root, so they can be unpacked into any fresh directory.

use bundle_cache_core::{Error, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

/// Packs a directory into an archive file and unpacks it again.
pub trait Archiver: Send + Sync {
    /// Compress the full contents of `src_dir` into `dest`.
    fn archive(&self, src_dir: &Path, dest: &Path) -> Result<()>;

    /// Decompress `archive` into the existing directory `dest_dir`.
    fn extract(&self, archive: &Path, dest_dir: &Path) -> Result<()>;
}

/// In-process tar + gzip archiver.
#[derive(Debug, Clone, Copy)]
pub struct TarGzArchiver {
    level: Compression,
}

impl TarGzArchiver {
    pub fn new(level: Compression) -> Self {
        Self { level }
    }
}

impl Default for TarGzArchiver {
    fn default() -> Self {
        Self::new(Compression::default())
    }
}

impl Archiver for TarGzArchiver {
    fn archive(&self, src_dir: &Path, dest: &Path) -> Result<()> {
        info!(src = %src_dir.display(), dest = %dest.display(), "Creating archive");

        let file = File::create(dest)
            .map_err(|e| Error::Archive(format!("Failed to create {}: {}", dest.display(), e)))?;
        let encoder = GzEncoder::new(file, self.level);

        let mut builder = tar::Builder::new(encoder);
        builder.follow_symlinks(false);
        builder
            .append_dir_all(".", src_dir)
            .map_err(|e| Error::Archive(format!("Failed to pack dir: {}", e)))?;

        let encoder = builder
            .into_inner()
            .map_err(|e| Error::Archive(format!("Failed to finish tar: {}", e)))?;
        encoder
            .finish()
            .map_err(|e| Error::Archive(format!("Gzip finish failed: {}", e)))?;

        debug!(dest = %dest.display(), "Archive written");
        Ok(())
    }

    fn extract(&self, archive: &Path, dest_dir: &Path) -> Result<()> {
        info!(archive = %archive.display(), dest = %dest_dir.display(), "Extracting archive");

        let file = File::open(archive)
            .map_err(|e| Error::Extract(format!("Failed to open {}: {}", archive.display(), e)))?;
        let mut tarball = tar::Archive::new(GzDecoder::new(file));
        tarball.set_preserve_permissions(true);
        tarball.set_overwrite(true);
        tarball
            .unpack(dest_dir)
            .map_err(|e| Error::Extract(format!("Failed to unpack archive: {}", e)))?;
        Ok(())
    }
}

/// Archiver that runs the system `tar` binary.
///
/// Paths are passed as separate arguments, never through a shell.
#[derive(Debug, Clone)]
pub struct SystemTarArchiver {
    program: OsString,
}

impl SystemTarArchiver {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[&OsStr]) -> std::result::Result<(), String> {
        debug!(program = ?self.program, ?args, "Running tar");

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| format!("Failed to run {:?}: {}", self.program, e))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(format!("tar exited with {}: {}", output.status, stderr.trim()))
        }
    }
}

impl Default for SystemTarArchiver {
    fn default() -> Self {
        Self::new("tar")
    }
}

impl Archiver for SystemTarArchiver {
    fn archive(&self, src_dir: &Path, dest: &Path) -> Result<()> {
        info!(src = %src_dir.display(), dest = %dest.display(), "Creating archive with tar");
        self.run(&[
            OsStr::new("-czf"),
            dest.as_os_str(),
            OsStr::new("-C"),
            src_dir.as_os_str(),
            OsStr::new("."),
        ])
        .map_err(Error::Archive)
    }

    fn extract(&self, archive: &Path, dest_dir: &Path) -> Result<()> {
        info!(archive = %archive.display(), dest = %dest_dir.display(), "Extracting archive with tar");
        self.run(&[
            OsStr::new("-xzf"),
            archive.as_os_str(),
            OsStr::new("-C"),
            dest_dir.as_os_str(),
        ])
        .map_err(Error::Extract)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    /// Relative path -> file contents for every regular file under `root`.
    pub(crate) fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Vec<u8>>) {
            for entry in std::fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    walk(root, &path, out);
                } else {
                    let rel = path.strip_prefix(root).unwrap().to_path_buf();
                    out.insert(rel, std::fs::read(&path).unwrap());
                }
            }
        }
        let mut out = BTreeMap::new();
        walk(root, root, &mut out);
        out
    }

    /// A small bundle tree with nesting and binary content.
    pub(crate) fn populate_bundle(dir: &Path) {
        std::fs::create_dir_all(dir.join("ruby/3.2.0/gems/rake-13.0.6/lib")).unwrap();
        std::fs::write(dir.join("config"), "BUNDLE_PATH: \"vendor\"\n").unwrap();
        std::fs::write(
            dir.join("ruby/3.2.0/gems/rake-13.0.6/lib/rake.rb"),
            "module Rake; end\n",
        )
        .unwrap();
        std::fs::write(dir.join("ruby/3.2.0/native.so"), [0u8, 159, 146, 150, 255]).unwrap();
    }

    #[test]
    fn test_targz_roundtrip() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        populate_bundle(src.path());
        let archive = out.path().join("bundle.tar.gz");

        let archiver = TarGzArchiver::default();
        archiver.archive(src.path(), &archive).unwrap();
        archiver.extract(&archive, dest.path()).unwrap();

        assert_eq!(snapshot(src.path()), snapshot(dest.path()));
    }

    #[test]
    fn test_targz_writes_gzip() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        populate_bundle(src.path());
        let archive = out.path().join("bundle.tar.gz");

        TarGzArchiver::default().archive(src.path(), &archive).unwrap();

        let bytes = std::fs::read(&archive).unwrap();
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
    }

    #[cfg(unix)]
    #[test]
    fn test_targz_keeps_symlinks() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("target.txt"), "hi").unwrap();
        std::os::unix::fs::symlink("target.txt", src.path().join("link.txt")).unwrap();
        let archive = out.path().join("bundle.tar.gz");

        let archiver = TarGzArchiver::default();
        archiver.archive(src.path(), &archive).unwrap();
        archiver.extract(&archive, dest.path()).unwrap();

        let link = std::fs::read_link(dest.path().join("link.txt")).unwrap();
        assert_eq!(link, PathBuf::from("target.txt"));
    }

    #[test]
    fn test_targz_missing_source() {
        let out = tempfile::tempdir().unwrap();
        let err = TarGzArchiver::default()
            .archive(&out.path().join("absent"), &out.path().join("a.tar.gz"))
            .unwrap_err();
        assert!(matches!(err, Error::Archive(_)));
    }

    #[test]
    fn test_targz_corrupt_archive() {
        let out = tempfile::tempdir().unwrap();
        let archive = out.path().join("broken.tar.gz");
        std::fs::write(&archive, b"not an archive").unwrap();

        let err = TarGzArchiver::default()
            .extract(&archive, out.path())
            .unwrap_err();
        assert!(matches!(err, Error::Extract(_)));
    }

    #[test]
    fn test_system_tar_reads_native_archive() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        populate_bundle(src.path());
        let archive = out.path().join("bundle.tar.gz");

        TarGzArchiver::default().archive(src.path(), &archive).unwrap();
        SystemTarArchiver::default()
            .extract(&archive, dest.path())
            .unwrap();

        assert_eq!(snapshot(src.path()), snapshot(dest.path()));
    }

    #[test]
    fn test_system_tar_reports_failure() {
        let out = tempfile::tempdir().unwrap();
        let archive = out.path().join("broken.tar.gz");
        std::fs::write(&archive, b"not an archive").unwrap();

        let err = SystemTarArchiver::default()
            .extract(&archive, out.path())
            .unwrap_err();
        assert!(matches!(err, Error::Extract(_)));
    }

    #[test]
    fn test_system_tar_missing_binary() {
        let out = tempfile::tempdir().unwrap();
        let err = SystemTarArchiver::new("/nonexistent/tar")
            .archive(out.path(), &out.path().join("a.tar.gz"))
            .unwrap_err();
        assert!(err.to_string().contains("Failed to run"));
    }
}
