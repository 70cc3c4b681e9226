//! Upload and download flows.

use bundle_cache_core::{CacheKey, Error, Result, Settings};
use bundle_cache_store::{Archiver, ObjectStore, restore_bundle};
use console::style;
use std::path::Path;
use tracing::{info, warn};

/// How a flow finished without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The archive was stored.
    Uploaded { bytes: u64 },
    /// The archive was fetched and unpacked into `.bundle`.
    Downloaded { bytes: u64 },
    /// The cache marker exists, nothing to upload.
    AlreadyCached,
    /// `.bundle` already exists, nothing to download.
    BundlePresent,
    /// No archive is stored for this key yet.
    CacheMiss,
}

impl Outcome {
    /// Skips are reported on stderr, completions on stdout.
    pub fn is_skip(&self) -> bool {
        !matches!(self, Outcome::Uploaded { .. } | Outcome::Downloaded { .. })
    }

    pub fn message(&self) -> &'static str {
        match self {
            Outcome::Uploaded { .. } | Outcome::Downloaded { .. } => "Done",
            Outcome::AlreadyCached => "Your bundle is cached, skipping.",
            Outcome::BundlePresent => "Bundle path already exists, skipping.",
            Outcome::CacheMiss => "No cached bundle for this lockfile, skipping.",
        }
    }
}

/// Archive `.bundle` and put it in the store.
pub async fn upload(
    settings: &Settings,
    key: &CacheKey,
    archiver: &dyn Archiver,
    store: &dyn ObjectStore,
) -> Result<Outcome> {
    if settings.cache_marker_path.exists() {
        return Ok(Outcome::AlreadyCached);
    }

    if !settings.bundle_path.exists() {
        return Err(Error::MissingBundle(settings.bundle_path.clone()));
    }

    println!("{} Archiving...", style("▶").cyan());
    archiver.archive(&settings.bundle_path, &key.archive_path)?;

    println!(
        "{} Uploading bundle to {}...",
        style("▶").cyan(),
        store.name()
    );
    let bytes = store.put(&key.archive_path, key.object_key()).await?;
    info!(key = %key.archive_name, bytes, "Bundle uploaded");

    discard(&key.archive_path);
    Ok(Outcome::Uploaded { bytes })
}

/// Fetch the archive for this lockfile and unpack it into `.bundle`.
pub async fn download(
    settings: &Settings,
    key: &CacheKey,
    archiver: &dyn Archiver,
    store: &dyn ObjectStore,
) -> Result<Outcome> {
    if settings.bundle_path.exists() {
        return Ok(Outcome::BundlePresent);
    }

    let mut file = tokio::fs::File::create(&key.archive_path).await?;

    println!(
        "{} Downloading bundle from {}... {}",
        style("▶").cyan(),
        store.name(),
        style(&key.archive_name).bold()
    );
    let fetched = store.get(key.object_key(), &mut file).await;
    drop(file);

    let bytes = match fetched {
        Ok(bytes) => bytes,
        Err(Error::ObjectNotFound(object)) => {
            info!(key = %object, "Cache miss");
            discard(&key.archive_path);
            return Ok(Outcome::CacheMiss);
        }
        Err(e) => {
            discard(&key.archive_path);
            return Err(e);
        }
    };

    println!("{} Extracting...", style("▶").cyan());
    match restore_bundle(archiver, &key.archive_path, &settings.path) {
        Ok(_) => {}
        Err(Error::BundleExists(path)) => {
            warn!(path = %path.display(), "Bundle directory appeared during download");
            discard(&key.archive_path);
            return Ok(Outcome::BundlePresent);
        }
        Err(e) => return Err(e),
    }

    if !settings.cache_marker_path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&settings.cache_marker_path)?;
    }

    Ok(Outcome::Downloaded { bytes })
}

/// Best-effort removal of a transient archive.
fn discard(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove archive");
        }
    }
}
