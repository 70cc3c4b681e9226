//! Bundle archiving and object storage (S3 compatible).

pub mod archiver;
pub mod content_type;
pub mod provider;
pub mod restore;
pub mod s3;

pub use archiver::{Archiver, SystemTarArchiver, TarGzArchiver};
pub use content_type::detect_content_type;
pub use provider::{FilesystemStore, ObjectStore};
pub use restore::{RESTORED_ARCHIVE_NAME, restore_bundle};
pub use s3::S3Store;
