//! Error types for the bundle cache.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Process exit codes.
pub mod exit_code {
    pub const OK: i32 = 0;
    pub const FAILURE: i32 = 1;
    pub const WRONG_USAGE: i32 = 2;
    pub const NO_CREDENTIALS: i32 = 3;
    pub const NO_BUNDLE: i32 = 4;
    pub const NO_LOCKFILE: i32 = 5;
}

/// A value that must be resolved before storage can be contacted.
///
/// Variants are declared in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential {
    AccessKey,
    SecretKey,
    Bucket,
    Region,
}

impl Credential {
    /// Environment variable consulted when the flag is empty.
    pub fn env_var(self) -> &'static str {
        match self {
            Credential::AccessKey => "AWS_ACCESS_KEY",
            Credential::SecretKey => "AWS_SECRET_KEY",
            Credential::Bucket => "S3_BUCKET",
            Credential::Region => "AWS_DEFAULT_REGION",
        }
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Credential::AccessKey => "S3 access key",
            Credential::SecretKey => "S3 secret key",
            Credential::Bucket => "S3 bucket name",
            Credential::Region => "S3 region name",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    // Configuration errors
    #[error("Please provide {0}")]
    MissingCredential(Credential),

    #[error("Invalid configuration: {0}")]
    Config(String),

    // Precondition errors
    #[error("Bundle path does not exist: {}", .0.display())]
    MissingBundle(PathBuf),

    #[error("{} does not exist", .0.display())]
    MissingLockfile(PathBuf),

    #[error("Unable to read {}: {source}", .path.display())]
    UnreadableLockfile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Operational errors
    #[error("Failed to remove existing archive {}: {source}", .path.display())]
    StaleArchive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to make archive: {0}")]
    Archive(String),

    #[error("Bundle directory already exists: {}", .0.display())]
    BundleExists(PathBuf),

    #[error("Unable to move file: {0}")]
    Move(String),

    #[error("Unable to extract: {0}")]
    Extract(String),

    // Transport errors
    #[error("Object not found in storage: {0}")]
    ObjectNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Exit code the process terminates with when this error is fatal.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::MissingCredential(_) => exit_code::NO_CREDENTIALS,
            Error::MissingBundle(_) => exit_code::NO_BUNDLE,
            Error::MissingLockfile(_) => exit_code::NO_LOCKFILE,
            _ => exit_code::FAILURE,
        }
    }
}
