//! Bundle Cache Core
//!
//! Shared vocabulary for the bundle cache: the error taxonomy and its exit
//! codes, resolution of flags/environment/config file into immutable
//! [`Settings`], and derivation of the content-addressed [`CacheKey`].

pub mod config;
pub mod error;
pub mod keys;

pub use config::{CliOptions, FileConfig, Settings};
pub use error::{Credential, Error, Result, exit_code};
pub use keys::{CacheKey, archive_name, checksum, target_arch};
