//! Option resolution.
//!
//! Command-line flags, environment variables and an optional YAML config
//! file are merged once into an immutable [`Settings`] value. Flags win over
//! the environment, the environment wins over the file.

use crate::error::{Credential, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Directory holding the installed dependency bundle.
pub const BUNDLE_DIR: &str = ".bundle";
/// Lockfile whose content hash keys the cache.
pub const LOCKFILE: &str = "Gemfile.lock";
/// Empty marker written into the bundle directory after a download.
pub const CACHE_MARKER: &str = ".cache";
/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "BUNDLE_CACHE_CONFIG";

const FALLBACK_PREFIX: &str = "bundle";

/// Raw values as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub prefix: Option<String>,
    pub path: Option<PathBuf>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub bucket: Option<String>,
    pub region: Option<String>,
}

/// Optional defaults read from `config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub prefix: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub bucket: Option<String>,
    pub region: Option<String>,
}

impl FileConfig {
    /// Load the config file if one exists.
    ///
    /// A missing file yields the empty config; a file that exists but cannot
    /// be read or parsed is an error.
    pub fn load<F>(env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        match Self::config_path(env) {
            Some(path) if path.exists() => Self::from_file(&path),
            Some(path) => {
                debug!(path = %path.display(), "No config file");
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// Like [`FileConfig::load`], but a broken file is reported and ignored
    /// so it cannot mask the exit status of the actual run.
    pub fn load_or_default<F>(env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::load(env).unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring config file");
            Self::default()
        })
    }

    /// Parse a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config = serde_yaml::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Location of the config file: `$BUNDLE_CACHE_CONFIG`, or `config.yaml`
    /// in the user's config directory.
    pub fn config_path<F>(env: F) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = non_empty(env(CONFIG_ENV)) {
            return Some(PathBuf::from(path));
        }
        directories::ProjectDirs::from("io", "bundle-cache", "bundle-cache")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    fn credential(&self, credential: Credential) -> Option<String> {
        let value = match credential {
            Credential::AccessKey => &self.access_key,
            Credential::SecretKey => &self.secret_key,
            Credential::Bucket => &self.bucket,
            Credential::Region => &self.region,
        };
        non_empty(value.clone())
    }
}

/// Fully resolved configuration for one invocation.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    /// Directory containing the lockfile and the bundle directory.
    pub path: PathBuf,
    /// Archive name prefix.
    pub prefix: String,
    pub bundle_path: PathBuf,
    pub lockfile_path: PathBuf,
    pub cache_marker_path: PathBuf,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
}

impl Settings {
    /// Resolve flags against the environment and config file.
    ///
    /// Credentials are checked in a fixed order (access key, secret key,
    /// bucket, region) and the first one that stays empty is reported.
    pub fn resolve<F>(options: CliOptions, file: &FileConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let access_key = resolve_credential(options.access_key, Credential::AccessKey, file, &env)?;
        let secret_key = resolve_credential(options.secret_key, Credential::SecretKey, file, &env)?;
        let bucket = resolve_credential(options.bucket, Credential::Bucket, file, &env)?;
        let region = resolve_credential(options.region, Credential::Region, file, &env)?;

        let path = match options.path.filter(|p| !p.as_os_str().is_empty()) {
            Some(path) => normalize(&std::path::absolute(&path)?),
            None => std::env::current_dir()?,
        };

        let prefix = non_empty(options.prefix)
            .or_else(|| non_empty(file.prefix.clone()))
            .unwrap_or_else(|| basename(&path));

        let bundle_path = path.join(BUNDLE_DIR);
        let lockfile_path = path.join(LOCKFILE);
        let cache_marker_path = bundle_path.join(CACHE_MARKER);

        Ok(Self {
            path,
            prefix,
            bundle_path,
            lockfile_path,
            cache_marker_path,
            access_key,
            secret_key,
            bucket,
            region,
        })
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("path", &self.path)
            .field("prefix", &self.prefix)
            .field("bundle_path", &self.bundle_path)
            .field("lockfile_path", &self.lockfile_path)
            .field("cache_marker_path", &self.cache_marker_path)
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .finish()
    }
}

/// Read a variable from the process environment.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn resolve_credential<F>(
    flag: Option<String>,
    credential: Credential,
    file: &FileConfig,
    env: &F,
) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(flag)
        .or_else(|| non_empty(env(credential.env_var())))
        .or_else(|| file.credential(credential))
        .ok_or(Error::MissingCredential(credential))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Resolve `.` and `..` components lexically.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_PREFIX.to_string())
}
