//! CLI argument definitions.

use bundle_cache_core::CliOptions;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bundle_cache")]
#[command(version, about = "Cache a dependency bundle in S3, keyed by its lockfile checksum", long_about = None)]
pub struct Cli {
    /// Custom archive filename prefix (default: current dir name)
    #[arg(long)]
    pub prefix: Option<String>,

    /// Path to directory with .bundle (default: current)
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// S3 access key [env: AWS_ACCESS_KEY]
    #[arg(long)]
    pub access_key: Option<String>,

    /// S3 secret key [env: AWS_SECRET_KEY]
    #[arg(long)]
    pub secret_key: Option<String>,

    /// S3 bucket name [env: S3_BUCKET]
    #[arg(long)]
    pub bucket: Option<String>,

    /// AWS region [env: AWS_DEFAULT_REGION]
    #[arg(long)]
    pub region: Option<String>,

    /// Archive with the system `tar` binary instead of the built-in one
    #[arg(long)]
    pub system_tar: bool,

    /// Send requests to an S3-compatible endpoint (path-style addressing)
    #[arg(long, value_name = "URL", conflicts_with = "store_dir")]
    pub endpoint_url: Option<String>,

    /// Keep archives in a local directory instead of S3
    #[arg(long, hide = true, value_name = "DIR")]
    pub store_dir: Option<PathBuf>,

    /// What to do with the bundle
    #[arg(value_enum)]
    pub action: Action,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Archive .bundle and store it
    Upload,
    /// Fetch the stored archive into .bundle
    Download,
}

impl Cli {
    /// Flag values that feed option resolution.
    pub fn options(&self) -> CliOptions {
        CliOptions {
            prefix: self.prefix.clone(),
            path: self.path.clone(),
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            bucket: self.bucket.clone(),
            region: self.region.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use clap::error::ErrorKind;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "bundle_cache",
            "--prefix",
            "myapp",
            "--bucket",
            "ci",
            "--access-key=",
            "download",
        ])
        .unwrap();

        assert_eq!(cli.action, Action::Download);
        let options = cli.options();
        assert_eq!(options.prefix.as_deref(), Some("myapp"));
        assert_eq!(options.bucket.as_deref(), Some("ci"));
        assert_eq!(options.access_key.as_deref(), Some(""));
        assert_eq!(options.region, None);
    }

    #[test]
    fn test_parse_endpoint_url() {
        let cli = Cli::try_parse_from([
            "bundle_cache",
            "--endpoint-url",
            "http://localhost:9000",
            "upload",
        ])
        .unwrap();
        assert_eq!(cli.endpoint_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(cli.store_dir, None);

        let err = Cli::try_parse_from([
            "bundle_cache",
            "--endpoint-url",
            "http://localhost:9000",
            "--store-dir",
            "/tmp/store",
            "upload",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_action_required() {
        let err = Cli::try_parse_from(["bundle_cache"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_unknown_action() {
        let err = Cli::try_parse_from(["bundle_cache", "sync"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_extra_positional() {
        let err = Cli::try_parse_from(["bundle_cache", "upload", "download"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
