//! Amazon S3 backend.

use crate::content_type::detect_content_type;
use crate::provider::ObjectStore;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use bundle_cache_core::{Error, Result, Settings};
use std::path::Path;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

const PROVIDER_NAME: &str = "bundle-cache";

/// S3 store using a static access key pair.
///
/// Requests are sent once; the SDK's retry layer is disabled.
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Build a client for the bucket and region in `settings`.
    pub fn new(settings: &Settings) -> Self {
        Self::build(settings, None)
    }

    /// Build a client against an S3-compatible endpoint (path-style
    /// addressing).
    pub fn with_endpoint(settings: &Settings, endpoint_url: &str) -> Self {
        Self::build(settings, Some(endpoint_url))
    }

    fn build(settings: &Settings, endpoint_url: Option<&str>) -> Self {
        let credentials = Credentials::new(
            &settings.access_key,
            &settings.secret_key,
            None,
            None,
            PROVIDER_NAME,
        );

        let mut config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials)
            .retry_config(RetryConfig::disabled());
        if let Some(url) = endpoint_url {
            config = config.endpoint_url(url).force_path_style(true);
        }

        Self {
            client: Client::from_conf(config.build()),
            bucket: settings.bucket.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, source: &Path, key: &str) -> Result<u64> {
        let data = tokio::fs::read(source)
            .await
            .map_err(|e| Error::Storage(format!("Failed to read {}: {}", source.display(), e)))?;
        let size = data.len() as u64;
        let content_type = detect_content_type(&data);

        info!(bucket = %self.bucket, key, size, content_type, "Uploading object");

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_length(size as i64)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| Error::Storage(format!("bad response: {}", DisplayErrorContext(&e))))?;

        Ok(size)
    }

    async fn get(&self, key: &str, dest: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<u64> {
        info!(bucket = %self.bucket, key, "Downloading object");

        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    return Err(Error::ObjectNotFound(key.to_string()));
                }
                return Err(Error::Storage(format!(
                    "bad response: {}",
                    DisplayErrorContext(&e)
                )));
            }
        };

        let mut body = output.body;
        let mut written = 0u64;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| Error::Storage(format!("Download interrupted: {}", DisplayErrorContext(&e))))?
        {
            dest.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        dest.flush().await?;

        debug!(key, written, "Object streamed to disk");
        Ok(written)
    }

    fn name(&self) -> &str {
        "s3"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bundle_cache_core::{CliOptions, FileConfig};

    fn settings() -> Settings {
        let options = CliOptions {
            prefix: Some("app".into()),
            path: Some("/srv/app".into()),
            access_key: Some("AKIDEXAMPLE".into()),
            secret_key: Some("wJalrXUtnFEMI".into()),
            bucket: Some("ci-bundles".into()),
            region: Some("us-east-1".into()),
        };
        Settings::resolve(options, &FileConfig::default(), |_| None).unwrap()
    }

    #[test]
    fn test_new_uses_bucket() {
        let store = S3Store::new(&settings());
        assert_eq!(store.bucket, "ci-bundles");
        assert_eq!(store.name(), "s3");
        let store = S3Store::with_endpoint(&settings(), "http://localhost:9000");
        assert_eq!(store.bucket, "ci-bundles");
    }

    #[tokio::test]
    async fn test_put_transport_error_is_reported() {
        let scratch = tempfile::tempdir().unwrap();
        let source = scratch.path().join("a.tar.gz");
        std::fs::write(&source, [0x1f, 0x8b, 0x08, 0x00]).unwrap();

        let store = S3Store::with_endpoint(&settings(), "http://127.0.0.1:1");
        let err = store.put(&source, "a.tar.gz").await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[tokio::test]
    async fn test_get_transport_error_is_reported() {
        let store = S3Store::with_endpoint(&settings(), "http://127.0.0.1:1");
        let mut out = Vec::new();
        let err = store.get("a.tar.gz", &mut out).await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_put_missing_source() {
        let scratch = tempfile::tempdir().unwrap();
        let store = S3Store::new(&settings());
        let err = store
            .put(&scratch.path().join("absent.tar.gz"), "absent.tar.gz")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }
}
