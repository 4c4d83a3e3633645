use std::path::PathBuf;
use std::sync::Arc;

use crate::local::LocalObjectStore;
use crate::object_store::ObjectStore;
use crate::s3::S3ObjectStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaBackend {
    Local {
        root: PathBuf,
    },
    S3 {
        bucket: String,
        region: Option<String>,
        endpoint: Option<String>,
    },
}

/// Media storage configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub backend: MediaBackend,
    /// Prefix under which stored objects are publicly reachable.
    pub public_base_url: String,
}

impl MediaConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                       |
    /// |-------------------------|-------------------------------|
    /// | `MEDIA_BACKEND`         | `local` (`local` or `s3`)     |
    /// | `MEDIA_LOCAL_ROOT`      | `./media`                     |
    /// | `MEDIA_PUBLIC_BASE_URL` | `http://localhost:3000/media` |
    /// | `MEDIA_S3_BUCKET`       | required when backend is `s3` |
    /// | `MEDIA_S3_REGION`       | from the AWS environment      |
    /// | `MEDIA_S3_ENDPOINT`     | AWS default                   |
    pub fn from_env() -> Self {
        let backend = match std::env::var("MEDIA_BACKEND")
            .unwrap_or_else(|_| "local".into())
            .to_ascii_lowercase()
            .as_str()
        {
            "s3" => MediaBackend::S3 {
                bucket: std::env::var("MEDIA_S3_BUCKET")
                    .expect("MEDIA_S3_BUCKET must be set when MEDIA_BACKEND=s3"),
                region: std::env::var("MEDIA_S3_REGION").ok(),
                endpoint: std::env::var("MEDIA_S3_ENDPOINT").ok(),
            },
            "local" => MediaBackend::Local {
                root: std::env::var("MEDIA_LOCAL_ROOT")
                    .unwrap_or_else(|_| "./media".into())
                    .into(),
            },
            other => panic!("MEDIA_BACKEND must be 'local' or 's3', got '{other}'"),
        };

        let public_base_url = std::env::var("MEDIA_PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000/media".into());

        Self {
            backend,
            public_base_url,
        }
    }

    /// Construct the configured backend.
    pub async fn build_store(&self) -> Arc<dyn ObjectStore> {
        match &self.backend {
            MediaBackend::Local { root } => {
                tracing::info!(root = %root.display(), "Using local media store");
                Arc::new(LocalObjectStore::new(root.clone(), self.public_base_url.clone()))
            }
            MediaBackend::S3 {
                bucket,
                region,
                endpoint,
            } => {
                tracing::info!(bucket = %bucket, "Using S3 media store");
                Arc::new(
                    S3ObjectStore::connect(
                        bucket.clone(),
                        self.public_base_url.clone(),
                        region.clone(),
                        endpoint.clone(),
                    )
                    .await,
                )
            }
        }
    }
}
