use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    #[error("Invalid object path '{0}'")]
    InvalidPath(String),

    #[error("Object write failed: {0}")]
    Write(String),
}

/// Durable byte storage addressed by relative, `/`-separated paths.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Write `bytes` at `path`. Returns only once the write is durable.
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str)
        -> Result<(), ObjectStoreError>;

    /// Publicly resolvable URL for an object previously written at `path`.
    fn public_url(&self, path: &str) -> String;
}

/// Reject absolute paths and `.`/`..` segments.
pub(crate) fn check_path(path: &str) -> Result<(), ObjectStoreError> {
    let bad = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if bad {
        Err(ObjectStoreError::InvalidPath(path.to_string()))
    } else {
        Ok(())
    }
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}
