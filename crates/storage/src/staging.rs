//! Validate-then-upload for a single outbound attachment.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use relay_core::error::CoreError;
use relay_core::media::{normalize_content_type, storage_path, validate_media, MediaKind};
use relay_core::types::{DbId, TenantId};
use serde::Serialize;

use crate::object_store::{ObjectStore, ObjectStoreError};

/// An attachment as received from the caller.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A durably stored attachment, ready to be sent by URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaAsset {
    pub tenant_id: TenantId,
    pub conversation_id: DbId,
    pub storage_path: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub public_url: String,
    pub kind: MediaKind,
}

#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    /// Rejected before any bytes were written.
    #[error(transparent)]
    Validation(CoreError),

    /// The object store did not acknowledge the write.
    #[error("Upload failed: {0}")]
    Upload(#[from] ObjectStoreError),
}

pub struct MediaStagingService {
    store: Arc<dyn ObjectStore>,
    /// Last timestamp handed out, so two uploads never share a prefix.
    last_unix_ms: AtomicI64,
}

impl MediaStagingService {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            last_unix_ms: AtomicI64::new(0),
        }
    }

    /// Validate and persist `file` for one conversation.
    ///
    /// Size and content type are checked before the store is touched. The
    /// returned asset exists only after the store acknowledged the write.
    pub async fn stage(
        &self,
        tenant_id: TenantId,
        conversation_id: DbId,
        file: MediaUpload,
    ) -> Result<MediaAsset, StagingError> {
        let size_bytes = file.bytes.len() as u64;
        let kind =
            validate_media(size_bytes, &file.content_type).map_err(StagingError::Validation)?;
        let content_type = normalize_content_type(&file.content_type);

        let path = storage_path(tenant_id, conversation_id, self.next_unix_ms(), &file.filename);

        if let Err(e) = self.store.put(&path, file.bytes, &content_type).await {
            tracing::warn!(
                tenant_id,
                conversation_id,
                path = %path,
                error = %e,
                "Media upload failed",
            );
            return Err(e.into());
        }

        tracing::info!(tenant_id, conversation_id, path = %path, size_bytes, "Media staged");
        Ok(MediaAsset {
            tenant_id,
            conversation_id,
            public_url: self.store.public_url(&path),
            storage_path: path,
            content_type,
            size_bytes,
            kind,
        })
    }

    /// Wall-clock milliseconds, bumped past the previous value when two
    /// calls land in the same millisecond.
    fn next_unix_ms(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last_unix_ms.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match self.last_unix_ms.compare_exchange_weak(
                last,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }
}
