//! Outbound media limits, content-type allow-list, and storage paths.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, ValidationReason};
use crate::types::{DbId, TenantId};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Largest attachment accepted for staging (16 MiB).
pub const MAX_MEDIA_BYTES: u64 = 16 * 1024 * 1024;

/// Content types the channel accepts for outbound media.
pub const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "application/pdf",
    "audio/ogg",
    "audio/mpeg",
];

/// Fallback filename when the uploaded name sanitizes to nothing.
const FALLBACK_FILENAME: &str = "file";

/// Longest sanitized filename kept in a storage path.
const MAX_FILENAME_LEN: usize = 128;

// ---------------------------------------------------------------------------
// Media kind
// ---------------------------------------------------------------------------

/// How the channel presents an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Document,
    Audio,
}

impl MediaKind {
    /// Classify an allow-listed content type.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let normalized = normalize_content_type(content_type);
        if !ALLOWED_CONTENT_TYPES.contains(&normalized.as_str()) {
            return None;
        }
        if normalized.starts_with("image/") {
            Some(Self::Image)
        } else if normalized.starts_with("audio/") {
            Some(Self::Audio)
        } else {
            Some(Self::Document)
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Document => "document",
            Self::Audio => "audio",
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Lowercase a content type and drop any parameters (`; charset=...`).
pub fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Check an attachment's size and content type before any upload.
pub fn validate_media(size_bytes: u64, content_type: &str) -> Result<MediaKind, CoreError> {
    if size_bytes == 0 {
        return Err(CoreError::validation(
            ValidationReason::EmptyFile,
            "File is empty",
        ));
    }
    if size_bytes > MAX_MEDIA_BYTES {
        return Err(CoreError::validation(
            ValidationReason::TooLarge,
            format!("File is {size_bytes} bytes; the limit is {MAX_MEDIA_BYTES} bytes"),
        ));
    }
    MediaKind::from_content_type(content_type).ok_or_else(|| {
        CoreError::validation(
            ValidationReason::UnsupportedType,
            format!(
                "Content type '{content_type}' is not supported. Must be one of: {ALLOWED_CONTENT_TYPES:?}"
            ),
        )
    })
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
///
/// The result never contains a path separator; [`storage_path`] prefixes it
/// with a timestamp, so it can never form a `.` or `..` segment either.
pub fn sanitize_filename(filename: &str) -> String {
    let mut sanitized: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.len() > MAX_FILENAME_LEN {
        // Keep the tail so the extension survives truncation.
        sanitized = sanitized[sanitized.len() - MAX_FILENAME_LEN..].to_string();
    }

    if sanitized.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        sanitized
    }
}

/// Storage key: `{tenant}/{conversation}/{unix_ms}_{sanitized_filename}`.
pub fn storage_path(
    tenant_id: TenantId,
    conversation_id: DbId,
    unix_ms: i64,
    filename: &str,
) -> String {
    format!(
        "{tenant_id}/{conversation_id}/{unix_ms}_{}",
        sanitize_filename(filename)
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
