use serde::Serialize;

use crate::roles::Role;
use crate::types::DbId;

/// Machine-readable reason attached to every validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationReason {
    TooLarge,
    UnsupportedType,
    EmptyFile,
    MalformedPhone,
    InvalidInput,
}

impl ValidationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TooLarge => "too_large",
            Self::UnsupportedType => "unsupported_type",
            Self::EmptyFile => "empty_file",
            Self::MalformedPhone => "malformed_phone",
            Self::InvalidInput => "invalid_input",
        }
    }
}

impl std::fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed ({reason}): {message}")]
    Validation {
        reason: ValidationReason,
        message: String,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The caller's role is below the minimum the operation requires.
    #[error("Forbidden: role '{actual}' is below required role '{required}'")]
    Forbidden { required: Role, actual: Role },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a generic [`ValidationReason::InvalidInput`] failure.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Validation {
            reason: ValidationReason::InvalidInput,
            message: message.into(),
        }
    }

    pub fn validation(reason: ValidationReason, message: impl Into<String>) -> Self {
        Self::Validation {
            reason,
            message: message.into(),
        }
    }
}
