//! Recipient phone normalisation.
//!
//! The channel addresses recipients by international number without the
//! leading `+`. Formatting characters people paste from spreadsheets are
//! stripped; anything else is rejected.

use crate::error::{CoreError, ValidationReason};

/// Shortest accepted number (digits only).
pub const MIN_PHONE_DIGITS: usize = 8;

/// Longest accepted number; the E.164 maximum.
pub const MAX_PHONE_DIGITS: usize = 15;

/// Normalise a phone number to its bare digits.
///
/// Accepts an optional leading `+` and the separators space, `-`, `.`,
/// `(` and `)`.
pub fn normalize_phone(raw: &str) -> Result<String, CoreError> {
    let trimmed = raw.trim();
    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);

    let mut digits = String::with_capacity(body.len());
    for c in body.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => {
                return Err(malformed(raw, "contains invalid characters"));
            }
        }
    }

    if digits.len() < MIN_PHONE_DIGITS || digits.len() > MAX_PHONE_DIGITS {
        return Err(malformed(
            raw,
            &format!("must have {MIN_PHONE_DIGITS}-{MAX_PHONE_DIGITS} digits"),
        ));
    }
    if digits.starts_with('0') {
        return Err(malformed(raw, "must include the country code"));
    }

    Ok(digits)
}

fn malformed(raw: &str, detail: &str) -> CoreError {
    CoreError::validation(
        ValidationReason::MalformedPhone,
        format!("Phone number '{raw}' {detail}"),
    )
}
