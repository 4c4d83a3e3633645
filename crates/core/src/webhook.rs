//! Inbound provider webhook: wire format, parsing, and signature checks.
//!
//! The provider authenticates with a shared secret: it signs the raw
//! request body with HMAC-SHA256 and sends `sha256=<hex>` in a header.
//! Parsing is per event, so one malformed element in a batch never stops
//! the rest from being applied.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::delivery::{DeliveryEvent, DeliveryEventKind};
use crate::types::{DbId, TenantId, Timestamp};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "x-relay-signature";

/// Prefix in front of the hex digest in [`SIGNATURE_HEADER`].
const SIGNATURE_PREFIX: &str = "sha256=";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How a webhook addresses its recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientRef {
    /// Our own recipient id.
    Id(DbId),
    /// The provider message id recorded when the message was sent.
    ProviderMessage(String),
}

impl std::fmt::Display for RecipientRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "recipient:{id}"),
            Self::ProviderMessage(message_id) => write!(f, "message:{message_id}"),
        }
    }
}

/// A parsed, not yet applied, provider notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    /// Tenant encoded by the provider; checked against the stored recipient.
    pub tenant_id: TenantId,
    pub target: RecipientRef,
    pub event: DeliveryEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebhookParseError {
    #[error("Malformed webhook body: {0}")]
    MalformedJson(String),

    #[error("Webhook event is missing field '{0}'")]
    MissingField(&'static str),

    #[error("Webhook event has invalid field '{field}': {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },

    #[error("Unknown webhook event kind '{0}'")]
    UnknownKind(String),
}

/// Wire shape of a single event.
#[derive(Debug, Deserialize)]
struct RawWebhookEvent {
    tenant_id: Option<TenantId>,
    recipient_id: Option<DbId>,
    message_id: Option<String>,
    recipient_or_message_id: Option<serde_json::Value>,
    event_kind: Option<String>,
    occurred_at: Option<Timestamp>,
    error_message: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Split a raw body into individually parsed events.
///
/// Accepts a single event object, a JSON array of events, or
/// `{ "events": [...] }`. Only a body that is not JSON at all (or has no
/// recognisable shape) fails as a whole.
pub fn parse_webhook_body(
    body: &[u8],
) -> Result<Vec<Result<WebhookEvent, WebhookParseError>>, WebhookParseError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| WebhookParseError::MalformedJson(e.to_string()))?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove("events") {
            Some(serde_json::Value::Array(items)) => items,
            Some(_) => {
                return Err(WebhookParseError::InvalidField {
                    field: "events",
                    message: "must be an array".into(),
                })
            }
            None => vec![serde_json::Value::Object(map)],
        },
        _ => {
            return Err(WebhookParseError::MalformedJson(
                "expected an object or array".into(),
            ))
        }
    };

    Ok(items.iter().map(parse_webhook_event).collect())
}

/// Parse one event object.
pub fn parse_webhook_event(value: &serde_json::Value) -> Result<WebhookEvent, WebhookParseError> {
    let raw: RawWebhookEvent = serde_json::from_value(value.clone())
        .map_err(|e| WebhookParseError::MalformedJson(e.to_string()))?;

    let tenant_id = raw
        .tenant_id
        .ok_or(WebhookParseError::MissingField("tenant_id"))?;

    let kind_name = raw
        .event_kind
        .ok_or(WebhookParseError::MissingField("event_kind"))?;
    let kind = DeliveryEventKind::from_name(&kind_name)
        .ok_or_else(|| WebhookParseError::UnknownKind(kind_name.clone()))?;

    let occurred_at = raw
        .occurred_at
        .ok_or(WebhookParseError::MissingField("occurred_at"))?;

    let target = resolve_target(raw.recipient_id, raw.message_id, raw.recipient_or_message_id)?;

    Ok(WebhookEvent {
        tenant_id,
        target,
        event: DeliveryEvent {
            kind,
            occurred_at,
            error_message: raw.error_message,
        },
    })
}

/// Numbers address our recipient ids; strings address provider message ids.
fn resolve_target(
    recipient_id: Option<DbId>,
    message_id: Option<String>,
    combined: Option<serde_json::Value>,
) -> Result<RecipientRef, WebhookParseError> {
    if let Some(id) = recipient_id {
        return Ok(RecipientRef::Id(id));
    }
    if let Some(message_id) = message_id.filter(|m| !m.trim().is_empty()) {
        return Ok(RecipientRef::ProviderMessage(message_id));
    }
    match combined {
        Some(serde_json::Value::Number(n)) => n.as_i64().map(RecipientRef::Id).ok_or_else(|| {
            WebhookParseError::InvalidField {
                field: "recipient_or_message_id",
                message: format!("{n} is not a valid id"),
            }
        }),
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => {
            Ok(RecipientRef::ProviderMessage(s))
        }
        Some(other) => Err(WebhookParseError::InvalidField {
            field: "recipient_or_message_id",
            message: format!("unexpected value {other}"),
        }),
        None => Err(WebhookParseError::MissingField("recipient_or_message_id")),
    }
}

// ---------------------------------------------------------------------------
// Signatures
// ---------------------------------------------------------------------------

/// Compute the `sha256=<hex>` signature for a body.
pub fn compute_signature(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    format!(
        "{SIGNATURE_PREFIX}{}",
        hex::encode(mac.finalize().into_bytes())
    )
}

/// Constant-time check of a signature header against the body.
pub fn verify_signature(secret: &str, body: &[u8], header_value: &str) -> bool {
    let Some(hex_digest) = header_value.trim().strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_single_event_by_recipient_id() {
        let body = json!({
            "tenant_id": 3,
            "recipient_id": 17,
            "event_kind": "delivered",
            "occurred_at": "2024-05-01T10:00:00Z"
        });
        let events = parse_webhook_body(body.to_string().as_bytes()).unwrap();
        assert_eq!(events.len(), 1);
        let event = events[0].as_ref().unwrap();
        assert_eq!(event.tenant_id, 3);
        assert_eq!(event.target, RecipientRef::Id(17));
        assert_eq!(event.event.kind, DeliveryEventKind::Delivered);
    }

    #[test]
    fn combined_field_distinguishes_numbers_and_strings() {
        let by_id = json!({
            "tenant_id": 1, "recipient_or_message_id": 9,
            "event_kind": "read", "occurred_at": "2024-05-01T10:00:00Z"
        });
        let by_message = json!({
            "tenant_id": 1, "recipient_or_message_id": "wamid.ABC",
            "event_kind": "read", "occurred_at": "2024-05-01T10:00:00Z"
        });
        assert_eq!(
            parse_webhook_event(&by_id).unwrap().target,
            RecipientRef::Id(9)
        );
        assert_eq!(
            parse_webhook_event(&by_message).unwrap().target,
            RecipientRef::ProviderMessage("wamid.ABC".into())
        );
    }

    #[test]
    fn batch_keeps_good_events_next_to_bad_ones() {
        let body = json!({ "events": [
            { "tenant_id": 1, "recipient_id": 1, "event_kind": "sent", "occurred_at": "2024-05-01T10:00:00Z" },
            { "tenant_id": 1, "recipient_id": 2, "event_kind": "bounced", "occurred_at": "2024-05-01T10:00:00Z" },
            { "recipient_id": 3, "event_kind": "read", "occurred_at": "2024-05-01T10:00:00Z" },
            { "tenant_id": 1, "message_id": "wamid.X", "event_kind": "failed",
              "occurred_at": "2024-05-01T10:00:00Z", "error_message": "131026" }
        ]});
        let events = parse_webhook_body(body.to_string().as_bytes()).unwrap();
        assert_eq!(events.len(), 4);
        assert!(events[0].is_ok());
        assert_matches!(&events[1], Err(WebhookParseError::UnknownKind(k)) if k == "bounced");
        assert_matches!(&events[2], Err(WebhookParseError::MissingField("tenant_id")));
        let failed = events[3].as_ref().unwrap();
        assert_eq!(failed.event.error_message.as_deref(), Some("131026"));
    }

    #[test]
    fn bare_array_is_accepted() {
        let body = json!([
            { "tenant_id": 1, "recipient_id": 1, "event_kind": "sent", "occurred_at": "2024-05-01T10:00:00Z" }
        ]);
        assert_eq!(parse_webhook_body(body.to_string().as_bytes()).unwrap().len(), 1);
    }

    #[test]
    fn non_json_body_fails_whole() {
        assert_matches!(
            parse_webhook_body(b"not json"),
            Err(WebhookParseError::MalformedJson(_))
        );
    }

    #[test]
    fn missing_target_is_reported() {
        let body = json!({ "tenant_id": 1, "event_kind": "sent", "occurred_at": "2024-05-01T10:00:00Z" });
        assert_matches!(
            parse_webhook_event(&body),
            Err(WebhookParseError::MissingField("recipient_or_message_id"))
        );
    }

    #[test]
    fn signature_round_trip() {
        let body = br#"{"tenant_id":1}"#;
        let sig = compute_signature("shh", body);
        assert!(sig.starts_with("sha256="));
        assert_eq!(sig.len(), "sha256=".len() + 64);
        assert!(verify_signature("shh", body, &sig));
    }

    #[test]
    fn signature_matches_rfc4231_vector() {
        let body = b"what do ya want for nothing?";
        let expected = "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843";
        assert_eq!(compute_signature("Jefe", body), format!("sha256={expected}"));
        assert!(verify_signature(
            "Jefe",
            body,
            &format!("sha256={}", expected.to_uppercase())
        ));
        assert!(!verify_signature("Jefe", body, &format!("sha256={}", &expected[1..])));
    }

    #[test]
    fn signature_rejects_tampering() {
        let body = br#"{"tenant_id":1}"#;
        let sig = compute_signature("shh", body);
        assert!(!verify_signature("other", body, &sig));
        assert!(!verify_signature("shh", br#"{"tenant_id":2}"#, &sig));
        assert!(!verify_signature("shh", body, "sha256=zz"));
        assert!(!verify_signature("shh", body, &sig.replace("sha256=", "")));
    }
}
