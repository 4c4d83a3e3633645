//! Drives the WhatsApp adapter against a local axum server standing in for
//! the provider.

use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use relay_channel::{
    ChannelAdapter, ChannelConfig, ChannelSendError, StaticCredentials, WhatsAppCloudAdapter,
};
use serde_json::{json, Value};

#[derive(Debug, Clone)]
struct Captured {
    phone_number_id: String,
    authorization: String,
    body: Value,
}

#[derive(Clone, Default)]
struct Provider {
    captured: Arc<Mutex<Vec<Captured>>>,
}

/// The fake provider picks its response from the destination phone.
async fn messages(
    State(provider): State<Provider>,
    Path((_version, phone_number_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let to = body["to"].as_str().unwrap_or_default().to_string();
    provider.captured.lock().unwrap().push(Captured {
        phone_number_id,
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
        body,
    });

    match to.as_str() {
        "5215550429" => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": { "message": "Rate limit hit", "code": 130429 } })),
        ),
        "5215550500" => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": { "message": "Internal error" } })),
        ),
        "5215550400" => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": { "message": "Message undeliverable", "code": 131026 } })),
        ),
        _ => (
            StatusCode::OK,
            Json(json!({
                "messaging_product": "whatsapp",
                "contacts": [{ "input": to, "wa_id": to }],
                "messages": [{ "id": format!("wamid.{to}") }]
            })),
        ),
    }
}

async fn start_provider() -> (String, Provider) {
    let provider = Provider::default();
    let app = Router::new()
        .route("/{version}/{phone_number_id}/messages", post(messages))
        .with_state(provider.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), provider)
}

fn adapter(base_url: &str) -> WhatsAppCloudAdapter {
    let credentials = StaticCredentials::new()
        .with_tenant(1, "1001", "token-tenant-1")
        .with_tenant(2, "2002", "token-tenant-2");
    WhatsAppCloudAdapter::new(ChannelConfig::for_base_url(base_url), Arc::new(credentials)).unwrap()
}

#[tokio::test]
async fn text_send_returns_provider_message_id() {
    let (base_url, provider) = start_provider().await;
    let receipt = adapter(&base_url)
        .send_text(1, "5215550001", "Hola")
        .await
        .unwrap();

    assert_eq!(receipt.provider_message_id, "wamid.5215550001");
    let captured = provider.captured.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].body["type"], "text");
    assert_eq!(captured[0].body["text"]["body"], "Hola");
}

#[tokio::test]
async fn each_tenant_uses_its_own_credentials() {
    let (base_url, provider) = start_provider().await;
    let adapter = adapter(&base_url);
    adapter.send_template(1, "5215550001", "launch").await.unwrap();
    adapter.send_template(2, "5215550002", "launch").await.unwrap();

    let captured = provider.captured.lock().unwrap();
    assert_eq!(captured[0].phone_number_id, "1001");
    assert_eq!(captured[0].authorization, "Bearer token-tenant-1");
    assert_eq!(captured[1].phone_number_id, "2002");
    assert_eq!(captured[1].authorization, "Bearer token-tenant-2");
}

#[tokio::test]
async fn rate_limit_is_transient() {
    let (base_url, _) = start_provider().await;
    let err = adapter(&base_url)
        .send_text(1, "5215550429", "Hola")
        .await
        .unwrap_err();
    assert_matches!(err, ChannelSendError::Transient { code: Some(130429), .. });
}

#[tokio::test]
async fn server_error_is_transient() {
    let (base_url, _) = start_provider().await;
    let err = adapter(&base_url)
        .send_text(1, "5215550500", "Hola")
        .await
        .unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn undeliverable_recipient_is_permanent() {
    let (base_url, _) = start_provider().await;
    let err = adapter(&base_url)
        .send_text(1, "5215550400", "Hola")
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ChannelSendError::Permanent { code: Some(131026), ref message } if message == "Message undeliverable"
    );
}

#[tokio::test]
async fn unknown_tenant_is_permanent_and_sends_nothing() {
    let (base_url, provider) = start_provider().await;
    let err = adapter(&base_url)
        .send_text(9, "5215550001", "Hola")
        .await
        .unwrap_err();
    assert!(!err.is_transient());
    assert!(provider.captured.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_provider_is_transient() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = adapter(&format!("http://{addr}"))
        .send_text(1, "5215550001", "Hola")
        .await
        .unwrap_err();
    assert!(err.is_transient());
}
