//! Integration tests for direct text and media sends into a conversation.

mod common;

use axum::http::StatusCode;
use common::{body_json, multipart_body, post_json, post_multipart, ScriptedChannel, TestApp};
use relay_channel::{ChannelSendError, MessagePayload};
use relay_core::media::MediaKind;
use relay_core::roles::Role;
use serde_json::json;

// ---------------------------------------------------------------------------
// Test: text send records the message with the provider id
// ---------------------------------------------------------------------------

#[tokio::test]
async fn text_message_is_sent_and_recorded() {
    let app = TestApp::new();
    let conversation = app.store.insert_conversation(7, "5215550001");
    let token = app.token(7, Role::Operator);

    let response = post_json(
        &app,
        &format!("/api/v1/conversations/{}/messages", conversation.id),
        Some(&token),
        json!({ "body": "  Hola, ¿sigue interesado?  " }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["data"]["body"], "Hola, ¿sigue interesado?");
    assert_eq!(json["data"]["provider_message_id"], "wamid.1");

    let requests = app.channel.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].phone, "5215550001");
    assert_eq!(requests[0].conversation_id, Some(conversation.id));
    assert_eq!(app.store.conversation_messages(conversation.id).len(), 1);
}

#[tokio::test]
async fn blank_text_is_rejected() {
    let app = TestApp::new();
    let conversation = app.store.insert_conversation(7, "5215550001");
    let token = app.token(7, Role::Operator);

    let response = post_json(
        &app,
        &format!("/api/v1/conversations/{}/messages", conversation.id),
        Some(&token),
        json!({ "body": "   " }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["reason"], "invalid_input");
    assert_eq!(app.channel.attempts(), 0);
}

#[tokio::test]
async fn foreign_conversation_is_not_found() {
    let app = TestApp::new();
    let conversation = app.store.insert_conversation(7, "5215550001");
    let token = app.token(8, Role::Operator);

    let response = post_json(
        &app,
        &format!("/api/v1/conversations/{}/messages", conversation.id),
        Some(&token),
        json!({ "body": "hola" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.channel.attempts(), 0);
}

#[tokio::test]
async fn rejected_text_is_not_recorded() {
    let channel = ScriptedChannel::new();
    channel.script(
        "5215550001",
        vec![ChannelSendError::Permanent {
            message: "Re-engagement message".into(),
            code: Some(131047),
        }],
    );
    let app = TestApp::with_channel(channel);
    let conversation = app.store.insert_conversation(7, "5215550001");
    let token = app.token(7, Role::Operator);

    let response = post_json(
        &app,
        &format!("/api/v1/conversations/{}/messages", conversation.id),
        Some(&token),
        json!({ "body": "hola" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["code"], "CHANNEL_REJECTED");
    assert_eq!(json["error"], "131047: Re-engagement message");
    assert!(app.store.conversation_messages(conversation.id).is_empty());
}

// ---------------------------------------------------------------------------
// Test: media is staged, sent by URL, and recorded
// ---------------------------------------------------------------------------

#[tokio::test]
async fn media_upload_is_staged_and_sent() {
    let app = TestApp::new();
    let conversation = app.store.insert_conversation(7, "5215550001");
    let token = app.token(7, Role::Operator);

    let (content_type, body) =
        multipart_body("fachada.jpg", "image/jpeg", &[0xFF, 0xD8, 0xFF, 0xE0], Some("Vista norte"));
    let response = post_multipart(
        &app,
        &format!("/api/v1/conversations/{}/media", conversation.id),
        &token,
        content_type,
        body,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    let url = json["data"]["asset"]["public_url"].as_str().unwrap().to_string();
    assert!(url.starts_with(&format!(
        "http://localhost:3000/media/7/{}/",
        conversation.id
    )));
    assert_eq!(json["data"]["message"]["media_url"], url.as_str());
    assert_eq!(json["data"]["message"]["body"], "Vista norte");
    assert_eq!(app.stored_media_files(), 1);

    let requests = app.channel.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].payload,
        MessagePayload::Media {
            url,
            kind: MediaKind::Image,
            caption: Some("Vista norte".into()),
            filename: Some("fachada.jpg".into()),
        }
    );
}

// ---------------------------------------------------------------------------
// Test: oversize upload writes nothing and sends nothing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn oversize_upload_is_rejected_before_staging() {
    let app = TestApp::new();
    let conversation = app.store.insert_conversation(7, "5215550001");
    let token = app.token(7, Role::Operator);

    let bytes = vec![0u8; 20 * 1000 * 1000];
    let (content_type, body) = multipart_body("recorrido.jpg", "image/jpeg", &bytes, None);
    let response = post_multipart(
        &app,
        &format!("/api/v1/conversations/{}/media", conversation.id),
        &token,
        content_type,
        body,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["reason"], "too_large");
    assert_eq!(app.stored_media_files(), 0);
    assert_eq!(app.channel.attempts(), 0);
    assert!(app.store.conversation_messages(conversation.id).is_empty());
}

#[tokio::test]
async fn unsupported_media_type_is_rejected() {
    let app = TestApp::new();
    let conversation = app.store.insert_conversation(7, "5215550001");
    let token = app.token(7, Role::Operator);

    let (content_type, body) = multipart_body("clip.mp4", "video/mp4", &[1, 2, 3], None);
    let response = post_multipart(
        &app,
        &format!("/api/v1/conversations/{}/media", conversation.id),
        &token,
        content_type,
        body,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["reason"], "unsupported_type");
    assert_eq!(app.stored_media_files(), 0);
    assert_eq!(app.channel.attempts(), 0);
}

#[tokio::test]
async fn media_without_file_part_is_bad_request() {
    let app = TestApp::new();
    let conversation = app.store.insert_conversation(7, "5215550001");
    let token = app.token(7, Role::Operator);

    let boundary = "relay-test-boundary";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"caption\"\r\n\r\nhola\r\n--{boundary}--\r\n"
    );
    let response = post_multipart(
        &app,
        &format!("/api/v1/conversations/{}/media", conversation.id),
        &token,
        format!("multipart/form-data; boundary={boundary}"),
        body.into_bytes(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn viewer_cannot_send_media() {
    let app = TestApp::new();
    let conversation = app.store.insert_conversation(7, "5215550001");
    let token = app.token(7, Role::Viewer);

    let (content_type, body) = multipart_body("a.png", "image/png", &[1], None);
    let response = post_multipart(
        &app,
        &format!("/api/v1/conversations/{}/media", conversation.id),
        &token,
        content_type,
        body,
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.stored_media_files(), 0);
}
