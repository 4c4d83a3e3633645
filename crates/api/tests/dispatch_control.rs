//! Pause, resume and cancel of a running dispatch, with a gated channel so
//! the tests decide exactly how many sends are allowed through.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{body_json, get, post_json, submit_campaign, ScriptedChannel, TestApp};
use relay_core::roles::Role;
use relay_core::types::DbId;
use serde_json::json;

const PHONES: [&str; 5] = [
    "5215550001",
    "5215550002",
    "5215550003",
    "5215550004",
    "5215550005",
];

async fn control(app: &TestApp, campaign_id: DbId, action: &str, role: Role) -> StatusCode {
    let token = app.token(7, role);
    post_json(
        app,
        &format!("/api/v1/campaigns/{campaign_id}/{action}"),
        Some(&token),
        json!({}),
    )
    .await
    .status()
}

/// Wait until the channel has been asked for `n` sends.
async fn wait_for_attempts(app: &TestApp, n: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while app.channel.attempts() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("channel never reached the expected attempt count");
}

async fn recipient_states(app: &TestApp, campaign_id: DbId) -> Vec<(String, String)> {
    let response = get(
        app,
        &format!("/api/v1/campaigns/{campaign_id}/recipients"),
        Some(&app.token(7, Role::Viewer)),
    )
    .await;
    body_json(response).await["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| {
            (
                r["state"].as_str().unwrap().to_string(),
                r["error_message"].as_str().unwrap_or("").to_string(),
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Test: viewer cannot cancel, admin can; unstarted recipients end cancelled
// ---------------------------------------------------------------------------

#[tokio::test]
async fn viewer_cannot_cancel_but_admin_can() {
    let app = TestApp::with_channel(ScriptedChannel::gated());
    let campaign_id = submit_campaign(&app, 7, &PHONES).await;

    assert_eq!(
        control(&app, campaign_id, "cancel", Role::Viewer).await,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        control(&app, campaign_id, "cancel", Role::Operator).await,
        StatusCode::FORBIDDEN
    );
    assert!(app
        .state
        .dispatcher
        .registry()
        .get(7, campaign_id)
        .is_some_and(|h| !h.is_cancelled()));

    assert_eq!(
        control(&app, campaign_id, "cancel", Role::Admin).await,
        StatusCode::OK
    );

    // Sends already waiting on the channel are allowed to complete.
    app.channel.release(PHONES.len());
    app.wait_for_dispatch(7, campaign_id).await;

    let states = recipient_states(&app, campaign_id).await;
    assert_eq!(states.len(), PHONES.len());
    let cancelled = states
        .iter()
        .filter(|(state, msg)| state == "failed" && msg == "cancelled")
        .count();
    let sent = states.iter().filter(|(state, _)| state == "sent").count();
    assert_eq!(cancelled + sent, PHONES.len());
    assert!(cancelled >= PHONES.len() - 2, "at most two sends were in flight");
    assert_eq!(app.channel.attempts(), sent);
}

// ---------------------------------------------------------------------------
// Test: pause stops new sends, resume continues them
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pause_holds_unstarted_recipients_until_resume() {
    let app = TestApp::with_channel(ScriptedChannel::gated());
    let campaign_id = submit_campaign(&app, 7, &PHONES).await;

    // Let exactly one send through, then pause while others wait on the gate.
    app.channel.release(1);
    wait_for_attempts(&app, 1).await;
    assert_eq!(
        control(&app, campaign_id, "pause", Role::Operator).await,
        StatusCode::OK
    );
    app.channel.release(PHONES.len());
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Only sends started before the pause went out.
    let attempts_while_paused = app.channel.attempts();
    assert!((1..=3).contains(&attempts_while_paused));
    let queued = recipient_states(&app, campaign_id)
        .await
        .into_iter()
        .filter(|(state, _)| state == "queued")
        .count();
    assert_eq!(queued, PHONES.len() - attempts_while_paused);

    assert_eq!(
        control(&app, campaign_id, "resume", Role::Operator).await,
        StatusCode::OK
    );
    app.wait_for_dispatch(7, campaign_id).await;

    assert_eq!(app.channel.attempts(), PHONES.len());
    assert!(recipient_states(&app, campaign_id)
        .await
        .iter()
        .all(|(state, _)| state == "sent"));
}

// ---------------------------------------------------------------------------
// Test: control of a finished or unknown campaign
// ---------------------------------------------------------------------------

#[tokio::test]
async fn control_after_finish_is_conflict() {
    let app = TestApp::new();
    let campaign_id = submit_campaign(&app, 7, &["5215550001"]).await;
    app.wait_for_dispatch(7, campaign_id).await;

    let token = app.token(7, Role::Operator);
    let response = post_json(
        &app,
        &format!("/api/v1/campaigns/{campaign_id}/pause"),
        Some(&token),
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "CONFLICT");
}

#[tokio::test]
async fn control_of_unknown_campaign_is_not_found() {
    let app = TestApp::new();
    assert_eq!(
        control(&app, 9999, "pause", Role::Operator).await,
        StatusCode::NOT_FOUND
    );
}

// ---------------------------------------------------------------------------
// Test: shutdown pause leaves unstarted recipients queued
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pause_all_pauses_every_running_dispatch() {
    let app = TestApp::with_channel(ScriptedChannel::gated());
    let first = submit_campaign(&app, 7, &PHONES).await;
    let second = submit_campaign(&app, 7, &PHONES).await;

    assert_eq!(app.state.dispatcher.pause_all(), 2);
    for campaign_id in [first, second] {
        let handle = app.state.dispatcher.registry().get(7, campaign_id).unwrap();
        assert!(handle.is_paused());
        assert!(!handle.is_cancelled());
    }
}
