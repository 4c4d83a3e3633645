//! Unit tests for `WsManager`.
//!
//! These tests exercise the WebSocket connection manager directly, without
//! performing any HTTP upgrades.

use axum::extract::ws::Message;
use relay_api::ws::{CampaignWatch, WsManager};

fn watch(campaign_id: i64) -> CampaignWatch {
    CampaignWatch {
        tenant_id: 7,
        campaign_id,
        user_id: 1,
    }
}

// ---------------------------------------------------------------------------
// Test: add() and remove() track the connection count
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_and_remove_track_connection_count() {
    let manager = WsManager::new();
    assert_eq!(manager.connection_count().await, 0);

    let _rx1 = manager.add("conn-1".to_string(), watch(10)).await;
    let _rx2 = manager.add("conn-2".to_string(), watch(10)).await;
    assert_eq!(manager.connection_count().await, 2);

    manager.remove("conn-1").await;
    manager.remove("nonexistent").await;
    assert_eq!(manager.connection_count().await, 1);
}

// ---------------------------------------------------------------------------
// Test: connections are counted per campaign and tenant
// ---------------------------------------------------------------------------

#[tokio::test]
async fn campaign_connection_count_filters_by_campaign() {
    let manager = WsManager::new();
    let _a = manager.add("a".to_string(), watch(10)).await;
    let _b = manager.add("b".to_string(), watch(10)).await;
    let _c = manager.add("c".to_string(), watch(11)).await;

    assert_eq!(manager.campaign_connection_count(7, 10).await, 2);
    assert_eq!(manager.campaign_connection_count(7, 11).await, 1);
    assert_eq!(manager.campaign_connection_count(8, 10).await, 0);
}

// ---------------------------------------------------------------------------
// Test: send() reaches only the addressed connection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn send_targets_one_connection() {
    let manager = WsManager::new();
    let mut rx1 = manager.add("conn-1".to_string(), watch(10)).await;
    let mut rx2 = manager.add("conn-2".to_string(), watch(10)).await;

    assert!(manager.send("conn-1", Message::Text("hello".into())).await);
    assert!(!manager.send("missing", Message::Text("lost".into())).await);

    assert!(matches!(rx1.try_recv(), Ok(Message::Text(t)) if t.as_str() == "hello"));
    assert!(rx2.try_recv().is_err());
}

#[tokio::test]
async fn send_to_dropped_receiver_returns_false() {
    let manager = WsManager::new();
    let rx = manager.add("conn-1".to_string(), watch(10)).await;
    drop(rx);

    assert!(!manager.send("conn-1", Message::Text("hello".into())).await);
}

// ---------------------------------------------------------------------------
// Test: ping_all() and shutdown_all()
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ping_all_sends_ping_to_every_connection() {
    let manager = WsManager::new();
    let mut rx1 = manager.add("conn-1".to_string(), watch(10)).await;
    let mut rx2 = manager.add("conn-2".to_string(), watch(11)).await;

    manager.ping_all().await;

    assert!(matches!(rx1.try_recv(), Ok(Message::Ping(_))));
    assert!(matches!(rx2.try_recv(), Ok(Message::Ping(_))));
}

#[tokio::test]
async fn shutdown_all_sends_close_and_clears() {
    let manager = WsManager::new();
    let mut rx1 = manager.add("conn-1".to_string(), watch(10)).await;
    let mut rx2 = manager.add("conn-2".to_string(), watch(10)).await;

    manager.shutdown_all().await;

    assert_eq!(manager.connection_count().await, 0);
    assert!(matches!(rx1.try_recv(), Ok(Message::Close(None))));
    assert!(matches!(rx2.try_recv(), Ok(Message::Close(None))));
}
