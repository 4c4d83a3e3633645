use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use relay_core::types::DbId;

use crate::error::AppResult;
use crate::middleware::rbac::RequireViewer;
use crate::state::AppState;
use crate::ws::manager::CampaignWatch;

/// GET /api/v1/ws/campaigns/{id}
///
/// Upgrades to a WebSocket that streams `{event, recipient}` frames for one
/// campaign of the caller's tenant. The campaign is checked before the
/// upgrade, so unknown or foreign campaigns get a plain 404.
pub async fn campaign_ws_handler(
    RequireViewer(user): RequireViewer,
    Path(campaign_id): Path<DbId>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> AppResult<impl IntoResponse> {
    state
        .aggregator
        .get_campaign(&user.context(), campaign_id)
        .await?;

    let watch = CampaignWatch {
        tenant_id: user.tenant_id,
        campaign_id,
        user_id: user.user_id,
    };
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, watch)))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Subscribes to the campaign and registers the connection.
///   2. Spawns a sender task that drains the connection's channel.
///   3. Spawns a forwarder that turns subscription changes into frames and
///      sends Close once the subscription ends.
///   4. Processes inbound messages on the current task until disconnect.
async fn handle_socket(socket: WebSocket, state: AppState, watch: CampaignWatch) {
    let conn_id = uuid::Uuid::new_v4().to_string();

    let mut subscription = state
        .projector
        .subscribe(watch.tenant_id, watch.campaign_id);
    let mut rx = state.ws_manager.add(conn_id.clone(), watch).await;
    let viewers = state
        .ws_manager
        .campaign_connection_count(watch.tenant_id, watch.campaign_id)
        .await;
    tracing::info!(
        conn_id = %conn_id,
        tenant_id = watch.tenant_id,
        campaign_id = watch.campaign_id,
        user_id = watch.user_id,
        viewers,
        "Campaign WebSocket connected",
    );

    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    let ws_manager = state.ws_manager.clone();
    let forward_conn_id = conn_id.clone();
    let forward_task = tokio::spawn(async move {
        while let Some(change) = subscription.next().await {
            let frame = match serde_json::to_string(&change) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize recipient change");
                    continue;
                }
            };
            if !ws_manager
                .send(&forward_conn_id, Message::Text(frame.into()))
                .await
            {
                return;
            }
        }
        tracing::debug!(conn_id = %forward_conn_id, "Campaign stream ended");
        ws_manager.send(&forward_conn_id, Message::Close(None)).await;
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    state.ws_manager.remove(&conn_id).await;
    forward_task.abort();
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "Campaign WebSocket disconnected");
}
