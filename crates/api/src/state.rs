use std::sync::Arc;

use relay_channel::ChannelAdapter;
use relay_db::DeliveryStore;
use relay_events::RealtimeProjector;
use relay_storage::MediaStagingService;

use crate::config::ServerConfig;
use crate::engine::{CampaignAggregator, ConversationSender, DispatchEngine, WebhookIngestor};
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Recipient, campaign and conversation persistence.
    pub store: Arc<dyn DeliveryStore>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Campaign submission and live dispatch control.
    pub dispatcher: Arc<DispatchEngine>,
    /// Provider webhook reconciliation.
    pub ingestor: Arc<WebhookIngestor>,
    /// Campaign status and summary reads.
    pub aggregator: Arc<CampaignAggregator>,
    /// Direct text and media sends.
    pub conversations: Arc<ConversationSender>,
    /// Realtime fan-out of recipient changes.
    pub projector: Arc<RealtimeProjector>,
    /// WebSocket connection manager.
    pub ws_manager: Arc<WsManager>,
}

impl AppState {
    /// Wire the engine components around one store and one channel.
    pub fn new(
        store: Arc<dyn DeliveryStore>,
        channel: Arc<dyn ChannelAdapter>,
        staging: Arc<MediaStagingService>,
        config: ServerConfig,
    ) -> Self {
        let projector = Arc::new(RealtimeProjector::default());
        let dispatch = config.dispatch.clone();

        Self {
            dispatcher: Arc::new(DispatchEngine::new(
                Arc::clone(&store),
                Arc::clone(&channel),
                Arc::clone(&projector),
                dispatch.clone(),
            )),
            ingestor: Arc::new(WebhookIngestor::new(
                Arc::clone(&store),
                Arc::clone(&projector),
            )),
            aggregator: Arc::new(CampaignAggregator::new(
                Arc::clone(&store),
                dispatch.delivery_timeout,
            )),
            conversations: Arc::new(ConversationSender::new(
                Arc::clone(&store),
                channel,
                staging,
                dispatch.retry,
            )),
            projector,
            ws_manager: Arc::new(WsManager::new()),
            config: Arc::new(config),
            store,
        }
    }
}
