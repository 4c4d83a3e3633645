//! Closes realtime streams of campaigns that have finished.
//!
//! A campaign's status is derived, so no single write marks it `sent`; a
//! recipient stuck at `sent` can also become terminal purely by the
//! delivery timeout elapsing. The sweep re-derives the status of every
//! campaign that still has subscribers and ends their streams once it is
//! `sent`.

use std::sync::Arc;
use std::time::Duration;

use relay_core::campaign::CampaignStatus;
use relay_events::RealtimeProjector;
use tokio_util::sync::CancellationToken;

use crate::engine::CampaignAggregator;

/// How often the sweep runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(15);

/// Run the sweep loop until `cancel` is triggered.
pub async fn run(
    projector: Arc<RealtimeProjector>,
    aggregator: Arc<CampaignAggregator>,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        "Campaign completion sweep started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Campaign completion sweep stopping");
                break;
            }
            _ = ticker.tick() => {
                sweep_once(&projector, &aggregator).await;
            }
        }
    }
}

/// One pass. Returns the number of campaigns whose streams were closed.
pub async fn sweep_once(projector: &RealtimeProjector, aggregator: &CampaignAggregator) -> usize {
    let mut closed = 0;
    for (tenant_id, campaign_id) in projector.active_campaigns() {
        match aggregator.status(tenant_id, campaign_id).await {
            Ok(Some(CampaignStatus::Sent)) | Ok(None) => {
                projector.close_campaign(tenant_id, campaign_id);
                closed += 1;
            }
            Ok(Some(_)) => {}
            Err(e) => {
                tracing::error!(
                    tenant_id,
                    campaign_id,
                    error = %e,
                    "Completion sweep: status check failed"
                );
            }
        }
    }

    if closed > 0 {
        tracing::debug!(closed, "Completion sweep: closed finished campaign streams");
    }
    closed
}
