//! Campaign reads: derived status, recipient list and summary counts.
//!
//! Nothing here is cached. Every call recounts the stored recipients so the
//! numbers always agree with the per-recipient records.

use std::sync::Arc;

use chrono::Utc;
use relay_core::campaign::{derive_status, summarize, CampaignStatus, CampaignSummary};
use relay_core::context::RequestContext;
use relay_core::delivery::DeliveryTimeline;
use relay_core::error::CoreError;
use relay_core::roles::Role;
use relay_core::types::{DbId, TenantId};
use relay_db::models::campaign::Campaign;
use relay_db::models::recipient::{Recipient, RecipientView};
use relay_db::{DeliveryStore, StoreError};
use serde::Serialize;

use crate::error::AppResult;

/// A campaign with its derived status and current counts.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignDetail {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub status: CampaignStatus,
    pub summary: CampaignSummary,
}

pub struct CampaignAggregator {
    store: Arc<dyn DeliveryStore>,
    delivery_timeout: chrono::Duration,
}

impl CampaignAggregator {
    pub fn new(store: Arc<dyn DeliveryStore>, delivery_timeout: chrono::Duration) -> Self {
        Self {
            store,
            delivery_timeout,
        }
    }

    pub async fn get_campaign(
        &self,
        ctx: &RequestContext,
        campaign_id: DbId,
    ) -> AppResult<CampaignDetail> {
        ctx.require(Role::Viewer)?;
        let campaign = self.load(ctx.tenant_id, campaign_id).await?;
        let recipients = self
            .store
            .list_recipients(ctx.tenant_id, campaign_id)
            .await?;
        let timelines: Vec<_> = recipients.iter().map(Recipient::timeline).collect();
        let status = self.derive(&campaign, &timelines);
        let summary = summarize(timelines.iter());

        Ok(CampaignDetail {
            campaign,
            status,
            summary,
        })
    }

    pub async fn list_recipients(
        &self,
        ctx: &RequestContext,
        campaign_id: DbId,
    ) -> AppResult<Vec<RecipientView>> {
        ctx.require(Role::Viewer)?;
        self.load(ctx.tenant_id, campaign_id).await?;
        let recipients = self
            .store
            .list_recipients(ctx.tenant_id, campaign_id)
            .await?;
        Ok(recipients.into_iter().map(RecipientView::from).collect())
    }

    pub async fn summarize(
        &self,
        ctx: &RequestContext,
        campaign_id: DbId,
    ) -> AppResult<CampaignSummary> {
        ctx.require(Role::Viewer)?;
        self.load(ctx.tenant_id, campaign_id).await?;
        let timelines: Vec<_> = self
            .store
            .list_recipients(ctx.tenant_id, campaign_id)
            .await?
            .iter()
            .map(Recipient::timeline)
            .collect();
        Ok(summarize(timelines.iter()))
    }

    /// Derived status for background use. `None` if the campaign is gone.
    pub async fn status(
        &self,
        tenant_id: TenantId,
        campaign_id: DbId,
    ) -> Result<Option<CampaignStatus>, StoreError> {
        let Some(campaign) = self.store.find_campaign(tenant_id, campaign_id).await? else {
            return Ok(None);
        };
        let timelines: Vec<_> = self
            .store
            .list_recipients(tenant_id, campaign_id)
            .await?
            .iter()
            .map(Recipient::timeline)
            .collect();
        Ok(Some(self.derive(&campaign, &timelines)))
    }

    async fn load(&self, tenant_id: TenantId, campaign_id: DbId) -> AppResult<Campaign> {
        let campaign = self
            .store
            .find_campaign(tenant_id, campaign_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Campaign",
                id: campaign_id,
            })?;
        Ok(campaign)
    }

    fn derive(&self, campaign: &Campaign, timelines: &[DeliveryTimeline]) -> CampaignStatus {
        derive_status(
            campaign.is_submitted(),
            timelines.iter(),
            Utc::now(),
            self.delivery_timeout,
        )
    }
}
