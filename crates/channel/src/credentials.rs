//! Per-tenant channel credentials.
//!
//! Every send resolves credentials for the request's own tenant; an
//! adapter never falls back to another tenant's account.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use relay_core::types::TenantId;
use relay_db::DeliveryStore;

use crate::error::ChannelSendError;

#[derive(Clone, PartialEq, Eq)]
pub struct ChannelCredentials {
    pub phone_number_id: String,
    pub access_token: String,
}

impl std::fmt::Debug for ChannelCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelCredentials")
            .field("phone_number_id", &self.phone_number_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
pub trait CredentialsProvider: Send + Sync + 'static {
    /// Credentials for `tenant_id`. A tenant without an account is a
    /// permanent failure; a lookup that could not complete is transient.
    async fn credentials(&self, tenant_id: TenantId) -> Result<ChannelCredentials, ChannelSendError>;
}

fn not_configured(tenant_id: TenantId) -> ChannelSendError {
    ChannelSendError::permanent(format!("no channel account configured for tenant {tenant_id}"))
}

/// Fixed credential table, for tests and single-tenant deployments.
#[derive(Debug, Default, Clone)]
pub struct StaticCredentials {
    by_tenant: HashMap<TenantId, ChannelCredentials>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant(
        mut self,
        tenant_id: TenantId,
        phone_number_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        self.by_tenant.insert(
            tenant_id,
            ChannelCredentials {
                phone_number_id: phone_number_id.into(),
                access_token: access_token.into(),
            },
        );
        self
    }
}

#[async_trait]
impl CredentialsProvider for StaticCredentials {
    async fn credentials(&self, tenant_id: TenantId) -> Result<ChannelCredentials, ChannelSendError> {
        self.by_tenant
            .get(&tenant_id)
            .cloned()
            .ok_or_else(|| not_configured(tenant_id))
    }
}

/// Credentials read from the `channel_accounts` table on every send.
pub struct StoreCredentials {
    store: Arc<dyn DeliveryStore>,
}

impl StoreCredentials {
    pub fn new(store: Arc<dyn DeliveryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CredentialsProvider for StoreCredentials {
    async fn credentials(&self, tenant_id: TenantId) -> Result<ChannelCredentials, ChannelSendError> {
        let account = self
            .store
            .find_channel_account(tenant_id)
            .await
            .map_err(|e| ChannelSendError::transient(format!("credential lookup failed: {e}")))?
            .ok_or_else(|| not_configured(tenant_id))?;
        Ok(ChannelCredentials {
            phone_number_id: account.phone_number_id,
            access_token: account.access_token,
        })
    }
}
