//! Request-scoped caller context.
//!
//! Every engine operation receives a [`RequestContext`] built once per
//! request from authenticated input. Tenant scoping comes from here and
//! never from payload content.

use crate::error::CoreError;
use crate::roles::{authorize, Decision, Role};
use crate::types::{DbId, TenantId};

/// Who is performing the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// An end user authenticated by a session token.
    User { user_id: DbId, role: Role },
    /// The channel provider, authenticated by the webhook shared secret.
    /// Bypasses the role hierarchy.
    Service,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub tenant_id: TenantId,
    pub actor: Actor,
}

impl RequestContext {
    pub fn user(tenant_id: TenantId, user_id: DbId, role: Role) -> Self {
        Self {
            tenant_id,
            actor: Actor::User { user_id, role },
        }
    }

    pub fn service(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            actor: Actor::Service,
        }
    }

    pub fn user_id(&self) -> Option<DbId> {
        match self.actor {
            Actor::User { user_id, .. } => Some(user_id),
            Actor::Service => None,
        }
    }

    /// Fail with [`CoreError::Forbidden`] unless the actor meets `min`.
    pub fn require(&self, min: Role) -> Result<(), CoreError> {
        match self.actor {
            Actor::Service => Ok(()),
            Actor::User { role, .. } => match authorize(role, min) {
                Decision::Allow => Ok(()),
                Decision::Deny => Err(CoreError::Forbidden {
                    required: min,
                    actual: role,
                }),
            },
        }
    }
}
