//! Caller identity and access checks.
//!
//! The authenticated user is passed explicitly into every core operation as an
//! [`Identity`]; nothing reads it from ambient request state.

use crate::{
    entities::{Membership, membership, plan},
    errors::{Error, Result},
};
use sea_orm::prelude::*;

/// The authenticated user performing an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    user_id: String,
}

impl Identity {
    /// Wraps a user id handed over by the session layer.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    /// The caller's user id
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Whether the caller owns `plan`
    #[must_use]
    pub fn owns(&self, plan: &plan::Model) -> bool {
        plan.owner_id == self.user_id
    }
}

/// How the caller relates to a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// The caller owns the plan
    Owner,
    /// The caller holds this active membership
    Member(membership::Model),
}

/// Fails with [`Error::NotAuthorized`] unless the caller owns `plan`.
pub fn require_owner(identity: &Identity, plan: &plan::Model, action: &'static str) -> Result<()> {
    if identity.owns(plan) {
        Ok(())
    } else {
        Err(not_authorized(identity, plan, action))
    }
}

/// Resolves the caller's role in `plan`, failing unless they are the owner or hold an
/// active membership.
pub async fn require_member<C>(
    db: &C,
    identity: &Identity,
    plan: &plan::Model,
    action: &'static str,
) -> Result<Access>
where
    C: ConnectionTrait,
{
    if identity.owns(plan) {
        return Ok(Access::Owner);
    }

    Membership::find()
        .filter(membership::Column::PlanId.eq(plan.id))
        .filter(membership::Column::UserId.eq(identity.user_id()))
        .filter(membership::Column::DateEnded.is_null())
        .one(db)
        .await?
        .map(Access::Member)
        .ok_or_else(|| not_authorized(identity, plan, action))
}

fn not_authorized(identity: &Identity, plan: &plan::Model, action: &'static str) -> Error {
    Error::NotAuthorized {
        user_id: identity.user_id().to_string(),
        plan_id: plan.id,
        action,
    }
}
