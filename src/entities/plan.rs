//! Plan entity - A shared subscription whose monthly cost is split among its members.
//!
//! The owner is identified by `owner_id` and is an implicit, permanent member: there is
//! no membership row for the owner. Other users find the plan through its `join_code`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Plan database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "plans")]
pub struct Model {
    /// Unique identifier for the plan
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name (e.g., "Spotify Family")
    pub name: String,
    /// Free-text description shown to members
    pub description: String,
    /// Current total monthly cost of the plan in dollars
    pub cost: f64,
    /// What one person would pay for an individual subscription, used for savings
    pub individual_cost: f64,
    /// User id of the plan owner
    pub owner_id: String,
    /// Invite code other users enter to request membership
    #[sea_orm(unique)]
    pub join_code: String,
    /// When the plan was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Plan and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One plan has many memberships
    #[sea_orm(has_many = "super::membership::Entity")]
    Memberships,
    /// One plan has many payments
    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,
    /// One plan has many pending join requests
    #[sea_orm(has_many = "super::join_request::Entity")]
    JoinRequests,
    /// One plan has many recorded cost changes
    #[sea_orm(has_many = "super::cost_change::Entity")]
    CostChanges,
}

impl Related<super::membership::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Memberships.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl Related<super::join_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JoinRequests.def()
    }
}

impl Related<super::cost_change::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CostChanges.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
