//! Join request entity - A pending request to join a plan, awaiting the owner.
//! Deleted once the owner approves, denies, or transfers an artificial member to it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Join request database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "join_requests")]
pub struct Model {
    /// Unique identifier for the request
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Plan the user wants to join
    pub plan_id: i64,
    /// Requesting user
    pub user_id: String,
    /// When the request was made
    pub requested_at: DateTimeUtc,
}

/// Defines relationships between `JoinRequest` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each request targets one plan
    #[sea_orm(
        belongs_to = "super::plan::Entity",
        from = "Column::PlanId",
        to = "super::plan::Column::Id"
    )]
    Plan,
}

impl Related<super::plan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Plan.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
