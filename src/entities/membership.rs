//! Membership entity - One user's (or placeholder's) participation in a plan.
//!
//! Memberships are never hard-deleted when a member leaves: `date_ended` is set instead so
//! that past months keep their headcount. Artificial memberships stand in for people who
//! have no account yet; their `user_id` is a synthetic `artificial_<plan>_<nanos>` id and
//! their display name lives in `name`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Membership database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "memberships")]
pub struct Model {
    /// Unique identifier for the membership
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Plan this membership belongs to
    pub plan_id: i64,
    /// Real user id, or the synthetic id of an artificial member
    pub user_id: String,
    /// Join time; the member owes from the first day of this month
    pub created_at: DateTimeUtc,
    /// When the membership ended, `None` while active
    pub date_ended: Option<DateTimeUtc>,
    /// Member asked to leave but still owes money
    pub leave_requested: bool,
    /// Placeholder member without a login
    pub is_artificial: bool,
    /// Display name, only set for artificial members
    pub name: Option<String>,
}

/// Defines relationships between Membership and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each membership belongs to one plan
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
