//! Cost change entity - History of a plan's monthly cost.
//!
//! Each row says "from `effective_month` on, the plan cost `cost`". The ledger uses the
//! latest row effective on or before a month, so editing a plan's price does not rewrite
//! what members owed in earlier months.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Cost change database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cost_changes")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Plan whose cost changed
    pub plan_id: i64,
    /// First day of the first month billed at `cost`
    pub effective_month: Date,
    /// Monthly cost in dollars from `effective_month` on
    pub cost: f64,
    /// When the change was recorded
    pub recorded_at: DateTimeUtc,
}

/// Defines relationships between `CostChange` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each cost change belongs to one plan
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
