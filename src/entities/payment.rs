//! Payment entity - Money a member paid (or claims to have paid) towards a plan.
//!
//! Payments move through `pending` → `approved` | `rejected` and are never edited
//! otherwise. Only approved payments count towards a balance. A payment may be earmarked
//! for one month through `for_month`, which always holds the first day of that month.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Review status of a payment
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Claimed by a member, waiting for the owner
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Accepted by the owner; counts towards the balance
    #[sea_orm(string_value = "approved")]
    Approved,
    /// Refused by the owner
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// Payment database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    /// Unique identifier for the payment
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Plan the payment was made for
    pub plan_id: i64,
    /// Paying user, or the synthetic id of an artificial member
    pub user_id: String,
    /// Amount in dollars; manual corrections may be negative
    pub amount: f64,
    /// When the payment was recorded
    pub date: DateTimeUtc,
    /// Review status
    pub status: PaymentStatus,
    /// Optional free-text notes
    pub notes: Option<String>,
    /// First day of the month this payment is earmarked for
    pub for_month: Option<Date>,
}

/// Defines relationships between Payment and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each payment belongs to one plan
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
