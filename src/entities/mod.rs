//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the record collections the core reads and writes.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod cost_change;
pub mod join_request;
pub mod membership;
pub mod payment;
pub mod plan;

// Re-export specific types to avoid conflicts
pub use cost_change::{Column as CostChangeColumn, Entity as CostChange, Model as CostChangeModel};
pub use join_request::{
    Column as JoinRequestColumn, Entity as JoinRequest, Model as JoinRequestModel,
};
pub use membership::{Column as MembershipColumn, Entity as Membership, Model as MembershipModel};
pub use payment::{
    Column as PaymentColumn, Entity as Payment, Model as PaymentModel, PaymentStatus,
};
pub use plan::{Column as PlanColumn, Entity as Plan, Model as PlanModel};
