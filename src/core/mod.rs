//! Core layer - framework-agnostic plan sharing logic
//!
//! Everything here takes a database connection and, where access matters, the caller's
//! [`identity::Identity`]. The ledger and activity modules are pure; the rest read and
//! write through SeaORM.

/// Membership activity per month and headcount
pub mod activity;
/// Database-backed balances and month breakdowns
pub mod balance;
/// Caller identity and owner/member access checks
pub mod identity;
/// Ledger engine - month-by-month shares netted against payments
pub mod ledger;
/// Real versus artificial members
pub mod member;
/// Join requests, leaving, removal, and artificial member transfer
pub mod membership;
/// Calendar month value type
pub mod month;
/// Payment claims, approval, rejection, and manual entries
pub mod payment;
/// Plan creation, editing, listing, and deletion
pub mod plan;
/// Plan statements and their text rendering
pub mod report;
