//! Shared test utilities for `planshare`.
//!
//! This module provides helpers for setting up in-memory test databases, inserting rows
//! with chosen timestamps, and building plain models for the pure ledger tests.

#![allow(clippy::unwrap_used)]

use crate::{
    config::settings::Settings,
    core::{
        identity::Identity,
        month::Month,
        plan::{self, NewPlan},
    },
    entities::{cost_change, membership, payment, plan as plan_entity},
    errors::Result,
};
use chrono::{DateTime, TimeZone, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Noon UTC on the given day.
pub fn utc(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

/// Creates a plan owned by `owner` through the regular create path.
///
/// # Defaults
/// * `name`: "Test Plan"
/// * `description`: empty
/// * `individual_cost`: 15.0
pub async fn create_test_plan(
    db: &DatabaseConnection,
    owner: &str,
    cost: f64,
) -> Result<plan_entity::Model> {
    plan::create_plan(
        db,
        &Identity::new(owner),
        NewPlan {
            name: "Test Plan".to_string(),
            description: String::new(),
            cost,
            individual_cost: 15.0,
        },
        &Settings::default(),
    )
    .await
}

/// Inserts a membership row with explicit join and end timestamps.
pub async fn insert_membership(
    db: &DatabaseConnection,
    plan_id: i64,
    user_id: &str,
    created_at: DateTime<Utc>,
    date_ended: Option<DateTime<Utc>>,
) -> Result<membership::Model> {
    membership::ActiveModel {
        plan_id: Set(plan_id),
        user_id: Set(user_id.to_string()),
        created_at: Set(created_at),
        date_ended: Set(date_ended),
        leave_requested: Set(false),
        is_artificial: Set(false),
        name: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Inserts a payment row directly, bypassing validation and access checks.
pub async fn insert_payment(
    db: &DatabaseConnection,
    plan_id: i64,
    user_id: &str,
    amount: f64,
    status: payment::PaymentStatus,
    for_month: Option<Month>,
) -> Result<payment::Model> {
    payment::ActiveModel {
        plan_id: Set(plan_id),
        user_id: Set(user_id.to_string()),
        amount: Set(amount),
        date: Set(Utc::now()),
        status: Set(status),
        notes: Set(None),
        for_month: Set(for_month.map(Month::first_day)),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Plain plan model for pure tests.
pub fn plan_row(id: i64, owner: &str, cost: f64, created_at: DateTime<Utc>) -> plan_entity::Model {
    plan_entity::Model {
        id,
        name: format!("Plan {id}"),
        description: String::new(),
        cost,
        individual_cost: 0.0,
        owner_id: owner.to_string(),
        join_code: format!("CODE{id}"),
        created_at,
    }
}

/// Plain membership model for pure tests.
pub fn membership_row(
    id: i64,
    plan_id: i64,
    user_id: &str,
    created_at: DateTime<Utc>,
    date_ended: Option<DateTime<Utc>>,
) -> membership::Model {
    membership::Model {
        id,
        plan_id,
        user_id: user_id.to_string(),
        created_at,
        date_ended,
        leave_requested: false,
        is_artificial: false,
        name: None,
    }
}

/// Plain payment model for pure tests.
pub fn payment_row(
    id: i64,
    plan_id: i64,
    user_id: &str,
    amount: f64,
    status: payment::PaymentStatus,
    for_month: Option<Month>,
) -> payment::Model {
    payment::Model {
        id,
        plan_id,
        user_id: user_id.to_string(),
        amount,
        date: utc(2024, 1, 1),
        status,
        notes: None,
        for_month: for_month.map(Month::first_day),
    }
}

/// Plain cost change model for pure tests.
pub fn cost_change_row(id: i64, plan_id: i64, effective: Month, cost: f64) -> cost_change::Model {
    cost_change::Model {
        id,
        plan_id,
        effective_month: effective.first_day(),
        cost,
        recorded_at: utc(2024, 1, 1),
    }
}
