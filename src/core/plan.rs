//! Plan business logic - creating, finding, editing, listing and deleting plans.
//!
//! Plans are found by id or by their join code. Only the owner may edit or delete a plan.
//! Price edits are recorded as cost changes so that earlier months keep the price they
//! were billed at.

use super::{
    balance::PlanLedger,
    identity::{self, Identity},
    month::Month,
};
use crate::{
    config::settings::Settings,
    entities::{
        CostChange, JoinRequest, Membership, Payment, Plan, cost_change, join_request, membership,
        payment, plan,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use rand::Rng;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

const JOIN_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Input for [`create_plan`].
#[derive(Debug, Clone)]
pub struct NewPlan {
    /// Display name, must not be blank
    pub name: String,
    /// Free-text description
    pub description: String,
    /// Monthly cost of the plan
    pub cost: f64,
    /// Monthly cost of one individual subscription
    pub individual_cost: f64,
}

/// Input for [`update_plan`]. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct PlanUpdate {
    /// New display name
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New monthly cost, effective from the current month
    pub cost: Option<f64>,
    /// New individual subscription cost
    pub individual_cost: Option<f64>,
}

/// A plan as seen from one user's plan list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanSummary {
    /// The plan
    pub plan: plan::Model,
    /// Whether the user owns it
    pub is_owner: bool,
    /// Memberships that are running and have no pending leave, owner excluded
    pub active_members: usize,
    /// The user's balance; always zero for the owner
    pub balance: f64,
}

fn validate_cost(amount: f64) -> Result<()> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidAmount { amount })
    }
}

/// Generates a random join code of `length` characters from `A-Z0-9`.
#[must_use]
pub fn generate_join_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(JOIN_CODE_CHARSET[rng.gen_range(0..JOIN_CODE_CHARSET.len())]))
        .collect()
}

/// Finds a plan by id, returning None if it does not exist.
pub async fn get_plan_by_id<C>(db: &C, plan_id: i64) -> Result<Option<plan::Model>>
where
    C: ConnectionTrait,
{
    Plan::find_by_id(plan_id).one(db).await.map_err(Into::into)
}

/// Finds a plan by join code, returning None if no plan uses it.
pub async fn get_plan_by_join_code<C>(db: &C, join_code: &str) -> Result<Option<plan::Model>>
where
    C: ConnectionTrait,
{
    Plan::find()
        .filter(plan::Column::JoinCode.eq(join_code.trim()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Like [`get_plan_by_id`] but a missing plan is an [`Error::PlanNotFound`].
pub async fn find_plan<C>(db: &C, plan_id: i64) -> Result<plan::Model>
where
    C: ConnectionTrait,
{
    get_plan_by_id(db, plan_id)
        .await?
        .ok_or_else(|| Error::PlanNotFound {
            reference: plan_id.to_string(),
        })
}

/// Like [`get_plan_by_join_code`] but a missing plan is an [`Error::PlanNotFound`].
pub async fn find_plan_by_join_code<C>(db: &C, join_code: &str) -> Result<plan::Model>
where
    C: ConnectionTrait,
{
    get_plan_by_join_code(db, join_code)
        .await?
        .ok_or_else(|| Error::PlanNotFound {
            reference: join_code.to_string(),
        })
}

/// Creates a plan owned by the caller with a fresh, unused join code.
///
/// The owner gets no membership row; they are an implicit member of their own plan.
///
/// # Errors
/// Returns an error if:
/// - The name is empty or whitespace-only
/// - Either cost is negative or not finite
/// - No unused join code was found within the configured number of attempts
/// - The database insert fails
#[instrument(skip(db, new_plan, settings), fields(user = owner.user_id()))]
pub async fn create_plan(
    db: &DatabaseConnection,
    owner: &Identity,
    new_plan: NewPlan,
    settings: &Settings,
) -> Result<plan::Model> {
    if new_plan.name.trim().is_empty() {
        return Err(Error::InvalidInput {
            message: "Plan name cannot be empty".to_string(),
        });
    }
    validate_cost(new_plan.cost)?;
    validate_cost(new_plan.individual_cost)?;

    let mut join_code = None;
    for attempt in 1..=settings.join_code_attempts {
        let candidate = generate_join_code(settings.join_code_length);
        if get_plan_by_join_code(db, &candidate).await?.is_none() {
            join_code = Some(candidate);
            break;
        }
        debug!("Join code {} already taken (attempt {})", candidate, attempt);
    }
    let join_code = join_code.ok_or_else(|| Error::InvalidState {
        message: "Could not generate an unused join code".to_string(),
    })?;

    let plan = plan::ActiveModel {
        name: Set(new_plan.name.trim().to_string()),
        description: Set(new_plan.description),
        cost: Set(new_plan.cost),
        individual_cost: Set(new_plan.individual_cost),
        owner_id: Set(owner.user_id().to_string()),
        join_code: Set(join_code),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("Created plan {} ({}) with join code {}", plan.id, plan.name, plan.join_code);
    Ok(plan)
}

/// Recorded cost changes of a plan in insertion order.
pub async fn cost_changes_for_plan<C>(db: &C, plan_id: i64) -> Result<Vec<cost_change::Model>>
where
    C: ConnectionTrait,
{
    CostChange::find()
        .filter(cost_change::Column::PlanId.eq(plan_id))
        .order_by_asc(cost_change::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Records that `plan` costs `new_cost` from the month of `now` on.
///
/// The first change of a plan also records the old price as the baseline from the
/// plan's creation month, so months before the edit keep being billed at it.
async fn record_cost_change<C>(
    db: &C,
    plan: &plan::Model,
    new_cost: f64,
    now: DateTime<Utc>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let effective = Month::current(now);
    let history = cost_changes_for_plan(db, plan.id).await?;

    let created = Month::of(&plan.created_at);
    if history.is_empty() && created < effective {
        cost_change::ActiveModel {
            plan_id: Set(plan.id),
            effective_month: Set(created.first_day()),
            cost: Set(plan.cost),
            recorded_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    if let Some(existing) = history
        .into_iter()
        .rev()
        .find(|change| Month::of(&change.effective_month) == effective)
    {
        let mut change: cost_change::ActiveModel = existing.into();
        change.cost = Set(new_cost);
        change.recorded_at = Set(now);
        change.update(db).await?;
    } else {
        cost_change::ActiveModel {
            plan_id: Set(plan.id),
            effective_month: Set(effective.first_day()),
            cost: Set(new_cost),
            recorded_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    debug!("Plan {} costs {:.2} from {}", plan.id, new_cost, effective);
    Ok(())
}

/// Updates the caller's plan. Fields left as `None` keep their current value.
///
/// # Errors
/// Returns an error if:
/// - The plan does not exist, or the caller does not own it
/// - A new name is blank, or a new cost is negative or not finite
/// - A database operation fails (nothing is changed in that case)
#[instrument(skip(db, update), fields(user = identity.user_id()))]
pub async fn update_plan(
    db: &DatabaseConnection,
    identity: &Identity,
    plan_id: i64,
    update: PlanUpdate,
) -> Result<plan::Model> {
    if let Some(name) = &update.name
        && name.trim().is_empty()
    {
        return Err(Error::InvalidInput {
            message: "Plan name cannot be empty".to_string(),
        });
    }
    if let Some(cost) = update.cost {
        validate_cost(cost)?;
    }
    if let Some(individual_cost) = update.individual_cost {
        validate_cost(individual_cost)?;
    }

    let txn = db.begin().await?;

    let plan = find_plan(&txn, plan_id).await?;
    identity::require_owner(identity, &plan, "edit the plan")?;

    let now = Utc::now();
    if let Some(cost) = update.cost
        && (cost - plan.cost).abs() > f64::EPSILON
    {
        record_cost_change(&txn, &plan, cost, now).await?;
    }

    let mut active: plan::ActiveModel = plan.into();
    if let Some(name) = update.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(description) = update.description {
        active.description = Set(description);
    }
    if let Some(cost) = update.cost {
        active.cost = Set(cost);
    }
    if let Some(individual_cost) = update.individual_cost {
        active.individual_cost = Set(individual_cost);
    }
    let updated = active.update(&txn).await?;

    txn.commit().await?;

    info!("Updated plan {}", updated.id);
    Ok(updated)
}

/// Deletes the caller's plan together with everything that references it.
///
/// Payments, memberships, join requests and cost changes are removed in the same
/// transaction as the plan; if any delete fails nothing is removed.
///
/// # Errors
/// Returns an error if the plan does not exist, the caller does not own it, or a
/// database operation fails.
#[instrument(skip(db), fields(user = identity.user_id()))]
pub async fn delete_plan(db: &DatabaseConnection, identity: &Identity, plan_id: i64) -> Result<()> {
    let txn = db.begin().await?;

    let plan = find_plan(&txn, plan_id).await?;
    identity::require_owner(identity, &plan, "delete the plan")?;

    let payments = Payment::delete_many()
        .filter(payment::Column::PlanId.eq(plan.id))
        .exec(&txn)
        .await?;
    let memberships = Membership::delete_many()
        .filter(membership::Column::PlanId.eq(plan.id))
        .exec(&txn)
        .await?;
    let requests = JoinRequest::delete_many()
        .filter(join_request::Column::PlanId.eq(plan.id))
        .exec(&txn)
        .await?;
    CostChange::delete_many()
        .filter(cost_change::Column::PlanId.eq(plan.id))
        .exec(&txn)
        .await?;
    plan.delete(&txn).await?;

    txn.commit().await?;

    info!(
        "Deleted plan {} with {} memberships, {} join requests and {} payments",
        plan_id, memberships.rows_affected, requests.rows_affected, payments.rows_affected
    );
    Ok(())
}

/// Lists every plan the caller owns or has a membership in, ordered by plan id.
///
/// Plans the caller has left are included so that a remaining balance stays visible.
#[instrument(skip(db), fields(user = identity.user_id()))]
pub async fn list_plans_for_user(
    db: &DatabaseConnection,
    identity: &Identity,
) -> Result<Vec<PlanSummary>> {
    let mut plans: BTreeMap<i64, plan::Model> = Plan::find()
        .filter(plan::Column::OwnerId.eq(identity.user_id()))
        .all(db)
        .await?
        .into_iter()
        .map(|plan| (plan.id, plan))
        .collect();

    let joined_ids: Vec<i64> = Membership::find()
        .filter(membership::Column::UserId.eq(identity.user_id()))
        .all(db)
        .await?
        .into_iter()
        .map(|row| row.plan_id)
        .filter(|plan_id| !plans.contains_key(plan_id))
        .collect();

    if !joined_ids.is_empty() {
        for plan in Plan::find()
            .filter(plan::Column::Id.is_in(joined_ids))
            .all(db)
            .await?
        {
            plans.insert(plan.id, plan);
        }
    }

    let as_of = Month::current(Utc::now());
    let mut summaries = Vec::with_capacity(plans.len());
    for plan in plans.into_values() {
        let ledger = PlanLedger::load(db, &plan).await?;
        let active_members = ledger
            .memberships()
            .iter()
            .filter(|row| row.date_ended.is_none() && !row.leave_requested)
            .count();

        let is_owner = identity.owns(&plan);
        let balance = if is_owner {
            0.0
        } else if let Some(row) = ledger.membership_of(identity.user_id()) {
            ledger.member_balance(db, row, as_of).await?
        } else {
            warn!("Plan {} listed for {} without a membership", plan.id, identity.user_id());
            0.0
        };

        summaries.push(PlanSummary {
            plan,
            is_owner,
            active_members,
            balance,
        });
    }

    Ok(summaries)
}
