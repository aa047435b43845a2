//! Membership lifecycle - join requests, approval, removal, leaving, and artificial
//! members.
//!
//! Per (plan, user) the states are: no relation, requested (a join request exists),
//! active (a membership without `date_ended`), pending leave (active with
//! `leave_requested`) and ended. Rows are never hard-deleted when a member goes away;
//! `date_ended` is set so that past months keep their headcount. The only hard delete is
//! the artificial row consumed by [`transfer_artificial_member`].

use super::{
    balance::PlanLedger,
    identity::{self, Identity},
    member::{artificial_member_id, is_artificial_id},
    month::Month,
    plan::{find_plan, find_plan_by_join_code},
};
use crate::{
    entities::{JoinRequest, Membership, Payment, join_request, membership, payment, plan},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{debug, info, instrument};

/// Whether a balance is settled once rounded to whole cents.
///
/// Uneven splits leave float residue below a cent, so the comparison with zero happens
/// on the rounded amount.
#[must_use]
pub fn is_settled(balance: f64) -> bool {
    (balance * 100.0).round() >= 0.0
}

/// Result of [`request_join`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The caller owns the plan or already holds an active membership
    AlreadyMember,
    /// The caller's join request, newly created or already pending
    Requested(join_request::Model),
}

/// Result of [`leave_plan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The balance was settled and the membership has ended
    Left(membership::Model),
    /// The member still owes money; the leave completes once a payment settles it
    Pending(membership::Model),
}

/// Every membership of a plan, ended ones included, in insertion order.
pub async fn memberships_for_plan<C>(db: &C, plan_id: i64) -> Result<Vec<membership::Model>>
where
    C: ConnectionTrait,
{
    Membership::find()
        .filter(membership::Column::PlanId.eq(plan_id))
        .order_by_asc(membership::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// The running membership of `user_id` in a plan, if any.
pub async fn get_active_membership<C>(
    db: &C,
    plan_id: i64,
    user_id: &str,
) -> Result<Option<membership::Model>>
where
    C: ConnectionTrait,
{
    Membership::find()
        .filter(membership::Column::PlanId.eq(plan_id))
        .filter(membership::Column::UserId.eq(user_id))
        .filter(membership::Column::DateEnded.is_null())
        .one(db)
        .await
        .map_err(Into::into)
}

async fn find_active_membership<C>(
    db: &C,
    plan_id: i64,
    user_id: &str,
) -> Result<membership::Model>
where
    C: ConnectionTrait,
{
    get_active_membership(db, plan_id, user_id)
        .await?
        .ok_or_else(|| Error::MembershipNotFound {
            plan_id,
            user_id: user_id.to_string(),
        })
}

/// The pending join request of `user_id` for a plan, if any.
pub async fn get_join_request<C>(
    db: &C,
    plan_id: i64,
    user_id: &str,
) -> Result<Option<join_request::Model>>
where
    C: ConnectionTrait,
{
    JoinRequest::find()
        .filter(join_request::Column::PlanId.eq(plan_id))
        .filter(join_request::Column::UserId.eq(user_id))
        .one(db)
        .await
        .map_err(Into::into)
}

async fn find_join_request<C>(db: &C, plan_id: i64, user_id: &str) -> Result<join_request::Model>
where
    C: ConnectionTrait,
{
    get_join_request(db, plan_id, user_id)
        .await?
        .ok_or_else(|| Error::JoinRequestNotFound {
            plan_id,
            user_id: user_id.to_string(),
        })
}

/// Pending join requests of a plan, oldest first.
pub async fn list_join_requests<C>(db: &C, plan_id: i64) -> Result<Vec<join_request::Model>>
where
    C: ConnectionTrait,
{
    JoinRequest::find()
        .filter(join_request::Column::PlanId.eq(plan_id))
        .order_by_asc(join_request::Column::RequestedAt)
        .order_by_asc(join_request::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Sets `date_ended` and clears any pending leave.
async fn end_membership<C>(
    db: &C,
    row: membership::Model,
    now: DateTime<Utc>,
) -> Result<membership::Model>
where
    C: ConnectionTrait,
{
    let mut active: membership::ActiveModel = row.into();
    active.date_ended = Set(Some(now));
    active.leave_requested = Set(false);
    active.update(db).await.map_err(Into::into)
}

/// Asks to join the plan behind `join_code`.
///
/// Owners and active members get [`JoinOutcome::AlreadyMember`] and nothing is written.
/// A second request while one is pending returns the existing request. Two concurrent
/// first requests may both insert; a duplicate request row is harmless.
#[instrument(skip(db), fields(user = identity.user_id()))]
pub async fn request_join(
    db: &DatabaseConnection,
    identity: &Identity,
    join_code: &str,
) -> Result<JoinOutcome> {
    if is_artificial_id(identity.user_id()) {
        return Err(Error::InvalidInput {
            message: format!("{} is reserved for artificial members", identity.user_id()),
        });
    }
    let plan = find_plan_by_join_code(db, join_code).await?;

    if identity.owns(&plan)
        || get_active_membership(db, plan.id, identity.user_id())
            .await?
            .is_some()
    {
        debug!("{} is already in plan {}", identity.user_id(), plan.id);
        return Ok(JoinOutcome::AlreadyMember);
    }

    if let Some(existing) = get_join_request(db, plan.id, identity.user_id()).await? {
        debug!("Join request {} already pending", existing.id);
        return Ok(JoinOutcome::Requested(existing));
    }

    let request = join_request::ActiveModel {
        plan_id: Set(plan.id),
        user_id: Set(identity.user_id().to_string()),
        requested_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("{} requested to join plan {}", identity.user_id(), plan.id);
    Ok(JoinOutcome::Requested(request))
}

/// Approves `user_id`'s join request, creating their membership.
///
/// If the user somehow already holds an active membership it is kept and only the
/// request is consumed.
#[instrument(skip(db), fields(user = identity.user_id()))]
pub async fn approve_request(
    db: &DatabaseConnection,
    identity: &Identity,
    plan_id: i64,
    user_id: &str,
) -> Result<membership::Model> {
    let txn = db.begin().await?;

    let plan = find_plan(&txn, plan_id).await?;
    identity::require_owner(identity, &plan, "approve join requests")?;
    let request = find_join_request(&txn, plan_id, user_id).await?;

    let row = match get_active_membership(&txn, plan_id, user_id).await? {
        Some(existing) => existing,
        None => {
            membership::ActiveModel {
                plan_id: Set(plan_id),
                user_id: Set(user_id.to_string()),
                created_at: Set(Utc::now()),
                date_ended: Set(None),
                leave_requested: Set(false),
                is_artificial: Set(false),
                name: Set(None),
                ..Default::default()
            }
            .insert(&txn)
            .await?
        }
    };
    request.delete(&txn).await?;

    txn.commit().await?;

    info!("Approved {} into plan {}", user_id, plan_id);
    Ok(row)
}

/// Denies `user_id`'s join request.
#[instrument(skip(db), fields(user = identity.user_id()))]
pub async fn deny_request(
    db: &DatabaseConnection,
    identity: &Identity,
    plan_id: i64,
    user_id: &str,
) -> Result<()> {
    let plan = find_plan(db, plan_id).await?;
    identity::require_owner(identity, &plan, "deny join requests")?;

    let request = find_join_request(db, plan_id, user_id).await?;
    request.delete(db).await?;

    info!("Denied join request of {} for plan {}", user_id, plan_id);
    Ok(())
}

/// Ends a member's membership on the owner's behalf, whatever their balance.
///
/// Works for artificial members too. The ended row keeps counting towards the months it
/// was active in.
#[instrument(skip(db), fields(user = identity.user_id()))]
pub async fn remove_member(
    db: &DatabaseConnection,
    identity: &Identity,
    plan_id: i64,
    user_id: &str,
) -> Result<membership::Model> {
    let plan = find_plan(db, plan_id).await?;
    identity::require_owner(identity, &plan, "remove members")?;
    if user_id == plan.owner_id {
        return Err(Error::InvalidState {
            message: "The owner cannot be removed from their own plan".to_string(),
        });
    }

    let row = find_active_membership(db, plan_id, user_id).await?;
    let ended = end_membership(db, row, Utc::now()).await?;

    info!("Removed {} from plan {}", user_id, plan_id);
    Ok(ended)
}

/// Leaves the plan, or records the wish to leave while money is still owed.
///
/// # Errors
/// Returns an error if:
/// - The plan does not exist
/// - The caller owns the plan (owners cannot leave)
/// - The caller has no active membership
#[instrument(skip(db), fields(user = identity.user_id()))]
pub async fn leave_plan(
    db: &DatabaseConnection,
    identity: &Identity,
    plan_id: i64,
) -> Result<LeaveOutcome> {
    let plan = find_plan(db, plan_id).await?;
    if identity.owns(&plan) {
        return Err(Error::InvalidState {
            message: "The owner cannot leave their own plan".to_string(),
        });
    }

    let row = find_active_membership(db, plan_id, identity.user_id()).await?;

    let now = Utc::now();
    let balance = PlanLedger::load(db, &plan)
        .await?
        .member_balance(db, &row, Month::current(now))
        .await?;

    if is_settled(balance) {
        let ended = end_membership(db, row, now).await?;
        info!("{} left plan {}", identity.user_id(), plan_id);
        Ok(LeaveOutcome::Left(ended))
    } else {
        let mut active: membership::ActiveModel = row.into();
        active.leave_requested = Set(true);
        let pending = active.update(db).await?;
        info!(
            "{} asked to leave plan {} owing {:.2}",
            identity.user_id(),
            plan_id,
            -balance
        );
        Ok(LeaveOutcome::Pending(pending))
    }
}

/// Ends `user_id`'s membership if they asked to leave and their balance is now settled.
///
/// Called after every payment that can raise a balance. Returns the ended row when the
/// leave completed.
pub async fn settle_pending_leave<C>(
    db: &C,
    plan: &plan::Model,
    user_id: &str,
) -> Result<Option<membership::Model>>
where
    C: ConnectionTrait,
{
    let Some(row) = get_active_membership(db, plan.id, user_id).await? else {
        return Ok(None);
    };
    if !row.leave_requested {
        return Ok(None);
    }

    let now = Utc::now();
    let balance = PlanLedger::load(db, plan)
        .await?
        .member_balance(db, &row, Month::current(now))
        .await?;
    if !is_settled(balance) {
        debug!("{} still owes {:.2} in plan {}", user_id, -balance, plan.id);
        return Ok(None);
    }

    let ended = end_membership(db, row, now).await?;
    info!("Pending leave of {} from plan {} completed", user_id, plan.id);
    Ok(Some(ended))
}

/// Adds a placeholder member for someone without an account.
#[instrument(skip(db), fields(user = identity.user_id()))]
pub async fn add_artificial_member(
    db: &DatabaseConnection,
    identity: &Identity,
    plan_id: i64,
    name: &str,
) -> Result<membership::Model> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput {
            message: "Artificial member name cannot be empty".to_string(),
        });
    }

    let plan = find_plan(db, plan_id).await?;
    identity::require_owner(identity, &plan, "add artificial members")?;

    let now = Utc::now();
    let row = membership::ActiveModel {
        plan_id: Set(plan_id),
        user_id: Set(artificial_member_id(plan_id, now)),
        created_at: Set(now),
        date_ended: Set(None),
        leave_requested: Set(false),
        is_artificial: Set(true),
        name: Set(Some(name.to_string())),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("Added artificial member {} ({}) to plan {}", row.user_id, name, plan_id);
    Ok(row)
}

/// Hands an artificial member's history over to a real user who asked to join.
///
/// In one transaction: every payment of the artificial member is reassigned to
/// `user_id`, the artificial row is deleted, a real membership is created that keeps the
/// artificial member's join time, and the join request is consumed. Any failure leaves
/// all rows untouched.
///
/// # Errors
/// Returns an error if:
/// - The plan does not exist, or the caller does not own it
/// - `artificial_id` is not an active artificial member of the plan
/// - `user_id` has no pending join request, or already holds an active membership
/// - A database operation fails
#[instrument(skip(db), fields(user = identity.user_id()))]
pub async fn transfer_artificial_member(
    db: &DatabaseConnection,
    identity: &Identity,
    plan_id: i64,
    artificial_id: &str,
    user_id: &str,
) -> Result<membership::Model> {
    let txn = db.begin().await?;

    let plan = find_plan(&txn, plan_id).await?;
    identity::require_owner(identity, &plan, "transfer artificial members")?;

    let artificial = find_active_membership(&txn, plan_id, artificial_id).await?;
    if !artificial.is_artificial {
        return Err(Error::InvalidState {
            message: format!("{artificial_id} is not an artificial member"),
        });
    }
    let request = find_join_request(&txn, plan_id, user_id).await?;
    if get_active_membership(&txn, plan_id, user_id).await?.is_some() {
        return Err(Error::InvalidState {
            message: format!("{user_id} is already a member of plan {plan_id}"),
        });
    }

    let moved = Payment::update_many()
        .col_expr(payment::Column::UserId, Expr::value(user_id))
        .filter(payment::Column::PlanId.eq(plan_id))
        .filter(payment::Column::UserId.eq(artificial_id))
        .exec(&txn)
        .await?;

    let joined_at = artificial.created_at;
    artificial.delete(&txn).await?;

    let row = membership::ActiveModel {
        plan_id: Set(plan_id),
        user_id: Set(user_id.to_string()),
        created_at: Set(joined_at),
        date_ended: Set(None),
        leave_requested: Set(false),
        is_artificial: Set(false),
        name: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    request.delete(&txn).await?;

    txn.commit().await?;

    info!(
        "Transferred artificial member {} to {} in plan {} ({} payments moved)",
        artificial_id, user_id, plan_id, moved.rows_affected
    );
    Ok(row)
}
