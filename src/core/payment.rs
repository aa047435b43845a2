//! Payment business logic - member claims, owner approval and rejection, manual entries.
//!
//! A claim starts out pending and only counts towards a balance once the owner approves
//! it. Manual entries by the owner are approved immediately. A payment's amount is never
//! edited afterwards; only its status moves from pending to approved or rejected.

use super::{
    identity::{self, Identity},
    membership::settle_pending_leave,
    month::Month,
    plan::find_plan,
};
use crate::{
    entities::{Membership, Payment, membership, payment, payment::PaymentStatus},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument};

/// A payment as entered by a member or the owner.
#[derive(Debug, Clone, Default)]
pub struct NewPayment {
    /// Amount paid
    pub amount: f64,
    /// Free-text notes; blank notes are dropped
    pub notes: Option<String>,
    /// Month the payment is earmarked for
    pub for_month: Option<Month>,
}

/// Outcome of approving or entering a payment.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentDecision {
    /// The payment after the change
    pub payment: payment::Model,
    /// The payer's membership if the payment completed a pending leave
    pub ended_membership: Option<membership::Model>,
}

/// Parses a user-entered amount such as `"12.50"` or `"$12.50"`.
///
/// # Errors
/// Returns [`Error::InvalidInput`] for text that is not a finite number.
pub fn parse_amount(text: &str) -> Result<f64> {
    let trimmed = text.trim();
    let digits = trimmed.strip_prefix('$').unwrap_or(trimmed).trim();
    digits
        .parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite())
        .ok_or_else(|| Error::InvalidInput {
            message: format!("'{text}' is not an amount"),
        })
}

fn clean_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

/// Finds a payment of the given plan; a payment of another plan counts as missing.
pub async fn find_payment<C>(db: &C, plan_id: i64, payment_id: i64) -> Result<payment::Model>
where
    C: ConnectionTrait,
{
    Payment::find_by_id(payment_id)
        .filter(payment::Column::PlanId.eq(plan_id))
        .one(db)
        .await?
        .ok_or(Error::PaymentNotFound { payment_id })
}

/// Approved payments of `user_id` in a plan.
pub async fn approved_payments_for_member<C>(
    db: &C,
    plan_id: i64,
    user_id: &str,
) -> Result<Vec<payment::Model>>
where
    C: ConnectionTrait,
{
    Payment::find()
        .filter(payment::Column::PlanId.eq(plan_id))
        .filter(payment::Column::UserId.eq(user_id))
        .filter(payment::Column::Status.eq(PaymentStatus::Approved))
        .order_by_asc(payment::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Approved payments of every member of a plan.
pub async fn approved_payments_for_plan<C>(db: &C, plan_id: i64) -> Result<Vec<payment::Model>>
where
    C: ConnectionTrait,
{
    Payment::find()
        .filter(payment::Column::PlanId.eq(plan_id))
        .filter(payment::Column::Status.eq(PaymentStatus::Approved))
        .order_by_asc(payment::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Payments awaiting the owner's decision, newest first.
pub async fn list_pending_payments<C>(
    db: &C,
    plan_id: i64,
    limit: u64,
) -> Result<Vec<payment::Model>>
where
    C: ConnectionTrait,
{
    Payment::find()
        .filter(payment::Column::PlanId.eq(plan_id))
        .filter(payment::Column::Status.eq(PaymentStatus::Pending))
        .order_by_desc(payment::Column::Date)
        .order_by_desc(payment::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}

/// One page of all payments of a plan, newest first.
pub async fn list_plan_payments<C>(
    db: &C,
    plan_id: i64,
    limit: u64,
    offset: u64,
) -> Result<Vec<payment::Model>>
where
    C: ConnectionTrait,
{
    Payment::find()
        .filter(payment::Column::PlanId.eq(plan_id))
        .order_by_desc(payment::Column::Date)
        .order_by_desc(payment::Column::Id)
        .limit(limit)
        .offset(offset)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Payments of one member of a plan in any status, newest first.
pub async fn list_member_payments<C>(
    db: &C,
    plan_id: i64,
    user_id: &str,
    limit: u64,
) -> Result<Vec<payment::Model>>
where
    C: ConnectionTrait,
{
    Payment::find()
        .filter(payment::Column::PlanId.eq(plan_id))
        .filter(payment::Column::UserId.eq(user_id))
        .order_by_desc(payment::Column::Date)
        .order_by_desc(payment::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Records a payment the caller says they made. It stays pending until the owner
/// approves it.
///
/// # Errors
/// Returns an error if:
/// - The plan does not exist
/// - The caller is neither the owner nor an active member
/// - The amount is not a positive finite number
#[instrument(skip(db, new_payment), fields(user = identity.user_id(), amount = new_payment.amount))]
pub async fn claim_payment(
    db: &DatabaseConnection,
    identity: &Identity,
    plan_id: i64,
    new_payment: NewPayment,
) -> Result<payment::Model> {
    let plan = find_plan(db, plan_id).await?;
    identity::require_member(db, identity, &plan, "claim payments").await?;

    if !new_payment.amount.is_finite() || new_payment.amount <= 0.0 {
        return Err(Error::InvalidAmount {
            amount: new_payment.amount,
        });
    }

    let payment = payment::ActiveModel {
        plan_id: Set(plan_id),
        user_id: Set(identity.user_id().to_string()),
        amount: Set(new_payment.amount),
        date: Set(Utc::now()),
        status: Set(PaymentStatus::Pending),
        notes: Set(clean_notes(new_payment.notes)),
        for_month: Set(new_payment.for_month.map(Month::first_day)),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(
        "{} claimed payment {} of {:.2} in plan {}",
        identity.user_id(),
        payment.id,
        payment.amount,
        plan_id
    );
    Ok(payment)
}

/// Approves a pending payment and completes the payer's pending leave if it settles
/// their balance.
///
/// # Errors
/// Returns an error if the plan or payment does not exist, the caller does not own the
/// plan, or the payment is no longer pending.
#[instrument(skip(db), fields(user = identity.user_id()))]
pub async fn approve_payment(
    db: &DatabaseConnection,
    identity: &Identity,
    plan_id: i64,
    payment_id: i64,
) -> Result<PaymentDecision> {
    let txn = db.begin().await?;

    let plan = find_plan(&txn, plan_id).await?;
    identity::require_owner(identity, &plan, "approve payments")?;

    let payment = find_payment(&txn, plan_id, payment_id).await?;
    if payment.status != PaymentStatus::Pending {
        return Err(Error::InvalidState {
            message: format!("Payment {payment_id} is already {:?}", payment.status),
        });
    }

    let mut active: payment::ActiveModel = payment.into();
    active.status = Set(PaymentStatus::Approved);
    let payment = active.update(&txn).await?;

    let ended_membership = settle_pending_leave(&txn, &plan, &payment.user_id).await?;

    txn.commit().await?;

    info!(
        "Approved payment {} of {:.2} from {}",
        payment.id, payment.amount, payment.user_id
    );
    Ok(PaymentDecision {
        payment,
        ended_membership,
    })
}

/// Rejects a pending payment. It stays on record but never counts.
#[instrument(skip(db), fields(user = identity.user_id()))]
pub async fn reject_payment(
    db: &DatabaseConnection,
    identity: &Identity,
    plan_id: i64,
    payment_id: i64,
) -> Result<payment::Model> {
    let plan = find_plan(db, plan_id).await?;
    identity::require_owner(identity, &plan, "reject payments")?;

    let payment = find_payment(db, plan_id, payment_id).await?;
    if payment.status != PaymentStatus::Pending {
        return Err(Error::InvalidState {
            message: format!("Payment {payment_id} is already {:?}", payment.status),
        });
    }

    let mut active: payment::ActiveModel = payment.into();
    active.status = Set(PaymentStatus::Rejected);
    let payment = active.update(db).await?;

    info!("Rejected payment {} from {}", payment.id, payment.user_id);
    Ok(payment)
}

/// Records a payment on a member's behalf, approved immediately.
///
/// Negative amounts are corrections; zero is rejected. The member may have left
/// already, as long as they were a member of the plan at some point.
///
/// # Errors
/// Returns an error if:
/// - The plan does not exist, or the caller does not own it
/// - The amount is zero or not finite
/// - `user_id` has never been a member of the plan
#[instrument(skip(db, new_payment), fields(user = identity.user_id(), amount = new_payment.amount))]
pub async fn add_manual_payment(
    db: &DatabaseConnection,
    identity: &Identity,
    plan_id: i64,
    user_id: &str,
    new_payment: NewPayment,
) -> Result<PaymentDecision> {
    if !new_payment.amount.is_finite() || new_payment.amount == 0.0 {
        return Err(Error::InvalidAmount {
            amount: new_payment.amount,
        });
    }

    let txn = db.begin().await?;

    let plan = find_plan(&txn, plan_id).await?;
    identity::require_owner(identity, &plan, "record manual payments")?;

    let known_member = Membership::find()
        .filter(membership::Column::PlanId.eq(plan_id))
        .filter(membership::Column::UserId.eq(user_id))
        .one(&txn)
        .await?
        .is_some();
    if !known_member {
        return Err(Error::MembershipNotFound {
            plan_id,
            user_id: user_id.to_string(),
        });
    }

    let payment = payment::ActiveModel {
        plan_id: Set(plan_id),
        user_id: Set(user_id.to_string()),
        amount: Set(new_payment.amount),
        date: Set(Utc::now()),
        status: Set(PaymentStatus::Approved),
        notes: Set(clean_notes(new_payment.notes)),
        for_month: Set(new_payment.for_month.map(Month::first_day)),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let ended_membership = settle_pending_leave(&txn, &plan, user_id).await?;

    txn.commit().await?;

    info!(
        "Recorded manual payment {} of {:.2} for {} in plan {}",
        payment.id, payment.amount, user_id, plan_id
    );
    Ok(PaymentDecision {
        payment,
        ended_membership,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::{
        balance::PlanLedger,
        membership::{LeaveOutcome, get_active_membership, leave_plan},
    };
    use crate::test_utils::*;

    fn claim(amount: f64) -> NewPayment {
        NewPayment {
            amount,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("12.50").unwrap(), 12.5);
        assert_eq!(parse_amount(" $7 ").unwrap(), 7.0);
        assert_eq!(parse_amount("-3").unwrap(), -3.0);
        assert!(matches!(parse_amount("ten"), Err(Error::InvalidInput { .. })));
        assert!(parse_amount("").is_err());
        assert!(parse_amount("inf").is_err());
        assert!(parse_amount("NaN").is_err());
    }

    #[tokio::test]
    async fn test_claim_payment() -> Result<()> {
        let db = setup_test_db().await?;
        let plan = create_test_plan(&db, "owner", 30.0).await?;
        insert_membership(&db, plan.id, "alice", utc(2024, 1, 1), None).await?;
        let alice = Identity::new("alice");

        let payment = claim_payment(
            &db,
            &alice,
            plan.id,
            NewPayment {
                amount: 10.0,
                notes: Some("  March  ".to_string()),
                for_month: Some(Month::new(2024, 3).unwrap()),
            },
        )
        .await?;
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.user_id, "alice");
        assert_eq!(payment.notes.as_deref(), Some("March"));
        assert_eq!(
            payment.for_month,
            Some(Month::new(2024, 3).unwrap().first_day())
        );

        for amount in [0.0, -5.0, f64::INFINITY] {
            let result = claim_payment(&db, &alice, plan.id, claim(amount)).await;
            assert!(matches!(result, Err(Error::InvalidAmount { .. })));
        }

        let result = claim_payment(&db, &Identity::new("mallory"), plan.id, claim(5.0)).await;
        assert!(matches!(result, Err(Error::NotAuthorized { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_approve_and_reject() -> Result<()> {
        let db = setup_test_db().await?;
        let plan = create_test_plan(&db, "owner", 30.0).await?;
        insert_membership(&db, plan.id, "alice", utc(2024, 1, 1), None).await?;
        let alice = Identity::new("alice");
        let owner = Identity::new("owner");

        let first = claim_payment(&db, &alice, plan.id, claim(10.0)).await?;
        let second = claim_payment(&db, &alice, plan.id, claim(20.0)).await?;

        let result = approve_payment(&db, &alice, plan.id, first.id).await;
        assert!(matches!(result, Err(Error::NotAuthorized { .. })));

        let decision = approve_payment(&db, &owner, plan.id, first.id).await?;
        assert_eq!(decision.payment.status, PaymentStatus::Approved);
        assert!(decision.ended_membership.is_none());

        // Approving twice is refused rather than double counted
        let result = approve_payment(&db, &owner, plan.id, first.id).await;
        assert!(matches!(result, Err(Error::InvalidState { .. })));
        let result = reject_payment(&db, &owner, plan.id, first.id).await;
        assert!(matches!(result, Err(Error::InvalidState { .. })));

        let rejected = reject_payment(&db, &owner, plan.id, second.id).await?;
        assert_eq!(rejected.status, PaymentStatus::Rejected);
        assert_eq!(rejected.amount, 20.0);

        let approved = approved_payments_for_member(&db, plan.id, "alice").await?;
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].id, first.id);

        let result = approve_payment(&db, &owner, plan.id, 9999).await;
        assert!(matches!(result, Err(Error::PaymentNotFound { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_payment_of_other_plan_is_not_found() -> Result<()> {
        let db = setup_test_db().await?;
        let plan = create_test_plan(&db, "owner", 30.0).await?;
        let other = create_test_plan(&db, "owner", 30.0).await?;
        let payment = insert_payment(&db, other.id, "alice", 5.0, PaymentStatus::Pending, None)
            .await?;

        let result = approve_payment(&db, &Identity::new("owner"), plan.id, payment.id).await;
        assert!(matches!(result, Err(Error::PaymentNotFound { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_manual_payment() -> Result<()> {
        let db = setup_test_db().await?;
        let plan = create_test_plan(&db, "owner", 30.0).await?;
        insert_membership(&db, plan.id, "alice", utc(2024, 1, 1), None).await?;
        let owner = Identity::new("owner");

        let decision = add_manual_payment(&db, &owner, plan.id, "alice", claim(25.0)).await?;
        assert_eq!(decision.payment.status, PaymentStatus::Approved);

        // Corrections may be negative
        let correction = add_manual_payment(&db, &owner, plan.id, "alice", claim(-5.0)).await?;
        assert_eq!(correction.payment.amount, -5.0);

        let result = add_manual_payment(&db, &owner, plan.id, "alice", claim(0.0)).await;
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));

        let result = add_manual_payment(&db, &owner, plan.id, "bob", claim(5.0)).await;
        assert!(matches!(result, Err(Error::MembershipNotFound { .. })));

        let result =
            add_manual_payment(&db, &Identity::new("alice"), plan.id, "alice", claim(5.0)).await;
        assert!(matches!(result, Err(Error::NotAuthorized { .. })));

        let total: f64 = approved_payments_for_member(&db, plan.id, "alice")
            .await?
            .iter()
            .map(|p| p.amount)
            .sum();
        assert_eq!(total, 20.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_approval_settling_balance_completes_leave() -> Result<()> {
        let db = setup_test_db().await?;
        let plan = create_test_plan(&db, "owner", 30.0).await?;
        let row = insert_membership(&db, plan.id, "alice", utc(2024, 1, 1), None).await?;
        let alice = Identity::new("alice");
        let owner = Identity::new("owner");

        let outcome = leave_plan(&db, &alice, plan.id).await?;
        assert!(matches!(outcome, LeaveOutcome::Pending(_)));

        // Pay exactly what is owed so the balance lands on zero
        let as_of = Month::current(Utc::now());
        let owed = -PlanLedger::load(&db, &plan)
            .await?
            .member_balance(&db, &row, as_of)
            .await?;
        assert!(owed > 0.0);

        let payment = claim_payment(&db, &alice, plan.id, claim(owed)).await?;
        let decision = approve_payment(&db, &owner, plan.id, payment.id).await?;

        let ended = decision.ended_membership.unwrap();
        assert!(ended.date_ended.is_some());
        assert!(!ended.leave_requested);
        assert!(get_active_membership(&db, plan.id, "alice").await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_partial_payment_keeps_leave_pending() -> Result<()> {
        let db = setup_test_db().await?;
        let plan = create_test_plan(&db, "owner", 30.0).await?;
        insert_membership(&db, plan.id, "alice", utc(2024, 1, 1), None).await?;
        let owner = Identity::new("owner");

        leave_plan(&db, &Identity::new("alice"), plan.id).await?;
        let decision = add_manual_payment(&db, &owner, plan.id, "alice", claim(1.0)).await?;
        assert!(decision.ended_membership.is_none());

        let row = get_active_membership(&db, plan.id, "alice").await?.unwrap();
        assert!(row.leave_requested);

        Ok(())
    }

    #[tokio::test]
    async fn test_payment_listings() -> Result<()> {
        let db = setup_test_db().await?;
        let plan = create_test_plan(&db, "owner", 30.0).await?;
        let first = insert_payment(&db, plan.id, "alice", 1.0, PaymentStatus::Pending, None).await?;
        let second = insert_payment(&db, plan.id, "bob", 2.0, PaymentStatus::Approved, None).await?;
        let third = insert_payment(&db, plan.id, "alice", 3.0, PaymentStatus::Pending, None).await?;

        let pending = list_pending_payments(&db, plan.id, 10).await?;
        let ids: Vec<i64> = pending.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![third.id, first.id]);

        let page = list_plan_payments(&db, plan.id, 2, 0).await?;
        assert_eq!(page.len(), 2);
        let rest = list_plan_payments(&db, plan.id, 2, 2).await?;
        assert_eq!(rest.len(), 1);

        let bobs = list_member_payments(&db, plan.id, "bob", 10).await?;
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].id, second.id);

        let approved = approved_payments_for_plan(&db, plan.id).await?;
        assert_eq!(approved.len(), 1);

        Ok(())
    }
}
