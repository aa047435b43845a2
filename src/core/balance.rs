//! Database-backed balances.
//!
//! Loads what the ledger engine needs for one plan and runs it for a member.

use super::{
    identity::{self, Identity},
    ledger::{CostSchedule, Ledger, LedgerSummary},
    membership::memberships_for_plan,
    month::Month,
    payment::approved_payments_for_member,
    plan::{cost_changes_for_plan, find_plan},
};
use crate::{
    entities::{membership, plan},
    errors::{Error, Result},
};
use sea_orm::prelude::*;
use tracing::debug;

/// A plan with its memberships and cost history, ready for ledger walks.
#[derive(Debug, Clone)]
pub struct PlanLedger {
    plan: plan::Model,
    memberships: Vec<membership::Model>,
    schedule: CostSchedule,
}

impl PlanLedger {
    /// Loads every membership and cost change of `plan`.
    pub async fn load<C>(db: &C, plan: &plan::Model) -> Result<Self>
    where
        C: ConnectionTrait,
    {
        let memberships = memberships_for_plan(db, plan.id).await?;
        let changes = cost_changes_for_plan(db, plan.id).await?;
        debug!(
            "Loaded ledger for plan {}: {} memberships, {} cost changes",
            plan.id,
            memberships.len(),
            changes.len()
        );

        Ok(Self {
            schedule: CostSchedule::from_changes(plan, &changes),
            plan: plan.clone(),
            memberships,
        })
    }

    /// All memberships of the plan, ended ones included
    #[must_use]
    pub fn memberships(&self) -> &[membership::Model] {
        &self.memberships
    }

    /// The ledger engine over this plan.
    #[must_use]
    pub fn ledger(&self) -> Ledger<'_> {
        Ledger::new(&self.plan, &self.memberships).with_schedule(self.schedule.clone())
    }

    /// The membership row that represents `user_id`: the running one if there is one,
    /// otherwise the most recently created.
    #[must_use]
    pub fn membership_of(&self, user_id: &str) -> Option<&membership::Model> {
        let mut rows = self.memberships.iter().filter(|row| row.user_id == user_id);
        let latest = rows.clone().max_by_key(|row| (row.created_at, row.id));
        rows.find(|row| row.date_ended.is_none()).or(latest)
    }

    /// Month-by-month ledger of `row` up to `as_of`.
    pub async fn member_summary<C>(
        &self,
        db: &C,
        row: &membership::Model,
        as_of: Month,
    ) -> Result<LedgerSummary>
    where
        C: ConnectionTrait,
    {
        let payments = approved_payments_for_member(db, self.plan.id, &row.user_id).await?;
        Ok(self.ledger().breakdown(row, &payments, as_of))
    }

    /// Signed balance of `row` as of `as_of`; positive is credit.
    pub async fn member_balance<C>(
        &self,
        db: &C,
        row: &membership::Model,
        as_of: Month,
    ) -> Result<f64>
    where
        C: ConnectionTrait,
    {
        Ok(self.member_summary(db, row, as_of).await?.balance)
    }
}

/// Ledger of one member of a plan up to `as_of`.
///
/// The owner may look at anyone; a member only at themselves.
///
/// # Errors
/// Returns an error if the plan does not exist, the caller may not view the ledger, or
/// the user has never been a member of the plan.
pub async fn month_breakdown(
    db: &DatabaseConnection,
    identity: &Identity,
    plan_id: i64,
    user_id: &str,
    as_of: Month,
) -> Result<LedgerSummary> {
    let plan = find_plan(db, plan_id).await?;
    if identity.user_id() != user_id {
        identity::require_owner(identity, &plan, "view another member's balance")?;
    }

    let data = PlanLedger::load(db, &plan).await?;
    let row = data
        .membership_of(user_id)
        .ok_or_else(|| Error::MembershipNotFound {
            plan_id,
            user_id: user_id.to_string(),
        })?;

    data.member_summary(db, row, as_of).await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::entities::payment::PaymentStatus;
    use crate::test_utils::*;

    fn month(year: i32, m: u32) -> Month {
        Month::new(year, m).unwrap()
    }

    #[tokio::test]
    async fn test_member_balance_from_database() -> Result<()> {
        let db = setup_test_db().await?;
        let plan = create_test_plan(&db, "owner", 30.0).await?;
        let alice = insert_membership(&db, plan.id, "alice", utc(2024, 1, 1), None).await?;
        insert_membership(&db, plan.id, "bob", utc(2024, 1, 1), None).await?;

        insert_payment(&db, plan.id, "alice", 10.0, PaymentStatus::Approved, None).await?;
        insert_payment(&db, plan.id, "alice", 50.0, PaymentStatus::Pending, None).await?;
        insert_payment(&db, plan.id, "alice", 50.0, PaymentStatus::Rejected, None).await?;

        let data = PlanLedger::load(&db, &plan).await?;
        // Two months at $10, $10 paid
        let balance = data.member_balance(&db, &alice, month(2024, 2)).await?;
        assert!((balance + 10.0).abs() < 1e-9);

        Ok(())
    }

    #[tokio::test]
    async fn test_membership_of_prefers_running_row() -> Result<()> {
        let db = setup_test_db().await?;
        let plan = create_test_plan(&db, "owner", 30.0).await?;
        let old = insert_membership(
            &db,
            plan.id,
            "alice",
            utc(2023, 1, 1),
            Some(utc(2023, 6, 1)),
        )
        .await?;

        let data = PlanLedger::load(&db, &plan).await?;
        assert_eq!(data.membership_of("alice"), Some(&old));
        assert_eq!(data.membership_of("bob"), None);

        let current = insert_membership(&db, plan.id, "alice", utc(2024, 1, 1), None).await?;
        let data = PlanLedger::load(&db, &plan).await?;
        assert_eq!(data.membership_of("alice"), Some(&current));

        Ok(())
    }

    #[tokio::test]
    async fn test_month_breakdown_access() -> Result<()> {
        let db = setup_test_db().await?;
        let plan = create_test_plan(&db, "owner", 30.0).await?;
        insert_membership(&db, plan.id, "alice", utc(2024, 1, 1), None).await?;
        insert_membership(&db, plan.id, "bob", utc(2024, 1, 1), None).await?;

        let own = month_breakdown(&db, &Identity::new("alice"), plan.id, "alice", month(2024, 3))
            .await?;
        assert_eq!(own.lines.len(), 3);
        assert_eq!(own.lines[0].headcount, 3);

        let by_owner =
            month_breakdown(&db, &Identity::new("owner"), plan.id, "alice", month(2024, 3))
                .await?;
        assert_eq!(by_owner, own);

        let result =
            month_breakdown(&db, &Identity::new("bob"), plan.id, "alice", month(2024, 3)).await;
        assert!(matches!(result, Err(Error::NotAuthorized { .. })));

        let result =
            month_breakdown(&db, &Identity::new("owner"), plan.id, "carol", month(2024, 3)).await;
        assert!(matches!(result, Err(Error::MembershipNotFound { .. })));

        Ok(())
    }
}
