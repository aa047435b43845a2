//! Plan statement generation.
//!
//! This module gathers everything shown on a plan's page: who is in it and what each
//! member owes, pending join requests, payments, and what the group saved. The result
//! is structured data; [`format_statement`] renders it as plain text.

use super::{
    balance::PlanLedger,
    identity::{self, Access, Identity},
    member::Member,
    membership::list_join_requests,
    month::Month,
    payment::{
        approved_payments_for_plan, list_member_payments, list_pending_payments,
        list_plan_payments,
    },
    plan::find_plan,
};
use crate::{
    config::settings::Settings,
    entities::{join_request, payment, plan},
    errors::Result,
};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write;
use tracing::instrument;

/// One row of the member table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberLine {
    /// Who the row stands for
    pub member: Member,
    /// Whether this is the plan owner
    pub is_owner: bool,
    /// Current balance; `None` for the owner
    pub balance: Option<f64>,
    /// Member asked to leave and still owes money
    pub leave_requested: bool,
    /// When the member joined
    pub joined_at: DateTime<Utc>,
}

/// Everything shown for one plan to one viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanStatement {
    /// The plan
    pub plan: plan::Model,
    /// Month the balances are computed up to
    pub as_of: Month,
    /// Whether the viewer owns the plan
    pub viewer_is_owner: bool,
    /// The viewer's own balance; `None` for the owner
    pub viewer_balance: Option<f64>,
    /// Owner first, then every running membership
    pub members: Vec<MemberLine>,
    /// Pending join requests, only filled for the owner
    pub join_requests: Vec<join_request::Model>,
    /// Payments awaiting approval, only filled for the owner
    pub pending_payments: Vec<payment::Model>,
    /// Recent payments: all of the plan's for the owner, the viewer's own otherwise
    pub recent_payments: Vec<payment::Model>,
    /// Sum of every approved payment
    pub total_payments: f64,
    /// Savings against individual subscriptions since the plan started
    pub total_savings: f64,
    /// Whole days since the plan was created
    pub plan_age_days: i64,
}

/// Builds the statement of a plan as seen by `identity`.
///
/// # Arguments
/// * `db` - Database connection
/// * `identity` - The viewer; must own the plan or hold an active membership
/// * `plan_id` - ID of the plan
/// * `settings` - Supplies the payment page size
///
/// # Returns
/// A structured `PlanStatement` with balances as of the current month
#[instrument(skip(db, settings), fields(user = identity.user_id()))]
pub async fn plan_statement(
    db: &DatabaseConnection,
    identity: &Identity,
    plan_id: i64,
    settings: &Settings,
) -> Result<PlanStatement> {
    let plan = find_plan(db, plan_id).await?;
    let access = identity::require_member(db, identity, &plan, "view the plan").await?;

    let now = Utc::now();
    let as_of = Month::current(now);

    let data = PlanLedger::load(db, &plan).await?;
    let ledger = data.ledger();
    let approved = approved_payments_for_plan(db, plan.id).await?;

    let mut members = vec![MemberLine {
        member: Member::Real {
            user_id: plan.owner_id.clone(),
        },
        is_owner: true,
        balance: None,
        leave_requested: false,
        joined_at: plan.created_at,
    }];
    let mut seen = HashSet::from([plan.owner_id.as_str()]);
    for row in data.memberships().iter().filter(|row| row.date_ended.is_none()) {
        if !seen.insert(row.user_id.as_str()) {
            continue;
        }
        members.push(MemberLine {
            member: Member::from_membership(row),
            is_owner: false,
            balance: Some(ledger.compute_balance(row, &approved, as_of)),
            leave_requested: row.leave_requested,
            joined_at: row.created_at,
        });
    }

    let viewer_balance = match &access {
        Access::Owner => None,
        Access::Member(row) => Some(ledger.compute_balance(row, &approved, as_of)),
    };

    let (join_requests, pending_payments, recent_payments) = match access {
        Access::Owner => (
            list_join_requests(db, plan.id).await?,
            list_pending_payments(db, plan.id, settings.payment_page_size).await?,
            list_plan_payments(db, plan.id, settings.payment_page_size, 0).await?,
        ),
        Access::Member(_) => (
            Vec::new(),
            Vec::new(),
            list_member_payments(db, plan.id, identity.user_id(), settings.payment_page_size)
                .await?,
        ),
    };

    let total_payments = approved.iter().map(|p| p.amount).sum();
    let total_savings = ledger.total_savings(as_of);
    let plan_age_days = (now - plan.created_at).num_days();

    Ok(PlanStatement {
        viewer_is_owner: identity.owns(&plan),
        plan,
        as_of,
        viewer_balance,
        members,
        join_requests,
        pending_payments,
        recent_payments,
        total_payments,
        total_savings,
        plan_age_days,
    })
}

/// Formats a balance with its meaning, e.g. "+$5.00 credit" or "-$12.50 owed".
#[must_use]
pub fn format_balance(balance: f64) -> String {
    if balance.abs() < 0.005 {
        "$0.00 settled".to_string()
    } else if balance > 0.0 {
        format!("+${balance:.2} credit")
    } else {
        format!("-${:.2} owed", balance.abs())
    }
}

fn member_label(line: &MemberLine) -> String {
    match line.member.display_name() {
        Some(name) => format!("{name} (no account)"),
        None if line.is_owner => format!("{} (owner)", line.member.id()),
        None => line.member.id().to_string(),
    }
}

/// Renders a statement as plain text.
#[must_use]
pub fn format_statement(statement: &PlanStatement) -> String {
    let plan = &statement.plan;
    let mut out = String::new();

    // Writing to a String cannot fail
    let _ = writeln!(out, "📋 {} (code {})", plan.name, plan.join_code);
    if !plan.description.is_empty() {
        let _ = writeln!(out, "{}", plan.description);
    }
    let _ = writeln!(
        out,
        "${:.2}/month, {} days old, balances as of {}",
        plan.cost, statement.plan_age_days, statement.as_of
    );

    let _ = writeln!(out, "\nMembers:");
    for line in &statement.members {
        let balance = line
            .balance
            .map_or_else(|| "-".to_string(), format_balance);
        let leaving = if line.leave_requested {
            " (leaving)"
        } else {
            ""
        };
        let _ = writeln!(out, "  {}: {}{}", member_label(line), balance, leaving);
    }

    if !statement.join_requests.is_empty() {
        let _ = writeln!(out, "\nJoin requests:");
        for request in &statement.join_requests {
            let _ = writeln!(
                out,
                "  {} since {}",
                request.user_id,
                request.requested_at.format("%Y-%m-%d")
            );
        }
    }

    if !statement.pending_payments.is_empty() {
        let _ = writeln!(out, "\nAwaiting approval:");
        for payment in &statement.pending_payments {
            let _ = writeln!(
                out,
                "  #{} {} ${:.2}",
                payment.id, payment.user_id, payment.amount
            );
        }
    }

    let _ = writeln!(out, "\nTotal paid: ${:.2}", statement.total_payments);
    let _ = write!(out, "Total saved: ${:.2}", statement.total_savings);
    if let Some(balance) = statement.viewer_balance {
        let _ = write!(out, "\nYour balance: {}", format_balance(balance));
    }

    out
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::membership::{add_artificial_member, leave_plan};
    use crate::entities::payment::PaymentStatus;
    use crate::test_utils::*;

    #[test]
    fn test_format_balance() {
        assert_eq!(format_balance(5.0), "+$5.00 credit");
        assert_eq!(format_balance(-12.5), "-$12.50 owed");
        assert_eq!(format_balance(0.0), "$0.00 settled");
        assert_eq!(format_balance(-0.001), "$0.00 settled");
    }

    #[tokio::test]
    async fn test_owner_statement() -> Result<()> {
        let db = setup_test_db().await?;
        let plan = create_test_plan(&db, "owner", 30.0).await?;
        let now = Utc::now();
        insert_membership(&db, plan.id, "alice", now, None).await?;
        insert_membership(&db, plan.id, "bob", now, None).await?;
        insert_membership(&db, plan.id, "carol", utc(2020, 1, 1), Some(utc(2020, 6, 1))).await?;
        let owner = Identity::new("owner");
        add_artificial_member(&db, &owner, plan.id, "Grandma").await?;

        insert_payment(&db, plan.id, "alice", 10.0, PaymentStatus::Approved, None).await?;
        insert_payment(&db, plan.id, "bob", 4.0, PaymentStatus::Pending, None).await?;
        crate::core::membership::request_join(&db, &Identity::new("dave"), &plan.join_code)
            .await?;

        let statement = plan_statement(&db, &owner, plan.id, &Settings::default()).await?;

        assert!(statement.viewer_is_owner);
        assert_eq!(statement.viewer_balance, None);

        // Owner first, ended members left out
        let ids: Vec<&str> = statement.members.iter().map(|m| m.member.id()).collect();
        assert_eq!(ids.len(), 4);
        assert_eq!(ids[..3], ["owner", "alice", "bob"]);
        assert!(statement.members[0].is_owner);
        assert!(statement.members[3].member.is_artificial());

        // Four people share $30 this month
        assert_eq!(statement.members[1].balance, Some(10.0 - 7.5));
        assert_eq!(statement.members[2].balance, Some(-7.5));

        assert_eq!(statement.join_requests.len(), 1);
        assert_eq!(statement.pending_payments.len(), 1);
        assert_eq!(statement.recent_payments.len(), 2);
        assert_eq!(statement.total_payments, 10.0);
        // 4 people x $15 individually against $30
        assert_eq!(statement.total_savings, 30.0);
        assert_eq!(statement.plan_age_days, 0);

        let text = format_statement(&statement);
        assert!(text.contains("owner (owner)"));
        assert!(text.contains("alice: +$2.50 credit"));
        assert!(text.contains("bob: -$7.50 owed"));
        assert!(text.contains("Grandma (no account)"));
        assert!(text.contains("Join requests:"));
        assert!(!text.contains("carol"));

        Ok(())
    }

    #[tokio::test]
    async fn test_member_statement() -> Result<()> {
        let db = setup_test_db().await?;
        let plan = create_test_plan(&db, "owner", 30.0).await?;
        let now = Utc::now();
        insert_membership(&db, plan.id, "alice", now, None).await?;
        insert_membership(&db, plan.id, "bob", now, None).await?;
        insert_payment(&db, plan.id, "bob", 4.0, PaymentStatus::Pending, None).await?;

        let alice = Identity::new("alice");
        leave_plan(&db, &alice, plan.id).await?;

        let statement = plan_statement(&db, &alice, plan.id, &Settings::default()).await?;
        assert!(!statement.viewer_is_owner);
        assert_eq!(statement.viewer_balance, Some(-10.0));
        assert!(statement.join_requests.is_empty());
        assert!(statement.pending_payments.is_empty());
        assert!(statement.recent_payments.is_empty());
        assert!(statement.members[1].leave_requested);

        let text = format_statement(&statement);
        assert!(text.contains("(leaving)"));
        assert!(text.contains("Your balance: -$10.00 owed"));

        let result =
            plan_statement(&db, &Identity::new("mallory"), plan.id, &Settings::default()).await;
        assert!(matches!(
            result,
            Err(crate::errors::Error::NotAuthorized { .. })
        ));

        Ok(())
    }
}
