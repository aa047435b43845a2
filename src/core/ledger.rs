//! Ledger engine - turns a plan's cost, its memberships and a member's payments into a
//! signed balance.
//!
//! The walk runs month by month from the member's join month through the earlier of
//! their end month and the `as_of` month. Each month the member owes an equal share of
//! that month's cost, split among everyone active in it (the owner included). Approved
//! payments are then netted against the total.
//!
//! A payment earmarked with `for_month` offsets exactly that month's share and is taken
//! out of the general pool of payments, so it is never counted twice. Earmarks that fall
//! outside the walk stay in the general pool.
//!
//! Sign convention: a positive balance is credit, a negative balance is money owed.
//!
//! Nothing in this module touches the database; callers fetch the rows and pass them in.

use super::{activity, month::Month};
use crate::entities::{cost_change, membership, payment, plan};
use serde::Serialize;
use std::collections::HashMap;

/// A plan's monthly cost over time.
///
/// Looks up the cost for a month as the latest change effective on or before it. Months
/// before the first recorded change use that first change; a plan without history costs
/// its current price in every month.
#[derive(Debug, Clone, PartialEq)]
pub struct CostSchedule {
    current: f64,
    changes: Vec<(Month, f64)>,
}

impl CostSchedule {
    /// The same cost in every month.
    #[must_use]
    pub fn flat(cost: f64) -> Self {
        Self {
            current: cost,
            changes: Vec::new(),
        }
    }

    /// Builds the schedule for `plan` from its recorded cost changes.
    #[must_use]
    pub fn from_changes(plan: &plan::Model, changes: &[cost_change::Model]) -> Self {
        let mut changes: Vec<(Month, f64)> = changes
            .iter()
            .filter(|change| change.plan_id == plan.id)
            .map(|change| (Month::of(&change.effective_month), change.cost))
            .collect();
        // Later rows win when two changes share a month
        changes.sort_by_key(|(month, _)| *month);
        changes.dedup_by(|later, earlier| {
            if later.0 == earlier.0 {
                earlier.1 = later.1;
                true
            } else {
                false
            }
        });

        Self {
            current: plan.cost,
            changes,
        }
    }

    /// Monthly cost of the plan during `month`.
    #[must_use]
    pub fn cost_for(&self, month: Month) -> f64 {
        let idx = self.changes.partition_point(|(effective, _)| *effective <= month);
        match idx {
            0 => self.changes.first().map_or(self.current, |(_, cost)| *cost),
            n => self.changes[n - 1].1,
        }
    }
}

/// One month of a member's ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthLine {
    /// The month
    pub month: Month,
    /// People sharing the cost this month, owner included
    pub headcount: usize,
    /// Plan cost for this month
    pub cost: f64,
    /// This member's share of the cost
    pub share: f64,
    /// Approved payments earmarked for this month
    pub tagged_paid: f64,
    /// `share - tagged_paid`; negative when the month was overpaid
    pub outstanding: f64,
}

/// Full result of a ledger walk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerSummary {
    /// One line per month walked, oldest first
    pub lines: Vec<MonthLine>,
    /// Sum of shares less earmarked payments inside the walk
    pub amount_due: f64,
    /// Approved payments not consumed by an earmarked month
    pub total_paid: f64,
    /// `total_paid - amount_due`; positive is credit, negative is owed
    pub balance: f64,
}

/// Balance computations over one plan's memberships.
#[derive(Debug, Clone)]
pub struct Ledger<'a> {
    plan: &'a plan::Model,
    memberships: &'a [membership::Model],
    schedule: CostSchedule,
}

impl<'a> Ledger<'a> {
    /// A ledger billing every month at the plan's current cost.
    #[must_use]
    pub fn new(plan: &'a plan::Model, memberships: &'a [membership::Model]) -> Self {
        Self {
            plan,
            memberships,
            schedule: CostSchedule::flat(plan.cost),
        }
    }

    /// Replaces the cost schedule.
    #[must_use]
    pub fn with_schedule(mut self, schedule: CostSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// People sharing the cost in `month`, owner included.
    #[must_use]
    pub fn headcount(&self, month: Month) -> usize {
        let active = activity::active_memberships(self.plan, self.memberships, month);
        activity::headcount(self.plan, &active)
    }

    /// Each person's share of `month`'s cost. Zero when nobody is active.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn monthly_share(&self, month: Month) -> f64 {
        match self.headcount(month) {
            0 => 0.0,
            n => self.schedule.cost_for(month) / n as f64,
        }
    }

    /// Walks `membership`'s months up to `as_of` and nets its approved payments.
    ///
    /// Only approved payments made by this member for this plan are considered, so the
    /// caller may pass an unfiltered payment list.
    #[must_use]
    pub fn breakdown(
        &self,
        membership: &membership::Model,
        payments: &[payment::Model],
        as_of: Month,
    ) -> LedgerSummary {
        let mut total_paid = 0.0;
        let mut tagged: HashMap<Month, f64> = HashMap::new();

        for payment in payments.iter().filter(|p| {
            p.plan_id == self.plan.id
                && p.user_id == membership.user_id
                && p.status == payment::PaymentStatus::Approved
        }) {
            total_paid += payment.amount;
            if let Some(for_month) = payment.for_month {
                *tagged.entry(Month::of(&for_month)).or_insert(0.0) += payment.amount;
            }
        }

        let start = activity::join_month(membership);
        let end = activity::end_month(membership).map_or(as_of, |end| end.min(as_of));

        let mut amount_due = 0.0;
        let mut lines = Vec::new();
        for month in Month::range_inclusive(start, end) {
            let headcount = self.headcount(month);
            let share = self.monthly_share(month);
            let tagged_paid = tagged.get(&month).copied().unwrap_or(0.0);

            amount_due += share - tagged_paid;
            total_paid -= tagged_paid;

            lines.push(MonthLine {
                month,
                headcount,
                cost: self.schedule.cost_for(month),
                share,
                tagged_paid,
                outstanding: share - tagged_paid,
            });
        }

        LedgerSummary {
            lines,
            amount_due,
            total_paid,
            balance: total_paid - amount_due,
        }
    }

    /// Signed balance of `membership` as of `as_of`: positive is credit, negative is owed.
    #[must_use]
    pub fn compute_balance(
        &self,
        membership: &membership::Model,
        payments: &[payment::Model],
        as_of: Month,
    ) -> f64 {
        self.breakdown(membership, payments, as_of).balance
    }

    /// What the group saved against everyone buying an individual subscription, summed
    /// over every month from plan creation through `as_of`. Months where the plan cost
    /// more than individual subscriptions would have contribute nothing.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn total_savings(&self, as_of: Month) -> f64 {
        Month::range_inclusive(Month::of(&self.plan.created_at), as_of)
            .map(|month| {
                let people = self.headcount(month) as f64;
                (self.plan.individual_cost * people - self.schedule.cost_for(month)).max(0.0)
            })
            .sum()
    }
}
