//! Membership activity resolution.
//!
//! Decides which memberships count towards a given month. A membership is active in a
//! month when it joined in or before that month and either has not ended or ended in or
//! after it. Both boundaries are compared at month granularity, so a member who joins on
//! the 31st or leaves on the 1st is active for that whole month.
//!
//! Everything here is a pure function of its inputs.

use super::month::Month;
use crate::entities::{membership, plan};

/// Month the membership started owing from.
#[must_use]
pub fn join_month(row: &membership::Model) -> Month {
    Month::of(&row.created_at)
}

/// Last month the membership owes for, `None` while it is still running.
#[must_use]
pub fn end_month(row: &membership::Model) -> Option<Month> {
    row.date_ended.as_ref().map(Month::of)
}

/// Whether `row` is active during `month`.
#[must_use]
pub fn is_active_in(row: &membership::Model, month: Month) -> bool {
    join_month(row) <= month && end_month(row).is_none_or(|end| end >= month)
}

/// The memberships of `plan` that were active during `month`.
///
/// Rows that belong to a different plan are ignored.
#[must_use]
pub fn active_memberships<'a>(
    plan: &plan::Model,
    memberships: &'a [membership::Model],
    month: Month,
) -> Vec<&'a membership::Model> {
    memberships
        .iter()
        .filter(|row| row.plan_id == plan.id && is_active_in(row, month))
        .collect()
}

/// Number of people sharing the cost in a month: the active memberships plus the owner.
///
/// The owner is normally not represented by a row. If a row for the owner is among
/// `active`, it is not counted a second time.
#[must_use]
pub fn headcount(plan: &plan::Model, active: &[&membership::Model]) -> usize {
    let owner_has_row = active.iter().any(|row| row.user_id == plan.owner_id);
    if owner_has_row {
        active.len()
    } else {
        active.len() + 1
    }
}
