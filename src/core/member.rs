//! Real versus artificial members.
//!
//! Membership rows carry an `is_artificial` flag plus an optional `name`; [`Member`] folds
//! those into one tagged value so call sites never have to check both.

use crate::entities::membership;
use chrono::{DateTime, Utc};
use serde::Serialize;

const ARTIFICIAL_PREFIX: &str = "artificial_";

/// Who a membership row stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Member {
    /// A registered user
    Real {
        /// User id from the identity provider
        user_id: String,
    },
    /// A placeholder for someone without an account
    Artificial {
        /// Synthetic id, `artificial_<plan id>_<nanos>`
        id: String,
        /// Name the owner gave the placeholder
        name: String,
    },
}

impl Member {
    /// Reads the variant out of a membership row.
    #[must_use]
    pub fn from_membership(row: &membership::Model) -> Self {
        if row.is_artificial {
            Self::Artificial {
                id: row.user_id.clone(),
                name: row.name.clone().unwrap_or_default(),
            }
        } else {
            Self::Real {
                user_id: row.user_id.clone(),
            }
        }
    }

    /// The id stored in `user_id` columns for this member.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Real { user_id } => user_id,
            Self::Artificial { id, .. } => id,
        }
    }

    /// Name to show for the member. Real members are named by the identity provider.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        match self {
            Self::Real { .. } => None,
            Self::Artificial { name, .. } => Some(name),
        }
    }

    /// Whether this is a placeholder member
    #[must_use]
    pub const fn is_artificial(&self) -> bool {
        matches!(self, Self::Artificial { .. })
    }
}

/// Generates the synthetic user id for a new artificial member of `plan_id`.
#[must_use]
pub fn artificial_member_id(plan_id: i64, now: DateTime<Utc>) -> String {
    let nanos = now
        .timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1_000));
    format!("{ARTIFICIAL_PREFIX}{plan_id}_{nanos}")
}

/// Whether `user_id` has the shape of a synthetic artificial-member id.
#[must_use]
pub fn is_artificial_id(user_id: &str) -> bool {
    user_id.starts_with(ARTIFICIAL_PREFIX)
}
