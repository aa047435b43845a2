//! Unified error type for `planshare`.
//!
//! Every fallible operation in the crate returns [`Result`]. Callers that sit in front of
//! the core (an HTTP layer, a bot, a CLI) map errors to their own responses through
//! [`Error::kind`] instead of matching on individual variants.

use thiserror::Error;

/// Errors produced by the core, the configuration layer and the record store.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description of the problem
        message: String,
    },

    /// The record store rejected a query or a write
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Filesystem access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No plan matches the given id or join code
    #[error("Plan not found: {reference}")]
    PlanNotFound {
        /// The id or join code that was looked up
        reference: String,
    },

    /// The user has no membership row in the plan
    #[error("Membership not found for user {user_id} in plan {plan_id}")]
    MembershipNotFound {
        /// Plan that was searched
        plan_id: i64,
        /// User (or artificial member id) that was searched
        user_id: String,
    },

    /// No payment with this id belongs to the plan
    #[error("Payment not found: {payment_id}")]
    PaymentNotFound {
        /// Payment that was looked up
        payment_id: i64,
    },

    /// There is no pending join request for this user
    #[error("No join request from user {user_id} for plan {plan_id}")]
    JoinRequestNotFound {
        /// Plan that was searched
        plan_id: i64,
        /// Requesting user
        user_id: String,
    },

    /// The caller is not the owner or a member as the action requires
    #[error("User {user_id} may not {action} in plan {plan_id}")]
    NotAuthorized {
        /// Calling user
        user_id: String,
        /// Plan the action targeted
        plan_id: i64,
        /// Short description of the attempted action
        action: &'static str,
    },

    /// A monetary amount is zero, negative where not allowed, or not finite
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// Input could not be parsed or failed validation
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description of the rejected input
        message: String,
    },

    /// The requested transition is not valid from the record's current state
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Description of the rejected transition
        message: String,
    },
}

/// Coarse classification of an [`Error`], used by callers to pick a recovery path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A plan, membership, payment or join request lookup failed
    NotFound,
    /// The caller lacks the owner/member role the action requires
    NotAuthorized,
    /// Bad amount, date, name or an invalid state transition; nothing was changed
    InvalidInput,
    /// The store or the environment failed; prior state is left intact
    TransactionalFailure,
}

impl Error {
    /// Classifies the error for the caller.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::PlanNotFound { .. }
            | Self::MembershipNotFound { .. }
            | Self::PaymentNotFound { .. }
            | Self::JoinRequestNotFound { .. } => ErrorKind::NotFound,
            Self::NotAuthorized { .. } => ErrorKind::NotAuthorized,
            Self::InvalidAmount { .. } | Self::InvalidInput { .. } | Self::InvalidState { .. } => {
                ErrorKind::InvalidInput
            }
            Self::Config { .. } | Self::Database(_) | Self::Io(_) => {
                ErrorKind::TransactionalFailure
            }
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
