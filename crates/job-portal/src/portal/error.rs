use super::domain::{ApplicationStatus, JobId};

/// Failure raised by a store backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Another writer holds the store; safe to retry immediately.
    #[error("store contention during {context}: {message}")]
    Contention {
        context: &'static str,
        message: String,
    },
    #[error("store failure during {context}: {message}")]
    Backend {
        context: &'static str,
        message: String,
    },
}

impl StoreError {
    pub fn backend(context: &'static str, message: impl ToString) -> Self {
        Self::Backend {
            context,
            message: message.to_string(),
        }
    }

    pub fn contention(context: &'static str, message: impl ToString) -> Self {
        Self::Contention {
            context,
            message: message.to_string(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Contention { .. })
    }
}

/// Every way a portal operation can be refused.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("{entity} {id} does not exist")]
    NotFound { entity: &'static str, id: i64 },
    #[error("you have already applied for this job")]
    AlreadyApplied,
    #[error("application limit reached for job {0}")]
    JobFull(JobId),
    #[error("you have {limit} active applications, hence you cannot apply")]
    TooManyActiveApplications { limit: u32 },
    #[error("you already have an accepted job, hence you cannot apply")]
    AlreadyEmployed,
    #[error("all {max_positions} positions for job {job_id} are already filled")]
    PositionsFull { job_id: JobId, max_positions: u32 },
    #[error("application is {0} and cannot be updated")]
    TerminalStateLocked(ApplicationStatus),
    #[error("application cannot move from {from} to {to}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("no accepted or finished application links sender and receiver, hence rating is not allowed")]
    NotEligibleToRate,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PortalError {
    pub(crate) fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Stable machine-readable name for API payloads and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PortalError::Forbidden(_) => "forbidden",
            PortalError::NotFound { .. } => "not_found",
            PortalError::AlreadyApplied => "already_applied",
            PortalError::JobFull(_) => "job_full",
            PortalError::TooManyActiveApplications { .. } => "too_many_active_applications",
            PortalError::AlreadyEmployed => "already_employed",
            PortalError::PositionsFull { .. } => "positions_full",
            PortalError::TerminalStateLocked(_) => "terminal_state_locked",
            PortalError::InvalidTransition { .. } => "invalid_transition",
            PortalError::NotEligibleToRate => "not_eligible_to_rate",
            PortalError::Validation(_) => "validation_error",
            PortalError::Conflict(_) => "conflict",
            PortalError::Store(_) => "store_error",
        }
    }
}
