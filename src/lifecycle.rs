use thiserror::Error;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{BatchPhase, PhaseChangeRequest, RequestStatus};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LifecycleError {
    #[error("batch is already completed")]
    AlreadyCompleted,

    #[error("cannot move from {current:?} to {requested:?}; the next phase is {expected:?}")]
    NotNextPhase {
        current: BatchPhase,
        requested: BatchPhase,
        expected: BatchPhase,
    },

    #[error("request has already been {0:?}")]
    AlreadyResolved(RequestStatus),

    #[error("a request cannot be reviewed by its requester")]
    SelfReview,

    #[error("batch moved to {actual:?} since the request was raised in {expected:?}")]
    StalePhase {
        expected: BatchPhase,
        actual: BatchPhase,
    },
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::SelfReview => AppError::Forbidden(err.to_string()),
            LifecycleError::AlreadyResolved(_) | LifecycleError::StalePhase { .. } => {
                AppError::Conflict(err.to_string())
            }
            LifecycleError::AlreadyCompleted | LifecycleError::NotNextPhase { .. } => {
                AppError::Validation(err.to_string())
            }
        }
    }
}

/// A batch only advances one phase at a time.
pub fn validate_transition(
    current: BatchPhase,
    requested: BatchPhase,
) -> Result<(), LifecycleError> {
    let expected = current.next().ok_or(LifecycleError::AlreadyCompleted)?;
    if requested != expected {
        return Err(LifecycleError::NotNextPhase {
            current,
            requested,
            expected,
        });
    }
    Ok(())
}

/// Checks a reviewer may resolve `request` against a batch currently in `batch_phase`.
/// The stale-phase check only matters for approvals; rejecting a stale request is allowed.
pub fn validate_review(
    request: &PhaseChangeRequest,
    reviewer_id: Uuid,
    batch_phase: BatchPhase,
    approve: bool,
) -> Result<(), LifecycleError> {
    if request.status != RequestStatus::Pending {
        return Err(LifecycleError::AlreadyResolved(request.status));
    }
    if request.requested_by == reviewer_id {
        return Err(LifecycleError::SelfReview);
    }
    if approve && batch_phase != request.current_phase {
        return Err(LifecycleError::StalePhase {
            expected: request.current_phase,
            actual: batch_phase,
        });
    }
    Ok(())
}
