//! Domain error taxonomy shared by every service.

use thiserror::Error;

use stitch_core::TransitionError;

use super::auth::AuthError;
use crate::db::RepositoryError;

/// Errors returned by storefront services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The target does not exist (or the caller has no profile to own it).
    #[error("No {0} matches the given query.")]
    NotFound(&'static str),

    /// The caller may not act on the target.
    #[error("You do not have permission to perform this action.")]
    Forbidden,

    /// Input failed validation, including duplicate unique keys.
    #[error("{0}")]
    Validation(String),

    /// The order already has a payment.
    #[error("this order already has a payment")]
    DuplicatePayment,

    /// A status write is not an edge of the state machine, or lost a race.
    #[error("{0}")]
    InvalidTransition(String),

    /// The store failed. Details are logged, never returned to clients.
    #[error("service unavailable: {0}")]
    DependencyUnavailable(String),

    /// Identity provider failure.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ServiceError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound("record"),
            RepositoryError::Conflict(msg) | RepositoryError::Invalid(msg) => Self::Validation(msg),
            RepositoryError::Stale(msg) => Self::InvalidTransition(msg),
            RepositoryError::Database(e) => Self::DependencyUnavailable(e.to_string()),
            RepositoryError::DataCorruption(msg) | RepositoryError::Storage(msg) => {
                Self::DependencyUnavailable(msg)
            }
        }
    }
}

impl From<TransitionError> for ServiceError {
    fn from(err: TransitionError) -> Self {
        Self::InvalidTransition(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_errors_map_to_taxonomy() {
        assert!(matches!(
            ServiceError::from(RepositoryError::Conflict("dup".to_owned())),
            ServiceError::Validation(m) if m == "dup"
        ));
        assert!(matches!(
            ServiceError::from(RepositoryError::Stale("moved".to_owned())),
            ServiceError::InvalidTransition(_)
        ));
        assert!(matches!(
            ServiceError::from(RepositoryError::Storage("lock poisoned".to_owned())),
            ServiceError::DependencyUnavailable(_)
        ));
        assert!(matches!(
            ServiceError::from(RepositoryError::NotFound),
            ServiceError::NotFound(_)
        ));
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(
            ServiceError::NotFound("Order").to_string(),
            "No Order matches the given query."
        );
    }
}
