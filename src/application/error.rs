use thiserror::Error;

use crate::domain::{Conflict, TransitionError};
use crate::storage::is_unique_violation;

/// Coarse classification of an [`AppError`], used by the interfaces to
/// pick an HTTP status or exit message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    Forbidden,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Vehicle not found: {0}")]
    VehicleNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Trip not found: {0}")]
    TripNotFound(String),

    #[error("Cash entry not found: {0}")]
    CashEntryNotFound(String),

    #[error("Booking not found: {0}")]
    BookingNotFound(String),

    #[error("Service log not found: {0}")]
    ServiceLogNotFound(String),

    #[error("Trip sheet not found: {0}")]
    TripSheetNotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Vehicle is not available for the selected dates and times")]
    VehicleUnavailable { conflicts: Vec<Conflict> },

    #[error("Vehicle number already exists: {0}")]
    DuplicateVehicle(String),

    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    #[error("Vehicle {0} still has trips, service logs or bookings")]
    VehicleInUse(String),

    #[error("{0}")]
    BookingDecided(TransitionError),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::VehicleNotFound(_)
            | AppError::UserNotFound(_)
            | AppError::TripNotFound(_)
            | AppError::CashEntryNotFound(_)
            | AppError::BookingNotFound(_)
            | AppError::ServiceLogNotFound(_)
            | AppError::TripSheetNotFound(_) => ErrorKind::NotFound,
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::BookingDecided(TransitionError::InvalidTarget(_)) => ErrorKind::Validation,
            AppError::VehicleUnavailable { .. }
            | AppError::DuplicateVehicle(_)
            | AppError::DuplicateEmail(_)
            | AppError::VehicleInUse(_)
            | AppError::BookingDecided(TransitionError::AlreadyDecided(_)) => ErrorKind::Conflict,
            AppError::Forbidden(_) => ErrorKind::Forbidden,
            AppError::Database(_) => ErrorKind::Internal,
        }
    }

    /// Booking conflicts carried by an availability failure.
    pub fn conflicts(&self) -> Option<&[Conflict]> {
        match self {
            AppError::VehicleUnavailable { conflicts } => Some(conflicts),
            _ => None,
        }
    }

    /// Report a storage failure as `duplicate()` when a UNIQUE constraint
    /// refused the write, and as a database error otherwise.
    pub(crate) fn unless_duplicate(
        err: anyhow::Error,
        duplicate: impl FnOnce() -> AppError,
    ) -> AppError {
        if is_unique_violation(&err) {
            duplicate()
        } else {
            AppError::Database(err)
        }
    }

    pub(crate) fn check_problems(problems: Vec<String>) -> Result<(), AppError> {
        if problems.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(problems.join("; ")))
        }
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        AppError::BookingDecided(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BookingStatus;

    #[test]
    fn test_kinds() {
        assert_eq!(AppError::TripNotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(AppError::Validation("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(
            AppError::from(TransitionError::AlreadyDecided(BookingStatus::Approved)).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            AppError::from(TransitionError::InvalidTarget(BookingStatus::Pending)).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            AppError::VehicleUnavailable { conflicts: vec![] }.kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            AppError::Database(anyhow::anyhow!("boom")).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_validation_joins_problems() {
        assert!(AppError::check_problems(vec![]).is_ok());
        let err = AppError::check_problems(vec!["a".into(), "b".into()]).unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: a; b");
    }
}
