//! Unified service-layer error type for cowork-server
//!
//! `ServiceError` bridges infrastructure errors (`sqlx::Error`, `BoxError`)
//! and the API-layer error (`AppError`) so workflows can use `?` on both.

use axum::response::IntoResponse;
use shared::billing::BillingError;
use shared::booking::BookingError;
use shared::checkin::TokenError;
use shared::error::{AppError, ErrorCode};
use shared::models::OccupancyError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Service-layer error.
///
/// - `Db`: database or infrastructure error (logged, mapped to InternalError)
/// - `App`: business-rule error, passed through to the client
#[derive(Debug)]
pub enum ServiceError {
    Db(BoxError),
    App(AppError),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Db(e) => write!(f, "infrastructure error: {e}"),
            ServiceError::App(e) => write!(f, "{} ({})", e.message, e.code),
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(e: sqlx::Error) -> Self {
        ServiceError::Db(e.into())
    }
}

impl From<BoxError> for ServiceError {
    fn from(e: BoxError) -> Self {
        ServiceError::Db(e)
    }
}

impl From<AppError> for ServiceError {
    fn from(e: AppError) -> Self {
        ServiceError::App(e)
    }
}

macro_rules! rule_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ServiceError {
                fn from(e: $ty) -> Self {
                    ServiceError::App(e.into())
                }
            }
        )*
    };
}

rule_error!(BillingError, BookingError, TokenError, OccupancyError);

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::App(app_err) => app_err,
            ServiceError::Db(db_err) => {
                tracing::error!(error = %db_err, "Database call failed");
                AppError::new(ErrorCode::InternalError)
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

/// Result of every service and handler call
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Whether a database error is a unique or exclusion constraint violation
pub fn is_constraint_conflict(e: &sqlx::Error) -> bool {
    e.as_database_error().is_some_and(|db| {
        db.is_unique_violation() || db.code().as_deref() == Some("23P01")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_error_is_hidden_from_client() {
        let err: AppError = ServiceError::Db("connection reset".into()).into();
        assert_eq!(err.code, ErrorCode::InternalError);
        assert!(!err.message.contains("connection reset"));
    }

    #[test]
    fn test_rule_errors_keep_their_code() {
        let err: ServiceError = OccupancyError::SeatOccupied(3).into();
        let app: AppError = err.into();
        assert_eq!(app.code, ErrorCode::SeatOccupied);

        let err: ServiceError = TokenError::Expired.into();
        assert_eq!(AppError::from(err).code, ErrorCode::TokenExpired);
    }
}
