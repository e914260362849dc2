//! Mapping of domain errors onto HTTP responses.

use super::ApiResponse;
use crate::account_link::AccountLinkError;
use crate::error::BookingError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gymbook_core::StoreError;
use std::fmt;

/// Error returned by handlers.
///
/// The message is user-facing and sent verbatim in the envelope's `error`
/// field. Storage failures are logged and replaced with a generic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    code: Option<&'static str>,
}

impl ApiError {
    /// Create an error.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: None,
        }
    }

    /// 401 for requests without a caller identity.
    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Sign in required")
    }

    /// 403 for callers acting outside their rights.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    /// HTTP status of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// User-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.status, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<BookingError> for ApiError {
    fn from(error: BookingError) -> Self {
        let status = match &error {
            BookingError::NotFound { .. } => StatusCode::NOT_FOUND,
            BookingError::Forbidden(_) => StatusCode::FORBIDDEN,
            BookingError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            BookingError::SessionUnavailable(_)
            | BookingError::NotEligible(_)
            | BookingError::AlreadyBooked { .. }
            | BookingError::NotBooked
            | BookingError::InvalidTransition { .. }
            | BookingError::InsufficientCredits { .. } => StatusCode::CONFLICT,
            BookingError::Store(store) => return Self::from(store.clone()),
        };
        Self::new(status, error.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        if error.is_conflict() {
            tracing::warn!(error = %error, "Request gave up after repeated conflicts");
            Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "The session is busy, please try again",
            )
        } else {
            tracing::error!(error = %error, "Storage failure");
            Self::new(StatusCode::INTERNAL_SERVER_ERROR, "An internal error occurred")
        }
    }
}

impl From<AccountLinkError> for ApiError {
    fn from(error: AccountLinkError) -> Self {
        let status = match &error {
            AccountLinkError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AccountLinkError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            AccountLinkError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AccountLinkError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: error.to_string(),
            code: Some(error.code()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.message),
            code: self.code,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gymbook_core::{AttendanceStatus, Version};

    #[test]
    fn business_rejections_are_conflicts_with_verbatim_messages() {
        let err = ApiError::from(BookingError::AlreadyBooked {
            status: AttendanceStatus::Waitlisted,
        });

        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(
            err.message(),
            "Member is already on the waitlist for this session"
        );
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            ApiError::from(BookingError::not_found("Member", "ghost")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(BookingError::Forbidden("no".to_string())).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(BookingError::Validation("bad".to_string())).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn storage_details_are_not_leaked() {
        let err = ApiError::from(BookingError::Store(StoreError::Database(
            "password authentication failed".to_string(),
        )));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "An internal error occurred");

        let err = ApiError::from(BookingError::Store(StoreError::Conflict {
            doc: "rosters/x".to_string(),
            expected: Version::new(1),
            actual: Version::new(2),
        }));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn account_link_errors_carry_their_code() {
        let err = ApiError::from(AccountLinkError::PermissionDenied(
            "Origin not allowed".to_string(),
        ));
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.code, Some("permission-denied"));
    }
}
