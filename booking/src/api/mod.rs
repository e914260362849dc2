//! HTTP surface of the booking engine.
//!
//! Every response body is an [`ApiResponse`] envelope:
//!
//! ```json
//! { "success": true, "data": { ... } }
//! { "success": false, "error": "Member is already booked for this session" }
//! ```
//!
//! Caller identity comes from the `x-user-id` header and admin rights from
//! `x-admin: true`; see [`Caller`].
//!
//! # Routes
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | GET  | `/health` | liveness |
//! | POST | `/api/gyms/:gym/classes/:class/sessions/:date/bookings` | book |
//! | POST | `.../bookings/:member/cancel` | cancel |
//! | POST | `.../bookings/:member/check-in` | check in (admin) |
//! | POST | `.../bookings/:member/no-show` | mark no-show (admin) |
//! | GET  | `.../roster` | session roster |
//! | GET  | `.../eligibility` | eligibility pre-flight |
//! | POST | `.../process-waitlist` | promote into free seats (admin) |
//! | GET  | `/api/members/:member/credits` | credit history |
//! | POST | `/api/members/:member/credits/adjust` | admin adjustment |
//! | POST | `/api/stripe/account-link` | Connect onboarding link |

mod error;
mod extractors;
mod members;
mod sessions;
mod stripe;

pub use error::ApiError;
pub use extractors::Caller;

use crate::account_link::AccountLinkService;
use crate::service::BookingService;
use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Uniform response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    /// Whether the operation succeeded
    pub success: bool,
    /// Payload on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Message on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine-readable error code, when the operation defines one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl<T> ApiResponse<T> {
    /// Successful response carrying `data`.
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
        }
    }
}

/// Handler result: an enveloped payload or an [`ApiError`].
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Wrap `data` in a successful envelope.
#[allow(clippy::unnecessary_wraps)]
fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

/// Shared handler state.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Booking engine
    pub service: Arc<BookingService>,
    /// Connect onboarding
    pub account_links: Arc<AccountLinkService>,
}

impl AppState {
    /// Create the state.
    #[must_use]
    pub fn new(service: BookingService, account_links: AccountLinkService) -> Self {
        Self {
            service: Arc::new(service),
            account_links: Arc::new(account_links),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// Build the complete router.
pub fn build_router(state: AppState) -> Router {
    let session_routes = Router::new()
        .route("/bookings", post(sessions::book))
        .route("/bookings/:member_id/cancel", post(sessions::cancel))
        .route("/bookings/:member_id/check-in", post(sessions::check_in))
        .route("/bookings/:member_id/no-show", post(sessions::no_show))
        .route("/roster", get(sessions::roster))
        .route("/eligibility", get(sessions::eligibility))
        .route("/process-waitlist", post(sessions::process_waitlist));

    let api_routes = Router::new()
        .nest(
            "/gyms/:gym_id/classes/:class_id/sessions/:date",
            session_routes,
        )
        .route("/members/:member_id/credits", get(members::credit_history))
        .route(
            "/members/:member_id/credits/adjust",
            post(members::adjust_credits),
        )
        .route("/stripe/account-link", post(stripe::create_account_link));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
