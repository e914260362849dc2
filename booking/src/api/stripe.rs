//! Stripe Connect onboarding endpoint.

use super::{ApiResult, AppState, Caller, ok};
use crate::account_link::{AccountLink, AccountLinkRequest};
use axum::{Json, extract::State};

/// Create a Connect onboarding link for the caller's gym.
pub(super) async fn create_account_link(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<AccountLinkRequest>,
) -> ApiResult<AccountLink> {
    ok(state
        .account_links
        .create_account_link(caller.user_id.as_deref(), &request)
        .await?)
}
