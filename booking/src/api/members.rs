//! Member credit endpoints.

use super::{ApiResult, AppState, Caller, ok};
use crate::service::CreditMutation;
use axum::{
    Json,
    extract::{Path, State},
};
use gymbook_core::{CreditLogEntry, MemberId};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(super) struct AdjustCreditsRequest {
    amount: i64,
    #[serde(default)]
    description: String,
}

/// Credit history, newest first.
pub(super) async fn credit_history(
    State(state): State<AppState>,
    Path(member_id): Path<String>,
    caller: Caller,
) -> ApiResult<Vec<CreditLogEntry>> {
    let member_id = MemberId::new(member_id);
    caller.require_self_or_admin(&member_id)?;
    ok(state.service.credit_history(&member_id).await?)
}

/// Admin credit adjustment.
pub(super) async fn adjust_credits(
    State(state): State<AppState>,
    Path(member_id): Path<String>,
    caller: Caller,
    Json(request): Json<AdjustCreditsRequest>,
) -> ApiResult<CreditMutation> {
    caller.require_admin()?;
    ok(state
        .service
        .adjust_credits(
            &MemberId::new(member_id),
            request.amount,
            &request.description,
            caller.actor(),
        )
        .await?)
}
