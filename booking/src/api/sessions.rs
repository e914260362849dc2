//! Session booking endpoints.

use super::{ApiResult, AppState, Caller, ok};
use crate::eligibility::Eligibility;
use crate::service::{
    BookingOptions, BookingOutcome, CancelOptions, CancellationOutcome, NoShowOutcome,
    PromotionReport, RosterView,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use gymbook_core::{
    AttendanceRecord, BookingType, ClassId, GymId, LateCancelPolicy, MemberId, NaiveDate,
    SessionKey,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(super) struct SessionPath {
    gym_id: String,
    class_id: String,
    date: NaiveDate,
}

impl SessionPath {
    fn key(&self) -> SessionKey {
        SessionKey::new(
            GymId::new(&self.gym_id),
            ClassId::new(&self.class_id),
            self.date,
        )
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct MemberSessionPath {
    gym_id: String,
    class_id: String,
    date: NaiveDate,
    member_id: String,
}

impl MemberSessionPath {
    fn key(&self) -> (SessionKey, MemberId) {
        (
            SessionKey::new(
                GymId::new(&self.gym_id),
                ClassId::new(&self.class_id),
                self.date,
            ),
            MemberId::new(&self.member_id),
        )
    }
}

/// Body of a booking request. Everything but `member_id` is admin-only.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct BookRequest {
    member_id: Option<String>,
    force: bool,
    booking_type: Option<BookingType>,
    waive_cost: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct CancelRequest {
    late_cancel_policy: Option<LateCancelPolicy>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct EligibilityQuery {
    member_id: Option<String>,
}

/// Resolve the member a request targets: an explicit id or the caller.
fn target_member(caller: &Caller, requested: Option<&str>) -> Result<MemberId, super::ApiError> {
    let member_id = match requested {
        Some(id) => MemberId::new(id),
        None => MemberId::new(caller.require_user()?),
    };
    caller.require_self_or_admin(&member_id)?;
    Ok(member_id)
}

/// Book a member into the session.
pub(super) async fn book(
    State(state): State<AppState>,
    Path(path): Path<SessionPath>,
    caller: Caller,
    request: Option<Json<BookRequest>>,
) -> Result<(StatusCode, Json<super::ApiResponse<BookingOutcome>>), super::ApiError> {
    let Json(request) = request.unwrap_or_default();
    let member_id = target_member(&caller, request.member_id.as_deref())?;
    let options = BookingOptions {
        force: request.force,
        booking_type: request.booking_type,
        waive_cost: request.waive_cost,
        actor: caller.actor(),
    };

    let outcome = state
        .service
        .book_member(&path.key(), &member_id, options)
        .await?;
    Ok((StatusCode::CREATED, Json(super::ApiResponse::ok(outcome))))
}

/// Cancel a member's booking or waitlist place.
pub(super) async fn cancel(
    State(state): State<AppState>,
    Path(path): Path<MemberSessionPath>,
    caller: Caller,
    request: Option<Json<CancelRequest>>,
) -> ApiResult<CancellationOutcome> {
    let Json(request) = request.unwrap_or_default();
    let (session, member_id) = path.key();
    caller.require_self_or_admin(&member_id)?;

    let options = CancelOptions {
        late_cancel_policy: request.late_cancel_policy,
        actor: caller.actor(),
    };
    ok(state
        .service
        .cancel_booking(&session, &member_id, options)
        .await?)
}

/// Check a member in at the front desk.
pub(super) async fn check_in(
    State(state): State<AppState>,
    Path(path): Path<MemberSessionPath>,
    caller: Caller,
) -> ApiResult<AttendanceRecord> {
    caller.require_admin()?;
    let (session, member_id) = path.key();
    ok(state
        .service
        .check_in_member(&session, &member_id, caller.actor())
        .await?)
}

/// Mark a booked member as a no-show.
pub(super) async fn no_show(
    State(state): State<AppState>,
    Path(path): Path<MemberSessionPath>,
    caller: Caller,
) -> ApiResult<NoShowOutcome> {
    caller.require_admin()?;
    let (session, member_id) = path.key();
    ok(state.service.mark_no_show(&session, &member_id).await?)
}

/// Everyone on the session.
pub(super) async fn roster(
    State(state): State<AppState>,
    Path(path): Path<SessionPath>,
    caller: Caller,
) -> ApiResult<RosterView> {
    caller.require_user()?;
    ok(state.service.session_roster(&path.key()).await?)
}

/// Whether the member could book, without booking.
pub(super) async fn eligibility(
    State(state): State<AppState>,
    Path(path): Path<SessionPath>,
    Query(query): Query<EligibilityQuery>,
    caller: Caller,
) -> ApiResult<Eligibility> {
    let member_id = target_member(&caller, query.member_id.as_deref())?;
    ok(state
        .service
        .check_eligibility(&path.key(), &member_id)
        .await?)
}

/// Promote waitlisted members into any free seats.
pub(super) async fn process_waitlist(
    State(state): State<AppState>,
    Path(path): Path<SessionPath>,
    caller: Caller,
) -> ApiResult<PromotionReport> {
    caller.require_admin()?;
    ok(state.service.process_waitlist(&path.key()).await?)
}
