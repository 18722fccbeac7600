use axum::extract::{Path, Query, State};
use axum::{Json, http::StatusCode, response::IntoResponse};
use axum_extra::extract::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    AppState,
    auth::Session,
    booking::BookingSession,
    error::ApiError,
    models::ScheduledClass,
    presentation::{MembershipCard, WeekSchedule, week_schedule},
    validation::validate_id,
};

#[derive(Debug, serde::Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReservationResult {
    pub class_id: String,
    pub booked: bool,
    pub membership: Option<MembershipCard>,
}

fn session_for(
    student_id: &str,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    query_token: Option<&str>,
) -> Result<Session, ApiError> {
    let student_id = validate_id("student", student_id)?;
    Ok(Session::from_request(
        student_id,
        auth.map(|TypedHeader(a)| a),
        query_token,
    ))
}

async fn load_booking(state: &AppState, session: Session) -> Result<BookingSession, ApiError> {
    let booking = BookingSession::load(
        &state.backend,
        session,
        state.evaluator,
        state.in_flight.clone(),
        state.settings.today(),
    )
    .await?;
    Ok(booking)
}

fn membership_card(booking: &BookingSession) -> Option<MembershipCard> {
    booking
        .membership()
        .map(|m| MembershipCard::new(m, booking.today()))
}

#[utoipa::path(get, path = "/", tag = "booking")]
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Studio Booking API",
        "endpoints": {
            "/students/{id}/schedule": "Classes grouped by day with booking eligibility",
            "/students/{id}/membership": "Membership card with remaining classes",
            "/students/{id}/reservations/{class_id}": "POST to reserve, DELETE to cancel",
            "/students/{id}/reservations.ical": "Booked classes as an iCal feed"
        }
    }))
}

#[utoipa::path(get, path = "/healthz/live", tag = "booking")]
pub async fn healthz_live() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

#[utoipa::path(get, path = "/healthz/ready", tag = "booking")]
pub async fn healthz_ready() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

#[utoipa::path(
    get,
    path = "/students/{student_id}/schedule",
    params(
        ("student_id" = String, Path, description = "Student id"),
        ("token" = Option<String>, Query, description = "Authentication token (alternative to Bearer header)")
    ),
    responses(
        (status = 200, description = "Week schedule with eligibility", body = WeekSchedule),
        (status = 502, description = "Studio backend unavailable")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "booking"
)]
pub async fn get_schedule(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<TokenQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let session = session_for(&student_id, auth, query.token.as_deref())?;
    let booking = load_booking(&state, session).await?;
    Ok(Json(week_schedule(&booking)))
}

#[utoipa::path(
    get,
    path = "/students/{student_id}/membership",
    params(
        ("student_id" = String, Path, description = "Student id"),
        ("token" = Option<String>, Query, description = "Authentication token (alternative to Bearer header)")
    ),
    responses(
        (status = 200, description = "Membership card", body = MembershipCard),
        (status = 404, description = "Student has no membership")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "booking"
)]
pub async fn get_membership(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<TokenQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let session = session_for(&student_id, auth, query.token.as_deref())?;
    let membership = state
        .backend
        .fetch_membership(&session)
        .await?
        .ok_or_else(|| ApiError::NotFound("No membership found".into()))?;
    Ok(Json(MembershipCard::new(&membership, state.settings.today())))
}

#[utoipa::path(
    post,
    path = "/students/{student_id}/reservations/{class_id}",
    params(
        ("student_id" = String, Path, description = "Student id"),
        ("class_id" = String, Path, description = "Class id")
    ),
    responses(
        (status = 200, description = "Class reserved", body = ReservationResult),
        (status = 401, description = "Missing authentication token"),
        (status = 404, description = "Unknown class"),
        (status = 409, description = "Not eligible, already booked, full or in progress")
    ),
    security(("bearer_auth" = [])),
    tag = "booking"
)]
pub async fn reserve_class(
    State(state): State<AppState>,
    Path((student_id, class_id)): Path<(String, String)>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<impl IntoResponse, ApiError> {
    let class_id = validate_id("class", &class_id)?;
    let session = session_for(&student_id, auth, None)?;
    // Fail before any backend call when the token is missing.
    session.require_token()?;
    let mut booking = load_booking(&state, session).await?;
    booking.reserve(&state.backend, class_id).await?;
    Ok(Json(ReservationResult {
        class_id: class_id.to_string(),
        booked: true,
        membership: membership_card(&booking),
    }))
}

#[utoipa::path(
    delete,
    path = "/students/{student_id}/reservations/{class_id}",
    params(
        ("student_id" = String, Path, description = "Student id"),
        ("class_id" = String, Path, description = "Class id")
    ),
    responses(
        (status = 200, description = "Reservation cancelled", body = ReservationResult),
        (status = 401, description = "Missing authentication token"),
        (status = 404, description = "Unknown class"),
        (status = 409, description = "Not booked or in progress")
    ),
    security(("bearer_auth" = [])),
    tag = "booking"
)]
pub async fn cancel_reservation(
    State(state): State<AppState>,
    Path((student_id, class_id)): Path<(String, String)>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<impl IntoResponse, ApiError> {
    let class_id = validate_id("class", &class_id)?;
    let session = session_for(&student_id, auth, None)?;
    // Fail before any backend call when the token is missing.
    session.require_token()?;
    let mut booking = load_booking(&state, session).await?;
    booking.cancel(&state.backend, class_id).await?;
    Ok(Json(ReservationResult {
        class_id: class_id.to_string(),
        booked: false,
        membership: membership_card(&booking),
    }))
}

#[utoipa::path(
    get,
    path = "/students/{student_id}/reservations.ical",
    params(
        ("student_id" = String, Path, description = "Student id"),
        ("token" = Option<String>, Query, description = "Authentication token (alternative to Bearer header)")
    ),
    responses(
        (status = 200, description = "iCal file", content_type = "text/calendar"),
        (status = 404, description = "No booked classes")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "booking"
)]
pub async fn get_ical(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<TokenQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let session = session_for(&student_id, auth, query.token.as_deref())?;
    let booking = load_booking(&state, session).await?;
    let booked: Vec<ScheduledClass> = booking
        .classes()
        .iter()
        .filter(|c| booking.is_booked(&c.id))
        .cloned()
        .collect();

    if booked.is_empty() {
        return Err(ApiError::NotFound("No booked classes found".into()));
    }

    let body = state.exporter.generate(&booked, booking.today());
    Ok((
        StatusCode::OK,
        [
            ("content-type", "text/calendar"),
            (
                "content-disposition",
                "attachment; filename=my_classes.ics",
            ),
        ],
        body,
    ))
}
