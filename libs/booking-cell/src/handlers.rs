use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::debug;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::page::{Page, PageRequest, SortDirection};
use shared_models::response::ApiResponse;
use shared_utils::extractor::{AppJson, AppQuery};
use shared_utils::policy::{authorize, Action, Subject};
use shared_utils::AppState;

use crate::models::{
    ConsultantCalendarResponse, ConsultantFeedbackResponse, ConsultantRatingSummary,
    ConsultantScheduleEntry, ConsultationBooking, ConsultationBookingResponse,
    ConsultationHistoryParams, ConsultationSearchParams, CreateConsultationRequest,
    FeedbackRequest, MeetingLinkRequest, RescheduleRequest, Transition,
};
use crate::services::booking::{ConsultationBookingService, DEFAULT_PAGE_SIZE};
use crate::services::feedback::ConsultantFeedbackService;
use crate::services::history::{parse_status, HistoryFilter};

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

fn subject_of(booking: &ConsultationBooking) -> Subject {
    Subject::owned_by(booking.customer_id).assigned_to(booking.consultant_id)
}

// ==============================================================================
// BOOKING CREATION AND READS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppJson(request): AppJson<CreateConsultationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ConsultationBookingResponse>>), AppError> {
    authorize(&user, Action::CreateBooking, Subject::none())?;

    let service = ConsultationBookingService::new(&state);
    let booking = service.create_booking(user.id, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::created("Consultation booked successfully", booking)),
    ))
}

#[axum::debug_handler]
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<i64>,
) -> ApiResult<ConsultationBookingResponse> {
    let service = ConsultationBookingService::new(&state);
    let booking = service.get_booking(booking_id).await?;
    authorize(&user, Action::ViewBooking, subject_of(&booking))?;

    Ok(Json(ApiResponse::ok(
        "Booking retrieved",
        service.to_response(&booking).await?,
    )))
}

/// The caller's own consultation history.
#[axum::debug_handler]
pub async fn booking_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppQuery(params): AppQuery<ConsultationHistoryParams>,
) -> ApiResult<Page<ConsultationBookingResponse>> {
    debug!("Loading consultation history for account {}", user.id);

    let filter = HistoryFilter {
        consultant_id: params.consultant_id,
        status: parse_status(params.status.as_deref())?,
        from: params.from,
        to: params.to,
        ..HistoryFilter::for_customer(user.id)
    };
    let page = PageRequest::new(params.page, params.size, DEFAULT_PAGE_SIZE);
    let direction = SortDirection::parse_or_desc(params.sort.as_deref());

    let service = ConsultationBookingService::new(&state);
    let found = service.find_bookings(&filter, direction, page).await?;

    Ok(Json(ApiResponse::ok("Booking history retrieved", found)))
}

#[axum::debug_handler]
pub async fn search_bookings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppQuery(params): AppQuery<ConsultationSearchParams>,
) -> ApiResult<Page<ConsultationBookingResponse>> {
    authorize(&user, Action::ManageBooking, Subject::none())?;

    let filter = HistoryFilter {
        consultant_id: params.consultant_id,
        status: parse_status(params.status.as_deref())?,
        customer_name: params.name,
        from: params.from,
        to: params.to,
        ..HistoryFilter::default()
    };
    let page = PageRequest::new(params.page, params.size, DEFAULT_PAGE_SIZE);
    let direction = SortDirection::parse_or_desc(params.sort.as_deref());

    let service = ConsultationBookingService::new(&state);
    let found = service.find_bookings(&filter, direction, page).await?;

    Ok(Json(ApiResponse::ok("Bookings retrieved", found)))
}

#[axum::debug_handler]
pub async fn consultant_schedule(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(consultant_id): Path<i64>,
) -> ApiResult<Vec<ConsultantScheduleEntry>> {
    authorize(&user, Action::ViewSchedule, Subject::none().assigned_to(consultant_id))?;

    let service = ConsultationBookingService::new(&state);
    let schedule = service.consultant_schedule(consultant_id).await?;

    Ok(Json(ApiResponse::ok("Schedule retrieved", schedule)))
}

/// Open to every signed-in account so customers can pick a free slot.
#[axum::debug_handler]
pub async fn consultant_calendar(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<User>,
    Path(consultant_id): Path<i64>,
) -> ApiResult<ConsultantCalendarResponse> {
    let service = ConsultationBookingService::new(&state);
    let calendar = service.consultant_calendar(consultant_id, Utc::now()).await?;

    Ok(Json(ApiResponse::ok("Calendar retrieved", calendar)))
}

// ==============================================================================
// STATUS TRANSITIONS
// ==============================================================================

async fn run_transition(
    state: &AppState,
    user: &User,
    booking_id: i64,
    transition: Transition,
) -> Result<ConsultationBookingResponse, AppError> {
    let service = ConsultationBookingService::new(state);
    let booking = service.get_booking(booking_id).await?;
    let subject = subject_of(&booking);

    match transition {
        // Customers may cancel their own booking; staff and the consultant too.
        Transition::Cancel => authorize(user, Action::AmendOwnBooking, subject)
            .or_else(|_| authorize(user, Action::ManageBooking, subject))?,
        _ => authorize(user, Action::ManageBooking, subject)?,
    }

    let updated = service.transition(booking.id, transition).await?;
    Ok(service.to_response(&updated).await?)
}

#[axum::debug_handler]
pub async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<i64>,
) -> ApiResult<ConsultationBookingResponse> {
    let booking = run_transition(&state, &user, booking_id, Transition::Confirm).await?;
    Ok(Json(ApiResponse::ok("Booking confirmed", booking)))
}

#[axum::debug_handler]
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<i64>,
) -> ApiResult<ConsultationBookingResponse> {
    let booking = run_transition(&state, &user, booking_id, Transition::Cancel).await?;
    Ok(Json(ApiResponse::ok("Booking cancelled", booking)))
}

#[axum::debug_handler]
pub async fn deny_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<i64>,
) -> ApiResult<ConsultationBookingResponse> {
    let booking = run_transition(&state, &user, booking_id, Transition::Deny).await?;
    Ok(Json(ApiResponse::ok("Booking denied", booking)))
}

#[axum::debug_handler]
pub async fn complete_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<i64>,
) -> ApiResult<ConsultationBookingResponse> {
    let booking = run_transition(&state, &user, booking_id, Transition::Complete).await?;
    Ok(Json(ApiResponse::ok("Booking completed", booking)))
}

#[axum::debug_handler]
pub async fn mark_no_show(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<i64>,
) -> ApiResult<ConsultationBookingResponse> {
    let booking = run_transition(&state, &user, booking_id, Transition::MarkNoShow).await?;
    Ok(Json(ApiResponse::ok("Booking marked as no-show", booking)))
}

#[axum::debug_handler]
pub async fn delete_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<i64>,
) -> ApiResult<ConsultationBookingResponse> {
    let booking = run_transition(&state, &user, booking_id, Transition::Delete).await?;
    Ok(Json(ApiResponse::ok("Booking deleted", booking)))
}

// ==============================================================================
// AMENDMENTS
// ==============================================================================

#[axum::debug_handler]
pub async fn reschedule_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<i64>,
    AppJson(request): AppJson<RescheduleRequest>,
) -> ApiResult<ConsultationBookingResponse> {
    let service = ConsultationBookingService::new(&state);
    let booking = service.get_booking(booking_id).await?;
    authorize(&user, Action::AmendOwnBooking, subject_of(&booking))?;

    let updated = service.reschedule(&booking, request.booking_date).await?;

    Ok(Json(ApiResponse::ok(
        "Booking rescheduled",
        service.to_response(&updated).await?,
    )))
}

#[axum::debug_handler]
pub async fn attach_meeting_link(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<i64>,
    AppJson(request): AppJson<MeetingLinkRequest>,
) -> ApiResult<ConsultationBookingResponse> {
    let service = ConsultationBookingService::new(&state);
    let booking = service.get_booking(booking_id).await?;
    authorize(&user, Action::ManageBooking, subject_of(&booking))?;

    let updated = service.attach_meeting_link(&booking, &request.meet_link).await?;

    Ok(Json(ApiResponse::ok(
        "Meeting link updated",
        service.to_response(&updated).await?,
    )))
}

// ==============================================================================
// FEEDBACK
// ==============================================================================

#[axum::debug_handler]
pub async fn submit_feedback(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<i64>,
    AppJson(request): AppJson<FeedbackRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ConsultantFeedbackResponse>>), AppError> {
    let booking = ConsultationBookingService::new(&state)
        .get_booking(booking_id)
        .await?;
    authorize(&user, Action::LeaveFeedback, subject_of(&booking))?;

    let feedback = ConsultantFeedbackService::new(&state)
        .submit(&booking, request)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::created("Feedback submitted", feedback)),
    ))
}

#[axum::debug_handler]
pub async fn consultant_feedback(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<User>,
    Path(consultant_id): Path<i64>,
) -> ApiResult<ConsultantRatingSummary> {
    let summary = ConsultantFeedbackService::new(&state)
        .for_consultant(consultant_id)
        .await?;

    Ok(Json(ApiResponse::ok("Feedback retrieved", summary)))
}
