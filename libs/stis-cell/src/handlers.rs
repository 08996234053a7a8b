use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};

use booking_cell::models::Transition;
use booking_cell::services::history::{parse_status, HistoryFilter};
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::page::{Page, PageRequest, SortDirection};
use shared_models::response::ApiResponse;
use shared_utils::extractor::{AppJson, AppQuery};
use shared_utils::policy::{authorize, Action, Subject};
use shared_utils::AppState;

use crate::models::{
    CheckLimitParams, CreateStisBookingRequest, ResultListParams, ResultStatus, ReturnResultRequest,
    SlotAvailability, StisBookingResponse, StisError, StisFeedbackRequest, StisFeedbackResponse,
    StisHistoryParams, StisRatingSummary, StisResultResponse, StisSearchParams,
    StisServiceRequest, StisServiceResponse, UpdateStisBookingRequest,
};
use crate::services::booking::{StisBookingService, DEFAULT_PAGE_SIZE};
use crate::services::catalog::StisCatalogService;
use crate::services::feedback::StisFeedbackService;
use crate::services::result::StisResultService;

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;
type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>), AppError>;

// ==============================================================================
// SERVICE CATALOGUE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_services(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Vec<StisServiceResponse>> {
    let services = StisCatalogService::new(state.store.as_ref()).list(false).await?;
    Ok(Json(ApiResponse::ok(
        "STIS services retrieved",
        services.into_iter().map(Into::into).collect(),
    )))
}

#[axum::debug_handler]
pub async fn list_all_services(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> ApiResult<Vec<StisServiceResponse>> {
    authorize(&user, Action::ManageCatalog, Subject::none())?;

    let services = StisCatalogService::new(state.store.as_ref()).list(true).await?;
    Ok(Json(ApiResponse::ok(
        "STIS services retrieved",
        services.into_iter().map(Into::into).collect(),
    )))
}

#[axum::debug_handler]
pub async fn get_service(
    State(state): State<Arc<AppState>>,
    Path(service_id): Path<i64>,
) -> ApiResult<StisServiceResponse> {
    let service = StisCatalogService::new(state.store.as_ref()).get(service_id).await?;
    Ok(Json(ApiResponse::ok("STIS service retrieved", service.into())))
}

#[axum::debug_handler]
pub async fn create_service(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppJson(request): AppJson<StisServiceRequest>,
) -> Created<StisServiceResponse> {
    authorize(&user, Action::ManageCatalog, Subject::none())?;

    let service = StisCatalogService::new(state.store.as_ref()).create(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::created("STIS service created", service.into())),
    ))
}

#[axum::debug_handler]
pub async fn update_service(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(service_id): Path<i64>,
    AppJson(request): AppJson<StisServiceRequest>,
) -> ApiResult<StisServiceResponse> {
    authorize(&user, Action::ManageCatalog, Subject::none())?;

    let service = StisCatalogService::new(state.store.as_ref())
        .update(service_id, request)
        .await?;
    Ok(Json(ApiResponse::ok("STIS service updated", service.into())))
}

#[axum::debug_handler]
pub async fn deactivate_service(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(service_id): Path<i64>,
) -> ApiResult<StisServiceResponse> {
    authorize(&user, Action::ManageCatalog, Subject::none())?;

    let service = StisCatalogService::new(state.store.as_ref())
        .deactivate(service_id)
        .await?;
    Ok(Json(ApiResponse::ok("STIS service deactivated", service.into())))
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppJson(request): AppJson<CreateStisBookingRequest>,
) -> Created<StisBookingResponse> {
    authorize(&user, Action::CreateBooking, Subject::none())?;

    let booking = StisBookingService::new(&state)
        .create_booking(user.id, request)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::created("STIS booking created", booking)),
    ))
}

#[axum::debug_handler]
pub async fn check_limit(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<User>,
    AppQuery(params): AppQuery<CheckLimitParams>,
) -> ApiResult<SlotAvailability> {
    let slot = StisBookingService::new(&state)
        .check_limit(params.service_id, params.booking_date)
        .await?;
    Ok(Json(ApiResponse::ok("Slot availability retrieved", slot)))
}

#[axum::debug_handler]
pub async fn search_bookings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppQuery(params): AppQuery<StisSearchParams>,
) -> ApiResult<Page<StisBookingResponse>> {
    authorize(&user, Action::ManageBooking, Subject::none())?;

    let filter = HistoryFilter {
        service_id: params.service_id,
        status: parse_status(params.status.as_deref())?,
        customer_name: params.name,
        from: params.from,
        to: params.to,
        ..HistoryFilter::default()
    };
    let page = PageRequest::new(params.page, params.size, DEFAULT_PAGE_SIZE);
    let direction = SortDirection::parse_or_desc(params.sort.as_deref());

    let found = StisBookingService::new(&state)
        .find_bookings(&filter, direction, page)
        .await?;
    Ok(Json(ApiResponse::ok("STIS bookings retrieved", found)))
}

#[axum::debug_handler]
pub async fn booking_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppQuery(params): AppQuery<StisHistoryParams>,
) -> ApiResult<Page<StisBookingResponse>> {
    let filter = HistoryFilter {
        service_id: params.service_id,
        status: parse_status(params.status.as_deref())?,
        from: params.from,
        to: params.to,
        ..HistoryFilter::for_customer(user.id)
    };
    let page = PageRequest::new(params.page, params.size, DEFAULT_PAGE_SIZE);
    let direction = SortDirection::parse_or_desc(params.sort.as_deref());

    let found = StisBookingService::new(&state)
        .find_bookings(&filter, direction, page)
        .await?;
    Ok(Json(ApiResponse::ok("STIS booking history retrieved", found)))
}

#[axum::debug_handler]
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<i64>,
) -> ApiResult<StisBookingResponse> {
    let service = StisBookingService::new(&state);
    let booking = service.get_booking(booking_id).await?;
    authorize(&user, Action::ViewBooking, Subject::owned_by(booking.customer_id))?;

    Ok(Json(ApiResponse::ok(
        "STIS booking retrieved",
        service.to_response(&booking).await?,
    )))
}

#[axum::debug_handler]
pub async fn update_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<i64>,
    AppJson(request): AppJson<UpdateStisBookingRequest>,
) -> ApiResult<StisBookingResponse> {
    let service = StisBookingService::new(&state);
    let booking = service.get_booking(booking_id).await?;
    authorize(&user, Action::AmendOwnBooking, Subject::owned_by(booking.customer_id))?;

    let updated = service.update_booking(&booking, request).await?;
    Ok(Json(ApiResponse::ok(
        "STIS booking updated",
        service.to_response(&updated).await?,
    )))
}

async fn run_transition(
    state: &AppState,
    user: &User,
    booking_id: i64,
    transition: Transition,
) -> Result<StisBookingResponse, AppError> {
    let service = StisBookingService::new(state);
    let booking = service.get_booking(booking_id).await?;
    let subject = Subject::owned_by(booking.customer_id);

    match transition {
        Transition::Cancel => authorize(user, Action::AmendOwnBooking, subject)?,
        _ => authorize(user, Action::ManageBooking, subject)?,
    }

    let updated = service.transition(booking.id, transition).await?;
    Ok(service.to_response(&updated).await?)
}

#[axum::debug_handler]
pub async fn delete_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<i64>,
) -> ApiResult<StisBookingResponse> {
    let booking = run_transition(&state, &user, booking_id, Transition::Delete).await?;
    Ok(Json(ApiResponse::ok("STIS booking deleted", booking)))
}

#[axum::debug_handler]
pub async fn mark_confirmed(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<i64>,
) -> ApiResult<StisBookingResponse> {
    let booking = run_transition(&state, &user, booking_id, Transition::Confirm).await?;
    Ok(Json(ApiResponse::ok("STIS booking confirmed", booking)))
}

#[axum::debug_handler]
pub async fn mark_pending_test_result(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<i64>,
) -> ApiResult<StisBookingResponse> {
    let booking = run_transition(&state, &user, booking_id, Transition::AwaitResult).await?;
    Ok(Json(ApiResponse::ok("STIS booking awaiting test results", booking)))
}

#[axum::debug_handler]
pub async fn mark_cancelled(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<i64>,
) -> ApiResult<StisBookingResponse> {
    let booking = run_transition(&state, &user, booking_id, Transition::Cancel).await?;
    Ok(Json(ApiResponse::ok("STIS booking cancelled", booking)))
}

#[axum::debug_handler]
pub async fn mark_completed(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<i64>,
) -> ApiResult<StisBookingResponse> {
    let booking = run_transition(&state, &user, booking_id, Transition::Complete).await?;
    Ok(Json(ApiResponse::ok("STIS booking completed", booking)))
}

#[axum::debug_handler]
pub async fn mark_no_show(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<i64>,
) -> ApiResult<StisBookingResponse> {
    let booking = run_transition(&state, &user, booking_id, Transition::MarkNoShow).await?;
    Ok(Json(ApiResponse::ok("STIS booking marked as no-show", booking)))
}

#[axum::debug_handler]
pub async fn deny_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<i64>,
) -> ApiResult<StisBookingResponse> {
    let booking = run_transition(&state, &user, booking_id, Transition::Deny).await?;
    Ok(Json(ApiResponse::ok("STIS booking denied", booking)))
}

// ==============================================================================
// RESULT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn return_result(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<i64>,
    AppJson(request): AppJson<ReturnResultRequest>,
) -> Created<StisResultResponse> {
    authorize(&user, Action::RecordResult, Subject::none())?;

    let booking = StisBookingService::new(&state).get_booking(booking_id).await?;
    let result = StisResultService::new(&state)
        .return_result(&booking, request)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::created("Result returned", result.into())),
    ))
}

#[axum::debug_handler]
pub async fn result_by_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<i64>,
) -> ApiResult<StisResultResponse> {
    let booking = StisBookingService::new(&state).get_booking(booking_id).await?;
    authorize(&user, Action::ViewResult, Subject::owned_by(booking.customer_id))?;

    let result = StisResultService::new(&state)
        .find_for_booking(booking.id)
        .await?
        .ok_or(StisError::ResultNotFound)?;

    Ok(Json(ApiResponse::ok("Result retrieved", result.into())))
}

#[axum::debug_handler]
pub async fn list_results(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppQuery(params): AppQuery<ResultListParams>,
) -> ApiResult<Page<StisResultResponse>> {
    authorize(&user, Action::RecordResult, Subject::none())?;

    let result_status: Option<ResultStatus> = params
        .result_status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse::<ResultStatus>)
        .transpose()?;
    let page = PageRequest::new(params.page, params.size, DEFAULT_PAGE_SIZE);
    let direction = SortDirection::parse_or_desc(params.sort.as_deref());

    let results = StisResultService::new(&state)
        .list(result_status, direction, page)
        .await?;
    Ok(Json(ApiResponse::ok("Results retrieved", results.map(Into::into))))
}

// ==============================================================================
// FEEDBACK HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn submit_feedback(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<i64>,
    AppJson(request): AppJson<StisFeedbackRequest>,
) -> Created<StisFeedbackResponse> {
    let booking = StisBookingService::new(&state).get_booking(booking_id).await?;
    authorize(&user, Action::LeaveFeedback, Subject::owned_by(booking.customer_id))?;

    let feedback = StisFeedbackService::new(&state)
        .submit(&booking, request)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::created("Feedback submitted", feedback)),
    ))
}

#[axum::debug_handler]
pub async fn service_feedback(
    State(state): State<Arc<AppState>>,
    Path(service_id): Path<i64>,
) -> ApiResult<Vec<StisFeedbackResponse>> {
    let feedback = StisFeedbackService::new(&state).for_service(service_id).await?;
    Ok(Json(ApiResponse::ok("Feedback retrieved", feedback)))
}

#[axum::debug_handler]
pub async fn service_rating_summary(
    State(state): State<Arc<AppState>>,
    Path(service_id): Path<i64>,
) -> ApiResult<StisRatingSummary> {
    let summary = StisFeedbackService::new(&state).summary(service_id).await?;
    Ok(Json(ApiResponse::ok("Rating summary retrieved", summary)))
}
