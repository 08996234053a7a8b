use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use tracing::debug;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::page::Page;
use shared_models::response::ApiResponse;
use shared_utils::extractor::{AppJson, AppQuery};
use shared_utils::policy::{authorize, Action, Subject};
use shared_utils::AppState;

use crate::models::{
    ConsultantProfileRequest, ConsultantProfileResponse, ConsultantSearchParams,
    EmploymentStatusParams, HourlyRateParams,
};
use crate::services::profile::ConsultantProfileService;

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

// ==============================================================================
// PUBLIC DIRECTORY
// ==============================================================================

#[axum::debug_handler]
pub async fn search_profiles(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<ConsultantSearchParams>,
) -> ApiResult<Page<ConsultantProfileResponse>> {
    debug!("Searching consultants: {:?}", params);

    let service = ConsultantProfileService::new(state.store.as_ref());
    let found = service.search(&params).await?;

    Ok(Json(ApiResponse::ok("Consultants found", found)))
}

#[axum::debug_handler]
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(consultant_id): Path<i64>,
) -> ApiResult<ConsultantProfileResponse> {
    let service = ConsultantProfileService::new(state.store.as_ref());
    let profile = service.get_profile(consultant_id).await?;

    Ok(Json(ApiResponse::ok("Consultant profile retrieved", profile)))
}

#[axum::debug_handler]
pub async fn list_profiles(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> ApiResult<Vec<ConsultantProfileResponse>> {
    let service = ConsultantProfileService::new(state.store.as_ref());
    let profiles = service.list_profiles(user.is_back_office()).await?;

    Ok(Json(ApiResponse::ok("Consultant profiles retrieved", profiles)))
}

// ==============================================================================
// OWN PROFILE
// ==============================================================================

#[axum::debug_handler]
pub async fn create_own_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppJson(request): AppJson<ConsultantProfileRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ConsultantProfileResponse>>), AppError> {
    authorize(&user, Action::ManageOwnProfile, Subject::owned_by(user.id))?;

    let service = ConsultantProfileService::new(state.store.as_ref());
    let profile = service.create_profile(user.id, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::created("Consultant profile created", profile)),
    ))
}

#[axum::debug_handler]
pub async fn get_own_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> ApiResult<ConsultantProfileResponse> {
    authorize(&user, Action::ManageOwnProfile, Subject::owned_by(user.id))?;

    let service = ConsultantProfileService::new(state.store.as_ref());
    let profile = service.get_profile(user.id).await?;

    Ok(Json(ApiResponse::ok("Consultant profile retrieved", profile)))
}

#[axum::debug_handler]
pub async fn update_own_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppJson(request): AppJson<ConsultantProfileRequest>,
) -> ApiResult<ConsultantProfileResponse> {
    authorize(&user, Action::ManageOwnProfile, Subject::owned_by(user.id))?;

    let service = ConsultantProfileService::new(state.store.as_ref());
    let profile = service.update_profile(user.id, request).await?;

    Ok(Json(ApiResponse::ok("Consultant profile updated", profile)))
}

#[axum::debug_handler]
pub async fn delete_own_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> ApiResult<()> {
    authorize(&user, Action::ManageOwnProfile, Subject::owned_by(user.id))?;

    let service = ConsultantProfileService::new(state.store.as_ref());
    service.delete_profile(user.id).await?;

    Ok(Json(ApiResponse::message_only("Consultant profile deleted")))
}

// ==============================================================================
// STAFFING
// ==============================================================================

#[axum::debug_handler]
pub async fn update_employment_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(consultant_id): Path<i64>,
    AppQuery(params): AppQuery<EmploymentStatusParams>,
) -> ApiResult<ConsultantProfileResponse> {
    authorize(&user, Action::ManageStaffing, Subject::none())?;

    let service = ConsultantProfileService::new(state.store.as_ref());
    let profile = service
        .set_employment_status(consultant_id, params.employment_status)
        .await?;

    Ok(Json(ApiResponse::ok("Employment status updated", profile)))
}

#[axum::debug_handler]
pub async fn update_hourly_rate(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(consultant_id): Path<i64>,
    AppQuery(params): AppQuery<HourlyRateParams>,
) -> ApiResult<ConsultantProfileResponse> {
    authorize(&user, Action::ManageStaffing, Subject::none())?;

    let service = ConsultantProfileService::new(state.store.as_ref());
    let profile = service
        .set_hourly_rate(consultant_id, params.hourly_rate)
        .await?;

    Ok(Json(ApiResponse::ok("Hourly rate updated", profile)))
}
