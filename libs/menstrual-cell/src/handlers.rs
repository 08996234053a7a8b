use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::response::ApiResponse;
use shared_utils::extractor::AppJson;
use shared_utils::policy::{authorize, Action, Subject};
use shared_utils::AppState;

use crate::models::{CycleRequest, CycleResponse, MenstrualCalendarResponse, MenstrualCycle};
use crate::services::cycle::MenstrualCycleService;

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

/// Loads the cycle and checks the caller owns it.
async fn owned_cycle(
    service: &MenstrualCycleService<'_>,
    user: &User,
    cycle_id: i64,
) -> Result<MenstrualCycle, AppError> {
    let cycle = service.get_cycle(cycle_id).await?;
    authorize(user, Action::TrackCycle, Subject::owned_by(cycle.customer_id))?;
    Ok(cycle)
}

#[axum::debug_handler]
pub async fn create_cycle(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppJson(request): AppJson<CycleRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CycleResponse>>), AppError> {
    authorize(&user, Action::TrackCycle, Subject::none())?;

    let service = MenstrualCycleService::new(state.store.as_ref());
    let cycle = service.create_cycle(user.id, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::created("Cycle recorded", CycleResponse::from(&cycle))),
    ))
}

#[axum::debug_handler]
pub async fn list_own_cycles(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> ApiResult<Vec<CycleResponse>> {
    authorize(&user, Action::TrackCycle, Subject::none())?;

    let service = MenstrualCycleService::new(state.store.as_ref());
    let cycles = service.list_for_customer(user.id).await?;

    Ok(Json(ApiResponse::ok(
        "Cycles retrieved",
        cycles.iter().map(CycleResponse::from).collect(),
    )))
}

#[axum::debug_handler]
pub async fn latest_cycle(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> ApiResult<CycleResponse> {
    authorize(&user, Action::TrackCycle, Subject::none())?;

    let service = MenstrualCycleService::new(state.store.as_ref());
    let cycle = service.latest_for_customer(user.id).await?;

    Ok(Json(ApiResponse::ok("Latest cycle retrieved", CycleResponse::from(&cycle))))
}

#[axum::debug_handler]
pub async fn get_cycle(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(cycle_id): Path<i64>,
) -> ApiResult<CycleResponse> {
    let service = MenstrualCycleService::new(state.store.as_ref());
    let cycle = owned_cycle(&service, &user, cycle_id).await?;

    Ok(Json(ApiResponse::ok("Cycle retrieved", CycleResponse::from(&cycle))))
}

#[axum::debug_handler]
pub async fn update_cycle(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(cycle_id): Path<i64>,
    AppJson(request): AppJson<CycleRequest>,
) -> ApiResult<CycleResponse> {
    let service = MenstrualCycleService::new(state.store.as_ref());
    let cycle = owned_cycle(&service, &user, cycle_id).await?;
    let updated = service.update_cycle(&cycle, request).await?;

    Ok(Json(ApiResponse::ok("Cycle updated", CycleResponse::from(&updated))))
}

#[axum::debug_handler]
pub async fn delete_cycle(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(cycle_id): Path<i64>,
) -> ApiResult<()> {
    let service = MenstrualCycleService::new(state.store.as_ref());
    let cycle = owned_cycle(&service, &user, cycle_id).await?;
    service.delete_cycle(&cycle).await?;

    Ok(Json(ApiResponse::message_only("Cycle deleted")))
}

#[axum::debug_handler]
pub async fn my_calendar(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> ApiResult<MenstrualCalendarResponse> {
    authorize(&user, Action::TrackCycle, Subject::none())?;

    let service = MenstrualCycleService::new(state.store.as_ref());
    let calendar = service.calendar(user.id).await?;

    Ok(Json(ApiResponse::ok("Calendar built", calendar)))
}
