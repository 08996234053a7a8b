use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::page::Page;
use shared_models::response::ApiResponse;
use shared_utils::extractor::{AppJson, AppQuery};
use shared_utils::policy::{authorize, Action, Subject};
use shared_utils::AppState;

use crate::models::{
    AnswerRequest, AskQuestionRequest, Question, QuestionError, QuestionListParams,
    QuestionResponse, QuestionStatus,
};
use crate::services::question::QuestionService;

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

fn subject_of(question: &Question) -> Subject {
    Subject {
        owner: Some(question.customer_id),
        assignee: question.consultant_id,
    }
}

// ==============================================================================
// PUBLIC BOARD
// ==============================================================================

#[axum::debug_handler]
pub async fn list_questions(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<QuestionListParams>,
) -> ApiResult<Page<QuestionResponse>> {
    let service = QuestionService::new(state.store.as_ref());
    let questions = service.list(&params, None).await?;

    Ok(Json(ApiResponse::ok("Questions retrieved", questions)))
}

#[axum::debug_handler]
pub async fn get_question(
    State(state): State<Arc<AppState>>,
    Path(question_id): Path<i64>,
) -> ApiResult<QuestionResponse> {
    let service = QuestionService::new(state.store.as_ref());
    let question = service.get_question(question_id).await?;
    if question.status == QuestionStatus::Deleted {
        return Err(QuestionError::NotFound.into());
    }

    Ok(Json(ApiResponse::ok(
        "Question retrieved",
        service.to_response(&question).await?,
    )))
}

// ==============================================================================
// ASKING AND ANSWERING
// ==============================================================================

#[axum::debug_handler]
pub async fn ask_question(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppJson(request): AppJson<AskQuestionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<QuestionResponse>>), AppError> {
    authorize(&user, Action::AskQuestion, Subject::none())?;

    let service = QuestionService::new(state.store.as_ref());
    let question = service.ask(user.id, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::created("Question submitted", question)),
    ))
}

#[axum::debug_handler]
pub async fn my_questions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppQuery(params): AppQuery<QuestionListParams>,
) -> ApiResult<Page<QuestionResponse>> {
    let service = QuestionService::new(state.store.as_ref());
    let questions = service.list(&params, Some(user.id)).await?;

    Ok(Json(ApiResponse::ok("Your questions", questions)))
}

#[axum::debug_handler]
pub async fn answer_question(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(question_id): Path<i64>,
    AppJson(request): AppJson<AnswerRequest>,
) -> ApiResult<QuestionResponse> {
    let service = QuestionService::new(state.store.as_ref());
    let question = service.get_question(question_id).await?;
    authorize(&user, Action::AnswerQuestion, subject_of(&question))?;

    let answered = service.answer(&question, user.id, &request.answer).await?;

    Ok(Json(ApiResponse::ok("Question answered", answered)))
}

#[axum::debug_handler]
pub async fn delete_question(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(question_id): Path<i64>,
) -> ApiResult<()> {
    let service = QuestionService::new(state.store.as_ref());
    let question = service.get_question(question_id).await?;
    authorize(&user, Action::DeleteQuestion, subject_of(&question))?;

    service.delete(&question).await?;

    Ok(Json(ApiResponse::message_only("Question deleted")))
}
