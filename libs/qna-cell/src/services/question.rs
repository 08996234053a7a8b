use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

use booking_cell::models::UserRecord;
use booking_cell::services::assembler::display_name;
use booking_cell::services::directory::{find_user_with_role, users_by_ids};
use shared_database::store::{find_one_as, find_page_as, insert_as, update_one_as};
use shared_database::{Query, RecordStore};
use shared_models::auth::Role;
use shared_models::page::{Page, PageRequest, SortDirection};

use crate::models::{
    AskQuestionRequest, NewQuestion, Question, QuestionError, QuestionListParams,
    QuestionResponse, QuestionStatus, QUESTIONS,
};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_TITLE_LENGTH: usize = 255;

pub fn validate_question(title: &str, content: &str) -> Result<(), QuestionError> {
    if title.trim().is_empty() {
        return Err(QuestionError::Validation("Title is required".to_string()));
    }
    if title.trim().chars().count() > MAX_TITLE_LENGTH {
        return Err(QuestionError::Validation(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    if content.trim().is_empty() {
        return Err(QuestionError::Validation("Content is required".to_string()));
    }
    Ok(())
}

pub fn parse_question_status(raw: Option<&str>) -> Result<Option<QuestionStatus>, QuestionError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s.parse().map(Some),
        None => Ok(None),
    }
}

pub fn question_response(
    question: &Question,
    customer: Option<&UserRecord>,
    consultant: Option<&UserRecord>,
    answerer: Option<&UserRecord>,
) -> QuestionResponse {
    QuestionResponse {
        question_id: question.id,
        customer_id: question.customer_id,
        customer_name: display_name(customer),
        consultant_id: question.consultant_id,
        consultant_name: consultant.and_then(|c| c.full_name.clone()),
        title: question.title.clone(),
        content: question.content.clone(),
        answer: question.answer.clone(),
        answered_by: question.answered_by,
        answered_by_name: answerer.and_then(|a| a.full_name.clone()),
        status: question.status,
        created_at: question.created_at,
        answered_at: question.answered_at,
    }
}

pub struct QuestionService<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> QuestionService<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    pub async fn ask(
        &self,
        customer_id: i64,
        request: AskQuestionRequest,
    ) -> Result<QuestionResponse, QuestionError> {
        validate_question(&request.title, &request.content)?;

        if let Some(consultant_id) = request.consultant_id {
            find_user_with_role(self.store, consultant_id, Role::Consultant)
                .await?
                .ok_or(QuestionError::ConsultantNotFound(consultant_id))?;
        }

        let question: Question = insert_as(
            self.store,
            QUESTIONS,
            &NewQuestion {
                customer_id,
                consultant_id: request.consultant_id,
                title: request.title.trim().to_string(),
                content: request.content.trim().to_string(),
                status: QuestionStatus::Pending,
                created_at: Utc::now(),
            },
        )
        .await?;

        info!("Question {} asked by customer {}", question.id, customer_id);
        self.to_response(&question).await
    }

    pub async fn get_question(&self, question_id: i64) -> Result<Question, QuestionError> {
        find_one_as(self.store, &Query::table(QUESTIONS).eq("id", question_id))
            .await?
            .ok_or(QuestionError::NotFound)
    }

    pub async fn answer(
        &self,
        question: &Question,
        answered_by: i64,
        answer: &str,
    ) -> Result<QuestionResponse, QuestionError> {
        match question.status {
            QuestionStatus::Deleted => return Err(QuestionError::Deleted),
            QuestionStatus::Answered => return Err(QuestionError::AlreadyAnswered),
            QuestionStatus::Pending => {}
        }
        if answer.trim().is_empty() {
            return Err(QuestionError::Validation("Answer is required".to_string()));
        }

        let answered: Question = update_one_as(
            self.store,
            &Query::table(QUESTIONS)
                .eq("id", question.id)
                .eq("status", QuestionStatus::Pending),
            json!({
                "answer": answer.trim(),
                "answered_by": answered_by,
                "answered_at": Utc::now(),
                "status": QuestionStatus::Answered,
            }),
        )
        .await?
        .ok_or(QuestionError::ConcurrentModification)?;

        info!("Question {} answered by {}", question.id, answered_by);
        self.to_response(&answered).await
    }

    /// Soft delete; the row stays with status DELETED.
    pub async fn delete(&self, question: &Question) -> Result<(), QuestionError> {
        if question.status == QuestionStatus::Deleted {
            return Err(QuestionError::Deleted);
        }

        update_one_as::<Question>(
            self.store,
            &Query::table(QUESTIONS)
                .eq("id", question.id)
                .eq("status", question.status),
            json!({ "status": QuestionStatus::Deleted }),
        )
        .await?
        .ok_or(QuestionError::ConcurrentModification)?;

        info!("Question {} deleted", question.id);
        Ok(())
    }

    /// Deleted questions never appear. `customer_id` narrows to one asker.
    pub async fn list(
        &self,
        params: &QuestionListParams,
        customer_id: Option<i64>,
    ) -> Result<Page<QuestionResponse>, QuestionError> {
        let status = parse_question_status(params.status.as_deref())?;
        let direction = SortDirection::parse_or_desc(params.sort.as_deref());
        let page = PageRequest::new(params.page, params.size, DEFAULT_PAGE_SIZE);

        debug!(
            "Listing questions status={:?} consultant={:?} customer={:?}",
            status, params.consultant_id, customer_id
        );

        let query = Query::table(QUESTIONS)
            .neq("status", QuestionStatus::Deleted)
            .eq_opt("status", status)
            .eq_opt("consultant_id", params.consultant_id)
            .eq_opt("customer_id", customer_id)
            .order_by("created_at", direction)
            .order_by("id", direction);

        let found: Page<Question> = find_page_as(self.store, &query, page).await?;

        let Page {
            content,
            total_elements,
            total_pages,
            page,
            size,
        } = found;

        Ok(Page {
            content: self.to_responses(&content).await?,
            total_elements,
            total_pages,
            page,
            size,
        })
    }

    pub async fn to_response(&self, question: &Question) -> Result<QuestionResponse, QuestionError> {
        let mut responses = self.to_responses(std::slice::from_ref(question)).await?;
        responses.pop().ok_or(QuestionError::NotFound)
    }

    async fn to_responses(&self, questions: &[Question]) -> Result<Vec<QuestionResponse>, QuestionError> {
        let ids = questions.iter().flat_map(|q| {
            [Some(q.customer_id), q.consultant_id, q.answered_by]
                .into_iter()
                .flatten()
        });
        let users = users_by_ids(self.store, ids).await?;

        Ok(questions
            .iter()
            .map(|q| {
                question_response(
                    q,
                    users.get(&q.customer_id),
                    q.consultant_id.and_then(|id| users.get(&id)),
                    q.answered_by.and_then(|id| users.get(&id)),
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_title_and_content_are_required() {
        assert!(validate_question("Spotting", "Is spotting mid-cycle normal?").is_ok());
        assert_matches!(
            validate_question("  ", "content"),
            Err(QuestionError::Validation(_))
        );
        assert_matches!(validate_question("title", ""), Err(QuestionError::Validation(_)));
        assert_matches!(
            validate_question(&"x".repeat(256), "content"),
            Err(QuestionError::Validation(_))
        );
    }

    #[test]
    fn test_status_filter_parsing() {
        assert_eq!(parse_question_status(None).unwrap(), None);
        assert_eq!(parse_question_status(Some(" ")).unwrap(), None);
        assert_eq!(
            parse_question_status(Some("answered")).unwrap(),
            Some(QuestionStatus::Answered)
        );
        assert_matches!(
            parse_question_status(Some("OPEN")),
            Err(QuestionError::Validation(_))
        );
    }
}
