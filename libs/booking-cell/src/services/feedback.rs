use chrono::Utc;
use tracing::{debug, info};

use shared_database::store::{find_as, find_one_as, insert_as};
use shared_database::{Query, RecordStore};
use shared_models::page::SortDirection;
use shared_utils::AppState;

use crate::models::{
    BookingError, BookingStatus, ConsultantFeedback, ConsultantFeedbackResponse,
    ConsultantRatingSummary, ConsultationBooking, FeedbackRequest, NewConsultantFeedback,
    CONSULTANT_FEEDBACK,
};
use crate::services::assembler::feedback_response;
use crate::services::directory::{find_user, users_by_ids};

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

pub fn validate_rating(rating: i32) -> Result<(), BookingError> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(BookingError::Validation(format!(
            "Rating must be between {} and {}",
            MIN_RATING, MAX_RATING
        )));
    }
    Ok(())
}

/// Mean of the ratings, rounded to one decimal; 0 when there are none.
pub fn average_rating(ratings: impl IntoIterator<Item = i32>) -> f64 {
    let (sum, count) = ratings
        .into_iter()
        .fold((0i64, 0u64), |(sum, count), r| (sum + r as i64, count + 1));

    if count == 0 {
        return 0.0;
    }
    ((sum as f64 / count as f64) * 10.0).round() / 10.0
}

pub struct ConsultantFeedbackService<'a> {
    state: &'a AppState,
}

impl<'a> ConsultantFeedbackService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    fn store(&self) -> &dyn RecordStore {
        self.state.store.as_ref()
    }

    pub async fn submit(
        &self,
        booking: &ConsultationBooking,
        request: FeedbackRequest,
    ) -> Result<ConsultantFeedbackResponse, BookingError> {
        validate_rating(request.rating)?;

        if booking.status != BookingStatus::Completed {
            return Err(BookingError::Validation(
                "Feedback can only be left on completed bookings".to_string(),
            ));
        }

        let _guard = self
            .state
            .locks
            .lock(format!("consultant-feedback:{}", booking.id))
            .await;

        let existing: Option<ConsultantFeedback> = find_one_as(
            self.store(),
            &Query::table(CONSULTANT_FEEDBACK).eq("booking_id", booking.id),
        )
        .await?;
        if existing.is_some() {
            return Err(BookingError::Duplicate(
                "Feedback already submitted for this booking".to_string(),
            ));
        }

        let feedback: ConsultantFeedback = insert_as(
            self.store(),
            CONSULTANT_FEEDBACK,
            &NewConsultantFeedback {
                booking_id: booking.id,
                consultant_id: booking.consultant_id,
                customer_id: booking.customer_id,
                rating: request.rating,
                comment: request.comment.filter(|c| !c.trim().is_empty()),
                created_at: Utc::now(),
            },
        )
        .await?;

        info!(
            "Feedback {} ({} stars) recorded for consultant {}",
            feedback.id, feedback.rating, feedback.consultant_id
        );

        let customer = find_user(self.store(), booking.customer_id).await?;
        Ok(feedback_response(&feedback, customer.as_ref()))
    }

    pub async fn for_consultant(
        &self,
        consultant_id: i64,
    ) -> Result<ConsultantRatingSummary, BookingError> {
        debug!("Loading feedback for consultant {}", consultant_id);

        let feedback: Vec<ConsultantFeedback> = find_as(
            self.store(),
            &Query::table(CONSULTANT_FEEDBACK)
                .eq("consultant_id", consultant_id)
                .order_by("created_at", SortDirection::Desc),
        )
        .await?;

        let customers = users_by_ids(self.store(), feedback.iter().map(|f| f.customer_id)).await?;

        Ok(ConsultantRatingSummary {
            consultant_id,
            average_rating: average_rating(feedback.iter().map(|f| f.rating)),
            total_feedback: feedback.len() as u64,
            feedback: feedback
                .iter()
                .map(|f| feedback_response(f, customers.get(&f.customer_id)))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(5).is_ok());
        assert!(validate_rating(6).is_err());
    }

    #[test]
    fn test_average_rounds_to_one_decimal() {
        assert_eq!(average_rating([5, 4, 4]), 4.3);
        assert_eq!(average_rating(Vec::new()), 0.0);
    }
}
