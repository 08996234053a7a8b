use chrono::Utc;
use tracing::{debug, info};

use booking_cell::models::BookingStatus;
use booking_cell::services::directory::{find_user, users_by_ids};
use booking_cell::services::feedback::{average_rating, validate_rating, MAX_RATING, MIN_RATING};
use shared_database::store::{find_as, find_one_as, insert_as};
use shared_database::{Query, RecordStore};
use shared_models::page::SortDirection;
use shared_utils::AppState;

use crate::models::{
    FeedbackStatus, NewStisFeedback, RatingCount, StisBooking, StisError, StisFeedback,
    StisFeedbackRequest, StisFeedbackResponse, StisRatingSummary, STIS_FEEDBACK,
};
use crate::services::assembler::stis_feedback_response;

/// Count per star value, highest first, with zero entries kept.
pub fn rating_counts(ratings: &[i32]) -> Vec<RatingCount> {
    (MIN_RATING..=MAX_RATING)
        .rev()
        .map(|rating| RatingCount {
            rating,
            count: ratings.iter().filter(|r| **r == rating).count() as u64,
        })
        .collect()
}

pub struct StisFeedbackService<'a> {
    state: &'a AppState,
}

impl<'a> StisFeedbackService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    fn store(&self) -> &dyn RecordStore {
        self.state.store.as_ref()
    }

    pub async fn submit(
        &self,
        booking: &StisBooking,
        request: StisFeedbackRequest,
    ) -> Result<StisFeedbackResponse, StisError> {
        validate_rating(request.rating)?;

        if booking.status != BookingStatus::Completed {
            return Err(StisError::Validation(
                "Feedback can only be left on completed bookings".to_string(),
            ));
        }

        let _guard = self
            .state
            .locks
            .lock(format!("stis-feedback:{}", booking.id))
            .await;

        let existing: Option<StisFeedback> = find_one_as(
            self.store(),
            &Query::table(STIS_FEEDBACK).eq("booking_id", booking.id),
        )
        .await?;
        if existing.is_some() {
            return Err(StisError::Duplicate(
                "Feedback already submitted for this booking".to_string(),
            ));
        }

        let feedback: StisFeedback = insert_as(
            self.store(),
            STIS_FEEDBACK,
            &NewStisFeedback {
                booking_id: booking.id,
                service_id: booking.service_id,
                user_id: booking.customer_id,
                rating: request.rating,
                comment: request.comment.filter(|c| !c.trim().is_empty()),
                status: FeedbackStatus::Active,
                created_at: Utc::now(),
            },
        )
        .await?;

        info!(
            "Feedback {} ({} stars) recorded for STIS service {}",
            feedback.id, feedback.rating, feedback.service_id
        );

        let customer = find_user(self.store(), booking.customer_id).await?;
        Ok(stis_feedback_response(&feedback, customer.as_ref()))
    }

    async fn visible_feedback(&self, service_id: i64) -> Result<Vec<StisFeedback>, StisError> {
        Ok(find_as(
            self.store(),
            &Query::table(STIS_FEEDBACK)
                .eq("service_id", service_id)
                .eq("status", FeedbackStatus::Active)
                .order_by("created_at", SortDirection::Desc),
        )
        .await?)
    }

    pub async fn for_service(&self, service_id: i64) -> Result<Vec<StisFeedbackResponse>, StisError> {
        debug!("Loading feedback for STIS service {}", service_id);

        let feedback = self.visible_feedback(service_id).await?;
        let customers = users_by_ids(self.store(), feedback.iter().map(|f| f.user_id)).await?;

        Ok(feedback
            .iter()
            .map(|f| stis_feedback_response(f, customers.get(&f.user_id)))
            .collect())
    }

    pub async fn summary(&self, service_id: i64) -> Result<StisRatingSummary, StisError> {
        let ratings: Vec<i32> = self
            .visible_feedback(service_id)
            .await?
            .iter()
            .map(|f| f.rating)
            .collect();

        Ok(StisRatingSummary {
            service_id,
            average_rating: average_rating(ratings.iter().copied()),
            total_feedback: ratings.len() as u64,
            rating_counts: rating_counts(&ratings),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_counts_cover_every_star() {
        let counts = rating_counts(&[5, 5, 3]);

        assert_eq!(counts.len(), 5);
        assert_eq!((counts[0].rating, counts[0].count), (5, 2));
        assert_eq!((counts[2].rating, counts[2].count), (3, 1));
        assert_eq!((counts[4].rating, counts[4].count), (1, 0));
    }
}
