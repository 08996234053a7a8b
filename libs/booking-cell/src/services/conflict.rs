use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use shared_database::store::find_as;
use shared_database::{Query, RecordStore};

use crate::models::{BookingError, BookingStatus, ConsultationBooking, CONSULTATION_BOOKINGS};

pub struct ConflictDetectionService<'a> {
    store: &'a dyn RecordStore,
    buffer_minutes: i64,
}

impl<'a> ConflictDetectionService<'a> {
    pub fn new(store: &'a dyn RecordStore, buffer_minutes: i64) -> Self {
        Self {
            store,
            buffer_minutes,
        }
    }

    /// Slot-holding bookings of the consultant inside `[at - buffer, at + buffer]`.
    pub async fn find_conflicts(
        &self,
        consultant_id: i64,
        at: DateTime<Utc>,
        exclude_booking_id: Option<i64>,
    ) -> Result<Vec<ConsultationBooking>, BookingError> {
        let buffer = Duration::minutes(self.buffer_minutes);
        debug!("Checking conflicts for consultant {} around {}", consultant_id, at);

        let mut query = Query::table(CONSULTATION_BOOKINGS)
            .eq("consultant_id", consultant_id)
            .not_in("status", BookingStatus::RELEASED)
            .between("booking_date", at - buffer, at + buffer);

        if let Some(id) = exclude_booking_id {
            query = query.neq("id", id);
        }

        Ok(find_as(self.store, &query).await?)
    }

    pub async fn ensure_slot_free(
        &self,
        consultant_id: i64,
        at: DateTime<Utc>,
        exclude_booking_id: Option<i64>,
    ) -> Result<(), BookingError> {
        let conflicts = self.find_conflicts(consultant_id, at, exclude_booking_id).await?;

        if let Some(existing) = conflicts.first() {
            warn!(
                "Consultant {} already booked at {} (booking {})",
                consultant_id, existing.booking_date, existing.id
            );
            return Err(BookingError::SlotConflict(self.buffer_minutes));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use serde_json::json;
    use shared_database::MemoryStore;

    fn t() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 10, 0, 0).unwrap()
    }

    async fn store_with(status: &str) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert(
                CONSULTATION_BOOKINGS,
                json!({
                    "id": 1,
                    "customer_id": 1,
                    "consultant_id": 7,
                    "booking_date": t(),
                    "status": status,
                    "payment_status": "UNPAID",
                    "payment_method": null,
                    "note": null,
                    "meet_link": null,
                    "created_at": t(),
                    "updated_at": t(),
                }),
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_buffer_window_is_inclusive() {
        let store = store_with("PENDING").await;
        let checker = ConflictDetectionService::new(&store, 30);

        for minutes in [-30, -15, 0, 15, 30] {
            assert_matches!(
                checker.ensure_slot_free(7, t() + Duration::minutes(minutes), None).await,
                Err(BookingError::SlotConflict(30)),
                "offset {} should conflict",
                minutes
            );
        }
        assert!(checker.ensure_slot_free(7, t() + Duration::minutes(31), None).await.is_ok());
        assert!(checker.ensure_slot_free(7, t() - Duration::minutes(31), None).await.is_ok());
    }

    #[tokio::test]
    async fn test_released_bookings_do_not_conflict() {
        for status in ["CANCELLED", "DENIED", "DELETED", "FAILED_PAYMENT"] {
            let store = store_with(status).await;
            let checker = ConflictDetectionService::new(&store, 30);
            assert!(checker.ensure_slot_free(7, t(), None).await.is_ok(), "{}", status);
        }
    }

    #[tokio::test]
    async fn test_other_consultants_and_self_are_ignored() {
        let store = store_with("CONFIRMED").await;
        let checker = ConflictDetectionService::new(&store, 30);

        assert!(checker.ensure_slot_free(8, t(), None).await.is_ok());
        assert!(checker.ensure_slot_free(7, t(), Some(1)).await.is_ok());
    }
}
