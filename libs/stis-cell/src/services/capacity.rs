use chrono::{DateTime, Duration, DurationRound, Utc};
use tracing::{debug, warn};

use booking_cell::models::BookingStatus;
use shared_database::{Query, RecordStore};

use crate::models::{SlotAvailability, StisError, StisService, STIS_BOOKINGS};

/// The clock hour containing `at`: `[hh:00, hh+1:00)`.
pub fn slot_window(at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let hour = Duration::hours(1);
    let start = at.duration_trunc(hour).unwrap_or(at);
    (start, start + hour)
}

pub struct SlotCapacityChecker<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> SlotCapacityChecker<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    pub async fn availability(
        &self,
        service: &StisService,
        at: DateTime<Utc>,
        exclude_booking_id: Option<i64>,
    ) -> Result<SlotAvailability, StisError> {
        let (slot_start, slot_end) = slot_window(at);

        let mut query = Query::table(STIS_BOOKINGS)
            .eq("service_id", service.id)
            .not_in("status", BookingStatus::RELEASED)
            .gte("booking_date", slot_start)
            .lt("booking_date", slot_end);
        if let Some(id) = exclude_booking_id {
            query = query.neq("id", id);
        }

        let booked = self.store.find(&query).await?.len() as u64;
        debug!(
            "Service {} has {}/{} bookings in slot starting {}",
            service.id, booked, service.max_bookings_per_slot, slot_start
        );

        Ok(SlotAvailability {
            service_id: service.id,
            slot_start,
            slot_end,
            booked,
            max_bookings_per_slot: service.max_bookings_per_slot,
            available: booked < service.max_bookings_per_slot.max(0) as u64,
        })
    }

    pub async fn ensure_capacity(
        &self,
        service: &StisService,
        at: DateTime<Utc>,
        exclude_booking_id: Option<i64>,
    ) -> Result<(), StisError> {
        let slot = self.availability(service, at, exclude_booking_id).await?;
        if !slot.available {
            warn!(
                "Service {} slot at {} is full ({} booked)",
                service.id, slot.slot_start, slot.booked
            );
            return Err(StisError::SlotFull(service.max_bookings_per_slot));
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

    use crate::models::ServiceStatus;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 1, hour, minute, 0).unwrap()
    }

    fn service(max: i32) -> StisService {
        StisService {
            id: 5,
            service_name: "Chlamydia PCR".to_string(),
            description: None,
            price: 300000.0,
            duration: None,
            tests: None,
            service_type: None,
            max_bookings_per_slot: max,
            discount: 0,
            status: ServiceStatus::Active,
            created_at: at(0, 0),
            updated_at: at(0, 0),
        }
    }

    async fn seed(store: &MemoryStore, rows: &[(DateTime<Utc>, &str)]) {
        store
            .seed(
                STIS_BOOKINGS,
                rows.iter().enumerate().map(|(i, (date, status))| {
                    json!({
                        "id": i as i64 + 1,
                        "customer_id": 1,
                        "service_id": 5,
                        "booking_date": date,
                        "status": status,
                    })
                }),
            )
            .await
            .unwrap();
    }

    #[test]
    fn test_slot_window_is_the_clock_hour() {
        assert_eq!(slot_window(at(9, 45)), (at(9, 0), at(10, 0)));
        assert_eq!(slot_window(at(10, 0)), (at(10, 0), at(11, 0)));
    }

    #[tokio::test]
    async fn test_capacity_counts_only_slot_holding_bookings_in_the_hour() {
        let store = MemoryStore::new();
        seed(
            &store,
            &[
                (at(9, 10), "PENDING"),
                (at(9, 50), "CANCELLED"),
                (at(10, 0), "CONFIRMED"),
            ],
        )
        .await;
        let checker = SlotCapacityChecker::new(&store);

        let slot = checker.availability(&service(2), at(9, 30), None).await.unwrap();
        assert_eq!(slot.booked, 1);
        assert!(slot.available);

        assert_matches!(
            checker.ensure_capacity(&service(1), at(9, 30), None).await,
            Err(StisError::SlotFull(1))
        );
        assert!(checker.ensure_capacity(&service(1), at(9, 30), Some(1)).await.is_ok());
    }
}
