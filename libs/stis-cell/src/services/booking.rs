use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use booking_cell::models::{
    BookingError, BookingKind, BookingStatus, BookingValidationRules, PaymentStatus, Transition,
};
use booking_cell::services::directory::{find_user, invoices_for, users_by_ids};
use booking_cell::services::history::{find_history, HistoryFilter, HistorySource};
use booking_cell::services::lifecycle::{apply_transition, is_amendable, touch};
use booking_cell::services::timing::validate_booking_time;
use shared_database::store::{find_as, find_one_as, insert_as, update_one_as};
use shared_database::{Query, RecordStore};
use shared_models::page::{Page, PageRequest, SortDirection};
use shared_utils::locks::KeyedLocks;
use shared_utils::notify::{notify, BookingChannel, BookingEvent, BookingEventKind};
use shared_utils::AppState;

use crate::models::{
    CreateStisBookingRequest, NewStisBooking, SlotAvailability, StisBooking, StisBookingResponse,
    StisError, StisResult, StisService, UpdateStisBookingRequest, CASH_PAYMENT, STIS_BOOKINGS,
    STIS_RESULTS, STIS_SERVICES,
};
use crate::services::assembler::stis_booking_response;
use crate::services::capacity::SlotCapacityChecker;
use crate::services::catalog::StisCatalogService;

pub const DEFAULT_PAGE_SIZE: u32 = 5;

pub const STIS_HISTORY: HistorySource = HistorySource {
    table: STIS_BOOKINGS,
    date_column: "booking_date",
    sort_column: "created_at",
};

/// Cash bookings are settled at the clinic and are left alone by the sweep.
pub fn expires_when_unpaid(booking: &StisBooking) -> bool {
    booking
        .payment_method
        .as_deref()
        .map(|m| !m.trim().eq_ignore_ascii_case(CASH_PAYMENT))
        .unwrap_or(true)
}

pub struct StisBookingService<'a> {
    state: &'a AppState,
    rules: BookingValidationRules,
}

impl<'a> StisBookingService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self {
            state,
            rules: BookingValidationRules::default(),
        }
    }

    fn store(&self) -> &dyn RecordStore {
        self.state.store.as_ref()
    }

    fn catalog(&self) -> StisCatalogService<'_> {
        StisCatalogService::new(self.store())
    }

    // ==============================================================================
    // BOOKING CREATION
    // ==============================================================================

    pub async fn create_booking(
        &self,
        customer_id: i64,
        request: CreateStisBookingRequest,
    ) -> Result<StisBookingResponse, StisError> {
        debug!(
            "Customer {} booking STIS service {} at {}",
            customer_id, request.service_id, request.booking_date
        );

        validate_booking_time(request.booking_date, Utc::now(), &self.rules)?;

        let service = self.catalog().get_active(request.service_id).await?;
        let customer = find_user(self.store(), customer_id)
            .await?
            .ok_or(BookingError::MissingReference("Customer"))?;

        // Capacity count and insert must not interleave for one service.
        let _guard = self
            .state
            .locks
            .lock(KeyedLocks::stis_service_key(service.id))
            .await;

        SlotCapacityChecker::new(self.store())
            .ensure_capacity(&service, request.booking_date, None)
            .await?;

        let now = Utc::now();
        let booking: StisBooking = insert_as(
            self.store(),
            STIS_BOOKINGS,
            &NewStisBooking {
                customer_id: customer.id,
                service_id: service.id,
                booking_date: request.booking_date,
                status: BookingStatus::Pending,
                payment_status: PaymentStatus::Unpaid,
                payment_method: request.payment_method,
                note: request.note,
                created_at: now,
                updated_at: now,
            },
        )
        .await?;

        info!(
            "STIS booking {} created for customer {} on service {}",
            booking.id, customer.id, service.id
        );

        Ok(stis_booking_response(&booking, Some(&customer), Some(&service), None, None))
    }

    /// Free capacity of the service in the hour containing `at`.
    pub async fn check_limit(
        &self,
        service_id: i64,
        at: DateTime<Utc>,
    ) -> Result<SlotAvailability, StisError> {
        let service = self.catalog().get(service_id).await?;
        SlotCapacityChecker::new(self.store())
            .availability(&service, at, None)
            .await
    }

    // ==============================================================================
    // READS
    // ==============================================================================

    pub async fn get_booking(&self, booking_id: i64) -> Result<StisBooking, StisError> {
        find_one_as(self.store(), &Query::table(STIS_BOOKINGS).eq("id", booking_id))
            .await?
            .ok_or(StisError::Booking(BookingError::NotFound))
    }

    pub async fn to_response(&self, booking: &StisBooking) -> Result<StisBookingResponse, StisError> {
        let mut responses = self.to_responses(vec![booking.clone()]).await?;
        responses
            .pop()
            .ok_or(StisError::Booking(BookingError::NotFound))
    }

    async fn to_responses(
        &self,
        bookings: Vec<StisBooking>,
    ) -> Result<Vec<StisBookingResponse>, StisError> {
        let customers = users_by_ids(self.store(), bookings.iter().map(|b| b.customer_id)).await?;
        let services = self.services_by_ids(bookings.iter().map(|b| b.service_id)).await?;
        let invoices =
            invoices_for(self.store(), BookingKind::Stis, bookings.iter().map(|b| b.id)).await?;
        let results = self.results_by_booking(bookings.iter().map(|b| b.id)).await?;

        Ok(bookings
            .iter()
            .map(|b| {
                stis_booking_response(
                    b,
                    customers.get(&b.customer_id),
                    services.get(&b.service_id),
                    invoices.get(&b.id),
                    results.get(&b.id),
                )
            })
            .collect())
    }

    async fn services_by_ids(
        &self,
        ids: impl IntoIterator<Item = i64>,
    ) -> Result<HashMap<i64, StisService>, StisError> {
        let mut ids: Vec<i64> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let services: Vec<StisService> =
            find_as(self.store(), &Query::table(STIS_SERVICES).is_in("id", ids)).await?;
        Ok(services.into_iter().map(|s| (s.id, s)).collect())
    }

    async fn results_by_booking(
        &self,
        booking_ids: impl IntoIterator<Item = i64>,
    ) -> Result<HashMap<i64, StisResult>, StisError> {
        let ids: Vec<i64> = booking_ids.into_iter().collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let results: Vec<StisResult> = find_as(
            self.store(),
            &Query::table(STIS_RESULTS).is_in("booking_id", ids),
        )
        .await?;
        Ok(results.into_iter().map(|r| (r.booking_id, r)).collect())
    }

    pub async fn find_bookings(
        &self,
        filter: &HistoryFilter,
        direction: SortDirection,
        page: PageRequest,
    ) -> Result<Page<StisBookingResponse>, StisError> {
        let found: Page<StisBooking> =
            find_history(self.store(), STIS_HISTORY, filter, direction, page).await?;

        let Page {
            content,
            total_elements,
            total_pages,
            page,
            size,
        } = found;

        Ok(Page {
            content: self.to_responses(content).await?,
            total_elements,
            total_pages,
            page,
            size,
        })
    }

    // ==============================================================================
    // UPDATES AND TRANSITIONS
    // ==============================================================================

    /// Date, payment method and note edits before the visit. A new date is
    /// validated and must fit in the service's capacity.
    pub async fn update_booking(
        &self,
        booking: &StisBooking,
        request: UpdateStisBookingRequest,
    ) -> Result<StisBooking, StisError> {
        if !is_amendable(booking.status) {
            return Err(StisError::Validation(format!(
                "A booking in status {} can no longer be edited",
                booking.status
            )));
        }

        let mut patch = Map::new();
        if let Some(method) = request.payment_method {
            patch.insert("payment_method".to_string(), json!(method));
        }
        if let Some(note) = request.note {
            patch.insert("note".to_string(), json!(note));
        }

        let new_date = request
            .booking_date
            .filter(|date| *date != booking.booking_date);

        let _guard = match new_date {
            Some(date) => {
                validate_booking_time(date, Utc::now(), &self.rules)?;
                let service = self.catalog().get_active(booking.service_id).await?;

                let guard = self
                    .state
                    .locks
                    .lock(KeyedLocks::stis_service_key(service.id))
                    .await;
                SlotCapacityChecker::new(self.store())
                    .ensure_capacity(&service, date, Some(booking.id))
                    .await?;

                patch.insert("booking_date".to_string(), json!(date));
                Some(guard)
            }
            None => None,
        };

        patch.insert("updated_at".to_string(), json!(touch(booking.updated_at)));

        let updated: StisBooking = update_one_as(
            self.store(),
            &Query::table(STIS_BOOKINGS)
                .eq("id", booking.id)
                .eq("status", booking.status),
            Value::Object(patch),
        )
        .await?
        .ok_or(StisError::Booking(BookingError::ConcurrentModification))?;

        info!("STIS booking {} updated", booking.id);

        if new_date.is_some() {
            notify(
                self.state.notifier.as_ref(),
                booking_event(&updated, BookingEventKind::Rescheduled),
            )
            .await;
        }

        Ok(updated)
    }

    pub async fn transition(
        &self,
        booking_id: i64,
        transition: Transition,
    ) -> Result<StisBooking, StisError> {
        let booking: StisBooking = apply_transition(
            self.store(),
            STIS_BOOKINGS,
            BookingKind::Stis,
            booking_id,
            transition,
        )
        .await?;

        let event = match transition {
            Transition::Confirm => Some(BookingEventKind::Confirmed),
            Transition::Cancel => Some(BookingEventKind::Cancelled),
            _ => None,
        };
        if let Some(kind) = event {
            notify(self.state.notifier.as_ref(), booking_event(&booking, kind)).await;
        }

        Ok(booking)
    }

    // ==============================================================================
    // MAINTENANCE
    // ==============================================================================

    pub async fn expire_unpaid(&self, cutoff: DateTime<Utc>) -> Result<usize, StisError> {
        let stale: Vec<StisBooking> = find_as(
            self.store(),
            &Query::table(STIS_BOOKINGS)
                .eq("status", BookingStatus::Pending)
                .eq("payment_status", PaymentStatus::Unpaid)
                .lt("created_at", cutoff),
        )
        .await?;

        let mut expired = 0;
        for booking in stale.into_iter().filter(expires_when_unpaid) {
            match self.transition(booking.id, Transition::FailPayment).await {
                Ok(_) => expired += 1,
                Err(e) => warn!("Could not expire STIS booking {}: {}", booking.id, e),
            }
        }

        if expired > 0 {
            info!("Expired {} unpaid STIS bookings", expired);
        }
        Ok(expired)
    }
}

fn booking_event(booking: &StisBooking, kind: BookingEventKind) -> BookingEvent {
    BookingEvent {
        event: kind,
        channel: BookingChannel::Stis,
        booking_id: booking.id,
        customer_id: booking.customer_id,
        consultant_id: None,
        service_id: Some(booking.service_id),
        scheduled_at: booking.booking_date,
        meeting_link: None,
    }
}
