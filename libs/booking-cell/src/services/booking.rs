use chrono::{DateTime, Days, Duration, TimeZone, Utc};
use serde_json::json;
use tracing::{debug, info, warn};

use shared_database::store::{find_as, find_one_as, insert_as, update_one_as};
use shared_database::{Query, RecordStore};
use shared_models::auth::Role;
use shared_models::page::{Page, PageRequest, SortDirection};
use shared_utils::locks::KeyedLocks;
use shared_utils::notify::{notify, BookingChannel, BookingEvent, BookingEventKind};
use shared_utils::AppState;

use crate::models::{
    BookingError, BookingKind, BookingStatus, BookingValidationRules, ConsultantCalendarResponse,
    ConsultantScheduleEntry, ConsultationBooking, ConsultationBookingResponse,
    CreateConsultationRequest, NewConsultationBooking, PaymentStatus, Transition,
    CONSULTATION_BOOKINGS,
};
use crate::services::assembler::{consultation_response, schedule_entry};
use crate::services::conflict::ConflictDetectionService;
use crate::services::directory::{find_user, find_user_with_role, invoices_for, users_by_ids};
use crate::services::history::{find_history, HistoryFilter, HistorySource};
use crate::services::lifecycle::{apply_transition, is_amendable, touch};
use crate::services::timing::validate_booking_time;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

pub const CONSULTATION_HISTORY: HistorySource = HistorySource {
    table: CONSULTATION_BOOKINGS,
    date_column: "booking_date",
    sort_column: "booking_date",
};

pub struct ConsultationBookingService<'a> {
    state: &'a AppState,
    rules: BookingValidationRules,
}

impl<'a> ConsultationBookingService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self {
            state,
            rules: BookingValidationRules::default(),
        }
    }

    fn store(&self) -> &dyn RecordStore {
        self.state.store.as_ref()
    }

    fn conflicts(&self) -> ConflictDetectionService<'_> {
        ConflictDetectionService::new(self.store(), self.rules.conflict_buffer_minutes)
    }

    // ==============================================================================
    // BOOKING CREATION
    // ==============================================================================

    pub async fn create_booking(
        &self,
        customer_id: i64,
        request: CreateConsultationRequest,
    ) -> Result<ConsultationBookingResponse, BookingError> {
        debug!(
            "Customer {} booking consultant {} at {}",
            customer_id, request.consultant_id, request.booking_date
        );

        validate_booking_time(request.booking_date, Utc::now(), &self.rules)?;

        let consultant = find_user_with_role(self.store(), request.consultant_id, Role::Consultant)
            .await?
            .ok_or(BookingError::MissingReference("Consultant"))?;
        let customer = find_user(self.store(), customer_id)
            .await?
            .ok_or(BookingError::MissingReference("Customer"))?;

        // Conflict read and insert must not interleave for one consultant.
        let _guard = self
            .state
            .locks
            .lock(KeyedLocks::consultant_key(consultant.id))
            .await;

        self.conflicts()
            .ensure_slot_free(consultant.id, request.booking_date, None)
            .await?;

        let now = Utc::now();
        let new_booking = NewConsultationBooking {
            customer_id: customer.id,
            consultant_id: consultant.id,
            booking_date: request.booking_date,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            payment_method: request.payment_method,
            note: request.note,
            meet_link: None,
            created_at: now,
            updated_at: now,
        };

        let booking: ConsultationBooking =
            insert_as(self.store(), CONSULTATION_BOOKINGS, &new_booking).await?;

        info!(
            "Consultation booking {} created for customer {} with consultant {}",
            booking.id, customer.id, consultant.id
        );

        Ok(consultation_response(&booking, Some(&customer), Some(&consultant), None))
    }

    // ==============================================================================
    // READS
    // ==============================================================================

    pub async fn get_booking(&self, booking_id: i64) -> Result<ConsultationBooking, BookingError> {
        find_one_as(
            self.store(),
            &Query::table(CONSULTATION_BOOKINGS).eq("id", booking_id),
        )
        .await?
        .ok_or(BookingError::NotFound)
    }

    pub async fn to_response(
        &self,
        booking: &ConsultationBooking,
    ) -> Result<ConsultationBookingResponse, BookingError> {
        let mut responses = self.to_responses(vec![booking.clone()]).await?;
        responses.pop().ok_or(BookingError::NotFound)
    }

    async fn to_responses(
        &self,
        bookings: Vec<ConsultationBooking>,
    ) -> Result<Vec<ConsultationBookingResponse>, BookingError> {
        let users = users_by_ids(
            self.store(),
            bookings
                .iter()
                .flat_map(|b| [b.customer_id, b.consultant_id]),
        )
        .await?;
        let invoices = invoices_for(
            self.store(),
            BookingKind::Consultation,
            bookings.iter().map(|b| b.id),
        )
        .await?;

        Ok(bookings
            .iter()
            .map(|b| {
                consultation_response(
                    b,
                    users.get(&b.customer_id),
                    users.get(&b.consultant_id),
                    invoices.get(&b.id),
                )
            })
            .collect())
    }

    /// Paginated history or staff search; the filter decides which.
    pub async fn find_bookings(
        &self,
        filter: &HistoryFilter,
        direction: SortDirection,
        page: PageRequest,
    ) -> Result<Page<ConsultationBookingResponse>, BookingError> {
        let found: Page<ConsultationBooking> =
            find_history(self.store(), CONSULTATION_HISTORY, filter, direction, page).await?;

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

    pub async fn consultant_schedule(
        &self,
        consultant_id: i64,
    ) -> Result<Vec<ConsultantScheduleEntry>, BookingError> {
        find_user_with_role(self.store(), consultant_id, Role::Consultant)
            .await?
            .ok_or(BookingError::MissingReference("Consultant"))?;

        let bookings: Vec<ConsultationBooking> = find_as(
            self.store(),
            &Query::table(CONSULTATION_BOOKINGS)
                .eq("consultant_id", consultant_id)
                .neq("status", BookingStatus::Deleted)
                .order_by("booking_date", SortDirection::Asc),
        )
        .await?;

        let customers = users_by_ids(self.store(), bookings.iter().map(|b| b.customer_id)).await?;

        Ok(bookings
            .iter()
            .map(|b| schedule_entry(b, customers.get(&b.customer_id)))
            .collect())
    }

    /// Booked slots plus free hourly slots in opening hours for the next
    /// few days. A slot is free when it passes timing validation and no
    /// slot-holding booking sits within the conflict buffer.
    pub async fn consultant_calendar(
        &self,
        consultant_id: i64,
        now: DateTime<Utc>,
    ) -> Result<ConsultantCalendarResponse, BookingError> {
        find_user_with_role(self.store(), consultant_id, Role::Consultant)
            .await?
            .ok_or(BookingError::MissingReference("Consultant"))?;

        let today = now.date_naive();
        let window_start = Utc.from_utc_datetime(&today.and_time(chrono::NaiveTime::MIN));
        let window_end = window_start + Duration::days(self.rules.calendar_days);

        let booked: Vec<ConsultationBooking> = find_as(
            self.store(),
            &Query::table(CONSULTATION_BOOKINGS)
                .eq("consultant_id", consultant_id)
                .not_in("status", BookingStatus::RELEASED)
                .gte("booking_date", window_start)
                .lt("booking_date", window_end)
                .order_by("booking_date", SortDirection::Asc),
        )
        .await?;

        let booked_slots: Vec<DateTime<Utc>> = booked.iter().map(|b| b.booking_date).collect();
        let buffer = Duration::minutes(self.rules.conflict_buffer_minutes);

        let mut available_slots = Vec::new();
        for day in 0..self.rules.calendar_days {
            let Some(date) = today.checked_add_days(Days::new(day as u64)) else {
                continue;
            };

            for hour in self.rules.calendar_first_hour..=self.rules.calendar_last_hour {
                let Some(naive) = date.and_hms_opt(hour, 0, 0) else {
                    continue;
                };
                let slot = Utc.from_utc_datetime(&naive);

                let taken = booked_slots
                    .iter()
                    .any(|b| (*b - slot).abs() <= buffer);
                if !taken && validate_booking_time(slot, now, &self.rules).is_ok() {
                    available_slots.push(slot);
                }
            }
        }

        Ok(ConsultantCalendarResponse {
            consultant_id,
            booked_slots,
            available_slots,
        })
    }

    // ==============================================================================
    // STATUS TRANSITIONS
    // ==============================================================================

    pub async fn transition(
        &self,
        booking_id: i64,
        transition: Transition,
    ) -> Result<ConsultationBooking, BookingError> {
        let booking: ConsultationBooking = apply_transition(
            self.store(),
            CONSULTATION_BOOKINGS,
            BookingKind::Consultation,
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
    // AMENDMENTS
    // ==============================================================================

    pub async fn reschedule(
        &self,
        booking: &ConsultationBooking,
        new_date: DateTime<Utc>,
    ) -> Result<ConsultationBooking, BookingError> {
        if !is_amendable(booking.status) {
            return Err(BookingError::Validation(format!(
                "A booking in status {} cannot be rescheduled",
                booking.status
            )));
        }

        validate_booking_time(new_date, Utc::now(), &self.rules)?;

        let _guard = self
            .state
            .locks
            .lock(KeyedLocks::consultant_key(booking.consultant_id))
            .await;

        self.conflicts()
            .ensure_slot_free(booking.consultant_id, new_date, Some(booking.id))
            .await?;

        let updated: ConsultationBooking = update_one_as(
            self.store(),
            &Query::table(CONSULTATION_BOOKINGS)
                .eq("id", booking.id)
                .eq("status", booking.status),
            json!({
                "booking_date": new_date,
                "updated_at": touch(booking.updated_at),
            }),
        )
        .await?
        .ok_or(BookingError::ConcurrentModification)?;

        info!(
            "Consultation booking {} moved from {} to {}",
            booking.id, booking.booking_date, new_date
        );
        notify(
            self.state.notifier.as_ref(),
            booking_event(&updated, BookingEventKind::Rescheduled),
        )
        .await;

        Ok(updated)
    }

    pub async fn attach_meeting_link(
        &self,
        booking: &ConsultationBooking,
        link: &str,
    ) -> Result<ConsultationBooking, BookingError> {
        let link = link.trim();
        if !(link.starts_with("https://") || link.starts_with("http://")) {
            return Err(BookingError::Validation(
                "Meeting link must be an http(s) URL".to_string(),
            ));
        }
        if !is_amendable(booking.status) {
            return Err(BookingError::Validation(format!(
                "A booking in status {} cannot receive a meeting link",
                booking.status
            )));
        }

        let updated: ConsultationBooking = update_one_as(
            self.store(),
            &Query::table(CONSULTATION_BOOKINGS)
                .eq("id", booking.id)
                .eq("status", booking.status),
            json!({
                "meet_link": link,
                "updated_at": touch(booking.updated_at),
            }),
        )
        .await?
        .ok_or(BookingError::ConcurrentModification)?;

        info!("Meeting link attached to consultation booking {}", booking.id);
        Ok(updated)
    }

    // ==============================================================================
    // MAINTENANCE
    // ==============================================================================

    /// Moves PENDING + UNPAID bookings created before `cutoff` to
    /// FAILED_PAYMENT. Individual failures are logged and skipped.
    pub async fn expire_unpaid(&self, cutoff: DateTime<Utc>) -> Result<usize, BookingError> {
        let stale: Vec<ConsultationBooking> = find_as(
            self.store(),
            &Query::table(CONSULTATION_BOOKINGS)
                .eq("status", BookingStatus::Pending)
                .eq("payment_status", PaymentStatus::Unpaid)
                .lt("created_at", cutoff),
        )
        .await?;

        let mut expired = 0;
        for booking in stale {
            match self.transition(booking.id, Transition::FailPayment).await {
                Ok(_) => expired += 1,
                Err(e) => warn!("Could not expire consultation booking {}: {}", booking.id, e),
            }
        }

        if expired > 0 {
            info!("Expired {} unpaid consultation bookings", expired);
        }
        Ok(expired)
    }
}

fn booking_event(booking: &ConsultationBooking, kind: BookingEventKind) -> BookingEvent {
    BookingEvent {
        event: kind,
        channel: BookingChannel::Consultation,
        booking_id: booking.id,
        customer_id: booking.customer_id,
        consultant_id: Some(booking.consultant_id),
        service_id: None,
        scheduled_at: booking.booking_date,
        meeting_link: booking.meet_link.clone(),
    }
}
