use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info, warn};

use shared_database::{Query, RecordStore};

use crate::models::{BookingError, BookingKind, BookingStatus, Transition};

const ALL_TRANSITIONS: [Transition; 8] = [
    Transition::Confirm,
    Transition::Cancel,
    Transition::Deny,
    Transition::FailPayment,
    Transition::AwaitResult,
    Transition::Complete,
    Transition::MarkNoShow,
    Transition::Delete,
];

/// The transition table. `None` means the move is illegal.
pub fn next_status(
    kind: BookingKind,
    current: BookingStatus,
    transition: Transition,
) -> Option<BookingStatus> {
    use BookingStatus as S;
    use Transition as T;

    match (current, transition) {
        (S::Pending, T::Confirm) => Some(S::Confirmed),
        (S::Pending, T::Cancel) => Some(S::Cancelled),
        (S::Pending, T::Deny) => Some(S::Denied),
        (S::Pending, T::FailPayment) => Some(S::FailedPayment),

        (S::Confirmed, T::AwaitResult) if kind == BookingKind::Stis => Some(S::PendingTestResult),
        (S::Confirmed, T::Complete) => Some(S::Completed),
        (S::Confirmed, T::Cancel) => Some(S::Cancelled),
        (S::Confirmed, T::MarkNoShow) => Some(S::NoShow),

        (S::PendingTestResult, T::Complete) => Some(S::Completed),

        (S::Pending | S::Confirmed | S::PendingTestResult | S::FailedPayment, T::Delete) => {
            Some(S::Deleted)
        }

        _ => None,
    }
}

pub fn validate_transition(
    kind: BookingKind,
    current: BookingStatus,
    transition: Transition,
) -> Result<BookingStatus, BookingError> {
    next_status(kind, current, transition).ok_or_else(|| {
        warn!("Invalid {:?} transition attempted: {} via {:?}", kind, current, transition);
        BookingError::InvalidTransition {
            from: current,
            transition,
        }
    })
}

pub fn allowed_transitions(kind: BookingKind, current: BookingStatus) -> Vec<Transition> {
    ALL_TRANSITIONS
        .into_iter()
        .filter(|t| next_status(kind, current, *t).is_some())
        .collect()
}

pub fn is_terminal(kind: BookingKind, status: BookingStatus) -> bool {
    allowed_transitions(kind, status).is_empty()
}

/// Date, note and payment-method edits are only accepted before the visit.
pub fn is_amendable(status: BookingStatus) -> bool {
    matches!(status, BookingStatus::Pending | BookingStatus::Confirmed)
}

/// `updated_at` for the next write: now, but never earlier than or equal to
/// the previous value.
pub fn touch(previous: DateTime<Utc>) -> DateTime<Utc> {
    Utc::now().max(previous + Duration::microseconds(1))
}

/// Loads the booking, consults the table and persists the new status.
///
/// The update is conditional on the status read, so a concurrent transition
/// surfaces as `ConcurrentModification` instead of being overwritten.
pub async fn apply_transition<T>(
    store: &dyn RecordStore,
    table: &str,
    kind: BookingKind,
    booking_id: i64,
    transition: Transition,
) -> Result<T, BookingError>
where
    T: DeserializeOwned,
{
    debug!("Applying {:?} to {} {}", transition, table, booking_id);

    let row = store
        .find(&Query::table(table).eq("id", booking_id).limit(1))
        .await?
        .into_iter()
        .next()
        .ok_or(BookingError::NotFound)?;

    let current: BookingStatus = serde_json::from_value(row["status"].clone())?;
    let previous_update: DateTime<Utc> = serde_json::from_value(row["updated_at"].clone())?;

    let next = validate_transition(kind, current, transition)?;

    let updated = store
        .update(
            &Query::table(table)
                .eq("id", booking_id)
                .eq("status", current),
            json!({
                "status": next,
                "updated_at": touch(previous_update),
            }),
        )
        .await?;

    let row = updated
        .into_iter()
        .next()
        .ok_or(BookingError::ConcurrentModification)?;

    info!("{} {} moved {} -> {}", table, booking_id, current, next);
    Ok(serde_json::from_value(row)?)
}
