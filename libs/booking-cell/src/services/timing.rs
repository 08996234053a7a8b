use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::models::{BookingError, BookingValidationRules};

/// Rejects a requested time in the past, inside the minimum lead time, or
/// beyond the booking horizon. Checks run in that order.
pub fn validate_booking_time(
    requested: DateTime<Utc>,
    now: DateTime<Utc>,
    rules: &BookingValidationRules,
) -> Result<(), BookingError> {
    debug!("Validating booking time {} against now {}", requested, now);

    if requested < now {
        return Err(BookingError::InvalidTiming);
    }

    if requested < now + Duration::minutes(rules.min_lead_minutes) {
        return Err(BookingError::InsufficientLeadTime(rules.min_lead_minutes));
    }

    if requested > now + Duration::days(rules.max_horizon_days) {
        return Err(BookingError::OutOfHorizon(rules.max_horizon_days));
    }

    Ok(())
}
