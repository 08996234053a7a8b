use chrono::{Duration, NaiveDate};

use crate::models::{
    CycleError, CycleRequest, MenstrualCalendarResponse, MenstrualCycle, PredictedCycle,
    LUTEAL_PHASE_DAYS, MAX_CYCLE_LENGTH, MIN_CYCLE_LENGTH, PREDICTED_CYCLES,
};

pub fn validate_cycle(request: &CycleRequest) -> Result<(), CycleError> {
    if request.start_date > request.end_date {
        return Err(CycleError::Validation(
            "Start date must not be after end date".to_string(),
        ));
    }

    if !(MIN_CYCLE_LENGTH..=MAX_CYCLE_LENGTH).contains(&request.cycle_length) {
        return Err(CycleError::Validation(format!(
            "Cycle length must be between {} and {} days",
            MIN_CYCLE_LENGTH, MAX_CYCLE_LENGTH
        )));
    }

    let period_days = (request.end_date - request.start_date).num_days() + 1;
    if period_days > i64::from(request.cycle_length) {
        return Err(CycleError::Validation(
            "Period cannot last longer than the whole cycle".to_string(),
        ));
    }

    Ok(())
}

/// Windows for one cycle starting on `period_start`. Ovulation falls
/// fourteen days before the following period; the fertile window runs from
/// five days before ovulation to the day after.
pub fn predict_cycle(
    cycle_number: usize,
    period_start: NaiveDate,
    cycle_length: i32,
    period_days: i64,
) -> PredictedCycle {
    let next_start = period_start + Duration::days(i64::from(cycle_length));
    let ovulation_date = next_start - Duration::days(LUTEAL_PHASE_DAYS);

    PredictedCycle {
        cycle_number,
        period_start,
        period_end: period_start + Duration::days(period_days.max(1) - 1),
        ovulation_date,
        fertile_start: ovulation_date - Duration::days(5),
        fertile_end: ovulation_date + Duration::days(1),
    }
}

/// The cycles following `latest`, numbered from 1.
pub fn predict_upcoming(latest: &MenstrualCycle) -> Vec<PredictedCycle> {
    (1..=PREDICTED_CYCLES)
        .map(|n| {
            let offset = Duration::days(i64::from(latest.cycle_length) * n as i64);
            predict_cycle(n, latest.start_date + offset, latest.cycle_length, latest.period_days())
        })
        .collect()
}

pub fn build_calendar(latest: &MenstrualCycle) -> MenstrualCalendarResponse {
    MenstrualCalendarResponse {
        cycle_id: latest.id,
        last_period_start: latest.start_date,
        cycle_length: latest.cycle_length,
        period_days: latest.period_days(),
        cycles: predict_upcoming(latest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use tokio_test::assert_ok;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn request(start: &str, end: &str, length: i32) -> CycleRequest {
        CycleRequest {
            start_date: date(start),
            end_date: date(end),
            cycle_length: length,
            note: None,
        }
    }

    #[test]
    fn test_cycle_bounds() {
        assert_ok!(validate_cycle(&request("2026-10-01", "2026-10-05", 28)));
        assert_ok!(validate_cycle(&request("2026-10-01", "2026-10-01", 20)));
        assert_ok!(validate_cycle(&request("2026-10-01", "2026-10-05", 45)));

        assert_matches!(
            validate_cycle(&request("2026-10-05", "2026-10-01", 28)),
            Err(CycleError::Validation(_))
        );
        assert_matches!(
            validate_cycle(&request("2026-10-01", "2026-10-05", 19)),
            Err(CycleError::Validation(_))
        );
        assert_matches!(
            validate_cycle(&request("2026-10-01", "2026-10-05", 46)),
            Err(CycleError::Validation(_))
        );
    }

    #[test]
    fn test_ovulation_and_fertile_window() {
        let cycle = predict_cycle(1, date("2026-10-29"), 28, 5);

        assert_eq!(cycle.period_end, date("2026-11-02"));
        // next period 2026-11-26
        assert_eq!(cycle.ovulation_date, date("2026-11-12"));
        assert_eq!(cycle.fertile_start, date("2026-11-07"));
        assert_eq!(cycle.fertile_end, date("2026-11-13"));
    }

    #[test]
    fn test_calendar_predicts_three_cycles_after_latest() {
        let now = Utc::now();
        let latest = MenstrualCycle {
            id: 4,
            customer_id: 1,
            start_date: date("2026-10-01"),
            end_date: date("2026-10-05"),
            cycle_length: 30,
            note: None,
            last_notification_date: None,
            last_notification_type: None,
            created_at: now,
            updated_at: now,
        };

        let calendar = build_calendar(&latest);

        assert_eq!(calendar.period_days, 5);
        let starts: Vec<NaiveDate> = calendar.cycles.iter().map(|c| c.period_start).collect();
        assert_eq!(
            starts,
            vec![date("2026-10-31"), date("2026-11-30"), date("2026-12-30")]
        );
        assert_eq!(calendar.cycles[0].ovulation_date, date("2026-11-16"));
    }
}
