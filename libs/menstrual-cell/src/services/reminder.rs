use std::collections::HashSet;

use chrono::{Duration, NaiveDate, Utc};
use serde_json::json;
use tracing::{info, warn};

use shared_database::store::find_page_as;
use shared_database::{Query, RecordStore};
use shared_models::page::{Page, PageRequest, SortDirection, MAX_PAGE_SIZE};

use crate::models::{
    CycleError, MenstrualCycle, ReminderKind, MAX_CYCLE_LENGTH, MENSTRUAL_CYCLES,
};
use crate::services::calendar::predict_cycle;

/// How many days ahead of a predicted period the reminder goes out.
pub const REMINDER_LEAD_DAYS: i64 = 2;

/// Predictions stop this many cycles after the last recorded one.
const MAX_PROJECTED_CYCLES: i64 = 12;

/// Cycles that started earlier than this can no longer project a reminder.
const SCAN_WINDOW_DAYS: i64 = (MAX_PROJECTED_CYCLES + 1) * MAX_CYCLE_LENGTH as i64;

/// Reminder owed today for the customer whose latest record is `latest`.
pub fn due_reminder(latest: &MenstrualCycle, today: NaiveDate) -> Option<ReminderKind> {
    let length = i64::from(latest.cycle_length);
    if length <= 0 {
        return None;
    }

    // Current cycle is the last projected start on or before today.
    let elapsed = (today - latest.start_date).num_days();
    if elapsed < 0 {
        return None;
    }
    let cycles_passed = elapsed / length;
    if cycles_passed > MAX_PROJECTED_CYCLES {
        return None;
    }

    let current_start = latest.start_date + Duration::days(cycles_passed * length);
    let next_start = current_start + Duration::days(length);

    let kind = if (next_start - today).num_days() <= REMINDER_LEAD_DAYS {
        ReminderKind::PeriodUpcoming
    } else {
        let current = predict_cycle(0, current_start, latest.cycle_length, latest.period_days());
        if today != current.fertile_start {
            return None;
        }
        ReminderKind::FertileWindow
    };

    let already_sent = latest.last_notification_type == Some(kind)
        && latest
            .last_notification_date
            .map(|sent| (today - sent).num_days() <= REMINDER_LEAD_DAYS)
            .unwrap_or(false);

    (!already_sent).then_some(kind)
}

pub struct CycleReminderService<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> CycleReminderService<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    /// Latest cycle of every customer with a recent enough record, read page
    /// by page so a row cap on the backend cannot drop customers.
    async fn latest_per_customer(&self, today: NaiveDate) -> Result<Vec<MenstrualCycle>, CycleError> {
        let query = Query::table(MENSTRUAL_CYCLES)
            .gte("start_date", today - Duration::days(SCAN_WINDOW_DAYS))
            .order_by("customer_id", SortDirection::Asc)
            .order_by("start_date", SortDirection::Desc)
            .order_by("id", SortDirection::Desc);

        let mut seen = HashSet::new();
        let mut latest = Vec::new();
        let mut request = PageRequest::new(None, Some(MAX_PAGE_SIZE), MAX_PAGE_SIZE);

        loop {
            let page: Page<MenstrualCycle> = find_page_as(self.store, &query, request).await?;
            latest.extend(
                page.content
                    .into_iter()
                    .filter(|c| seen.insert(c.customer_id)),
            );

            request.page += 1;
            if u64::from(request.page) >= page.total_pages {
                break;
            }
        }

        Ok(latest)
    }

    /// Sends the reminders owed on `today` and records them on the cycle so
    /// the next sweep does not repeat them.
    pub async fn send_due_reminders(&self, today: NaiveDate) -> Result<usize, CycleError> {
        let mut sent = 0;

        for cycle in self.latest_per_customer(today).await? {
            let Some(kind) = due_reminder(&cycle, today) else {
                continue;
            };

            info!(
                "Reminding customer {} ({}) from cycle {}",
                cycle.customer_id, kind, cycle.id
            );

            let recorded = self
                .store
                .update(
                    &Query::table(MENSTRUAL_CYCLES).eq("id", cycle.id),
                    json!({
                        "last_notification_date": today,
                        "last_notification_type": kind,
                        "updated_at": Utc::now().max(cycle.updated_at),
                    }),
                )
                .await;

            match recorded {
                Ok(_) => sent += 1,
                Err(e) => warn!("Could not record reminder for cycle {}: {}", cycle.id, e),
            }
        }

        Ok(sent)
    }
}
