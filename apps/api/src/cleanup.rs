use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use booking_cell::services::booking::ConsultationBookingService;
use menstrual_cell::services::reminder::CycleReminderService;
use shared_utils::AppState;
use stis_cell::services::booking::StisBookingService;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub consultations_expired: usize,
    pub stis_expired: usize,
    pub reminders_sent: usize,
    pub locks_pruned: usize,
}

/// One pass over stale unpaid bookings and due cycle reminders, then drops
/// idle slot locks. A failing step is logged and the remaining steps still run.
pub async fn run_sweep(state: &AppState, now: DateTime<Utc>) -> SweepReport {
    let cutoff = now - Duration::minutes(state.config.unpaid_booking_ttl_minutes);
    let mut report = SweepReport::default();

    match ConsultationBookingService::new(state).expire_unpaid(cutoff).await {
        Ok(count) => report.consultations_expired = count,
        Err(e) => error!("Consultation cleanup failed: {}", e),
    }

    match StisBookingService::new(state).expire_unpaid(cutoff).await {
        Ok(count) => report.stis_expired = count,
        Err(e) => error!("STIS cleanup failed: {}", e),
    }

    match CycleReminderService::new(state.store.as_ref())
        .send_due_reminders(now.date_naive())
        .await
    {
        Ok(count) => report.reminders_sent = count,
        Err(e) => error!("Cycle reminder sweep failed: {}", e),
    }

    report.locks_pruned = state.locks.prune_idle();

    debug!("Sweep finished: {:?}", report);
    report
}

pub fn spawn_cleanup(state: Arc<AppState>) -> Option<JoinHandle<()>> {
    if !state.config.is_cleanup_enabled() {
        info!("Unpaid booking cleanup disabled");
        return None;
    }

    let period = StdDuration::from_secs(state.config.cleanup_interval_seconds);
    info!(
        "Unpaid bookings expire after {} minutes, checked every {:?}",
        state.config.unpaid_booking_ttl_minutes, period
    );

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            run_sweep(&state, Utc::now()).await;
        }
    }))
}
