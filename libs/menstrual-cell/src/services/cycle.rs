use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

use shared_database::store::{find_as, find_one_as, insert_as, update_one_as};
use shared_database::{Query, RecordStore};
use shared_models::page::SortDirection;

use crate::models::{
    CycleError, CycleRequest, MenstrualCalendarResponse, MenstrualCycle, NewMenstrualCycle,
    MENSTRUAL_CYCLES,
};
use crate::services::calendar::{build_calendar, validate_cycle};

pub struct MenstrualCycleService<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> MenstrualCycleService<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    pub async fn create_cycle(
        &self,
        customer_id: i64,
        request: CycleRequest,
    ) -> Result<MenstrualCycle, CycleError> {
        validate_cycle(&request)?;

        let now = Utc::now();
        let cycle: MenstrualCycle = insert_as(
            self.store,
            MENSTRUAL_CYCLES,
            &NewMenstrualCycle {
                customer_id,
                start_date: request.start_date,
                end_date: request.end_date,
                cycle_length: request.cycle_length,
                note: request.note,
                created_at: now,
                updated_at: now,
            },
        )
        .await?;

        info!("Cycle {} recorded for customer {}", cycle.id, customer_id);
        Ok(cycle)
    }

    pub async fn get_cycle(&self, cycle_id: i64) -> Result<MenstrualCycle, CycleError> {
        find_one_as(self.store, &Query::table(MENSTRUAL_CYCLES).eq("id", cycle_id))
            .await?
            .ok_or(CycleError::NotFound)
    }

    /// Replaces the recorded dates; reminder bookkeeping starts over.
    pub async fn update_cycle(
        &self,
        cycle: &MenstrualCycle,
        request: CycleRequest,
    ) -> Result<MenstrualCycle, CycleError> {
        validate_cycle(&request)?;

        let updated = update_one_as(
            self.store,
            &Query::table(MENSTRUAL_CYCLES).eq("id", cycle.id),
            json!({
                "start_date": request.start_date,
                "end_date": request.end_date,
                "cycle_length": request.cycle_length,
                "note": request.note,
                "last_notification_date": null,
                "last_notification_type": null,
                "updated_at": Utc::now().max(cycle.updated_at),
            }),
        )
        .await?
        .ok_or(CycleError::NotFound)?;

        debug!("Cycle {} updated", cycle.id);
        Ok(updated)
    }

    pub async fn delete_cycle(&self, cycle: &MenstrualCycle) -> Result<(), CycleError> {
        let removed = self
            .store
            .delete(&Query::table(MENSTRUAL_CYCLES).eq("id", cycle.id))
            .await?;
        if removed == 0 {
            return Err(CycleError::NotFound);
        }

        info!("Cycle {} of customer {} deleted", cycle.id, cycle.customer_id);
        Ok(())
    }

    /// Newest period first.
    pub async fn list_for_customer(&self, customer_id: i64) -> Result<Vec<MenstrualCycle>, CycleError> {
        Ok(find_as(
            self.store,
            &Query::table(MENSTRUAL_CYCLES)
                .eq("customer_id", customer_id)
                .order_by("start_date", SortDirection::Desc)
                .order_by("id", SortDirection::Desc),
        )
        .await?)
    }

    pub async fn latest_for_customer(&self, customer_id: i64) -> Result<MenstrualCycle, CycleError> {
        find_one_as(
            self.store,
            &Query::table(MENSTRUAL_CYCLES)
                .eq("customer_id", customer_id)
                .order_by("start_date", SortDirection::Desc)
                .order_by("id", SortDirection::Desc),
        )
        .await?
        .ok_or(CycleError::NoCycles)
    }

    pub async fn calendar(&self, customer_id: i64) -> Result<MenstrualCalendarResponse, CycleError> {
        let latest = self.latest_for_customer(customer_id).await?;
        debug!(
            "Building calendar for customer {} from cycle {}",
            customer_id, latest.id
        );
        Ok(build_calendar(&latest))
    }
}
