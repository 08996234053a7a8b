use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

use booking_cell::services::lifecycle::touch;
use shared_database::store::{find_as, find_one_as, insert_as, update_one_as};
use shared_database::{Query, RecordStore};
use shared_models::page::SortDirection;

use crate::models::{
    NewStisService, ServiceStatus, StisError, StisService, StisServiceRequest, STIS_SERVICES,
};

const DEFAULT_MAX_BOOKINGS_PER_SLOT: i32 = 1;

/// Checked values of a create or update request.
struct ServiceFields {
    service_name: String,
    max_bookings_per_slot: i32,
    discount: i32,
    status: ServiceStatus,
}

fn validate(request: &StisServiceRequest) -> Result<ServiceFields, StisError> {
    let service_name = request.service_name.trim();
    if service_name.is_empty() {
        return Err(StisError::Validation("Service name is required".to_string()));
    }
    if request.price < 0.0 {
        return Err(StisError::Validation("Price cannot be negative".to_string()));
    }

    let max_bookings_per_slot = request
        .max_bookings_per_slot
        .unwrap_or(DEFAULT_MAX_BOOKINGS_PER_SLOT);
    if max_bookings_per_slot < 1 {
        return Err(StisError::Validation(
            "At least one booking per slot must be allowed".to_string(),
        ));
    }

    let discount = request.discount.unwrap_or(0);
    if !(0..=100).contains(&discount) {
        return Err(StisError::Validation(
            "Discount must be a percentage between 0 and 100".to_string(),
        ));
    }

    let status = match request.status.as_deref() {
        Some(raw) => raw.parse()?,
        None => ServiceStatus::Active,
    };

    Ok(ServiceFields {
        service_name: service_name.to_string(),
        max_bookings_per_slot,
        discount,
        status,
    })
}

pub struct StisCatalogService<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> StisCatalogService<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    pub async fn list(&self, include_inactive: bool) -> Result<Vec<StisService>, StisError> {
        let mut query = Query::table(STIS_SERVICES).order_by("service_name", SortDirection::Asc);
        if !include_inactive {
            query = query.eq("status", ServiceStatus::Active);
        }

        let services: Vec<StisService> = find_as(self.store, &query).await?;
        debug!("Listed {} STIS services", services.len());
        Ok(services)
    }

    pub async fn get(&self, service_id: i64) -> Result<StisService, StisError> {
        find_one_as(self.store, &Query::table(STIS_SERVICES).eq("id", service_id))
            .await?
            .ok_or(StisError::ServiceNotFound)
    }

    /// The service must exist and be open for booking.
    pub async fn get_active(&self, service_id: i64) -> Result<StisService, StisError> {
        let service = self.get(service_id).await?;
        if service.status != ServiceStatus::Active {
            return Err(StisError::ServiceInactive(service_id));
        }
        Ok(service)
    }

    pub async fn create(&self, request: StisServiceRequest) -> Result<StisService, StisError> {
        let fields = validate(&request)?;
        let now = Utc::now();

        let service: StisService = insert_as(
            self.store,
            STIS_SERVICES,
            &NewStisService {
                service_name: fields.service_name,
                description: request.description,
                price: request.price,
                duration: request.duration,
                tests: request.tests,
                service_type: request.service_type,
                max_bookings_per_slot: fields.max_bookings_per_slot,
                discount: fields.discount,
                status: fields.status,
                created_at: now,
                updated_at: now,
            },
        )
        .await?;

        info!("STIS service {} '{}' created", service.id, service.service_name);
        Ok(service)
    }

    pub async fn update(
        &self,
        service_id: i64,
        request: StisServiceRequest,
    ) -> Result<StisService, StisError> {
        let existing = self.get(service_id).await?;
        let fields = validate(&request)?;

        let updated: StisService = update_one_as(
            self.store,
            &Query::table(STIS_SERVICES).eq("id", service_id),
            json!({
                "service_name": fields.service_name,
                "description": request.description,
                "price": request.price,
                "duration": request.duration,
                "tests": request.tests,
                "type": request.service_type,
                "max_bookings_per_slot": fields.max_bookings_per_slot,
                "discount": fields.discount,
                "status": fields.status,
                "updated_at": touch(existing.updated_at),
            }),
        )
        .await?
        .ok_or(StisError::ServiceNotFound)?;

        info!("STIS service {} updated", service_id);
        Ok(updated)
    }

    /// Services are never removed; existing bookings keep pointing at them.
    pub async fn deactivate(&self, service_id: i64) -> Result<StisService, StisError> {
        let existing = self.get(service_id).await?;

        let updated: StisService = update_one_as(
            self.store,
            &Query::table(STIS_SERVICES).eq("id", service_id),
            json!({
                "status": ServiceStatus::Inactive,
                "updated_at": touch(existing.updated_at),
            }),
        )
        .await?
        .ok_or(StisError::ServiceNotFound)?;

        info!("STIS service {} deactivated", service_id);
        Ok(updated)
    }
}
