use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use booking_cell::models::{UserRecord, USERS};
use booking_cell::services::assembler::display_name;
use booking_cell::services::directory::{find_user_with_role, users_by_ids};
use booking_cell::services::lifecycle::touch;
use shared_database::store::{find_as, find_one_as, find_page_as, insert_as, update_one_as};
use shared_database::{Query, RecordStore};
use shared_models::auth::Role;
use shared_models::page::{Page, PageRequest, SortDirection};

use crate::models::{
    ConsultantError, ConsultantProfile, ConsultantProfileRequest, ConsultantProfileResponse,
    ConsultantSearchParams, NewConsultantProfile, CONSULTANT_PROFILES,
};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

pub fn validate_rate(hourly_rate: f64) -> Result<(), ConsultantError> {
    if !hourly_rate.is_finite() || hourly_rate < 0.0 {
        return Err(ConsultantError::Validation(
            "Hourly rate cannot be negative".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_experience(years: i32) -> Result<(), ConsultantError> {
    if years < 0 {
        return Err(ConsultantError::Validation(
            "Experience years cannot be negative".to_string(),
        ));
    }
    Ok(())
}

pub fn profile_response(
    profile: &ConsultantProfile,
    account: Option<&UserRecord>,
) -> ConsultantProfileResponse {
    ConsultantProfileResponse {
        profile_id: profile.id,
        consultant_id: profile.consultant_id,
        full_name: display_name(account),
        email: account.and_then(|a| a.email.clone()),
        user_image_url: account.and_then(|a| a.image_url.clone()),
        job_title: profile.job_title.clone(),
        introduction: profile.introduction.clone(),
        specialization: profile.specialization.clone(),
        languages: profile.languages.clone(),
        experience_years: profile.experience_years,
        hourly_rate: profile.hourly_rate,
        location: profile.location.clone(),
        details: profile.details.clone(),
        is_available: profile.is_available,
        employment_status: profile.employment_status,
        updated_at: profile.updated_at,
    }
}

pub struct ConsultantProfileService<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> ConsultantProfileService<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    fn by_consultant(consultant_id: i64) -> Query {
        Query::table(CONSULTANT_PROFILES).eq("consultant_id", consultant_id)
    }

    // ==============================================================================
    // OWN PROFILE
    // ==============================================================================

    pub async fn create_profile(
        &self,
        consultant_id: i64,
        request: ConsultantProfileRequest,
    ) -> Result<ConsultantProfileResponse, ConsultantError> {
        debug!("Creating profile for consultant {}", consultant_id);

        let account = find_user_with_role(self.store, consultant_id, Role::Consultant)
            .await?
            .ok_or(ConsultantError::NotAConsultant(consultant_id))?;

        let hourly_rate = request.hourly_rate.unwrap_or(0.0);
        let experience_years = request.experience_years.unwrap_or(0);
        validate_rate(hourly_rate)?;
        validate_experience(experience_years)?;

        if self.find_profile(consultant_id).await?.is_some() {
            return Err(ConsultantError::AlreadyExists(consultant_id));
        }

        let now = Utc::now();
        let profile: ConsultantProfile = insert_as(
            self.store,
            CONSULTANT_PROFILES,
            &NewConsultantProfile {
                consultant_id,
                job_title: request.job_title,
                introduction: request.introduction,
                specialization: request.specialization,
                languages: request.languages,
                experience_years,
                hourly_rate,
                location: request.location,
                details: request.details,
                is_available: request.is_available.unwrap_or(true),
                employment_status: true,
                created_at: now,
                updated_at: now,
            },
        )
        .await?;

        info!("Consultant profile {} created for {}", profile.id, consultant_id);
        Ok(profile_response(&profile, Some(&account)))
    }

    pub async fn update_profile(
        &self,
        consultant_id: i64,
        request: ConsultantProfileRequest,
    ) -> Result<ConsultantProfileResponse, ConsultantError> {
        let current = self.require_profile(consultant_id).await?;

        let mut patch = Map::new();

        if let Some(title) = request.job_title {
            patch.insert("job_title".to_string(), json!(title));
        }
        if let Some(introduction) = request.introduction {
            patch.insert("introduction".to_string(), json!(introduction));
        }
        if let Some(specialization) = request.specialization {
            patch.insert("specialization".to_string(), json!(specialization));
        }
        if let Some(languages) = request.languages {
            patch.insert("languages".to_string(), json!(languages));
        }
        if let Some(years) = request.experience_years {
            validate_experience(years)?;
            patch.insert("experience_years".to_string(), json!(years));
        }
        if let Some(rate) = request.hourly_rate {
            validate_rate(rate)?;
            patch.insert("hourly_rate".to_string(), json!(rate));
        }
        if let Some(location) = request.location {
            patch.insert("location".to_string(), json!(location));
        }
        if let Some(details) = request.details {
            patch.insert("details".to_string(), json!(details));
        }
        if let Some(available) = request.is_available {
            patch.insert("is_available".to_string(), json!(available));
        }

        self.apply_patch(&current, patch).await
    }

    pub async fn delete_profile(&self, consultant_id: i64) -> Result<(), ConsultantError> {
        let removed = self.store.delete(&Self::by_consultant(consultant_id)).await?;
        if removed == 0 {
            return Err(ConsultantError::NotFound);
        }

        info!("Consultant profile of {} deleted", consultant_id);
        Ok(())
    }

    // ==============================================================================
    // LOOKUPS
    // ==============================================================================

    pub async fn find_profile(
        &self,
        consultant_id: i64,
    ) -> Result<Option<ConsultantProfile>, ConsultantError> {
        Ok(find_one_as(self.store, &Self::by_consultant(consultant_id)).await?)
    }

    async fn require_profile(&self, consultant_id: i64) -> Result<ConsultantProfile, ConsultantError> {
        self.find_profile(consultant_id)
            .await?
            .ok_or(ConsultantError::NotFound)
    }

    pub async fn get_profile(
        &self,
        consultant_id: i64,
    ) -> Result<ConsultantProfileResponse, ConsultantError> {
        let profile = self.require_profile(consultant_id).await?;
        let accounts = users_by_ids(self.store, [consultant_id]).await?;
        Ok(profile_response(&profile, accounts.get(&consultant_id)))
    }

    /// Every profile; former employees only when `include_former` is set.
    pub async fn list_profiles(
        &self,
        include_former: bool,
    ) -> Result<Vec<ConsultantProfileResponse>, ConsultantError> {
        let mut query = Query::table(CONSULTANT_PROFILES);
        if !include_former {
            query = query.eq("employment_status", true);
        }
        let profiles: Vec<ConsultantProfile> =
            find_as(self.store, &query.order_by("consultant_id", SortDirection::Asc)).await?;

        self.to_responses(profiles).await
    }

    /// Specialization and consultant-name substring search over employed
    /// consultants.
    pub async fn search(
        &self,
        params: &ConsultantSearchParams,
    ) -> Result<Page<ConsultantProfileResponse>, ConsultantError> {
        let page = PageRequest::new(params.page, params.size, DEFAULT_PAGE_SIZE);

        let mut query = Query::table(CONSULTANT_PROFILES)
            .eq("employment_status", true)
            .contains_opt("specialization", params.specialization.as_deref());

        if params.available_only.unwrap_or(false) {
            query = query.eq("is_available", true);
        }

        if let Some(name) = params.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            let matching: Vec<UserRecord> =
                find_as(self.store, &Query::table(USERS).contains("full_name", name)).await?;
            if matching.is_empty() {
                return Ok(Page::empty(page));
            }
            query = query.is_in("consultant_id", matching.iter().map(|u| u.id));
        }

        let found: Page<ConsultantProfile> = find_page_as(
            self.store,
            &query
                .order_by("experience_years", SortDirection::Desc)
                .order_by("consultant_id", SortDirection::Asc),
            page,
        )
        .await?;

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

    async fn to_responses(
        &self,
        profiles: Vec<ConsultantProfile>,
    ) -> Result<Vec<ConsultantProfileResponse>, ConsultantError> {
        let accounts = users_by_ids(self.store, profiles.iter().map(|p| p.consultant_id)).await?;
        Ok(profiles
            .iter()
            .map(|p| profile_response(p, accounts.get(&p.consultant_id)))
            .collect())
    }

    // ==============================================================================
    // STAFFING
    // ==============================================================================

    pub async fn set_employment_status(
        &self,
        consultant_id: i64,
        employed: bool,
    ) -> Result<ConsultantProfileResponse, ConsultantError> {
        let current = self.require_profile(consultant_id).await?;

        let mut patch = Map::new();
        patch.insert("employment_status".to_string(), json!(employed));
        if !employed {
            // A former employee cannot be booked.
            patch.insert("is_available".to_string(), json!(false));
        }

        let updated = self.apply_patch(&current, patch).await?;
        info!(
            "Employment status of consultant {} set to {}",
            consultant_id, employed
        );
        Ok(updated)
    }

    pub async fn set_hourly_rate(
        &self,
        consultant_id: i64,
        hourly_rate: f64,
    ) -> Result<ConsultantProfileResponse, ConsultantError> {
        if let Err(e) = validate_rate(hourly_rate) {
            warn!("Rejected hourly rate {} for consultant {}", hourly_rate, consultant_id);
            return Err(e);
        }

        let current = self.require_profile(consultant_id).await?;

        let mut patch = Map::new();
        patch.insert("hourly_rate".to_string(), json!(hourly_rate));
        self.apply_patch(&current, patch).await
    }

    async fn apply_patch(
        &self,
        current: &ConsultantProfile,
        mut patch: Map<String, Value>,
    ) -> Result<ConsultantProfileResponse, ConsultantError> {
        patch.insert("updated_at".to_string(), json!(touch(current.updated_at)));

        let updated: ConsultantProfile = update_one_as(
            self.store,
            &Query::table(CONSULTANT_PROFILES).eq("id", current.id),
            Value::Object(patch),
        )
        .await?
        .ok_or(ConsultantError::ConcurrentModification)?;

        debug!("Consultant profile {} updated", updated.id);

        let accounts = users_by_ids(self.store, [updated.consultant_id]).await?;
        Ok(profile_response(&updated, accounts.get(&updated.consultant_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use shared_database::MemoryStore;
    use tokio_test::assert_ok;

    async fn store_with_consultant() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert(
                USERS,
                json!({ "id": 7, "full_name": "Linh Tran", "role": "CONSULTANT" }),
            )
            .await
            .unwrap();
        store
            .insert(USERS, json!({ "id": 1, "full_name": "An Nguyen", "role": "CUSTOMER" }))
            .await
            .unwrap();
        store
    }

    #[test]
    fn test_negative_values_are_rejected() {
        assert_matches!(validate_rate(-1.0), Err(ConsultantError::Validation(_)));
        assert_matches!(validate_rate(f64::NAN), Err(ConsultantError::Validation(_)));
        assert_matches!(validate_experience(-2), Err(ConsultantError::Validation(_)));
        assert_ok!(validate_rate(0.0));
        assert_ok!(validate_experience(0));
    }

    #[tokio::test]
    async fn test_only_consultants_get_profiles() {
        let store = store_with_consultant().await;
        let service = ConsultantProfileService::new(&store);

        assert_matches!(
            service.create_profile(1, ConsultantProfileRequest::default()).await,
            Err(ConsultantError::NotAConsultant(1))
        );

        let created = service
            .create_profile(7, ConsultantProfileRequest::default())
            .await
            .unwrap();
        assert_eq!(created.full_name, "Linh Tran");
        assert!(created.employment_status);
        assert!(created.is_available);

        assert_matches!(
            service.create_profile(7, ConsultantProfileRequest::default()).await,
            Err(ConsultantError::AlreadyExists(7))
        );
    }

    #[tokio::test]
    async fn test_ending_employment_hides_profile_from_listing() {
        let store = store_with_consultant().await;
        let service = ConsultantProfileService::new(&store);
        service
            .create_profile(7, ConsultantProfileRequest::default())
            .await
            .unwrap();

        let updated = service.set_employment_status(7, false).await.unwrap();
        assert!(!updated.employment_status);
        assert!(!updated.is_available);

        assert!(service.list_profiles(false).await.unwrap().is_empty());
        assert_eq!(service.list_profiles(true).await.unwrap().len(), 1);
    }
}
