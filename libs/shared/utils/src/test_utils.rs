use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use tokio::sync::Mutex;

use shared_config::{AppConfig, StorageBackend};
use shared_database::{MemoryFileStorage, MemoryStore, RecordStore};
use shared_models::auth::{Role, User};

use crate::notify::{BookingEvent, BookingNotifier};
use crate::state::AppState;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            supabase_storage_bucket: "stis-results".to_string(),
            storage_backend: StorageBackend::Memory,
            notification_webhook_url: None,
            server_port: 0,
            unpaid_booking_ttl_minutes: 30,
            cleanup_interval_seconds: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    pub role: Role,
}

impl TestUser {
    pub fn new(id: i64, full_name: &str, role: Role) -> Self {
        Self {
            id,
            email: format!("user{}@example.com", id),
            full_name: full_name.to_string(),
            role,
        }
    }

    pub fn customer(id: i64) -> Self {
        Self::new(id, &format!("Customer {}", id), Role::Customer)
    }

    pub fn consultant(id: i64) -> Self {
        Self::new(id, &format!("Consultant {}", id), Role::Consultant)
    }

    pub fn staff(id: i64) -> Self {
        Self::new(id, &format!("Staff {}", id), Role::Staff)
    }

    pub fn manager(id: i64) -> Self {
        Self::new(id, &format!("Manager {}", id), Role::Manager)
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            email: Some(self.email.clone()),
            roles: vec![self.role],
            created_at: Some(Utc::now()),
        }
    }

    /// Row for the `users` table owned by the account service.
    pub fn to_row(&self) -> Value {
        json!({
            "id": self.id,
            "full_name": self.full_name,
            "email": self.email,
            "phone": null,
            "image_url": null,
            "role": self.role.to_string(),
        })
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.email,
            "userID": user.id,
            "email": user.email,
            "role": format!("ROLE_{}", user.role),
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Keeps every published event for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<BookingEvent>>,
}

impl RecordingNotifier {
    pub async fn events(&self) -> Vec<BookingEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl BookingNotifier for RecordingNotifier {
    async fn publish(&self, event: &BookingEvent) -> anyhow::Result<()> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

/// In-memory application state plus handles to its collaborators.
pub struct TestApp {
    pub config: TestConfig,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub files: Arc<MemoryFileStorage>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    pub fn new() -> Self {
        let config = TestConfig::default();
        let store = Arc::new(MemoryStore::new());
        let files = Arc::new(MemoryFileStorage::new());
        let notifier = Arc::new(RecordingNotifier::default());

        let state = Arc::new(AppState::new(
            config.to_app_config(),
            store.clone(),
            files.clone(),
            notifier.clone(),
        ));

        Self {
            config,
            state,
            store,
            files,
            notifier,
        }
    }

    pub async fn with_users(users: &[&TestUser]) -> Self {
        let app = Self::new();
        for user in users {
            app.store
                .insert("users", user.to_row())
                .await
                .expect("seeding users into the memory store");
        }
        app
    }

    pub fn bearer(&self, user: &TestUser) -> String {
        format!(
            "Bearer {}",
            JwtTestUtils::create_test_token(user, &self.config.jwt_secret, Some(1))
        )
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let app_config = TestConfig::default().to_app_config();

        assert_eq!(app_config.storage_backend, StorageBackend::Memory);
        assert!(!app_config.supabase_jwt_secret.is_empty());
        assert!(!app_config.is_cleanup_enabled());
    }

    #[test]
    fn test_user_row_carries_role_name() {
        let consultant = TestUser::consultant(7);
        assert_eq!(consultant.to_row()["role"], "CONSULTANT");
        assert_eq!(consultant.to_user().roles, vec![Role::Consultant]);
    }

    #[test]
    fn test_jwt_token_creation() {
        let token = JwtTestUtils::create_test_token(&TestUser::customer(1), "test-secret", Some(1));
        assert_eq!(token.split('.').count(), 3);
    }
}
