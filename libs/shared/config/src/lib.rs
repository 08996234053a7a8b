use std::env;
use std::str::FromStr;
use tracing::warn;

/// Which record store backs the services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Supabase,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supabase" => Ok(StorageBackend::Supabase),
            "memory" | "in-memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub supabase_storage_bucket: String,
    pub storage_backend: StorageBackend,
    pub notification_webhook_url: Option<String>,
    pub server_port: u16,
    pub unpaid_booking_ttl_minutes: i64,
    pub cleanup_interval_seconds: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            supabase_storage_bucket: env::var("SUPABASE_STORAGE_BUCKET")
                .unwrap_or_else(|_| "stis-results".to_string()),
            storage_backend: env::var("STORAGE_BACKEND")
                .ok()
                .and_then(|raw| {
                    raw.parse()
                        .map_err(|e| warn!("{}, falling back to supabase", e))
                        .ok()
                })
                .unwrap_or(StorageBackend::Supabase),
            notification_webhook_url: env::var("NOTIFICATION_WEBHOOK_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            server_port: parse_or("SERVER_PORT", 3000),
            unpaid_booking_ttl_minutes: parse_or("UNPAID_BOOKING_TTL_MINUTES", 30),
            cleanup_interval_seconds: parse_or("CLEANUP_INTERVAL_SECONDS", 300),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        let store_ready = match self.storage_backend {
            StorageBackend::Memory => true,
            StorageBackend::Supabase => {
                !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
            }
        };

        store_ready && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_cleanup_enabled(&self) -> bool {
        self.cleanup_interval_seconds > 0 && self.unpaid_booking_ttl_minutes > 0
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_backend_parsing() {
        assert_eq!("memory".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert_eq!("Supabase".parse::<StorageBackend>(), Ok(StorageBackend::Supabase));
        assert!("mongo".parse::<StorageBackend>().is_err());
    }
}
