use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingEventKind {
    Confirmed,
    Rescheduled,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingChannel {
    Consultation,
    Stis,
}

/// Payload handed to calendar sync / notification delivery.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingEvent {
    pub event: BookingEventKind,
    pub channel: BookingChannel,
    pub booking_id: i64,
    pub customer_id: i64,
    pub consultant_id: Option<i64>,
    pub service_id: Option<i64>,
    pub scheduled_at: DateTime<Utc>,
    pub meeting_link: Option<String>,
}

#[async_trait]
pub trait BookingNotifier: Send + Sync {
    async fn publish(&self, event: &BookingEvent) -> Result<()>;
}

/// Delivery failures never fail the booking operation.
pub async fn notify(notifier: &dyn BookingNotifier, event: BookingEvent) {
    if let Err(e) = notifier.publish(&event).await {
        warn!(
            "Failed to deliver {:?} for booking {}: {}",
            event.event, event.booking_id, e
        );
    }
}

pub struct LogNotifier;

#[async_trait]
impl BookingNotifier for LogNotifier {
    async fn publish(&self, event: &BookingEvent) -> Result<()> {
        info!(
            "Booking {} {:?} for {}",
            event.booking_id, event.event, event.scheduled_at
        );
        Ok(())
    }
}

pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl BookingNotifier for WebhookNotifier {
    async fn publish(&self, event: &BookingEvent) -> Result<()> {
        let response = self.client.post(&self.url).json(event).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("webhook answered {}", response.status()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn event() -> BookingEvent {
        BookingEvent {
            event: BookingEventKind::Confirmed,
            channel: BookingChannel::Consultation,
            booking_id: 3,
            customer_id: 1,
            consultant_id: Some(2),
            service_id: None,
            scheduled_at: Utc::now(),
            meeting_link: None,
        }
    }

    #[tokio::test]
    async fn test_webhook_posts_event() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/bookings"))
            .and(body_partial_json(json!({ "event": "CONFIRMED", "bookingId": 3 })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let notifier = WebhookNotifier::new(&format!("{}/hooks/bookings", mock_server.uri()));
        notifier.publish(&event()).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_delivery_is_swallowed() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let notifier = WebhookNotifier::new(&mock_server.uri());
        assert!(notifier.publish(&event()).await.is_err());
        notify(&notifier, event()).await;
    }
}
