use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, DurationRound, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use stis_cell::router::{
    stis_booking_routes, stis_feedback_routes, stis_result_routes, stis_service_routes,
};
use stis_cell::services::booking::StisBookingService;
use shared_utils::test_utils::{TestApp, TestUser};

async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(bearer) = bearer {
        request = request.header("authorization", bearer);
    }
    let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);

    let response = router
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Ten past a clock hour at least two hours out, so nearby bookings share a slot.
fn slot_time() -> DateTime<Utc> {
    (Utc::now() + Duration::hours(3))
        .duration_trunc(Duration::hours(1))
        .unwrap()
        + Duration::minutes(10)
}

struct Lab {
    app: TestApp,
    router: Router,
    customer: TestUser,
    other_customer: TestUser,
    staff: TestUser,
}

impl Lab {
    async fn new() -> Self {
        let customer = TestUser::customer(1);
        let other_customer = TestUser::customer(2);
        let staff = TestUser::staff(30);
        let app = TestApp::with_users(&[&customer, &other_customer, &staff]).await;

        let router = Router::new()
            .nest("/api/stis-services", stis_service_routes(app.state.clone()))
            .nest("/api/stis-bookings", stis_booking_routes(app.state.clone()))
            .nest("/api/stis-results", stis_result_routes(app.state.clone()))
            .nest("/api/stis-feedback", stis_feedback_routes(app.state.clone()));

        Self {
            app,
            router,
            customer,
            other_customer,
            staff,
        }
    }

    async fn as_user(&self, user: &TestUser, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let bearer = self.app.bearer(user);
        send(&self.router, method, uri, Some(&bearer), body).await
    }

    async fn create_service(&self, max_per_slot: i32) -> i64 {
        let (status, body) = self
            .as_user(
                &self.staff,
                "POST",
                "/api/stis-services",
                Some(json!({
                    "serviceName": "HIV combo test",
                    "description": "Antigen and antibody",
                    "price": 250000.0,
                    "duration": "30 minutes",
                    "tests": "HIV-1, HIV-2",
                    "type": "SINGLE",
                    "maxBookingsPerSlot": max_per_slot,
                    "discount": 10,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["data"]["serviceId"].as_i64().unwrap()
    }

    async fn book(&self, who: &TestUser, service_id: i64, at: DateTime<Utc>, method: &str) -> (StatusCode, Value) {
        self.as_user(
            who,
            "POST",
            "/api/stis-bookings",
            Some(json!({
                "serviceId": service_id,
                "bookingDate": at,
                "paymentMethod": method,
            })),
        )
        .await
    }
}

#[tokio::test]
async fn test_booking_to_result_to_feedback() {
    let lab = Lab::new().await;
    let service_id = lab.create_service(1).await;
    let at = slot_time();

    let (status, created) = lab.book(&lab.customer, service_id, at, "VNPAY").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["data"]["status"], "PENDING");
    assert_eq!(created["data"]["serviceName"], "HIV combo test");
    assert_eq!(created["data"]["amount"], 0.0);
    assert_eq!(created["data"]["paymentMethod"], Value::Null);
    assert_eq!(created["data"]["preferredPaymentMethod"], "VNPAY");
    let booking_id = created["data"]["bookingId"].as_i64().unwrap();

    let (status, full) = lab
        .book(&lab.other_customer, service_id, at + Duration::minutes(20), "VNPAY")
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(full["errorCode"], "SLOT_FULL");

    let limit_uri = format!(
        "/api/stis-bookings/check-limit?serviceId={}&bookingDate={}",
        service_id,
        urlencode(&at.to_rfc3339())
    );
    let (status, limit) = lab.as_user(&lab.customer, "GET", &limit_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(limit["data"]["booked"], 1);
    assert_eq!(limit["data"]["available"], false);

    // No result before testing has started.
    let pdf = STANDARD.encode(b"%PDF-1.4\n1 0 obj\n");
    let result_body = json!({
        "resultText": "HIV-1/2 non-reactive",
        "resultStatus": "NORMAL",
        "pdfBase64": pdf,
    });
    let result_uri = format!("/api/stis-results/return/{}", booking_id);
    let (status, early) = lab
        .as_user(&lab.staff, "POST", &result_uri, Some(result_body.clone()))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(early["errorCode"], "INVALID_TRANSITION");

    for step in ["mark-confirmed", "mark-pending-test-result"] {
        let (status, _) = lab
            .as_user(&lab.staff, "PUT", &format!("/api/stis-bookings/{}/{}", booking_id, step), None)
            .await;
        assert_eq!(status, StatusCode::OK, "{}", step);
    }

    let (status, result) = lab
        .as_user(&lab.staff, "POST", &result_uri, Some(result_body))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let pdf_url = result["data"]["pdfUrl"].as_str().unwrap().to_string();
    let object_path = pdf_url.trim_start_matches("memory://");
    let (content_type, bytes) = lab.app.files.get(object_path).await.unwrap();
    assert_eq!(content_type, "application/pdf");
    assert!(bytes.starts_with(b"%PDF-"));

    let by_booking = format!("/api/stis-results/by-booking/{}", booking_id);
    let (status, own) = lab.as_user(&lab.customer, "GET", &by_booking, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(own["data"]["resultStatus"], "NORMAL");
    let (status, _) = lab.as_user(&lab.other_customer, "GET", &by_booking, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, completed) = lab
        .as_user(
            &lab.staff,
            "PUT",
            &format!("/api/stis-bookings/{}/mark-completed", booking_id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["data"]["status"], "COMPLETED");
    assert_eq!(completed["data"]["resultStatus"], "NORMAL");

    let feedback_uri = format!("/api/stis-bookings/{}/feedback", booking_id);
    let (status, _) = lab
        .as_user(&lab.customer, "POST", &feedback_uri, Some(json!({ "rating": 4 })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = lab
        .as_user(&lab.customer, "POST", &feedback_uri, Some(json!({ "rating": 5 })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, summary) = send(
        &lab.router,
        "GET",
        &format!("/api/stis-feedback/service/{}/summary", service_id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["data"]["totalFeedback"], 1);
    assert_eq!(summary["data"]["averageRating"], 4.0);
}

#[tokio::test]
async fn test_pending_test_result_is_stis_only_and_deleted_is_final() {
    let lab = Lab::new().await;
    let service_id = lab.create_service(3).await;
    let (_, created) = lab.book(&lab.customer, service_id, slot_time(), "VNPAY").await;
    let booking_id = created["data"]["bookingId"].as_i64().unwrap();

    let (status, deleted) = lab
        .as_user(&lab.staff, "DELETE", &format!("/api/stis-bookings/{}", booking_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["data"]["status"], "DELETED");

    for step in ["mark-cancelled", "mark-confirmed"] {
        let (status, body) = lab
            .as_user(&lab.staff, "PUT", &format!("/api/stis-bookings/{}/{}", booking_id, step), None)
            .await;
        assert_eq!(status, StatusCode::CONFLICT, "{}", step);
        assert_eq!(body["errorCode"], "INVALID_TRANSITION");
    }
}

#[tokio::test]
async fn test_inactive_services_cannot_be_booked() {
    let lab = Lab::new().await;
    let service_id = lab.create_service(2).await;

    let (status, _) = lab
        .as_user(&lab.staff, "DELETE", &format!("/api/stis-services/{}", service_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, catalogue) = send(&lab.router, "GET", "/api/stis-services", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(catalogue["data"], json!([]));

    let (status, body) = lab.book(&lab.customer, service_id, slot_time(), "VNPAY").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "SERVICE_INACTIVE");
}

#[tokio::test]
async fn test_history_defaults_to_five_newest_first() {
    let lab = Lab::new().await;
    let service_id = lab.create_service(10).await;

    for day in 1..=6 {
        let (status, _) = lab
            .book(&lab.customer, service_id, slot_time() + Duration::days(day), "VNPAY")
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, history) = lab
        .as_user(&lab.customer, "GET", "/api/stis-bookings/history", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["data"]["totalElements"], 6);
    assert_eq!(history["data"]["totalPages"], 2);
    assert_eq!(history["data"]["size"], 5);

    let content = history["data"]["content"].as_array().unwrap();
    assert_eq!(content.len(), 5);
    let ids: Vec<i64> = content.iter().map(|b| b["bookingId"].as_i64().unwrap()).collect();
    let mut newest_first = ids.clone();
    newest_first.sort_by(|a, b| b.cmp(a));
    assert_eq!(ids, newest_first);

    let (status, filtered) = lab
        .as_user(&lab.customer, "GET", "/api/stis-bookings/history?serviceId=999", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(filtered["data"]["totalElements"], 0);
}

#[tokio::test]
async fn test_stale_unpaid_sweep_spares_cash_bookings() {
    let lab = Lab::new().await;
    let service_id = lab.create_service(5).await;

    let (_, online) = lab.book(&lab.customer, service_id, slot_time(), "VNPAY").await;
    let (_, cash) = lab.book(&lab.other_customer, service_id, slot_time(), "CASH").await;

    let expired = StisBookingService::new(&lab.app.state)
        .expire_unpaid(Utc::now() + Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(expired, 1);

    let id_of = |body: &Value| body["data"]["bookingId"].as_i64().unwrap();
    let (_, online_now) = lab
        .as_user(&lab.staff, "GET", &format!("/api/stis-bookings/{}", id_of(&online)), None)
        .await;
    let (_, cash_now) = lab
        .as_user(&lab.staff, "GET", &format!("/api/stis-bookings/{}", id_of(&cash)), None)
        .await;
    assert_eq!(online_now["data"]["status"], "FAILED_PAYMENT");
    assert_eq!(cash_now["data"]["status"], "PENDING");
}

fn urlencode(raw: &str) -> String {
    raw.replace('+', "%2B").replace(':', "%3A")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_fill_a_single_slot_once() {
    let lab = Lab::new().await;
    let service_id = lab.create_service(1).await;
    let bearer = lab.app.bearer(&lab.customer);
    let at = slot_time();

    let attempts: Vec<_> = (0..6)
        .map(|minute| {
            let router = lab.router.clone();
            let bearer = bearer.clone();
            let body = json!({
                "serviceId": service_id,
                "bookingDate": at + Duration::minutes(minute * 5),
                "paymentMethod": "VNPAY",
            });
            tokio::spawn(async move {
                send(&router, "POST", "/api/stis-bookings", Some(&bearer), Some(body)).await
            })
        })
        .collect();

    let mut created = 0;
    for attempt in attempts {
        let (status, body) = attempt.await.unwrap();
        match status {
            StatusCode::CREATED => created += 1,
            StatusCode::CONFLICT => assert_eq!(body["errorCode"], "SLOT_FULL"),
            other => panic!("unexpected status {}: {}", other, body),
        }
    }
    assert_eq!(created, 1);
}
