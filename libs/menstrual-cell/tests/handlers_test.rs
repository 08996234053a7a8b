use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use menstrual_cell::router::menstrual_routes;
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
    let body = match body {
        Some(value) => Body::from(value.to_string()),
        None => Body::empty(),
    };

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

struct Tracker {
    app: TestApp,
    router: Router,
    customer: TestUser,
    other_customer: TestUser,
    consultant: TestUser,
}

async fn tracker() -> Tracker {
    let customer = TestUser::customer(1);
    let other_customer = TestUser::customer(2);
    let consultant = TestUser::consultant(7);

    let app = TestApp::with_users(&[&customer, &other_customer, &consultant]).await;
    let router = menstrual_routes(app.state.clone());

    Tracker {
        app,
        router,
        customer,
        other_customer,
        consultant,
    }
}

impl Tracker {
    async fn record(&self, who: &TestUser, start: &str, end: &str, length: i32) -> (StatusCode, Value) {
        let bearer = self.app.bearer(who);
        send(
            &self.router,
            "POST",
            "/cycles",
            Some(&bearer),
            Some(json!({ "startDate": start, "endDate": end, "cycleLength": length })),
        )
        .await
    }
}

#[tokio::test]
async fn test_calendar_follows_latest_cycle() {
    let tracker = tracker().await;
    let bearer = tracker.app.bearer(&tracker.customer);

    let (status, _) = send(&tracker.router, "GET", "/calendar/me", Some(&bearer), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    tracker.record(&tracker.customer, "2026-08-04", "2026-08-08", 28).await;
    let (status, latest) = tracker.record(&tracker.customer, "2026-09-01", "2026-09-05", 28).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(latest["data"]["periodDays"], 5);

    let (status, calendar) = send(&tracker.router, "GET", "/calendar/me", Some(&bearer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(calendar["data"]["cycleId"], latest["data"]["cycleId"]);

    let cycles = calendar["data"]["cycles"].as_array().unwrap();
    assert_eq!(cycles.len(), 3);
    assert_eq!(cycles[0]["periodStart"], "2026-09-29");
    assert_eq!(cycles[0]["periodEnd"], "2026-10-03");
    assert_eq!(cycles[0]["ovulationDate"], "2026-10-13");
    assert_eq!(cycles[0]["fertileStart"], "2026-10-08");
    assert_eq!(cycles[0]["fertileEnd"], "2026-10-14");
    assert_eq!(cycles[2]["periodStart"], "2026-11-24");

    let (_, listed) = send(&tracker.router, "GET", "/cycles", Some(&bearer), None).await;
    assert_eq!(listed["data"][0]["startDate"], "2026-09-01");
    assert_eq!(listed["data"][1]["startDate"], "2026-08-04");
}

#[tokio::test]
async fn test_invalid_cycles_are_rejected() {
    let tracker = tracker().await;

    let (status, body) = tracker.record(&tracker.customer, "2026-09-05", "2026-09-01", 28).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "VALIDATION_ERROR");

    let (status, _) = tracker.record(&tracker.customer, "2026-09-01", "2026-09-05", 50).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cycles_are_private_to_their_owner() {
    let tracker = tracker().await;
    let (_, created) = tracker.record(&tracker.customer, "2026-09-01", "2026-09-05", 30).await;
    let cycle_id = created["data"]["cycleId"].as_i64().unwrap();
    let uri = format!("/cycles/{}", cycle_id);

    let other = tracker.app.bearer(&tracker.other_customer);
    let (status, _) = send(&tracker.router, "GET", &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&tracker.router, "DELETE", &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = tracker.record(&tracker.consultant, "2026-09-01", "2026-09-05", 30).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let owner = tracker.app.bearer(&tracker.customer);
    let (status, updated) = send(
        &tracker.router,
        "PUT",
        &uri,
        Some(&owner),
        Some(json!({ "startDate": "2026-09-02", "endDate": "2026-09-07", "cycleLength": 31, "note": "late" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["data"]["cycleLength"], 31);
    assert_eq!(updated["data"]["periodDays"], 6);

    let (status, _) = send(&tracker.router, "DELETE", &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&tracker.router, "GET", "/cycles/latest", Some(&owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
