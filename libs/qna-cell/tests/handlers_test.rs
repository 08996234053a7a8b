use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use qna_cell::router::question_routes;
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

struct Board {
    app: TestApp,
    router: Router,
    customer: TestUser,
    other_customer: TestUser,
    consultant: TestUser,
    other_consultant: TestUser,
    staff: TestUser,
}

async fn board() -> Board {
    let customer = TestUser::customer(1);
    let other_customer = TestUser::customer(2);
    let consultant = TestUser::consultant(7);
    let other_consultant = TestUser::consultant(8);
    let staff = TestUser::staff(20);

    let app = TestApp::with_users(&[
        &customer,
        &other_customer,
        &consultant,
        &other_consultant,
        &staff,
    ])
    .await;
    let router = question_routes(app.state.clone());

    Board {
        app,
        router,
        customer,
        other_customer,
        consultant,
        other_consultant,
        staff,
    }
}

impl Board {
    async fn ask(&self, who: &TestUser, title: &str, consultant_id: Option<i64>) -> (StatusCode, Value) {
        let bearer = self.app.bearer(who);
        send(
            &self.router,
            "POST",
            "/",
            Some(&bearer),
            Some(json!({
                "title": title,
                "content": "Is it normal to have a shorter cycle after stopping the pill?",
                "consultantId": consultant_id,
            })),
        )
        .await
    }

    async fn answer(&self, who: &TestUser, question_id: i64) -> (StatusCode, Value) {
        let bearer = self.app.bearer(who);
        send(
            &self.router,
            "PUT",
            &format!("/{}/answer", question_id),
            Some(&bearer),
            Some(json!({ "answer": "Yes, it usually settles within three months." })),
        )
        .await
    }
}

#[tokio::test]
async fn test_question_is_asked_and_answered() {
    let board = board().await;

    let (status, asked) = board.ask(&board.customer, "Cycle after the pill", Some(7)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(asked["data"]["status"], "PENDING");
    assert_eq!(asked["data"]["customerName"], "Customer 1");
    assert_eq!(asked["data"]["consultantName"], "Consultant 7");
    let question_id = asked["data"]["questionId"].as_i64().unwrap();

    let (status, _) = board.answer(&board.other_consultant, question_id).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, answered) = board.answer(&board.consultant, question_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(answered["data"]["status"], "ANSWERED");
    assert_eq!(answered["data"]["answeredByName"], "Consultant 7");
    assert_ne!(answered["data"]["answeredAt"], Value::Null);

    let (status, again) = board.answer(&board.staff, question_id).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(again["errorCode"], "CONFLICT");

    let (status, public) = send(&board.router, "GET", &format!("/{}", question_id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(public["data"]["answer"], "Yes, it usually settles within three months.");
}

#[tokio::test]
async fn test_only_customers_ask_and_consultant_must_exist() {
    let board = board().await;

    let (status, _) = board.ask(&board.consultant, "Question", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = board.ask(&board.customer, "Question", Some(2)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = board.ask(&board.customer, "   ", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_listing_filters_and_soft_delete() {
    let board = board().await;

    let (_, first) = board.ask(&board.customer, "First", None).await;
    let (_, second) = board.ask(&board.customer, "Second", None).await;
    board.ask(&board.other_customer, "Third", None).await;
    let first_id = first["data"]["questionId"].as_i64().unwrap();
    let second_id = second["data"]["questionId"].as_i64().unwrap();

    board.answer(&board.consultant, first_id).await;

    let (_, all) = send(&board.router, "GET", "/", None, None).await;
    assert_eq!(all["data"]["totalElements"], 3);
    assert_eq!(all["data"]["content"][0]["title"], "Third");

    let (_, answered) = send(&board.router, "GET", "/?status=answered", None, None).await;
    assert_eq!(answered["data"]["totalElements"], 1);
    assert_eq!(answered["data"]["content"][0]["questionId"], first_id);

    let (status, bad) = send(&board.router, "GET", "/?status=OPEN", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(bad["errorCode"], "VALIDATION_ERROR");

    let (_, paged) = send(&board.router, "GET", "/?size=2&page=1", None, None).await;
    assert_eq!(paged["data"]["totalPages"], 2);
    assert_eq!(paged["data"]["content"].as_array().map(Vec::len), Some(1));

    let other = board.app.bearer(&board.other_customer);
    let uri = format!("/{}", second_id);
    let (status, _) = send(&board.router, "DELETE", &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let owner = board.app.bearer(&board.customer);
    let (status, _) = send(&board.router, "DELETE", &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&board.router, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, mine) = send(&board.router, "GET", "/mine", Some(&owner), None).await;
    assert_eq!(mine["data"]["totalElements"], 1);
    assert_eq!(mine["data"]["content"][0]["questionId"], first_id);
}
