use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_config::{AppConfig, StorageBackend};
use shared_database::{FileStorage, Query, RecordStore, SupabaseClient, SupabaseFileStorage};
use shared_models::page::{PageRequest, SortDirection};
use std::sync::Arc;

fn config_for(server: &MockServer) -> AppConfig {
    AppConfig {
        supabase_url: server.uri(),
        supabase_anon_key: "anon-key".to_string(),
        supabase_jwt_secret: "secret".to_string(),
        supabase_storage_bucket: "stis-results".to_string(),
        storage_backend: StorageBackend::Supabase,
        notification_webhook_url: None,
        server_port: 0,
        unpaid_booking_ttl_minutes: 30,
        cleanup_interval_seconds: 0,
    }
}

#[tokio::test]
async fn test_find_page_sends_window_and_reads_content_range() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/stis_bookings"))
        .and(query_param("customer_id", "eq.4"))
        .and(query_param("order", "created_at.desc"))
        .and(query_param("limit", "5"))
        .and(query_param("offset", "5"))
        .and(header("prefer", "count=exact"))
        .and(header("apikey", "anon-key"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "5-5/6")
                .set_body_json(json!([{ "id": 1, "customer_id": 4 }])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = SupabaseClient::new(&config_for(&mock_server));
    let query = Query::table("stis_bookings")
        .eq("customer_id", 4)
        .order_by("created_at", SortDirection::Desc);

    let page = client
        .find_page(&query, PageRequest::new(Some(1), Some(5), 5))
        .await
        .unwrap();

    assert_eq!(page.total_elements, 6);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.content.len(), 1);
}

#[tokio::test]
async fn test_insert_asks_for_representation() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/questions"))
        .and(header("prefer", "return=representation"))
        .and(body_json(json!({ "title": "Cycle" })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!([{ "id": 12, "title": "Cycle" }])),
        )
        .mount(&mock_server)
        .await;

    let client = SupabaseClient::new(&config_for(&mock_server));
    let row = client.insert("questions", json!({ "title": "Cycle" })).await.unwrap();

    assert_eq!(row["id"], 12);
}

#[tokio::test]
async fn test_delete_is_filtered_and_counts_removed_rows() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/consultant_profiles"))
        .and(query_param("consultant_id", "eq.7"))
        .and(header("prefer", "return=representation"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "id": 3, "consultant_id": 7 }])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = SupabaseClient::new(&config_for(&mock_server));
    let removed = client
        .delete(&Query::table("consultant_profiles").eq("consultant_id", 7))
        .await
        .unwrap();

    assert_eq!(removed, 1);
}

#[tokio::test]
async fn test_upstream_error_is_surfaced() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let client = SupabaseClient::new(&config_for(&mock_server));
    let result = client.find(&Query::table("users").eq("id", 1)).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_pdf_upload_returns_public_url() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/storage/v1/object/stis-results/bookings/3/result.pdf"))
        .and(header("content-type", "application/pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Key": "ok" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Arc::new(SupabaseClient::new(&config_for(&mock_server)));
    let storage = SupabaseFileStorage::new(client, "stis-results");

    let url = storage
        .upload("bookings/3/result.pdf", b"%PDF-1.4".to_vec(), "application/pdf")
        .await
        .unwrap();

    assert_eq!(
        url,
        format!(
            "{}/storage/v1/object/public/stis-results/bookings/3/result.pdf",
            mock_server.uri()
        )
    );
}
