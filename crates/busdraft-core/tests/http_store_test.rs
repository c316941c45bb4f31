//! HttpConfigStore against a mocked firmware endpoint.

#![cfg(feature = "http")]

use busdraft_core::{to_document, to_draft, ConfigStore, HttpConfigStore, StoreError, TestRequest};

use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_fetch_parses_stored_document() {
    let server = MockServer::start().await;
    let document = json!({
        "version": 1,
        "bus": { "baud": 19200, "serialFormat": "8E1" },
        "devices": []
    });
    Mock::given(method("GET"))
        .and(path("/conf/config.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&document))
        .mount(&server)
        .await;

    let store = HttpConfigStore::new(server.uri());
    let fetched = store.fetch().await.unwrap();
    assert_eq!(fetched, document);
}

#[tokio::test]
async fn test_fetch_maps_http_status_to_communication_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/conf/config.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = HttpConfigStore::new(server.uri());
    let err = store.fetch().await.unwrap_err();
    assert!(matches!(err, StoreError::Communication(_)));
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn test_fetch_maps_bad_body_to_serialization_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/conf/config.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let store = HttpConfigStore::new(server.uri());
    let err = store.fetch().await.unwrap_err();
    assert!(matches!(err, StoreError::Serialization(_)));
}

#[tokio::test]
async fn test_connection_refused_maps_to_connection_error() {
    // nothing listens on this port
    let store = HttpConfigStore::new("http://127.0.0.1:1");
    let err = store.fetch().await.unwrap_err();
    assert!(matches!(err, StoreError::Connection(_)));
}

#[tokio::test]
async fn test_put_sends_document_as_json_body() {
    let server = MockServer::start().await;
    let document = to_document(&to_draft(&json!({
        "bus": { "baud": 9600, "serialFormat": "8N1" },
        "devices": [{ "name": "Boiler", "slaveId": 7, "id": "boiler" }]
    })));

    Mock::given(method("PUT"))
        .and(path("/api/config/modbus"))
        .and(body_json(&document))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = HttpConfigStore::new(server.uri());
    store.put(&document).await.unwrap();
}

#[tokio::test]
async fn test_execute_builds_query_for_read() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/modbus/execute"))
        .and(query_param("devId", "boiler"))
        .and(query_param("dpId", "boiler.flow"))
        .and(query_param("func_code", "3"))
        .and(query_param("addr", "16"))
        .and(query_param("len", "2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "result": { "value": 7, "raw": [7, 0] } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = HttpConfigStore::new(server.uri());
    let request = TestRequest::new("boiler", "boiler.flow", 3, 16, 2);
    let outcome = store.execute(&request).await.unwrap();
    assert_eq!(outcome.value, Some(json!(7)));
    assert_eq!(outcome.raw, vec![7, 0]);
}

#[tokio::test]
async fn test_execute_includes_value_only_for_writes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/modbus/execute"))
        .and(query_param("func_code", "6"))
        .and(query_param("value", "1500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": { "raw": [] } })))
        .expect(1)
        .mount(&server)
        .await;

    let store = HttpConfigStore::new(server.uri());
    let request = TestRequest::new("boiler", "boiler.mode", 6, 200, 1).with_value("1500");
    store.execute(&request).await.unwrap();
}

#[tokio::test]
async fn test_execute_drops_value_for_reads() {
    let server = MockServer::start().await;
    // a read carrying a stale value must not leak it into the query
    Mock::given(method("POST"))
        .and(path("/api/modbus/execute"))
        .and(query_param("func_code", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let store = HttpConfigStore::new(server.uri());
    let request = TestRequest::new("boiler", "boiler.flow", 3, 16, 1).with_value("1500");
    let outcome = store.execute(&request).await.unwrap();
    assert_eq!(outcome.value, None);

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert!(!received[0].url.query().unwrap_or_default().contains("value"));
}
