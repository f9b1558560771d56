//! Integration tests for submissions and outcome classification

use serde_json::{json, Map};
use wiremock::matchers::{bearer_token, body_partial_json, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use fieldsync_core::domain::{Credentials, LocalId, NetworkCause, RemoteOperationResult};
use fieldsync_core::ports::{Endpoint, IRemoteBackend, RemoteRequest};

use crate::common;

fn create_request() -> RemoteRequest {
    let mut data = Map::new();
    data.insert("name".into(), json!("Dock 4 receipt"));
    data.insert("partner_id".into(), json!(12));
    RemoteRequest::new(Endpoint::Create, "stock.receipt.create", data)
}

fn update_request(record_id: i64) -> RemoteRequest {
    let mut data = Map::new();
    data.insert("qty".into(), json!(7));
    RemoteRequest::new(
        Endpoint::Update {
            record_id: LocalId::Server(record_id),
            model: "stock.lot".into(),
        },
        "stock.lot.count",
        data,
    )
}

#[tokio::test]
async fn test_create_success_returns_server_id() {
    let (server, backend) = common::setup_backend_mock().await;

    Mock::given(method("POST"))
        .and(path("/create_unified"))
        .and(bearer_token(common::SIGNED_TOKEN))
        .and(body_partial_json(json!({
            "jsonrpc": "2.0",
            "method": "call",
            "params": {
                "type": "stock.receipt.create",
                "data": {"name": "Dock 4 receipt", "partner_id": 12}
            }
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::rpc_result(json!({"success": true, "id": 501}))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let outcome = backend
        .submit(&common::credentials_for(&server), &create_request())
        .await;

    match outcome {
        RemoteOperationResult::Success { server_id, .. } => assert_eq!(server_id, Some(501)),
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn test_update_targets_record_with_entity_type() {
    let (server, backend) = common::setup_backend_mock().await;

    Mock::given(method("POST"))
        .and(path("/update_unified/77"))
        .and(query_param("entity_type", "stock.lot"))
        .and(body_partial_json(json!({"params": {"type": "stock.lot.count"}})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(common::rpc_result(json!({"success": true}))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let outcome = backend
        .submit(&common::credentials_for(&server), &update_request(77))
        .await;

    assert!(outcome.is_success());
}

#[tokio::test]
async fn test_business_rejection() {
    let (server, backend) = common::setup_backend_mock().await;

    Mock::given(method("POST"))
        .and(path("/create_unified"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::rpc_result(
            json!({"success": false, "message": "insufficient stock"}),
        )))
        .mount(&server)
        .await;

    let outcome = backend
        .submit(&common::credentials_for(&server), &create_request())
        .await;

    match outcome {
        RemoteOperationResult::BusinessRejection { message, .. } => {
            assert_eq!(message, "insufficient stock")
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_validation_error_envelope_is_rejection() {
    let (server, backend) = common::setup_backend_mock().await;

    Mock::given(method("POST"))
        .and(path("/create_unified"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "error": {
                "code": 200,
                "message": "Server Error",
                "data": {"name": "ValidationError", "message": "Lot number already exists"}
            }
        })))
        .mount(&server)
        .await;

    let outcome = backend
        .submit(&common::credentials_for(&server), &create_request())
        .await;

    assert!(!outcome.is_retryable());
    match outcome {
        RemoteOperationResult::BusinessRejection { message, .. } => {
            assert_eq!(message, "Lot number already exists")
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_service_unavailable_is_network_failure() {
    let (server, backend) = common::setup_backend_mock().await;

    Mock::given(method("POST"))
        .and(path("/create_unified"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let outcome = backend
        .submit(&common::credentials_for(&server), &create_request())
        .await;

    assert!(outcome.is_retryable());
    match outcome {
        RemoteOperationResult::NetworkFailure { cause, .. } => {
            assert_eq!(cause, NetworkCause::ServerStatus(503))
        }
        other => panic!("expected network failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_session_expired_is_network_failure() {
    let (server, backend) = common::setup_backend_mock().await;

    Mock::given(method("POST"))
        .and(path("/create_unified"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "error": {"code": 100, "message": "Session expired"}
        })))
        .mount(&server)
        .await;

    let outcome = backend
        .submit(&common::credentials_for(&server), &create_request())
        .await;

    match outcome {
        RemoteOperationResult::NetworkFailure { cause, .. } => {
            assert_eq!(cause, NetworkCause::SessionExpired)
        }
        other => panic!("expected network failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_connection_refused_is_network_failure() {
    let (_server, backend) = common::setup_backend_mock().await;

    let credentials = Credentials::new(common::closed_port_url(), common::SIGNED_TOKEN);
    let outcome = backend.submit(&credentials, &create_request()).await;

    assert!(outcome.is_retryable());
    assert!(matches!(outcome, RemoteOperationResult::NetworkFailure { .. }));
}

#[tokio::test]
async fn test_html_body_on_success_status_is_network_failure() {
    let (server, backend) = common::setup_backend_mock().await;

    Mock::given(method("POST"))
        .and(path("/create_unified"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy login</html>"))
        .mount(&server)
        .await;

    let outcome = backend
        .submit(&common::credentials_for(&server), &create_request())
        .await;

    match outcome {
        RemoteOperationResult::NetworkFailure { cause, .. } => {
            assert_eq!(cause, NetworkCause::MalformedResponse)
        }
        other => panic!("expected network failure, got {other:?}"),
    }
}
