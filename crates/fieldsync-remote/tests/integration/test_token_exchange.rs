//! Integration tests for the credential exchange

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use fieldsync_core::domain::SessionMaterial;
use fieldsync_core::ports::{CredentialError, IRemoteBackend};

use crate::common;

#[tokio::test]
async fn test_exchange_sends_session_header() {
    let (server, backend) = common::setup_backend_mock().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(header(common::SESSION_HEADER, common::DEVICE_TOKEN))
        .and(body_partial_json(json!({"jsonrpc": "2.0", "method": "call"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::rpc_result(
            json!({"success": true, "token": "fresh-token"}),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let credentials = backend
        .exchange_credentials(&common::material_for(&server))
        .await
        .expect("exchange should succeed");

    assert_eq!(credentials.token, "fresh-token");
    assert_eq!(credentials.endpoint, server.uri());
}

#[tokio::test]
async fn test_exchange_strips_trailing_slash() {
    let (server, backend) = common::setup_backend_mock().await;
    common::mount_token(&server, "t").await;

    let material = SessionMaterial::new(Some(format!("{}/", server.uri())), common::DEVICE_TOKEN);
    let credentials = backend.exchange_credentials(&material).await.unwrap();

    assert_eq!(credentials.endpoint, server.uri());
}

#[tokio::test]
async fn test_exchange_refused_by_backend() {
    let (server, backend) = common::setup_backend_mock().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::rpc_result(
            json!({"success": false, "message": "device revoked"}),
        )))
        .mount(&server)
        .await;

    let err = backend
        .exchange_credentials(&common::material_for(&server))
        .await
        .unwrap_err();

    assert_eq!(err, CredentialError::Rejected("device revoked".into()));
}

#[tokio::test]
async fn test_exchange_server_error_is_network() {
    let (server, backend) = common::setup_backend_mock().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let err = backend
        .exchange_credentials(&common::material_for(&server))
        .await
        .unwrap_err();

    assert!(matches!(err, CredentialError::Network(_)));
}

#[tokio::test]
async fn test_exchange_unreachable_server_is_network() {
    let (_server, backend) = common::setup_backend_mock().await;

    let material = SessionMaterial::new(Some(common::closed_port_url()), common::DEVICE_TOKEN);
    let err = backend.exchange_credentials(&material).await.unwrap_err();

    assert!(matches!(err, CredentialError::Network(_)));
}

#[tokio::test]
async fn test_exchange_without_server_is_unavailable() {
    let (server, backend) = common::setup_backend_mock().await;

    let material = SessionMaterial::new(Some("   ".into()), common::DEVICE_TOKEN);
    let err = backend.exchange_credentials(&material).await.unwrap_err();

    assert_eq!(err, CredentialError::Unavailable);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}
