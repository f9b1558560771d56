//! Shared test helpers for backend integration tests

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fieldsync_core::domain::{Credentials, SessionMaterial};
use fieldsync_remote::{BackendClient, HttpBackend};

pub const SESSION_HEADER: &str = "X-Session-Id";
pub const DEVICE_TOKEN: &str = "device-token-001";
pub const SIGNED_TOKEN: &str = "signed-token-001";

/// Starts a mock server and returns it with a backend pointed at nothing yet
pub async fn setup_backend_mock() -> (MockServer, HttpBackend) {
    let server = MockServer::start().await;
    let client = BackendClient::new(Duration::from_secs(5), SESSION_HEADER)
        .expect("client should build");
    (server, HttpBackend::new(client))
}

/// Session material whose server address is the mock server
pub fn material_for(server: &MockServer) -> SessionMaterial {
    SessionMaterial::new(Some(server.uri()), DEVICE_TOKEN)
}

/// Credentials that target the mock server directly
pub fn credentials_for(server: &MockServer) -> Credentials {
    Credentials::new(server.uri(), SIGNED_TOKEN)
}

/// Wraps a value in a JSON-RPC success envelope
pub fn rpc_result(result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": null, "result": result})
}

/// Mounts `POST /token` answering with the given signed token
pub async fn mount_token(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(rpc_result(json!({"success": true, "token": token}))),
        )
        .mount(server)
        .await;
}

/// Address of a local port nothing listens on
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}
