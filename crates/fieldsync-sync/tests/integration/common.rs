//! Shared fixtures for the pipeline tests

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use fieldsync_cache::{DatabasePool, SqliteStore};
use fieldsync_core::domain::{
    ConnectorSession, FieldMap, LocalId, LocalRecord, PendingOperation, SessionMaterial,
};
use fieldsync_core::ports::ILocalStore;
use fieldsync_mapping::warehouse_registry;
use fieldsync_remote::{BackendClient, HttpBackend};
use fieldsync_sync::UploadEngine;

pub const SESSION_HEADER: &str = "X-Session-Id";
pub const DEVICE_TOKEN: &str = "device-token-001";
pub const SIGNED_TOKEN: &str = "signed-token-001";

/// A mock backend, the local database and an engine wired to both
pub struct Harness {
    pub server: MockServer,
    pub store: SqliteStore,
    pub engine: UploadEngine,
}

impl Harness {
    /// Harness whose session points at the mock server, with a working
    /// token endpoint
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        mount_token(&server).await;
        let url = server.uri();
        Self::with_server(server, Some(url)).await
    }

    /// Harness whose session points at `server_url`
    pub async fn with_server(server: MockServer, server_url: Option<String>) -> Self {
        let pool = DatabasePool::in_memory().await.expect("in-memory database");
        let store = SqliteStore::new(pool.pool().clone());
        let client =
            BackendClient::new(Duration::from_secs(5), SESSION_HEADER).expect("client should build");
        let session = ConnectorSession::login(SessionMaterial::new(server_url, DEVICE_TOKEN));
        let shared = Arc::new(store.clone());

        let engine = UploadEngine::new(
            session,
            Arc::new(warehouse_registry()),
            Arc::new(HttpBackend::new(client)),
            shared.clone(),
            shared.clone(),
            shared,
        );

        Self {
            server,
            store,
            engine,
        }
    }

    /// Writes the local row an operation refers to
    pub async fn put(&self, entity_type: &str, id: LocalId, data: Value) {
        self.store
            .put_record(&LocalRecord::new(entity_type, id, fields(data)))
            .await
            .expect("put record");
    }

    /// Writes a local row that was already synced with `data`
    pub async fn put_synced(&self, entity_type: &str, server_id: i64, data: Value) {
        let data = fields(data);
        let record = LocalRecord::new(entity_type, LocalId::Server(server_id), data.clone())
            .with_server_id(server_id)
            .with_synced_data(data);
        self.store.put_record(&record).await.expect("put record");
    }

    pub async fn enqueue(&self, operations: Vec<PendingOperation>) {
        self.store.enqueue(&operations).await.expect("enqueue batch");
    }

    /// Submission requests received so far, in arrival order
    pub async fn submissions(&self) -> Vec<Submission> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() != "/token")
            .map(Submission::from)
            .collect()
    }
}

/// A submission as the mock backend saw it
#[derive(Debug, Clone)]
pub struct Submission {
    pub path: String,
    pub query: Option<String>,
    pub operation: String,
    pub data: Value,
}

impl From<&Request> for Submission {
    fn from(request: &Request) -> Self {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        Self {
            path: request.url.path().to_string(),
            query: request.url.query().map(str::to_string),
            operation: body["params"]["type"].as_str().unwrap_or_default().to_string(),
            data: body["params"]["data"].clone(),
        }
    }
}

pub fn fields(value: Value) -> FieldMap {
    value.as_object().cloned().expect("object literal")
}

pub fn rpc_result(result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": null, "result": result})
}

pub async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(rpc_result(json!({"success": true, "token": SIGNED_TOKEN}))),
        )
        .mount(server)
        .await;
}

/// Answers a remote operation on `route` with `result`
pub async fn mount_operation(server: &MockServer, route: &str, operation: &str, result: Value) {
    Mock::given(method("POST"))
        .and(path(route))
        .and(body_partial_json(json!({"params": {"type": operation}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(rpc_result(result)))
        .mount(server)
        .await;
}
