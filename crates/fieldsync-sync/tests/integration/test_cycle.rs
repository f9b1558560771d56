//! Cycle-level behavior: empty queue, credentials, abort and retry, status

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fieldsync_cache::{DatabasePool, SqliteStore};
use fieldsync_core::config::ConfigBuilder;
use fieldsync_core::domain::{
    ConnectorSession, FieldMap, LocalId, LocalRecord, PendingOperation, SessionMaterial,
    SessionState,
};
use fieldsync_core::ports::{ILocalStore, IMutationSource};
use fieldsync_mapping::warehouse_registry;
use fieldsync_remote::{BackendClient, HttpBackend};
use fieldsync_sync::{UploadEngine, UploadError};

use crate::common::{self, Harness};

fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

fn lot_update(id: i64, code: &str) -> PendingOperation {
    PendingOperation::update("lot", LocalId::Server(id), common::fields(json!({"lot_code": code})))
}

#[tokio::test]
async fn test_empty_queue_contacts_nobody() {
    let h = Harness::start().await;

    let report = h.engine.run_cycle().await.unwrap();

    assert_eq!(report.batches_processed(), 0);
    assert!(h.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_network_failure_aborts_and_batch_is_retried_from_start() {
    let h = Harness::start().await;
    common::mount_operation(
        &h.server,
        "/create_unified",
        "receipt.create",
        json!({"success": true, "id": 501}),
    )
    .await;
    common::mount_operation(&h.server, "/update_unified/5", "stock.lot.write", json!({"success": true}))
        .await;
    Mock::given(method("POST"))
        .and(path("/update_unified/6"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&h.server)
        .await;

    let receipt = LocalId::new_temporary();
    h.put("receipt", receipt, json!({"name": "Dock 4"})).await;
    h.put_synced("lot", 5, json!({"lot_code": "L-1"})).await;
    h.put_synced("lot", 6, json!({"lot_code": "M-1"})).await;
    h.enqueue(vec![
        PendingOperation::create("receipt", receipt, common::fields(json!({"name": "Dock 4"}))),
        lot_update(5, "L-2"),
        lot_update(6, "M-2"),
    ])
    .await;

    let report = h.engine.run_cycle().await.unwrap();
    assert_eq!(report.batches_aborted, 1);
    assert_eq!(report.batches_completed, 0);
    assert_eq!(report.operations_succeeded, 2);

    let first_attempt = h.submissions().await;
    assert_eq!(first_attempt.len(), 3);
    let client_uuid = first_attempt[0].data["client_uuid"].clone();

    assert_eq!(h.store.pending_count().await.unwrap(), 1);
    let batch = h.store.next_batch().await.unwrap().unwrap();
    assert_eq!(h.store.attempts(batch.id()).await.unwrap(), Some(1));

    // The accepted update is not part of the snapshot yet
    let lot = h.store.get_record("lot", &LocalId::Server(5)).await.unwrap().unwrap();
    assert_eq!(lot.synced_data(), Some(&common::fields(json!({"lot_code": "L-1"}))));

    let status = h.engine.status().snapshot();
    assert!(!status.connected);
    assert!(status.last_error.is_some());
    assert_eq!(status.pending_batches, 1);

    // Backend recovers
    h.server.reset().await;
    common::mount_token(&h.server).await;
    common::mount_operation(
        &h.server,
        "/create_unified",
        "receipt.create",
        json!({"success": true, "id": 501}),
    )
    .await;
    common::mount_operation(&h.server, "/update_unified/5", "stock.lot.write", json!({"success": true}))
        .await;
    common::mount_operation(&h.server, "/update_unified/6", "stock.lot.write", json!({"success": true}))
        .await;

    let report = h.engine.run_cycle().await.unwrap();
    assert_eq!(report.batches_completed, 1);
    assert_eq!(report.operations_succeeded, 3);
    assert_eq!(report.operations_skipped, 0);

    // Every operation is sent again, from the first
    let second_attempt = h.submissions().await;
    let paths: Vec<&str> = second_attempt.iter().map(|s| s.path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["/create_unified", "/update_unified/5", "/update_unified/6"]
    );
    assert_eq!(second_attempt[0].data["client_uuid"], client_uuid);
    assert_eq!(second_attempt[1].data, json!({"name": "L-2"}));

    assert_eq!(h.store.pending_count().await.unwrap(), 0);
    let lot = h.store.get_record("lot", &LocalId::Server(5)).await.unwrap().unwrap();
    assert_eq!(lot.synced_data(), Some(&common::fields(json!({"lot_code": "L-2"}))));

    let status = h.engine.status().snapshot();
    assert!(status.connected);
    assert!(status.last_synced_at.is_some());
    assert!(status.last_error.is_none());
}

#[tokio::test]
async fn test_unreachable_server_fails_credential_exchange() {
    let server = MockServer::start().await;
    let h = Harness::with_server(server, Some(closed_port_url())).await;
    h.put_synced("lot", 5, json!({"lot_code": "L-1"})).await;
    h.enqueue(vec![lot_update(5, "L-2")]).await;

    let err = h.engine.run_cycle().await.unwrap_err();

    assert!(matches!(err, UploadError::Network(_)));
    assert_eq!(h.store.pending_count().await.unwrap(), 1);
    let status = h.engine.status().snapshot();
    assert!(!status.connected);
    assert_eq!(status.pending_batches, 1);
}

#[tokio::test]
async fn test_missing_server_address_attempts_nothing() {
    let server = MockServer::start().await;
    let h = Harness::with_server(server, None).await;
    h.enqueue(vec![lot_update(5, "L-2")]).await;

    let err = h.engine.run_cycle().await.unwrap_err();

    assert!(matches!(err, UploadError::CredentialUnavailable));
    assert!(h.server.received_requests().await.unwrap().is_empty());
    assert_eq!(h.store.pending_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_rejected_token_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::rpc_result(
            json!({"success": false, "message": "device revoked"}),
        )))
        .mount(&server)
        .await;
    let url = server.uri();
    let h = Harness::with_server(server, Some(url)).await;
    h.enqueue(vec![lot_update(5, "L-2")]).await;

    let err = h.engine.run_cycle().await.unwrap_err();

    assert!(matches!(err, UploadError::CredentialRejected(m) if m == "device revoked"));
    assert_eq!(h.submissions().await.len(), 0);
}

#[tokio::test]
async fn test_cycle_drains_at_most_the_configured_batches() {
    let Harness {
        server,
        store,
        engine,
    } = Harness::start().await;
    let config = ConfigBuilder::new().upload_max_batches_per_cycle(1).build();
    let engine = engine.with_upload_config(&config.upload);

    common::mount_operation(&server, "/update_unified/5", "stock.lot.write", json!({"success": true}))
        .await;
    let h = Harness {
        server,
        store,
        engine,
    };
    h.put_synced("lot", 5, json!({"lot_code": "L-1"})).await;
    h.enqueue(vec![lot_update(5, "L-2")]).await;
    h.enqueue(vec![lot_update(5, "L-3")]).await;

    let report = h.engine.run_cycle().await.unwrap();
    assert_eq!(report.batches_completed, 1);
    assert_eq!(h.store.pending_count().await.unwrap(), 1);

    let report = h.engine.run_cycle().await.unwrap();
    assert_eq!(report.batches_completed, 1);
    assert_eq!(h.store.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_logout_ends_uploads() {
    let h = Harness::start().await;
    h.enqueue(vec![lot_update(5, "L-2")]).await;

    h.engine.logout().unwrap();

    assert_eq!(h.engine.session_state(), SessionState::LoggedOut);
    assert!(matches!(
        h.engine.run_cycle().await,
        Err(UploadError::SessionEnded)
    ));
    assert!(h.engine.logout().is_err());
}

/// Local store whose record reads fail once `failing` is set
struct FlakyStore {
    inner: SqliteStore,
    failing: AtomicBool,
}

#[async_trait::async_trait]
impl ILocalStore for FlakyStore {
    async fn get_record(
        &self,
        entity_type: &str,
        local_id: &LocalId,
    ) -> anyhow::Result<Option<LocalRecord>> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("disk I/O error");
        }
        self.inner.get_record(entity_type, local_id).await
    }

    async fn put_record(&self, record: &LocalRecord) -> anyhow::Result<()> {
        self.inner.put_record(record).await
    }

    async fn find_server_id(&self, entity_type: &str, temp_id: &Uuid) -> anyhow::Result<Option<i64>> {
        self.inner.find_server_id(entity_type, temp_id).await
    }

    async fn assign_server_id(
        &self,
        entity_type: &str,
        local_id: &LocalId,
        server_id: i64,
    ) -> anyhow::Result<()> {
        self.inner.assign_server_id(entity_type, local_id, server_id).await
    }

    async fn mark_synced(
        &self,
        entity_type: &str,
        local_id: &LocalId,
        acknowledged: &FieldMap,
    ) -> anyhow::Result<()> {
        self.inner.mark_synced(entity_type, local_id, acknowledged).await
    }

    async fn delete_record(&self, entity_type: &str, local_id: &LocalId) -> anyhow::Result<bool> {
        self.inner.delete_record(entity_type, local_id).await
    }
}

#[tokio::test]
async fn test_local_store_failure_marks_status_disconnected() {
    let server = MockServer::start().await;
    common::mount_token(&server).await;
    common::mount_operation(&server, "/update_unified/5", "stock.lot.write", json!({"success": true}))
        .await;

    let pool = DatabasePool::in_memory().await.unwrap();
    let queue = Arc::new(SqliteStore::new(pool.pool().clone()));
    let store = Arc::new(FlakyStore {
        inner: SqliteStore::new(pool.pool().clone()),
        failing: AtomicBool::new(false),
    });
    let client = BackendClient::new(Duration::from_secs(5), common::SESSION_HEADER).unwrap();
    let engine = UploadEngine::new(
        ConnectorSession::login(SessionMaterial::new(Some(server.uri()), common::DEVICE_TOKEN)),
        Arc::new(warehouse_registry()),
        Arc::new(HttpBackend::new(client)),
        store.clone(),
        queue.clone(),
        queue.clone(),
    );

    let lot = LocalRecord::new("lot", LocalId::Server(5), common::fields(json!({"lot_code": "L-1"})))
        .with_server_id(5)
        .with_synced_data(common::fields(json!({"lot_code": "L-1"})));
    queue.put_record(&lot).await.unwrap();
    queue.enqueue(&[lot_update(5, "L-2")]).await.unwrap();

    engine.run_cycle().await.unwrap();
    assert!(engine.status().snapshot().connected);

    store.failing.store(true, Ordering::SeqCst);
    queue.enqueue(&[lot_update(5, "L-3")]).await.unwrap();

    let err = engine.run_cycle().await.unwrap_err();

    assert!(matches!(err, UploadError::Storage(_)));
    assert_eq!(queue.pending_count().await.unwrap(), 1);
    let status = engine.status().snapshot();
    assert!(!status.connected);
    assert!(status.last_error.is_some());
    assert_eq!(status.pending_batches, 1);
}
