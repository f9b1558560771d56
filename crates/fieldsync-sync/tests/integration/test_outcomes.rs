//! Business rejections, mapping gaps, no-op updates and audit deduplication

use chrono::{Duration, Utc};
use serde_json::{json, Value};

use fieldsync_core::domain::{LocalId, OutcomeKind, PendingOperation};
use fieldsync_core::ports::{ILocalStore, IMutationSource};

use crate::common::{self, Harness};

#[tokio::test]
async fn test_posted_status_becomes_post_action() {
    let h = Harness::start().await;
    common::mount_operation(
        &h.server,
        "/update_unified/77",
        "receipt.post",
        json!({"success": true}),
    )
    .await;

    h.put_synced("receipt", 77, json!({"name": "Dock 4", "status": "draft"}))
        .await;
    h.enqueue(vec![PendingOperation::update(
        "receipt",
        LocalId::Server(77),
        common::fields(json!({
            "status": "posted",
            "posted_at": "2026-10-18T10:00:00Z",
            "updated_at": "2026-10-18T10:00:01Z"
        })),
    )])
    .await;

    let report = h.engine.run_cycle().await.unwrap();
    assert_eq!(report.operations_succeeded, 1);

    let sent = h.submissions().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].query.as_deref(), Some("entity_type=receipt"));
    assert_eq!(
        sent[0].data,
        json!({"status": "posted", "posted_at": "2026-10-18T10:00:00Z"})
    );

    let record = h
        .store
        .get_record("receipt", &LocalId::Server(77))
        .await
        .unwrap()
        .unwrap();
    let shadow = record.synced_data().unwrap();
    assert_eq!(shadow["status"], json!("posted"));
    assert_eq!(shadow["name"], json!("Dock 4"));
}

#[tokio::test]
async fn test_null_result_counts_as_success() {
    let h = Harness::start().await;
    common::mount_operation(&h.server, "/update_unified/78", "receipt.post", Value::Null).await;

    h.put_synced("receipt", 78, json!({"name": "Dock 5", "status": "draft"}))
        .await;
    h.enqueue(vec![PendingOperation::update(
        "receipt",
        LocalId::Server(78),
        common::fields(json!({"status": "posted", "posted_at": "2026-10-18T11:00:00Z"})),
    )])
    .await;

    let report = h.engine.run_cycle().await.unwrap();
    assert_eq!(report.operations_succeeded, 1);
    assert_eq!(report.batches_completed, 1);
    assert_eq!(report.batches_aborted, 0);
    assert_eq!(h.store.pending_count().await.unwrap(), 0);

    let entries = h.engine.audit().history("receipt", &LocalId::Server(78)).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind(), OutcomeKind::Success);
}

#[tokio::test]
async fn test_rejection_is_dropped_and_batch_completes() {
    let h = Harness::start().await;
    common::mount_operation(
        &h.server,
        "/update_unified/5",
        "stock.lot.write",
        json!({"success": false, "message": "insufficient stock"}),
    )
    .await;
    common::mount_operation(
        &h.server,
        "/update_unified/77",
        "receipt.write",
        json!({"success": true}),
    )
    .await;

    h.put_synced("lot", 5, json!({"lot_code": "L-1"})).await;
    h.put_synced("receipt", 77, json!({"dock_code": "D1"})).await;
    h.enqueue(vec![
        PendingOperation::update("lot", LocalId::Server(5), common::fields(json!({"lot_code": "L-2"}))),
        PendingOperation::update(
            "receipt",
            LocalId::Server(77),
            common::fields(json!({"dock_code": "D2"})),
        ),
    ])
    .await;

    let report = h.engine.run_cycle().await.unwrap();
    assert_eq!(report.batches_completed, 1);
    assert_eq!(report.operations_rejected, 1);
    assert_eq!(report.operations_succeeded, 1);
    assert_eq!(h.store.pending_count().await.unwrap(), 0);

    let sent = h.submissions().await;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].data, json!({"name": "L-2"}));
    assert_eq!(sent[1].data, json!({"dock": "D2"}));

    let history = h
        .engine
        .audit()
        .history("lot", &LocalId::Server(5))
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind(), OutcomeKind::BusinessRejection);
    assert_eq!(history[0].message(), "insufficient stock");

    // Nothing is resent
    let again = h.engine.run_cycle().await.unwrap();
    assert_eq!(again.batches_processed(), 0);
    assert_eq!(h.submissions().await.len(), 2);
}

#[tokio::test]
async fn test_repeated_rejection_is_deduplicated() {
    let h = Harness::start().await;
    common::mount_operation(
        &h.server,
        "/update_unified/5",
        "stock.lot.write",
        json!({"success": false, "message": "insufficient stock"}),
    )
    .await;

    h.put_synced("lot", 5, json!({"lot_code": "L-1"})).await;
    for code in ["L-2", "L-3"] {
        h.enqueue(vec![PendingOperation::update(
            "lot",
            LocalId::Server(5),
            common::fields(json!({"lot_code": code})),
        )])
        .await;
        h.engine.run_cycle().await.unwrap();
    }

    let history = h
        .engine
        .audit()
        .history("lot", &LocalId::Server(5))
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].retry_count(), 2);
    assert!(history[0].last_seen_at() >= history[0].created_at());
}

#[tokio::test]
async fn test_mapping_gaps_are_audited_and_skipped() {
    let h = Harness::start().await;

    h.put_synced("pallet", 10, json!({"grade": "A", "note": ""})).await;
    h.put_synced("pallet", 11, json!({"grade": "A"})).await;
    h.enqueue(vec![
        // Pallets have no generic update
        PendingOperation::update("pallet", LocalId::Server(10), common::fields(json!({"note": "x"}))),
        PendingOperation::create("forklift", LocalId::new_temporary(), common::fields(json!({}))),
        // Pallets cannot be deleted remotely
        PendingOperation::delete("pallet", LocalId::Server(11)),
    ])
    .await;

    let report = h.engine.run_cycle().await.unwrap();
    assert_eq!(report.batches_completed, 1);
    assert_eq!(report.mapping_gaps, 3);
    assert!(h.submissions().await.is_empty());

    let entries = h
        .engine
        .audit()
        .recent(Utc::now() - Duration::minutes(5), 10)
        .await
        .unwrap();
    let reasons: Vec<_> = entries
        .iter()
        .filter(|e| e.kind() == OutcomeKind::MappingGap)
        .map(|e| e.details()["reason"].as_str().unwrap_or_default().to_string())
        .collect();
    assert!(reasons.contains(&"no_matching_action".to_string()));
    assert!(reasons.contains(&"unknown_entity_type".to_string()));
    assert!(reasons.contains(&"unsupported_operation".to_string()));
}

#[tokio::test]
async fn test_unchanged_update_is_not_submitted() {
    let h = Harness::start().await;

    h.put_synced("lot", 5, json!({"lot_code": "L-1"})).await;
    h.enqueue(vec![PendingOperation::update(
        "lot",
        LocalId::Server(5),
        common::fields(json!({"lot_code": "L-1", "updated_at": "2026-10-18T10:00:00Z"})),
    )])
    .await;

    let report = h.engine.run_cycle().await.unwrap();
    assert_eq!(report.operations_skipped, 1);
    assert_eq!(report.batches_completed, 1);
    assert!(h.submissions().await.is_empty());
}

#[tokio::test]
async fn test_repeated_update_in_one_batch_sees_accepted_fields() {
    let h = Harness::start().await;
    common::mount_operation(&h.server, "/update_unified/5", "stock.lot.write", json!({"success": true}))
        .await;

    h.put_synced("lot", 5, json!({"lot_code": "L-1"})).await;
    h.enqueue(vec![
        PendingOperation::update("lot", LocalId::Server(5), common::fields(json!({"lot_code": "L-2"}))),
        PendingOperation::update("lot", LocalId::Server(5), common::fields(json!({"lot_code": "L-2"}))),
    ])
    .await;

    let report = h.engine.run_cycle().await.unwrap();
    assert_eq!(report.operations_succeeded, 1);
    assert_eq!(report.operations_skipped, 1);
    assert_eq!(h.submissions().await.len(), 1);
}

#[tokio::test]
async fn test_delete_unlinks_and_removes_local_row() {
    let h = Harness::start().await;
    common::mount_operation(
        &h.server,
        "/update_unified/77",
        "receipt.unlink",
        json!({"success": true}),
    )
    .await;

    h.put_synced("receipt", 77, json!({"name": "Dock 4"})).await;
    h.enqueue(vec![PendingOperation::delete("receipt", LocalId::Server(77))])
        .await;

    h.engine.run_cycle().await.unwrap();

    let sent = h.submissions().await;
    assert_eq!(sent[0].data, json!({}));
    assert!(h
        .store
        .get_record("receipt", &LocalId::Server(77))
        .await
        .unwrap()
        .is_none());
}
