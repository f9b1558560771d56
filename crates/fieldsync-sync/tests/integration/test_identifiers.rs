//! Server identifier assignment and temporary identifier resolution

use serde_json::json;

use fieldsync_core::domain::{LocalId, PendingOperation};
use fieldsync_core::ports::ILocalStore;

use crate::common::{self, Harness};

#[tokio::test]
async fn test_created_id_is_used_by_later_operations() {
    let h = Harness::start().await;
    common::mount_operation(
        &h.server,
        "/create_unified",
        "stock.pallet.create",
        json!({"success": true, "id": 501}),
    )
    .await;
    common::mount_operation(
        &h.server,
        "/update_unified/501",
        "stock.pallet.regrade",
        json!({"success": true}),
    )
    .await;

    let pallet = LocalId::new_temporary();
    let uuid = pallet.temporary().copied().unwrap();
    h.put("pallet", pallet, json!({"grade": "A", "bin_link": 7})).await;
    h.enqueue(vec![PendingOperation::create(
        "pallet",
        pallet,
        common::fields(json!({"grade": "A", "bin_link": 7})),
    )])
    .await;
    h.enqueue(vec![PendingOperation::update(
        "pallet",
        pallet,
        common::fields(json!({"grade": "B"})),
    )])
    .await;

    let report = h.engine.run_cycle().await.unwrap();
    assert_eq!(report.batches_completed, 2);
    assert_eq!(report.operations_succeeded, 2);

    let sent = h.submissions().await;
    assert_eq!(sent.len(), 2);

    assert_eq!(sent[0].path, "/create_unified");
    assert_eq!(sent[0].data["location_id"], json!(7));
    assert_eq!(sent[0].data["client_uuid"], json!(uuid.to_string()));
    assert!(sent[0].data.get("bin_link").is_none());

    assert_eq!(sent[1].path, "/update_unified/501");
    assert_eq!(sent[1].query.as_deref(), Some("entity_type=stock.pallet"));
    assert_eq!(sent[1].operation, "stock.pallet.regrade");
    assert_eq!(sent[1].data, json!({"grade": "B"}));

    assert_eq!(h.store.find_server_id("pallet", &uuid).await.unwrap(), Some(501));
}

#[tokio::test]
async fn test_foreign_key_resolved_within_the_same_batch() {
    let h = Harness::start().await;
    common::mount_operation(
        &h.server,
        "/create_unified",
        "receipt.create",
        json!({"success": true, "id": 501}),
    )
    .await;
    common::mount_operation(
        &h.server,
        "/create_unified",
        "receipt.line.create",
        json!({"success": true, "id": 9001}),
    )
    .await;

    let receipt = LocalId::new_temporary();
    let line = LocalId::new_temporary();
    h.put("receipt", receipt, json!({"name": "Dock 4"})).await;
    h.put("receipt_line", line, json!({"receipt_link": receipt.to_value(), "qty": 3}))
        .await;
    h.enqueue(vec![
        PendingOperation::create("receipt", receipt, common::fields(json!({"name": "Dock 4"}))),
        PendingOperation::create(
            "receipt_line",
            line,
            common::fields(json!({"receipt_link": receipt.to_value(), "qty": 3})),
        ),
    ])
    .await;

    h.engine.run_cycle().await.unwrap();

    let sent = h.submissions().await;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].operation, "receipt.line.create");
    assert_eq!(sent[1].data["receipt_id"], json!(501));
    assert_eq!(sent[1].data["quantity"], json!(3));
}

#[tokio::test]
async fn test_unknown_reference_is_sent_as_is() {
    let h = Harness::start().await;
    common::mount_operation(
        &h.server,
        "/create_unified",
        "receipt.line.create",
        json!({"success": true, "id": 9002}),
    )
    .await;

    let orphan = LocalId::new_temporary();
    let line = LocalId::new_temporary();
    h.enqueue(vec![PendingOperation::create(
        "receipt_line",
        line,
        common::fields(json!({"receipt_link": orphan.to_value(), "qty": 1})),
    )])
    .await;

    let report = h.engine.run_cycle().await.unwrap();
    assert_eq!(report.operations_succeeded, 1);

    let sent = h.submissions().await;
    assert_eq!(sent[0].data["receipt_id"], orphan.to_value());
}
