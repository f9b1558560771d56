//! Warehouse receiving mappings
//!
//! | entity                | remote model    | placeholder |
//! |-----------------------|-----------------|-------------|
//! | `receipt`             | `receipt`       | no          |
//! | `receipt_line`        | `receipt.line`  | no          |
//! | `pallet`              | `stock.pallet`  | no          |
//! | `lot`                 | `stock.lot`     | no          |
//! | `label_print_request` | `label.print`   | yes         |
//! | `scrap_request`       | `stock.scrap`   | yes         |

use serde_json::Value;

use fieldsync_core::domain::FieldMap;

use crate::diff::FieldDiff;
use crate::error::MappingError;
use crate::payload::ActionInput;
use crate::registry::{EntityMapping, MappingRegistry};
use crate::rules::ActionRule;

/// Receipt statuses after which a receipt is posted
const TERMINAL_RECEIPT_STATUSES: &[&str] = &["posted", "done"];

/// Pallet fields that describe where it is stored
const PLACEMENT_FIELDS: &[&str] = &["bin_link", "placed_at"];

/// Receipt line fields touched by a count
const COUNT_FIELDS: &[&str] = &["qty", "counted_at"];

/// Registry with every warehouse receiving entity
pub fn warehouse_registry() -> MappingRegistry {
    [receipt(), receipt_line(), pallet(), lot(), label_print_request(), scrap_request()]
        .into_iter()
        .collect()
}

pub fn receipt() -> EntityMapping {
    EntityMapping::new("receipt", "receipt")
        .rename("partner_ref", "partner_id")
        .rename("dock_code", "dock")
        .action(ActionRule::new("receipt.post", status_became_terminal, build_post))
        .generic_update()
        .deletable()
}

pub fn receipt_line() -> EntityMapping {
    EntityMapping::new("receipt_line", "receipt.line")
        .rename("receipt_link", "receipt_id")
        .rename("qty", "quantity")
        .foreign_key("receipt_link", "receipt")
        .foreign_key("pallet_id", "pallet")
        .foreign_key("lot_id", "lot")
        .action(ActionRule::new("receipt.line.count", only_count_changed, build_count))
        .generic_update()
        .deletable()
}

pub fn pallet() -> EntityMapping {
    EntityMapping::new("pallet", "stock.pallet")
        .rename("bin_link", "location_id")
        .foreign_key("lot_id", "lot")
        .foreign_key("receipt_id", "receipt")
        .action(ActionRule::new("stock.pallet.place", only_placement_changed, build_place))
        .action(ActionRule::new("stock.pallet.regrade", grade_changed_in_place, build_regrade))
}

pub fn lot() -> EntityMapping {
    EntityMapping::new("lot", "stock.lot")
        .rename("lot_code", "name")
        .generic_update()
}

pub fn label_print_request() -> EntityMapping {
    EntityMapping::new("label_print_request", "label.print")
        .create_operation("label.print")
        .rename("pallet_link", "pallet_id")
        .foreign_key("pallet_link", "pallet")
        .placeholder()
}

pub fn scrap_request() -> EntityMapping {
    EntityMapping::new("scrap_request", "stock.scrap")
        .create_operation("stock.scrap.request")
        .rename("pallet_link", "pallet_id")
        .foreign_key("pallet_link", "pallet")
        .placeholder()
}

// ============================================================================
// Predicates
// ============================================================================

fn status_became_terminal(diff: &FieldDiff) -> bool {
    matches!(
        diff.get("status"),
        Some(Value::String(status)) if TERMINAL_RECEIPT_STATUSES.contains(&status.as_str())
    )
}

fn only_count_changed(diff: &FieldDiff) -> bool {
    diff.contains("qty") && diff.only(COUNT_FIELDS)
}

fn only_placement_changed(diff: &FieldDiff) -> bool {
    diff.contains("bin_link") && diff.only(PLACEMENT_FIELDS)
}

fn grade_changed_in_place(diff: &FieldDiff) -> bool {
    diff.contains("grade") && !diff.any_of(PLACEMENT_FIELDS)
}

// ============================================================================
// Payload builders
// ============================================================================

fn build_post(input: &ActionInput<'_>) -> Result<FieldMap, MappingError> {
    input.pick(&["status"], &["posted_at"])
}

fn build_count(input: &ActionInput<'_>) -> Result<FieldMap, MappingError> {
    input.pick(&["qty"], &["counted_at"])
}

fn build_place(input: &ActionInput<'_>) -> Result<FieldMap, MappingError> {
    input.pick(&["bin_link"], &["placed_at"])
}

fn build_regrade(input: &ActionInput<'_>) -> Result<FieldMap, MappingError> {
    input.pick(&["grade"], &["grade_reason"])
}
