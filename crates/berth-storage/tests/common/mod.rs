//! Record seeding shared by the integration tests.

#![allow(dead_code)]

use berth_doc_types::DocOp;
use berth_doc_types::TxnRequest;
use berth_storage::STORAGE_ATTACHMENTS;
use berth_storage::STORAGE_INSTANCES;
use berth_storage::UNITS;
use berth_testing::DeterministicDocumentStore;
use berth_traits::DocumentStore;
use serde_json::json;

pub fn unit_op(unit: &str, storage_attachment_count: i64) -> DocOp {
    let application = unit.split('/').next().unwrap_or(unit);
    DocOp::insert(UNITS, unit, json!({
        "name": unit,
        "application": application,
        "life": "alive",
        "storage_attachment_count": storage_attachment_count,
    }))
}

pub fn instance_op(id: &str, owner: &str, life: &str, attachment_count: i64) -> DocOp {
    let storage_name = id.split('/').next().unwrap_or(id);
    DocOp::insert(STORAGE_INSTANCES, id, json!({
        "id": id,
        "kind": "block",
        "life": life,
        "owner": owner,
        "storage_name": storage_name,
        "attachment_count": attachment_count,
    }))
}

pub fn attachment_op(unit: &str, storage: &str, life: &str) -> DocOp {
    DocOp::insert(STORAGE_ATTACHMENTS, format!("u#{unit}#{storage}"), json!({
        "unit": unit,
        "storage_instance": storage,
        "life": life,
    }))
}

/// One instance `data/0` shared by `units` units `mysql/0..`, each attachment
/// in `attachment_life`.
pub async fn seed_shared_instance(
    store: &DeterministicDocumentStore,
    instance_life: &str,
    units: usize,
    attachment_life: &str,
) -> Vec<String> {
    let names: Vec<String> = (0..units).map(|i| format!("mysql/{i}")).collect();
    let mut ops = vec![instance_op("data/0", "application-mysql", instance_life, units as i64)];
    for name in &names {
        ops.push(unit_op(name, 1));
        ops.push(attachment_op(name, "data/0", attachment_life));
    }
    seed(store, ops).await;
    names
}

pub async fn seed(store: &DeterministicDocumentStore, ops: Vec<DocOp>) {
    let result = store.apply(TxnRequest::new(ops)).await.unwrap();
    assert!(result.conditions_met, "seed transaction rejected");
}
