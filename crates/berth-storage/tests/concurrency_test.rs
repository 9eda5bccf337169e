//! Lifecycle transitions racing against writes from other agents.

mod common;

use berth_storage::CLEANUPS;
use berth_storage::Life;
use berth_storage::STORAGE_ATTACHMENTS;
use berth_storage::STORAGE_INSTANCES;
use berth_storage::StorageAttachmentDoc;
use berth_storage::StorageAttachments;
use berth_storage::StorageInstanceDoc;
use berth_storage::StorageInstances;
use berth_storage::StorageKind;
use berth_storage::StorageTag;
use berth_storage::UnitTag;
use berth_storage::pure::plan_destroy_instance;
use berth_storage::pure::plan_remove_attachment;
use berth_testing::ConflictInjectingStore;
use berth_testing::DeterministicDocumentStore;
use berth_testing::init_test_tracing;
use berth_txn::TxnConfig;
use common::seed_shared_instance;

fn data_0() -> StorageTag {
    StorageTag::new("data/0").unwrap()
}

fn instance_doc(life: Life, attachment_count: i64) -> StorageInstanceDoc {
    StorageInstanceDoc {
        id: "data/0".to_string(),
        kind: StorageKind::Block,
        life,
        owner: "application-mysql".to_string(),
        storage_name: "data".to_string(),
        attachment_count,
    }
}

fn dead_attachment(unit: &str) -> StorageAttachmentDoc {
    StorageAttachmentDoc {
        unit: unit.to_string(),
        storage_instance: "data/0".to_string(),
        life: Life::Dead,
    }
}

#[tokio::test]
async fn concurrent_destroy_converges() {
    init_test_tracing();
    let inner = DeterministicDocumentStore::new();
    seed_shared_instance(&inner, "alive", 1, "alive").await;
    let store = ConflictInjectingStore::new(inner.clone());
    let instances = StorageInstances::new(store.clone(), TxnConfig::default());

    // Another agent destroys the instance between our read and our commit.
    let theirs = plan_destroy_instance(Some(&instance_doc(Life::Alive, 1))).unwrap();
    store.interfere_before_next_apply(theirs.into_ops()).await;

    instances.destroy(&data_0()).await.unwrap();

    assert_eq!(instances.get(&data_0()).await.unwrap().life, Life::Dying);
    assert_eq!(inner.count(CLEANUPS).await, 1);
}

#[tokio::test]
async fn racing_removals_still_remove_the_instance() {
    init_test_tracing();
    let inner = DeterministicDocumentStore::new();
    seed_shared_instance(&inner, "dying", 2, "dead").await;
    let store = ConflictInjectingStore::new(inner.clone());
    let attachments = StorageAttachments::new(store.clone(), TxnConfig::default());

    // mysql/1's attachment is removed while we are removing mysql/0's. Our
    // decrement then fails its count > 1 assertion, and the retry sees we
    // hold the last reference.
    let theirs = plan_remove_attachment(
        "u#mysql/1#data/0",
        Some(&dead_attachment("mysql/1")),
        Some(&instance_doc(Life::Dying, 2)),
    )
    .unwrap();
    store.interfere_before_next_apply(theirs.into_ops()).await;

    attachments.remove(&data_0(), &UnitTag::new("mysql/0").unwrap()).await.unwrap();

    assert_eq!(inner.count(STORAGE_ATTACHMENTS).await, 0);
    assert_eq!(inner.count(STORAGE_INSTANCES).await, 0);
}

#[tokio::test]
async fn retry_exhaustion_is_reported_with_the_operation() {
    init_test_tracing();
    let inner = DeterministicDocumentStore::new();
    seed_shared_instance(&inner, "alive", 1, "alive").await;
    let store = ConflictInjectingStore::new(inner.clone());
    let instances = StorageInstances::new(store.clone(), TxnConfig::default());

    store.abort_next_applies(TxnConfig::default().max_attempts).await;
    let err = instances.destroy(&data_0()).await.unwrap_err();

    assert!(err.is_retry_exhausted());
    assert!(err.to_string().starts_with("cannot destroy storage \"data/0\": "));
    assert_eq!(instances.get(&data_0()).await.unwrap().life, Life::Alive);
}

#[tokio::test]
async fn precondition_failures_are_not_retried() {
    init_test_tracing();
    let inner = DeterministicDocumentStore::new();
    seed_shared_instance(&inner, "alive", 1, "alive").await;
    let attachments = StorageAttachments::new(inner.clone(), TxnConfig::default());
    let calls = inner.apply_calls().await;

    let err = attachments.remove(&data_0(), &UnitTag::new("mysql/0").unwrap()).await.unwrap_err();

    assert!(err.is_precondition());
    assert_eq!(inner.apply_calls().await, calls);
}
