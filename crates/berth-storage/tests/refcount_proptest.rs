/// Property-based tests for storage reference counting.
///
/// Whatever order attachments are torn down in, and wherever the instance's
/// own destruction lands in that sequence:
/// - an instance's attachment count equals its live attachment records
/// - each unit's storage attachment count equals its attachment records
/// - the instance is gone once it is destroyed and unreferenced
mod common;

use berth_storage::STORAGE_INSTANCES;
use berth_storage::StorageAttachments;
use berth_storage::StorageInstances;
use berth_storage::StorageTag;
use berth_storage::UNITS;
use berth_storage::UnitTag;
use berth_testing::DeterministicDocumentStore;
use berth_txn::TxnConfig;
use common::seed_shared_instance;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

#[derive(Debug, Clone)]
enum Step {
    DestroyInstance,
    Detach(usize),
}

fn teardown_order() -> impl Strategy<Value = (usize, Vec<Step>)> {
    (1usize..6).prop_flat_map(|units| {
        (Just((0..units).collect::<Vec<_>>()).prop_shuffle(), 0..=units).prop_map(move |(order, destroy_at)| {
            let mut steps: Vec<Step> = order.into_iter().map(Step::Detach).collect();
            steps.insert(destroy_at, Step::DestroyInstance);
            (units, steps)
        })
    })
}

async fn check_counts(
    store: &DeterministicDocumentStore,
    instances: &StorageInstances<DeterministicDocumentStore>,
    attachments: &StorageAttachments<DeterministicDocumentStore>,
    units: &[String],
) -> Result<(), TestCaseError> {
    let storage = StorageTag::new("data/0").unwrap();
    let live = attachments.for_instance(&storage).await.unwrap();
    match instances.get(&storage).await {
        Ok(instance) => {
            prop_assert_eq!(instance.attachment_count, live.len() as i64);
        }
        Err(e) => {
            prop_assert!(e.is_not_found());
            prop_assert!(live.is_empty(), "attachments outlived their instance");
        }
    }
    for name in units {
        let unit = UnitTag::new(name.as_str()).unwrap();
        let held = attachments.for_unit(&unit).await.unwrap().len() as i64;
        let body = store.body(UNITS, name).await.unwrap();
        prop_assert_eq!(body["storage_attachment_count"].as_i64(), Some(held));
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]
    #[test]
    fn reference_counts_hold_in_any_teardown_order((units, steps) in teardown_order()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = DeterministicDocumentStore::new();
            let names = seed_shared_instance(&store, "alive", units, "alive").await;
            let instances = StorageInstances::new(store.clone(), TxnConfig::default());
            let attachments = StorageAttachments::new(store.clone(), TxnConfig::default());
            let storage = StorageTag::new("data/0").unwrap();

            for step in &steps {
                match step {
                    Step::DestroyInstance => instances.destroy(&storage).await.unwrap(),
                    Step::Detach(i) => {
                        let unit = UnitTag::new(names[*i].as_str()).unwrap();
                        attachments.destroy(&storage, &unit).await.unwrap();
                        attachments.ensure_dead(&storage, &unit).await.unwrap();
                        attachments.remove(&storage, &unit).await.unwrap();
                    }
                }
                check_counts(&store, &instances, &attachments, &names).await?;
            }

            prop_assert_eq!(store.count(STORAGE_INSTANCES).await, 0);
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn repeated_teardown_calls_change_nothing((units, steps) in teardown_order()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = DeterministicDocumentStore::new();
            let names = seed_shared_instance(&store, "alive", units, "alive").await;
            let instances = StorageInstances::new(store.clone(), TxnConfig::default());
            let attachments = StorageAttachments::new(store.clone(), TxnConfig::default());
            let storage = StorageTag::new("data/0").unwrap();

            for step in &steps {
                match step {
                    Step::DestroyInstance => {
                        instances.destroy(&storage).await.unwrap();
                        let calls = store.apply_calls().await;
                        instances.destroy(&storage).await.unwrap();
                        prop_assert_eq!(store.apply_calls().await, calls);
                    }
                    Step::Detach(i) => {
                        let unit = UnitTag::new(names[*i].as_str()).unwrap();
                        attachments.destroy(&storage, &unit).await.unwrap();
                        attachments.ensure_dead(&storage, &unit).await.unwrap();
                        let calls = store.apply_calls().await;
                        attachments.destroy(&storage, &unit).await.unwrap();
                        attachments.ensure_dead(&storage, &unit).await.unwrap();
                        prop_assert_eq!(store.apply_calls().await, calls);
                        attachments.remove(&storage, &unit).await.unwrap();
                        attachments.remove(&storage, &unit).await.unwrap();
                    }
                }
                check_counts(&store, &instances, &attachments, &names).await?;
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
