//! Storage instance transaction planning.

use berth_doc_types::DocAssert;
use berth_doc_types::DocOp;
use berth_doc_types::FieldCondition;
use berth_doc_types::FieldUpdate;
use berth_txn::TxnPlan;

use crate::charm::CharmMeta;
use crate::cleanup::CleanupKind;
use crate::cleanup::new_cleanup_op;
use crate::constraints::ConstraintsMap;
use crate::error::StorageError;
use crate::records::FIELD_ATTACHMENT_COUNT;
use crate::records::FIELD_LIFE;
use crate::records::Life;
use crate::records::STORAGE_ATTACHMENTS;
use crate::records::STORAGE_INSTANCES;
use crate::records::StorageAttachmentDoc;
use crate::records::StorageInstanceDoc;
use crate::records::StorageKind;
use crate::records::storage_attachment_id;
use crate::tags::StorageTag;
use crate::tags::Tag;

pub(crate) fn life_is(life: Life) -> FieldCondition {
    FieldCondition::eq(FIELD_LIFE, life.as_str())
}

/// Instances to create for one charm store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceTemplate {
    pub storage_name: String,
    pub kind: StorageKind,
    pub count: u64,
}

/// Decide which instances `owner` gets from `constraints`.
///
/// Units get one template per non-shared store, applications one per shared
/// store. Templates are ordered by store name.
pub fn plan_instance_templates(
    owner: &Tag,
    charm: &CharmMeta,
    constraints: &ConstraintsMap,
) -> Result<Vec<InstanceTemplate>, StorageError> {
    let wants_shared = match owner {
        Tag::Application(_) => true,
        Tag::Unit(_) => false,
        other => {
            return Err(StorageError::Validation {
                message: format!("expected application or unit tag, got {} tag \"{other}\"", other.kind()),
            });
        }
    };

    let mut templates = Vec::with_capacity(constraints.len());
    for (name, cons) in constraints {
        let Some(charm_storage) = charm.storage.get(name) else {
            return Err(StorageError::NotFound {
                what: format!("charm storage \"{name}\""),
            });
        };
        if charm_storage.shared != wants_shared {
            continue;
        }
        templates.push(InstanceTemplate {
            storage_name: name.clone(),
            kind: charm_storage.kind(),
            count: cons.count,
        });
    }
    Ok(templates)
}

/// Total number of instances the templates describe.
pub fn instance_count(templates: &[InstanceTemplate]) -> u64 {
    templates.iter().fold(0u64, |acc, t| acc.saturating_add(t.count))
}

/// Operations creating the instances of `templates`, plus the owning unit's
/// attachments, numbered consecutively from `first_sequence`.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedStorage {
    pub ops: Vec<DocOp>,
    pub instances: Vec<StorageTag>,
    pub attachment_count: u64,
}

pub fn create_storage_ops(
    owner: &Tag,
    templates: &[InstanceTemplate],
    first_sequence: u64,
) -> Result<CreatedStorage, StorageError> {
    let unit = match owner {
        Tag::Unit(unit) => Some(unit),
        Tag::Application(_) => None,
        other => {
            return Err(StorageError::Validation {
                message: format!("expected application or unit tag, got {} tag \"{other}\"", other.kind()),
            });
        }
    };

    let total = instance_count(templates);
    let mut created = CreatedStorage {
        ops: Vec::with_capacity(usize::try_from(total.saturating_mul(2)).unwrap_or(0)),
        instances: Vec::new(),
        attachment_count: 0,
    };
    let mut sequence = first_sequence;

    for template in templates {
        for _ in 0..template.count {
            let tag = StorageTag::from_parts(&template.storage_name, sequence)?;
            sequence = sequence.checked_add(1).ok_or_else(|| StorageError::Validation {
                message: "storage sequence overflowed".to_string(),
            })?;

            let mut doc = StorageInstanceDoc {
                id: tag.id().to_string(),
                kind: template.kind,
                life: Life::Alive,
                owner: owner.to_string(),
                storage_name: template.storage_name.clone(),
                attachment_count: 0,
            };
            if let Some(unit) = unit {
                doc.attachment_count = 1;
                let attachment = StorageAttachmentDoc {
                    unit: unit.id().to_string(),
                    storage_instance: tag.id().to_string(),
                    life: Life::Alive,
                };
                created.ops.push(DocOp::insert(
                    STORAGE_ATTACHMENTS,
                    storage_attachment_id(unit, &tag),
                    serde_json::to_value(attachment)?,
                ));
                created.attachment_count += 1;
            }
            created.ops.push(DocOp::insert(STORAGE_INSTANCES, tag.id(), serde_json::to_value(doc)?));
            created.instances.push(tag);
        }
    }
    Ok(created)
}

/// Remove an instance if `assert` holds.
pub fn remove_instance_op(id: &str, assert: Vec<FieldCondition>) -> DocOp {
    DocOp::remove(STORAGE_INSTANCES, id, DocAssert::Fields(assert))
}

/// Plan destruction of an instance given its current record.
///
/// An unattached instance is removed at once. An attached one becomes
/// Dying and a cleanup is scheduled to destroy its attachments; it is
/// removed together with its last attachment.
pub fn plan_destroy_instance(instance: Option<&StorageInstanceDoc>) -> Result<TxnPlan, StorageError> {
    let Some(doc) = instance else {
        return Ok(TxnPlan::noop());
    };
    if doc.life != Life::Alive {
        return Ok(TxnPlan::noop());
    }
    if doc.attachment_count < 0 {
        return Err(StorageError::CorruptedRecord {
            collection: STORAGE_INSTANCES.to_string(),
            id: doc.id.clone(),
            reason: format!("negative attachment count {}", doc.attachment_count),
        });
    }

    if doc.attachment_count == 0 {
        return Ok(TxnPlan::apply(vec![remove_instance_op(&doc.id, vec![
            life_is(Life::Alive),
            FieldCondition::eq(FIELD_ATTACHMENT_COUNT, 0),
        ])]));
    }

    Ok(TxnPlan::apply(vec![
        new_cleanup_op(CleanupKind::AttachmentsForDyingStorage, &doc.id)?,
        DocOp::update(
            STORAGE_INSTANCES,
            &doc.id,
            DocAssert::Fields(vec![life_is(Life::Alive), FieldCondition::gt(FIELD_ATTACHMENT_COUNT, 0)]),
            vec![FieldUpdate::set(FIELD_LIFE, Life::Dying.as_str())],
        ),
    ]))
}

/// Unconditional removal of every listed instance.
pub fn remove_instances_ops<'a>(ids: impl IntoIterator<Item = &'a str>) -> Vec<DocOp> {
    ids.into_iter().map(|id| DocOp::remove(STORAGE_INSTANCES, id, DocAssert::Any)).collect()
}

#[cfg(test)]
mod tests {
    use berth_doc_types::DocEffect;

    use super::*;
    use crate::charm::CharmStorage;
    use crate::constraints::StorageConstraints;
    use crate::records::CLEANUPS;
    use crate::tags::ApplicationTag;
    use crate::tags::UnitTag;

    fn unit() -> Tag {
        Tag::Unit(UnitTag::new("mysql/0").unwrap())
    }

    fn instance(life: Life, attachment_count: i64) -> StorageInstanceDoc {
        StorageInstanceDoc {
            id: "data/0".to_string(),
            kind: StorageKind::Block,
            life,
            owner: "unit-mysql-0".to_string(),
            storage_name: "data".to_string(),
            attachment_count,
        }
    }

    fn charm() -> CharmMeta {
        CharmMeta::new("mysql")
            .with_storage("data", CharmStorage::block().with_count(1, 3))
            .with_storage("logs", CharmStorage::filesystem())
            .with_storage("shared", CharmStorage::block().shared())
    }

    #[test]
    fn unit_templates_skip_shared_stores_and_sort_by_name() {
        let cons = ConstraintsMap::from([
            ("shared".to_string(), StorageConstraints::new("loop", 1, 1)),
            ("logs".to_string(), StorageConstraints::new("rootfs", 1, 1)),
            ("data".to_string(), StorageConstraints::new("loop", 1, 2)),
        ]);
        let templates = plan_instance_templates(&unit(), &charm(), &cons).unwrap();
        let names: Vec<_> = templates.iter().map(|t| t.storage_name.as_str()).collect();
        assert_eq!(names, ["data", "logs"]);
        assert_eq!(instance_count(&templates), 3);

        let app = Tag::Application(ApplicationTag::new("mysql").unwrap());
        let templates = plan_instance_templates(&app, &charm(), &cons).unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].storage_name, "shared");
    }

    #[test]
    fn undeclared_store_is_not_found() {
        let cons = ConstraintsMap::from([("cache".to_string(), StorageConstraints::new("loop", 1, 1))]);
        let err = plan_instance_templates(&unit(), &charm(), &cons).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn storage_owner_is_rejected() {
        let owner = Tag::Storage(StorageTag::new("data/0").unwrap());
        assert!(plan_instance_templates(&owner, &charm(), &ConstraintsMap::new()).is_err());
        assert!(create_storage_ops(&owner, &[], 0).is_err());
    }

    #[test]
    fn unit_instances_come_with_attachments() {
        let templates = vec![InstanceTemplate {
            storage_name: "data".to_string(),
            kind: StorageKind::Block,
            count: 2,
        }];
        let created = create_storage_ops(&unit(), &templates, 7).unwrap();

        assert_eq!(created.ops.len(), 4);
        assert_eq!(created.attachment_count, 2);
        let ids: Vec<_> = created.instances.iter().map(|t| t.id()).collect();
        assert_eq!(ids, ["data/7", "data/8"]);
        assert!(created.ops.iter().all(|op| op.assert == DocAssert::Missing));
        assert_eq!(created.ops[0].id, "u#mysql/0#data/7");
        assert_eq!(created.ops[1].id, "data/7");
        let DocEffect::Insert { body } = &created.ops[1].effect else {
            panic!("expected insert");
        };
        assert_eq!(body["attachment_count"], 1);
        assert_eq!(body["owner"], "unit-mysql-0");
    }

    #[test]
    fn application_instances_have_no_attachments() {
        let app = Tag::Application(ApplicationTag::new("mysql").unwrap());
        let templates = vec![InstanceTemplate {
            storage_name: "shared".to_string(),
            kind: StorageKind::Block,
            count: 1,
        }];
        let created = create_storage_ops(&app, &templates, 0).unwrap();
        assert_eq!(created.ops.len(), 1);
        assert_eq!(created.attachment_count, 0);
    }

    #[test]
    fn destroy_missing_or_dying_is_a_noop() {
        assert!(plan_destroy_instance(None).unwrap().is_noop());
        assert!(plan_destroy_instance(Some(&instance(Life::Dying, 1))).unwrap().is_noop());
    }

    #[test]
    fn destroy_unattached_removes_immediately() {
        let plan = plan_destroy_instance(Some(&instance(Life::Alive, 0))).unwrap();
        let ops = plan.ops();
        assert_eq!(ops.len(), 1);
        assert!(ops[0].is_remove());
        assert_eq!(
            ops[0].assert,
            DocAssert::Fields(vec![life_is(Life::Alive), FieldCondition::eq(FIELD_ATTACHMENT_COUNT, 0)])
        );
    }

    #[test]
    fn destroy_attached_marks_dying_and_schedules_cleanup() {
        let plan = plan_destroy_instance(Some(&instance(Life::Alive, 2))).unwrap();
        let ops = plan.ops();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].collection, CLEANUPS);
        assert_eq!(ops[1].collection, STORAGE_INSTANCES);
        assert_eq!(ops[1].effect, DocEffect::Update {
            updates: vec![FieldUpdate::set(FIELD_LIFE, "dying")]
        });
    }

    #[test]
    fn negative_count_is_corruption() {
        let err = plan_destroy_instance(Some(&instance(Life::Alive, -1))).unwrap_err();
        assert!(matches!(err, StorageError::CorruptedRecord { .. }));
    }
}
