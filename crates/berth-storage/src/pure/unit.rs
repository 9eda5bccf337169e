//! Unit and application provisioning plans.

use berth_doc_types::DocAssert;
use berth_doc_types::DocOp;
use berth_doc_types::FieldCondition;
use berth_doc_types::FieldUpdate;
use berth_txn::TxnPlan;

use super::instance::life_is;
use crate::error::StorageError;
use crate::records::APPLICATIONS;
use crate::records::ApplicationDoc;
use crate::records::FIELD_LIFE;
use crate::records::FIELD_STORAGE_ATTACHMENT_COUNT;
use crate::records::Life;
use crate::records::UNITS;
use crate::records::UnitDoc;

/// Insert `unit` together with `ops` (its constraints record and storage),
/// provided the unit is new and its application is alive.
pub fn plan_add_unit(
    unit: &UnitDoc,
    existing: Option<&UnitDoc>,
    application: Option<&ApplicationDoc>,
    ops: &[DocOp],
) -> Result<TxnPlan, StorageError> {
    if existing.is_some() {
        return Err(StorageError::AlreadyExists {
            what: format!("unit \"{}\"", unit.name),
        });
    }
    match application {
        None => {
            return Err(StorageError::NotFound {
                what: format!("application \"{}\"", unit.application),
            });
        }
        Some(app) if app.life != Life::Alive => {
            return Err(StorageError::Precondition {
                message: format!("application \"{}\" is not alive", app.name),
            });
        }
        Some(_) => {}
    }

    let mut batch = Vec::with_capacity(ops.len() + 2);
    batch.push(DocOp::check(APPLICATIONS, &unit.application, DocAssert::Fields(vec![life_is(Life::Alive)])));
    batch.push(DocOp::insert(UNITS, &unit.name, serde_json::to_value(unit)?));
    batch.extend_from_slice(ops);
    Ok(TxnPlan::apply(batch))
}

/// Insert `application` together with `ops`, provided it is new.
pub fn plan_add_application(
    application: &ApplicationDoc,
    existing: Option<&ApplicationDoc>,
    ops: &[DocOp],
) -> Result<TxnPlan, StorageError> {
    if existing.is_some() {
        return Err(StorageError::AlreadyExists {
            what: format!("application \"{}\"", application.name),
        });
    }
    let mut batch = Vec::with_capacity(ops.len() + 1);
    batch.push(DocOp::insert(APPLICATIONS, &application.name, serde_json::to_value(application)?));
    batch.extend_from_slice(ops);
    Ok(TxnPlan::apply(batch))
}

/// Anything short of Dead → Dead.
pub fn plan_ensure_unit_dead(unit_id: &str, unit: Option<&UnitDoc>) -> TxnPlan {
    match unit {
        Some(doc) if doc.life != Life::Dead => TxnPlan::apply(vec![DocOp::update(
            UNITS,
            unit_id,
            DocAssert::Fields(vec![FieldCondition::ne(FIELD_LIFE, Life::Dead.as_str())]),
            vec![FieldUpdate::set(FIELD_LIFE, Life::Dead.as_str())],
        )]),
        _ => TxnPlan::noop(),
    }
}

/// Remove a Dead unit that holds no storage attachments, along with
/// `cleanup_ops` for its constraints and owned instances.
pub fn plan_remove_unit(
    unit_id: &str,
    unit: Option<&UnitDoc>,
    cleanup_ops: Vec<DocOp>,
) -> Result<TxnPlan, StorageError> {
    let Some(doc) = unit else {
        return Ok(TxnPlan::noop());
    };
    if doc.life != Life::Dead {
        return Err(StorageError::Precondition {
            message: format!("unit \"{unit_id}\" is not dead"),
        });
    }
    if doc.storage_attachment_count != 0 {
        return Err(StorageError::Precondition {
            message: format!(
                "unit \"{unit_id}\" still has {} storage attachments",
                doc.storage_attachment_count
            ),
        });
    }

    let mut ops = Vec::with_capacity(cleanup_ops.len() + 1);
    ops.push(DocOp::remove(
        UNITS,
        unit_id,
        DocAssert::Fields(vec![life_is(Life::Dead), FieldCondition::eq(FIELD_STORAGE_ATTACHMENT_COUNT, 0)]),
    ));
    ops.extend(cleanup_ops);
    Ok(TxnPlan::apply(ops))
}
