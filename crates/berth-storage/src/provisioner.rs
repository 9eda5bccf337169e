//! Provisioning of units and applications with their storage.
//!
//! Adding an entity runs constraint defaulting and validation, allocates
//! instance ids, and commits the entity record, its constraints record and
//! all its storage in a single batch.

use std::sync::Arc;

use berth_doc_types::GetRequest;
use berth_traits::DocumentStore;
use berth_txn::TxnRunner;
use serde::de::DeserializeOwned;
use tracing::debug;
use tracing::info;

use crate::charm::CharmMeta;
use crate::config::ConfigError;
use crate::config::StorageConfig;
use crate::constraints::ConstraintsMap;
use crate::constraints::create_constraints_op;
use crate::constraints::remove_constraints_op;
use crate::error::StorageError;
use crate::instances::StorageInstances;
use crate::pure::CreatedStorage;
use crate::pure::plan_add_application;
use crate::pure::plan_add_unit;
use crate::pure::plan_ensure_unit_dead;
use crate::pure::plan_remove_unit;
use crate::records::APPLICATIONS;
use crate::records::ApplicationDoc;
use crate::records::Life;
use crate::records::UNITS;
use crate::records::UnitDoc;
use crate::records::decode_doc;
use crate::resolver::ConstraintResolver;
use crate::tags::ApplicationTag;
use crate::tags::Tag;
use crate::tags::UnitTag;

async fn read_doc<S: DocumentStore + ?Sized, T: DeserializeOwned>(
    store: &S,
    collection: &str,
    id: &str,
) -> Result<Option<T>, StorageError> {
    let result = store.get(GetRequest::new(collection, id)).await?;
    result.doc.as_ref().map(decode_doc::<T>).transpose()
}

/// Adds and removes storage-bearing units and applications.
pub struct Provisioner<S: DocumentStore + ?Sized> {
    runner: TxnRunner<S>,
    instances: StorageInstances<S>,
    resolver: ConstraintResolver,
}

impl<S: DocumentStore + ?Sized> Provisioner<S> {
    pub fn new(store: Arc<S>, config: &StorageConfig, resolver: ConstraintResolver) -> Self {
        Self {
            runner: TxnRunner::new(store.clone(), config.txn.clone()),
            instances: StorageInstances::new(store, config.txn.clone()),
            resolver,
        }
    }

    /// Provisioner using the pools in `config` and the built-in providers.
    pub fn from_config(store: Arc<S>, config: &StorageConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let resolver = ConstraintResolver::from_config(config)?;
        info!(
            feature_enabled = config.feature_enabled,
            env_type = %config.environ.env_type,
            "storage provisioner configured"
        );
        Ok(Self::new(store, config, resolver))
    }

    pub fn instances(&self) -> &StorageInstances<S> {
        &self.instances
    }

    pub fn resolver(&self) -> &ConstraintResolver {
        &self.resolver
    }

    async fn prepare(
        &self,
        owner: &Tag,
        charm: &CharmMeta,
        mut constraints: ConstraintsMap,
    ) -> Result<(ConstraintsMap, CreatedStorage), StorageError> {
        self.resolver.apply_defaults(&mut constraints, charm)?;
        self.resolver.validate(&constraints, charm)?;
        let created = self.instances.create_storage_ops(owner, charm, &constraints).await?;
        Ok((constraints, created))
    }

    /// Add `unit` with the storage its charm declares.
    ///
    /// The unit's application must exist and be alive.
    pub async fn add_unit(
        &self,
        unit: &UnitTag,
        charm: &CharmMeta,
        constraints: ConstraintsMap,
    ) -> Result<CreatedStorage, StorageError> {
        let annotation = format!("cannot add unit \"{}\"", unit.id());
        let owner = Tag::Unit(unit.clone());
        let (constraints, created) =
            self.prepare(&owner, charm, constraints).await.map_err(|e: StorageError| e.annotate(annotation.as_str()))?;

        let doc = UnitDoc {
            name: unit.id().to_string(),
            application: unit.application().id().to_string(),
            life: Life::Alive,
            storage_attachment_count: i64::try_from(created.attachment_count).unwrap_or(i64::MAX),
        };
        let mut ops = vec![create_constraints_op(&unit.global_key(), &constraints)?];
        ops.extend(created.ops.iter().cloned());

        let store = self.runner.store().as_ref();
        let (doc, ops) = (&doc, ops.as_slice());
        self.runner
            .run(&format!("add unit {}", unit.id()), move |_| async move {
                let existing: Option<UnitDoc> = read_doc(store, UNITS, &doc.name).await?;
                let application: Option<ApplicationDoc> = read_doc(store, APPLICATIONS, &doc.application).await?;
                plan_add_unit(doc, existing.as_ref(), application.as_ref(), ops)
            })
            .await
            .map_err(|e: StorageError| e.annotate(annotation.as_str()))?;

        debug!(unit = %unit.id(), instances = created.instances.len(), "added unit");
        Ok(created)
    }

    /// Add `application` with its shared storage.
    pub async fn add_application(
        &self,
        application: &ApplicationTag,
        charm: &CharmMeta,
        constraints: ConstraintsMap,
    ) -> Result<CreatedStorage, StorageError> {
        let annotation = format!("cannot add application \"{}\"", application.id());
        let owner = Tag::Application(application.clone());
        let (constraints, created) =
            self.prepare(&owner, charm, constraints).await.map_err(|e: StorageError| e.annotate(annotation.as_str()))?;

        let doc = ApplicationDoc {
            name: application.id().to_string(),
            charm: charm.name.clone(),
            life: Life::Alive,
        };
        let mut ops = vec![create_constraints_op(&application.global_key(), &constraints)?];
        ops.extend(created.ops.iter().cloned());

        let store = self.runner.store().as_ref();
        let (doc, ops) = (&doc, ops.as_slice());
        self.runner
            .run(&format!("add application {}", application.id()), move |_| async move {
                let existing: Option<ApplicationDoc> = read_doc(store, APPLICATIONS, &doc.name).await?;
                plan_add_application(doc, existing.as_ref(), ops)
            })
            .await
            .map_err(|e: StorageError| e.annotate(annotation.as_str()))?;

        debug!(application = %application.id(), instances = created.instances.len(), "added application");
        Ok(created)
    }

    /// Mark `unit` Dead. Its storage attachments are unaffected.
    pub async fn ensure_unit_dead(&self, unit: &UnitTag) -> Result<(), StorageError> {
        let store = self.runner.store().as_ref();
        let id = unit.id();
        self.runner
            .run(&format!("ensure unit {id} dead"), move |_| async move {
                let doc: Option<UnitDoc> = read_doc(store, UNITS, id).await?;
                Ok::<_, StorageError>(plan_ensure_unit_dead(id, doc.as_ref()))
            })
            .await
            .map_err(|e: StorageError| e.annotate(format!("cannot ensure death of unit \"{id}\"")))?;
        debug!(unit = %id, "unit is dead");
        Ok(())
    }

    /// Remove a Dead unit whose storage attachments are all gone, with its
    /// constraints record and the storage instances it owns.
    pub async fn remove_unit(&self, unit: &UnitTag) -> Result<(), StorageError> {
        let store = self.runner.store().as_ref();
        let instances = &self.instances;
        let id = unit.id();
        let owner = Tag::Unit(unit.clone());
        let owner = &owner;
        self.runner
            .run(&format!("remove unit {id}"), move |_| async move {
                let doc: Option<UnitDoc> = read_doc(store, UNITS, id).await?;
                if doc.is_none() {
                    return plan_remove_unit(id, None, Vec::new());
                }
                let mut cleanup_ops = vec![remove_constraints_op(&unit.global_key())];
                cleanup_ops.extend(instances.remove_owned_instances_ops(owner).await?);
                plan_remove_unit(id, doc.as_ref(), cleanup_ops)
            })
            .await
            .map_err(|e: StorageError| e.annotate(format!("cannot remove unit \"{id}\"")))?;
        debug!(unit = %id, "removed unit");
        Ok(())
    }
}
