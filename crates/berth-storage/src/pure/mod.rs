//! Pure transaction planning for storage lifecycle operations.
//!
//! Every state transition is split into an impure shell that reads current
//! records and submits through the transaction runner, and a pure function
//! here that maps the records it read to a [`TxnPlan`](berth_txn::TxnPlan).
//! The functions do no I/O and never panic, so each transition can be unit
//! tested from hand-built records.
//!
//! # Module Organization
//!
//! - [`constraints`]: default filling and charm-level constraint checks
//! - [`instance`]: instance creation and destruction
//! - [`attachment`]: attachment destroy, ensure-dead and remove
//! - [`unit`]: adding units and applications, unit death and removal

pub mod attachment;
pub mod constraints;
pub mod instance;
pub mod unit;

pub use attachment::plan_destroy_attachment;
pub use attachment::plan_ensure_attachment_dead;
pub use attachment::plan_remove_attachment;
pub use constraints::check_instance_total;
pub use constraints::check_store_constraints;
pub use constraints::constraints_with_defaults;
pub use constraints::default_pool;
pub use constraints::missing_required_store;
pub use instance::CreatedStorage;
pub use instance::InstanceTemplate;
pub use instance::create_storage_ops;
pub use instance::instance_count;
pub use instance::plan_destroy_instance;
pub use instance::plan_instance_templates;
pub use instance::remove_instance_op;
pub use instance::remove_instances_ops;
pub use unit::plan_add_application;
pub use unit::plan_add_unit;
pub use unit::plan_ensure_unit_dead;
pub use unit::plan_remove_unit;
