//! Transaction types for atomic multi-document conditional writes.

use serde::Deserialize;
use serde::Serialize;

use crate::ops::DocOp;

/// A batch of conditional operations applied all-or-nothing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TxnRequest {
    pub ops: Vec<DocOp>,
}

impl TxnRequest {
    pub fn new(ops: Vec<DocOp>) -> Self {
        Self { ops }
    }
}

/// Result of a transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TxnResult {
    /// Whether every assertion held and the operations were applied.
    pub conditions_met: bool,
    /// Index of the first operation whose assertion failed.
    pub failed_op_index: Option<u32>,
    /// Store revision after the commit, when applied.
    pub revision: Option<u64>,
}

impl TxnResult {
    pub fn applied(revision: u64) -> Self {
        Self {
            conditions_met: true,
            failed_op_index: None,
            revision: Some(revision),
        }
    }

    pub fn aborted(failed_op_index: u32) -> Self {
        Self {
            conditions_met: false,
            failed_op_index: Some(failed_op_index),
            revision: None,
        }
    }
}
