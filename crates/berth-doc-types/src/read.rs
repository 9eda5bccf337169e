//! Read operation types for querying document state.

use berth_constants::api::DEFAULT_FIND_LIMIT;
use serde::Deserialize;
use serde::Serialize;

use crate::Document;
use crate::ops::FieldCondition;

/// Request to read a single document by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetRequest {
    pub collection: String,
    pub id: String,
}

impl GetRequest {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

/// Response from a point lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GetResult {
    pub doc: Option<Document>,
}

/// Request to read every document in a collection matching all conditions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FindRequest {
    pub collection: String,
    pub filter: Vec<FieldCondition>,
    pub limit: Option<u32>,
}

impl FindRequest {
    /// Match every document in the collection.
    pub fn all(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filter: Vec::new(),
            limit: None,
        }
    }

    /// Match documents whose fields satisfy every condition.
    pub fn filtered(collection: impl Into<String>, filter: Vec<FieldCondition>) -> Self {
        Self {
            collection: collection.into(),
            filter,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The effective limit, falling back to the default.
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_FIND_LIMIT)
    }
}

/// Response from a filtered read, ordered by document id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FindResult {
    pub docs: Vec<Document>,
    /// Whether more documents matched than the limit allowed.
    pub is_truncated: bool,
}
