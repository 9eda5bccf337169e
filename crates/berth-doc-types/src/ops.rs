//! Conditional operation types for atomic multi-document writes.

use std::cmp::Ordering;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Comparison operator for field conditions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Greater,
    Less,
}

/// A condition over a single top-level field of a document.
///
/// A missing field compares as JSON `null`. Ordering comparisons are only
/// defined between two numbers or two strings; any other pairing fails the
/// condition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldCondition {
    pub field: String,
    pub op: CompareOp,
    pub value: Value,
}

impl FieldCondition {
    pub fn new(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, CompareOp::Equal, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, CompareOp::NotEqual, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, CompareOp::Greater, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, CompareOp::Less, value)
    }

    /// Evaluate this condition against a document body.
    pub fn holds(&self, body: &Value) -> bool {
        let actual = body.get(&self.field).unwrap_or(&Value::Null);
        match self.op {
            CompareOp::Equal => actual == &self.value,
            CompareOp::NotEqual => actual != &self.value,
            CompareOp::Greater => compare_values(actual, &self.value) == Some(Ordering::Greater),
            CompareOp::Less => compare_values(actual, &self.value) == Some(Ordering::Less),
        }
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// The precondition an operation places on its target document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub enum DocAssert {
    /// No precondition.
    #[default]
    Any,
    /// The document must not exist.
    Missing,
    /// The document must exist.
    Exists,
    /// The document must exist and every condition must hold.
    Fields(Vec<FieldCondition>),
}

impl DocAssert {
    /// Evaluate the assertion against the current document body, if any.
    pub fn holds(&self, current: Option<&Value>) -> bool {
        match (self, current) {
            (DocAssert::Any, _) => true,
            (DocAssert::Missing, current) => current.is_none(),
            (DocAssert::Exists, current) => current.is_some(),
            (DocAssert::Fields(_), None) => false,
            (DocAssert::Fields(conditions), Some(body)) => conditions.iter().all(|c| c.holds(body)),
        }
    }
}

/// A mutation of a single field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum FieldUpdate {
    /// Replace the field's value.
    Set { field: String, value: Value },
    /// Add `delta` to an integer field; a missing field counts as zero.
    Inc { field: String, delta: i64 },
}

impl FieldUpdate {
    pub fn set(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Set {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn inc(field: impl Into<String>, delta: i64) -> Self {
        Self::Inc {
            field: field.into(),
            delta,
        }
    }
}

/// What an operation does to its target once every assertion holds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DocEffect {
    /// Only check the assertion.
    None,
    /// Create the document with the given body.
    Insert { body: Value },
    /// Apply field updates to the existing document.
    Update { updates: Vec<FieldUpdate> },
    /// Delete the document.
    Remove,
}

/// A single conditional operation within a transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocOp {
    pub collection: String,
    pub id: String,
    pub assert: DocAssert,
    pub effect: DocEffect,
}

impl DocOp {
    /// Insert a document, asserting it does not already exist.
    pub fn insert(collection: impl Into<String>, id: impl Into<String>, body: Value) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            assert: DocAssert::Missing,
            effect: DocEffect::Insert { body },
        }
    }

    /// Update fields of a document if the assertion holds.
    pub fn update(
        collection: impl Into<String>,
        id: impl Into<String>,
        assert: DocAssert,
        updates: Vec<FieldUpdate>,
    ) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            assert,
            effect: DocEffect::Update { updates },
        }
    }

    /// Remove a document if the assertion holds.
    pub fn remove(collection: impl Into<String>, id: impl Into<String>, assert: DocAssert) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            assert,
            effect: DocEffect::Remove,
        }
    }

    /// Assert on a document without changing it.
    pub fn check(collection: impl Into<String>, id: impl Into<String>, assert: DocAssert) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            assert,
            effect: DocEffect::None,
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self.effect, DocEffect::Insert { .. })
    }

    pub fn is_remove(&self) -> bool {
        matches!(self.effect, DocEffect::Remove)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn equal_condition_matches_field() {
        let body = json!({"life": "alive", "attachment_count": 2});
        assert!(FieldCondition::eq("life", "alive").holds(&body));
        assert!(!FieldCondition::eq("life", "dying").holds(&body));
    }

    #[test]
    fn missing_field_compares_as_null() {
        let body = json!({"life": "alive"});
        assert!(FieldCondition::eq("owner", Value::Null).holds(&body));
        assert!(FieldCondition::ne("owner", "u#mysql/0").holds(&body));
        assert!(!FieldCondition::gt("attachment_count", 0).holds(&body));
    }

    #[test]
    fn ordering_conditions_on_numbers() {
        let body = json!({"attachment_count": 1});
        assert!(FieldCondition::gt("attachment_count", 0).holds(&body));
        assert!(!FieldCondition::gt("attachment_count", 1).holds(&body));
        assert!(FieldCondition::lt("attachment_count", 2).holds(&body));
    }

    #[test]
    fn ordering_between_mismatched_types_fails() {
        let body = json!({"attachment_count": "1"});
        assert!(!FieldCondition::gt("attachment_count", 0).holds(&body));
        assert!(!FieldCondition::lt("attachment_count", 5).holds(&body));
    }

    #[test]
    fn doc_assert_variants() {
        let body = json!({"life": "dead"});
        assert!(DocAssert::Any.holds(None));
        assert!(DocAssert::Missing.holds(None));
        assert!(!DocAssert::Missing.holds(Some(&body)));
        assert!(DocAssert::Exists.holds(Some(&body)));
        assert!(!DocAssert::Fields(vec![]).holds(None));
        assert!(DocAssert::Fields(vec![FieldCondition::eq("life", "dead")]).holds(Some(&body)));
    }

    #[test]
    fn insert_asserts_missing() {
        let op = DocOp::insert("storageinstances", "data/0", json!({}));
        assert_eq!(op.assert, DocAssert::Missing);
        assert!(op.is_insert());
        assert!(!op.is_remove());
    }
}
