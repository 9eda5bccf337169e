//! Stored documents.

use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::DocumentStoreError;
use crate::ops::FieldUpdate;

/// A document as read from the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub collection: String,
    pub id: String,
    pub body: Value,
    /// Store revision at which the document was last modified.
    pub revision: u64,
}

impl Document {
    /// Deserialize the body into a typed record.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.body)
    }
}

/// Apply field updates to a document body in place.
///
/// The body must be a JSON object, and `Inc` targets must be integers (or
/// absent, counting as zero).
pub fn apply_updates(
    collection: &str,
    id: &str,
    body: &mut Value,
    updates: &[FieldUpdate],
) -> Result<(), DocumentStoreError> {
    let invalid = |reason: String| DocumentStoreError::InvalidDocument {
        collection: collection.to_string(),
        id: id.to_string(),
        reason,
    };
    let Some(fields) = body.as_object_mut() else {
        return Err(invalid("document body is not an object".to_string()));
    };

    for update in updates {
        match update {
            FieldUpdate::Set { field, value } => {
                fields.insert(field.clone(), value.clone());
            }
            FieldUpdate::Inc { field, delta } => {
                let current = match fields.get(field) {
                    None | Some(Value::Null) => 0,
                    Some(value) => value
                        .as_i64()
                        .ok_or_else(|| invalid(format!("field '{field}' is not an integer")))?,
                };
                let next = current
                    .checked_add(*delta)
                    .ok_or_else(|| invalid(format!("field '{field}' overflowed")))?;
                fields.insert(field.clone(), Value::from(next));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn set_and_inc_updates() {
        let mut body = json!({"life": "alive", "attachment_count": 2});
        apply_updates("storageinstances", "data/0", &mut body, &[
            FieldUpdate::set("life", "dying"),
            FieldUpdate::inc("attachment_count", -1),
        ])
        .unwrap();
        assert_eq!(body, json!({"life": "dying", "attachment_count": 1}));
    }

    #[test]
    fn inc_of_missing_field_starts_at_zero() {
        let mut body = json!({});
        apply_updates("units", "mysql/0", &mut body, &[FieldUpdate::inc("storage_attachment_count", 3)]).unwrap();
        assert_eq!(body["storage_attachment_count"], json!(3));
    }

    #[test]
    fn inc_of_non_integer_is_rejected() {
        let mut body = json!({"life": "alive"});
        let err = apply_updates("units", "mysql/0", &mut body, &[FieldUpdate::inc("life", 1)]).unwrap_err();
        assert!(matches!(err, DocumentStoreError::InvalidDocument { .. }));
    }

    #[test]
    fn non_object_body_is_rejected() {
        let mut body = json!(7);
        let err = apply_updates("units", "mysql/0", &mut body, &[]).unwrap_err();
        assert!(matches!(err, DocumentStoreError::InvalidDocument { .. }));
    }

    #[test]
    fn decode_typed_body() {
        #[derive(Deserialize)]
        struct Counter {
            counter: u64,
        }
        let doc = Document {
            collection: "sequence".to_string(),
            id: "stores".to_string(),
            body: json!({"counter": 4}),
            revision: 9,
        };
        let counter: Counter = doc.decode().unwrap();
        assert_eq!(counter.counter, 4);
    }
}
