//! Entity tags and identifiers.
//!
//! A tag names an entity together with its kind, in the form
//! `<kind>-<id>` with `/` in the id replaced by `-`:
//!
//! | entity      | id          | tag                 |
//! |-------------|-------------|---------------------|
//! | unit        | `mysql/0`   | `unit-mysql-0`      |
//! | application | `mysql`     | `application-mysql` |
//! | storage     | `data/3`    | `storage-data-3`    |
//!
//! Owner fields of stored records hold the tag string, so parsing a tag is
//! also how stored ownership is decoded.

use std::fmt;
use std::str::FromStr;

use crate::error::StorageError;

const UNIT_PREFIX: &str = "unit-";
const APPLICATION_PREFIX: &str = "application-";
const STORAGE_PREFIX: &str = "storage-";

fn invalid(tag: &str, reason: impl Into<String>) -> StorageError {
    StorageError::InvalidTag {
        tag: tag.to_string(),
        reason: reason.into(),
    }
}

/// Application and storage names: a lowercase letter followed by lowercase
/// letters, digits and single hyphens, not ending in a hyphen or in a
/// hyphen-separated number.
fn is_valid_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    let Some(first) = bytes.first() else {
        return false;
    };
    if !first.is_ascii_lowercase() {
        return false;
    }
    if !bytes.iter().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-') {
        return false;
    }
    if name.ends_with('-') || name.contains("--") {
        return false;
    }
    // "foo-1" would be ambiguous with a unit or storage number once encoded.
    !name.split('-').skip(1).any(|segment| segment.bytes().all(|b| b.is_ascii_digit()))
}

fn is_valid_number(number: &str) -> bool {
    !number.is_empty()
        && number.bytes().all(|b| b.is_ascii_digit())
        && (number == "0" || !number.starts_with('0'))
}

/// Split `<name>/<number>` and validate both halves.
fn split_numbered(id: &str) -> Option<(&str, &str)> {
    let (name, number) = id.split_once('/')?;
    (is_valid_name(name) && is_valid_number(number)).then_some((name, number))
}

/// Decode the `<name>-<number>` suffix of a tag back into `<name>/<number>`.
fn decode_numbered(suffix: &str) -> Option<String> {
    let (name, number) = suffix.rsplit_once('-')?;
    (is_valid_name(name) && is_valid_number(number)).then(|| format!("{name}/{number}"))
}

/// A unit of an application, identified as `<application>/<number>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitTag(String);

impl UnitTag {
    pub fn new(id: impl Into<String>) -> Result<Self, StorageError> {
        let id = id.into();
        if split_numbered(&id).is_none() {
            return Err(invalid(&id, "unit id must be <application>/<number>"));
        }
        Ok(Self(id))
    }

    /// The unit id, e.g. `mysql/0`.
    pub fn id(&self) -> &str {
        &self.0
    }

    pub fn application(&self) -> ApplicationTag {
        let name = self.0.split_once('/').map_or(self.0.as_str(), |(name, _)| name);
        ApplicationTag(name.to_string())
    }

    /// Key under which per-unit records (constraints, attachments) are filed.
    pub fn global_key(&self) -> String {
        format!("u#{}", self.0)
    }
}

/// An application, identified by name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApplicationTag(String);

impl ApplicationTag {
    pub fn new(name: impl Into<String>) -> Result<Self, StorageError> {
        let name = name.into();
        if !is_valid_name(&name) {
            return Err(invalid(&name, "invalid application name"));
        }
        Ok(Self(name))
    }

    pub fn id(&self) -> &str {
        &self.0
    }

    pub fn global_key(&self) -> String {
        format!("a#{}", self.0)
    }
}

/// A storage instance, identified as `<storage name>/<sequence>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StorageTag(String);

impl StorageTag {
    pub fn new(id: impl Into<String>) -> Result<Self, StorageError> {
        let id = id.into();
        if split_numbered(&id).is_none() {
            return Err(invalid(&id, "storage id must be <storage name>/<number>"));
        }
        Ok(Self(id))
    }

    /// Build the id of the `sequence`th instance of `storage_name`.
    pub fn from_parts(storage_name: &str, sequence: u64) -> Result<Self, StorageError> {
        Self::new(format!("{storage_name}/{sequence}"))
    }

    pub fn id(&self) -> &str {
        &self.0
    }

    /// The charm storage name this instance belongs to.
    pub fn storage_name(&self) -> &str {
        self.0.split_once('/').map_or(self.0.as_str(), |(name, _)| name)
    }
}

/// Any entity that can be named by a tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tag {
    Unit(UnitTag),
    Application(ApplicationTag),
    Storage(StorageTag),
}

impl Tag {
    pub fn kind(&self) -> &'static str {
        match self {
            Tag::Unit(_) => "unit",
            Tag::Application(_) => "application",
            Tag::Storage(_) => "storage",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Tag::Unit(t) => t.id(),
            Tag::Application(t) => t.id(),
            Tag::Storage(t) => t.id(),
        }
    }
}

impl fmt::Display for UnitTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{UNIT_PREFIX}{}", self.0.replace('/', "-"))
    }
}

impl fmt::Display for ApplicationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{APPLICATION_PREFIX}{}", self.0)
    }
}

impl fmt::Display for StorageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{STORAGE_PREFIX}{}", self.0.replace('/', "-"))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Unit(t) => fmt::Display::fmt(t, f),
            Tag::Application(t) => fmt::Display::fmt(t, f),
            Tag::Storage(t) => fmt::Display::fmt(t, f),
        }
    }
}

impl FromStr for Tag {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(suffix) = s.strip_prefix(UNIT_PREFIX) {
            let id = decode_numbered(suffix).ok_or_else(|| invalid(s, "not a valid unit tag"))?;
            return Ok(Tag::Unit(UnitTag(id)));
        }
        if let Some(name) = s.strip_prefix(APPLICATION_PREFIX) {
            return ApplicationTag::new(name).map(Tag::Application).map_err(|_| invalid(s, "not a valid application tag"));
        }
        if let Some(suffix) = s.strip_prefix(STORAGE_PREFIX) {
            let id = decode_numbered(suffix).ok_or_else(|| invalid(s, "not a valid storage tag"))?;
            return Ok(Tag::Storage(StorageTag(id)));
        }
        Err(invalid(s, "unknown tag kind"))
    }
}

impl From<UnitTag> for Tag {
    fn from(tag: UnitTag) -> Self {
        Tag::Unit(tag)
    }
}

impl From<ApplicationTag> for Tag {
    fn from(tag: ApplicationTag) -> Self {
        Tag::Application(tag)
    }
}

impl From<StorageTag> for Tag {
    fn from(tag: StorageTag) -> Self {
        Tag::Storage(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_tag_round_trips_through_string_form() {
        let unit = UnitTag::new("my-sql/12").unwrap();
        assert_eq!(unit.to_string(), "unit-my-sql-12");
        assert_eq!("unit-my-sql-12".parse::<Tag>().unwrap(), Tag::Unit(unit.clone()));
        assert_eq!(unit.application().id(), "my-sql");
        assert_eq!(unit.global_key(), "u#my-sql/12");
    }

    #[test]
    fn storage_tag_parts() {
        let storage = StorageTag::from_parts("data", 3).unwrap();
        assert_eq!(storage.id(), "data/3");
        assert_eq!(storage.storage_name(), "data");
        assert_eq!(storage.to_string(), "storage-data-3");
        assert_eq!("storage-data-3".parse::<Tag>().unwrap(), Tag::Storage(storage));
    }

    #[test]
    fn application_tag_parses() {
        let tag: Tag = "application-wordpress".parse().unwrap();
        assert_eq!(tag.kind(), "application");
        assert_eq!(tag.id(), "wordpress");
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(UnitTag::new("mysql").is_err());
        assert!(UnitTag::new("mysql/").is_err());
        assert!(UnitTag::new("mysql/01").is_err());
        assert!(UnitTag::new("MySQL/0").is_err());
        assert!(StorageTag::new("data-1/0").is_err());
        assert!(ApplicationTag::new("").is_err());
        assert!(ApplicationTag::new("9lives").is_err());
    }

    #[test]
    fn rejects_malformed_tags() {
        for bad in ["", "unit-mysql", "machine-0", "storage-", "application-", "unit-mysql-x"] {
            let err = bad.parse::<Tag>().unwrap_err();
            assert!(matches!(err, StorageError::InvalidTag { .. }), "{bad}: {err}");
        }
    }
}
