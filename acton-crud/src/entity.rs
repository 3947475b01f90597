//! Entity contracts and static schema descriptors
//!
//! Entities are plain value types. Their structure is described by a static
//! [`Schema`] so filters can be validated and evaluated without reflection:
//!
//! - [`Identified`]: anything carrying an optional identifier (entities and DTOs)
//! - [`Record`]: dynamic field and relationship access used by predicate evaluation
//! - [`Entity`]: a persistable record with a schema
//! - [`entity_identity!`](crate::entity_identity): id-based equality, hashing and ordering
//!
//! # Example
//!
//! ```rust
//! use acton_crud::entity::{Entity, FieldDef, Identified, Record, Related, Schema};
//! use acton_crud::filter::FilterValue;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Tag {
//!     id: Option<i64>,
//!     label: String,
//! }
//!
//! acton_crud::entity_identity!(Tag);
//!
//! static TAG: Schema = Schema::new("tag", &[FieldDef::integer("id"), FieldDef::text("label")], &[]);
//!
//! impl Identified for Tag {
//!     type Id = i64;
//!     fn id(&self) -> Option<&i64> {
//!         self.id.as_ref()
//!     }
//! }
//!
//! impl Record for Tag {
//!     fn value(&self, field: &str) -> Option<FilterValue> {
//!         match field {
//!             "id" => Some(self.id.into()),
//!             "label" => Some(self.label.as_str().into()),
//!             _ => None,
//!         }
//!     }
//!
//!     fn related(&self, _relation: &str) -> Related<'_> {
//!         Related::Unknown
//!     }
//! }
//!
//! impl Entity for Tag {
//!     fn schema() -> &'static Schema {
//!         &TAG
//!     }
//!
//!     fn with_id(self, id: i64) -> Self {
//!         Self { id: Some(id), ..self }
//!     }
//! }
//! ```

use std::fmt;
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::filter::FilterValue;

/// A value that may carry a unique, immutable-once-assigned identifier
pub trait Identified {
    /// Identifier type
    type Id: Clone
        + Eq
        + Ord
        + Hash
        + fmt::Debug
        + fmt::Display
        + Into<FilterValue>
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static;

    /// The identifier, or `None` before one has been assigned
    fn id(&self) -> Option<&Self::Id>;
}

/// Related records reachable through a named relationship
pub enum Related<'a> {
    /// To-one relationship; `None` when unset
    One(Option<&'a dyn Record>),
    /// To-many relationship
    Many(Vec<&'a dyn Record>),
    /// The record has no relationship with that name
    Unknown,
}

/// Dynamic, read-only access to a record's fields and relationships
pub trait Record: Send + Sync {
    /// Value of a scalar or element-collection field
    ///
    /// Returns `None` when the record has no such field and
    /// `Some(FilterValue::Null)` when the field is present but unset.
    fn value(&self, field: &str) -> Option<FilterValue>;

    /// Records reachable through a relationship
    fn related(&self, relation: &str) -> Related<'_>;
}

/// A persistable entity
pub trait Entity:
    Identified + Record + Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Static description of the entity's fields and relationships
    fn schema() -> &'static Schema;

    /// A copy of this entity carrying the given identifier
    fn with_id(self, id: Self::Id) -> Self;

    /// Entity type name used in logs, errors and cache names
    fn name() -> &'static str {
        Self::schema().name
    }
}

/// Declared type of an entity field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Text field
    Text,
    /// Integral number
    Integer,
    /// Floating point number
    Float,
    /// Boolean flag
    Boolean,
    /// Calendar date
    Date,
    /// Time of day
    Time,
    /// Date and time
    DateTime,
    /// UUID
    Uuid,
    /// Collection of scalar elements
    Collection,
}

impl FieldKind {
    /// Whether values of this kind are ordered (ranges and sorting apply)
    pub fn is_ordered(self) -> bool {
        !matches!(self, Self::Boolean | Self::Collection)
    }

    /// Whether this kind is a number
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }

    /// Whether this kind is temporal
    pub fn is_temporal(self) -> bool {
        matches!(self, Self::Date | Self::Time | Self::DateTime)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::Boolean => write!(f, "boolean"),
            Self::Date => write!(f, "date"),
            Self::Time => write!(f, "time"),
            Self::DateTime => write!(f, "datetime"),
            Self::Uuid => write!(f, "uuid"),
            Self::Collection => write!(f, "collection"),
        }
    }
}

/// A declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name as used in filters and sorts
    pub name: &'static str,
    /// Declared type
    pub kind: FieldKind,
}

impl FieldDef {
    /// Declare a field
    #[must_use]
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }

    /// Declare a text field
    #[must_use]
    pub const fn text(name: &'static str) -> Self {
        Self::new(name, FieldKind::Text)
    }

    /// Declare an integer field
    #[must_use]
    pub const fn integer(name: &'static str) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    /// Declare a float field
    #[must_use]
    pub const fn float(name: &'static str) -> Self {
        Self::new(name, FieldKind::Float)
    }

    /// Declare a boolean field
    #[must_use]
    pub const fn boolean(name: &'static str) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    /// Declare a date field
    #[must_use]
    pub const fn date(name: &'static str) -> Self {
        Self::new(name, FieldKind::Date)
    }

    /// Declare a date-time field
    #[must_use]
    pub const fn datetime(name: &'static str) -> Self {
        Self::new(name, FieldKind::DateTime)
    }

    /// Declare a UUID field
    #[must_use]
    pub const fn uuid(name: &'static str) -> Self {
        Self::new(name, FieldKind::Uuid)
    }

    /// Declare an element-collection field
    #[must_use]
    pub const fn collection(name: &'static str) -> Self {
        Self::new(name, FieldKind::Collection)
    }
}

/// Cardinality of a relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// At most one related record
    ToOne,
    /// Any number of related records; joining it can multiply root rows
    ToMany,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ToOne => write!(f, "to_one"),
            Self::ToMany => write!(f, "to_many"),
        }
    }
}

/// A declared relationship to another entity
#[derive(Debug, Clone, Copy)]
pub struct RelationDef {
    /// Relationship name as used in filters
    pub name: &'static str,
    /// Cardinality of the relationship
    pub cardinality: Cardinality,
    /// Schema of the related entity
    pub target: fn() -> &'static Schema,
}

impl RelationDef {
    /// Declare a to-one relationship
    #[must_use]
    pub const fn to_one(name: &'static str, target: fn() -> &'static Schema) -> Self {
        Self {
            name,
            cardinality: Cardinality::ToOne,
            target,
        }
    }

    /// Declare a to-many relationship
    #[must_use]
    pub const fn to_many(name: &'static str, target: fn() -> &'static Schema) -> Self {
        Self {
            name,
            cardinality: Cardinality::ToMany,
            target,
        }
    }
}

/// Static description of an entity type
#[derive(Debug)]
pub struct Schema {
    /// Entity type name
    pub name: &'static str,
    /// Scalar and element-collection fields
    pub fields: &'static [FieldDef],
    /// Relationships to other entities
    pub relations: &'static [RelationDef],
}

impl Schema {
    /// Describe an entity type
    #[must_use]
    pub const fn new(
        name: &'static str,
        fields: &'static [FieldDef],
        relations: &'static [RelationDef],
    ) -> Self {
        Self {
            name,
            fields,
            relations,
        }
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a relationship by name
    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Names of every declared relationship
    pub fn relation_names(&self) -> Vec<&'static str> {
        self.relations.iter().map(|r| r.name).collect()
    }
}

/// Identifier types a backend can generate from a sequence number
pub trait GeneratedId: Sized {
    /// Produce the identifier for the given 1-based sequence number
    fn generate(sequence: u64) -> Self;

    /// Sequence number this identifier occupies, if it maps onto one
    fn sequence(&self) -> Option<u64>;
}

impl GeneratedId for i64 {
    fn generate(sequence: u64) -> Self {
        i64::try_from(sequence).unwrap_or(i64::MAX)
    }

    fn sequence(&self) -> Option<u64> {
        u64::try_from(*self).ok()
    }
}

impl GeneratedId for i32 {
    fn generate(sequence: u64) -> Self {
        i32::try_from(sequence).unwrap_or(i32::MAX)
    }

    fn sequence(&self) -> Option<u64> {
        u64::try_from(*self).ok()
    }
}

impl GeneratedId for u64 {
    fn generate(sequence: u64) -> Self {
        sequence
    }

    fn sequence(&self) -> Option<u64> {
        Some(*self)
    }
}

impl GeneratedId for String {
    fn generate(sequence: u64) -> Self {
        sequence.to_string()
    }

    fn sequence(&self) -> Option<u64> {
        self.parse().ok()
    }
}

impl GeneratedId for uuid::Uuid {
    fn generate(_sequence: u64) -> Self {
        uuid::Uuid::now_v7()
    }

    fn sequence(&self) -> Option<u64> {
        None
    }
}

/// Implement identity-based `PartialEq`, `Eq`, `Hash` and `PartialOrd`
///
/// Two values are equal when they are the same instance or both carry the
/// same identifier. Values without an identifier are only equal to
/// themselves. The hash depends on the concrete type only, so it stays stable
/// when an identifier is assigned.
#[macro_export]
macro_rules! entity_identity {
    ($ty:ty) => {
        impl ::std::cmp::PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                ::std::ptr::eq(self, other)
                    || matches!(
                        (
                            $crate::entity::Identified::id(self),
                            $crate::entity::Identified::id(other),
                        ),
                        (Some(a), Some(b)) if a == b
                    )
            }
        }

        impl ::std::cmp::Eq for $ty {}

        impl ::std::hash::Hash for $ty {
            fn hash<H: ::std::hash::Hasher>(&self, state: &mut H) {
                ::std::any::type_name::<$ty>().hash(state);
            }
        }

        impl ::std::cmp::PartialOrd for $ty {
            fn partial_cmp(&self, other: &Self) -> Option<::std::cmp::Ordering> {
                if ::std::ptr::eq(self, other) {
                    return Some(::std::cmp::Ordering::Equal);
                }
                match (
                    $crate::entity::Identified::id(self),
                    $crate::entity::Identified::id(other),
                ) {
                    (Some(a), Some(b)) => Some(a.cmp(b)),
                    _ => None,
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::Hasher;

    #[derive(Debug, Clone)]
    struct Widget {
        id: Option<u64>,
        label: String,
    }

    crate::entity_identity!(Widget);

    impl Identified for Widget {
        type Id = u64;
        fn id(&self) -> Option<&u64> {
            self.id.as_ref()
        }
    }

    static PART: Schema = Schema::new("part", &[FieldDef::text("code")], &[]);
    static WIDGET: Schema = Schema::new(
        "widget",
        &[FieldDef::integer("id"), FieldDef::text("label")],
        &[RelationDef::to_many("parts", part_schema)],
    );

    fn part_schema() -> &'static Schema {
        &PART
    }

    fn hash_of(w: &Widget) -> u64 {
        let mut hasher = DefaultHasher::new();
        w.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_identity_equality_ignores_other_fields() {
        let a = Widget { id: Some(1), label: "a".into() };
        let b = Widget { id: Some(1), label: "b".into() };
        let c = Widget { id: Some(2), label: "a".into() };
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a < c);
    }

    #[test]
    fn test_unassigned_ids_are_only_equal_to_themselves() {
        let a = Widget { id: None, label: "same".into() };
        let b = Widget { id: None, label: "same".into() };
        assert_eq!(a, a);
        assert_ne!(a, b);
        assert_eq!(a.partial_cmp(&b), None);
    }

    #[test]
    fn test_hash_is_stable_across_id_assignment() {
        let mut w = Widget { id: None, label: "x".into() };
        let before = hash_of(&w);
        w.id = Some(99);
        assert_eq!(before, hash_of(&w));
        assert_eq!(w.label, "x");
    }

    #[test]
    fn test_schema_lookup() {
        assert_eq!(WIDGET.field("label").map(|f| f.kind), Some(FieldKind::Text));
        assert!(WIDGET.field("missing").is_none());
        let parts = WIDGET.relation("parts").expect("relation declared");
        assert_eq!(parts.cardinality, Cardinality::ToMany);
        assert_eq!((parts.target)().name, "part");
        assert_eq!(WIDGET.relation_names(), vec!["parts"]);
    }

    #[test]
    fn test_field_kind_classification() {
        assert!(FieldKind::Integer.is_numeric());
        assert!(FieldKind::DateTime.is_temporal());
        assert!(FieldKind::Text.is_ordered());
        assert!(!FieldKind::Boolean.is_ordered());
        assert_eq!(FieldKind::DateTime.to_string(), "datetime");
    }

    #[test]
    fn test_generated_ids() {
        assert_eq!(i64::generate(7), 7);
        assert_eq!(String::generate(3), "3");
        assert_ne!(uuid::Uuid::generate(1), uuid::Uuid::generate(1));
    }

    #[test]
    fn test_generated_id_sequence() {
        assert_eq!(42i64.sequence(), Some(42));
        assert_eq!((-1i32).sequence(), None);
        assert_eq!("17".to_string().sequence(), Some(17));
        assert_eq!("abc".to_string().sequence(), None);
        assert_eq!(uuid::Uuid::now_v7().sequence(), None);
    }
}
