//! Filter values, operators and leaf conditions
//!
//! These are the primitive building blocks of every predicate: a
//! [`FilterCondition`] compares one field against a [`FilterValue`] using a
//! [`FilterOperator`].
//!
//! # Example
//!
//! ```rust
//! use acton_crud::filter::{FilterCondition, FilterOperator};
//!
//! let by_status = FilterCondition::eq("status", "active");
//! let by_name = FilterCondition::contains("name", "acme");
//! assert_eq!(by_name.operator, FilterOperator::Contains);
//! assert!(!by_name.case_sensitive);
//! ```

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::entity::FieldKind;

/// Comparison operators for filter conditions
///
/// # Example
///
/// ```rust
/// use acton_crud::filter::FilterOperator;
///
/// assert_eq!(format!("{}", FilterOperator::Equal), "=");
/// assert_eq!(format!("{}", FilterOperator::NotIn), "NOT IN");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    /// Equal to (=)
    Equal,
    /// Not equal to (!=)
    NotEqual,
    /// Greater than (>)
    GreaterThan,
    /// Greater than or equal to (>=)
    GreaterThanOrEqual,
    /// Less than (<)
    LessThan,
    /// Less than or equal to (<=)
    LessThanOrEqual,
    /// Value is in a list (IN)
    In,
    /// Value is not in a list (NOT IN)
    NotIn,
    /// Value is null (IS NULL)
    IsNull,
    /// Value is not null (IS NOT NULL)
    IsNotNull,
    /// Text contains the value
    Contains,
    /// Text does not contain the value
    NotContains,
    /// Text starts with the value
    StartsWith,
    /// Text ends with the value
    EndsWith,
    /// Element collection is empty
    IsEmpty,
    /// Element collection is not empty
    IsNotEmpty,
    /// Value is an element of the collection
    MemberOf,
    /// Value is not an element of the collection
    NotMemberOf,
}

impl FilterOperator {
    /// Whether the operator can be applied to a field of the given kind
    pub fn accepts(self, kind: FieldKind) -> bool {
        match self {
            Self::Equal | Self::NotEqual | Self::IsNull | Self::IsNotNull => true,
            Self::In | Self::NotIn => kind != FieldKind::Collection,
            Self::GreaterThan
            | Self::GreaterThanOrEqual
            | Self::LessThan
            | Self::LessThanOrEqual => kind.is_ordered(),
            Self::Contains | Self::NotContains | Self::StartsWith | Self::EndsWith => {
                kind == FieldKind::Text
            }
            Self::IsEmpty | Self::IsNotEmpty | Self::MemberOf | Self::NotMemberOf => {
                kind == FieldKind::Collection
            }
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => write!(f, "="),
            Self::NotEqual => write!(f, "!="),
            Self::GreaterThan => write!(f, ">"),
            Self::GreaterThanOrEqual => write!(f, ">="),
            Self::LessThan => write!(f, "<"),
            Self::LessThanOrEqual => write!(f, "<="),
            Self::In => write!(f, "IN"),
            Self::NotIn => write!(f, "NOT IN"),
            Self::IsNull => write!(f, "IS NULL"),
            Self::IsNotNull => write!(f, "IS NOT NULL"),
            Self::Contains => write!(f, "CONTAINS"),
            Self::NotContains => write!(f, "NOT CONTAINS"),
            Self::StartsWith => write!(f, "STARTS WITH"),
            Self::EndsWith => write!(f, "ENDS WITH"),
            Self::IsEmpty => write!(f, "IS EMPTY"),
            Self::IsNotEmpty => write!(f, "IS NOT EMPTY"),
            Self::MemberOf => write!(f, "MEMBER OF"),
            Self::NotMemberOf => write!(f, "NOT MEMBER OF"),
        }
    }
}

/// A value that can be used in filter conditions
///
/// # Example
///
/// ```rust
/// use acton_crud::filter::FilterValue;
///
/// let string_val: FilterValue = "active".into();
/// let int_val: FilterValue = 42_i64.into();
/// let missing: FilterValue = Option::<i64>::None.into();
/// assert!(missing.is_null());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// String value
    String(String),
    /// 64-bit integer value
    Integer(i64),
    /// 64-bit floating point value
    Float(f64),
    /// Boolean value
    Boolean(bool),
    /// UUID value
    Uuid(Uuid),
    /// Calendar date
    Date(NaiveDate),
    /// Time of day
    Time(NaiveTime),
    /// UTC timestamp
    DateTime(DateTime<Utc>),
    /// List of values (IN lists and element collections)
    List(Vec<FilterValue>),
    /// Null value
    Null,
}

impl FilterValue {
    /// Whether this is the null value
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Boolean(_) => "boolean",
            Self::Uuid(_) => "uuid",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::DateTime(_) => "datetime",
            Self::List(_) => "list",
            Self::Null => "null",
        }
    }

    /// Whether the value can be compared with a field of the given kind
    pub fn compatible_with(&self, kind: FieldKind) -> bool {
        match self {
            Self::Null => true,
            Self::List(items) => items.iter().all(|v| v.compatible_with(kind)),
            _ if kind == FieldKind::Collection => true,
            Self::String(_) => kind == FieldKind::Text,
            Self::Integer(_) | Self::Float(_) => kind.is_numeric(),
            Self::Boolean(_) => kind == FieldKind::Boolean,
            Self::Uuid(_) => kind == FieldKind::Uuid,
            Self::Date(_) => kind == FieldKind::Date,
            Self::Time(_) => kind == FieldKind::Time,
            Self::DateTime(_) => kind == FieldKind::DateTime,
        }
    }

    /// Compare two scalar values of the same family
    ///
    /// Integers and floats compare numerically. Values of unrelated types,
    /// nulls and lists are unordered.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Integer(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            (Self::Float(a), Self::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Self::Boolean(a), Self::Boolean(b)) => Some(a.cmp(b)),
            (Self::Uuid(a), Self::Uuid(b)) => Some(a.cmp(b)),
            (Self::Date(a), Self::Date(b)) => Some(a.cmp(b)),
            (Self::Time(a), Self::Time(b)) => Some(a.cmp(b)),
            (Self::DateTime(a), Self::DateTime(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Value equality with numeric widening
    pub fn matches(&self, other: &Self) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }

    /// The textual content of a string value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The elements of a list value
    pub fn as_list(&self) -> Option<&[FilterValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{:?}", s),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Float(n) => write!(f, "{}", n),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Uuid(u) => write!(f, "{}", u),
            Self::Date(d) => write!(f, "{}", d),
            Self::Time(t) => write!(f, "{}", t),
            Self::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Self::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Self::Null => write!(f, "NULL"),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&String> for FilterValue {
    fn from(s: &String) -> Self {
        Self::String(s.clone())
    }
}

impl From<i64> for FilterValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<i32> for FilterValue {
    fn from(n: i32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<u32> for FilterValue {
    fn from(n: u32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<u64> for FilterValue {
    fn from(n: u64) -> Self {
        Self::Integer(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<f64> for FilterValue {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<Uuid> for FilterValue {
    fn from(u: Uuid) -> Self {
        Self::Uuid(u)
    }
}

impl From<NaiveDate> for FilterValue {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl From<NaiveTime> for FilterValue {
    fn from(t: NaiveTime) -> Self {
        Self::Time(t)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt)
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(list: Vec<T>) -> Self {
        Self::List(list.into_iter().map(Into::into).collect())
    }
}

/// A single filter condition on one field
///
/// # Example
///
/// ```rust
/// use acton_crud::filter::FilterCondition;
///
/// let age = FilterCondition::gte("age", 18_i64);
/// let deleted = FilterCondition::is_null("deleted_at");
/// let name = FilterCondition::starts_with("name", "Ac").with_case_sensitive(true);
/// assert_eq!(age.to_string(), "age >= 18");
/// assert_eq!(deleted.to_string(), "deleted_at IS NULL");
/// assert!(name.case_sensitive);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    /// The field name to filter on
    pub field: String,
    /// The comparison operator
    pub operator: FilterOperator,
    /// The value to compare against
    pub value: FilterValue,
    /// Whether text matching respects case
    pub case_sensitive: bool,
}

impl FilterCondition {
    /// Create a new filter condition
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: FilterValue) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
            case_sensitive: false,
        }
    }

    /// Create an equality filter (field = value)
    pub fn eq(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::Equal, value.into())
    }

    /// Create a not-equal filter (field != value)
    pub fn ne(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::NotEqual, value.into())
    }

    /// Create a greater-than filter (field > value)
    pub fn gt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::GreaterThan, value.into())
    }

    /// Create a greater-than-or-equal filter (field >= value)
    pub fn gte(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::GreaterThanOrEqual, value.into())
    }

    /// Create a less-than filter (field < value)
    pub fn lt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::LessThan, value.into())
    }

    /// Create a less-than-or-equal filter (field <= value)
    pub fn lte(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::LessThanOrEqual, value.into())
    }

    /// Create an IN list filter
    pub fn in_list<T: Into<FilterValue>>(field: impl Into<String>, values: Vec<T>) -> Self {
        Self::new(field, FilterOperator::In, values.into())
    }

    /// Create a NOT IN list filter
    pub fn not_in<T: Into<FilterValue>>(field: impl Into<String>, values: Vec<T>) -> Self {
        Self::new(field, FilterOperator::NotIn, values.into())
    }

    /// Create an IS NULL filter
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::IsNull, FilterValue::Null)
    }

    /// Create an IS NOT NULL filter
    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::IsNotNull, FilterValue::Null)
    }

    /// Create a substring filter
    pub fn contains(field: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::Contains, FilterValue::String(text.into()))
    }

    /// Create a negated substring filter
    pub fn not_contains(field: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::NotContains, FilterValue::String(text.into()))
    }

    /// Create a prefix filter
    pub fn starts_with(field: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::StartsWith, FilterValue::String(text.into()))
    }

    /// Create a suffix filter
    pub fn ends_with(field: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::EndsWith, FilterValue::String(text.into()))
    }

    /// Create an empty-collection filter
    pub fn is_empty(field: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::IsEmpty, FilterValue::Null)
    }

    /// Create a non-empty-collection filter
    pub fn is_not_empty(field: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::IsNotEmpty, FilterValue::Null)
    }

    /// Create a collection membership filter
    pub fn member_of(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::MemberOf, value.into())
    }

    /// Create a negated collection membership filter
    pub fn not_member_of(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::NotMemberOf, value.into())
    }

    /// Set whether text matching respects case
    #[must_use]
    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Evaluate the condition against a field value
    ///
    /// `None` means the field does not exist on the record. Null field values
    /// only satisfy `IS NULL`, mirroring SQL three-valued logic.
    pub fn test(&self, actual: Option<&FilterValue>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        match self.operator {
            FilterOperator::IsNull => return actual.is_null(),
            FilterOperator::IsNotNull => return !actual.is_null(),
            _ if actual.is_null() => return false,
            _ => {}
        }
        match self.operator {
            FilterOperator::Equal => values_equal(actual, &self.value),
            FilterOperator::NotEqual => !self.value.is_null() && !values_equal(actual, &self.value),
            FilterOperator::GreaterThan => self.ordering(actual) == Some(Ordering::Greater),
            FilterOperator::GreaterThanOrEqual => {
                matches!(self.ordering(actual), Some(Ordering::Greater | Ordering::Equal))
            }
            FilterOperator::LessThan => self.ordering(actual) == Some(Ordering::Less),
            FilterOperator::LessThanOrEqual => {
                matches!(self.ordering(actual), Some(Ordering::Less | Ordering::Equal))
            }
            FilterOperator::In => self
                .value
                .as_list()
                .is_some_and(|list| list.iter().any(|v| actual.matches(v))),
            FilterOperator::NotIn => self
                .value
                .as_list()
                .is_some_and(|list| !list.iter().any(|v| actual.matches(v))),
            FilterOperator::Contains => self.text_test(actual, |a, p| a.contains(p)),
            FilterOperator::NotContains => self.text_test(actual, |a, p| !a.contains(p)),
            FilterOperator::StartsWith => self.text_test(actual, |a, p| a.starts_with(p)),
            FilterOperator::EndsWith => self.text_test(actual, |a, p| a.ends_with(p)),
            FilterOperator::IsEmpty => actual.as_list().is_some_and(<[FilterValue]>::is_empty),
            FilterOperator::IsNotEmpty => actual.as_list().is_some_and(|l| !l.is_empty()),
            FilterOperator::MemberOf => actual
                .as_list()
                .is_some_and(|l| l.iter().any(|v| v.matches(&self.value))),
            FilterOperator::NotMemberOf => actual
                .as_list()
                .is_some_and(|l| !l.iter().any(|v| v.matches(&self.value))),
            FilterOperator::IsNull | FilterOperator::IsNotNull => false,
        }
    }

    fn ordering(&self, actual: &FilterValue) -> Option<Ordering> {
        actual.compare(&self.value)
    }

    fn text_test(&self, actual: &FilterValue, check: impl Fn(&str, &str) -> bool) -> bool {
        let (Some(actual), Some(pattern)) = (actual.as_text(), self.value.as_text()) else {
            return false;
        };
        if self.case_sensitive {
            check(actual, pattern)
        } else {
            check(&actual.to_uppercase(), &pattern.to_uppercase())
        }
    }
}

fn values_equal(actual: &FilterValue, expected: &FilterValue) -> bool {
    match (actual.as_list(), expected.as_list()) {
        (Some(a), Some(b)) => {
            a.len() == b.len()
                && a.iter().all(|x| b.iter().any(|y| x.matches(y)))
                && b.iter().all(|y| a.iter().any(|x| x.matches(y)))
        }
        (None, None) => actual.matches(expected),
        _ => false,
    }
}

impl fmt::Display for FilterCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operator {
            FilterOperator::IsNull
            | FilterOperator::IsNotNull
            | FilterOperator::IsEmpty
            | FilterOperator::IsNotEmpty => write!(f, "{} {}", self.field, self.operator),
            _ => write!(f, "{} {} {}", self.field, self.operator, self.value),
        }
    }
}
