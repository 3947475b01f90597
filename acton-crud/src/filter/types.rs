//! Typed per-field filters
//!
//! Each filter type mirrors what a client can ask of one field. Every member
//! is optional; only the members that are set produce conditions. All filters
//! deserialize from camelCase JSON so they can be bound straight from query
//! parameters or request bodies.
//!
//! Emission rules shared by every scalar filter:
//!
//! - `equal` wins over everything else
//! - otherwise a non-empty `in` list wins
//! - otherwise `notEqual`, `notIn` and `isNull` each add a condition, and the
//!   type-specific members (ranges, text matching, boolean shortcuts) apply
//!
//! # Example
//!
//! ```rust
//! use acton_crud::filter::{FieldFilter, TextFilter};
//!
//! let filter = TextFilter::new().contains("acme");
//! let conditions = filter.conditions("name");
//! assert_eq!(conditions.len(), 1);
//! assert_eq!(conditions[0].to_string(), "name CONTAINS \"acme\"");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use super::value::{FilterCondition, FilterOperator, FilterValue};
use crate::entity::FieldKind;

/// Family of field kinds a filter can be applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldFamily {
    /// Any non-collection field
    Scalar,
    /// Boolean fields
    Boolean,
    /// Integer and float fields
    Numeric,
    /// Text fields
    Text,
    /// Date, time and date-time fields
    Temporal,
    /// Element-collection fields
    Collection,
}

impl FieldFamily {
    /// Whether a field of the given kind belongs to this family
    pub fn accepts(self, kind: FieldKind) -> bool {
        match self {
            Self::Scalar => kind != FieldKind::Collection,
            Self::Boolean => kind == FieldKind::Boolean,
            Self::Numeric => kind.is_numeric(),
            Self::Text => kind == FieldKind::Text,
            Self::Temporal => kind.is_temporal(),
            Self::Collection => kind == FieldKind::Collection,
        }
    }
}

impl fmt::Display for FieldFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar => write!(f, "scalar"),
            Self::Boolean => write!(f, "boolean"),
            Self::Numeric => write!(f, "number"),
            Self::Text => write!(f, "text"),
            Self::Temporal => write!(f, "date"),
            Self::Collection => write!(f, "collection"),
        }
    }
}

/// A filter over one field
pub trait FieldFilter: fmt::Debug + Send + Sync {
    /// The kinds of field this filter may be attached to
    fn family(&self) -> FieldFamily;

    /// Conditions this filter contributes for the named field
    fn conditions(&self, field: &str) -> Vec<FilterCondition>;
}

/// Members shared by every scalar filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommonFilter<T> {
    /// Field equals the value
    pub equal: Option<T>,
    /// Field differs from the value
    pub not_equal: Option<T>,
    /// Field is one of the values
    #[serde(rename = "in")]
    pub in_list: Option<Vec<T>>,
    /// Field is none of the values
    pub not_in: Option<Vec<T>>,
    /// `true` for IS NULL, `false` for IS NOT NULL
    pub is_null: Option<bool>,
}

impl<T> Default for CommonFilter<T> {
    fn default() -> Self {
        Self {
            equal: None,
            not_equal: None,
            in_list: None,
            not_in: None,
            is_null: None,
        }
    }
}

impl<T> CommonFilter<T>
where
    T: Clone + Into<FilterValue>,
{
    /// Empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Require equality
    #[must_use]
    pub fn equal(mut self, value: T) -> Self {
        self.equal = Some(value);
        self
    }

    /// Require inequality
    #[must_use]
    pub fn not_equal(mut self, value: T) -> Self {
        self.not_equal = Some(value);
        self
    }

    /// Require membership in a list
    #[must_use]
    pub fn in_list(mut self, values: Vec<T>) -> Self {
        self.in_list = Some(values);
        self
    }

    /// Require absence from a list
    #[must_use]
    pub fn not_in(mut self, values: Vec<T>) -> Self {
        self.not_in = Some(values);
        self
    }

    /// Require the field to be null (`true`) or not null (`false`)
    #[must_use]
    pub fn is_null(mut self, is_null: bool) -> Self {
        self.is_null = Some(is_null);
        self
    }

    /// Push this filter's conditions; returns `true` when `equal` or `in`
    /// was emitted, which suppresses every other member
    fn emit(&self, field: &str, out: &mut Vec<FilterCondition>) -> bool {
        if let Some(value) = &self.equal {
            out.push(FilterCondition::eq(field, value.clone()));
            return true;
        }
        if let Some(values) = self.in_list.as_ref().filter(|v| !v.is_empty()) {
            out.push(FilterCondition::in_list(field, values.clone()));
            return true;
        }
        if let Some(value) = &self.not_equal {
            out.push(FilterCondition::ne(field, value.clone()));
        }
        if let Some(values) = self.not_in.as_ref().filter(|v| !v.is_empty()) {
            out.push(FilterCondition::not_in(field, values.clone()));
        }
        match self.is_null {
            Some(true) => out.push(FilterCondition::is_null(field)),
            Some(false) => out.push(FilterCondition::is_not_null(field)),
            None => {}
        }
        false
    }
}

impl<T> FieldFilter for CommonFilter<T>
where
    T: Clone + Into<FilterValue> + fmt::Debug + Send + Sync,
{
    fn family(&self) -> FieldFamily {
        FieldFamily::Scalar
    }

    fn conditions(&self, field: &str) -> Vec<FilterCondition> {
        let mut out = Vec::new();
        self.emit(field, &mut out);
        out
    }
}

/// Filter over UUID fields
pub type UuidFilter = CommonFilter<uuid::Uuid>;

/// Adds the shared `equal`/`not_equal`/`in_list`/`not_in`/`is_null` builders
/// to a filter that flattens a [`CommonFilter`]
macro_rules! common_builders {
    ($ty:ty, $value:ty) => {
        impl $ty {
            /// Require equality
            #[must_use]
            pub fn equal(mut self, value: impl Into<$value>) -> Self {
                self.common.equal = Some(value.into());
                self
            }

            /// Require inequality
            #[must_use]
            pub fn not_equal(mut self, value: impl Into<$value>) -> Self {
                self.common.not_equal = Some(value.into());
                self
            }

            /// Require membership in a list
            #[must_use]
            pub fn in_list(mut self, values: Vec<$value>) -> Self {
                self.common.in_list = Some(values);
                self
            }

            /// Require absence from a list
            #[must_use]
            pub fn not_in(mut self, values: Vec<$value>) -> Self {
                self.common.not_in = Some(values);
                self
            }

            /// Require the field to be null (`true`) or not null (`false`)
            #[must_use]
            pub fn is_null(mut self, is_null: bool) -> Self {
                self.common.is_null = Some(is_null);
                self
            }
        }
    };
}

/// Filter over boolean fields
///
/// `isTrue` is a shortcut for `equal`; it only applies when neither `equal`
/// nor `in` is set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BooleanFilter {
    /// Shared members
    #[serde(flatten)]
    pub common: CommonFilter<bool>,
    /// Field is true (`true`) or false (`false`)
    pub is_true: Option<bool>,
}

impl BooleanFilter {
    /// Empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the field to be true or false
    #[must_use]
    pub fn is_true(mut self, value: bool) -> Self {
        self.is_true = Some(value);
        self
    }
}

common_builders!(BooleanFilter, bool);

impl FieldFilter for BooleanFilter {
    fn family(&self) -> FieldFamily {
        FieldFamily::Boolean
    }

    fn conditions(&self, field: &str) -> Vec<FilterCondition> {
        let mut out = Vec::new();
        if !self.common.emit(field, &mut out) {
            if let Some(value) = self.is_true {
                out.push(FilterCondition::eq(field, value));
            }
        }
        out
    }
}

/// Filter over numeric fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NumberFilter<T> {
    /// Shared members
    #[serde(flatten)]
    pub common: CommonFilter<T>,
    /// Field > value
    pub greater_than: Option<T>,
    /// Field >= value
    pub greater_than_or_equal: Option<T>,
    /// Field < value
    pub less_than: Option<T>,
    /// Field <= value
    pub less_than_or_equal: Option<T>,
}

impl<T> Default for NumberFilter<T> {
    fn default() -> Self {
        Self {
            common: CommonFilter::default(),
            greater_than: None,
            greater_than_or_equal: None,
            less_than: None,
            less_than_or_equal: None,
        }
    }
}

impl<T> NumberFilter<T>
where
    T: Clone + Into<FilterValue>,
{
    /// Empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Require equality
    #[must_use]
    pub fn equal(mut self, value: T) -> Self {
        self.common.equal = Some(value);
        self
    }

    /// Require inequality
    #[must_use]
    pub fn not_equal(mut self, value: T) -> Self {
        self.common.not_equal = Some(value);
        self
    }

    /// Require membership in a list
    #[must_use]
    pub fn in_list(mut self, values: Vec<T>) -> Self {
        self.common.in_list = Some(values);
        self
    }

    /// Require absence from a list
    #[must_use]
    pub fn not_in(mut self, values: Vec<T>) -> Self {
        self.common.not_in = Some(values);
        self
    }

    /// Require the field to be null (`true`) or not null (`false`)
    #[must_use]
    pub fn is_null(mut self, is_null: bool) -> Self {
        self.common.is_null = Some(is_null);
        self
    }

    /// Require field > value
    #[must_use]
    pub fn greater_than(mut self, value: T) -> Self {
        self.greater_than = Some(value);
        self
    }

    /// Require field >= value
    #[must_use]
    pub fn greater_than_or_equal(mut self, value: T) -> Self {
        self.greater_than_or_equal = Some(value);
        self
    }

    /// Require field < value
    #[must_use]
    pub fn less_than(mut self, value: T) -> Self {
        self.less_than = Some(value);
        self
    }

    /// Require field <= value
    #[must_use]
    pub fn less_than_or_equal(mut self, value: T) -> Self {
        self.less_than_or_equal = Some(value);
        self
    }
}

impl<T> FieldFilter for NumberFilter<T>
where
    T: Clone + Into<FilterValue> + fmt::Debug + Send + Sync,
{
    fn family(&self) -> FieldFamily {
        FieldFamily::Numeric
    }

    fn conditions(&self, field: &str) -> Vec<FilterCondition> {
        let mut out = Vec::new();
        if self.common.emit(field, &mut out) {
            return out;
        }
        let ranges = [
            (&self.greater_than, FilterOperator::GreaterThan),
            (&self.greater_than_or_equal, FilterOperator::GreaterThanOrEqual),
            (&self.less_than, FilterOperator::LessThan),
            (&self.less_than_or_equal, FilterOperator::LessThanOrEqual),
        ];
        for (bound, operator) in ranges {
            if let Some(value) = bound {
                out.push(FilterCondition::new(field, operator, value.clone().into()));
            }
        }
        out
    }
}

/// Filter over text fields
///
/// Text matching (`contains`, `notContains`, `startWith`, `endWith`)
/// ignores case unless `caseSensitive` is set. The shared members always
/// compare exactly.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextFilter {
    /// Shared members
    #[serde(flatten)]
    pub common: CommonFilter<String>,
    /// Field contains the text
    pub contains: Option<String>,
    /// Field does not contain the text
    pub not_contains: Option<String>,
    /// Field starts with the text
    pub start_with: Option<String>,
    /// Field ends with the text
    pub end_with: Option<String>,
    /// Respect case when matching text
    pub case_sensitive: bool,
}

impl TextFilter {
    /// Empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the field to contain the text
    #[must_use]
    pub fn contains(mut self, text: impl Into<String>) -> Self {
        self.contains = Some(text.into());
        self
    }

    /// Require the field not to contain the text
    #[must_use]
    pub fn not_contains(mut self, text: impl Into<String>) -> Self {
        self.not_contains = Some(text.into());
        self
    }

    /// Require the field to start with the text
    #[must_use]
    pub fn start_with(mut self, text: impl Into<String>) -> Self {
        self.start_with = Some(text.into());
        self
    }

    /// Require the field to end with the text
    #[must_use]
    pub fn end_with(mut self, text: impl Into<String>) -> Self {
        self.end_with = Some(text.into());
        self
    }

    /// Respect case when matching text
    #[must_use]
    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }
}

common_builders!(TextFilter, String);

impl FieldFilter for TextFilter {
    fn family(&self) -> FieldFamily {
        FieldFamily::Text
    }

    fn conditions(&self, field: &str) -> Vec<FilterCondition> {
        let mut out = Vec::new();
        if self.common.emit(field, &mut out) {
            return out;
        }
        let matches = [
            (&self.contains, FilterOperator::Contains),
            (&self.not_contains, FilterOperator::NotContains),
            (&self.start_with, FilterOperator::StartsWith),
            (&self.end_with, FilterOperator::EndsWith),
        ];
        for (text, operator) in matches {
            if let Some(text) = text {
                out.push(
                    FilterCondition::new(field, operator, FilterValue::String(text.clone()))
                        .with_case_sensitive(self.case_sensitive),
                );
            }
        }
        out
    }
}

/// Filter over date, time and date-time fields
///
/// `from` and `to` are both inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DateFilter<T> {
    /// Shared members
    #[serde(flatten)]
    pub common: CommonFilter<T>,
    /// Field >= value
    pub from: Option<T>,
    /// Field <= value
    pub to: Option<T>,
}

impl<T> Default for DateFilter<T> {
    fn default() -> Self {
        Self {
            common: CommonFilter::default(),
            from: None,
            to: None,
        }
    }
}

impl<T> DateFilter<T>
where
    T: Clone + Into<FilterValue>,
{
    /// Empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Require equality
    #[must_use]
    pub fn equal(mut self, value: T) -> Self {
        self.common.equal = Some(value);
        self
    }

    /// Require the field to be null (`true`) or not null (`false`)
    #[must_use]
    pub fn is_null(mut self, is_null: bool) -> Self {
        self.common.is_null = Some(is_null);
        self
    }

    /// Lower bound, inclusive
    #[must_use]
    pub fn from(mut self, value: T) -> Self {
        self.from = Some(value);
        self
    }

    /// Upper bound, inclusive
    #[must_use]
    pub fn to(mut self, value: T) -> Self {
        self.to = Some(value);
        self
    }
}

impl<T> FieldFilter for DateFilter<T>
where
    T: Clone + Into<FilterValue> + fmt::Debug + Send + Sync,
{
    fn family(&self) -> FieldFamily {
        FieldFamily::Temporal
    }

    fn conditions(&self, field: &str) -> Vec<FilterCondition> {
        let mut out = Vec::new();
        if self.common.emit(field, &mut out) {
            return out;
        }
        if let Some(from) = &self.from {
            out.push(FilterCondition::gte(field, from.clone()));
        }
        if let Some(to) = &self.to {
            out.push(FilterCondition::lte(field, to.clone()));
        }
        out
    }
}

/// Filter over element-collection fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CollectionFilter<T> {
    /// Collection holds exactly these elements
    pub equal: Option<Vec<T>>,
    /// Collection differs from these elements
    pub not_equal: Option<Vec<T>>,
    /// `true` for empty, `false` for non-empty
    pub is_empty: Option<bool>,
    /// Collection contains the element
    pub is_member: Option<T>,
    /// Collection does not contain the element
    pub is_not_member: Option<T>,
}

impl<T> Default for CollectionFilter<T> {
    fn default() -> Self {
        Self {
            equal: None,
            not_equal: None,
            is_empty: None,
            is_member: None,
            is_not_member: None,
        }
    }
}

impl<T> CollectionFilter<T>
where
    T: Clone + Into<FilterValue>,
{
    /// Empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the collection to hold exactly these elements
    #[must_use]
    pub fn equal(mut self, values: Vec<T>) -> Self {
        self.equal = Some(values);
        self
    }

    /// Require the collection to differ from these elements
    #[must_use]
    pub fn not_equal(mut self, values: Vec<T>) -> Self {
        self.not_equal = Some(values);
        self
    }

    /// Require the collection to be empty (`true`) or non-empty (`false`)
    #[must_use]
    pub fn is_empty(mut self, is_empty: bool) -> Self {
        self.is_empty = Some(is_empty);
        self
    }

    /// Require the collection to contain the element
    #[must_use]
    pub fn is_member(mut self, value: T) -> Self {
        self.is_member = Some(value);
        self
    }

    /// Require the collection not to contain the element
    #[must_use]
    pub fn is_not_member(mut self, value: T) -> Self {
        self.is_not_member = Some(value);
        self
    }
}

impl<T> FieldFilter for CollectionFilter<T>
where
    T: Clone + Into<FilterValue> + fmt::Debug + Send + Sync,
{
    fn family(&self) -> FieldFamily {
        FieldFamily::Collection
    }

    fn conditions(&self, field: &str) -> Vec<FilterCondition> {
        let mut out = Vec::new();
        if let Some(values) = &self.equal {
            out.push(FilterCondition::eq(field, values.clone()));
            return out;
        }
        if let Some(values) = &self.not_equal {
            out.push(FilterCondition::ne(field, values.clone()));
        }
        match self.is_empty {
            Some(true) => out.push(FilterCondition::is_empty(field)),
            Some(false) => out.push(FilterCondition::is_not_empty(field)),
            None => {}
        }
        if let Some(value) = &self.is_member {
            out.push(FilterCondition::member_of(field, value.clone()));
        }
        if let Some(value) = &self.is_not_member {
            out.push(FilterCondition::not_member_of(field, value.clone()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rendered(conditions: Vec<FilterCondition>) -> Vec<String> {
        conditions.into_iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_equal_takes_precedence() {
        let filter = NumberFilter::<i64>::new()
            .equal(5)
            .not_equal(6)
            .greater_than(1)
            .is_null(false);
        assert_eq!(rendered(filter.conditions("age")), vec!["age = 5"]);
    }

    #[test]
    fn test_in_suppresses_type_specific_members() {
        let filter = TextFilter::new()
            .in_list(vec!["a".to_string(), "b".to_string()])
            .contains("x");
        assert_eq!(rendered(filter.conditions("code")), vec!["code IN (\"a\", \"b\")"]);
    }

    #[test]
    fn test_empty_in_list_is_ignored() {
        let filter = NumberFilter::<i64>::new().in_list(Vec::new()).less_than(3);
        assert_eq!(rendered(filter.conditions("age")), vec!["age < 3"]);
    }

    #[test]
    fn test_exclusions_combine_with_ranges() {
        let filter = NumberFilter::<i64>::new()
            .not_equal(7)
            .not_in(vec![8, 9])
            .is_null(false)
            .greater_than_or_equal(1)
            .less_than_or_equal(10);
        assert_eq!(
            rendered(filter.conditions("age")),
            vec!["age != 7", "age NOT IN (8, 9)", "age IS NOT NULL", "age >= 1", "age <= 10"]
        );
    }

    #[test]
    fn test_text_filter_carries_case_flag() {
        let insensitive = TextFilter::new().start_with("Ac").conditions("name");
        assert!(!insensitive[0].case_sensitive);
        let sensitive = TextFilter::new()
            .end_with("me")
            .not_contains("x")
            .case_sensitive(true)
            .conditions("name");
        assert_eq!(sensitive.len(), 2);
        assert!(sensitive.iter().all(|c| c.case_sensitive));
    }

    #[test]
    fn test_boolean_shortcut() {
        assert_eq!(
            rendered(BooleanFilter::new().is_true(false).conditions("active")),
            vec!["active = false"]
        );
        assert_eq!(
            rendered(BooleanFilter::new().equal(true).is_true(false).conditions("active")),
            vec!["active = true"]
        );
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let filter = DateFilter::new().from(from).to(to);
        assert_eq!(
            rendered(filter.conditions("founded")),
            vec!["founded >= 2024-01-01", "founded <= 2024-12-31"]
        );
        assert_eq!(filter.family(), FieldFamily::Temporal);
    }

    #[test]
    fn test_collection_filter_members() {
        let filter = CollectionFilter::new()
            .is_empty(false)
            .is_member("rust".to_string())
            .is_not_member("cobol".to_string());
        assert_eq!(
            rendered(filter.conditions("skills")),
            vec![
                "skills IS NOT EMPTY",
                "skills MEMBER OF \"rust\"",
                "skills NOT MEMBER OF \"cobol\""
            ]
        );
    }

    #[test]
    fn test_collection_equal_takes_precedence() {
        let filter = CollectionFilter::new()
            .equal(vec![1_i64, 2])
            .is_empty(true);
        assert_eq!(rendered(filter.conditions("scores")), vec!["scores = (1, 2)"]);
    }

    #[test]
    fn test_family_accepts_kinds() {
        assert!(FieldFamily::Scalar.accepts(FieldKind::Uuid));
        assert!(!FieldFamily::Scalar.accepts(FieldKind::Collection));
        assert!(FieldFamily::Numeric.accepts(FieldKind::Float));
        assert!(!FieldFamily::Text.accepts(FieldKind::Integer));
        assert!(FieldFamily::Temporal.accepts(FieldKind::Time));
    }

    #[test]
    fn test_deserialize_from_camel_case() {
        let filter: TextFilter = serde_json::from_str(
            r#"{"equal": null, "contains": "acme", "caseSensitive": true, "notIn": ["x"]}"#,
        )
        .unwrap();
        assert_eq!(filter.contains.as_deref(), Some("acme"));
        assert!(filter.case_sensitive);
        assert_eq!(filter.common.not_in, Some(vec!["x".to_string()]));

        let numbers: NumberFilter<i64> =
            serde_json::from_str(r#"{"in": [1, 2], "greaterThan": 0}"#).unwrap();
        assert_eq!(numbers.common.in_list, Some(vec![1, 2]));
        assert_eq!(numbers.greater_than, Some(0));
    }
}
