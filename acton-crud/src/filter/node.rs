//! Filter trees
//!
//! A [`FilterNode`] is the untyped form of an entity filter: a list of field
//! and relationship constraints plus the `distinct` and `inclusive` flags.
//! Typed filters describe themselves as a node through [`Criteria`].

use std::fmt;

use super::types::{FieldFamily, FieldFilter};
use super::value::FilterCondition;

/// One constraint inside a filter node
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Conditions on a field of the node's entity
    Field {
        /// Field name
        name: String,
        /// Field kinds the originating filter may be attached to
        family: FieldFamily,
        /// Conditions emitted by the filter
        conditions: Vec<FilterCondition>,
    },
    /// A nested filter on a related entity
    Relation {
        /// Relationship name
        name: String,
        /// Filter on the related entity
        node: FilterNode,
    },
}

/// A filter on one entity, possibly reaching into related entities
///
/// Constraints are AND-combined unless `inclusive` is set, in which case
/// they are OR-combined. Only the root node's flags count. Every leaf
/// condition, including those of nested relation filters, is a sibling under
/// the root's combinator, and each relation leaf gets its own join. The
/// `inclusive` and `distinct` flags of nested nodes are ignored.
///
/// # Example
///
/// ```rust
/// use acton_crud::filter::{FilterNode, TextFilter};
///
/// let filter = FilterNode::new()
///     .field("name", &TextFilter::new().contains("Acme"))
///     .relation(
///         "departments",
///         FilterNode::new().field("manager_name", &TextFilter::new().equal("Lee")),
///     );
/// assert_eq!(filter.constraints.len(), 2);
/// assert!(!filter.inclusive);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterNode {
    /// Suppress duplicate root rows in the result
    pub distinct: bool,
    /// OR-combine constraints instead of AND-combining them
    pub inclusive: bool,
    /// Field and relation constraints, in declaration order
    pub constraints: Vec<Constraint>,
}

impl FilterNode {
    /// Empty node; matches everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the distinct flag
    #[must_use]
    pub fn distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    /// Set the inclusive (OR) flag
    #[must_use]
    pub fn inclusive(mut self, inclusive: bool) -> Self {
        self.inclusive = inclusive;
        self
    }

    /// Constrain a field
    ///
    /// Filters that emit no condition are skipped.
    #[must_use]
    pub fn field<F: FieldFilter + ?Sized>(mut self, name: impl Into<String>, filter: &F) -> Self {
        let name = name.into();
        let conditions = filter.conditions(&name);
        if !conditions.is_empty() {
            self.constraints.push(Constraint::Field {
                name,
                family: filter.family(),
                conditions,
            });
        }
        self
    }

    /// Constrain a field when a filter is present
    #[must_use]
    pub fn field_opt<F: FieldFilter>(self, name: impl Into<String>, filter: Option<&F>) -> Self {
        match filter {
            Some(filter) => self.field(name, filter),
            None => self,
        }
    }

    /// Constrain a related entity
    ///
    /// Nested filters without constraints are skipped, so they never cause a
    /// join.
    #[must_use]
    pub fn relation(mut self, name: impl Into<String>, criteria: impl Criteria) -> Self {
        let node = criteria.to_filter();
        if !node.is_empty() {
            self.constraints.push(Constraint::Relation {
                name: name.into(),
                node,
            });
        }
        self
    }

    /// Constrain a related entity when a nested filter is present
    #[must_use]
    pub fn relation_opt<C: Criteria>(self, name: impl Into<String>, criteria: Option<&C>) -> Self {
        match criteria {
            Some(criteria) => self.relation(name, criteria),
            None => self,
        }
    }

    /// Whether the node has no constraints
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joiner = if self.inclusive { " OR " } else { " AND " };
        write!(f, "{{")?;
        let mut first = true;
        write_leaves(self, "", joiner, &mut first, f)?;
        write!(f, "}}")?;
        if self.distinct {
            write!(f, " DISTINCT")?;
        }
        Ok(())
    }
}

/// Nested leaves render as `relation.{condition}` under the root joiner
fn write_leaves(
    node: &FilterNode,
    path: &str,
    joiner: &str,
    first: &mut bool,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    for constraint in &node.constraints {
        match constraint {
            Constraint::Field { conditions, .. } => {
                for condition in conditions {
                    if !*first {
                        write!(f, "{}", joiner)?;
                    }
                    *first = false;
                    if path.is_empty() {
                        write!(f, "{}", condition)?;
                    } else {
                        write!(f, "{}.{{{}}}", path, condition)?;
                    }
                }
            }
            Constraint::Relation { name, node } => {
                let nested = if path.is_empty() {
                    name.clone()
                } else {
                    format!("{}.{}", path, name)
                };
                write_leaves(node, &nested, joiner, first, f)?;
            }
        }
    }
    Ok(())
}

/// A typed entity filter
///
/// Implementations map each of their optional members to a constraint on
/// the matching field or relationship.
///
/// # Example
///
/// ```rust
/// use acton_crud::filter::{Criteria, FilterNode, NumberFilter, TextFilter};
///
/// #[derive(Debug, Default)]
/// struct EmployeeFilter {
///     name: Option<TextFilter>,
///     salary: Option<NumberFilter<f64>>,
/// }
///
/// impl Criteria for EmployeeFilter {
///     fn to_filter(&self) -> FilterNode {
///         FilterNode::new()
///             .field_opt("name", self.name.as_ref())
///             .field_opt("salary", self.salary.as_ref())
///     }
/// }
///
/// let filter = EmployeeFilter {
///     salary: Some(NumberFilter::new().greater_than(1000.0)),
///     ..Default::default()
/// };
/// assert_eq!(filter.to_filter().constraints.len(), 1);
/// ```
pub trait Criteria: fmt::Debug + Send + Sync {
    /// Describe this filter as an untyped node
    fn to_filter(&self) -> FilterNode;
}

impl Criteria for FilterNode {
    fn to_filter(&self) -> FilterNode {
        self.clone()
    }
}

impl<C: Criteria + ?Sized> Criteria for &C {
    fn to_filter(&self) -> FilterNode {
        (**self).to_filter()
    }
}

impl<C: Criteria + ?Sized> Criteria for Box<C> {
    fn to_filter(&self) -> FilterNode {
        (**self).to_filter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{BooleanFilter, NumberFilter, TextFilter};

    #[test]
    fn test_filters_without_conditions_are_skipped() {
        let node = FilterNode::new()
            .field("name", &TextFilter::new())
            .field_opt::<BooleanFilter>("active", None)
            .relation("departments", FilterNode::new());
        assert!(node.is_empty());
    }

    #[test]
    fn test_field_constraint_records_family() {
        let node = FilterNode::new().field("age", &NumberFilter::<i64>::new().less_than(40));
        match &node.constraints[0] {
            Constraint::Field { name, family, conditions } => {
                assert_eq!(name, "age");
                assert_eq!(*family, FieldFamily::Numeric);
                assert_eq!(conditions.len(), 1);
            }
            other => panic!("unexpected constraint: {:?}", other),
        }
    }

    #[test]
    fn test_display_shows_combinators() {
        let node = FilterNode::new()
            .inclusive(true)
            .distinct(true)
            .field("name", &TextFilter::new().equal("Acme"))
            .relation(
                "departments",
                FilterNode::new().field("name", &TextFilter::new().equal("Ops")),
            );
        assert_eq!(
            node.to_string(),
            "{name = \"Acme\" OR departments.{name = \"Ops\"}} DISTINCT"
        );
    }

    #[test]
    fn test_display_flattens_nested_leaves() {
        let node = FilterNode::new()
            .inclusive(true)
            .field("name", &TextFilter::new().equal("Acme"))
            .relation(
                "departments",
                FilterNode::new()
                    .field("name", &TextFilter::new().equal("Ops"))
                    .field("manager_name", &TextFilter::new().equal("Lee")),
            );
        assert_eq!(
            node.to_string(),
            "{name = \"Acme\" OR departments.{name = \"Ops\"} OR departments.{manager_name = \"Lee\"}}"
        );
    }

    #[test]
    fn test_criteria_through_references() {
        let node = FilterNode::new().field("name", &TextFilter::new().contains("a"));
        let boxed: Box<dyn Criteria> = Box::new(node.clone());
        assert_eq!((&node).to_filter(), node);
        assert_eq!(boxed.to_filter(), node);
    }
}
