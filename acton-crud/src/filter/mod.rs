//! Filter model and predicate builder
//!
//! Filters are declared per entity as a struct of optional per-field filters
//! (see [`TextFilter`], [`NumberFilter`] and friends) plus nested filters for
//! related entities. They reduce to an untyped [`FilterNode`], which
//! [`Specification::build`] validates against the entity schema and turns
//! into a [`Predicate`].
//!
//! # Example
//!
//! ```rust
//! use acton_crud::filter::{Criteria, FilterNode, TextFilter};
//!
//! #[derive(Debug, Default)]
//! struct DepartmentFilter {
//!     manager_name: Option<TextFilter>,
//! }
//!
//! impl Criteria for DepartmentFilter {
//!     fn to_filter(&self) -> FilterNode {
//!         FilterNode::new().field_opt("manager_name", self.manager_name.as_ref())
//!     }
//! }
//!
//! #[derive(Debug, Default)]
//! struct CompanyFilter {
//!     name: Option<TextFilter>,
//!     departments: Option<DepartmentFilter>,
//!     inclusive: bool,
//! }
//!
//! impl Criteria for CompanyFilter {
//!     fn to_filter(&self) -> FilterNode {
//!         FilterNode::new()
//!             .inclusive(self.inclusive)
//!             .field_opt("name", self.name.as_ref())
//!             .relation_opt("departments", self.departments.as_ref())
//!     }
//! }
//! ```

mod node;
mod predicate;
mod types;
mod value;

pub use node::{Constraint, Criteria, FilterNode};
pub use predicate::{Predicate, Specification};
pub use types::{
    BooleanFilter, CollectionFilter, CommonFilter, DateFilter, FieldFamily, FieldFilter,
    NumberFilter, TextFilter, UuidFilter,
};
pub use value::{FilterCondition, FilterOperator, FilterValue};
