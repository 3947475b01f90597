//! Generic CRUD entry points
//!
//! Every CRUD call is an [`Operation`] value handled by a `tower::Service`.
//! [`CrudService`] executes operations against a repository; the layers in
//! [`pipeline`](crate::pipeline) wrap it with cross-cutting behaviour.
//!
//! # Example
//!
//! ```rust,ignore
//! use acton_crud::service::{CrudService, Operation, Payload};
//! use tower::ServiceExt;
//!
//! let service = CrudService::<_, Company, CompanyFilter>::new(Arc::new(store));
//! let saved = service.oneshot(Operation::Save(acme)).await?.into_item()?;
//! ```

mod crud;

pub use crud::CrudService;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::Identified;
use crate::error::{Error, Result};
use crate::repository::{Page, PageRequest};

/// A CRUD call and its arguments
///
/// `T` is the data type handled at this point of the pipeline (DTO or
/// entity) and `F` the filter type.
#[derive(Debug, Clone)]
pub enum Operation<T: Identified, F> {
    /// Insert new data; the data must not carry an id
    Save(T),
    /// A page of every row
    FindAll(PageRequest),
    /// A page of rows matching an optional filter
    FindAllByCriteria(Option<F>, PageRequest),
    /// One row by id
    FindById(T::Id),
    /// Replace an existing row
    UpdateById(Option<T::Id>, T),
    /// Overlay the non-null fields of the data on an existing row
    PatchById(Option<T::Id>, T),
    /// Remove one row
    DeleteById(T::Id),
    /// Insert many rows in one transaction
    SaveAll(Vec<T>),
    /// Replace many existing rows in one transaction
    UpdateAll(Vec<T>),
    /// Patch many existing rows in one transaction
    PatchAll(Vec<T>),
    /// Remove every row
    DeleteAll,
    /// Remove every row matching an optional filter
    DeleteAllByCriteria(Option<F>),
}

impl<T: Identified, F> Operation<T, F> {
    /// The kind of this operation
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Save(_) => OperationKind::Save,
            Self::FindAll(_) => OperationKind::FindAll,
            Self::FindAllByCriteria(..) => OperationKind::FindAllByCriteria,
            Self::FindById(_) => OperationKind::FindById,
            Self::UpdateById(..) => OperationKind::UpdateById,
            Self::PatchById(..) => OperationKind::PatchById,
            Self::DeleteById(_) => OperationKind::DeleteById,
            Self::SaveAll(_) => OperationKind::SaveAll,
            Self::UpdateAll(_) => OperationKind::UpdateAll,
            Self::PatchAll(_) => OperationKind::PatchAll,
            Self::DeleteAll => OperationKind::DeleteAll,
            Self::DeleteAllByCriteria(_) => OperationKind::DeleteAllByCriteria,
        }
    }

    /// The page request of a read
    pub fn page_request(&self) -> Option<&PageRequest> {
        match self {
            Self::FindAll(page) | Self::FindAllByCriteria(_, page) => Some(page),
            _ => None,
        }
    }

    /// Convert the data arguments, keeping ids, filters and page requests
    pub fn map_data<U, G>(self, mut f: G) -> Result<Operation<U, F>>
    where
        U: Identified<Id = T::Id>,
        G: FnMut(T) -> Result<U>,
    {
        Ok(match self {
            Self::Save(data) => Operation::Save(f(data)?),
            Self::UpdateById(id, data) => Operation::UpdateById(id, f(data)?),
            Self::PatchById(id, data) => Operation::PatchById(id, f(data)?),
            Self::SaveAll(items) => Operation::SaveAll(convert_all(items, &mut f)?),
            Self::UpdateAll(items) => Operation::UpdateAll(convert_all(items, &mut f)?),
            Self::PatchAll(items) => Operation::PatchAll(convert_all(items, &mut f)?),
            Self::FindAll(page) => Operation::FindAll(page),
            Self::FindAllByCriteria(filter, page) => Operation::FindAllByCriteria(filter, page),
            Self::FindById(id) => Operation::FindById(id),
            Self::DeleteById(id) => Operation::DeleteById(id),
            Self::DeleteAll => Operation::DeleteAll,
            Self::DeleteAllByCriteria(filter) => Operation::DeleteAllByCriteria(filter),
        })
    }
}

fn convert_all<T, U>(items: Vec<T>, f: &mut impl FnMut(T) -> Result<U>) -> Result<Vec<U>> {
    items.into_iter().map(f).collect()
}

/// Operation kinds, used to attach layers to a subset of operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Save,
    FindAll,
    FindAllByCriteria,
    FindById,
    UpdateById,
    PatchById,
    DeleteById,
    SaveAll,
    UpdateAll,
    PatchAll,
    DeleteAll,
    DeleteAllByCriteria,
}

impl OperationKind {
    /// Every kind
    pub const ALL: [OperationKind; 12] = [
        Self::Save,
        Self::FindAll,
        Self::FindAllByCriteria,
        Self::FindById,
        Self::UpdateById,
        Self::PatchById,
        Self::DeleteById,
        Self::SaveAll,
        Self::UpdateAll,
        Self::PatchAll,
        Self::DeleteAll,
        Self::DeleteAllByCriteria,
    ];

    /// Method name used in logs
    pub const fn name(self) -> &'static str {
        match self {
            Self::Save => "save",
            Self::FindAll => "find_all",
            Self::FindAllByCriteria => "find_all_by_criteria",
            Self::FindById => "find_by_id",
            Self::UpdateById => "update_by_id",
            Self::PatchById => "patch_by_id",
            Self::DeleteById => "delete_by_id",
            Self::SaveAll => "save_all",
            Self::UpdateAll => "update_all",
            Self::PatchAll => "patch_all",
            Self::DeleteAll => "delete_all",
            Self::DeleteAllByCriteria => "delete_all_by_criteria",
        }
    }

    const fn bit(self) -> u16 {
        1 << self as u16
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of operation kinds
///
/// # Example
///
/// ```rust
/// use acton_crud::service::{OperationKind, OperationSet};
///
/// let reads = OperationSet::of(&[OperationKind::FindAll, OperationKind::FindById]);
/// assert!(reads.contains(OperationKind::FindById));
/// assert!(!reads.contains(OperationKind::Save));
/// assert!(OperationSet::all().without(OperationKind::DeleteAll).contains(OperationKind::Save));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationSet(u16);

impl OperationSet {
    /// Reads that eagerly load relationships by default
    pub const RELATIONSHIP: Self = Self::of(&[
        OperationKind::FindAll,
        OperationKind::FindAllByCriteria,
        OperationKind::FindById,
    ]);

    /// Operations returning a single item
    pub const ITEM_RESULTS: Self = Self::of(&[
        OperationKind::Save,
        OperationKind::FindById,
        OperationKind::UpdateById,
        OperationKind::PatchById,
    ]);

    /// Operations returning a page
    pub const PAGE_RESULTS: Self = Self::of(&[OperationKind::FindAll, OperationKind::FindAllByCriteria]);

    #[must_use]
    pub const fn all() -> Self {
        Self::of(&OperationKind::ALL)
    }

    #[must_use]
    pub const fn none() -> Self {
        Self(0)
    }

    /// Set of the given kinds
    #[must_use]
    pub const fn of(kinds: &[OperationKind]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < kinds.len() {
            bits |= kinds[i].bit();
            i += 1;
        }
        Self(bits)
    }

    #[must_use]
    pub const fn with(self, kind: OperationKind) -> Self {
        Self(self.0 | kind.bit())
    }

    #[must_use]
    pub const fn without(self, kind: OperationKind) -> Self {
        Self(self.0 & !kind.bit())
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    pub const fn contains(self, kind: OperationKind) -> bool {
        self.0 & kind.bit() != 0
    }
}

impl Default for OperationSet {
    fn default() -> Self {
        Self::all()
    }
}

/// Result of an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "data", rename_all = "snake_case")]
pub enum Payload<T> {
    /// One item
    Item(T),
    /// A list of items
    Items(Vec<T>),
    /// A page of items
    Page(Page<T>),
    /// No data
    Empty,
}

impl<T> Payload<T> {
    /// Shape name used in logs and errors
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Item(_) => "item",
            Self::Items(_) => "items",
            Self::Page(_) => "page",
            Self::Empty => "empty",
        }
    }

    /// Convert every contained item
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Payload<U> {
        match self {
            Self::Item(item) => Payload::Item(f(item)),
            Self::Items(items) => Payload::Items(items.into_iter().map(f).collect()),
            Self::Page(page) => Payload::Page(page.map(f)),
            Self::Empty => Payload::Empty,
        }
    }

    /// Every contained item, whatever the shape
    pub fn items(&self) -> Vec<&T> {
        match self {
            Self::Item(item) => vec![item],
            Self::Items(items) => items.iter().collect(),
            Self::Page(page) => page.content.iter().collect(),
            Self::Empty => Vec::new(),
        }
    }

    pub fn into_item(self) -> Result<T> {
        match self {
            Self::Item(item) => Ok(item),
            other => Err(shape_error("item", other.shape())),
        }
    }

    pub fn into_items(self) -> Result<Vec<T>> {
        match self {
            Self::Items(items) => Ok(items),
            other => Err(shape_error("items", other.shape())),
        }
    }

    pub fn into_page(self) -> Result<Page<T>> {
        match self {
            Self::Page(page) => Ok(page),
            other => Err(shape_error("page", other.shape())),
        }
    }
}

fn shape_error(expected: &str, found: &str) -> Error {
    Error::Internal(format!("expected {} result, got {}", expected, found))
}
