//! Repository traits and backends
//!
//! This module defines the persistence boundary of the crate: generic traits
//! that a backend implements once per entity type, plus an in-memory backend.
//!
//! # Features
//!
//! - **Criteria reads**: [`CrudRepository`] takes validated
//!   [`Specification`](crate::filter::Specification)s for pages, id pages,
//!   counts and deletes
//! - **Eager loading**: [`FetchRelationship`] is an optional capability used
//!   for relationship-safe two-phase pagination
//! - **Write sessions**: [`BulkRepository`] and [`UnitOfWork`] for batched,
//!   transactional writes
//! - **Pagination**: [`PageRequest`], [`Sort`] and [`Page`]
//! - **In-memory backend**: [`InMemoryStore`]
//!
//! # Example
//!
//! ```rust,ignore
//! use acton_crud::repository::{CrudRepository, InMemoryStore, PageRequest};
//! use acton_crud::filter::Specification;
//!
//! let store = InMemoryStore::<Company>::new();
//! let page = store
//!     .find_page(&Specification::all("company"), &PageRequest::first(20))
//!     .await?;
//! ```

mod error;
mod memory;
mod pagination;
mod traits;

pub use error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
pub use memory::{InMemoryStore, MemorySession, StoreStats};
pub use pagination::{Order, OrderDirection, Page, PageRequest, Sort};
pub use traits::{
    all_identified, BulkRepository, CrudRepository, FetchRelationship, RepositoryResult,
    UnitOfWork,
};
