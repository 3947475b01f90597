//! Repository trait definitions
//!
//! Backends implement these traits to plug into the query engine, the bulk
//! engine and the CRUD service. Like the rest of the crate they use RPITIT
//! (Return Position Impl Trait In Traits) for async methods; the one trait
//! that is handed around as a capability object uses `async_trait`.
//!
//! # Overview
//!
//! - [`CrudRepository`]: predicate-driven reads, counts and deletes
//! - [`FetchRelationship`]: optional eager loading of entities by id
//! - [`BulkRepository`] and [`UnitOfWork`]: transactional, batched writes
//!
//! # Example
//!
//! ```rust,ignore
//! use acton_crud::repository::{CrudRepository, Page, PageRequest, RepositoryResult};
//! use acton_crud::filter::Specification;
//!
//! impl CrudRepository<Company> for CompanyRepository {
//!     async fn find_page(
//!         &self,
//!         spec: &Specification,
//!         page: &PageRequest,
//!     ) -> RepositoryResult<Page<Company>> {
//!         let sql = self.render(spec, page);
//!         // ...
//!     }
//!     // ... other methods
//! }
//! ```

use std::future::Future;

use async_trait::async_trait;

use super::error::RepositoryError;
use super::pagination::{Page, PageRequest, Sort};
use crate::entity::{Entity, Identified};
use crate::filter::Specification;

/// Result type for repository operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Predicate-driven reads and deletes for one entity type
///
/// Every read takes a validated [`Specification`]. `find_ids` and `count`
/// must collapse duplicate root rows whenever
/// [`Specification::requires_distinct`] is true. `find_page` may return a
/// root once per joined row.
pub trait CrudRepository<E: Entity>: Send + Sync {
    /// Find an entity by its identifier
    ///
    /// Returns `Ok(None)` if no entity has that id.
    fn find_by_id(&self, id: &E::Id) -> impl Future<Output = RepositoryResult<Option<E>>> + Send;

    /// Single-phase paginated read
    ///
    /// Sorting and limiting happen directly on the joined query, so a to-many
    /// join can repeat a root within the page and inflate the total.
    fn find_page(
        &self,
        spec: &Specification,
        page: &PageRequest,
    ) -> impl Future<Output = RepositoryResult<Page<E>>> + Send;

    /// Distinct ids of matching entities, ordered by `sort`, then limited
    ///
    /// This is phase one of a relationship-safe page read: joins may fan
    /// out, but ids are deduplicated before `offset` and `limit` apply.
    fn find_ids(
        &self,
        spec: &Specification,
        sort: &Sort,
        offset: u64,
        limit: u64,
    ) -> impl Future<Output = RepositoryResult<Vec<E::Id>>> + Send;

    /// Number of distinct entities matching the specification
    fn count(&self, spec: &Specification) -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Check if an entity exists by its identifier
    fn exists(&self, id: &E::Id) -> impl Future<Output = RepositoryResult<bool>> + Send;

    /// Delete an entity by its identifier
    ///
    /// Returns `true` if the entity was deleted, `false` if it didn't exist.
    fn delete_by_id(&self, id: &E::Id) -> impl Future<Output = RepositoryResult<bool>> + Send;

    /// Delete every entity matching the specification
    ///
    /// Returns the number of deleted entities.
    fn delete_matching(
        &self,
        spec: &Specification,
    ) -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Eager relationship loading, when the backend supports it
    ///
    /// Backends without eager loading keep the default and get single-phase
    /// pagination.
    fn relationship_fetch(&self) -> Option<&dyn FetchRelationship<E>> {
        None
    }
}

/// Eager loading of entities together with their relationships
///
/// # Example
///
/// ```rust,ignore
/// #[async_trait]
/// impl FetchRelationship<Company> for CompanyRepository {
///     async fn fetch_by_ids(
///         &self,
///         ids: &[i64],
///         relations: &[&'static str],
///     ) -> RepositoryResult<Vec<Company>> {
///         // SELECT ... LEFT JOIN FETCH departments ... WHERE id IN (...)
///     }
/// }
/// ```
#[async_trait]
pub trait FetchRelationship<E: Entity>: Send + Sync {
    /// Load the entities with the given ids, eagerly loading `relations`
    ///
    /// The result order is unspecified and ids that no longer exist are
    /// silently skipped.
    async fn fetch_by_ids(
        &self,
        ids: &[E::Id],
        relations: &[&'static str],
    ) -> RepositoryResult<Vec<E>>;

    /// Load one entity, eagerly loading `relations`
    async fn fetch_by_id(
        &self,
        id: &E::Id,
        relations: &[&'static str],
    ) -> RepositoryResult<Option<E>> {
        let mut found = self
            .fetch_by_ids(std::slice::from_ref(id), relations)
            .await?;
        Ok(found.pop())
    }
}

/// A transactional write session
///
/// Writes are staged by [`insert`](UnitOfWork::insert) and
/// [`merge`](UnitOfWork::merge), sent to the backend by
/// [`flush`](UnitOfWork::flush) and made durable by
/// [`commit`](UnitOfWork::commit). Dropping a session without committing
/// discards every write.
pub trait UnitOfWork<E: Entity>: Send {
    /// Stage a new entity; returns it with its generated id
    fn insert(&mut self, entity: E) -> impl Future<Output = RepositoryResult<E>> + Send;

    /// Stage the new state of an existing entity
    fn merge(&mut self, entity: E) -> impl Future<Output = RepositoryResult<E>> + Send;

    /// Send staged writes to the backend
    fn flush(&mut self) -> impl Future<Output = RepositoryResult<()>> + Send;

    /// Detach every entity tracked by the session
    fn clear(&mut self) -> impl Future<Output = RepositoryResult<()>> + Send;

    /// Make every flushed write durable
    fn commit(self) -> impl Future<Output = RepositoryResult<()>> + Send;

    /// Discard every write of the session
    fn rollback(self) -> impl Future<Output = RepositoryResult<()>> + Send;
}

/// Backends able to open write sessions
pub trait BulkRepository<E: Entity>: Send + Sync {
    /// Session type
    type Session: UnitOfWork<E>;

    /// Open a write session
    fn begin(&self) -> impl Future<Output = RepositoryResult<Self::Session>> + Send;
}

/// Whether every item carries an identifier
pub fn all_identified<T: Identified>(items: &[T]) -> bool {
    items.iter().all(|item| item.id().is_some())
}
