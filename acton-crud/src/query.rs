//! Criteria query engine
//!
//! Reads pages of entities matching an optional filter. When the backend can
//! eagerly fetch relationships, a page is read in two phases so that joins on
//! to-many relationships never distort page sizes or totals:
//!
//! 1. **Id resolution**: the ordered, distinct id page and the total count,
//!    both computed with the same predicate
//! 2. **Eager fetch**: exactly those ids, with their relationships loaded
//! 3. **Reassembly**: phase-two rows re-ordered to match phase one
//!
//! Backends without the capability get a single-phase read with the same
//! result shape. That read limits the joined rows, so when a to-many join
//! fans out, repeated roots are dropped and the page may come back short,
//! with the total the backend reported.
//!
//! # Example
//!
//! ```rust,ignore
//! use acton_crud::query::QueryEngine;
//! use acton_crud::repository::{InMemoryStore, PageRequest};
//!
//! let engine = QueryEngine::new(Arc::new(InMemoryStore::<Company>::new()));
//! let page = engine.find_all(Some(&filter), &PageRequest::first(20)).await?;
//! assert!(page.content.len() <= 20);
//! ```

use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use crate::config::PaginationConfig;
use crate::entity::{Entity, FieldKind};
use crate::error::{Error, Result};
use crate::filter::{Criteria, Specification};
use crate::repository::{CrudRepository, FetchRelationship, Page, PageRequest, Sort};

/// Reads entity pages through a repository
pub struct QueryEngine<R, E> {
    repository: Arc<R>,
    relations: Vec<&'static str>,
    max_page_size: u64,
    _entity: PhantomData<fn() -> E>,
}

impl<R, E> Clone for QueryEngine<R, E> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            relations: self.relations.clone(),
            max_page_size: self.max_page_size,
            _entity: PhantomData,
        }
    }
}

impl<R, E> QueryEngine<R, E>
where
    R: CrudRepository<E>,
    E: Entity,
{
    /// Engine loading every declared relationship, with default page limits
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            relations: E::schema().relation_names(),
            max_page_size: PaginationConfig::default().max_page_size,
            _entity: PhantomData,
        }
    }

    /// Only eagerly load the named relationships
    #[must_use]
    pub fn with_relations(mut self, relations: Vec<&'static str>) -> Self {
        self.relations = relations;
        self
    }

    /// Apply page limits from configuration
    #[must_use]
    pub fn with_pagination(mut self, config: &PaginationConfig) -> Self {
        self.max_page_size = config.max_page_size;
        self
    }

    /// The repository the engine reads through
    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Whether reads will use the two-phase path
    pub fn supports_eager_fetch(&self) -> bool {
        self.repository.relationship_fetch().is_some()
    }

    /// Page of entities matching the filter, two-phase when possible
    pub async fn find_all<C: Criteria + ?Sized>(
        &self,
        filter: Option<&C>,
        page: &PageRequest,
    ) -> Result<Page<E>> {
        let (spec, page) = self.prepare(filter, page)?;
        match self.repository.relationship_fetch() {
            Some(fetcher) => self.two_phase(fetcher, &spec, &page).await,
            None => {
                tracing::debug!(
                    entity = E::name(),
                    "backend cannot fetch relationships, using single-phase read"
                );
                self.single_phase(&spec, &page).await
            }
        }
    }

    /// Page of entities matching the filter, always single-phase
    pub async fn find_all_single_phase<C: Criteria + ?Sized>(
        &self,
        filter: Option<&C>,
        page: &PageRequest,
    ) -> Result<Page<E>> {
        let (spec, page) = self.prepare(filter, page)?;
        self.single_phase(&spec, &page).await
    }

    /// One entity, with relationships eagerly loaded when possible
    pub async fn find_by_id(&self, id: &E::Id) -> Result<Option<E>> {
        let found = match self.repository.relationship_fetch() {
            Some(fetcher) => fetcher.fetch_by_id(id, &self.relations).await?,
            None => self.repository.find_by_id(id).await?,
        };
        Ok(found)
    }

    /// Entities with the given ids, in unspecified order; missing ids are
    /// skipped
    pub async fn find_by_ids(&self, ids: &[E::Id]) -> Result<Vec<E>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let found = match self.repository.relationship_fetch() {
            Some(fetcher) => fetcher.fetch_by_ids(ids, &self.relations).await?,
            None => {
                let spec = Specification::by_ids::<E>(ids);
                let request = PageRequest::first(ids.len() as u64);
                self.repository.find_page(&spec, &request).await?.content
            }
        };
        Ok(found)
    }

    fn prepare<C: Criteria + ?Sized>(
        &self,
        filter: Option<&C>,
        page: &PageRequest,
    ) -> Result<(Specification, PageRequest)> {
        let spec = Specification::build::<E, C>(filter)?;
        validate_sort::<E>(&page.sort)?;
        Ok((spec, page.clamped(self.max_page_size)))
    }

    async fn single_phase(&self, spec: &Specification, page: &PageRequest) -> Result<Page<E>> {
        let mut result = self.repository.find_page(spec, page).await?;
        let fetched = result.content.len();
        let mut seen = HashSet::with_capacity(fetched);
        result
            .content
            .retain(|entity| entity.id().map_or(true, |id| seen.insert(id.clone())));
        if result.content.len() < fetched {
            tracing::debug!(
                entity = E::name(),
                fetched,
                returned = result.content.len(),
                "single-phase page repeated roots"
            );
        }
        let limit = usize::try_from(page.size).unwrap_or(usize::MAX);
        result.content.truncate(limit);
        Ok(result)
    }

    async fn two_phase(
        &self,
        fetcher: &dyn FetchRelationship<E>,
        spec: &Specification,
        page: &PageRequest,
    ) -> Result<Page<E>> {
        let start = Instant::now();
        tracing::info!(entity = E::name(), "find all by criteria using eager fetching for relationships");

        let (ids, total) = futures::try_join!(
            self.repository.find_ids(spec, &page.sort, page.offset(), page.size),
            self.repository.count(spec),
        )?;

        if ids.is_empty() {
            return Ok(Page::new(Vec::new(), page, total));
        }

        let fetched = fetcher.fetch_by_ids(&ids, &self.relations).await?;
        let requested = ids.len();
        let content = reassemble(ids, fetched);
        if content.len() < requested {
            tracing::debug!(
                entity = E::name(),
                requested,
                returned = content.len(),
                "eager fetch returned fewer rows than ids requested"
            );
        }

        tracing::debug!(
            entity = E::name(),
            page = page.page,
            size = page.size,
            total,
            duration_ms = start.elapsed().as_millis() as u64,
            "two-phase page read"
        );
        Ok(Page::new(content, page, total))
    }
}

/// Order fetched entities by the id page, dropping ids that were not returned
fn reassemble<E: Entity>(ids: Vec<E::Id>, fetched: Vec<E>) -> Vec<E> {
    let mut by_id: HashMap<E::Id, E> = fetched
        .into_iter()
        .filter_map(|entity| entity.id().cloned().map(|id| (id, entity)))
        .collect();
    ids.into_iter().filter_map(|id| by_id.remove(&id)).collect()
}

/// Reject sort orders on properties the entity does not declare
pub fn validate_sort<E: Entity>(sort: &Sort) -> Result<()> {
    let schema = E::schema();
    for order in sort.iter() {
        let field = schema.field(&order.property).ok_or_else(|| {
            Error::invalid_filter_field(schema.name, order.property.clone(), "unknown sort property")
        })?;
        if field.kind == FieldKind::Collection {
            return Err(Error::invalid_filter_field(
                schema.name,
                order.property.clone(),
                format!("cannot sort on a {} field", field.kind),
            ));
        }
    }
    Ok(())
}
