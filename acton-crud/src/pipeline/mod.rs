//! Interception pipeline
//!
//! Cross-cutting aspects are `tower` layers stacked around a
//! [`CrudService`]. Each layer is independent and can be limited to a subset
//! of operations with `only`. The standard order, outermost first:
//!
//! 1. [`LoggingLayer`]: observes final results and errors
//! 2. [`HypermediaLayer`]: decorates items and pages with links
//! 3. [`CachingLayer`]: a hit skips mapping and the backend
//! 4. [`MappingLayer`]: DTOs above, entities below
//! 5. [`RelationshipLayer`]: two-phase eager reads
//!
//! ```rust,ignore
//! use tower::ServiceBuilder;
//!
//! let service = ServiceBuilder::new()
//!     .layer(LoggingLayer::new("companies"))
//!     .layer(HypermediaLayer::new(PathLinkAssembler::new("/companies")))
//!     .layer(CachingLayer::new(cache_store, "companies"))
//!     .layer(MappingLayer::new(CompanyMapper))
//!     .layer(RelationshipLayer::new(QueryEngine::new(Arc::clone(&repository))))
//!     .service(CrudService::new(repository));
//! ```
//!
//! [`crud_stack`] builds exactly this stack from configuration.

mod caching;
mod hypermedia;
mod logging;
mod mapping;
mod relationship;

pub use caching::{CachingLayer, CachingService, KeyFn};
pub use hypermedia::{HypermediaLayer, HypermediaService, Representation};
pub use logging::{LoggingLayer, LoggingService};
pub use mapping::{MappingLayer, MappingService};
pub use relationship::{RelationshipLayer, RelationshipService};

use std::sync::Arc;

use tower::{Service, ServiceBuilder};

use crate::cache::CacheStore;
use crate::config::Config;
use crate::entity::Entity;
use crate::error::Error;
use crate::filter::Criteria;
use crate::hypermedia::LinkAssembler;
use crate::mapping::Mapper;
use crate::query::QueryEngine;
use crate::repository::{BulkRepository, CrudRepository};
use crate::service::{CrudService, Operation, OperationSet};

/// The standard pipeline over a repository
///
/// Caches are named after the entity. With `cache.enabled = false` the
/// caching layer passes every operation through.
pub fn crud_stack<R, M, F, A>(
    repository: Arc<R>,
    mapper: M,
    cache_store: Arc<dyn CacheStore>,
    assembler: A,
    config: &Config,
) -> impl Service<Operation<M::Dto, F>, Response = Representation<M::Dto>, Error = Error> + Clone + Send
where
    R: CrudRepository<M::Entity> + BulkRepository<M::Entity> + 'static,
    M: Mapper,
    F: Criteria + 'static,
    A: LinkAssembler<M::Dto>,
{
    let engine = QueryEngine::new(Arc::clone(&repository)).with_pagination(&config.pagination);

    let mut caching = CachingLayer::<M::Dto, F>::new(cache_store, <M::Entity as Entity>::name());
    if !config.cache.enabled {
        caching = caching.only(OperationSet::none());
    }

    ServiceBuilder::new()
        .layer(LoggingLayer::new(config.service.name.clone()))
        .layer(HypermediaLayer::new(assembler))
        .layer(caching)
        .layer(MappingLayer::new(mapper))
        .layer(RelationshipLayer::new(engine))
        .service(CrudService::<R, M::Entity, F>::from_config(repository, config))
}
