//! # acton-crud
//!
//! Reusable CRUD infrastructure for entities with relationships.
//!
//! ## Features
//!
//! - **Criteria filters**: typed per-field filters compiled into validated predicates,
//!   including nested filters on related entities
//! - **Relationship-safe pagination**: two-phase reads (ids, then eager fetch) so
//!   to-many joins never distort page sizes or totals
//! - **Bulk persistence**: batched writes with flush/clear discipline in one transaction
//! - **Interception pipeline**: logging, hypermedia, caching, mapping and relationship
//!   layers composed as `tower` middleware
//! - **In-memory backend**: a complete repository for tests and prototypes
//!
//! ## Example
//!
//! ```rust,ignore
//! use acton_crud::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let store = Arc::new(InMemoryStore::<Company>::new());
//!     let cache = store_from_config(&config.cache).await?;
//!     let service = crud_stack::<_, _, CompanyFilter, _>(
//!         store,
//!         CompanyMapper,
//!         cache,
//!         PathLinkAssembler::new("/companies"),
//!         &config,
//!     );
//!
//!     let page = service
//!         .oneshot(Operation::FindAllByCriteria(Some(filter), PageRequest::first(20)))
//!         .await?
//!         .into_page()?;
//!     Ok(())
//! }
//! ```

pub mod bulk;
pub mod cache;
pub mod config;
pub mod entity;
pub mod error;
pub mod filter;
pub mod hypermedia;
pub mod mapping;
pub mod observability;
pub mod pipeline;
pub mod query;
pub mod repository;
pub mod service;

pub use error::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bulk::BulkEngine;
    pub use crate::cache::{store_from_config, CacheStore, MemoryCacheStore};

    #[cfg(feature = "cache")]
    pub use crate::cache::RedisCacheStore;

    pub use crate::config::{BulkConfig, CacheConfig, Config, PaginationConfig, RedisConfig};
    pub use crate::entity::{
        Cardinality, Entity, FieldDef, FieldKind, Identified, Record, RelationDef, Related, Schema,
    };
    pub use crate::error::{Error, Result};
    pub use crate::filter::{
        BooleanFilter, CollectionFilter, Criteria, DateFilter, FilterNode, NumberFilter,
        Specification, TextFilter, UuidFilter,
    };
    pub use crate::hypermedia::{Link, LinkAssembler, Linked, LinkedPage, PathLinkAssembler};
    pub use crate::mapping::Mapper;
    pub use crate::observability::init_tracing;
    pub use crate::pipeline::{
        crud_stack, CachingLayer, HypermediaLayer, LoggingLayer, MappingLayer, RelationshipLayer,
        Representation,
    };
    pub use crate::query::QueryEngine;
    pub use crate::repository::{
        BulkRepository, CrudRepository, FetchRelationship, InMemoryStore, Order, Page,
        PageRequest, RepositoryError, Sort, UnitOfWork,
    };
    pub use crate::service::{CrudService, Operation, OperationKind, OperationSet, Payload};

    pub use std::sync::Arc;
    pub use tower::{Service, ServiceBuilder, ServiceExt};
}
