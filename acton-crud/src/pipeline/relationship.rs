//! Relationship-safe reads
//!
//! Answers find-all and find-by-id operations through the
//! [`QueryEngine`]'s two-phase read when the backend can eagerly fetch
//! relationships. Every other operation, and every read on a backend without
//! the capability, goes to the wrapped service.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::{Layer, Service};

use crate::entity::Entity;
use crate::error::Error;
use crate::filter::Criteria;
use crate::query::QueryEngine;
use crate::repository::CrudRepository;
use crate::service::{Operation, OperationSet, Payload};

/// Relationship fetch middleware
pub struct RelationshipLayer<R, E> {
    engine: QueryEngine<R, E>,
    operations: OperationSet,
}

impl<R, E> RelationshipLayer<R, E> {
    /// Eagerly fetch for find-all, find-all-by-criteria and find-by-id
    pub fn new(engine: QueryEngine<R, E>) -> Self {
        Self {
            engine,
            operations: OperationSet::RELATIONSHIP,
        }
    }

    /// Only eagerly fetch for the given operations
    ///
    /// Operations other than the three reads are always passed through.
    #[must_use]
    pub fn only(mut self, operations: OperationSet) -> Self {
        self.operations = operations;
        self
    }
}

impl<R, E> Clone for RelationshipLayer<R, E> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            operations: self.operations,
        }
    }
}

impl<S, R, E> Layer<S> for RelationshipLayer<R, E> {
    type Service = RelationshipService<S, R, E>;

    fn layer(&self, inner: S) -> Self::Service {
        RelationshipService {
            inner,
            engine: self.engine.clone(),
            operations: self.operations,
        }
    }
}

/// Relationship fetch service implementation
pub struct RelationshipService<S, R, E> {
    inner: S,
    engine: QueryEngine<R, E>,
    operations: OperationSet,
}

impl<S: Clone, R, E> Clone for RelationshipService<S, R, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            engine: self.engine.clone(),
            operations: self.operations,
        }
    }
}

impl<S, R, E, F> Service<Operation<E, F>> for RelationshipService<S, R, E>
where
    S: Service<Operation<E, F>, Response = Payload<E>, Error = Error> + Clone + Send + 'static,
    S::Future: Send + 'static,
    R: CrudRepository<E> + 'static,
    E: Entity,
    F: Criteria + 'static,
{
    type Response = Payload<E>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, operation: Operation<E, F>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        if !self.operations.contains(operation.kind()) || !self.engine.supports_eager_fetch() {
            return Box::pin(inner.call(operation));
        }

        let engine = self.engine.clone();
        Box::pin(async move {
            match operation {
                Operation::FindAll(page) => engine.find_all(None::<&F>, &page).await.map(Payload::Page),
                Operation::FindAllByCriteria(filter, page) => engine
                    .find_all(filter.as_ref(), &page)
                    .await
                    .map(Payload::Page),
                Operation::FindById(id) => engine
                    .find_by_id(&id)
                    .await?
                    .map(Payload::Item)
                    .ok_or_else(|| Error::not_found(E::name(), &id)),
                other => inner.call(other).await,
            }
        })
    }
}
