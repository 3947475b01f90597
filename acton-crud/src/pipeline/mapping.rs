//! DTO mapping middleware
//!
//! Converts DTO arguments to entities before the wrapped call and entity
//! results back to DTOs afterwards, for items, lists and pages alike.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::{Layer, Service};

use crate::error::Error;
use crate::mapping::Mapper;
use crate::service::{Operation, Payload};

/// Mapping middleware
pub struct MappingLayer<M> {
    mapper: Arc<M>,
}

impl<M> MappingLayer<M> {
    /// Layer converting DTOs with `mapper`
    pub fn new(mapper: M) -> Self {
        Self {
            mapper: Arc::new(mapper),
        }
    }

    /// Share an existing mapper
    pub fn from_arc(mapper: Arc<M>) -> Self {
        Self { mapper }
    }
}

impl<M> Clone for MappingLayer<M> {
    fn clone(&self) -> Self {
        Self {
            mapper: Arc::clone(&self.mapper),
        }
    }
}

impl<S, M> Layer<S> for MappingLayer<M> {
    type Service = MappingService<S, M>;

    fn layer(&self, inner: S) -> Self::Service {
        MappingService {
            inner,
            mapper: Arc::clone(&self.mapper),
        }
    }
}

/// Mapping service implementation
pub struct MappingService<S, M> {
    inner: S,
    mapper: Arc<M>,
}

impl<S: Clone, M> Clone for MappingService<S, M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            mapper: Arc::clone(&self.mapper),
        }
    }
}

impl<S, M, F> Service<Operation<M::Dto, F>> for MappingService<S, M>
where
    M: Mapper,
    S: Service<Operation<M::Entity, F>, Response = Payload<M::Entity>, Error = Error>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
    F: Send + 'static,
{
    type Response = Payload<M::Dto>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, operation: Operation<M::Dto, F>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let mapper = Arc::clone(&self.mapper);

        Box::pin(async move {
            let operation = operation.map_data(|dto| mapper.to_entity(dto))?;
            let payload = inner.call(operation).await?;
            Ok(payload.map(|entity| mapper.to_dto(entity)))
        })
    }
}
