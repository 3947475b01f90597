//! Hypermedia decoration middleware
//!
//! Item results of `FindById`, `Save`, `UpdateById` and `PatchById` are
//! wrapped in [`Linked`]; page results of `FindAll` and
//! `FindAllByCriteria` in [`LinkedPage`]. A result whose shape does not fit
//! the operation is logged as an error and returned undecorated.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use serde::Serialize;
use tower::{Layer, Service};

use crate::entity::Identified;
use crate::error::{Error, Result};
use crate::hypermedia::{LinkAssembler, Linked, LinkedPage};
use crate::service::{Operation, OperationSet, Payload};

/// Result of a decorated operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Representation<T> {
    /// A linked item
    Item(Linked<T>),
    /// A linked page
    Page(LinkedPage<T>),
    /// An undecorated result
    Plain(Payload<T>),
}

impl<T> Representation<T> {
    /// The linked item, or [`Error::Internal`] for any other shape
    pub fn into_item(self) -> Result<Linked<T>> {
        match self {
            Self::Item(item) => Ok(item),
            other => Err(Error::Internal(format!(
                "expected linked item, got {}",
                other.shape()
            ))),
        }
    }

    /// The linked page, or [`Error::Internal`] for any other shape
    pub fn into_page(self) -> Result<LinkedPage<T>> {
        match self {
            Self::Page(page) => Ok(page),
            other => Err(Error::Internal(format!(
                "expected linked page, got {}",
                other.shape()
            ))),
        }
    }

    /// The undecorated payload, or [`Error::Internal`] for any other shape
    pub fn into_plain(self) -> Result<Payload<T>> {
        match self {
            Self::Plain(payload) => Ok(payload),
            other => Err(Error::Internal(format!(
                "expected plain result, got {}",
                other.shape()
            ))),
        }
    }

    fn shape(&self) -> &'static str {
        match self {
            Self::Item(_) => "linked item",
            Self::Page(_) => "linked page",
            Self::Plain(payload) => payload.shape(),
        }
    }
}

/// Hypermedia middleware
pub struct HypermediaLayer<A> {
    assembler: Arc<A>,
    items: OperationSet,
    pages: OperationSet,
}

impl<A> HypermediaLayer<A> {
    /// Decorate item and page results with links from `assembler`
    pub fn new(assembler: A) -> Self {
        Self {
            assembler: Arc::new(assembler),
            items: OperationSet::ITEM_RESULTS,
            pages: OperationSet::PAGE_RESULTS,
        }
    }

    /// Only decorate the given operations
    #[must_use]
    pub fn only(mut self, operations: OperationSet) -> Self {
        self.items = self.items.intersection(operations);
        self.pages = self.pages.intersection(operations);
        self
    }
}

impl<A> Clone for HypermediaLayer<A> {
    fn clone(&self) -> Self {
        Self {
            assembler: Arc::clone(&self.assembler),
            items: self.items,
            pages: self.pages,
        }
    }
}

impl<S, A> Layer<S> for HypermediaLayer<A> {
    type Service = HypermediaService<S, A>;

    fn layer(&self, inner: S) -> Self::Service {
        HypermediaService {
            inner,
            assembler: Arc::clone(&self.assembler),
            items: self.items,
            pages: self.pages,
        }
    }
}

/// Hypermedia service implementation
pub struct HypermediaService<S, A> {
    inner: S,
    assembler: Arc<A>,
    items: OperationSet,
    pages: OperationSet,
}

impl<S: Clone, A> Clone for HypermediaService<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            assembler: Arc::clone(&self.assembler),
            items: self.items,
            pages: self.pages,
        }
    }
}

impl<S, A, T, F> Service<Operation<T, F>> for HypermediaService<S, A>
where
    S: Service<Operation<T, F>, Response = Payload<T>, Error = Error> + Clone + Send + 'static,
    S::Future: Send + 'static,
    A: LinkAssembler<T>,
    T: Identified + Send + 'static,
    F: Send + 'static,
{
    type Response = Representation<T>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, operation: Operation<T, F>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let assembler = Arc::clone(&self.assembler);
        let kind = operation.kind();
        let decorate_item = self.items.contains(kind);
        let decorate_page = self.pages.contains(kind);

        Box::pin(async move {
            let payload = inner.call(operation).await?;
            let representation = match payload {
                Payload::Item(item) if decorate_item => Representation::Item(assembler.to_model(item)),
                Payload::Page(page) if decorate_page => Representation::Page(assembler.to_page_model(page)),
                other if decorate_item || decorate_page => {
                    tracing::error!(
                        operation = %kind,
                        shape = other.shape(),
                        "hypermedia shape mismatch, returning result without links"
                    );
                    Representation::Plain(other)
                }
                other => Representation::Plain(other),
            };
            Ok(representation)
        })
    }
}
