//! Result caching middleware
//!
//! Reads are get-or-compute: a hit skips everything below this layer.
//! Writes always run and then refresh the cache:
//!
//! | Operation | Cache effect |
//! |-----------|--------------|
//! | `FindById` | get-or-compute in `names`, key = id |
//! | `FindAll`, `FindAllByCriteria` | get-or-compute in the `All` caches, key from the arguments |
//! | `Save`, `UpdateById`, `PatchById` | put the result by id, clear the `All` caches |
//! | `SaveAll`, `UpdateAll`, `PatchAll` | put each result by id, clear the `All` caches |
//! | `DeleteById` | evict the id, clear the `All` caches |
//! | `DeleteAll`, `DeleteAllByCriteria` | clear `names` and the `All` caches |
//!
//! The `All` caches are the cache names suffixed with `All`, so
//! `["companies"]` keeps pages in `companiesAll`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use serde::{de::DeserializeOwned, Serialize};
use tower::{Layer, Service};

use crate::cache::{self, CacheStore};
use crate::entity::Identified;
use crate::error::{Error, Result};
use crate::filter::Criteria;
use crate::repository::Page;
use crate::service::{Operation, OperationKind, OperationSet, Payload};

/// Caller-supplied cache key for reads; `None` falls back to the default key
pub type KeyFn<T, F> = Arc<dyn Fn(&Operation<T, F>) -> Option<String> + Send + Sync>;

/// Caching middleware
pub struct CachingLayer<T: Identified, F> {
    settings: Arc<CacheSettings<T, F>>,
}

struct CacheSettings<T: Identified, F> {
    store: Arc<dyn CacheStore>,
    names: Vec<String>,
    all_names: Vec<String>,
    key: Option<KeyFn<T, F>>,
    operations: OperationSet,
}

impl<T: Identified, F> CachingLayer<T, F> {
    /// Cache under a single name
    pub fn new(store: Arc<dyn CacheStore>, name: impl Into<String>) -> Self {
        Self::with_names(store, vec![name.into()])
    }

    /// Cache under several names
    pub fn with_names(store: Arc<dyn CacheStore>, names: Vec<String>) -> Self {
        let all_names = names.iter().map(|name| format!("{}All", name)).collect();
        Self {
            settings: Arc::new(CacheSettings {
                store,
                names,
                all_names,
                key: None,
                operations: OperationSet::all(),
            }),
        }
    }

    /// Use a custom key for reads
    #[must_use]
    pub fn with_key(self, key: impl Fn(&Operation<T, F>) -> Option<String> + Send + Sync + 'static) -> Self {
        self.update(|settings| settings.key = Some(Arc::new(key)))
    }

    /// Only cache the given operations; others pass straight through
    #[must_use]
    pub fn only(self, operations: OperationSet) -> Self {
        self.update(|settings| settings.operations = operations)
    }

    fn update(self, f: impl FnOnce(&mut CacheSettings<T, F>)) -> Self {
        let mut settings = match Arc::try_unwrap(self.settings) {
            Ok(settings) => settings,
            Err(shared) => CacheSettings {
                store: Arc::clone(&shared.store),
                names: shared.names.clone(),
                all_names: shared.all_names.clone(),
                key: shared.key.clone(),
                operations: shared.operations,
            },
        };
        f(&mut settings);
        Self {
            settings: Arc::new(settings),
        }
    }
}

impl<T: Identified, F> Clone for CachingLayer<T, F> {
    fn clone(&self) -> Self {
        Self {
            settings: Arc::clone(&self.settings),
        }
    }
}

impl<S, T: Identified, F> Layer<S> for CachingLayer<T, F> {
    type Service = CachingService<S, T, F>;

    fn layer(&self, inner: S) -> Self::Service {
        CachingService {
            inner,
            settings: Arc::clone(&self.settings),
        }
    }
}

/// Caching service implementation
pub struct CachingService<S, T: Identified, F> {
    inner: S,
    settings: Arc<CacheSettings<T, F>>,
}

impl<S: Clone, T: Identified, F> Clone for CachingService<S, T, F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            settings: Arc::clone(&self.settings),
        }
    }
}

impl<S, T, F> Service<Operation<T, F>> for CachingService<S, T, F>
where
    S: Service<Operation<T, F>, Response = Payload<T>, Error = Error> + Clone + Send + 'static,
    S::Future: Send + 'static,
    T: Identified + Serialize + DeserializeOwned + Send + Sync + 'static,
    F: Criteria + 'static,
{
    type Response = Payload<T>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, operation: Operation<T, F>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        if !self.settings.operations.contains(operation.kind()) {
            return Box::pin(inner.call(operation));
        }

        let settings = Arc::clone(&self.settings);
        Box::pin(async move { settings.run(inner, operation).await })
    }
}

impl<T, F> CacheSettings<T, F>
where
    T: Identified + Serialize + DeserializeOwned + Send + Sync + 'static,
    F: Criteria + 'static,
{
    async fn run<S>(&self, mut inner: S, operation: Operation<T, F>) -> Result<Payload<T>>
    where
        S: Service<Operation<T, F>, Response = Payload<T>, Error = Error> + Send,
        S::Future: Send,
    {
        let store = self.store.as_ref();
        match operation.kind() {
            OperationKind::FindById => {
                let key = self.read_key(&operation);
                let item: T = cache::compute_if_absent(store, &self.names, &key, move || async move {
                    inner.call(operation).await?.into_item()
                })
                .await?;
                Ok(Payload::Item(item))
            }
            OperationKind::FindAll | OperationKind::FindAllByCriteria => {
                let key = self.read_key(&operation);
                let page: Page<T> = cache::compute_if_absent(store, &self.all_names, &key, move || async move {
                    inner.call(operation).await?.into_page()
                })
                .await?;
                Ok(Payload::Page(page))
            }
            OperationKind::DeleteById => {
                let key = match &operation {
                    Operation::DeleteById(id) => Some(id.to_string()),
                    _ => None,
                };
                let result = inner.call(operation).await?;
                if let Some(key) = key {
                    cache::evict(store, &self.names, &key).await?;
                }
                cache::evict_all(store, &self.all_names).await?;
                Ok(result)
            }
            OperationKind::DeleteAll | OperationKind::DeleteAllByCriteria => {
                let result = inner.call(operation).await?;
                cache::evict_all(store, &self.names).await?;
                cache::evict_all(store, &self.all_names).await?;
                Ok(result)
            }
            OperationKind::Save
            | OperationKind::UpdateById
            | OperationKind::PatchById
            | OperationKind::SaveAll
            | OperationKind::UpdateAll
            | OperationKind::PatchAll => {
                let result = inner.call(operation).await?;
                for item in result.items() {
                    if let Some(id) = item.id() {
                        cache::put(store, &self.names, &id.to_string(), item).await?;
                    }
                }
                cache::evict_all(store, &self.all_names).await?;
                Ok(result)
            }
        }
    }

    fn read_key(&self, operation: &Operation<T, F>) -> String {
        if let Some(key) = self.key.as_ref().and_then(|key| key(operation)) {
            return key;
        }
        match operation {
            Operation::FindById(id) => id.to_string(),
            Operation::FindAll(page) => page.to_string(),
            Operation::FindAllByCriteria(filter, page) => match filter {
                Some(filter) => format!("{}|{}", filter.to_filter(), page),
                None => format!("*|{}", page),
            },
            other => other.kind().to_string(),
        }
    }
}
