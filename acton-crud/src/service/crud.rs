//! Repository-backed execution of CRUD operations

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use serde_json::Value;
use tower::Service;

use super::{Operation, Payload};
use crate::bulk::BulkEngine;
use crate::config::{Config, PaginationConfig};
use crate::entity::{Entity, Identified, Record, Related};
use crate::error::{BulkOperation, Error, Result};
use crate::filter::{Criteria, Specification};
use crate::query::QueryEngine;
use crate::repository::{all_identified, BulkRepository, CrudRepository, Sort, UnitOfWork};

/// Executes [`Operation`]s against a repository
///
/// Reads are single-phase here; wrap the service in a
/// [`RelationshipLayer`](crate::pipeline::RelationshipLayer) for eager,
/// two-phase reads.
pub struct CrudService<R, E, F> {
    engine: QueryEngine<R, E>,
    bulk: BulkEngine,
    _filter: PhantomData<fn() -> F>,
}

impl<R, E, F> Clone for CrudService<R, E, F> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            bulk: self.bulk,
            _filter: PhantomData,
        }
    }
}

impl<R, E, F> CrudService<R, E, F>
where
    R: CrudRepository<E> + BulkRepository<E> + 'static,
    E: Entity,
    F: Criteria + 'static,
{
    /// Service with default batch size and page limits
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            engine: QueryEngine::new(repository),
            bulk: BulkEngine::default(),
            _filter: PhantomData,
        }
    }

    /// Service configured from the `bulk` and `pagination` sections
    pub fn from_config(repository: Arc<R>, config: &Config) -> Self {
        Self::new(repository)
            .with_bulk(BulkEngine::from_config(&config.bulk))
            .with_pagination(&config.pagination)
    }

    /// Replace the bulk engine used by the `*All` operations
    #[must_use]
    pub fn with_bulk(mut self, bulk: BulkEngine) -> Self {
        self.bulk = bulk;
        self
    }

    /// Apply page limits from configuration
    #[must_use]
    pub fn with_pagination(mut self, pagination: &PaginationConfig) -> Self {
        self.engine = self.engine.with_pagination(pagination);
        self
    }

    /// The query engine used for reads
    pub fn engine(&self) -> &QueryEngine<R, E> {
        &self.engine
    }

    fn repository(&self) -> &R {
        self.engine.repository()
    }

    /// Run one operation
    pub async fn execute(&self, operation: Operation<E, F>) -> Result<Payload<E>> {
        match operation {
            Operation::Save(data) => self.save(data).await.map(Payload::Item),
            Operation::FindAll(page) => self
                .engine
                .find_all_single_phase(None::<&F>, &page)
                .await
                .map(Payload::Page),
            Operation::FindAllByCriteria(filter, page) => self
                .engine
                .find_all_single_phase(filter.as_ref(), &page)
                .await
                .map(Payload::Page),
            Operation::FindById(id) => self.find_by_id(&id).await.map(Payload::Item),
            Operation::UpdateById(id, data) => self.update_by_id(id, data).await.map(Payload::Item),
            Operation::PatchById(id, data) => self.patch_by_id(id, data).await.map(Payload::Item),
            Operation::DeleteById(id) => self.delete_by_id(&id).await.map(|_| Payload::Empty),
            Operation::SaveAll(items) => self.save_all(items).await.map(Payload::Items),
            Operation::UpdateAll(items) => self.update_all(items).await.map(Payload::Items),
            Operation::PatchAll(items) => self.patch_all(items).await.map(Payload::Items),
            Operation::DeleteAll => {
                let spec = Specification::all(E::name());
                self.delete_matching(&spec).await.map(|_| Payload::Empty)
            }
            Operation::DeleteAllByCriteria(filter) => {
                let spec = Specification::build::<E, F>(filter.as_ref())?;
                self.delete_matching(&spec).await.map(|_| Payload::Empty)
            }
        }
    }

    async fn save(&self, data: E) -> Result<E> {
        if let Some(id) = data.id() {
            return Err(Error::bad_request(format!(
                "Cannot save {} that already has id {}",
                E::name(),
                id
            )));
        }
        reject_related_ids(&data)?;
        self.persist_one(BulkOperation::Insert, data).await
    }

    async fn find_by_id(&self, id: &E::Id) -> Result<E> {
        self.repository()
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(E::name(), id))
    }

    async fn update_by_id(&self, id: Option<E::Id>, data: E) -> Result<E> {
        let data_id = checked_id(id.as_ref(), &data)?;
        if !self.repository().exists(&data_id).await? {
            return Err(Error::not_found(E::name(), &data_id));
        }
        self.persist_one(BulkOperation::Update, data).await
    }

    async fn patch_by_id(&self, id: Option<E::Id>, data: E) -> Result<E> {
        let data_id = checked_id(id.as_ref(), &data)?;
        let current = self
            .engine
            .find_by_id(&data_id)
            .await?
            .ok_or_else(|| Error::not_found(E::name(), &data_id))?;
        let patched = overlay(current, &data, &data_id)?;
        self.persist_one(BulkOperation::Update, patched).await
    }

    async fn delete_by_id(&self, id: &E::Id) -> Result<()> {
        if !self.repository().delete_by_id(id).await? {
            return Err(Error::not_found(E::name(), id));
        }
        tracing::debug!(entity = E::name(), id = %id, "entity deleted");
        Ok(())
    }

    async fn save_all(&self, items: Vec<E>) -> Result<Vec<E>> {
        if let Some(id) = items.iter().find_map(|item| item.id()) {
            return Err(Error::bad_request(format!(
                "Cannot save {} that already has id {}",
                E::name(),
                id
            )));
        }
        for item in &items {
            reject_related_ids(item)?;
        }
        self.bulk.bulk_insert(self.repository(), items).await
    }

    async fn update_all(&self, items: Vec<E>) -> Result<Vec<E>> {
        let ids = required_ids(&items)?;
        self.ensure_exist(&ids).await?;
        self.bulk.bulk_update(self.repository(), items).await
    }

    async fn patch_all(&self, items: Vec<E>) -> Result<Vec<E>> {
        let ids = required_ids(&items)?;
        let current: HashMap<E::Id, E> = self
            .engine
            .find_by_ids(&ids)
            .await?
            .into_iter()
            .filter_map(|entity| entity.id().cloned().map(|id| (id, entity)))
            .collect();

        let mut patched = Vec::with_capacity(items.len());
        for item in &items {
            let Some(id) = item.id() else {
                continue;
            };
            let base = current
                .get(id)
                .cloned()
                .ok_or_else(|| Error::not_found(E::name(), id))?;
            patched.push(overlay(base, item, id)?);
        }
        self.bulk.bulk_update(self.repository(), patched).await
    }

    async fn delete_matching(&self, spec: &Specification) -> Result<u64> {
        let deleted = self.repository().delete_matching(spec).await?;
        tracing::info!(entity = E::name(), deleted, "entities deleted by criteria");
        Ok(deleted)
    }

    /// Fail with `NotFound` for the first id with no stored entity
    async fn ensure_exist(&self, ids: &[E::Id]) -> Result<()> {
        let unique: BTreeSet<&E::Id> = ids.iter().collect();
        let spec = Specification::by_ids::<E>(ids);
        let found: BTreeSet<E::Id> = self
            .repository()
            .find_ids(&spec, &Sort::unsorted(), 0, unique.len() as u64)
            .await?
            .into_iter()
            .collect();
        match unique.into_iter().find(|id| !found.contains(*id)) {
            Some(missing) => Err(Error::not_found(E::name(), missing)),
            None => Ok(()),
        }
    }

    /// Write one entity in its own session
    async fn persist_one(&self, operation: BulkOperation, entity: E) -> Result<E> {
        let mut session = self.repository().begin().await?;
        let written = match operation {
            BulkOperation::Insert => session.insert(entity).await,
            BulkOperation::Update => session.merge(entity).await,
        };
        let flushed = match written {
            Ok(entity) => session.flush().await.map(|_| entity),
            Err(e) => Err(e),
        };
        match flushed {
            Ok(entity) => {
                session.commit().await?;
                Ok(entity)
            }
            Err(e) => {
                if let Err(rollback) = session.rollback().await {
                    tracing::warn!(entity = E::name(), error = %rollback, "rollback failed");
                }
                Err(e.into())
            }
        }
    }
}

/// The data id, checked against the id the caller addressed
fn checked_id<E: Entity>(id: Option<&E::Id>, data: &E) -> Result<E::Id> {
    let data_id = data
        .id()
        .ok_or_else(|| Error::bad_request(format!("{} id must be present", E::name())))?;
    match id {
        Some(id) if id != data_id => Err(Error::bad_request(format!(
            "Id {} does not match {} id {}",
            id,
            E::name(),
            data_id
        ))),
        _ => Ok(data_id.clone()),
    }
}

/// Reject a new entity whose related records already carry an id
fn reject_related_ids<E: Entity>(data: &E) -> Result<()> {
    for relation in E::schema().relations {
        let related: Vec<&dyn Record> = match data.related(relation.name) {
            Related::One(one) => one.into_iter().collect(),
            Related::Many(many) => many,
            Related::Unknown => Vec::new(),
        };
        let identified = related
            .iter()
            .any(|record| record.value("id").is_some_and(|id| !id.is_null()));
        if identified {
            return Err(Error::bad_request(
                "Can't save an entity when the relationship already has an ID",
            ));
        }
    }
    Ok(())
}

fn required_ids<E: Entity>(items: &[E]) -> Result<Vec<E::Id>> {
    if !all_identified(items) {
        return Err(Error::bad_request(format!(
            "Every {} must have an id",
            E::name()
        )));
    }
    Ok(items.iter().filter_map(|item| item.id().cloned()).collect())
}

/// Overlay every set field of `patch` on `current`
///
/// Null fields are unset. An empty list on a relationship is treated as
/// unset as well, so a patch without relationships keeps the current ones.
fn overlay<E: Entity>(current: E, patch: &E, id: &E::Id) -> Result<E> {
    let cannot = |detail: String| {
        Error::bad_request(format!("Cannot partial update {} with id {}: {}", E::name(), id, detail))
    };

    let mut base = serde_json::to_value(&current).map_err(|e| cannot(e.to_string()))?;
    let changes = serde_json::to_value(patch).map_err(|e| cannot(e.to_string()))?;
    let (Value::Object(base_fields), Value::Object(changed_fields)) = (&mut base, changes) else {
        return Err(cannot("not a structured value".to_string()));
    };

    let relations = E::schema().relation_names();
    for (name, value) in changed_fields {
        let empty_relation = relations.contains(&name.as_str())
            && value.as_array().is_some_and(|items| items.is_empty());
        if value.is_null() || empty_relation {
            continue;
        }
        base_fields.insert(name, value);
    }

    serde_json::from_value(base).map_err(|e| cannot(e.to_string()))
}

impl<R, E, F> Service<Operation<E, F>> for CrudService<R, E, F>
where
    R: CrudRepository<E> + BulkRepository<E> + 'static,
    E: Entity,
    F: Criteria + 'static,
{
    type Response = Payload<E>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Payload<E>>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, operation: Operation<E, F>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { service.execute(operation).await })
    }
}

