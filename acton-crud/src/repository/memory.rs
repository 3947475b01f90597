//! In-memory repository backend
//!
//! A complete backend over a `BTreeMap`, evaluating predicates with
//! [`Predicate::evaluate`](crate::filter::Predicate::evaluate). It supports
//! eager relationship fetching and write sessions, and counts every backend
//! round trip in [`StoreStats`] so tests can observe how the engines drive
//! it.
//!
//! # Example
//!
//! ```rust,ignore
//! use acton_crud::repository::InMemoryStore;
//!
//! let store = InMemoryStore::<Company>::new();
//! store.seed(vec![acme, globex]).await?;
//! assert_eq!(store.len().await, 2);
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashSet;
use tokio::sync::RwLock;

use super::error::{RepositoryError, RepositoryOperation};
use super::pagination::{OrderDirection, Page, PageRequest, Sort};
use super::traits::{BulkRepository, CrudRepository, FetchRelationship, RepositoryResult, UnitOfWork};
use crate::entity::{Entity, GeneratedId};
use crate::filter::{FilterValue, Specification};

/// Snapshot of backend round trips
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// `find_by_id` calls
    pub find_by_id_queries: u64,
    /// Phase-one id queries
    pub id_queries: u64,
    /// Count queries
    pub count_queries: u64,
    /// Eager fetch queries
    pub fetch_queries: u64,
    /// Single-phase page queries
    pub page_queries: u64,
    /// Session flushes
    pub flushes: u64,
    /// Session clears
    pub clears: u64,
    /// Session commits
    pub commits: u64,
    /// Session rollbacks
    pub rollbacks: u64,
    /// Largest number of entities tracked by one session at once
    pub peak_tracked: u64,
}

#[derive(Default)]
struct Counters {
    find_by_id_queries: AtomicU64,
    id_queries: AtomicU64,
    count_queries: AtomicU64,
    fetch_queries: AtomicU64,
    page_queries: AtomicU64,
    flushes: AtomicU64,
    clears: AtomicU64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
    peak_tracked: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, AtomicOrdering::Relaxed);
    }

    fn snapshot(&self) -> StoreStats {
        let load = |c: &AtomicU64| c.load(AtomicOrdering::Relaxed);
        StoreStats {
            find_by_id_queries: load(&self.find_by_id_queries),
            id_queries: load(&self.id_queries),
            count_queries: load(&self.count_queries),
            fetch_queries: load(&self.fetch_queries),
            page_queries: load(&self.page_queries),
            flushes: load(&self.flushes),
            clears: load(&self.clears),
            commits: load(&self.commits),
            rollbacks: load(&self.rollbacks),
            peak_tracked: load(&self.peak_tracked),
        }
    }
}

struct Shared<E: Entity> {
    rows: RwLock<BTreeMap<E::Id, E>>,
    sequence: AtomicU64,
    counters: Counters,
    eager_fetch: bool,
    omitted: DashSet<E::Id>,
    fail_after: AtomicUsize,
}

/// In-memory backend for one entity type
///
/// Cloning the store shares its data.
pub struct InMemoryStore<E: Entity> {
    shared: Arc<Shared<E>>,
}

impl<E: Entity> Clone for InMemoryStore<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E: Entity> Default for InMemoryStore<E>
where
    E::Id: GeneratedId,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> InMemoryStore<E>
where
    E::Id: GeneratedId,
{
    /// Empty store with eager fetching enabled
    pub fn new() -> Self {
        Self::build(true)
    }

    /// Empty store without eager fetching; reads are single-phase
    pub fn without_eager_fetch() -> Self {
        Self::build(false)
    }

    fn build(eager_fetch: bool) -> Self {
        Self {
            shared: Arc::new(Shared {
                rows: RwLock::new(BTreeMap::new()),
                sequence: AtomicU64::new(0),
                counters: Counters::default(),
                eager_fetch,
                omitted: DashSet::new(),
                fail_after: AtomicUsize::new(usize::MAX),
            }),
        }
    }

    /// Insert entities directly, assigning ids to those without one
    ///
    /// Explicit numeric ids advance the sequence, so later generated ids
    /// never land on a seeded row.
    pub async fn seed(&self, entities: Vec<E>) -> RepositoryResult<Vec<E>> {
        let mut rows = self.shared.rows.write().await;
        let mut saved = Vec::with_capacity(entities.len());
        for entity in entities {
            let entity = match entity.id() {
                Some(id) => {
                    if let Some(taken) = id.sequence() {
                        self.shared.sequence.fetch_max(taken, AtomicOrdering::SeqCst);
                    }
                    entity
                }
                None => {
                    let id = self.shared.next_free_id(&rows, |_| false);
                    entity.with_id(id)
                }
            };
            if let Some(id) = entity.id() {
                rows.insert(id.clone(), entity.clone());
            }
            saved.push(entity);
        }
        Ok(saved)
    }
}

impl<E: Entity> InMemoryStore<E> {
    /// Skip an id in eager fetches, as if it was deleted between the two
    /// read phases
    pub fn omit_on_fetch(&self, id: E::Id) {
        self.shared.omitted.insert(id);
    }

    /// Fail every session write once `writes` writes have succeeded
    pub fn fail_writes_after(&self, writes: usize) {
        self.shared.fail_after.store(writes, AtomicOrdering::SeqCst);
    }

    /// Round trips so far
    pub fn stats(&self) -> StoreStats {
        self.shared.counters.snapshot()
    }

    /// Number of stored entities
    pub async fn len(&self) -> usize {
        self.shared.rows.read().await.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.shared.rows.read().await.is_empty()
    }

    /// Every stored entity in id order
    pub async fn all(&self) -> Vec<E> {
        self.shared.rows.read().await.values().cloned().collect()
    }

    /// Matching entities, sorted, with id as the final tie breaker
    async fn select(&self, spec: &Specification, sort: &Sort) -> Vec<E> {
        let rows = self.shared.rows.read().await;
        let mut matched: Vec<E> = rows.values().filter(|e| spec.matches(*e)).cloned().collect();
        matched.sort_by(|a, b| compare_entities(a, b, sort));
        matched
    }
}

impl<E: Entity> Shared<E>
where
    E::Id: GeneratedId,
{
    fn next_id(&self) -> E::Id {
        <E::Id as GeneratedId>::generate(self.sequence.fetch_add(1, AtomicOrdering::SeqCst) + 1)
    }

    /// Next generated id that is neither stored nor claimed elsewhere
    fn next_free_id(&self, rows: &BTreeMap<E::Id, E>, claimed: impl Fn(&E::Id) -> bool) -> E::Id {
        loop {
            let id = self.next_id();
            if !rows.contains_key(&id) && !claimed(&id) {
                return id;
            }
        }
    }
}

fn compare_entities<E: Entity>(a: &E, b: &E, sort: &Sort) -> Ordering {
    for order in sort.iter() {
        let left = a.value(&order.property).unwrap_or(FilterValue::Null);
        let right = b.value(&order.property).unwrap_or(FilterValue::Null);
        let ordering = match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => left.compare(&right).unwrap_or(Ordering::Equal),
        };
        let ordering = match order.direction {
            OrderDirection::Ascending => ordering,
            OrderDirection::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.id().cmp(&b.id())
}

fn window<T>(items: Vec<T>, offset: u64, limit: u64) -> Vec<T> {
    let offset = usize::try_from(offset).unwrap_or(usize::MAX);
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    items.into_iter().skip(offset).take(limit).collect()
}

impl<E: Entity> CrudRepository<E> for InMemoryStore<E> {
    async fn find_by_id(&self, id: &E::Id) -> RepositoryResult<Option<E>> {
        Counters::bump(&self.shared.counters.find_by_id_queries);
        Ok(self.shared.rows.read().await.get(id).cloned())
    }

    async fn find_page(&self, spec: &Specification, page: &PageRequest) -> RepositoryResult<Page<E>> {
        Counters::bump(&self.shared.counters.page_queries);
        let matched = self.select(spec, &page.sort).await;
        let total = matched.len() as u64;
        Ok(Page::new(window(matched, page.offset(), page.size), page, total))
    }

    async fn find_ids(
        &self,
        spec: &Specification,
        sort: &Sort,
        offset: u64,
        limit: u64,
    ) -> RepositoryResult<Vec<E::Id>> {
        Counters::bump(&self.shared.counters.id_queries);
        let ids = self
            .select(spec, sort)
            .await
            .into_iter()
            .filter_map(|e| e.id().cloned())
            .collect();
        Ok(window(ids, offset, limit))
    }

    async fn count(&self, spec: &Specification) -> RepositoryResult<u64> {
        Counters::bump(&self.shared.counters.count_queries);
        let rows = self.shared.rows.read().await;
        Ok(rows.values().filter(|e| spec.matches(*e)).count() as u64)
    }

    async fn exists(&self, id: &E::Id) -> RepositoryResult<bool> {
        Ok(self.shared.rows.read().await.contains_key(id))
    }

    async fn delete_by_id(&self, id: &E::Id) -> RepositoryResult<bool> {
        Ok(self.shared.rows.write().await.remove(id).is_some())
    }

    async fn delete_matching(&self, spec: &Specification) -> RepositoryResult<u64> {
        let mut rows = self.shared.rows.write().await;
        let before = rows.len();
        rows.retain(|_, e| !spec.matches(&*e));
        Ok((before - rows.len()) as u64)
    }

    fn relationship_fetch(&self) -> Option<&dyn FetchRelationship<E>> {
        if self.shared.eager_fetch {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl<E: Entity> FetchRelationship<E> for InMemoryStore<E> {
    async fn fetch_by_ids(
        &self,
        ids: &[E::Id],
        _relations: &[&'static str],
    ) -> RepositoryResult<Vec<E>> {
        Counters::bump(&self.shared.counters.fetch_queries);
        let rows = self.shared.rows.read().await;
        // Relationships live inside the aggregate, so they are always loaded.
        // Results come back in id order, not request order.
        let mut found: Vec<E> = ids
            .iter()
            .filter(|id| !self.shared.omitted.contains(*id))
            .filter_map(|id| rows.get(id).cloned())
            .collect();
        found.sort_by(|a, b| a.id().cmp(&b.id()));
        Ok(found)
    }
}

impl<E: Entity> BulkRepository<E> for InMemoryStore<E>
where
    E::Id: GeneratedId,
{
    type Session = MemorySession<E>;

    async fn begin(&self) -> RepositoryResult<MemorySession<E>> {
        Ok(MemorySession {
            shared: Arc::clone(&self.shared),
            pending: Vec::new(),
            flushed: Vec::new(),
            tracked: 0,
            writes: 0,
        })
    }
}

/// Write session over an [`InMemoryStore`]
///
/// Writes become visible to readers only on commit.
pub struct MemorySession<E: Entity> {
    shared: Arc<Shared<E>>,
    pending: Vec<E>,
    flushed: Vec<E>,
    tracked: u64,
    writes: usize,
}

impl<E: Entity> MemorySession<E> {
    fn check_failure(&self, operation: RepositoryOperation) -> RepositoryResult<()> {
        if self.writes >= self.shared.fail_after.load(AtomicOrdering::SeqCst) {
            return Err(RepositoryError::constraint_violation(
                operation,
                "injected write failure",
            ));
        }
        Ok(())
    }

    fn staged(&self, id: &E::Id) -> bool {
        self.pending
            .iter()
            .chain(self.flushed.iter())
            .any(|e| e.id() == Some(id))
    }

    fn track(&mut self, entity: E) {
        self.pending.push(entity);
        self.tracked += 1;
        self.writes += 1;
        self.shared
            .counters
            .peak_tracked
            .fetch_max(self.tracked, AtomicOrdering::Relaxed);
    }
}

impl<E: Entity> UnitOfWork<E> for MemorySession<E>
where
    E::Id: GeneratedId,
{
    async fn insert(&mut self, entity: E) -> RepositoryResult<E> {
        self.check_failure(RepositoryOperation::Insert)?;
        let entity = match entity.id() {
            Some(id) => {
                if self.staged(id) || self.shared.rows.read().await.contains_key(id) {
                    return Err(RepositoryError::already_exists(E::name(), id.to_string()));
                }
                entity
            }
            None => {
                let rows = self.shared.rows.read().await;
                let id = self.shared.next_free_id(&rows, |id| self.staged(id));
                drop(rows);
                entity.with_id(id)
            }
        };
        self.track(entity.clone());
        Ok(entity)
    }

    async fn merge(&mut self, entity: E) -> RepositoryResult<E> {
        self.check_failure(RepositoryOperation::Merge)?;
        let Some(id) = entity.id() else {
            return Err(RepositoryError::validation_failed(
                RepositoryOperation::Merge,
                "cannot merge an entity without an id",
            ));
        };
        if !self.staged(id) && !self.shared.rows.read().await.contains_key(id) {
            return Err(RepositoryError::not_found(E::name(), id.to_string())
                .with_operation(RepositoryOperation::Merge));
        }
        self.track(entity.clone());
        Ok(entity)
    }

    async fn flush(&mut self) -> RepositoryResult<()> {
        Counters::bump(&self.shared.counters.flushes);
        self.flushed.append(&mut self.pending);
        Ok(())
    }

    async fn clear(&mut self) -> RepositoryResult<()> {
        Counters::bump(&self.shared.counters.clears);
        self.pending.clear();
        self.tracked = 0;
        Ok(())
    }

    async fn commit(mut self) -> RepositoryResult<()> {
        self.flushed.append(&mut self.pending);
        let mut rows = self.shared.rows.write().await;
        for entity in self.flushed.drain(..) {
            if let Some(id) = entity.id() {
                rows.insert(id.clone(), entity);
            }
        }
        Counters::bump(&self.shared.counters.commits);
        Ok(())
    }

    async fn rollback(self) -> RepositoryResult<()> {
        Counters::bump(&self.shared.counters.rollbacks);
        Ok(())
    }
}
