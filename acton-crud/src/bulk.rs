//! Bulk persistence engine
//!
//! Writes a list of entities inside a single write session, flushing every
//! `batch_size` items and once more at the end. With
//! `clear_context_after_flush` the session is also cleared after each flush,
//! which keeps the number of tracked entities bounded by the batch size.
//!
//! Any failure rolls the whole session back: a bulk call commits all of its
//! items or none of them.
//!
//! # Example
//!
//! ```rust,ignore
//! use acton_crud::bulk::BulkEngine;
//! use acton_crud::config::BulkConfig;
//!
//! let engine = BulkEngine::from_config(&BulkConfig::default());
//! let saved = engine.bulk_insert(&store, companies).await?;
//! assert!(saved.iter().all(|c| c.id.is_some()));
//! ```

use std::time::Instant;

use crate::config::BulkConfig;
use crate::entity::Entity;
use crate::error::{BulkOperation, Error, Result};
use crate::repository::{BulkRepository, RepositoryError, UnitOfWork};

/// Batched, transactional writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkEngine {
    batch_size: usize,
    clear_after_flush: bool,
}

impl Default for BulkEngine {
    fn default() -> Self {
        Self::from_config(&BulkConfig::default())
    }
}

impl BulkEngine {
    /// Engine flushing every `batch_size` items; zero is treated as one
    #[must_use]
    pub const fn new(batch_size: usize) -> Self {
        Self {
            batch_size: if batch_size == 0 { 1 } else { batch_size },
            clear_after_flush: false,
        }
    }

    /// Engine configured from the `bulk` configuration section
    #[must_use]
    pub fn from_config(config: &BulkConfig) -> Self {
        Self::new(config.batch_size).with_clear_after_flush(config.clear_context_after_flush)
    }

    /// Clear the session after every flush
    #[must_use]
    pub const fn with_clear_after_flush(mut self, clear: bool) -> Self {
        self.clear_after_flush = clear;
        self
    }

    /// Items written between flushes
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Insert every item, in order
    ///
    /// Returns the persisted items, in input order, with generated ids.
    pub async fn bulk_insert<E, R>(&self, repository: &R, items: Vec<E>) -> Result<Vec<E>>
    where
        E: Entity,
        R: BulkRepository<E>,
    {
        self.run(BulkOperation::Insert, repository, items).await
    }

    /// Merge every item, in order
    pub async fn bulk_update<E, R>(&self, repository: &R, items: Vec<E>) -> Result<Vec<E>>
    where
        E: Entity,
        R: BulkRepository<E>,
    {
        self.run(BulkOperation::Update, repository, items).await
    }

    async fn run<E, R>(&self, operation: BulkOperation, repository: &R, items: Vec<E>) -> Result<Vec<E>>
    where
        E: Entity,
        R: BulkRepository<E>,
    {
        let start = Instant::now();
        let total = items.len();
        let mut session = repository
            .begin()
            .await
            .map_err(|source| abort_error(operation, 0, source))?;
        let mut batch = BatchContext::new(self.batch_size);
        let mut persisted = Vec::with_capacity(total);

        for (index, item) in items.into_iter().enumerate() {
            let written = match operation {
                BulkOperation::Insert => session.insert(item).await,
                BulkOperation::Update => session.merge(item).await,
            };
            let entity = match written {
                Ok(entity) => entity,
                Err(source) => return Err(abort::<E, _>(session, operation, index, source).await),
            };
            persisted.push(entity);

            if batch.advance() {
                if let Err(source) = self.flush::<E, _>(&mut session, &mut batch).await {
                    return Err(abort::<E, _>(session, operation, index, source).await);
                }
            }
        }

        if let Err(source) = self.flush::<E, _>(&mut session, &mut batch).await {
            return Err(abort::<E, _>(session, operation, total, source).await);
        }
        if let Err(source) = session.commit().await {
            return Err(abort_error(operation, total, source));
        }

        tracing::info!(
            entity = E::name(),
            operation = %operation,
            items = total,
            batch_size = self.batch_size,
            flushes = batch.flushes,
            duration_ms = start.elapsed().as_millis() as u64,
            "bulk write committed"
        );
        Ok(persisted)
    }

    async fn flush<E, S>(&self, session: &mut S, batch: &mut BatchContext) -> std::result::Result<(), RepositoryError>
    where
        E: Entity,
        S: UnitOfWork<E>,
    {
        session.flush().await?;
        batch.flushes += 1;
        if self.clear_after_flush {
            session.clear().await?;
        }
        tracing::debug!(
            processed = batch.processed,
            flushes = batch.flushes,
            cleared = self.clear_after_flush,
            "bulk batch flushed"
        );
        Ok(())
    }
}

/// Progress of one bulk call
#[derive(Debug)]
struct BatchContext {
    batch_size: usize,
    processed: usize,
    flushes: usize,
}

impl BatchContext {
    fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            processed: 0,
            flushes: 0,
        }
    }

    /// Count one item; true on a batch boundary
    fn advance(&mut self) -> bool {
        self.processed += 1;
        self.processed % self.batch_size == 0
    }
}

async fn abort<E, S>(session: S, operation: BulkOperation, index: usize, source: RepositoryError) -> Error
where
    E: Entity,
    S: UnitOfWork<E>,
{
    if let Err(rollback) = session.rollback().await {
        tracing::warn!(
            entity = E::name(),
            operation = %operation,
            error = %rollback,
            "rollback after failed bulk write also failed"
        );
    }
    abort_error(operation, index, source)
}

fn abort_error(operation: BulkOperation, index: usize, source: RepositoryError) -> Error {
    tracing::error!(operation = %operation, index, error = %source, "bulk write aborted");
    Error::BulkPersistence {
        operation,
        index,
        source,
    }
}
