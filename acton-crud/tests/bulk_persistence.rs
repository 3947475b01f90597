//! Batched writes through the bulk engine and the bulk CRUD operations

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use acton_crud::bulk::BulkEngine;
use acton_crud::config::BulkConfig;
use acton_crud::error::BulkOperation;
use acton_crud::repository::{InMemoryStore, RepositoryErrorKind};
use acton_crud::service::{CrudService, Operation};
use acton_crud::Error;

use common::*;

fn staff(count: usize) -> Vec<Employee> {
    (0..count)
        .map(|i| employee(&format!("Employee {:03}", i), 50.0 + i as f64, None))
        .collect()
}

#[tokio::test]
async fn test_bulk_insert_flushes_per_batch_and_commits_once() {
    let store = InMemoryStore::<Employee>::new();
    let engine = BulkEngine::new(50);

    let saved = engine.bulk_insert(&store, staff(120)).await.unwrap();

    assert_eq!(saved.len(), 120);
    let ids: HashSet<i64> = saved.iter().filter_map(|e| e.id).collect();
    assert_eq!(ids.len(), 120);
    // Results come back in input order.
    assert_eq!(saved[0].name, "Employee 000");
    assert_eq!(saved[119].name, "Employee 119");

    let stats = store.stats();
    assert_eq!(stats.flushes, 3);
    assert_eq!(stats.commits, 1);
    assert_eq!(stats.rollbacks, 0);
    assert_eq!(stats.clears, 0);
    assert_eq!(store.len().await, 120);
}

#[tokio::test]
async fn test_exact_multiple_still_flushes_at_the_end() {
    let store = InMemoryStore::<Employee>::new();

    BulkEngine::new(25).bulk_insert(&store, staff(50)).await.unwrap();

    assert_eq!(store.stats().flushes, 3);
    assert_eq!(store.len().await, 50);
}

#[tokio::test]
async fn test_failure_rolls_back_the_whole_call() {
    let store = InMemoryStore::<Employee>::new();
    store.fail_writes_after(70);

    let err = BulkEngine::new(50).bulk_insert(&store, staff(120)).await.unwrap_err();

    match &err {
        Error::BulkPersistence {
            operation,
            index,
            source,
        } => {
            assert_eq!(*operation, BulkOperation::Insert);
            assert_eq!(*index, 70);
            assert_eq!(source.kind, RepositoryErrorKind::ConstraintViolation);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.error_code(), "BULK_PERSISTENCE_FAILURE");

    // The first batch was flushed but never committed.
    assert!(store.is_empty().await);
    let stats = store.stats();
    assert_eq!(stats.flushes, 1);
    assert_eq!(stats.commits, 0);
    assert_eq!(stats.rollbacks, 1);
}

#[tokio::test]
async fn test_clearing_bounds_tracked_entities() {
    let store = InMemoryStore::<Employee>::new();
    let engine = BulkEngine::from_config(&BulkConfig {
        batch_size: 50,
        clear_context_after_flush: true,
    });

    engine.bulk_insert(&store, staff(120)).await.unwrap();

    let stats = store.stats();
    assert!(stats.peak_tracked <= 50, "tracked {}", stats.peak_tracked);
    assert_eq!(stats.clears, 3);
    assert_eq!(store.len().await, 120);
}

#[tokio::test]
async fn test_without_clearing_the_session_grows() {
    let store = InMemoryStore::<Employee>::new();

    BulkEngine::new(50).bulk_insert(&store, staff(120)).await.unwrap();

    assert_eq!(store.stats().peak_tracked, 120);
}

#[tokio::test]
async fn test_bulk_insert_after_explicit_seed_ids_keeps_every_row() {
    let store = InMemoryStore::<Employee>::new();
    let mut explicit = vec![
        employee("First", 10.0, None),
        employee("Second", 20.0, None),
        employee("Unnumbered", 30.0, None),
    ];
    explicit[0].id = Some(1);
    explicit[1].id = Some(2);
    let seeded = store.seed(explicit).await.unwrap();
    assert_eq!(seeded[2].id, Some(3));

    let saved = BulkEngine::new(2).bulk_insert(&store, staff(3)).await.unwrap();

    let fresh: Vec<i64> = saved.iter().filter_map(|e| e.id).collect();
    assert_eq!(fresh, vec![4, 5, 6]);
    assert_eq!(store.len().await, 6);
    let ids: HashSet<i64> = store.all().await.iter().filter_map(|e| e.id).collect();
    assert_eq!(ids.len(), 6);
    // The seeded rows were not overwritten by the batch.
    let names: Vec<String> = store.all().await.into_iter().map(|e| e.name).collect();
    assert_eq!(
        names,
        vec!["First", "Second", "Unnumbered", "Employee 000", "Employee 001", "Employee 002"]
    );
}

#[tokio::test]
async fn test_bulk_update_of_unknown_entity_aborts() {
    let store = InMemoryStore::<Employee>::new();
    let seeded = store.seed(staff(3)).await.unwrap();

    let mut raised = seeded[0].clone();
    raised.salary = 999.0;
    let mut ghost = seeded[1].clone();
    ghost.id = Some(99);

    let err = BulkEngine::new(10)
        .bulk_update(&store, vec![raised, ghost])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::BulkPersistence {
            operation: BulkOperation::Update,
            index: 1,
            ..
        }
    ));
    let unchanged = store.all().await;
    assert_eq!(unchanged[0].salary, 50.0);
}

#[tokio::test]
async fn test_empty_input_commits_nothing() {
    let store = InMemoryStore::<Employee>::new();

    let saved = BulkEngine::new(10).bulk_insert(&store, Vec::new()).await.unwrap();

    assert!(saved.is_empty());
    assert_eq!(store.stats().commits, 1);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_save_all_rejects_identified_items() {
    let store = Arc::new(InMemoryStore::<Employee>::new());
    let service = CrudService::<_, Employee, EmployeeFilter>::new(Arc::clone(&store));

    let mut items = staff(3);
    items[2].id = Some(7);

    let err = service.execute(Operation::SaveAll(items)).await.unwrap_err();

    assert!(matches!(err, Error::BadRequest(_)));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_update_all_requires_every_id_to_exist() {
    let store = Arc::new(InMemoryStore::<Employee>::new());
    let seeded = store.seed(staff(2)).await.unwrap();
    let service = CrudService::<_, Employee, EmployeeFilter>::new(Arc::clone(&store));

    let mut ghost = seeded[0].clone();
    ghost.id = Some(42);
    let err = service
        .execute(Operation::UpdateAll(vec![seeded[1].clone(), ghost]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { ref id, .. } if id == "42"));

    let mut unsaved = seeded[0].clone();
    unsaved.id = None;
    let err = service
        .execute(Operation::UpdateAll(vec![unsaved]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));
}

#[tokio::test]
async fn test_patch_all_overlays_set_fields() {
    let store = Arc::new(InMemoryStore::<Employee>::new());
    let seeded = store
        .seed(vec![
            employee("Ada", 100.0, Some(department("Ops", Some("Lee"), 10.0))),
            employee("Bo", 90.0, None),
        ])
        .await
        .unwrap();
    let service = CrudService::<_, Employee, EmployeeFilter>::new(Arc::clone(&store));

    let patch = Employee {
        id: seeded[0].id,
        name: "Ada L.".to_string(),
        salary: 130.0,
        active: false,
        department: None,
    };
    let patched = service
        .execute(Operation::PatchAll(vec![patch]))
        .await
        .unwrap()
        .into_items()
        .unwrap();

    assert_eq!(patched[0].name, "Ada L.");
    assert_eq!(patched[0].salary, 130.0);
    assert!(!patched[0].active);
    // A null relationship in the patch keeps the current one.
    assert_eq!(
        patched[0].department.as_ref().map(|d| d.name.as_str()),
        Some("Ops")
    );
    assert_eq!(store.all().await[0].name, "Ada L.");
}
