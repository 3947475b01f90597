//! End-to-end operations through the standard middleware stack

mod common;

use std::sync::Arc;
use std::task::{Context, Poll};

use acton_crud::cache::{CacheStore, MemoryCacheStore};
use acton_crud::config::Config;
use acton_crud::filter::Criteria;
use acton_crud::hypermedia::PathLinkAssembler;
use acton_crud::mapping::Mapper;
use acton_crud::pipeline::{
    crud_stack, CachingLayer, HypermediaLayer, LoggingLayer, MappingLayer, RelationshipLayer,
    Representation,
};
use acton_crud::query::QueryEngine;
use acton_crud::repository::{InMemoryStore, PageRequest};
use acton_crud::service::{Operation, Payload};
use acton_crud::Error;
use tower::{service_fn, Service, ServiceBuilder, ServiceExt};

use common::*;

type CompanyOp = Operation<CompanyDto, CompanyFilter>;

struct Harness<S> {
    store: Arc<InMemoryStore<Company>>,
    cache: MemoryCacheStore,
    service: S,
}

impl<S> Harness<S>
where
    S: Service<CompanyOp, Response = Representation<CompanyDto>, Error = Error> + Clone,
{
    async fn call(&self, operation: CompanyOp) -> Result<Representation<CompanyDto>, Error> {
        self.service.clone().oneshot(operation).await
    }
}

async fn harness_with(
    store: InMemoryStore<Company>,
    config: Config,
) -> Harness<impl Service<CompanyOp, Response = Representation<CompanyDto>, Error = Error> + Clone> {
    let store = Arc::new(store);
    store.seed(sample_companies()).await.unwrap();
    let cache = MemoryCacheStore::new();
    let shared: Arc<dyn CacheStore> = Arc::new(cache.clone());
    let service = crud_stack::<_, _, CompanyFilter, _>(
        Arc::clone(&store),
        CompanyMapper,
        shared,
        PathLinkAssembler::new("/companies/"),
        &config,
    );
    Harness {
        store,
        cache,
        service,
    }
}

async fn harness() -> Harness<impl Service<CompanyOp, Response = Representation<CompanyDto>, Error = Error> + Clone> {
    harness_with(InMemoryStore::new(), Config::default()).await
}

fn new_company(name: &str) -> CompanyDto {
    CompanyDto {
        name: Some(name.to_string()),
        founded: Some(2024),
        departments: vec![DepartmentDto {
            name: "Ops".to_string(),
            manager_name: Some("Lee".to_string()),
            budget: 10.0,
            ..Default::default()
        }],
        ..Default::default()
    }
}

#[tokio::test]
async fn test_save_returns_linked_item_and_caches_it() {
    let h = harness().await;

    let saved = h
        .call(Operation::Save(new_company("Initech")))
        .await
        .unwrap()
        .into_item()
        .unwrap();

    assert_eq!(saved.content.id, Some(4));
    assert_eq!(saved.link("self").unwrap().href, "/companies/4");
    assert!(h.cache.contains("company", "4"));
    assert_eq!(h.store.len().await, 4);
}

#[tokio::test]
async fn test_find_by_id_is_served_from_cache() {
    let h = harness().await;

    let first = h.call(Operation::FindById(1)).await.unwrap().into_item().unwrap();
    let after_first = h.store.stats();
    let second = h.call(Operation::FindById(1)).await.unwrap().into_item().unwrap();

    assert_eq!(first, second);
    assert_eq!(after_first.fetch_queries, 1);
    assert_eq!(h.store.stats(), after_first);
    assert_eq!(second.content.departments.len(), 2);
}

#[tokio::test]
async fn test_missing_entity_error_passes_through() {
    let h = harness().await;

    let err = h.call(Operation::FindById(99)).await.unwrap_err();

    assert!(matches!(err, Error::NotFound { ref entity, ref id } if entity == "company" && id == "99"));
    assert!(!h.cache.contains("company", "99"));
}

#[tokio::test]
async fn test_criteria_page_is_linked_and_cached() {
    let h = harness().await;
    let filter = CompanyFilter {
        departments: Some(managed_by("Lee")),
        ..Default::default()
    };
    let request = PageRequest::first(1);
    let key = format!("{}|{}", filter.to_filter(), request);

    let page = h
        .call(Operation::FindAllByCriteria(Some(filter.clone()), request.clone()))
        .await
        .unwrap()
        .into_page()
        .unwrap();

    assert_eq!(page.page.total_elements, 2);
    assert_eq!(page.page.total_pages, 2);
    assert_eq!(page.content.len(), 1);
    assert_eq!(page.content[0].link("self").unwrap().href, "/companies/1");
    assert_eq!(page.link("next").unwrap().href, "/companies?page=1&size=1");
    assert_eq!(page.link("last").unwrap().href, "/companies?page=1&size=1");
    assert!(page.link("prev").is_none());
    assert!(h.cache.contains("companyAll", &key));

    let stats = h.store.stats();
    h.call(Operation::FindAllByCriteria(Some(filter), request))
        .await
        .unwrap();
    assert_eq!(h.store.stats(), stats);
}

#[tokio::test]
async fn test_update_refreshes_item_and_clears_pages() {
    let h = harness().await;
    h.call(Operation::FindAll(PageRequest::first(5))).await.unwrap();
    h.call(Operation::FindById(2)).await.unwrap();
    assert!(h.cache.contains("companyAll", "page=0&size=5"));

    let mut changed = h
        .call(Operation::FindById(2))
        .await
        .unwrap()
        .into_item()
        .unwrap()
        .content;
    changed.name = Some("Acme Research".to_string());
    h.call(Operation::UpdateById(Some(2), changed)).await.unwrap();

    assert!(!h.cache.contains("companyAll", "page=0&size=5"));
    let cached = h.call(Operation::FindById(2)).await.unwrap().into_item().unwrap();
    assert_eq!(cached.content.name.as_deref(), Some("Acme Research"));
}

#[tokio::test]
async fn test_update_checks_ids() {
    let h = harness().await;
    let mut dto = new_company("Acme");
    dto.id = Some(1);

    let err = h.call(Operation::UpdateById(Some(2), dto.clone())).await.unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));

    dto.id = Some(77);
    let err = h.call(Operation::UpdateById(Some(77), dto.clone())).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));

    dto.id = None;
    let err = h.call(Operation::UpdateById(None, dto)).await.unwrap_err();
    assert!(matches!(err, Error::BadRequest(ref message) if message == "company id must be present"));
}

#[tokio::test]
async fn test_patch_keeps_unset_fields_and_relationships() {
    let h = harness().await;
    let patch = CompanyDto {
        id: Some(1),
        name: Some("Acme Inc".to_string()),
        ..Default::default()
    };

    let patched = h
        .call(Operation::PatchById(Some(1), patch))
        .await
        .unwrap()
        .into_item()
        .unwrap()
        .content;

    assert_eq!(patched.name.as_deref(), Some("Acme Inc"));
    assert_eq!(patched.founded, Some(2000));
    assert_eq!(patched.departments.len(), 2);
    assert_eq!(patched.departments[0].manager_name.as_deref(), Some("Lee"));

    let stored = h.store.all().await;
    assert_eq!(stored[0].name.as_deref(), Some("Acme Inc"));
    assert_eq!(stored[0].departments.len(), 2);
}

#[tokio::test]
async fn test_patch_all_with_unknown_id_fails() {
    let h = harness().await;
    let items = vec![
        CompanyDto {
            id: Some(1),
            founded: Some(1999),
            ..Default::default()
        },
        CompanyDto {
            id: Some(50),
            founded: Some(1999),
            ..Default::default()
        },
    ];

    let err = h.call(Operation::PatchAll(items)).await.unwrap_err();

    assert!(matches!(err, Error::NotFound { ref id, .. } if id == "50"));
    assert_eq!(h.store.all().await[0].founded, Some(2000));
}

#[tokio::test]
async fn test_save_all_is_plain_and_evicts_pages() {
    let h = harness().await;
    h.call(Operation::FindAll(PageRequest::first(5))).await.unwrap();

    let result = h
        .call(Operation::SaveAll(vec![new_company("Hooli"), new_company("Umbrella")]))
        .await
        .unwrap();

    let saved = match result {
        Representation::Plain(Payload::Items(items)) => items,
        other => panic!("unexpected result: {:?}", other),
    };
    assert_eq!(saved.len(), 2);
    assert!(h.cache.contains("company", "5"));
    assert!(!h.cache.contains("companyAll", "page=0&size=5"));
    assert_eq!(h.store.len().await, 5);
}

fn with_known_department(name: &str) -> CompanyDto {
    let mut dto = new_company(name);
    dto.departments[0].id = Some(5);
    dto
}

#[tokio::test]
async fn test_save_rejects_identified_relationship() {
    let h = harness().await;

    let err = h
        .call(Operation::Save(with_known_department("Initech")))
        .await
        .unwrap_err();

    match err {
        Error::BadRequest(message) => assert_eq!(
            message,
            "Can't save an entity when the relationship already has an ID"
        ),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(h.store.len().await, 3);
    assert_eq!(h.store.stats().commits, 0);
}

#[tokio::test]
async fn test_save_all_rejects_identified_relationship() {
    let h = harness().await;

    let err = h
        .call(Operation::SaveAll(vec![
            new_company("Hooli"),
            with_known_department("Umbrella"),
        ]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::BadRequest(_)));
    assert_eq!(h.store.len().await, 3);
    assert_eq!(h.store.stats().commits, 0);
}

#[test]
fn test_mapper_round_trips() {
    let mut dto = new_company("Initech");
    dto.id = Some(9);
    dto.tags = vec!["private".to_string()];

    let entity = CompanyMapper.to_entity(dto.clone()).unwrap();

    assert_eq!(CompanyMapper.to_dto(entity), dto);
}

#[tokio::test]
async fn test_mapping_rejects_invalid_dto() {
    let h = harness().await;
    let mut dto = new_company("Broken");
    dto.departments[0].budget = -1.0;

    let err = h.call(Operation::Save(dto)).await.unwrap_err();

    assert!(err.is_client_error());
    assert_eq!(h.store.len().await, 3);
}

#[tokio::test]
async fn test_delete_by_id_evicts_entry() {
    let h = harness().await;
    h.call(Operation::FindById(3)).await.unwrap();
    assert!(h.cache.contains("company", "3"));

    let result = h.call(Operation::DeleteById(3)).await.unwrap();

    assert!(matches!(result, Representation::Plain(Payload::Empty)));
    assert!(!h.cache.contains("company", "3"));
    let err = h.call(Operation::FindById(3)).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    let err = h.call(Operation::DeleteById(3)).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn test_delete_by_criteria_then_all() {
    let h = harness().await;
    let acme = CompanyFilter {
        name: Some(name_contains("Acme")),
        ..Default::default()
    };

    h.call(Operation::DeleteAllByCriteria(Some(acme))).await.unwrap();
    let left = h.store.all().await;
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].name.as_deref(), Some("Globex"));

    h.call(Operation::FindById(3)).await.unwrap();
    h.call(Operation::DeleteAll).await.unwrap();
    assert!(h.store.is_empty().await);
    assert!(!h.cache.contains("company", "3"));
}

#[tokio::test]
async fn test_representation_serializes_with_links() {
    let h = harness().await;

    let item = h.call(Operation::FindById(1)).await.unwrap();
    let json = serde_json::to_value(&item).unwrap();

    assert_eq!(json["name"], "Acme Corp");
    assert_eq!(json["departments"][0]["managerName"], "Lee");
    assert_eq!(json["_links"][0]["rel"], "self");
    assert_eq!(json["_links"][0]["href"], "/companies/1");

    let page = h.call(Operation::FindAll(PageRequest::of(1, 2))).await.unwrap();
    let json = serde_json::to_value(&page).unwrap();
    assert_eq!(json["page"]["totalElements"], 3);
    assert_eq!(json["page"]["number"], 1);
    assert_eq!(json["content"][0]["name"], "Globex");
}

#[tokio::test]
async fn test_backend_without_eager_fetch_falls_back() {
    let h = harness_with(InMemoryStore::without_eager_fetch(), Config::default()).await;
    let filter = CompanyFilter {
        departments: Some(managed_by("Lee")),
        ..Default::default()
    };

    let page = h
        .call(Operation::FindAllByCriteria(Some(filter), PageRequest::first(10)))
        .await
        .unwrap()
        .into_page()
        .unwrap();

    assert_eq!(page.content.len(), 2);
    let stats = h.store.stats();
    assert_eq!(stats.page_queries, 1);
    assert_eq!(stats.id_queries, 0);
    assert_eq!(stats.fetch_queries, 0);
}

#[tokio::test]
async fn test_disabled_cache_always_reads_backend() {
    let mut config = Config::default();
    config.cache.enabled = false;
    let h = harness_with(InMemoryStore::new(), config).await;

    h.call(Operation::FindById(1)).await.unwrap();
    h.call(Operation::FindById(1)).await.unwrap();

    assert_eq!(h.store.stats().fetch_queries, 2);
    assert!(h.cache.is_empty());
}

#[tokio::test]
async fn test_shape_mismatch_is_returned_without_links() {
    let inner = service_fn(|_op: CompanyOp| async { Ok::<_, Error>(Payload::<CompanyDto>::Empty) });
    let mut service = ServiceBuilder::new()
        .layer(LoggingLayer::new("companies"))
        .layer(HypermediaLayer::new(PathLinkAssembler::new("/companies")))
        .service(inner);

    let result = service.ready().await.unwrap().call(Operation::FindById(1)).await.unwrap();

    assert!(matches!(result, Representation::Plain(Payload::Empty)));
}

/// Answers only on the instance that reported ready; clones start unready
struct ReadyGated {
    ready: bool,
}

impl Clone for ReadyGated {
    fn clone(&self) -> Self {
        Self { ready: false }
    }
}

impl Service<Operation<Company, CompanyFilter>> for ReadyGated {
    type Response = Payload<Company>;
    type Error = Error;
    type Future = std::future::Ready<Result<Payload<Company>, Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Error>> {
        self.ready = true;
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, operation: Operation<Company, CompanyFilter>) -> Self::Future {
        if !std::mem::take(&mut self.ready) {
            return std::future::ready(Err(Error::Internal("called before poll_ready".to_string())));
        }
        let id = match operation {
            Operation::FindById(id) => id,
            _ => 0,
        };
        let mut found = company("Acme Corp", Vec::new());
        found.id = Some(id);
        std::future::ready(Ok(Payload::Item(found)))
    }
}

#[tokio::test]
async fn test_layers_call_the_instance_that_reported_ready() {
    let engine = QueryEngine::<InMemoryStore<Company>, Company>::new(Arc::new(
        InMemoryStore::without_eager_fetch(),
    ));
    let mut service = ServiceBuilder::new()
        .layer(LoggingLayer::new("companies"))
        .layer(HypermediaLayer::new(PathLinkAssembler::new("/companies")))
        .layer(CachingLayer::<CompanyDto, CompanyFilter>::new(
            Arc::new(MemoryCacheStore::new()),
            "company",
        ))
        .layer(MappingLayer::new(CompanyMapper))
        .layer(RelationshipLayer::new(engine))
        .service(ReadyGated { ready: false });

    for id in 1..=2 {
        let linked = service
            .ready()
            .await
            .unwrap()
            .call(Operation::FindById(id))
            .await
            .unwrap()
            .into_item()
            .unwrap();
        assert_eq!(linked.content.id, Some(id));
    }
}
