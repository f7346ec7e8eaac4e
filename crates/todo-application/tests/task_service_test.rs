//! Task service and query cache behaviour against the contract backend.

mod common;

use common::DelayedTransport;
use std::sync::Arc;
use std::time::Duration;
use todo_application::{CacheEvent, QueryCache, TaskService};
use todo_core::auth::Credentials;
use todo_core::config::CacheConfig;
use todo_core::storage::{MemoryStorage, TokenStore};
use todo_core::task::{NewTask, TaskFilter, TaskPatch};
use todo_core::{ErrorKind, QueryKey};
use todo_interaction::testing::ContractBackend;
use todo_interaction::{HttpTransport, Method, RequestClient, TodoApi};
use tokio::time::Instant;

const TASKS: &str = "/api/tasks";

async fn signed_in_service(backend: Arc<ContractBackend>) -> TaskService {
    signed_in_service_over(backend.clone(), backend).await
}

async fn signed_in_service_over(backend: Arc<ContractBackend>, transport: Arc<dyn HttpTransport>) -> TaskService {
    let tokens = TokenStore::new(Arc::new(MemoryStorage::new()));
    let api = TodoApi::new(RequestClient::new("http://backend.test", transport, tokens.clone()));
    let auth = api
        .register(&Credentials::new("user@example.com", "SecurePass123"))
        .await
        .unwrap();
    tokens.set(&auth.token).unwrap();
    backend.clear_requests();
    TaskService::new(api, QueryCache::new(CacheConfig::default()))
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_reads_share_one_request() {
    let backend = Arc::new(ContractBackend::new().with_latency(Duration::from_millis(50)));
    let service = signed_in_service(backend.clone()).await;

    let (first, second) = tokio::join!(
        service.list_tasks(TaskFilter::all()),
        service.list_tasks(TaskFilter::all())
    );
    assert_eq!(first.unwrap(), second.unwrap());
    assert_eq!(backend.request_count(Method::GET, TASKS), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reads_retry_retryable_errors_with_backoff() {
    let backend = Arc::new(ContractBackend::new());
    let service = signed_in_service(backend.clone()).await;
    backend.fail_next(503, "SERVER_ERROR", "Service unavailable");
    backend.fail_next_network();

    let started = Instant::now();
    let tasks = service.list_tasks(TaskFilter::all()).await.unwrap();

    assert!(tasks.is_empty());
    assert_eq!(backend.request_count(Method::GET, TASKS), 3);
    assert_eq!(started.elapsed(), Duration::from_millis(1000 + 2000));
}

#[tokio::test(start_paused = true)]
async fn test_reads_give_up_after_three_retries() {
    let backend = Arc::new(ContractBackend::new());
    let service = signed_in_service(backend.clone()).await;
    for _ in 0..4 {
        backend.fail_next(500, "SERVER_ERROR", "Internal server error");
    }

    let started = Instant::now();
    let err = service.list_tasks(TaskFilter::all()).await.unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::Server));
    assert_eq!(backend.request_count(Method::GET, TASKS), 4);
    assert_eq!(started.elapsed(), Duration::from_millis(7000));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_codes_are_retried() {
    let backend = Arc::new(ContractBackend::new());
    let service = signed_in_service(backend.clone()).await;
    backend.fail_next(418, "TEAPOT", "I'm a teapot");

    assert!(service.list_tasks(TaskFilter::all()).await.is_ok());
    assert_eq!(backend.request_count(Method::GET, TASKS), 2);
}

#[tokio::test]
async fn test_mutations_are_not_retried() {
    let backend = Arc::new(ContractBackend::new());
    let service = signed_in_service(backend.clone()).await;
    backend.fail_next(503, "SERVER_ERROR", "Service unavailable");

    let err = service.create_task(NewTask::new("Buy milk")).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Server));
    assert_eq!(backend.request_count(Method::POST, TASKS), 1);
    assert_eq!(backend.task_count(), 0);
}

#[tokio::test]
async fn test_create_refreshes_lists_and_seeds_detail() {
    let backend = Arc::new(ContractBackend::new());
    let service = signed_in_service(backend.clone()).await;

    assert!(service.list_tasks(TaskFilter::all()).await.unwrap().is_empty());
    let task = service.create_task(NewTask::new("Buy milk")).await.unwrap();

    let listed = service.list_tasks(TaskFilter::all()).await.unwrap();
    assert_eq!(listed, vec![task.clone()]);
    assert_eq!(backend.request_count(Method::GET, TASKS), 2);

    assert_eq!(service.get_task(&task.id).await.unwrap(), task);
    assert_eq!(
        backend.request_count(Method::GET, &format!("{TASKS}/{}", task.id)),
        0
    );
}

#[tokio::test]
async fn test_filters_are_separate_cache_entries() {
    let backend = Arc::new(ContractBackend::new());
    let service = signed_in_service(backend.clone()).await;
    let milk = service.create_task(NewTask::new("Buy milk")).await.unwrap();
    service.create_task(NewTask::new("Walk dog")).await.unwrap();

    let toggled = service.toggle_task(&milk.id).await.unwrap();
    assert!(toggled.is_completed);

    let completed = service.list_tasks(TaskFilter::completed()).await.unwrap();
    let active = service.list_tasks(TaskFilter::active()).await.unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, milk.id);
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].title, "Walk dog");

    let untoggled = service.toggle_task(&milk.id).await.unwrap();
    assert!(!untoggled.is_completed);
    assert!(service.list_tasks(TaskFilter::completed()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_repeated_completion_converges() {
    let backend = Arc::new(ContractBackend::new());
    let service = signed_in_service(backend.clone()).await;
    let task = service.create_task(NewTask::new("Buy milk")).await.unwrap();

    let first = service.update_task(&task.id, TaskPatch::completed(true)).await.unwrap();
    let second = service.update_task(&task.id, TaskPatch::completed(true)).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(service.get_task(&task.id).await.unwrap(), second);
}

#[tokio::test]
async fn test_delete_drops_detail_entry() {
    let backend = Arc::new(ContractBackend::new());
    let service = signed_in_service(backend.clone()).await;
    let task = service.create_task(NewTask::new("Buy milk")).await.unwrap();
    let detail = QueryKey::task_detail(&task.id);
    assert!(service.cache().entry_info(&detail).is_some());

    service.delete_task(&task.id).await.unwrap();
    assert!(service.cache().entry_info(&detail).is_none());

    let err = service.get_task(&task.id).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::NotFound));
    assert!(service.list_tasks(TaskFilter::all()).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_list_read_racing_create_is_not_cached() {
    let backend = Arc::new(ContractBackend::new());
    let transport = Arc::new(DelayedTransport::new(
        backend.clone(),
        Method::GET,
        TASKS,
        Duration::from_millis(100),
    ));
    let service = signed_in_service_over(backend.clone(), transport).await;

    let (racing, created) = tokio::join!(service.list_tasks(TaskFilter::all()), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        service.create_task(NewTask::new("Buy milk")).await
    });
    assert!(racing.unwrap().is_empty());
    let created = created.unwrap();

    let after = service.list_tasks(TaskFilter::all()).await.unwrap();
    assert_eq!(after, vec![created]);
    assert_eq!(backend.request_count(Method::GET, TASKS), 2);
}

#[tokio::test(start_paused = true)]
async fn test_late_result_is_not_cached_after_clear() {
    let backend = Arc::new(ContractBackend::new().with_latency(Duration::from_millis(100)));
    let service = signed_in_service(backend.clone()).await;
    let mut events = service.cache().subscribe();

    let pending = tokio::spawn({
        let service = service.clone();
        async move { service.list_tasks(TaskFilter::all()).await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    service.cache().clear();

    let tasks = pending.await.unwrap().unwrap();
    assert!(tasks.is_empty());
    assert!(service.cache().is_empty());
    assert_eq!(events.try_recv().unwrap(), CacheEvent::Cleared);
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_stale_entries_refetch() {
    let backend = Arc::new(ContractBackend::new());
    let service = signed_in_service(backend.clone()).await;

    service.list_tasks(TaskFilter::all()).await.unwrap();
    tokio::time::advance(Duration::from_secs(60)).await;
    service.list_tasks(TaskFilter::all()).await.unwrap();
    assert_eq!(backend.request_count(Method::GET, TASKS), 1);

    tokio::time::advance(Duration::from_secs(300)).await;
    service.list_tasks(TaskFilter::all()).await.unwrap();
    assert_eq!(backend.request_count(Method::GET, TASKS), 2);

    assert!(service.cache().on_reconnect());
    service.list_tasks(TaskFilter::all()).await.unwrap();
    assert_eq!(backend.request_count(Method::GET, TASKS), 3);
}
