//! End-to-end searches through the orchestrator with scripted adapters

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use rust_decimal::Decimal;

use marketplace_scout::crawling::{OrchestratorBuilder, PlatformRateLimiters, RetryPolicy, ScrapeOrchestrator};
use marketplace_scout::domain::{
    FetchError, FetchErrorKind, HistoryStore, Platform, Product, SearchFilters, SearchRequest, SearchStatus,
    SourceAdapter, ValidationError,
};
use marketplace_scout::infrastructure::{InMemoryHistoryStore, ScriptedAdapter, ScriptedStep};

fn builder() -> OrchestratorBuilder {
    ScrapeOrchestrator::builder()
        .rate_limiters(PlatformRateLimiters::unlimited())
        .retry_policy(RetryPolicy::immediate(3))
        .search_deadline(Duration::from_secs(30))
}

fn product(platform: Platform, price: i64, sold: Option<u64>) -> Product {
    Product::new(
        format!("Cable {price}"),
        Decimal::from(price),
        format!("https://example.test/{price}"),
        platform,
    )
    .with_rating(Some(4.5))
    .with_sold(sold)
}

fn cable_listings(platform: Platform) -> Vec<Product> {
    vec![
        product(platform, 3, Some(100)),
        product(platform, 7, Some(50)),
        product(platform, 12, Some(0)),
        product(platform, 20, None),
        product(platform, 45, Some(30)),
    ]
}

#[tokio::test]
async fn partial_failure_completes_with_analysis() {
    let orchestrator = builder()
        .adapter(Arc::new(ScriptedAdapter::returning(Platform::Shopee, cable_listings(Platform::Shopee))))
        .adapter(Arc::new(ScriptedAdapter::failing(
            Platform::Lazada,
            FetchError::blocked("captcha"),
        )))
        .build();

    let request = SearchRequest::new("usb cable", [Platform::Shopee, Platform::Lazada], 40).with_filters(
        SearchFilters {
            max_price: Some(Decimal::from(20)),
            top_n: Some(2),
            ..SearchFilters::default()
        },
    );
    let id = orchestrator.start(request).await.unwrap();
    let result = orchestrator.wait(id).await.unwrap();

    assert_eq!(result.status, SearchStatus::Completed);
    assert_eq!(result.progress, 100);
    assert_eq!(
        result.results.keys().copied().collect::<Vec<_>>(),
        vec![Platform::Shopee, Platform::Lazada]
    );
    assert!(result.results[&Platform::Lazada].is_empty());
    assert_eq!(result.platform_errors[&Platform::Lazada].kind, FetchErrorKind::Blocked);
    assert!(result.error.as_deref().unwrap().contains("lazada=blocked"));

    let analysis = result.analysis.as_ref().unwrap();
    assert_eq!(analysis.total_products, 5);
    assert_eq!(analysis.price_analysis.as_ref().unwrap().avg, Decimal::new(174, 1));
    let sold: Vec<_> = analysis.best_sellers.iter().map(|p| p.sold).collect();
    assert_eq!(sold, vec![Some(100), Some(50)]);
    assert_eq!(analysis.best_platform, Some(Platform::Shopee));
}

#[tokio::test]
async fn transient_failures_are_retried_until_exhausted() {
    let adapter = Arc::new(ScriptedAdapter::failing(Platform::Mudah, FetchError::timeout("slow")));
    let orchestrator = builder().adapter(adapter.clone()).build();

    let id = orchestrator
        .start(SearchRequest::new("sofa", [Platform::Mudah], 10))
        .await
        .unwrap();
    let result = orchestrator.wait(id).await.unwrap();

    assert_eq!(adapter.calls(), 3);
    assert_eq!(result.status, SearchStatus::Failed);
    assert_eq!(result.platform_errors[&Platform::Mudah].kind, FetchErrorKind::Timeout);
    assert!(result.error.as_deref().unwrap().starts_with("all platforms failed"));
    assert!(result.analysis.is_none());
}

#[tokio::test]
async fn recovered_platform_counts_as_success() {
    let adapter = Arc::new(
        ScriptedAdapter::returning(Platform::Tokopedia, cable_listings(Platform::Tokopedia))
            .then(ScriptedStep::Fail(FetchError::network("reset"))),
    );
    let orchestrator = builder().adapter(adapter.clone()).build();

    let id = orchestrator
        .start(SearchRequest::new("cable", [Platform::Tokopedia], 3))
        .await
        .unwrap();
    let result = orchestrator.wait(id).await.unwrap();

    assert_eq!(adapter.calls(), 2);
    assert_eq!(result.status, SearchStatus::Completed);
    assert_eq!(result.results[&Platform::Tokopedia].len(), 3);
    assert!(result.platform_errors.is_empty());
}

#[tokio::test]
async fn blocked_platform_is_not_retried() {
    let adapter = Arc::new(ScriptedAdapter::failing(Platform::Shopee, FetchError::blocked("403")));
    let orchestrator = builder().adapter(adapter.clone()).build();

    let id = orchestrator
        .start(SearchRequest::new("cable", [Platform::Shopee], 3))
        .await
        .unwrap();
    orchestrator.wait(id).await.unwrap();
    assert_eq!(adapter.calls(), 1);
}

#[tokio::test]
async fn zero_results_everywhere_still_completes() {
    let orchestrator = builder()
        .adapter(Arc::new(ScriptedAdapter::new(Platform::Shopee)))
        .build();
    let id = orchestrator
        .start(SearchRequest::new("nothing", [Platform::Shopee], 5))
        .await
        .unwrap();
    let result = orchestrator.wait(id).await.unwrap();

    assert_eq!(result.status, SearchStatus::Completed);
    let analysis = result.analysis.as_ref().unwrap();
    assert_eq!(analysis.total_products, 0);
    assert!(analysis.price_analysis.is_none());
    assert!(analysis.best_platform.is_none());
}

#[tokio::test(start_paused = true)]
async fn cancel_ends_search_as_failed() {
    let orchestrator = builder()
        .adapter(Arc::new(
            ScriptedAdapter::returning(Platform::Shopee, cable_listings(Platform::Shopee)).with_delay(Duration::from_secs(5)),
        ))
        .adapter(Arc::new(
            ScriptedAdapter::returning(Platform::Lazada, Vec::new()).with_delay(Duration::from_secs(5)),
        ))
        .build();

    let id = orchestrator
        .start(SearchRequest::new("cable", [Platform::Shopee, Platform::Lazada], 10))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(orchestrator.cancel(id));
    assert!(!orchestrator.cancel(id));

    let result = orchestrator.wait(id).await.unwrap();
    assert_eq!(result.status, SearchStatus::Failed);
    assert_eq!(result.error.as_deref(), Some("cancelled"));
    assert_eq!(result.total_products(), 0);
    assert!(result.finished_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn deadline_marks_unfinished_platforms_as_timed_out() {
    let orchestrator = builder()
        .search_deadline(Duration::from_millis(200))
        .adapter(Arc::new(ScriptedAdapter::returning(Platform::Shopee, cable_listings(Platform::Shopee))))
        .adapter(Arc::new(
            ScriptedAdapter::returning(Platform::Mudah, Vec::new()).with_delay(Duration::from_secs(10)),
        ))
        .build();

    let id = orchestrator
        .start(SearchRequest::new("cable", [Platform::Shopee, Platform::Mudah], 10))
        .await
        .unwrap();
    let result = orchestrator.wait(id).await.unwrap();

    assert_eq!(result.status, SearchStatus::Completed);
    assert_eq!(result.results[&Platform::Shopee].len(), 5);
    let mudah = &result.platform_errors[&Platform::Mudah];
    assert_eq!(mudah.kind, FetchErrorKind::Timeout);
    assert_eq!(mudah.detail, "search deadline exceeded");
}

#[tokio::test(start_paused = true)]
async fn deadline_with_no_success_fails_the_search() {
    let orchestrator = builder()
        .search_deadline(Duration::from_millis(100))
        .adapter(Arc::new(
            ScriptedAdapter::returning(Platform::Lazada, cable_listings(Platform::Lazada)).with_delay(Duration::from_secs(10)),
        ))
        .build();

    let id = orchestrator
        .start(SearchRequest::new("cable", [Platform::Lazada], 10))
        .await
        .unwrap();
    let result = orchestrator.wait(id).await.unwrap();

    assert_eq!(result.status, SearchStatus::Failed);
    assert!(result.error.as_deref().unwrap().starts_with("deadline exceeded"));
}

#[tokio::test]
async fn progress_stream_is_monotonic_and_ends_terminal() {
    let orchestrator = builder()
        .adapters(Platform::ALL.map(|p| -> Arc<dyn SourceAdapter> {
            Arc::new(ScriptedAdapter::sample(p).with_delay(Duration::from_millis(5)))
        }))
        .build();

    let id = orchestrator
        .start(SearchRequest::new("kabel", Platform::ALL, 10))
        .await
        .unwrap();
    let events: Vec<_> = orchestrator.subscribe(id).unwrap().collect().await;

    assert!(events.windows(2).all(|w| w[0].progress <= w[1].progress));
    let last = events.last().unwrap();
    assert_eq!(last.status, SearchStatus::Completed);
    assert_eq!(last.progress, 100);
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
}

#[tokio::test]
async fn late_subscriber_gets_terminal_event() {
    let orchestrator = builder()
        .adapter(Arc::new(ScriptedAdapter::sample(Platform::Shopee)))
        .build();
    let id = orchestrator
        .start(SearchRequest::new("cable", [Platform::Shopee], 5))
        .await
        .unwrap();
    orchestrator.wait(id).await.unwrap();

    let events: Vec<_> = orchestrator.subscribe(id).unwrap().collect().await;
    assert_eq!(events.len(), 1);
    assert!(events[0].is_terminal());
}

#[tokio::test]
async fn polls_after_completion_are_identical() {
    let orchestrator = builder()
        .adapter(Arc::new(ScriptedAdapter::sample(Platform::Lazada)))
        .build();
    let id = orchestrator
        .start(SearchRequest::new("cable", [Platform::Lazada], 5))
        .await
        .unwrap();
    orchestrator.wait(id).await.unwrap();

    let first = orchestrator.poll(id).unwrap();
    let second = orchestrator.poll(id).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(orchestrator.active_searches(), 0);
    assert!(!orchestrator.cancel(id));
}

#[tokio::test]
async fn unknown_search_ids_return_nothing() {
    let orchestrator = builder().build();
    let id = marketplace_scout::SearchId::new();
    assert!(orchestrator.poll(id).is_none());
    assert!(orchestrator.subscribe(id).is_none());
    assert!(!orchestrator.cancel(id));
}

#[tokio::test]
async fn invalid_requests_are_rejected_before_spawning() {
    let orchestrator = builder()
        .adapter(Arc::new(ScriptedAdapter::sample(Platform::Shopee)))
        .build();

    let empty = SearchRequest::new("   ", [Platform::Shopee], 5);
    assert_eq!(orchestrator.start(empty).await, Err(ValidationError::EmptyKeyword));

    let none = SearchRequest::new("cable", Vec::<Platform>::new(), 5);
    assert_eq!(orchestrator.start(none).await, Err(ValidationError::NoPlatforms));

    let missing = SearchRequest::new("cable", [Platform::Shopee, Platform::Tokopedia], 5);
    assert_eq!(
        orchestrator.start(missing).await,
        Err(ValidationError::PlatformUnavailable(Platform::Tokopedia))
    );
    assert_eq!(orchestrator.active_searches(), 0);
}

#[tokio::test]
async fn finished_searches_are_recorded_in_history() {
    let history = Arc::new(InMemoryHistoryStore::new());
    let orchestrator = builder()
        .adapter(Arc::new(ScriptedAdapter::returning(Platform::Shopee, cable_listings(Platform::Shopee))))
        .history_store(history.clone())
        .build();

    let id = orchestrator
        .start(SearchRequest::new("cable", [Platform::Shopee], 10))
        .await
        .unwrap();
    orchestrator.wait(id).await.unwrap();

    // recording happens right after the terminal snapshot is published
    let mut entry = history.get(id).await.unwrap();
    for _ in 0..50 {
        if entry.result.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        entry = history.get(id).await.unwrap();
    }
    assert_eq!(entry.request.keyword, "cable");
    assert_eq!(entry.result.unwrap().status, SearchStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_every_pending_search() {
    let orchestrator = builder()
        .adapter(Arc::new(ScriptedAdapter::sample(Platform::Shopee).with_delay(Duration::from_secs(60))))
        .build();

    let a = orchestrator
        .start(SearchRequest::new("a", [Platform::Shopee], 5))
        .await
        .unwrap();
    let b = orchestrator
        .start(SearchRequest::new("b", [Platform::Shopee], 5))
        .await
        .unwrap();
    assert_eq!(orchestrator.active_searches(), 2);

    orchestrator.shutdown();
    for id in [a, b] {
        let result = orchestrator.wait(id).await.unwrap();
        assert_eq!(result.status, SearchStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("cancelled"));
    }
    assert_eq!(orchestrator.active_searches(), 0);
}

#[tokio::test(start_paused = true)]
async fn worker_pool_bounds_concurrent_fetches() {
    let orchestrator = builder()
        .worker_pool_size(1)
        .adapters(Platform::ALL.map(|p| -> Arc<dyn SourceAdapter> {
            Arc::new(ScriptedAdapter::sample(p).with_delay(Duration::from_secs(1)))
        }))
        .build();

    let started = tokio::time::Instant::now();
    let id = orchestrator
        .start(SearchRequest::new("cable", Platform::ALL, 5))
        .await
        .unwrap();
    let result = orchestrator.wait(id).await.unwrap();

    assert_eq!(result.status, SearchStatus::Completed);
    assert!(started.elapsed() >= Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn reused_search_id_is_rejected() {
    let orchestrator = builder()
        .adapter(Arc::new(ScriptedAdapter::sample(Platform::Shopee).with_delay(Duration::from_secs(5))))
        .build();

    let request = SearchRequest::new("cable", [Platform::Shopee], 5);
    let id = orchestrator.start(request.clone()).await.unwrap();
    assert_eq!(
        orchestrator.start(request.clone()).await,
        Err(ValidationError::DuplicateSearch(id))
    );

    assert!(orchestrator.cancel(id));
    assert_eq!(
        orchestrator.start(request).await,
        Err(ValidationError::DuplicateSearch(id))
    );

    let events: Vec<_> = orchestrator.subscribe(id).unwrap().collect().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, SearchStatus::Failed);
    assert_eq!(orchestrator.poll(id).unwrap().error.as_deref(), Some("cancelled"));
}

/// Eviction runs just after the terminal snapshot is published
async fn until_evicted(orchestrator: &ScrapeOrchestrator, id: marketplace_scout::SearchId) -> bool {
    for _ in 0..50 {
        if orchestrator.poll(id).is_none() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn oldest_finished_searches_are_evicted_past_the_cap() {
    let orchestrator = builder()
        .max_retained_searches(2)
        .adapter(Arc::new(ScriptedAdapter::sample(Platform::Lazada)))
        .build();

    let mut ids = Vec::new();
    for keyword in ["a", "b", "c", "d", "e"] {
        let id = orchestrator
            .start(SearchRequest::new(keyword, [Platform::Lazada], 5))
            .await
            .unwrap();
        orchestrator.wait(id).await.unwrap();
        ids.push(id);
    }

    for &old in &ids[..3] {
        assert!(until_evicted(&orchestrator, old).await);
        assert!(orchestrator.subscribe(old).is_none());
    }
    for &recent in &ids[3..] {
        assert_eq!(orchestrator.poll(recent).unwrap().status, SearchStatus::Completed);
        assert!(orchestrator.subscribe(recent).is_some());
    }
}

#[tokio::test(start_paused = true)]
async fn forget_drops_only_finished_searches() {
    let orchestrator = builder()
        .adapter(Arc::new(ScriptedAdapter::sample(Platform::Mudah).with_delay(Duration::from_secs(5))))
        .build();

    let id = orchestrator
        .start(SearchRequest::new("sofa", [Platform::Mudah], 5))
        .await
        .unwrap();
    assert!(!orchestrator.forget(id));
    assert!(orchestrator.poll(id).is_some());

    orchestrator.wait(id).await.unwrap();
    assert!(orchestrator.forget(id));
    assert!(orchestrator.poll(id).is_none());
    assert!(orchestrator.subscribe(id).is_none());
    assert!(orchestrator.wait(id).await.is_none());
    assert!(!orchestrator.forget(id));
    assert!(!orchestrator.forget(marketplace_scout::SearchId::new()));
}

// governor keeps its own clock, so this runs on wall-clock time
#[tokio::test]
async fn concurrent_searches_share_the_platform_rate_limit() {
    const INTERVAL: Duration = Duration::from_millis(200);

    let adapter = Arc::new(ScriptedAdapter::returning(Platform::Shopee, cable_listings(Platform::Shopee)));
    let mut limiters = PlatformRateLimiters::unlimited();
    limiters.set_interval(Platform::Shopee, INTERVAL);
    let orchestrator = builder().rate_limiters(limiters).adapter(adapter.clone()).build();

    let (first, second) = tokio::join!(
        orchestrator.start(SearchRequest::new("usb cable", [Platform::Shopee], 5)),
        orchestrator.start(SearchRequest::new("hdmi cable", [Platform::Shopee], 5)),
    );
    for id in [first.unwrap(), second.unwrap()] {
        let result = orchestrator.wait(id).await.unwrap();
        assert_eq!(result.status, SearchStatus::Completed);
        assert_eq!(result.results[&Platform::Shopee].len(), 5);
    }

    let mut instants = adapter.call_instants();
    assert_eq!(instants.len(), 2);
    instants.sort();
    let gap = instants[1].duration_since(instants[0]);
    assert!(gap >= INTERVAL - Duration::from_millis(10), "calls only {gap:?} apart");
}
