//! Тесты кэша результатов и проверки через исполнитель

use crate::common::test_utils::id_name_rows;
use crate::common::{BindValue, QuerySpec};
use crate::equivalence::{CacheKey, EquivalenceChecker, InMemoryResultCache, NoopResultCache, ResultCache};
use crate::executor::recorded::CallKind;
use crate::executor::RecordedExecutor;
use std::sync::Arc;
use std::time::Duration;

const BASELINE: &str = "SELECT id, name FROM holdings ORDER BY id";
const CANDIDATE: &str = "SELECT id, name FROM holdings ORDER BY id LIMIT 100";

#[test]
fn test_cache_key_uses_exact_text_and_binds() {
    let a = QuerySpec::new(BASELINE).bind("x", BindValue::Integer(1));
    let b = QuerySpec::new(BASELINE).bind("x", BindValue::Integer(2));
    let c = QuerySpec::new(format!("{} ", BASELINE)).bind("x", BindValue::Integer(1));

    assert_eq!(CacheKey::for_query(&a), CacheKey::for_query(&a.clone()));
    assert_ne!(CacheKey::for_query(&a), CacheKey::for_query(&b));
    assert_ne!(CacheKey::for_query(&a), CacheKey::for_query(&c));
}

#[test]
fn test_in_memory_cache_invalidate() {
    let cache = InMemoryResultCache::new();
    let key = CacheKey::for_query(&QuerySpec::new(BASELINE));
    assert!(cache.get(&key).is_none());

    cache.put(key.clone(), Arc::new(id_name_rows(&[(1, "a")])));
    assert!(cache.get(&key).is_some());
    assert_eq!(cache.statistics().entries, 1);
    assert_eq!(cache.statistics().hits, 1);
    assert_eq!(cache.statistics().misses, 1);

    cache.invalidate();
    assert!(cache.get(&key).is_none());
    assert_eq!(cache.statistics().entries, 0);
}

#[test]
fn test_noop_cache_stores_nothing() {
    let cache = NoopResultCache;
    let key = CacheKey::for_query(&QuerySpec::new(BASELINE));
    cache.put(key.clone(), Arc::new(id_name_rows(&[])));
    assert!(cache.get(&key).is_none());
}

#[tokio::test]
async fn test_baseline_is_fetched_once_with_cache() {
    let rows = id_name_rows(&[(1, "a"), (2, "b")]);
    let mut executor = RecordedExecutor::new()
        .with_result(BASELINE, rows.clone())
        .with_result(CANDIDATE, rows);
    let cache: Arc<dyn ResultCache> = Arc::new(InMemoryResultCache::new());
    let checker = EquivalenceChecker::default().with_cache(Arc::clone(&cache));

    let baseline = QuerySpec::new(BASELINE);
    let candidate = QuerySpec::new(CANDIDATE);
    for _ in 0..3 {
        let verdict = checker
            .check(&mut executor, &baseline, &candidate, None)
            .await
            .unwrap();
        assert!(verdict.functional_ok);
    }
    // 1 базовый + 3 кандидата
    assert_eq!(executor.call_count(CallKind::Fetch), 4);

    cache.invalidate();
    checker
        .check(&mut executor, &baseline, &candidate, None)
        .await
        .unwrap();
    assert_eq!(executor.call_count(CallKind::Fetch), 6);
}

#[tokio::test]
async fn test_stale_cache_is_served_until_invalidated() {
    let mut executor = RecordedExecutor::new()
        .with_result(BASELINE, id_name_rows(&[(1, "a")]))
        .with_result(CANDIDATE, id_name_rows(&[(1, "a")]));
    let checker =
        EquivalenceChecker::default().with_cache(Arc::new(InMemoryResultCache::new()));
    let baseline = QuerySpec::new(BASELINE);
    let candidate = QuerySpec::new(CANDIDATE);

    checker
        .check(&mut executor, &baseline, &candidate, None)
        .await
        .unwrap();

    // Данные изменились, но кэш об этом не знает
    let mut executor = RecordedExecutor::new()
        .with_result(BASELINE, id_name_rows(&[(1, "z")]))
        .with_result(CANDIDATE, id_name_rows(&[(1, "z")]));
    let verdict = checker
        .check(&mut executor, &baseline, &candidate, None)
        .await
        .unwrap();
    assert!(!verdict.functional_ok);

    checker.cache().invalidate();
    let verdict = checker
        .check(&mut executor, &baseline, &candidate, None)
        .await
        .unwrap();
    assert!(verdict.functional_ok);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_timeout_is_error_not_verdict() {
    let mut executor = RecordedExecutor::new()
        .with_result(BASELINE, id_name_rows(&[(1, "a")]))
        .with_result(CANDIDATE, id_name_rows(&[(1, "a")]))
        .with_delay(CANDIDATE, Duration::from_secs(10));
    let checker = EquivalenceChecker::default();

    let err = checker
        .check(
            &mut executor,
            &QuerySpec::new(BASELINE),
            &QuerySpec::new(CANDIDATE),
            Some(Duration::from_secs(1)),
        )
        .await
        .unwrap_err();
    assert!(err.is_timeout());
}
