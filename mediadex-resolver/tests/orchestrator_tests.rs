//! Integration tests for per-query resolution
//!
//! Every catalog is a scripted MockAdapter over an in-memory cache; no test
//! touches the network.

mod helpers;

use helpers::{memory_cache, mock_document, MockAdapter};
use mediadex_common::config::ResolveMode;
use mediadex_resolver::db::{payloads, unix_now};
use mediadex_resolver::orchestrator::{Provenance, ResolveState};
use mediadex_resolver::{
    CacheStore, Medium, Query, ResolveError, Resolver, ResolverConfig, Source, SourceAdapter,
    SourceRegistry,
};
use std::sync::Arc;
use std::time::Duration;

fn build_resolver(cache: CacheStore, adapters: &[Arc<MockAdapter>], config: ResolverConfig) -> Resolver {
    let mut registry = SourceRegistry::new();
    for adapter in adapters {
        registry.register(adapter.clone() as Arc<dyn SourceAdapter>);
    }
    Resolver::new(cache, registry, config)
}

fn nisekoi_sources() -> (Arc<MockAdapter>, Arc<MockAdapter>) {
    let anilist = MockAdapter::new(Source::AniList)
        .entry("A123", &["Nisekoi", "Nisekoi: False Love", "ニセコイ"])
        .into_arc();
    let kitsu = MockAdapter::new(Source::Kitsu)
        .entry("B77", &["Nisekoi: False Love"])
        .into_arc();
    (anilist, kitsu)
}

// ============================================================================
// Cache-backed resolution
// ============================================================================

#[tokio::test]
async fn test_exact_match_cached_and_near_miss_not_retried() {
    let cache = memory_cache().await;
    let source_a = MockAdapter::new(Source::AniList)
        .entry("A123", &["Nisekoi"])
        .into_arc();
    let source_b = MockAdapter::new(Source::Kitsu)
        .entry("B9", &["Nisekoi: False Love"])
        .into_arc();
    let resolver = build_resolver(
        cache,
        &[source_a.clone(), source_b.clone()],
        ResolverConfig::default(),
    );
    let query = Query::new("Nisekoi", Medium::Anime);

    let first = resolver.resolve(&query, None).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[&Source::AniList]["id"], "A123");
    assert!(!first.contains_key(&Source::Kitsu));
    let calls_after_first = source_a.total_calls() + source_b.total_calls();
    assert_eq!(calls_after_first, 2);

    let second = resolver.resolve(&query, None).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(source_a.total_calls() + source_b.total_calls(), calls_after_first);
}

#[tokio::test]
async fn test_discovered_names_are_cross_linked() {
    let cache = memory_cache().await;
    let (anilist, kitsu) = nisekoi_sources();
    let resolver = build_resolver(
        cache.clone(),
        &[anilist.clone(), kitsu.clone()],
        ResolverConfig::default(),
    );

    let result = resolver
        .resolve(&Query::new("Nisekoi", Medium::Anime), None)
        .await
        .unwrap();
    assert_eq!(result[&Source::AniList]["id"], "A123");
    assert_eq!(result[&Source::Kitsu]["id"], "B77");

    // Kitsu only matched through the name AniList contributed
    assert_eq!(
        kitsu.synonyms_seen(),
        vec![vec![
            "Nisekoi".to_string(),
            "Nisekoi: False Love".to_string(),
            "ニセコイ".to_string()
        ]]
    );

    for name in ["Nisekoi", "nisekoi: false love", "ニセコイ"] {
        let ids = cache.get_identifiers(name, Medium::Anime).await.unwrap();
        assert_eq!(ids.get(&Source::AniList).map(String::as_str), Some("A123"), "{name}");
        assert_eq!(ids.get(&Source::Kitsu).map(String::as_str), Some("B77"), "{name}");
    }

    let calls = anilist.total_calls() + kitsu.total_calls();
    let again = resolver
        .resolve(&Query::new("NISEKOI: FALSE LOVE", Medium::Anime), None)
        .await
        .unwrap();
    assert_eq!(again, result);
    assert_eq!(anilist.total_calls() + kitsu.total_calls(), calls);
}

#[tokio::test]
async fn test_stale_payload_refetched_by_id() {
    let cache = memory_cache().await;
    let anilist = MockAdapter::new(Source::AniList)
        .entry("A123", &["Nisekoi"])
        .into_arc();

    cache
        .set_identifier("Nisekoi", Medium::Anime, Source::AniList, "A123")
        .await;
    payloads::set_payload_at(
        cache.pool(),
        "A123",
        Medium::Anime,
        Source::AniList,
        &mock_document("A123", &["Old title"]),
        unix_now() - 86_401,
    )
    .await
    .unwrap();

    let resolver = build_resolver(cache.clone(), &[anilist.clone()], ResolverConfig::default());
    let result = resolver
        .resolve(&Query::new("nisekoi", Medium::Anime), None)
        .await
        .unwrap();

    assert_eq!(result[&Source::AniList]["title"], "Nisekoi");
    assert_eq!(anilist.by_id_calls(), 1);
    assert_eq!(anilist.by_query_calls(), 0);

    let refreshed = cache
        .get_payload("A123", Medium::Anime, Source::AniList)
        .await
        .unwrap();
    assert_eq!(refreshed["title"], "Nisekoi");
}

#[tokio::test]
async fn test_known_id_lookup_carries_title_alias_hint() {
    let cache = memory_cache().await;
    let mal = MockAdapter::new(Source::MyAnimeList)
        .entry("18897", &["Nisekoi"])
        .tracking_title_alias()
        .into_arc();

    cache
        .set_identifier("Nisekoi TV", Medium::Anime, Source::MyAnimeList, "18897")
        .await;
    cache.set_title_alias("18897", Medium::Anime, "Nisekoi").await;

    let resolver = build_resolver(cache.clone(), &[mal.clone()], ResolverConfig::default());
    let result = resolver
        .resolve(&Query::new("Nisekoi TV", Medium::Anime), None)
        .await
        .unwrap();

    assert_eq!(result[&Source::MyAnimeList]["id"], "18897");
    assert_eq!(mal.hints(), vec![Some("Nisekoi".to_string())]);
    assert_eq!(mal.by_query_calls(), 0);
}

#[tokio::test]
async fn test_title_alias_recorded_for_tracking_sources() {
    let cache = memory_cache().await;
    let mal = MockAdapter::new(Source::MyAnimeList)
        .entry("18897", &["Nisekoi", "Nisekoi: False Love"])
        .tracking_title_alias()
        .into_arc();
    let kitsu = MockAdapter::new(Source::Kitsu)
        .entry("B77", &["Nisekoi"])
        .into_arc();
    let resolver = build_resolver(cache.clone(), &[mal, kitsu], ResolverConfig::default());

    resolver
        .resolve(&Query::new("nisekoi", Medium::Anime), None)
        .await
        .unwrap();

    assert_eq!(
        cache.get_title_alias("18897", Medium::Anime).await.as_deref(),
        Some("Nisekoi")
    );
    assert_eq!(cache.get_title_alias("B77", Medium::Anime).await, None);
}

// ============================================================================
// Failure isolation
// ============================================================================

#[tokio::test]
async fn test_failing_source_is_omitted() {
    let cache = memory_cache().await;
    let anilist = MockAdapter::new(Source::AniList)
        .entry("A1", &["Toradora!"])
        .into_arc();
    let kitsu = MockAdapter::new(Source::Kitsu)
        .entry("K1", &["Toradora!"])
        .into_arc();
    let mal = MockAdapter::new(Source::MyAnimeList)
        .entry("M1", &["Toradora!"])
        .failing()
        .into_arc();
    let resolver = build_resolver(
        cache.clone(),
        &[anilist, kitsu, mal.clone()],
        ResolverConfig::default(),
    );

    let sources = [Source::AniList, Source::Kitsu, Source::MyAnimeList];
    let result = resolver
        .resolve(&Query::new("Toradora!", Medium::Anime), Some(&sources))
        .await
        .unwrap();

    assert_eq!(result.len(), 2);
    assert!(!result.contains_key(&Source::MyAnimeList));
    assert_eq!(mal.by_query_calls(), 1);

    // A failure is not a "no match"; the next query asks again
    assert!(!cache.is_recent_miss("Toradora!", Medium::Anime, Source::MyAnimeList, &[]).await);
    resolver
        .resolve(&Query::new("Toradora!", Medium::Anime), Some(&sources))
        .await
        .unwrap();
    assert_eq!(mal.by_query_calls(), 2);
}

#[tokio::test]
async fn test_no_match_retried_when_new_names_arrive() {
    let cache = memory_cache().await;
    let kitsu = MockAdapter::new(Source::Kitsu)
        .entry("B77", &["Nisekoi: False Love"])
        .into_arc();
    let sources = [Source::AniList, Source::Kitsu];
    let query = Query::new("Nisekoi", Medium::Anime);

    // AniList is down, so Kitsu searches with the bare query and finds nothing
    let anilist_down = MockAdapter::new(Source::AniList)
        .entry("A123", &["Nisekoi", "Nisekoi: False Love"])
        .failing()
        .into_arc();
    let resolver = build_resolver(
        cache.clone(),
        &[anilist_down, kitsu.clone()],
        ResolverConfig::default(),
    );
    let first = resolver.resolve(&query, Some(&sources)).await.unwrap();
    assert!(first.is_empty());
    assert_eq!(kitsu.by_query_calls(), 1);

    // AniList answers now and contributes the name Kitsu lists
    let anilist = MockAdapter::new(Source::AniList)
        .entry("A123", &["Nisekoi", "Nisekoi: False Love"])
        .into_arc();
    let resolver = build_resolver(
        cache.clone(),
        &[anilist, kitsu.clone()],
        ResolverConfig::default(),
    );
    let second = resolver.resolve(&query, Some(&sources)).await.unwrap();

    assert_eq!(kitsu.by_query_calls(), 2);
    assert_eq!(second[&Source::AniList]["id"], "A123");
    assert_eq!(second[&Source::Kitsu]["id"], "B77");
    let ids = cache.get_identifiers("Nisekoi", Medium::Anime).await.unwrap();
    assert_eq!(ids[&Source::Kitsu], "B77");
}

#[tokio::test]
async fn test_slow_source_times_out() {
    let cache = memory_cache().await;
    let anilist = MockAdapter::new(Source::AniList)
        .entry("A1", &["Mushishi"])
        .into_arc();
    let kitsu = MockAdapter::new(Source::Kitsu)
        .entry("K1", &["Mushishi"])
        .delayed(Duration::from_secs(5))
        .into_arc();
    let config = ResolverConfig {
        source_timeout: Duration::from_millis(50),
        mode: ResolveMode::Sequential,
    };
    let resolver = build_resolver(cache.clone(), &[anilist, kitsu], config);

    let result = resolver
        .resolve(&Query::new("Mushishi", Medium::Anime), None)
        .await
        .unwrap();

    assert_eq!(result.keys().copied().collect::<Vec<_>>(), vec![Source::AniList]);
    assert!(!cache.is_recent_miss("Mushishi", Medium::Anime, Source::Kitsu, &[]).await);
}

#[tokio::test]
async fn test_blank_query_is_rejected() {
    let cache = memory_cache().await;
    let anilist = MockAdapter::new(Source::AniList).into_arc();
    let resolver = build_resolver(cache, &[anilist.clone()], ResolverConfig::default());

    let result = resolver.resolve(&Query::new("   ", Medium::Anime), None).await;

    assert!(matches!(result, Err(ResolveError::InvalidQuery(_))));
    assert_eq!(anilist.total_calls(), 0);
}

// ============================================================================
// Target selection
// ============================================================================

#[tokio::test]
async fn test_sources_outside_medium_are_skipped() {
    let cache = memory_cache().await;
    let anilist = MockAdapter::new(Source::AniList)
        .entry("A1", &["Clannad"])
        .into_arc();
    let vndb = MockAdapter::new(Source::Vndb)
        .entry("v4", &["Clannad"])
        .into_arc();
    let resolver = build_resolver(cache, &[anilist, vndb.clone()], ResolverConfig::default());

    let result = resolver
        .resolve(
            &Query::new("Clannad", Medium::Anime),
            Some(&[Source::AniList, Source::Vndb]),
        )
        .await
        .unwrap();

    assert!(result.contains_key(&Source::AniList));
    assert!(!result.contains_key(&Source::Vndb));
    assert_eq!(vndb.total_calls(), 0);
}

#[tokio::test]
async fn test_requested_sources_deduplicated_and_unregistered_ignored() {
    let cache = memory_cache().await;
    let anilist = MockAdapter::new(Source::AniList)
        .entry("A1", &["Monster"])
        .into_arc();
    let resolver = build_resolver(cache, &[anilist.clone()], ResolverConfig::default());

    let result = resolver
        .resolve(
            &Query::new("Monster", Medium::Manga),
            Some(&[Source::AniList, Source::MangaUpdates, Source::AniList]),
        )
        .await
        .unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(anilist.by_query_calls(), 1);
}

// ============================================================================
// Resolution modes
// ============================================================================

#[tokio::test]
async fn test_concurrent_mode_shares_only_cached_names() {
    let cache = memory_cache().await;
    let (anilist, kitsu) = nisekoi_sources();
    let config = ResolverConfig {
        mode: ResolveMode::Concurrent,
        ..ResolverConfig::default()
    };
    let resolver = build_resolver(cache.clone(), &[anilist, kitsu.clone()], config);

    let result = resolver
        .resolve(&Query::new("Nisekoi", Medium::Anime), None)
        .await
        .unwrap();

    assert!(result.contains_key(&Source::AniList));
    assert!(!result.contains_key(&Source::Kitsu));
    assert_eq!(kitsu.synonyms_seen(), vec![Vec::<String>::new()]);

    // Names AniList found are still linked for later queries
    let ids = cache
        .get_identifiers("Nisekoi: False Love", Medium::Anime)
        .await
        .unwrap();
    assert_eq!(ids.get(&Source::AniList).map(String::as_str), Some("A123"));
}

#[tokio::test]
async fn test_concurrent_mode_resolves_independent_sources() {
    let cache = memory_cache().await;
    let anilist = MockAdapter::new(Source::AniList)
        .entry("A1", &["Mushishi"])
        .delayed(Duration::from_millis(20))
        .into_arc();
    let kitsu = MockAdapter::new(Source::Kitsu)
        .entry("K1", &["Mushishi"])
        .delayed(Duration::from_millis(20))
        .into_arc();
    let config = ResolverConfig {
        mode: ResolveMode::Concurrent,
        ..ResolverConfig::default()
    };
    let resolver = build_resolver(cache, &[anilist, kitsu], config);

    let result = resolver
        .resolve(&Query::new("Mushishi", Medium::Anime), None)
        .await
        .unwrap();

    assert_eq!(result[&Source::AniList]["id"], "A1");
    assert_eq!(result[&Source::Kitsu]["id"], "K1");
}

#[tokio::test]
async fn test_resolve_source_folds_one_step_at_a_time() {
    let cache = memory_cache().await;
    let (anilist, kitsu) = nisekoi_sources();
    let resolver = build_resolver(cache, &[anilist, kitsu], ResolverConfig::default());
    let query = Query::new("Nisekoi", Medium::Anime);
    let snapshot = resolver.lookup_cache(&query).await;

    let (state, outcome) = resolver
        .resolve_source(ResolveState::default(), &snapshot, &query, Source::AniList)
        .await;
    let outcome = outcome.unwrap();
    assert_eq!(outcome.id, "A123");
    assert_eq!(outcome.provenance, Provenance::Fetched);
    assert_eq!(state.synonyms().len(), 3);

    let (state, outcome) = resolver
        .resolve_source(state, &snapshot, &query, Source::Kitsu)
        .await;
    assert_eq!(outcome.unwrap().id, "B77");
    assert_eq!(state.outcomes().len(), 2);
    assert_eq!(state.into_result().len(), 2);
}
