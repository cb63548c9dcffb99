mod common;

use common::{MemoryBackend, LOCAL, MAIN, REUPLOAD};
use etc_archive_bot::services::query_builder::{build_search, SearchParams, SortDirection};
use etc_archive_bot::services::search_service::SearchOutcome;
use etc_archive_bot::utils::parse_user_date;
use serde_json::json;
use std::sync::atomic::Ordering;

fn archive() -> MemoryBackend {
    MemoryBackend::new()
        .with_docs(
            MAIN,
            vec![
                json!({"id": "def456", "title": "ETC News Dump Special", "date_published": "2015-03-03"}),
                json!({"id": "abc123", "title": "ETC News Dump", "date_published": "2015-03-01", "uploader_ids": ["MachinimaETC"]}),
                json!({"id": "ghi789", "title": "Tech Tuesday", "date_published": "2016-01-01"}),
            ],
        )
        .with_docs(REUPLOAD, vec![json!({"id": "xyz", "original_id": "abc123"})])
        .with_docs(
            LOCAL,
            vec![json!({"id": "abc123", "width": 1920, "height": 1080, "collection": "Classic ETC"})],
        )
}

fn news_dump(direction: SortDirection) -> SearchParams<'static> {
    SearchParams {
        query: Some("News Dump"),
        field: Some("title"),
        sort_by_field: Some("date_published"),
        sort_direction: direction,
        ..Default::default()
    }
}

#[tokio::test]
async fn hits_are_enriched_from_secondary_indices() {
    let db = archive().into_database();

    let videos = match db.search(&build_search(news_dump(SortDirection::Asc))).await {
        SearchOutcome::Found(videos) => videos,
        other => panic!("expected videos, got {other:?}"),
    };

    assert_eq!(videos.len(), 2);
    let fused = &videos[0];
    assert_eq!(fused.id, "abc123");
    assert_eq!(fused.on_youtube, Some(true));
    assert_eq!(
        fused.reupload_url.as_deref(),
        Some("https://www.youtube.com/watch?v=xyz")
    );
    assert_eq!(fused.archived, Some(true));
    assert_eq!(fused.quality(), Some((1920, 1080)));

    let plain = &videos[1];
    assert_eq!(plain.id, "def456");
    assert_eq!(plain.on_youtube, None);
    assert_eq!(plain.archived, None);
    assert_eq!(plain.quality(), None);

    assert_eq!(db.backend().multi_search_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn engine_order_is_kept() {
    let db = archive().into_database();

    let ids: Vec<String> = db
        .search(&build_search(news_dump(SortDirection::Desc)))
        .await
        .into_videos()
        .into_iter()
        .map(|v| v.id)
        .collect();

    assert_eq!(ids, vec!["def456", "abc123"]);
}

#[tokio::test]
async fn malformed_primary_response_yields_nothing() {
    let db = archive().malformed().into_database();

    let outcome = db.search(&build_search(news_dump(SortDirection::Asc))).await;
    assert!(matches!(outcome, SearchOutcome::Failed(_)));
    assert!(outcome.into_videos().is_empty());
}

#[tokio::test]
async fn missing_main_index_fails_closed() {
    let db = MemoryBackend::new().into_database();

    let outcome = db.search(&build_search(SearchParams::default())).await;
    assert!(matches!(outcome, SearchOutcome::Failed(_)));
}

#[tokio::test]
async fn failed_lookups_leave_results_unenriched() {
    let db = archive().failing_lookups().into_database();

    let videos = db
        .search(&build_search(news_dump(SortDirection::Asc)))
        .await
        .into_videos();

    assert_eq!(videos.len(), 2);
    assert!(videos.iter().all(|v| v.on_youtube.is_none() && v.archived.is_none()));
}

#[tokio::test]
async fn missing_secondary_index_counts_as_a_miss() {
    let db = MemoryBackend::new()
        .with_docs(MAIN, vec![json!({"id": "abc123", "title": "ETC News Dump"})])
        .with_docs(REUPLOAD, vec![json!({"id": "xyz", "original_id": "abc123"})])
        .into_database();

    let videos = db
        .search(&build_search(SearchParams {
            query: Some("News Dump"),
            ..Default::default()
        }))
        .await
        .into_videos();

    assert_eq!(videos.len(), 1);
    assert_eq!(videos[0].on_youtube, Some(true));
    assert_eq!(videos[0].archived, None);
}

#[tokio::test]
async fn no_match_is_no_results() {
    let db = archive().into_database();

    let outcome = db
        .search(&build_search(SearchParams {
            query: Some("Nothing Like This"),
            ..Default::default()
        }))
        .await;
    assert_eq!(outcome, SearchOutcome::NoResults);
}

#[tokio::test]
async fn date_search_is_bounded_by_the_window() {
    let db = archive().into_database();
    let center = parse_user_date("2015-03-02").unwrap();

    let mut ids: Vec<String> = db
        .search_by_date(center, 8, SearchParams::default())
        .await
        .into_videos()
        .into_iter()
        .map(|v| v.id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["abc123", "def456"]);

    let special: Vec<String> = db
        .search_by_date(
            center,
            8,
            SearchParams {
                query: Some("Special"),
                ..Default::default()
            },
        )
        .await
        .into_videos()
        .into_iter()
        .map(|v| v.id)
        .collect();
    assert_eq!(special, vec!["def456"]);
}

#[tokio::test]
async fn field_only_search_keeps_document_ids() {
    let db = archive().into_database();

    let videos = db
        .search(&build_search(SearchParams {
            field: Some("title"),
            ..Default::default()
        }))
        .await
        .into_videos();

    let ids: Vec<&str> = videos.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, vec!["def456", "abc123", "ghi789"]);
    assert_eq!(videos[1].title.as_deref(), Some("ETC News Dump"));
    assert_eq!(videos[1].date_published, None);
    assert_eq!(videos[1].on_youtube, Some(true));
}
