mod common;

use common::{MemoryBackend, LOCAL, MAIN, REUPLOAD};
use etc_archive_bot::models::{ChannelOverlap, PhraseStats};
use serde_json::json;
use std::collections::BTreeSet;

fn archive() -> MemoryBackend {
    MemoryBackend::new()
        .with_docs(
            MAIN,
            vec![
                json!({"id": "a1", "title": "Tech Tuesday 1", "uploader_ids": ["MachinimaETC"], "date_published": "2015-01-01"}),
                json!({"id": "a2", "title": "Tech Newsday 2", "uploader": "ETC Show", "date_published": "2016-05-05"}),
                json!({"id": "a3", "title": "TUGS episode 1", "uploader_ids": ["SomeoneElse"], "date_published": "2015-02-02"}),
                json!({"id": "a4", "title": "News Dump", "uploader_ids": ["MachinimaETC"], "date_published": "2013-01-01"}),
            ],
        )
        .with_docs(
            REUPLOAD,
            vec![
                json!({"id": "r1", "original_id": "a1"}),
                json!({"id": "r2", "original_id": "a1"}),
                json!({"id": "r3", "original_id": "a3"}),
            ],
        )
        .with_docs(
            LOCAL,
            vec![
                json!({"id": "a1", "collection": "Classic ETC"}),
                json!({"id": "a3", "collection": "Modern ETC"}),
                json!({"id": "zz", "collection": "Classic ETC"}),
            ],
        )
}

fn phrases(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|p| p.to_string()).collect()
}

fn stats(total: u64, total_reuploaded: u64, total_archived: u64) -> PhraseStats {
    PhraseStats {
        total,
        total_reuploaded,
        total_archived,
    }
}

#[tokio::test]
async fn totals_come_from_every_index() {
    let db = archive().into_database();

    let report = db.get_stats(&BTreeSet::new()).await.unwrap();

    assert_eq!(report.total, 4);
    assert_eq!(report.total_reuploaded, 3);
    assert_eq!(report.total_classic, 2);
    assert_eq!(report.total_modern, 1);
    assert_eq!(report.total_archived, 3);
    assert!(report.phrase.is_empty());
}

#[tokio::test]
async fn grouped_phrases_are_merged() {
    let db = archive().into_database();

    let report = db
        .get_stats(&phrases(&["Tech Tuesday", "Tech Newsday", "TUGS", "News Dump"]))
        .await
        .unwrap();

    assert_eq!(
        report.phrase.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["News Dump", "T.U.G.S.", "Tech Tuesday/Newsday"]
    );
    assert_eq!(report.phrase["Tech Tuesday/Newsday"], stats(2, 2, 1));
    assert_eq!(report.phrase["T.U.G.S."], stats(1, 1, 1));
    assert_eq!(report.phrase["News Dump"], stats(1, 0, 0));
}

#[tokio::test]
async fn overlap_is_limited_to_the_main_channel_window() {
    let db = archive().into_database();

    let overlap = db.main_channel_overlap().await.unwrap();

    assert_eq!(
        overlap,
        ChannelOverlap {
            archived: 1,
            candidates: 2
        }
    );
    assert!(overlap.archived <= overlap.candidates);
    assert_eq!(overlap.percentage(), 50.0);
}

#[tokio::test]
async fn statistics_fail_loudly() {
    let missing = MemoryBackend::new().into_database();
    assert!(missing.get_stats(&BTreeSet::new()).await.is_err());

    let broken_lookups = archive().failing_lookups().into_database();
    assert!(broken_lookups.get_stats(&BTreeSet::new()).await.is_err());
}
