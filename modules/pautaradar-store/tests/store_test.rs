//! Integration tests for the event store services.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use chrono::Utc;
use serde_json::json;

use pautaradar_common::state::{EDITORIAL_MERGE, HARD_ANCHOR_MATCH};
use pautaradar_common::{EventStatus, Pool};
use pautaradar_store::documents::{insert_document, NewDocument};
use pautaradar_store::events::{
    create_event, insert_event_doc, transition_event_status, NewEvent,
};
use pautaradar_store::Store;

/// Get a migrated test store, or skip if no test DB is available.
async fn test_store() -> Option<Store> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let store = Store::connect(&url).await.ok()?;
    store.migrate().await.ok()?;
    Some(store)
}

fn unique_suffix() -> String {
    format!(
        "{}-{:x}",
        std::process::id(),
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    )
}

async fn seed_doc(store: &Store, tag: &str) -> i64 {
    let mut conn = store.pool().acquire().await.unwrap();
    insert_document(
        &mut conn,
        &NewDocument {
            source_pk: seed_source(store, tag).await,
            snapshot_id: None,
            url: format!("https://example.org/{tag}"),
            canonical_url: None,
            title: Some(format!("doc {tag}")),
            author: None,
            published_at: None,
            modified_at: None,
            clean_text: format!("texto do documento {tag}"),
            lang: Some("pt-BR".into()),
            content_hash: format!("hash-{tag}"),
            simhash: None,
            version_no: 1,
        },
    )
    .await
    .unwrap()
}

async fn seed_source(store: &Store, tag: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO sources (source_id, domain, tier, is_official, profile)
        VALUES ($1, 'example.org', 2, false, $2)
        ON CONFLICT (source_id) DO UPDATE SET updated_at = now()
        RETURNING id
        "#,
    )
    .bind(format!("src-{tag}"))
    .bind(json!({}))
    .fetch_one(store.pool())
    .await
    .unwrap()
}

async fn seed_event(store: &Store, doc_ids: &[i64]) -> i64 {
    let mut conn = store.pool().acquire().await.unwrap();
    let event = create_event(
        &mut conn,
        &NewEvent {
            status: EventStatus::Hydrating,
            lane: Some("politica".into()),
            summary: Some("evento de teste".into()),
            score_plantao: 40.0,
            origin_pool: Pool::Fast,
        },
    )
    .await
    .unwrap();
    transition_event_status(
        &mut conn,
        event.id,
        EventStatus::Hydrating,
        Some("FAST_PATH_EVENT_CREATED"),
        true,
    )
    .await
    .unwrap();
    for (i, doc_id) in doc_ids.iter().enumerate() {
        insert_event_doc(&mut conn, event.id, *doc_id, None, i == 0).await.unwrap();
    }
    event.id
}

async fn primary_count(store: &Store, event_id: i64) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM event_docs WHERE event_id = $1 AND is_primary",
    )
    .bind(event_id)
    .fetch_one(store.pool())
    .await
    .unwrap()
}

async fn doc_ids_of(store: &Store, event_id: i64) -> Vec<i64> {
    let mut ids = sqlx::query_scalar::<_, i64>(
        "SELECT doc_id FROM event_docs WHERE event_id = $1",
    )
    .bind(event_id)
    .fetch_all(store.pool())
    .await
    .unwrap();
    ids.sort_unstable();
    ids
}

#[tokio::test]
async fn merge_tombstones_the_absorbed_event() {
    let Some(store) = test_store().await else {
        return;
    };
    let tag = unique_suffix();

    let d1 = seed_doc(&store, &format!("m1-{tag}")).await;
    let d2 = seed_doc(&store, &format!("m2-{tag}")).await;
    let canonical = seed_event(&store, &[d1]).await;
    let absorbed = seed_event(&store, &[d2]).await;

    let outcome = store
        .merge_event_into(absorbed, canonical, HARD_ANCHOR_MATCH, HARD_ANCHOR_MATCH, json!({}))
        .await
        .unwrap();
    assert!(outcome.merged);
    assert_eq!(outcome.moved_docs, 1);
    assert_eq!(outcome.deduped_docs, 0);

    let absorbed_row = store.event(absorbed).await.unwrap().unwrap();
    assert_eq!(absorbed_row.canonical_event_id, Some(canonical));
    assert_eq!(absorbed_row.status(), EventStatus::Merged);

    assert_eq!(doc_ids_of(&store, canonical).await, {
        let mut expected = vec![d1, d2];
        expected.sort_unstable();
        expected
    });
    assert_eq!(primary_count(&store, canonical).await, 1);

    // The tombstone resolves to its canonical event.
    let resolved = store.resolve_canonical(absorbed).await.unwrap().unwrap();
    assert_eq!(resolved.id, canonical);

    // Current status equals the latest history row.
    let history = store.state_history(absorbed).await.unwrap();
    assert_eq!(history.last().unwrap().status, "MERGED");
}

#[tokio::test]
async fn merge_is_idempotent() {
    let Some(store) = test_store().await else {
        return;
    };
    let tag = unique_suffix();

    let d1 = seed_doc(&store, &format!("i1-{tag}")).await;
    let d2 = seed_doc(&store, &format!("i2-{tag}")).await;
    let canonical = seed_event(&store, &[d1]).await;
    let absorbed = seed_event(&store, &[d2]).await;

    let first = store
        .merge_event_into(absorbed, canonical, HARD_ANCHOR_MATCH, HARD_ANCHOR_MATCH, json!({}))
        .await
        .unwrap();
    assert!(first.merged);
    let second = store
        .merge_event_into(absorbed, canonical, HARD_ANCHOR_MATCH, HARD_ANCHOR_MATCH, json!({}))
        .await
        .unwrap();
    assert!(!second.merged);

    let audits = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM merge_audit WHERE from_event_id = $1 AND to_event_id = $2",
    )
    .bind(absorbed)
    .bind(canonical)
    .fetch_one(store.pool())
    .await
    .unwrap();
    assert_eq!(audits, 1);
}

#[tokio::test]
async fn merge_dedupes_shared_documents() {
    let Some(store) = test_store().await else {
        return;
    };
    let tag = unique_suffix();

    let shared = seed_doc(&store, &format!("s1-{tag}")).await;
    let extra = seed_doc(&store, &format!("s2-{tag}")).await;
    let canonical = seed_event(&store, &[shared]).await;
    let absorbed = seed_event(&store, &[shared, extra]).await;

    let outcome = store
        .merge_event_into(absorbed, canonical, HARD_ANCHOR_MATCH, HARD_ANCHOR_MATCH, json!({}))
        .await
        .unwrap();
    assert!(outcome.merged);
    assert_eq!(outcome.deduped_docs, 1);
    assert_eq!(outcome.moved_docs, 1);
    assert_eq!(primary_count(&store, canonical).await, 1);
}

#[tokio::test]
async fn merging_into_a_tombstone_is_refused() {
    let Some(store) = test_store().await else {
        return;
    };
    let tag = unique_suffix();

    let d1 = seed_doc(&store, &format!("t1-{tag}")).await;
    let d2 = seed_doc(&store, &format!("t2-{tag}")).await;
    let d3 = seed_doc(&store, &format!("t3-{tag}")).await;
    let a = seed_event(&store, &[d1]).await;
    let b = seed_event(&store, &[d2]).await;
    let c = seed_event(&store, &[d3]).await;

    store
        .merge_event_into(b, a, HARD_ANCHOR_MATCH, HARD_ANCHOR_MATCH, json!({}))
        .await
        .unwrap();
    let err = store
        .merge_event_into(c, b, HARD_ANCHOR_MATCH, HARD_ANCHOR_MATCH, json!({}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already merged"), "{err}");
}

#[tokio::test]
async fn split_then_merge_restores_the_doc_set() {
    let Some(store) = test_store().await else {
        return;
    };
    let tag = unique_suffix();

    let d1 = seed_doc(&store, &format!("r1-{tag}")).await;
    let d2 = seed_doc(&store, &format!("r2-{tag}")).await;
    let d3 = seed_doc(&store, &format!("r3-{tag}")).await;
    let event = seed_event(&store, &[d1, d2, d3]).await;

    let split = store.split_event_by_docs(event, &[d2], None, None).await.unwrap();
    assert_eq!(split.moved_docs, 1);
    assert_eq!(split.remaining_docs, 2);

    let new_event = split.new_event_id;
    assert_eq!(doc_ids_of(&store, new_event).await, vec![d2]);
    assert_eq!(primary_count(&store, new_event).await, 1);
    assert_eq!(primary_count(&store, event).await, 1);
    let new_row = store.event(new_event).await.unwrap().unwrap();
    assert_eq!(new_row.status(), EventStatus::PartialEnrich);

    // Merging the split half back restores the original doc set.
    let outcome = store
        .merge_event_into(new_event, event, EDITORIAL_MERGE, EDITORIAL_MERGE, json!({}))
        .await
        .unwrap();
    assert!(outcome.merged);
    assert_eq!(doc_ids_of(&store, event).await, {
        let mut expected = vec![d1, d2, d3];
        expected.sort_unstable();
        expected
    });
    assert_eq!(primary_count(&store, event).await, 1);
}

#[tokio::test]
async fn split_rejects_improper_subsets() {
    let Some(store) = test_store().await else {
        return;
    };
    let tag = unique_suffix();

    let d1 = seed_doc(&store, &format!("x1-{tag}")).await;
    let d2 = seed_doc(&store, &format!("x2-{tag}")).await;
    let event = seed_event(&store, &[d1, d2]).await;

    assert!(store.split_event_by_docs(event, &[], None, None).await.is_err());
    assert!(store.split_event_by_docs(event, &[d1, d2], None, None).await.is_err());
    assert!(store.split_event_by_docs(event, &[999_999_999], None, None).await.is_err());
}

#[tokio::test]
async fn state_transitions_append_history_in_order() {
    let Some(store) = test_store().await else {
        return;
    };
    let tag = unique_suffix();

    let d1 = seed_doc(&store, &format!("h1-{tag}")).await;
    let event = seed_event(&store, &[d1]).await;

    let mut conn = store.pool().acquire().await.unwrap();
    let changed =
        transition_event_status(&mut conn, event, EventStatus::Hot, Some("SCORE_HOT"), false)
            .await
            .unwrap();
    assert!(changed);
    let unchanged =
        transition_event_status(&mut conn, event, EventStatus::Hot, Some("SCORE_HOT"), false)
            .await
            .unwrap();
    assert!(!unchanged);

    let history = store.state_history(event).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history.last().unwrap().status, "HOT");
    assert_eq!(store.event(event).await.unwrap().unwrap().status(), EventStatus::Hot);
}

#[tokio::test]
async fn snapshot_insert_is_content_addressed() {
    let Some(store) = test_store().await else {
        return;
    };
    let tag = unique_suffix();
    let url = format!("https://example.org/snap-{tag}");
    let snapshot_hash = format!("snap-hash-{tag}");

    let first = store
        .insert_snapshot(&url, &json!({"etag": "abc"}), "body", "content-hash", &snapshot_hash)
        .await
        .unwrap();
    let second = store
        .insert_snapshot(&url, &json!({"etag": "abc"}), "body", "content-hash", &snapshot_hash)
        .await
        .unwrap();
    assert_eq!(first, second);

    let latest = store.latest_snapshot(&url).await.unwrap().unwrap();
    assert_eq!(latest.snapshot_hash, snapshot_hash);
}
