//! Document rows, anchors, evidence features, and entity mentions.
//!
//! Documents are identity-addressed (url / canonical_url) with strictly
//! increasing `version_no`; snapshots stay content-addressed. The organizer
//! writes everything here inside one transaction, so the helpers take
//! `&mut PgConnection`.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use pautaradar_common::anchors::Anchor;

use crate::error::Result;
use crate::Store;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DocumentRow {
    pub id: i64,
    pub source_id: Option<i64>,
    pub snapshot_id: Option<i64>,
    pub url: String,
    pub canonical_url: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub clean_text: String,
    pub lang: Option<String>,
    pub content_hash: String,
    pub simhash: Option<i64>,
    pub version_no: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub source_pk: i64,
    pub snapshot_id: Option<i64>,
    pub url: String,
    pub canonical_url: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub clean_text: String,
    pub lang: Option<String>,
    pub content_hash: String,
    pub simhash: Option<u64>,
    pub version_no: i32,
}

#[derive(Debug, Clone)]
pub struct NewEvidenceFeature {
    pub evidence_score: f64,
    pub has_pdf: bool,
    pub has_official_domain: bool,
    pub anchors_count: i32,
    pub money_count: i32,
    pub has_table_like: bool,
    pub evidence_json: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct NewEntityMention {
    pub entity_key: String,
    pub label: String,
    pub evidence_ptr: Option<String>,
    pub confidence: f32,
}

/// Newest version for the same identity (url, or canonical_url when given).
pub async fn latest_document(
    conn: &mut PgConnection,
    url: &str,
    canonical_url: Option<&str>,
) -> Result<Option<DocumentRow>> {
    let row = match canonical_url.filter(|c| *c != url) {
        Some(canonical) => {
            sqlx::query_as::<_, DocumentRow>(
                r#"
                SELECT * FROM documents
                WHERE url = $1 OR canonical_url = $2
                ORDER BY version_no DESC
                LIMIT 1
                "#,
            )
            .bind(url)
            .bind(canonical)
            .fetch_optional(conn)
            .await?
        }
        None => {
            sqlx::query_as::<_, DocumentRow>(
                r#"
                SELECT * FROM documents
                WHERE url = $1
                ORDER BY version_no DESC
                LIMIT 1
                "#,
            )
            .bind(url)
            .fetch_optional(conn)
            .await?
        }
    };
    Ok(row)
}

pub async fn insert_document(conn: &mut PgConnection, doc: &NewDocument) -> Result<i64> {
    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO documents
            (source_id, snapshot_id, url, canonical_url, title, author,
             published_at, modified_at, clean_text, lang, content_hash,
             simhash, version_no)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING id
        "#,
    )
    .bind(doc.source_pk)
    .bind(doc.snapshot_id)
    .bind(&doc.url)
    .bind(&doc.canonical_url)
    .bind(&doc.title)
    .bind(&doc.author)
    .bind(doc.published_at)
    .bind(doc.modified_at)
    .bind(&doc.clean_text)
    .bind(&doc.lang)
    .bind(&doc.content_hash)
    .bind(doc.simhash.map(|h| h as i64))
    .bind(doc.version_no)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

pub async fn insert_anchors(
    conn: &mut PgConnection,
    doc_id: i64,
    anchors: &[Anchor],
) -> Result<()> {
    for anchor in anchors {
        sqlx::query(
            r#"
            INSERT INTO doc_anchors (doc_id, anchor_type, anchor_value, evidence_ptr, confidence)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(doc_id)
        .bind(anchor.anchor_type.as_str())
        .bind(&anchor.value)
        .bind(&anchor.ptr)
        .bind(anchor.confidence)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn insert_evidence_feature(
    conn: &mut PgConnection,
    doc_id: i64,
    feature: &NewEvidenceFeature,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO doc_evidence_features
            (doc_id, evidence_score, has_pdf, has_official_domain,
             anchors_count, money_count, has_table_like, evidence_json)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(doc_id)
    .bind(feature.evidence_score)
    .bind(feature.has_pdf)
    .bind(feature.has_official_domain)
    .bind(feature.anchors_count)
    .bind(feature.money_count)
    .bind(feature.has_table_like)
    .bind(&feature.evidence_json)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn insert_entity_mentions(
    conn: &mut PgConnection,
    doc_id: i64,
    mentions: &[NewEntityMention],
) -> Result<()> {
    for mention in mentions {
        sqlx::query(
            r#"
            INSERT INTO entity_mentions (doc_id, entity_key, label, evidence_ptr, confidence)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(doc_id)
        .bind(&mention.entity_key)
        .bind(&mention.label)
        .bind(&mention.evidence_ptr)
        .bind(mention.confidence)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Anchor identities (`TYPE:value`) of one document.
pub async fn anchor_keys_for_doc(conn: &mut PgConnection, doc_id: i64) -> Result<Vec<String>> {
    let rows = sqlx::query_scalar::<_, String>(
        "SELECT anchor_type || ':' || anchor_value FROM doc_anchors WHERE doc_id = $1",
    )
    .bind(doc_id)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Event a document is linked to, if any.
pub async fn event_for_doc(conn: &mut PgConnection, doc_id: i64) -> Result<Option<i64>> {
    let row = sqlx::query_scalar::<_, i64>(
        "SELECT event_id FROM event_docs WHERE doc_id = $1 LIMIT 1",
    )
    .bind(doc_id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

/// First event carrying any of the given strong anchors within the window.
pub async fn find_event_by_strong_anchors(
    conn: &mut PgConnection,
    pairs: &[(String, String)],
    seen_after: DateTime<Utc>,
) -> Result<Option<i64>> {
    if pairs.is_empty() {
        return Ok(None);
    }
    let types: Vec<String> = pairs.iter().map(|(t, _)| t.clone()).collect();
    let values: Vec<String> = pairs.iter().map(|(_, v)| v.clone()).collect();

    let row = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT ed.event_id
        FROM event_docs ed
        JOIN doc_anchors da ON da.doc_id = ed.doc_id
        WHERE (da.anchor_type, da.anchor_value) IN
              (SELECT * FROM unnest($1::text[], $2::text[]))
          AND ed.seen_at >= $3
        LIMIT 1
        "#,
    )
    .bind(&types)
    .bind(&values)
    .bind(seen_after)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

/// Recent documents carrying a SimHash, for the near-duplicate lookup.
pub async fn recent_simhash_candidates(
    conn: &mut PgConnection,
    created_after: DateTime<Utc>,
) -> Result<Vec<(i64, u64)>> {
    let rows = sqlx::query_as::<_, (i64, i64)>(
        r#"
        SELECT id, simhash FROM documents
        WHERE created_at >= $1 AND simhash IS NOT NULL
        ORDER BY id ASC
        "#,
    )
    .bind(created_after)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(|(id, hash)| (id, hash as u64)).collect())
}

impl Store {
    /// Documents linked to an event, ordered by first sighting.
    pub async fn documents_for_event(
        &self,
        event_id: i64,
    ) -> Result<Vec<(DocumentRow, bool, DateTime<Utc>)>> {
        #[derive(sqlx::FromRow)]
        struct Row {
            #[sqlx(flatten)]
            doc: DocumentRow,
            is_primary: bool,
            seen_at: DateTime<Utc>,
        }
        let rows = sqlx::query_as::<_, Row>(
            r#"
            SELECT d.*, ed.is_primary, ed.seen_at
            FROM documents d
            JOIN event_docs ed ON ed.doc_id = d.id
            WHERE ed.event_id = $1
            ORDER BY ed.seen_at ASC, d.id ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| (r.doc, r.is_primary, r.seen_at)).collect())
    }

    /// Anchors across a set of documents.
    pub async fn anchors_for_docs(&self, doc_ids: &[i64]) -> Result<Vec<AnchorRow>> {
        if doc_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, AnchorRow>(
            r#"
            SELECT doc_id, anchor_type, anchor_value
            FROM doc_anchors
            WHERE doc_id = ANY($1)
            ORDER BY doc_id ASC, id ASC
            "#,
        )
        .bind(doc_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Entity mention labels across a set of documents.
    pub async fn entity_labels_for_docs(&self, doc_ids: &[i64]) -> Result<Vec<String>> {
        if doc_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT label FROM entity_mentions WHERE doc_id = ANY($1)",
        )
        .bind(doc_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnchorRow {
    pub doc_id: i64,
    pub anchor_type: String,
    pub anchor_value: String,
}
