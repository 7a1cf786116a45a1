//! Source catalog rows. Sources are created by bootstrap, occasionally
//! edited by an operator, and disabled rather than deleted.

use chrono::{DateTime, Utc};
use tracing::error;

use pautaradar_common::SourceProfile;

use crate::error::Result;
use crate::Store;

/// A row from the sources table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SourceRow {
    pub id: i64,
    pub source_id: String,
    pub domain: Option<String>,
    pub name: Option<String>,
    pub tier: i16,
    pub is_official: bool,
    pub lang: Option<String>,
    pub enabled: bool,
    pub profile: serde_json::Value,
}

impl SourceRow {
    /// Parse and validate the embedded profile, stamping the catalog row id.
    pub fn parsed_profile(&self) -> std::result::Result<SourceProfile, pautaradar_common::RadarError> {
        let mut profile = SourceProfile::from_value(self.profile.clone())?;
        profile.id = Some(self.id);
        if profile.source_domain.is_none() {
            profile.source_domain = self.domain.clone();
        }
        Ok(profile)
    }
}

impl Store {
    /// Enabled sources with their validated profiles. Rows whose profile
    /// fails validation are logged and skipped; the scheduler keeps running.
    pub async fn enabled_profiles(&self) -> Result<Vec<SourceProfile>> {
        let rows = sqlx::query_as::<_, SourceRow>(
            r#"
            SELECT id, source_id, domain, name, tier, is_official, lang, enabled, profile
            FROM sources
            WHERE enabled = TRUE
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut profiles = Vec::with_capacity(rows.len());
        for row in rows {
            match row.parsed_profile() {
                Ok(profile) => profiles.push(profile),
                Err(e) => {
                    error!(source_id = %row.source_id, error = %e, "Invalid source profile; skipping");
                }
            }
        }
        Ok(profiles)
    }

    pub async fn source_by_pk(&self, id: i64) -> Result<Option<SourceRow>> {
        let row = sqlx::query_as::<_, SourceRow>(
            r#"
            SELECT id, source_id, domain, name, tier, is_official, lang, enabled, profile
            FROM sources
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Upsert one catalog row keyed by the stable source_id. Bootstrap path;
    /// the profile must already be validated by the caller.
    pub async fn upsert_source(&self, profile: &SourceProfile) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO sources (source_id, domain, name, tier, is_official, lang, profile)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (source_id) DO UPDATE SET
                domain = EXCLUDED.domain,
                tier = EXCLUDED.tier,
                is_official = EXCLUDED.is_official,
                lang = EXCLUDED.lang,
                profile = EXCLUDED.profile,
                updated_at = now()
            RETURNING id
            "#,
        )
        .bind(&profile.source_id)
        .bind(&profile.source_domain)
        .bind(&profile.source_id)
        .bind(profile.tier as i16)
        .bind(profile.is_official)
        .bind(&profile.lang)
        .bind(serde_json::to_value(profile).unwrap_or_default())
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Timestamp of the most recent fetch attempt for a source. Drives the
    /// scheduler's due decision.
    pub async fn latest_attempt_at(&self, source_pk: i64) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            SELECT created_at FROM fetch_attempts
            WHERE source_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(source_pk)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
