//! `signing_keys` table
//!
//! Rows are looked up by `id`, the value attestations carry in `s.k`. Every
//! verification reads the row again; rotating or retiring a key takes effect
//! on the next request.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sealcodes_core::{KeyRegistry, SealError, SigningKeyRecord};
use sqlx::{FromRow, PgPool};

/// Row as stored in Postgres
#[derive(Debug, Clone, FromRow)]
struct SigningKeyRow {
    id: String,
    key_id: String,
    public_key: String,
    algorithm: String,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl From<SigningKeyRow> for SigningKeyRecord {
    fn from(row: SigningKeyRow) -> Self {
        if row.key_id != row.id {
            tracing::debug!(id = %row.id, label = %row.key_id, "Signing key label differs from id");
        }
        Self {
            key_id: row.id,
            public_key: row.public_key,
            algorithm: row.algorithm,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

/// Read-only registry over the `signing_keys` table
#[derive(Clone)]
pub struct PostgresKeyRegistry {
    pool: PgPool,
}

impl PostgresKeyRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyRegistry for PostgresKeyRegistry {
    async fn find_key(&self, key_id: &str) -> sealcodes_core::Result<Option<SigningKeyRecord>> {
        let row = sqlx::query_as::<_, SigningKeyRow>(
            r#"
            SELECT id, key_id, public_key, algorithm, created_at, expires_at
            FROM signing_keys
            WHERE id = $1
            "#,
        )
        .bind(key_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, key_id = %key_id, "Signing key lookup failed");
            SealError::RegistryError(e.to_string())
        })?;

        Ok(row.map(SigningKeyRecord::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_row_maps_id_to_key_id() {
        let created = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let record = SigningKeyRecord::from(SigningKeyRow {
            id: "seal-2025".into(),
            key_id: "January rotation".into(),
            public_key: "MCowBQYDK2VwAyEA".into(),
            algorithm: "Ed25519".into(),
            created_at: created,
            expires_at: None,
        });
        assert_eq!(record.key_id, "seal-2025");
        assert_eq!(record.created_at, created);
        assert!(record.is_ed25519());
    }
}
