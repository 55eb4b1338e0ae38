use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use uuid::Uuid;

/// `spotify_token` table, one row per user. See `sql/spotify_token.sql`.
pub struct MySqlTokenStore {
    pool: MySqlPool,
}

impl MySqlTokenStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlTokenStore { pool }
    }

    #[inline]
    fn uid_as_bytes(id: &UserId) -> &[u8] {
        id.0.as_bytes()
    }

    #[inline]
    fn uid_from_bytes(id: &[u8]) -> Result<UserId, TokenStoreError> {
        Ok(UserId(
            Uuid::from_slice(id).map_err(|e| TokenStoreError::Corrupt(e.to_string()))?,
        ))
    }

    // Legacy rows hold epoch millis, newer ones an RFC 3339 string; some
    // deployments migrated the column to BIGINT or DATETIME.
    fn raw_expiry(row: &MySqlRow) -> Option<RawExpiry> {
        if let Ok(text) = row.try_get::<Option<String>, _>("expires_at") {
            return text.map(RawExpiry::Text);
        }
        if let Ok(ms) = row.try_get::<Option<i64>, _>("expires_at") {
            return ms.map(RawExpiry::EpochMillis);
        }
        if let Ok(at) = row.try_get::<Option<DateTime<Utc>>, _>("expires_at") {
            return at.map(|at| RawExpiry::EpochMillis(at.timestamp_millis()));
        }
        None
    }

    fn row_to_record(row: MySqlRow) -> Result<TokenRecord, TokenStoreError> {
        let user_id_bytes: Vec<u8> = row
            .try_get("user_id")
            .map_err(|e| TokenStoreError::Store(e.to_string()))?;
        let user_id = Self::uid_from_bytes(&user_id_bytes)?;

        let access_token: Option<String> = row
            .try_get("access_token")
            .map_err(|e| TokenStoreError::Store(e.to_string()))?;
        let refresh_token: Option<String> = row
            .try_get("refresh_token")
            .map_err(|e| TokenStoreError::Store(e.to_string()))?;

        let expires_at = Self::raw_expiry(&row).and_then(|raw| match raw.normalize() {
            Ok(at) => Some(at),
            Err(e) => {
                warn!(%user_id, error = %e, "unreadable expires_at, treating token as expired");
                None
            }
        });

        Ok(TokenRecord {
            user_id,
            access_token: access_token.filter(|t| !t.is_empty()).map(AccessToken),
            refresh_token: refresh_token.filter(|t| !t.is_empty()).map(RefreshToken),
            expires_at,
        })
    }
}

#[async_trait::async_trait]
impl TokenStore for MySqlTokenStore {
    async fn read_token(&self, user_id: UserId) -> Result<Option<TokenRecord>, TokenStoreError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT user_id, access_token, refresh_token, expires_at
FROM spotify_token
WHERE user_id = ?
"#,
        )
        .bind(Self::uid_as_bytes(&user_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TokenStoreError::Store(e.to_string()))?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn write_token(
        &self,
        user_id: UserId,
        update: &TokenUpdate,
    ) -> Result<(), TokenStoreError> {
        let result = sqlx::query(
            r#"
UPDATE spotify_token
SET access_token = ?,
    expires_at = ?,
    refresh_token = COALESCE(?, refresh_token),
    updated_at = CURRENT_TIMESTAMP(3)
WHERE user_id = ?
"#,
        )
        .bind(update.access_token.as_str())
        .bind(format_expiry(update.expires_at))
        .bind(update.refresh_token.as_ref().map(|t| t.as_str()))
        .bind(Self::uid_as_bytes(&user_id))
        .execute(&self.pool)
        .await
        .map_err(|e| TokenStoreError::Store(format!("update token: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(TokenStoreError::Store(format!(
                "no token row for user {user_id}"
            )));
        }
        Ok(())
    }

    async fn delete_token(&self, user_id: UserId) -> Result<(), TokenStoreError> {
        sqlx::query("DELETE FROM spotify_token WHERE user_id = ?")
            .bind(Self::uid_as_bytes(&user_id))
            .execute(&self.pool)
            .await
            .map_err(|e| TokenStoreError::Store(format!("delete token: {e}")))?;

        Ok(())
    }
}
