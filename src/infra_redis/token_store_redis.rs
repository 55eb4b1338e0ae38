use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::collections::HashMap;

const TOKEN_UPDATE: &str = include_str!("token_update.lua");

/// One hash per user under `<prefix>:<user_id>` with the fields
/// `access_token`, `refresh_token` and `expires_at`.
pub struct RedisTokenStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisTokenStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisTokenStore {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, user_id: UserId) -> String {
        format!("{}:{}", self.prefix, user_id)
    }
}

fn record_from_fields(user_id: UserId, mut fields: HashMap<String, String>) -> TokenRecord {
    let expires_at = fields
        .remove("expires_at")
        .and_then(|raw| match RawExpiry::Text(raw).normalize() {
            Ok(at) => Some(at),
            Err(e) => {
                warn!(%user_id, error = %e, "unreadable expires_at, treating token as expired");
                None
            }
        });

    TokenRecord {
        user_id,
        access_token: fields
            .remove("access_token")
            .filter(|t| !t.is_empty())
            .map(AccessToken),
        refresh_token: fields
            .remove("refresh_token")
            .filter(|t| !t.is_empty())
            .map(RefreshToken),
        expires_at,
    }
}

#[async_trait::async_trait]
impl TokenStore for RedisTokenStore {
    async fn read_token(&self, user_id: UserId) -> Result<Option<TokenRecord>, TokenStoreError> {
        let key = self.key(user_id);
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn
            .hgetall(&key)
            .await
            .map_err(|e| TokenStoreError::Store(e.to_string()))?;

        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(record_from_fields(user_id, fields)))
    }

    async fn write_token(
        &self,
        user_id: UserId,
        update: &TokenUpdate,
    ) -> Result<(), TokenStoreError> {
        let key = self.key(user_id);
        let mut conn = self.conn.clone();
        let script = Script::new(TOKEN_UPDATE);
        let updated: i64 = script
            .key(&key)
            .arg(update.access_token.as_str())
            .arg(format_expiry(update.expires_at))
            .arg(update.refresh_token.as_ref().map(|t| t.as_str()).unwrap_or(""))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| TokenStoreError::Store(e.to_string()))?;

        match updated {
            1 => Ok(()),
            _ => Err(TokenStoreError::Store(format!(
                "no token row for user {user_id}"
            ))),
        }
    }

    async fn delete_token(&self, user_id: UserId) -> Result<(), TokenStoreError> {
        let key = self.key(user_id);
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(&key)
            .await
            .map_err(|e| TokenStoreError::Store(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn hash_fields_map_to_record() {
        let user_id = UserId::new_v4();
        let fields = HashMap::from([
            ("access_token".to_string(), "a".to_string()),
            ("refresh_token".to_string(), "".to_string()),
            ("expires_at".to_string(), "1714557600000".to_string()),
        ]);

        let record = record_from_fields(user_id, fields);
        assert_eq!(record.access_token, Some(AccessToken("a".into())));
        assert_eq!(record.refresh_token, None);
        assert_eq!(
            record.expires_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn garbage_expiry_reads_as_expired() {
        let fields = HashMap::from([
            ("access_token".to_string(), "a".to_string()),
            ("expires_at".to_string(), "soon".to_string()),
        ]);
        let record = record_from_fields(UserId::new_v4(), fields);
        assert!(record.expires_at.is_none());
    }
}
