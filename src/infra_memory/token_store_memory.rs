use crate::domain_model::*;
use crate::domain_port::*;
use dashmap::DashMap;

/// Token store kept in process memory. Used by the `memory` backend and tests.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    rows: DashMap<UserId, TokenRecord>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a row the way the OAuth webhook does.
    pub fn insert(&self, record: TokenRecord) {
        self.rows.insert(record.user_id, record);
    }

    pub fn get(&self, user_id: UserId) -> Option<TokenRecord> {
        self.rows.get(&user_id).map(|row| row.value().clone())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait::async_trait]
impl TokenStore for MemoryTokenStore {
    async fn read_token(&self, user_id: UserId) -> Result<Option<TokenRecord>, TokenStoreError> {
        Ok(self.get(user_id))
    }

    async fn write_token(
        &self,
        user_id: UserId,
        update: &TokenUpdate,
    ) -> Result<(), TokenStoreError> {
        let mut row = self
            .rows
            .get_mut(&user_id)
            .ok_or_else(|| TokenStoreError::Store(format!("no token row for user {user_id}")))?;
        row.access_token = Some(update.access_token.clone());
        row.expires_at = Some(update.expires_at);
        if let Some(refresh_token) = &update.refresh_token {
            row.refresh_token = Some(refresh_token.clone());
        }
        Ok(())
    }

    async fn delete_token(&self, user_id: UserId) -> Result<(), TokenStoreError> {
        self.rows.remove(&user_id);
        Ok(())
    }
}
