use crate::domain_model::*;
use chrono::{DateTime, Utc};

/// Fields rewritten after a successful refresh.
#[derive(Debug, Clone)]
pub struct TokenUpdate {
    pub access_token: AccessToken,
    pub expires_at: DateTime<Utc>,
    /// Set when the provider rotated the refresh token.
    pub refresh_token: Option<RefreshToken>,
}

#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    /// Fetch the connection row for a user, if the webhook ever wrote one.
    async fn read_token(&self, user_id: UserId) -> Result<Option<TokenRecord>, TokenStoreError>;

    /// Update an existing row. Rows are never created here.
    async fn write_token(
        &self,
        user_id: UserId,
        update: &TokenUpdate,
    ) -> Result<(), TokenStoreError>;

    /// Remove the connection. Deleting a missing row is not an error.
    async fn delete_token(&self, user_id: UserId) -> Result<(), TokenStoreError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TokenStoreError {
    #[error("store error: {0}")]
    Store(String),
    #[error("corrupt token row: {0}")]
    Corrupt(String),
}
