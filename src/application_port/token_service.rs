use crate::domain_model::*;
use crate::domain_port::{ExchangeError, TokenStoreError};
use chrono::{DateTime, Utc};

/// Failures of token resolution. "Not connected" is not among them: it is
/// reported as `Ok(None)`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TokenError {
    #[error("token refresh service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("spotify connection is invalid: {0}")]
    InvalidConnection(String),
    #[error("transient failure: {0}")]
    TransientFailure(String),
    #[error("store error: {0}")]
    Store(String),
}

impl From<TokenStoreError> for TokenError {
    fn from(err: TokenStoreError) -> Self {
        TokenError::Store(err.to_string())
    }
}

impl From<ExchangeError> for TokenError {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::ServiceUnavailable(e) => TokenError::ServiceUnavailable(e),
            ExchangeError::InvalidGrant(e) => TokenError::InvalidConnection(e),
            ExchangeError::Other(e) => TokenError::TransientFailure(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Cache,
    Store,
    Refreshed,
}

#[derive(Debug, Clone)]
pub struct ResolvedToken {
    pub token: AccessToken,
    pub expires_at: DateTime<Utc>,
    pub source: TokenSource,
    /// Set when a refreshed token could not be written back to the store.
    /// The token itself is still good for this process.
    pub persist_error: Option<String>,
}

#[async_trait::async_trait]
pub trait TokenService: Send + Sync {
    async fn resolve_access_token(
        &self,
        user_id: UserId,
    ) -> Result<Option<ResolvedToken>, TokenError>;

    async fn get_access_token(&self, user_id: UserId) -> Result<Option<AccessToken>, TokenError> {
        Ok(self
            .resolve_access_token(user_id)
            .await?
            .map(|resolved| resolved.token))
    }

    async fn has_valid_connection(&self, user_id: UserId) -> bool {
        matches!(self.get_access_token(user_id).await, Ok(Some(_)))
    }

    /// Drop cached tokens for one user, or for everyone. The store is untouched.
    fn clear_cache(&self, user_id: Option<UserId>);

    /// Forget the connection entirely, store row included.
    async fn disconnect(&self, user_id: UserId) -> Result<(), TokenError>;
}
