use crate::domain_model::*;

#[derive(Debug, Clone)]
pub struct RefreshGrant {
    pub access_token: AccessToken,
    pub expires_in_secs: i64,
    pub refresh_token: Option<RefreshToken>,
}

/// Failure of a refresh exchange, classified so the caller can decide whether
/// the connection is worth keeping.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExchangeError {
    /// The exchange endpoint itself is down or misbehaving.
    #[error("refresh service unavailable: {0}")]
    ServiceUnavailable(String),
    /// The provider rejected the refresh token.
    #[error("invalid grant: {0}")]
    InvalidGrant(String),
    #[error("refresh failed: {0}")]
    Other(String),
}

#[async_trait::async_trait]
pub trait RefreshExchanger: Send + Sync {
    async fn exchange(
        &self,
        user_id: UserId,
        refresh_token: &RefreshToken,
    ) -> Result<RefreshGrant, ExchangeError>;
}
