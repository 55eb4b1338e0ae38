use crate::application_port::*;
use crate::domain_model::*;
use chrono::{Duration, Utc};

#[derive(Debug, Default)]
pub struct FakeTokenService;

impl FakeTokenService {
    pub fn new() -> Self {
        Self
    }
}

// Every user is connected and gets a deterministic token.
// Extend to simulate purged or failing connections when needed.
#[async_trait::async_trait]
impl TokenService for FakeTokenService {
    async fn resolve_access_token(
        &self,
        user_id: UserId,
    ) -> Result<Option<ResolvedToken>, TokenError> {
        Ok(Some(ResolvedToken {
            token: AccessToken(format!("fake-access-token:{}", user_id)),
            expires_at: Utc::now() + Duration::hours(1),
            source: TokenSource::Cache,
            persist_error: None,
        }))
    }

    fn clear_cache(&self, _user_id: Option<UserId>) {}

    async fn disconnect(&self, _user_id: UserId) -> Result<(), TokenError> {
        Ok(())
    }
}
